use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use meshlod_rs::Mesh;
use meshlod_rs::cluster::cluster_points;
use meshlod_rs::kdtree::KdTree;
use meshlod_rs::simplify::{SimplifyOptions, SimplifyTarget, generate_lod_chain, simplify};

use std::fmt::Debug;
use std::path::Path;

// OBJ file to benchmark with; a generated grid is used when unset
const INPUT_VAR: &str = "MESHLOD_BENCH_OBJ";

fn load<P>(path: P) -> Result<Mesh, tobj::LoadError>
where
    P: AsRef<Path> + Clone + Debug,
{
    let (models, _materials) = tobj::load_obj(
        path.clone(),
        &tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ..Default::default()
        },
    )?;

    let mut result = Mesh::default();

    for model in models.iter() {
        let mesh = &model.mesh;
        assert!(mesh.positions.len().is_multiple_of(3));

        let vertex_offset = result.positions.len() as u32;
        let tex_offset = result.tex_coords.len() as u32;

        result
            .positions
            .extend(mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]));
        result
            .indices
            .extend(mesh.indices.iter().map(|i| i + vertex_offset));

        if !mesh.texcoord_indices.is_empty() {
            result
                .tex_coords
                .extend(mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]));
            result
                .tex_indices
                .extend(mesh.texcoord_indices.iter().map(|i| i + tex_offset));
        }
    }

    // a mix of textured and untextured models can't keep its uvs
    if result.tex_indices.len() != result.indices.len() {
        result.tex_coords.clear();
        result.tex_indices.clear();
    }

    Ok(result)
}

// Wavy grid with a uv per vertex
fn grid(size: u32) -> Mesh {
    let mut positions = Vec::new();
    let mut tex_coords = Vec::new();

    for y in 0..=size {
        for x in 0..=size {
            let (u, v) = (x as f32 / size as f32, y as f32 / size as f32);

            positions.push([u, v, 0.05 * (u * 17.0).sin() * (v * 13.0).cos()]);
            tex_coords.push([u, v]);
        }
    }

    let mut indices = Vec::new();

    for y in 0..size {
        for x in 0..size {
            let i = y * (size + 1) + x;

            indices.extend_from_slice(&[i, i + 1, i + size + 1, i + 1, i + size + 2, i + size + 1]);
        }
    }

    Mesh::new(positions, indices.clone()).with_tex_coords(tex_coords, indices)
}

fn with_input(c: &mut Criterion) {
    let (input_name, mesh) = match std::env::var(INPUT_VAR) {
        Ok(path) => {
            let mesh = load(Path::new(&path)).unwrap();
            (path, mesh)
        }
        Err(_) => ("grid128".to_string(), grid(128)),
    };

    mesh.validate().unwrap();

    let mut group = c.benchmark_group("simplify");
    group.sample_size(10);
    group.throughput(Throughput::Elements(mesh.triangle_count() as u64));

    for ratio in [2, 8] {
        let target = SimplifyTarget::triangles(mesh.triangle_count() / ratio);

        group.bench_with_input(
            BenchmarkId::new(format!("simplify_1_{ratio}"), &input_name),
            &mesh,
            |b, mesh| {
                b.iter(|| simplify(mesh, target, SimplifyOptions::default()).unwrap());
            },
        );
    }

    group.bench_with_input(
        BenchmarkId::new("generate_lod_chain", &input_name),
        &mesh,
        |b, mesh| {
            const LEVELS: usize = 4;

            b.iter(|| generate_lod_chain(mesh, LEVELS, SimplifyOptions::default()).unwrap());
        },
    );
    group.finish();

    let mut group = c.benchmark_group("clustering");
    group.throughput(Throughput::Elements(mesh.positions.len() as u64));

    group.bench_with_input(BenchmarkId::new("kdtree_build", &input_name), &mesh, |b, mesh| {
        b.iter(|| KdTree::build(&mesh.positions, 0));
    });

    group.bench_with_input(
        BenchmarkId::new("kdtree_get_leaf", &input_name),
        &mesh,
        |b, mesh| {
            let tree = KdTree::build(&mesh.positions, 0);

            b.iter(|| {
                mesh.positions
                    .iter()
                    .map(|p| tree.get_leaf(*p).point_count)
                    .sum::<usize>()
            });
        },
    );

    group.sample_size(10);
    group.bench_with_input(
        BenchmarkId::new("cluster_points", &input_name),
        &mesh,
        |b, mesh| {
            const DENSITY: usize = 64;

            b.iter(|| cluster_points(&mesh.positions, DENSITY, 0).unwrap());
        },
    );
    group.finish();
}

criterion_group!(benches, with_input);
criterion_main!(benches);
