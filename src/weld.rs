//! Triangle soup welding
//!
//! Turns a per-corner triangle soup into an indexed [Mesh](crate::Mesh) suitable for building half-edges:
//! coincident positions and identical texture coordinates are merged, and triangles that collapse to a line or a
//! point are dropped.

use crate::{Error, Mesh, Result, Vector3};

use std::cmp::Ordering;

/// Result of [weld].
#[derive(Clone, Debug, Default)]
pub struct WeldedMesh {
    pub mesh: Mesh,
    /// For each welded vertex, the first source corner that produced it
    pub source_vertex: Vec<u32>,
    /// For each welded texture coordinate, the first source corner that produced it
    pub source_tex: Vec<u32>,
}

fn lexicographic<const N: usize>(a: &[f32; N], b: &[f32; N]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(a, b)| a.total_cmp(b))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

// Sorts corners lexicographically and merges each one into the previous unique value when `merge` says so.
// Returns the unique values, the per-corner remap and the first corner of every unique value.
fn sweep_unique<const N: usize, F>(values: &[[f32; N]], merge: F) -> (Vec<[f32; N]>, Vec<u32>, Vec<u32>)
where
    F: Fn(&[f32; N], &[f32; N]) -> bool,
{
    let mut order: Vec<u32> = (0..values.len() as u32).collect();
    order.sort_by(|a, b| lexicographic(&values[*a as usize], &values[*b as usize]).then(a.cmp(b)));

    let mut unique = Vec::new();
    let mut remap = vec![0u32; values.len()];
    let mut source = Vec::new();

    for (i, corner) in order.iter().enumerate() {
        let value = &values[*corner as usize];

        // chained: compare against the previous corner in sorted order, not against the run's representative
        let merged = i > 0 && merge(&values[order[i - 1] as usize], value);

        if !merged {
            unique.push(*value);
            source.push(*corner);
        }

        remap[*corner as usize] = unique.len() as u32 - 1;
    }

    (unique, remap, source)
}

/// Welds a triangle soup into an indexed mesh.
///
/// Two positions are merged when their squared distance is at most `merge_threshold` (pass 0 to only merge exact
/// duplicates); texture coordinates are only merged when identical. Triangles referencing the same welded vertex
/// twice are removed.
///
/// # Arguments
///
/// * `positions`: one position per triangle corner
/// * `tex_coords`: either empty or one texture coordinate per triangle corner
pub fn weld(positions: &[[f32; 3]], tex_coords: &[[f32; 2]], merge_threshold: f32) -> Result<WeldedMesh> {
    if positions.len() % 3 != 0 {
        return Err(Error::IndexCountNotTriangles { len: positions.len() });
    }

    let include_tex = !tex_coords.is_empty();

    if include_tex && tex_coords.len() != positions.len() {
        return Err(Error::TexIndexCountMismatch {
            len: tex_coords.len(),
            expected: positions.len(),
        });
    }

    let (unique_positions, vert_remap, source_vertex) = sweep_unique(positions, |a, b| {
        Vector3::from(*a).distance_squared(&Vector3::from(*b)) <= merge_threshold
    });

    let (unique_tex, tex_remap, source_tex) = if include_tex {
        sweep_unique(tex_coords, |a, b| a == b)
    } else {
        (Vec::new(), Vec::new(), Vec::new())
    };

    let mut indices = Vec::with_capacity(positions.len());
    let mut tex_indices = Vec::with_capacity(if include_tex { positions.len() } else { 0 });
    let mut degenerate = 0;

    for (t, tri) in vert_remap.chunks_exact(3).enumerate() {
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
            degenerate += 1;
            continue;
        }

        indices.extend_from_slice(tri);

        if include_tex {
            tex_indices.extend_from_slice(&tex_remap[t * 3..t * 3 + 3]);
        }
    }

    log::debug!(
        "welded {} corners into {} vertices and {} texture coordinates, dropped {degenerate} degenerate triangles",
        positions.len(),
        unique_positions.len(),
        unique_tex.len(),
    );

    Ok(WeldedMesh {
        mesh: Mesh {
            positions: unique_positions,
            indices,
            tex_coords: unique_tex,
            tex_indices,
        },
        source_vertex,
        source_tex,
    })
}
