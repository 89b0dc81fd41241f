//! Greedy edge collapse simplification
//!
//! The cheapest edge according to the quadric error metric is collapsed repeatedly: its origin vertex absorbs the
//! destination, the one or two triangles along the edge are removed, and every edge around the surviving vertex is
//! re-evaluated. Vertex and texture coordinate buffers keep their length; absorbed slots are simply no longer
//! referenced, and their parent records move to the surviving slot.

// This work is based on:
// Michael Garland and Paul S. Heckbert. Surface simplification using quadric error metrics. 1997
// Tamal K. Dey, Herbert Edelsbrunner, Sumanta Guha, Dmitry V. Nekhayev. Topology Preserving Edge Contraction. 1999

use bitflags::bitflags;

use crate::halfedge::{EdgeSets, HalfEdgeMesh};
use crate::parents::ParentRecords;
use crate::quadric::{CollapseCost, Quadric, calculate_error, compute_quadrics};
use crate::queue::CollapseQueue;
use crate::util::lerp;
use crate::{Error, INVALID_INDEX, Mesh, Result};

use std::collections::BTreeSet;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SimplifyOptions: u32 {
        /// Collapse edges even when the result is not a 2-manifold (endpoints sharing neighbours other than the
        /// vertices opposite the edge, or an interior edge joining two border vertices). Such collapses are always
        /// counted in [SimplifyStats::non_manifold]; without this flag they are postponed until the neighbourhood
        /// changes.
        const ALLOW_NON_MANIFOLD = 1 << 0;
    }
}

/// Stopping criteria, whichever is reached first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimplifyTarget {
    pub triangle_count: usize,
    /// Edges costing more than this are never collapsed
    pub max_error: f32,
}

impl Default for SimplifyTarget {
    fn default() -> Self {
        Self {
            triangle_count: 0,
            max_error: f32::MAX,
        }
    }
}

impl SimplifyTarget {
    pub fn triangles(triangle_count: usize) -> Self {
        Self {
            triangle_count,
            ..Default::default()
        }
    }

    pub fn with_max_error(mut self, max_error: f32) -> Self {
        self.max_error = max_error;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimplifyStats {
    pub collapses: usize,
    /// Popped queue entries whose edge had already been removed
    pub stale_entries: usize,
    /// Collapses that would break manifoldness, whether performed or postponed
    pub non_manifold: usize,
    /// Triangles removed because they ended up with a repeated vertex
    pub degenerate_removed: usize,
}

/// Result of a simplification.
///
/// Buffers keep the input length and layout: slots absorbed by collapses are left in place but not referenced by the
/// index buffers. Use [SimplifiedMesh::compact] to drop them.
#[derive(Clone, Debug, Default)]
pub struct SimplifiedMesh {
    pub positions: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub tex_indices: Vec<u32>,
    /// Source vertices blended into every vertex slot
    pub vert_parents: ParentRecords,
    /// Source texture coordinates blended into every texture coordinate slot
    pub tex_parents: ParentRecords,
    /// Largest collapse cost applied
    pub max_error: f32,
    pub stats: SimplifyStats,
}

// Slots in order of first use by `indices`, and the index buffer rewritten to point into that order.
fn first_use_remap(indices: &[u32], slot_count: usize) -> (Vec<u32>, Vec<u32>) {
    let mut remap = vec![INVALID_INDEX; slot_count];
    let mut slots = Vec::new();

    let remapped = indices
        .iter()
        .map(|index| {
            let r = &mut remap[*index as usize];

            if *r == INVALID_INDEX {
                *r = slots.len() as u32;
                slots.push(*index);
            }

            *r
        })
        .collect();

    (slots, remapped)
}

impl SimplifiedMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Drops unreferenced slots, renumbering vertices and texture coordinates in order of first use.
    ///
    /// Parent records follow their slots; the source ids inside them are unchanged.
    pub fn compact(&self) -> SimplifiedMesh {
        let (vert_slots, indices) = first_use_remap(&self.indices, self.positions.len());
        let (tex_slots, tex_indices) = first_use_remap(&self.tex_indices, self.tex_coords.len());

        SimplifiedMesh {
            positions: vert_slots.iter().map(|s| self.positions[*s as usize]).collect(),
            tex_coords: tex_slots.iter().map(|s| self.tex_coords[*s as usize]).collect(),
            indices,
            tex_indices,
            vert_parents: self.vert_parents.select(&vert_slots),
            tex_parents: self.tex_parents.select(&tex_slots),
            max_error: self.max_error,
            stats: self.stats,
        }
    }

    pub fn to_mesh(&self) -> Mesh {
        Mesh::new(self.positions.clone(), self.indices.clone()).with_tex_coords(self.tex_coords.clone(), self.tex_indices.clone())
    }
}

/// Incremental simplification state.
///
/// [simplify] and [generate_lod_chain] drive this; it is public so callers can step collapses themselves.
pub struct Simplifier {
    positions: Vec<[f32; 3]>,
    tex_coords: Vec<[f32; 2]>,
    include_tex: bool,
    options: SimplifyOptions,
    mesh: HalfEdgeMesh,
    quadrics: Vec<Quadric>,
    queue: CollapseQueue,
    vert_edges: EdgeSets,
    tex_edges: EdgeSets,
    vert_parents: ParentRecords,
    tex_parents: ParentRecords,
    /// Edges that failed the manifold check, waiting for their neighbourhood to change
    postponed: Vec<u32>,
    triangle_count: usize,
    max_error: f32,
    stats: SimplifyStats,
}

impl Simplifier {
    /// Builds half-edges, quadrics and the collapse queue for `mesh`.
    ///
    /// Texture coordinates are tracked whenever the mesh has a texture coordinate index buffer.
    pub fn new(mesh: &Mesh, options: SimplifyOptions) -> Result<Self> {
        mesh.validate()?;

        let include_tex = mesh.has_tex_coords();

        log::info!(
            "Building half-edges for {} triangles ({} vertices, {} texture coordinates)",
            mesh.triangle_count(),
            mesh.positions.len(),
            if include_tex { mesh.tex_coords.len() } else { 0 },
        );

        let tex_indices: &[u32] = if include_tex { &mesh.tex_indices } else { &[] };
        let mut half_edges = HalfEdgeMesh::build(&mesh.indices, tex_indices);

        let report = half_edges.validate_twins();

        if !report.is_valid() {
            log::error!("{} half-edges have an asymmetric twin", report.invalid);
            return Err(Error::InvalidTwins { count: report.invalid });
        }

        if report.missing == 0 {
            log::info!("All edge pairs are valid");
        } else {
            log::info!("All edge pairs are valid, {} border half-edges", report.missing);
        }

        let mut degenerate = 0;

        for (t, tri) in mesh.indices.chunks_exact(3).enumerate() {
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
                half_edges.remove_triangle(t as u32 * 3);
                degenerate += 1;
            }
        }

        let vert_edges = EdgeSets::vertices(&half_edges, mesh.positions.len());

        let (tex_edges, tex_parents, tex_coords) = if include_tex {
            (
                EdgeSets::tex_coords(&half_edges, mesh.tex_coords.len()),
                ParentRecords::identity(mesh.tex_coords.len()),
                mesh.tex_coords.clone(),
            )
        } else {
            Default::default()
        };

        let mut simplifier = Self {
            positions: mesh.positions.clone(),
            tex_coords,
            include_tex,
            options,
            quadrics: compute_quadrics(&mesh.positions, &mesh.indices),
            queue: CollapseQueue::new(half_edges.len()),
            triangle_count: half_edges.valid_count() / 3,
            mesh: half_edges,
            vert_edges,
            tex_edges,
            vert_parents: ParentRecords::identity(mesh.positions.len()),
            tex_parents,
            postponed: Vec::new(),
            max_error: 0.0,
            stats: SimplifyStats {
                degenerate_removed: degenerate,
                ..Default::default()
            },
        };

        for id in 0..simplifier.mesh.len() as u32 {
            if simplifier.mesh.edge(id).valid {
                simplifier.update_edge(id);
            }
        }

        Ok(simplifier)
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    pub fn half_edges(&self) -> &HalfEdgeMesh {
        &self.mesh
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn tex_coords(&self) -> &[[f32; 2]] {
        &self.tex_coords
    }

    pub fn vert_parents(&self) -> &ParentRecords {
        &self.vert_parents
    }

    pub fn tex_parents(&self) -> &ParentRecords {
        &self.tex_parents
    }

    pub fn max_error(&self) -> f32 {
        self.max_error
    }

    pub fn stats(&self) -> SimplifyStats {
        self.stats
    }

    /// Number of edges waiting in the collapse queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn evaluate(&self, id: u32) -> CollapseCost {
        let edge = self.mesh.edge(id);

        let tex_counts = if self.include_tex {
            [self.mesh.tex_fan_count(id, 0), self.mesh.tex_fan_count(id, 1)]
        } else {
            [0, 0]
        };

        calculate_error(edge.vert, &self.positions, &self.quadrics, tex_counts)
    }

    fn update_edge(&mut self, id: u32) {
        let cost = self.evaluate(id);

        let edge = self.mesh.edge_mut(id);
        edge.err = cost.error;
        edge.pos = cost.pos;

        self.queue.insert(id, cost.error);
    }

    fn remove_triangle(&mut self, id: u32) {
        for removed in self.mesh.remove_triangle(id) {
            self.queue.remove(removed);
        }

        self.triangle_count -= 1;
    }

    fn neighbours(&self, v: u32) -> BTreeSet<u32> {
        self.vert_edges
            .get(v)
            .iter()
            .map(|id| self.mesh.edge(*id))
            .filter(|e| e.valid)
            .flat_map(|e| e.vert)
            .filter(|n| *n != v)
            .collect()
    }

    fn is_border_vertex(&self, v: u32) -> bool {
        self.vert_edges
            .get(v)
            .iter()
            .map(|id| self.mesh.edge(*id))
            .any(|e| e.valid && e.twin.is_none())
    }

    /// Checks whether collapsing `id` keeps the surface a 2-manifold.
    ///
    /// The endpoints may only share the vertices opposite the edge, and an interior edge may not join two border
    /// vertices.
    pub fn is_collapse_manifold(&self, id: u32) -> bool {
        let edge = self.mesh.edge(id);
        let [v0, v1] = edge.vert;

        let mut opposite = BTreeSet::new();
        opposite.insert(self.mesh.edge(edge.prev).vert[0]);

        if let Some(twin) = edge.twin {
            opposite.insert(self.mesh.edge(self.mesh.edge(twin).prev).vert[0]);

            if self.is_border_vertex(v0) && self.is_border_vertex(v1) {
                return false;
            }
        }

        let n0 = self.neighbours(v0);
        let n1 = self.neighbours(v1);

        n0.intersection(&n1).eq(opposite.iter())
    }

    // Moves texture coordinate `pair[1]` onto `pair[0]`.
    fn merge_tex(&mut self, pair: [u32; 2], t: f32, skip: u32) {
        let [keep, absorb] = pair;

        if keep == absorb {
            return;
        }

        self.tex_parents.collapse(keep, absorb, t);
        self.tex_coords[keep as usize] = lerp(self.tex_coords[keep as usize], self.tex_coords[absorb as usize], t);

        for id in self.tex_edges.take(absorb) {
            if id == skip || !self.mesh.edge(id).valid {
                continue;
            }

            let edge = self.mesh.edge_mut(id);

            for tex in &mut edge.tex {
                if *tex == absorb {
                    *tex = keep;
                }
            }

            self.tex_edges.insert(keep, id);
        }
    }

    /// Collapses the edge `id`, moving its origin to `pos` along the edge and merging the destination into it.
    ///
    /// Does nothing if the edge has already been removed.
    pub fn collapse_edge(&mut self, id: u32) {
        let edge = self.mesh.edge(id).clone();

        if !edge.valid {
            return;
        }

        let [v0, v1] = edge.vert;
        let t = edge.pos;

        // read before any repointing; a seam is only detectable on the untouched twin
        let twin_tex = edge.twin.map(|twin| self.mesh.edge(twin).tex);

        if v0 != v1 {
            let absorbed = self.quadrics[v1 as usize];
            self.quadrics[v0 as usize] += absorbed;

            self.vert_parents.collapse(v0, v1, t);
            self.positions[v0 as usize] = lerp(self.positions[v0 as usize], self.positions[v1 as usize], t);

            for moved in self.vert_edges.take(v1) {
                if moved == id || !self.mesh.edge(moved).valid {
                    continue;
                }

                let change = self.mesh.edge_mut(moved);

                for vert in &mut change.vert {
                    if *vert == v1 {
                        *vert = v0;
                    }
                }

                self.vert_edges.insert(v0, moved);
            }
        }

        if self.include_tex {
            self.merge_tex(edge.tex, t, id);

            if let Some(twin_tex) = twin_tex {
                if edge.tex[1] != twin_tex[0] && edge.tex[0] != twin_tex[1] {
                    self.merge_tex([twin_tex[1], twin_tex[0]], t, id);
                }
            }
        }

        self.remove_triangle(id);

        if let Some(twin) = edge.twin {
            if self.mesh.edge(twin).valid {
                self.remove_triangle(twin);
            }
        }

        let affected: Vec<u32> = self.vert_edges.get(v0).iter().copied().collect();

        for a in &affected {
            let e = self.mesh.edge(*a);

            if e.valid && e.vert[0] == e.vert[1] {
                self.remove_triangle(*a);
                self.stats.degenerate_removed += 1;
            }
        }

        self.vert_edges.prune(v0, &self.mesh);

        let affected: Vec<u32> = self.vert_edges.get(v0).iter().copied().collect();

        for a in affected {
            self.update_edge(a);
        }

        self.max_error = self.max_error.max(edge.err);
        self.stats.collapses += 1;
    }

    // Puts postponed edges back into the queue with fresh costs. Returns false when there was nothing to retry.
    fn retry_postponed(&mut self) -> bool {
        if self.postponed.is_empty() {
            return false;
        }

        for id in std::mem::take(&mut self.postponed) {
            if self.mesh.edge(id).valid {
                self.update_edge(id);
            }
        }

        true
    }

    /// Collapses edges until `target` is met or no allowed collapse is left.
    pub fn run(&mut self, target: SimplifyTarget) {
        let start = self.triangle_count;
        let mut progress = false;

        log::info!(
            "Collapsing edges... queue size: {} triangles: {start} target: {}",
            self.queue.len(),
            target.triangle_count,
        );

        while self.triangle_count > target.triangle_count {
            let next = self.queue.first().filter(|(err, _)| *err <= target.max_error);

            let Some((_, id)) = next else {
                // postponed edges only get another chance if something changed since they were set aside
                if progress && self.retry_postponed() {
                    progress = false;
                    continue;
                }

                break;
            };

            if !self.mesh.edge(id).valid {
                self.queue.pop_first();
                self.stats.stale_entries += 1;
                continue;
            }

            if !self.is_collapse_manifold(id) {
                self.stats.non_manifold += 1;

                if !self.options.contains(SimplifyOptions::ALLOW_NON_MANIFOLD) {
                    self.queue.remove(id);
                    self.postponed.push(id);
                    continue;
                }

                log::warn!("collapsing edge {id} produces a non-manifold configuration");
            }

            self.collapse_edge(id);
            progress = true;

            if self.stats.collapses % 1000 == 0 {
                let removed = start - self.triangle_count;
                let wanted = start.saturating_sub(target.triangle_count).max(1);

                log::debug!("Collapsing {}%...", removed * 100 / wanted);
            }
        }

        log::info!(
            "Done collapsing... queue size: {} triangles: {} max error: {}",
            self.queue.len(),
            self.triangle_count,
            self.max_error,
        );

        #[cfg(feature = "trace")]
        log::trace!(
            "collapses {}, stale entries {}, non-manifold {}, degenerate removed {}, postponed {}",
            self.stats.collapses,
            self.stats.stale_entries,
            self.stats.non_manifold,
            self.stats.degenerate_removed,
            self.postponed.len(),
        );
    }

    /// Walks the surviving half-edges and produces the current mesh.
    pub fn reconstruct(&self) -> SimplifiedMesh {
        let (mut indices, mut tex_indices) = self.mesh.reconstruct(self.include_tex);

        let mut resolved = self.vert_parents.resolve_orphans(&mut indices);

        if self.include_tex {
            resolved += self.tex_parents.resolve_orphans(&mut tex_indices);
        }

        if resolved > 0 {
            log::warn!("{resolved} indices referenced absorbed slots and were redirected");
        }

        SimplifiedMesh {
            positions: self.positions.clone(),
            tex_coords: self.tex_coords.clone(),
            indices,
            tex_indices,
            vert_parents: self.vert_parents.clone(),
            tex_parents: self.tex_parents.clone(),
            max_error: self.max_error,
            stats: self.stats,
        }
    }

    fn lod_level(&self) -> LodLevel {
        let vertex_targets = self
            .vert_parents
            .owners()
            .iter()
            .map(|owner| self.positions[*owner as usize])
            .collect();

        let tex_targets = self
            .tex_parents
            .owners()
            .iter()
            .map(|owner| self.tex_coords[*owner as usize])
            .collect();

        LodLevel {
            mesh: self.reconstruct(),
            vertex_targets,
            tex_targets,
        }
    }
}

/// Reduces the number of triangles in the mesh until `target` is met.
///
/// Stops early when every remaining collapse costs more than `target.max_error` or would break manifoldness (see
/// [SimplifyOptions::ALLOW_NON_MANIFOLD]).
///
/// # Example
///
/// ```
/// use meshlod_rs::Mesh;
/// use meshlod_rs::simplify::{simplify, SimplifyOptions, SimplifyTarget};
///
/// let positions = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
/// let mesh = Mesh::new(positions, vec![0, 1, 2, 0, 2, 3]);
///
/// let result = simplify(&mesh, SimplifyTarget::triangles(1), SimplifyOptions::empty()).unwrap();
///
/// assert_eq!(result.triangle_count(), 1);
/// ```
pub fn simplify(mesh: &Mesh, target: SimplifyTarget, options: SimplifyOptions) -> Result<SimplifiedMesh> {
    let mut simplifier = Simplifier::new(mesh, options)?;
    simplifier.run(target);

    Ok(simplifier.reconstruct())
}

/// One level of a LOD chain.
#[derive(Clone, Debug, Default)]
pub struct LodLevel {
    pub mesh: SimplifiedMesh,
    /// For every input vertex, the position of the vertex that absorbed it at this level
    pub vertex_targets: Vec<[f32; 3]>,
    /// For every input texture coordinate, the texture coordinate that absorbed it at this level
    pub tex_targets: Vec<[f32; 2]>,
}

/// Generates up to `levels` progressively coarser meshes from one collapse sequence.
///
/// The first level has at most half the input triangles, every following level at most half of the previous
/// threshold. Fewer levels are returned when simplification can't get below a threshold.
pub fn generate_lod_chain(mesh: &Mesh, levels: usize, options: SimplifyOptions) -> Result<Vec<LodLevel>> {
    let mut simplifier = Simplifier::new(mesh, options)?;

    let mut threshold = simplifier.triangle_count() / 2;
    let mut lods = Vec::with_capacity(levels);

    while lods.len() < levels {
        simplifier.run(SimplifyTarget::triangles(threshold));

        if simplifier.triangle_count() > threshold {
            log::info!(
                "LOD chain stopped after {} levels, {} triangles left above threshold {threshold}",
                lods.len(),
                simplifier.triangle_count(),
            );
            break;
        }

        lods.push(simplifier.lod_level());

        if threshold == 0 {
            break;
        }

        threshold /= 2;
    }

    log::info!("Simplification completed, {} LOD levels", lods.len());

    Ok(lods)
}
