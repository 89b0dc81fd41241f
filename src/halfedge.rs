//! Half-edge topology over an indexed triangle list
//!
//! All half-edges live in one flat arena and refer to each other by index. Removing a triangle only tombstones its
//! three edges (`valid = false`); nothing is ever deallocated or reordered, so an edge id stays usable as a handle
//! for the whole simplification.

use std::collections::BTreeSet;

/// Sentinel error for edges whose collapse cost has not been evaluated yet.
pub const UNDEFINED_ERROR: f32 = -1.0;

/// One directed edge of one triangle.
#[derive(Clone, Debug, PartialEq)]
pub struct HalfEdge {
    /// Origin and destination vertex
    pub vert: [u32; 2],
    /// Texture coordinates at origin and destination; all zeroes when texture coordinates aren't tracked
    pub tex: [u32; 2],
    /// Oppositely directed edge of the neighbouring triangle; `None` on a boundary
    pub twin: Option<u32>,
    pub next: u32,
    pub prev: u32,
    /// Where along the edge the merged vertex ends up, 0 = origin, 1 = destination
    pub pos: f32,
    /// Collapse cost
    pub err: f32,
    pub valid: bool,
    /// Index of this edge in the arena
    pub id: u32,
}

/// Summary of [HalfEdgeMesh::validate_twins].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TwinReport {
    /// Valid edges without a twin (mesh boundary)
    pub missing: usize,
    /// Valid edges whose twin does not point back or does not run in the opposite direction
    pub invalid: usize,
}

impl TwinReport {
    pub fn is_valid(&self) -> bool {
        self.invalid == 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct HalfEdgeMesh {
    edges: Vec<HalfEdge>,
}

#[inline]
fn canonical_key(edge: &HalfEdge) -> (u32, u32) {
    let [a, b] = edge.vert;
    (a.min(b), a.max(b))
}

impl HalfEdgeMesh {
    /// Builds three half-edges per triangle and links twins.
    ///
    /// `tex_indices` must be empty or have the same length as `indices`.
    pub fn build(indices: &[u32], tex_indices: &[u32]) -> Self {
        assert_eq!(indices.len() % 3, 0);
        assert!(tex_indices.is_empty() || tex_indices.len() == indices.len());

        let mut edges = Vec::with_capacity(indices.len());

        for (t, tri) in indices.chunks_exact(3).enumerate() {
            let base = t * 3;

            for j in 0..3 {
                let (a, b) = (base + j, base + (j + 1) % 3);

                edges.push(HalfEdge {
                    vert: [tri[j], tri[(j + 1) % 3]],
                    tex: if tex_indices.is_empty() {
                        [0, 0]
                    } else {
                        [tex_indices[a], tex_indices[b]]
                    },
                    twin: None,
                    next: (base + (j + 1) % 3) as u32,
                    prev: (base + (j + 2) % 3) as u32,
                    pos: 0.5,
                    err: UNDEFINED_ERROR,
                    valid: true,
                    id: (base + j) as u32,
                });
            }
        }

        let mut mesh = Self { edges };
        mesh.link_twins();
        mesh
    }

    // Sorting by the undirected (min, max) key makes twin candidates adjacent, so pairing is a single pass over
    // short runs. The id is part of the key so the pairing is the same on every run.
    fn link_twins(&mut self) {
        let mut order: Vec<u32> = (0..self.edges.len() as u32).collect();
        order.sort_unstable_by_key(|id| (canonical_key(&self.edges[*id as usize]), *id));

        let mut non_manifold = 0;
        let mut start = 0;

        while start < order.len() {
            let key = canonical_key(&self.edges[order[start] as usize]);

            let mut end = start + 1;
            while end < order.len() && canonical_key(&self.edges[order[end] as usize]) == key {
                end += 1;
            }

            if end - start > 2 {
                non_manifold += 1;
            }

            // self-loops can't have a twin
            if key.0 != key.1 {
                for i in start..end {
                    let a = order[i] as usize;

                    if self.edges[a].twin.is_some() {
                        continue;
                    }

                    let reversed = [self.edges[a].vert[1], self.edges[a].vert[0]];

                    let found = order[i + 1..end]
                        .iter()
                        .map(|id| *id as usize)
                        .find(|b| self.edges[*b].twin.is_none() && self.edges[*b].vert == reversed);

                    if let Some(b) = found {
                        self.edges[a].twin = Some(b as u32);
                        self.edges[b].twin = Some(a as u32);
                    }
                }
            }

            start = end;
        }

        if non_manifold > 0 {
            log::warn!("{non_manifold} edges are shared by more than two triangles; only one pair each is linked");
        }
    }

    /// Checks twin symmetry of all valid edges.
    pub fn validate_twins(&self) -> TwinReport {
        let mut report = TwinReport::default();

        for edge in self.edges.iter().filter(|e| e.valid) {
            match edge.twin {
                None => report.missing += 1,
                Some(twin) => {
                    let twin = &self.edges[twin as usize];

                    if !twin.valid || twin.twin != Some(edge.id) || twin.vert != [edge.vert[1], edge.vert[0]] {
                        report.invalid += 1;
                    }
                }
            }
        }

        report
    }

    pub fn edges(&self) -> &[HalfEdge] {
        &self.edges
    }

    #[inline]
    pub fn edge(&self, id: u32) -> &HalfEdge {
        &self.edges[id as usize]
    }

    #[inline]
    pub(crate) fn edge_mut(&mut self, id: u32) -> &mut HalfEdge {
        &mut self.edges[id as usize]
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.edges.iter().filter(|e| e.valid).count()
    }

    /// Number of distinct texture coordinates fanned around one end of an edge.
    ///
    /// `end` 0 walks around the origin via `prev.twin`, `end` 1 walks around the destination via `next.twin`. The walk
    /// stops at a boundary or when it gets back to the starting edge.
    pub fn tex_fan_count(&self, id: u32, end: usize) -> usize {
        let mut tex_ids = BTreeSet::new();
        let mut spin = id;

        // a damaged fan could cycle without returning to `id`
        for _ in 0..self.edges.len() {
            let edge = &self.edges[spin as usize];
            tex_ids.insert(edge.tex[end]);

            let step = if end == 0 { edge.prev } else { edge.next };

            match self.edges[step as usize].twin {
                Some(twin) if twin != id => spin = twin,
                _ => break,
            }
        }

        tex_ids.len()
    }

    /// Tombstones the triangle containing `id` and stitches the twins of its two other edges together.
    ///
    /// Returns the ids of the removed edges.
    pub(crate) fn remove_triangle(&mut self, id: u32) -> [u32; 3] {
        let next = self.edges[id as usize].next;
        let prev = self.edges[id as usize].prev;

        let removed = [id, next, prev];

        for r in removed {
            self.edges[r as usize].valid = false;
        }

        let next_twin = self.edges[next as usize].twin;
        let prev_twin = self.edges[prev as usize].twin;

        if let Some(nt) = next_twin {
            self.edges[nt as usize].twin = prev_twin;
        }

        if let Some(pt) = prev_twin {
            self.edges[pt as usize].twin = next_twin;
        }

        for r in removed {
            self.edges[r as usize].twin = None;
        }

        removed
    }

    /// Emits every surviving triangle exactly once.
    ///
    /// Returns the vertex index buffer and, if `include_tex` is set, the texture coordinate index buffer.
    pub fn reconstruct(&self, include_tex: bool) -> (Vec<u32>, Vec<u32>) {
        let mut added = vec![false; self.edges.len()];
        let mut indices = Vec::new();
        let mut tex_indices = Vec::new();

        for edge in &self.edges {
            if added[edge.id as usize] || !edge.valid {
                continue;
            }

            let next = &self.edges[edge.next as usize];
            let prev = &self.edges[edge.prev as usize];

            indices.extend_from_slice(&[edge.vert[0], next.vert[0], prev.vert[0]]);

            if include_tex {
                tex_indices.extend_from_slice(&[edge.tex[0], next.tex[0], prev.tex[0]]);
            }

            added[edge.id as usize] = true;
            added[next.id as usize] = true;
            added[prev.id as usize] = true;
        }

        (indices, tex_indices)
    }
}

/// Per-vertex (or per texture coordinate) sets of incident half-edges.
///
/// An edge is registered with both of its endpoints. Sets are ordered so that iteration order, and with it the
/// collapse order, is reproducible.
#[derive(Clone, Debug, Default)]
pub struct EdgeSets {
    sets: Vec<BTreeSet<u32>>,
}

impl EdgeSets {
    /// Builds the vertex adjacency of `mesh` over `count` vertices.
    pub fn vertices(mesh: &HalfEdgeMesh, count: usize) -> Self {
        Self::collect(mesh, count, |e| e.vert)
    }

    /// Builds the texture coordinate adjacency of `mesh` over `count` texture coordinates.
    pub fn tex_coords(mesh: &HalfEdgeMesh, count: usize) -> Self {
        Self::collect(mesh, count, |e| e.tex)
    }

    fn collect<F>(mesh: &HalfEdgeMesh, count: usize, ends: F) -> Self
    where
        F: Fn(&HalfEdge) -> [u32; 2],
    {
        let mut sets = vec![BTreeSet::new(); count];

        for edge in mesh.edges().iter().filter(|e| e.valid) {
            for v in ends(edge) {
                sets[v as usize].insert(edge.id);
            }
        }

        Self { sets }
    }

    pub fn get(&self, index: u32) -> &BTreeSet<u32> {
        &self.sets[index as usize]
    }

    pub fn insert(&mut self, index: u32, edge: u32) {
        self.sets[index as usize].insert(edge);
    }

    pub fn take(&mut self, index: u32) -> BTreeSet<u32> {
        std::mem::take(&mut self.sets[index as usize])
    }

    /// Drops edges that have been removed since they were registered.
    pub fn prune(&mut self, index: u32, mesh: &HalfEdgeMesh) {
        self.sets[index as usize].retain(|e| mesh.edge(*e).valid);
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // 0 - 1
    // | \ |
    // 3 - 2
    const QUAD: [u32; 6] = [0, 1, 2, 0, 2, 3];

    #[rustfmt::skip]
    const CUBE: [u32; 36] = [
        0, 2, 1, 0, 3, 2, // bottom
        4, 5, 6, 4, 6, 7, // top
        0, 1, 5, 0, 5, 4, // front
        1, 2, 6, 1, 6, 5, // right
        2, 3, 7, 2, 7, 6, // back
        3, 0, 4, 3, 4, 7, // left
    ];

    fn assert_symmetric(mesh: &HalfEdgeMesh) {
        for edge in mesh.edges() {
            if let Some(twin) = edge.twin {
                assert_eq!(mesh.edge(twin).twin, Some(edge.id));
            }
        }
    }

    #[test]
    fn test_build_quad() {
        let mesh = HalfEdgeMesh::build(&QUAD, &[]);

        assert_eq!(mesh.len(), 6);
        assert_eq!(mesh.valid_count(), 6);

        // 0->1->2 cycle
        assert_eq!(mesh.edge(0).vert, [0, 1]);
        assert_eq!(mesh.edge(0).next, 1);
        assert_eq!(mesh.edge(0).prev, 2);
        assert_eq!(mesh.edge(2).vert, [2, 0]);

        // 2->0 is shared with 0->2 of the second triangle
        assert_eq!(mesh.edge(2).twin, Some(3));
        assert_eq!(mesh.edge(3).twin, Some(2));

        assert_eq!(mesh.validate_twins(), TwinReport { missing: 4, invalid: 0 });
        assert_symmetric(&mesh);
    }

    #[test]
    fn test_build_closed() {
        let mesh = HalfEdgeMesh::build(&CUBE, &[]);

        assert_eq!(mesh.len(), 36);
        assert_eq!(mesh.validate_twins(), TwinReport { missing: 0, invalid: 0 });
        assert_symmetric(&mesh);

        for edge in mesh.edges() {
            let twin = mesh.edge(edge.twin.unwrap());
            assert_eq!(twin.vert, [edge.vert[1], edge.vert[0]]);
        }
    }

    #[test]
    fn test_build_non_manifold() {
        // three triangles share the 0-1 edge; only one pair gets linked and the result stays symmetric
        let indices = [0, 1, 2, 1, 0, 3, 0, 1, 4];
        let mesh = HalfEdgeMesh::build(&indices, &[]);

        assert_eq!(mesh.edge(0).twin, Some(3));
        assert_eq!(mesh.edge(3).twin, Some(0));
        assert_eq!(mesh.edge(6).twin, None);
        assert!(mesh.validate_twins().is_valid());
        assert_symmetric(&mesh);
    }

    #[test]
    fn test_remove_triangle() {
        // fan of three triangles around vertex 0
        // removing the middle one should stitch its outer neighbours together
        let indices = [0, 1, 2, 0, 2, 3, 0, 3, 4];
        let mut mesh = HalfEdgeMesh::build(&indices, &[]);

        // edges of the middle triangle: 3 = 0->2, 4 = 2->3, 5 = 3->0
        assert_eq!(mesh.edge(3).twin, Some(2));
        assert_eq!(mesh.edge(5).twin, Some(6));

        // collapsing 2->3 (edge 4) removes the middle triangle
        let removed = mesh.remove_triangle(4);
        assert_eq!(removed, [4, 5, 3]);

        assert_eq!(mesh.valid_count(), 6);
        assert_eq!(mesh.edge(2).twin, Some(6));
        assert_eq!(mesh.edge(6).twin, Some(2));
        assert!(removed.iter().all(|r| mesh.edge(*r).twin.is_none()));
        assert_symmetric(&mesh);

        let (indices, tex_indices) = mesh.reconstruct(false);
        assert_eq!(indices, vec![0, 1, 2, 0, 3, 4]);
        assert!(tex_indices.is_empty());
    }

    #[test]
    fn test_tex_fan_count() {
        // two triangles sharing the 0-2 diagonal, with a UV seam along it
        let tex_indices = [0, 1, 2, 3, 4, 5];
        let mesh = HalfEdgeMesh::build(&QUAD, &tex_indices);

        // origin fan of 0->1 crosses the diagonal into the second triangle, seeing tex 0 and tex 3
        assert_eq!(mesh.tex_fan_count(0, 0), 2);
        // destination fan of 1->2 crosses the diagonal too, seeing tex 2 and tex 4
        assert_eq!(mesh.tex_fan_count(1, 1), 2);
        // destination fan of 0->2 continues over 2->3, which is a boundary
        assert_eq!(mesh.tex_fan_count(3, 1), 1);

        // without a seam the same walks see one coordinate per vertex
        let welded_tex = [0, 1, 2, 0, 2, 3];
        let mesh = HalfEdgeMesh::build(&QUAD, &welded_tex);

        assert_eq!(mesh.tex_fan_count(0, 0), 1);
        assert_eq!(mesh.tex_fan_count(1, 1), 1);
    }

    #[test]
    fn test_reconstruct_tex() {
        let tex_indices = [5, 6, 7, 5, 7, 8];
        let mesh = HalfEdgeMesh::build(&QUAD, &tex_indices);

        let (indices, tex) = mesh.reconstruct(true);
        assert_eq!(indices, QUAD.to_vec());
        assert_eq!(tex, tex_indices.to_vec());
    }

    #[test]
    fn test_edge_sets() {
        let mesh = HalfEdgeMesh::build(&QUAD, &[]);
        let mut sets = EdgeSets::vertices(&mesh, 4);

        assert_eq!(sets.len(), 4);
        // vertex 0 touches 0->1, 2->0, 0->2, 3->0
        assert_eq!(sets.get(0).iter().copied().collect::<Vec<_>>(), vec![0, 2, 3, 5]);
        assert_eq!(sets.get(1).len(), 2);

        let taken = sets.take(1);
        assert_eq!(taken.len(), 2);
        assert!(sets.get(1).is_empty());
    }
}
