//! KD-tree over point sets for approximate nearest cluster queries
//!
//! The tree splits on x, y and z in turn at an estimated median. Every node keeps two boxes: `bounds` is the region
//! the split planes carve out, `content_bounds` is the tight box of the points that ended up in the node.
//!
//! [KdTree::get_closest_clusters] pushes a list of cluster candidates down the tree, dropping candidates that can't
//! be the nearest for anything inside a node, so a point only has to be compared against the candidates of its leaf.

use crate::{Position, Vector3};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Nodes with fewer points are leaves
pub const SPLIT_THRESHOLD: usize = 4;

/// Nodes with more points estimate the median from this many random picks
pub const MEDIAN_SAMPLE_COUNT: usize = 20;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    /// Tight bounds of `points`, `None` when empty.
    pub fn from_points<P>(points: &[P]) -> Option<Self>
    where
        P: Position,
    {
        let first = points.first()?.pos();

        let mut result = Self { min: first, max: first };

        for point in points {
            let p = point.pos();

            for j in 0..3 {
                result.min[j] = result.min[j].min(p[j]);
                result.max[j] = result.max[j].max(p[j]);
            }
        }

        Some(result)
    }

    /// Inclusive on all faces.
    pub fn contains(&self, p: [f32; 3]) -> bool {
        (0..3).all(|j| p[j] >= self.min[j] && p[j] <= self.max[j])
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// One of the 8 corners: bit 2 picks x, bit 0 picks y, bit 1 picks z.
    pub fn corner(&self, j: usize) -> [f32; 3] {
        let pick = |bit: usize, axis: usize| if (j >> bit) & 1 == 0 { self.min[axis] } else { self.max[axis] };

        [pick(2, 0), pick(0, 1), pick(1, 2)]
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterInfo {
    /// Clusters that may be the nearest one for some point in the node's content bounds
    pub closest_clusters: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct KdNode {
    pub bounds: Aabb,
    pub content_bounds: Aabb,
    /// Split axis (0, 1, 2), cycling with depth
    pub axis: usize,
    /// Points with `p[axis] <= plane_coord` go to `child[0]`, the rest to `child[1]`
    pub plane_coord: f32,
    pub child: Option<Box<[KdNode; 2]>>,
    pub cluster_info: ClusterInfo,
    pub point_count: usize,
}

fn distance_squared(a: [f32; 3], b: [f32; 3]) -> f32 {
    Vector3::from(a).distance_squared(&Vector3::from(b))
}

// Split coordinate along `axis`: the exact median for small sets, the median of a random sample otherwise.
// The result is always the coordinate of one of the points.
fn estimate_median(points: &[[f32; 3]], axis: usize, rng: &mut Pcg32) -> f32 {
    let mut coords: Vec<f32> = if points.len() > MEDIAN_SAMPLE_COUNT {
        (0..MEDIAN_SAMPLE_COUNT)
            .map(|_| points[rng.gen_range(0..points.len())][axis])
            .collect()
    } else {
        points.iter().map(|p| p[axis]).collect()
    };

    coords.sort_unstable_by(f32::total_cmp);

    coords[coords.len() / 2]
}

impl KdNode {
    fn leaf(bounds: Aabb, content_bounds: Aabb, axis: usize, point_count: usize) -> Self {
        Self {
            bounds,
            content_bounds,
            axis,
            plane_coord: 0.0,
            child: None,
            cluster_info: ClusterInfo::default(),
            point_count,
        }
    }

    fn build(bounds: Aabb, points: Vec<[f32; 3]>, depth: usize, rng: &mut Pcg32) -> Self {
        let axis = depth % 3;

        let Some(content_bounds) = Aabb::from_points(&points) else {
            return Self::leaf(bounds, bounds, axis, 0);
        };

        if points.len() < SPLIT_THRESHOLD || content_bounds.min == content_bounds.max {
            return Self::leaf(bounds, content_bounds, axis, points.len());
        }

        let mut plane_coord = estimate_median(&points, axis, rng);

        // keep the upper side non-empty by moving the plane below the largest coordinate; on a flat axis there's
        // nothing to split and the upper side stays empty
        let top = content_bounds.max[axis];

        if plane_coord >= top {
            if let Some(below) = points.iter().map(|p| p[axis]).filter(|c| *c < top).max_by(f32::total_cmp) {
                plane_coord = below;
            }
        }

        let point_count = points.len();
        let (lower, upper): (Vec<[f32; 3]>, Vec<[f32; 3]>) = points.into_iter().partition(|p| p[axis] <= plane_coord);

        let mut lower_bounds = bounds;
        lower_bounds.max[axis] = plane_coord;

        let mut upper_bounds = bounds;
        upper_bounds.min[axis] = plane_coord;

        Self {
            bounds,
            content_bounds,
            axis,
            plane_coord,
            child: Some(Box::new([
                Self::build(lower_bounds, lower, depth + 1, rng),
                Self::build(upper_bounds, upper, depth + 1, rng),
            ])),
            cluster_info: ClusterInfo::default(),
            point_count,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.child.is_none()
    }

    pub fn leaf_count(&self) -> usize {
        match &self.child {
            Some(children) => children.iter().map(KdNode::leaf_count).sum(),
            None => 1,
        }
    }

    fn update_closest_clusters(&mut self, centers: &[[f32; 3]], candidates: &[u32]) {
        let closest = &mut self.cluster_info.closest_clusters;
        closest.clear();

        if self.point_count == 0 || candidates.is_empty() {
            return;
        }

        if candidates.len() == 1 {
            closest.push(candidates[0]);
        } else {
            let node_center = self.content_bounds.center();

            let (nearest_index, nearest) = candidates
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let da = distance_squared(node_center, centers[**a as usize]);
                    let db = distance_squared(node_center, centers[**b as usize]);
                    da.total_cmp(&db)
                })
                .map(|(i, c)| (i, *c))
                .unwrap_or((0, candidates[0]));

            closest.push(nearest);

            let nearest_pos = centers[nearest as usize];

            for (i, candidate) in candidates.iter().enumerate() {
                if i == nearest_index {
                    continue;
                }

                let other_pos = centers[*candidate as usize];

                // conservative: keep the candidate if it is inside the content or wins at any corner
                let keep = self.content_bounds.contains(other_pos)
                    || (0..8).any(|j| {
                        let corner = self.content_bounds.corner(j);
                        distance_squared(corner, other_pos) < distance_squared(corner, nearest_pos)
                    });

                if keep {
                    closest.push(*candidate);
                }
            }
        }

        if let Some(children) = &mut self.child {
            let narrowed = self.cluster_info.closest_clusters.clone();

            for child in children.iter_mut() {
                child.update_closest_clusters(centers, &narrowed);
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct KdTree {
    root: KdNode,
}

impl KdTree {
    /// Builds the tree over `points`. `seed` drives the median sampling, equal seeds give equal trees.
    pub fn build<P>(points: &[P], seed: u64) -> Self
    where
        P: Position,
    {
        let mut rng = Pcg32::seed_from_u64(seed);

        let points: Vec<[f32; 3]> = points.iter().map(Position::pos).collect();
        let bounds = Aabb::from_points(&points).unwrap_or_default();

        let root = KdNode::build(bounds, points, 0, &mut rng);

        log::debug!("built kd-tree over {} points with {} leaves", root.point_count, root.leaf_count());

        Self { root }
    }

    pub fn root(&self) -> &KdNode {
        &self.root
    }

    /// Descends to the leaf whose bounds contain `point`.
    ///
    /// Points outside the tree's bounds are a caller error; it is logged and the root is returned.
    pub fn get_leaf(&self, point: [f32; 3]) -> &KdNode {
        if !self.root.bounds.contains(point) {
            log::error!("get_leaf failure: {point:?} is outside of {:?}", self.root.bounds);
            return &self.root;
        }

        let mut node = &self.root;

        while let Some(children) = &node.child {
            node = if children[0].bounds.contains(point) {
                &children[0]
            } else {
                &children[1]
            };
        }

        node
    }

    /// Fills `cluster_info` of every node with the clusters out of `candidates` that may be nearest to some point
    /// inside it.
    pub fn get_closest_clusters(&mut self, centers: &[[f32; 3]], candidates: &[u32]) {
        self.root.update_closest_clusters(centers, candidates);
    }
}
