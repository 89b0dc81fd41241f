//! K-means point clustering
//!
//! Points are grouped into `ceil(n / density)` clusters. The kd-tree over the points narrows each leaf down to the
//! clusters that can be nearest to something inside it, so reassignment only measures against a handful of centers
//! per point.

use crate::error::{Error, Result};
use crate::kdtree::KdTree;
use crate::util::zero_inverse;
use crate::{Position, Vector3};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Upper bound on reassignment rounds
pub const MAX_ITERATIONS: usize = 100;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Clustering {
    /// Cluster of every input point
    pub assignments: Vec<u32>,
    pub centers: Vec<[f32; 3]>,
    /// Reassignment rounds run
    pub iterations: usize,
}

impl Clustering {
    pub fn cluster_count(&self) -> usize {
        self.centers.len()
    }

    /// Point indices of every cluster.
    pub fn members(&self) -> Vec<Vec<u32>> {
        let mut members = vec![Vec::new(); self.centers.len()];

        for (point, cluster) in self.assignments.iter().enumerate() {
            members[*cluster as usize].push(point as u32);
        }

        members
    }
}

// Mean of every cluster's points. Clusters that lost all their points are moved onto a random point.
fn compute_centers(points: &[[f32; 3]], assignments: &[u32], cluster_count: usize, rng: &mut Pcg32) -> Vec<[f32; 3]> {
    let mut sums = vec![[0.0f32; 3]; cluster_count];
    let mut counts = vec![0usize; cluster_count];

    for (point, cluster) in points.iter().zip(assignments.iter()) {
        let sum = &mut sums[*cluster as usize];

        for k in 0..3 {
            sum[k] += point[k];
        }

        counts[*cluster as usize] += 1;
    }

    sums.iter()
        .zip(counts.iter())
        .map(|(sum, &count)| {
            if count == 0 {
                return points[rng.gen_range(0..points.len())];
            }

            let scale = zero_inverse(count as f32);

            [sum[0] * scale, sum[1] * scale, sum[2] * scale]
        })
        .collect()
}

/// Clusters `points` so that each cluster holds about `cluster_density` of them.
///
/// `seed` drives the initial assignment and the tree construction; equal seeds give equal results.
pub fn cluster_points<P>(points: &[P], cluster_density: usize, seed: u64) -> Result<Clustering>
where
    P: Position,
{
    if cluster_density == 0 {
        return Err(Error::ZeroClusterDensity);
    }

    if points.is_empty() {
        return Ok(Clustering::default());
    }

    let points: Vec<[f32; 3]> = points.iter().map(Position::pos).collect();
    let cluster_count = (points.len() - 1) / cluster_density + 1;

    let mut rng = Pcg32::seed_from_u64(seed);
    let mut tree = KdTree::build(&points, seed);

    let mut assignments: Vec<u32> = (0..points.len())
        .map(|_| rng.gen_range(0..cluster_count as u32))
        .collect();

    let candidates: Vec<u32> = (0..cluster_count as u32).collect();

    let mut centers = compute_centers(&points, &assignments, cluster_count, &mut rng);
    let mut iterations = 0;

    loop {
        tree.get_closest_clusters(&centers, &candidates);

        let mut changed = 0;

        for (point, assignment) in points.iter().zip(assignments.iter_mut()) {
            let p = Vector3::from(*point);
            let leaf = tree.get_leaf(*point);

            let mut best = *assignment;
            let mut best_distance = p.distance_squared(&Vector3::from(centers[best as usize]));

            for &cluster in &leaf.cluster_info.closest_clusters {
                let distance = p.distance_squared(&Vector3::from(centers[cluster as usize]));

                if distance < best_distance {
                    best = cluster;
                    best_distance = distance;
                }
            }

            if best != *assignment {
                *assignment = best;
                changed += 1;
            }
        }

        iterations += 1;

        if changed == 0 {
            break;
        }

        centers = compute_centers(&points, &assignments, cluster_count, &mut rng);

        if iterations >= MAX_ITERATIONS {
            log::warn!("Clustering stopped after {iterations} iterations with {changed} points still moving");
            break;
        }
    }

    log::info!(
        "Clustering completed after {} iterations: {} points in {} clusters",
        iterations,
        points.len(),
        cluster_count
    );

    Ok(Clustering {
        assignments,
        centers,
        iterations,
    })
}
