//! Attribute transfer through parent records
//!
//! After simplification every surviving vertex knows which source vertices it absorbed and with what weight, so
//! per-vertex data that wasn't part of the simplification (normals, colors, skinning) can be rebuilt for it.

use crate::parents::{ParentRecord, ParentRecords};

/// Bone influences per vertex
pub const MAX_BONES: usize = 4;

/// Blends a per-source attribute for every slot of `parents`.
///
/// Absorbed slots get all zeroes.
pub fn blend_attribute<const N: usize>(parents: &ParentRecords, source: &[[f32; N]]) -> Vec<[f32; N]> {
    (0..parents.len() as u32).map(|slot| parents.blend(slot, source)).collect()
}

/// Combines the skinning of all source vertices in `parents`.
///
/// Influences of the same bone are summed, the heaviest [MAX_BONES] are kept and renormalized to 1. Unused
/// influences are bone 0 with weight 0.
pub fn transfer_bone_weights(
    parents: &[ParentRecord],
    bone_ids: &[[u32; MAX_BONES]],
    bone_weights: &[[f32; MAX_BONES]],
) -> ([u32; MAX_BONES], [f32; MAX_BONES]) {
    let mut accumulated: Vec<(u32, f32)> = Vec::new();

    for parent in parents.iter().filter(|p| p.weight > 0.0) {
        let source = parent.id as usize;

        for (id, weight) in bone_ids[source].iter().zip(bone_weights[source].iter()) {
            let weight = weight * parent.weight;

            if weight <= 0.0 {
                continue;
            }

            match accumulated.iter_mut().find(|(b, _)| b == id) {
                Some((_, w)) => *w += weight,
                None => accumulated.push((*id, weight)),
            }
        }
    }

    // heaviest first, lower bone id on ties
    accumulated.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    accumulated.truncate(MAX_BONES);

    let total: f32 = accumulated.iter().map(|(_, w)| w).sum();

    let mut ids = [0; MAX_BONES];
    let mut weights = [0.0; MAX_BONES];

    for (i, (id, weight)) in accumulated.into_iter().enumerate() {
        ids[i] = id;
        weights[i] = weight / total;
    }

    (ids, weights)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_blend_attribute() {
        let mut parents = ParentRecords::identity(3);
        parents.collapse(0, 2, 0.5);

        let normals = [[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]];
        let blended = blend_attribute(&parents, &normals);

        assert_eq!(blended, vec![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_transfer_bone_weights() {
        let bone_ids = [[1, 2, 0, 0], [2, 3, 4, 5]];
        let bone_weights = [[0.5, 0.5, 0.0, 0.0], [0.4, 0.3, 0.2, 0.1]];

        let parents = [ParentRecord { id: 0, weight: 0.5 }, ParentRecord { id: 1, weight: 0.5 }];

        let (ids, weights) = transfer_bone_weights(&parents, &bone_ids, &bone_weights);

        // bone 2 is shared: 0.25 + 0.2; bone 5 (0.05) is the lightest and gets dropped
        assert_eq!(ids, [2, 1, 3, 4]);

        let total = 0.45 + 0.25 + 0.15 + 0.1;
        let expected = [0.45 / total, 0.25 / total, 0.15 / total, 0.1 / total];

        for (w, e) in weights.iter().zip(expected.iter()) {
            assert!((w - e).abs() < 1e-5);
        }

        assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_transfer_single_parent() {
        let bone_ids = [[7, 0, 0, 0]];
        let bone_weights = [[1.0, 0.0, 0.0, 0.0]];

        let (ids, weights) = transfer_bone_weights(&[ParentRecord { id: 0, weight: 1.0 }], &bone_ids, &bone_weights);

        assert_eq!(ids, [7, 0, 0, 0]);
        assert_eq!(weights, [1.0, 0.0, 0.0, 0.0]);

        let (ids, weights) = transfer_bone_weights(&[], &bone_ids, &bone_weights);

        assert_eq!(ids, [0; MAX_BONES]);
        assert_eq!(weights, [0.0; MAX_BONES]);
    }
}
