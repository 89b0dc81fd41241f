//! Parent records
//!
//! Every vertex slot (and texture coordinate slot) keeps the list of source slots it absorbed, with blend weights.
//! Slots start out as their own single parent with weight 1. A collapse at position `t` scales the surviving list
//! by `1 - t`, the absorbed list by `t`, and moves the absorbed entries over, leaving the absorbed slot empty.

use crate::INVALID_INDEX;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParentRecord {
    /// Source slot
    pub id: u32,
    pub weight: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParentRecords {
    lists: Vec<Vec<ParentRecord>>,
}

impl ParentRecords {
    /// Every slot is its own parent.
    pub fn identity(count: usize) -> Self {
        Self {
            lists: (0..count as u32)
                .map(|id| vec![ParentRecord { id, weight: 1.0 }])
                .collect(),
        }
    }

    pub fn get(&self, slot: u32) -> &[ParentRecord] {
        &self.lists[slot as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[ParentRecord]> {
        self.lists.iter().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Merges `absorb` into `keep` with the collapse position `t`.
    pub fn collapse(&mut self, keep: u32, absorb: u32, t: f32) {
        if keep == absorb {
            return;
        }

        let mut absorbed = std::mem::take(&mut self.lists[absorb as usize]);

        for record in &mut absorbed {
            record.weight *= t;
        }

        let kept = &mut self.lists[keep as usize];

        for record in kept.iter_mut() {
            record.weight *= 1.0 - t;
        }

        kept.append(&mut absorbed);
    }

    pub fn weight_sum(&self, slot: u32) -> f32 {
        self.lists[slot as usize].iter().map(|r| r.weight).sum()
    }

    /// True for slots that were absorbed by a collapse.
    pub fn is_orphan(&self, slot: u32) -> bool {
        self.lists[slot as usize].is_empty()
    }

    /// For each source slot, the slot whose list holds it.
    pub fn owners(&self) -> Vec<u32> {
        let mut owners = vec![INVALID_INDEX; self.lists.len()];

        for (slot, list) in self.lists.iter().enumerate() {
            for record in list {
                owners[record.id as usize] = slot as u32;
            }
        }

        owners
    }

    /// Redirects indices pointing at absorbed slots to the slot that absorbed them.
    ///
    /// Returns the number of indices changed.
    pub fn resolve_orphans(&self, indices: &mut [u32]) -> usize {
        let owners = self.owners();
        let mut resolved = 0;

        for index in indices.iter_mut() {
            if self.is_orphan(*index) {
                *index = owners[*index as usize];
                resolved += 1;
            }
        }

        resolved
    }

    /// Blends a per-source attribute through the parent list of `slot`.
    pub fn blend<const N: usize>(&self, slot: u32, source: &[[f32; N]]) -> [f32; N] {
        let mut result = [0.0; N];

        for record in &self.lists[slot as usize] {
            for (r, s) in result.iter_mut().zip(source[record.id as usize].iter()) {
                *r += s * record.weight;
            }
        }

        result
    }

    /// Keeps only the lists of `slots`, in that order.
    pub(crate) fn select(&self, slots: &[u32]) -> Self {
        Self {
            lists: slots.iter().map(|s| self.lists[*s as usize].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_collapse_weights() {
        let mut parents = ParentRecords::identity(4);

        parents.collapse(0, 1, 0.25);

        assert_eq!(
            parents.get(0),
            &[ParentRecord { id: 0, weight: 0.75 }, ParentRecord { id: 1, weight: 0.25 }]
        );
        assert!(parents.is_orphan(1));

        parents.collapse(2, 0, 0.5);
        parents.collapse(2, 3, 0.5);

        assert!((parents.weight_sum(2) - 1.0).abs() < 1e-6);
        assert_eq!(parents.get(2).len(), 4);
        assert!(parents.is_orphan(0));

        // self-collapse is a no-op
        let before = parents.clone();
        parents.collapse(2, 2, 0.3);
        assert_eq!(parents, before);
    }

    #[test]
    fn test_owners_and_orphans() {
        let mut parents = ParentRecords::identity(3);
        parents.collapse(2, 0, 1.0);

        assert_eq!(parents.owners(), vec![2, 1, 2]);

        let mut indices = [0, 1, 2];
        assert_eq!(parents.resolve_orphans(&mut indices), 1);
        assert_eq!(indices, [2, 1, 2]);
    }

    #[test]
    fn test_blend() {
        let mut parents = ParentRecords::identity(2);
        parents.collapse(0, 1, 0.25);

        let source = [[0.0, 4.0], [4.0, 0.0]];

        assert_eq!(parents.blend(0, &source), [1.0, 3.0]);
        assert_eq!(parents.blend(1, &source), [0.0, 0.0]);
    }
}
