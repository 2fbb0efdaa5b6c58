//! Partition renumbering.

use super::{OrderingError, PositionAllocator};

/// A key and the position it receives from a rebalance.
#[derive(Debug, Clone, PartialEq)]
pub struct Renumbered<K> {
    pub key: K,
    pub position: f64,
}

/// Result of [`PositionAllocator::plan_insertion`]: every existing key with its
/// new position, plus the position for the inserted item.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertionPlan<K> {
    pub renumbered: Vec<Renumbered<K>>,
    pub position: f64,
}

impl PositionAllocator {
    /// Reassign positions `base, base + step, base + 2 * step, ...` in the
    /// order given, ignoring whatever positions the keys held before.
    pub fn rebalance<K, I>(&self, ordered: I) -> Vec<Renumbered<K>>
    where
        I: IntoIterator<Item = K>,
    {
        ordered
            .into_iter()
            .enumerate()
            .map(|(index, key)| Renumbered {
                key,
                position: self.base + index as f64 * self.step,
            })
            .collect()
    }

    /// Renumber `ordered` and compute the position for an item inserted at
    /// `slot` (0 = before the first key, `len` = after the last one).
    ///
    /// `slot` is clamped to the length of the list.
    pub fn plan_insertion<K>(
        &self,
        ordered: Vec<K>,
        slot: usize,
    ) -> Result<InsertionPlan<K>, OrderingError> {
        let renumbered = self.rebalance(ordered);
        let slot = slot.min(renumbered.len());

        let prev = slot
            .checked_sub(1)
            .and_then(|i| renumbered.get(i))
            .map(|r| r.position);
        let next = renumbered.get(slot).map(|r| r.position);

        let position = self.compute_position(prev, next)?;
        Ok(InsertionPlan {
            renumbered,
            position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::{DEFAULT_BASE, DEFAULT_STEP};
    use proptest::prelude::*;

    #[test]
    fn test_rebalance_empty() {
        let out: Vec<Renumbered<u32>> = PositionAllocator::default().rebalance(Vec::new());
        assert!(out.is_empty());
    }

    #[test]
    fn test_rebalance_assigns_fixed_steps() {
        let out = PositionAllocator::default().rebalance(vec!["a", "b", "c"]);
        let positions: Vec<f64> = out.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1000.0, 2000.0, 3000.0]);
        assert_eq!(out[1].key, "b");
    }

    #[test]
    fn test_plan_insertion_between_collided_keys() {
        // a and b collided at the same position; after renumbering the new
        // item goes between them.
        let plan = PositionAllocator::default()
            .plan_insertion(vec!["a", "b"], 1)
            .unwrap();
        assert_eq!(plan.renumbered[0].position, 1000.0);
        assert_eq!(plan.renumbered[1].position, 2000.0);
        assert_eq!(plan.position, 1500.0);
    }

    #[test]
    fn test_plan_insertion_at_front() {
        let plan = PositionAllocator::default()
            .plan_insertion(vec![1, 2, 3], 0)
            .unwrap();
        assert_eq!(plan.position, 500.0);
    }

    #[test]
    fn test_plan_insertion_at_end_and_clamped() {
        let allocator = PositionAllocator::default();
        let plan = allocator.plan_insertion(vec![1, 2], 2).unwrap();
        assert_eq!(plan.position, 3000.0);

        let clamped = allocator.plan_insertion(vec![1, 2], 99).unwrap();
        assert_eq!(clamped.position, 3000.0);
    }

    #[test]
    fn test_plan_insertion_into_empty_list() {
        let plan = PositionAllocator::default()
            .plan_insertion(Vec::<u8>::new(), 0)
            .unwrap();
        assert!(plan.renumbered.is_empty());
        assert_eq!(plan.position, 1000.0);
    }

    proptest! {
        #[test]
        fn prop_rebalance_is_strictly_increasing(
            old in proptest::collection::vec(any::<f64>(), 0..200)
        ) {
            let out = PositionAllocator::default().rebalance(old);
            for (i, r) in out.iter().enumerate() {
                prop_assert_eq!(r.position, DEFAULT_BASE + i as f64 * DEFAULT_STEP);
            }
            for pair in out.windows(2) {
                prop_assert!(pair[0].position < pair[1].position);
            }
        }

        #[test]
        fn prop_plan_insertion_lands_inside_slot(len in 0usize..100, slot in 0usize..120) {
            let keys: Vec<usize> = (0..len).collect();
            let plan = PositionAllocator::default().plan_insertion(keys, slot).unwrap();
            let slot = slot.min(len);
            if slot > 0 {
                prop_assert!(plan.position > plan.renumbered[slot - 1].position);
            }
            if slot < len {
                prop_assert!(plan.position < plan.renumbered[slot].position);
            }
        }
    }
}
