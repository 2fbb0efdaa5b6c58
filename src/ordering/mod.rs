//! Fractional positions for tasks inside a status column.
//!
//! Every task carries an `f64` position that orders it within its partition
//! (one project's column for one status). Placing a task computes a fresh
//! position from its neighbours so that only the moved task is rewritten in
//! the common case:
//!
//! | prev    | next    | position              |
//! |---------|---------|-----------------------|
//! | absent  | absent  | `base`                |
//! | absent  | present | `next / 2`            |
//! | present | absent  | `prev + step`         |
//! | present | present | `(prev + next) / 2`   |
//!
//! Repeated bisection between the same two neighbours halves the gap each time,
//! so with doubles the midpoint eventually collapses onto one of the bounds.
//! The allocator never hands back such a value: it reports
//! [`OrderingError::PrecisionExhausted`] and the caller renumbers the partition
//! with [`PositionAllocator::rebalance`] / [`PositionAllocator::plan_insertion`].

mod rebalance;

pub use rebalance::{InsertionPlan, Renumbered};

use thiserror::Error;

/// Position given to the first task of an empty partition.
pub const DEFAULT_BASE: f64 = 1000.0;

/// Gap left after the last task on append, and between tasks after a rebalance.
pub const DEFAULT_STEP: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum OrderingError {
    /// Both neighbours were supplied but `prev >= next`. Equal neighbours are the
    /// usual symptom of two concurrent moves that read the same snapshot.
    #[error("neighbor positions out of order: prev {prev} is not below next {next}")]
    InvalidNeighborOrder { prev: f64, next: f64 },

    /// The computed value is not strictly inside its bounds.
    #[error("no representable position between {lower:?} and {upper:?}")]
    PrecisionExhausted {
        lower: Option<f64>,
        upper: Option<f64>,
    },

    #[error("non-finite neighbor position: {0}")]
    NonFinite(f64),

    #[error("invalid allocator constants: base {base}, step {step}")]
    InvalidConstants { base: f64, step: f64 },
}

/// Computes positions from optional neighbour positions.
///
/// Stateless and `Copy`; one instance is shared by every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAllocator {
    base: f64,
    step: f64,
}

impl Default for PositionAllocator {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            step: DEFAULT_STEP,
        }
    }
}

impl PositionAllocator {
    /// Create an allocator with custom constants.
    ///
    /// `base` must be finite and `step` finite and strictly positive.
    pub fn new(base: f64, step: f64) -> Result<Self, OrderingError> {
        if !base.is_finite() || !step.is_finite() || step <= 0.0 {
            return Err(OrderingError::InvalidConstants { base, step });
        }
        Ok(Self { base, step })
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Position for a task placed between `prev` and `next`.
    ///
    /// Callers must pass neighbours read from the target partition in sorted
    /// order. Any error means the partition needs a rebalance before the
    /// insertion can be satisfied.
    pub fn compute_position(
        &self,
        prev: Option<f64>,
        next: Option<f64>,
    ) -> Result<f64, OrderingError> {
        for value in prev.iter().chain(next.iter()) {
            if !value.is_finite() {
                return Err(OrderingError::NonFinite(*value));
            }
        }

        let position = match (prev, next) {
            (None, None) => self.base,
            (None, Some(next)) => next / 2.0,
            (Some(prev), None) => prev + self.step,
            (Some(prev), Some(next)) => {
                if prev >= next {
                    return Err(OrderingError::InvalidNeighborOrder { prev, next });
                }
                (prev + next) / 2.0
            }
        };

        if is_strictly_between(position, prev, next) {
            Ok(position)
        } else {
            Err(OrderingError::PrecisionExhausted {
                lower: prev,
                upper: next,
            })
        }
    }
}

/// Whether `position` is finite and strictly inside the (optional) bounds.
pub fn is_strictly_between(position: f64, lower: Option<f64>, upper: Option<f64>) -> bool {
    position.is_finite()
        && lower.map_or(true, |lower| position > lower)
        && upper.map_or(true, |upper| position < upper)
}

/// [`PositionAllocator::compute_position`] with the default constants.
pub fn compute_position(prev: Option<f64>, next: Option<f64>) -> Result<f64, OrderingError> {
    PositionAllocator::default().compute_position(prev, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_partition_gets_base() {
        assert_eq!(compute_position(None, None), Ok(1000.0));
    }

    #[test]
    fn test_append_after_single_task() {
        assert_eq!(compute_position(Some(1000.0), None), Ok(2000.0));
    }

    #[test]
    fn test_insert_between_two_tasks() {
        assert_eq!(compute_position(Some(1000.0), Some(2000.0)), Ok(1500.0));
    }

    #[test]
    fn test_prepend_halves_first_position() {
        assert_eq!(compute_position(None, Some(1000.0)), Ok(500.0));
    }

    #[test]
    fn test_prepend_below_tiny_first_position_is_valid() {
        let position = compute_position(None, Some(1e-300)).unwrap();
        assert!(position < 1e-300);
        assert!(position >= 0.0);
    }

    #[test]
    fn test_prepend_at_zero_is_exhausted() {
        assert!(matches!(
            compute_position(None, Some(0.0)),
            Err(OrderingError::PrecisionExhausted { .. })
        ));
        assert!(matches!(
            compute_position(None, Some(-4.0)),
            Err(OrderingError::PrecisionExhausted { .. })
        ));
    }

    #[test]
    fn test_equal_neighbors_are_rejected() {
        assert_eq!(
            compute_position(Some(1500.0), Some(1500.0)),
            Err(OrderingError::InvalidNeighborOrder {
                prev: 1500.0,
                next: 1500.0
            })
        );
    }

    #[test]
    fn test_inverted_neighbors_are_rejected() {
        assert!(matches!(
            compute_position(Some(3000.0), Some(2000.0)),
            Err(OrderingError::InvalidNeighborOrder { .. })
        ));
    }

    #[test]
    fn test_precision_adjacent_neighbors_never_duplicate() {
        // 2^-50 is below the spacing of doubles near 1000, so both neighbours
        // land on the same value.
        let prev = 1000.0;
        let next = 1000.0 + 2f64.powi(-50);
        assert!(compute_position(Some(prev), Some(next)).is_err());
    }

    #[test]
    fn test_repeated_bisection_reports_exhaustion() {
        let prev = 1000.0;
        let mut next = 2000.0;
        let mut exhausted = None;

        for attempt in 0..60 {
            match compute_position(Some(prev), Some(next)) {
                Ok(position) => {
                    assert!(position > prev && position < next);
                    next = position;
                }
                Err(e) => {
                    exhausted = Some((attempt, e));
                    break;
                }
            }
        }

        let (attempt, err) = exhausted.expect("bisection should run out of precision");
        assert!(attempt > 40, "exhausted too early at attempt {}", attempt);
        assert!(matches!(err, OrderingError::PrecisionExhausted { .. }));
    }

    #[test]
    fn test_append_overflow_is_exhausted() {
        assert!(matches!(
            compute_position(Some(f64::MAX), None),
            Err(OrderingError::PrecisionExhausted { .. })
        ));
        // Above 2^63 a step of 1000 is lost to rounding.
        assert!(matches!(
            compute_position(Some(1e300), None),
            Err(OrderingError::PrecisionExhausted { .. })
        ));
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        assert!(matches!(
            compute_position(Some(f64::NAN), None),
            Err(OrderingError::NonFinite(_))
        ));
        assert!(matches!(
            compute_position(None, Some(f64::INFINITY)),
            Err(OrderingError::NonFinite(_))
        ));
    }

    #[test]
    fn test_custom_constants() {
        let allocator = PositionAllocator::new(0.0, 1.0).unwrap();
        assert_eq!(allocator.compute_position(None, None), Ok(0.0));
        assert_eq!(allocator.compute_position(Some(4.0), None), Ok(5.0));
    }

    #[test]
    fn test_invalid_constants() {
        assert!(PositionAllocator::new(1000.0, 0.0).is_err());
        assert!(PositionAllocator::new(1000.0, -5.0).is_err());
        assert!(PositionAllocator::new(f64::NAN, 1000.0).is_err());
        assert!(PositionAllocator::new(1000.0, f64::INFINITY).is_err());
    }

    proptest! {
        #[test]
        fn prop_prepend_is_below_next(next in 1e-300f64..1e300) {
            let position = compute_position(None, Some(next)).unwrap();
            prop_assert!(position < next);
        }

        #[test]
        fn prop_append_adds_exactly_one_step(prev in -1e12f64..1e12) {
            let position = compute_position(Some(prev), None).unwrap();
            prop_assert!(position > prev);
            prop_assert_eq!(position, prev + DEFAULT_STEP);
        }

        #[test]
        fn prop_midpoint_is_strictly_between_or_rejected(
            a in -1e12f64..1e12,
            b in -1e12f64..1e12,
        ) {
            prop_assume!(a != b);
            let (prev, next) = if a < b { (a, b) } else { (b, a) };
            match compute_position(Some(prev), Some(next)) {
                Ok(position) => {
                    prop_assert!(prev < position);
                    prop_assert!(position < next);
                }
                Err(e) => prop_assert!(
                    matches!(e, OrderingError::PrecisionExhausted { .. }),
                    "unexpected error {:?}",
                    e
                ),
            }
        }
    }
}
