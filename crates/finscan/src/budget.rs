//! Process-wide cloud recognition budget.
//!
//! The allotment is the only state shared between documents. It is drawn
//! down with a single compare-and-swap per request: a worker that loses the
//! race is told so and does not retry, so its document goes to manual review.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BudgetError {
    #[error("Cloud budget exhausted: requested {requested}, remaining {remaining}")]
    Exhausted { requested: u64, remaining: u64 },
    #[error("Cloud budget changed concurrently; reservation not made")]
    Contended,
}

/// Source of the remaining cloud-recognition allotment.
pub trait BudgetProvider: Send + Sync {
    /// Units (pages) still available.
    fn remaining(&self) -> u64;

    /// Atomically take `units` from the allotment.
    ///
    /// Returns the remaining allotment after the decrement.
    fn try_reserve(&self, units: u64) -> Result<u64, BudgetError>;
}

/// In-process budget counter.
#[derive(Debug)]
pub struct AtomicBudget {
    remaining: AtomicU64,
}

impl AtomicBudget {
    pub fn new(units: u64) -> Self {
        Self {
            remaining: AtomicU64::new(units),
        }
    }

    /// A budget that never authorizes cloud calls.
    pub fn empty() -> Self {
        Self::new(0)
    }
}

impl BudgetProvider for AtomicBudget {
    fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Acquire)
    }

    fn try_reserve(&self, units: u64) -> Result<u64, BudgetError> {
        let current = self.remaining.load(Ordering::Acquire);
        if current < units {
            return Err(BudgetError::Exhausted {
                requested: units,
                remaining: current,
            });
        }
        let next = current - units;
        self.remaining
            .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| next)
            .map_err(|_| BudgetError::Contended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reserve_decrements() {
        let budget = AtomicBudget::new(10);
        assert_eq!(budget.try_reserve(3), Ok(7));
        assert_eq!(budget.remaining(), 7);
    }

    #[test]
    fn test_reserve_refuses_overdraw() {
        let budget = AtomicBudget::new(2);
        assert_eq!(
            budget.try_reserve(3),
            Err(BudgetError::Exhausted {
                requested: 3,
                remaining: 2
            })
        );
        assert_eq!(budget.remaining(), 2);
    }

    #[test]
    fn test_empty_budget() {
        let budget = AtomicBudget::empty();
        assert!(budget.try_reserve(1).is_err());
        assert_eq!(budget.try_reserve(0), Ok(0));
    }

    #[test]
    fn test_concurrent_reservations_never_overdraw() {
        let budget = Arc::new(AtomicBudget::new(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = budget.clone();
                std::thread::spawn(move || {
                    (0..20).filter(|_| budget.try_reserve(1).is_ok()).count() as u64
                })
            })
            .collect();
        let granted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted + budget.remaining(), 50);
        assert!(granted <= 50);
    }
}
