//! Delivery scheduling for buffered iterator entries.
//!
//! Entries already sitting in an iterator's buffer are handed out without a
//! bridge round trip. A caller draining a large buffer in a tight loop would
//! then never give the runtime a chance to run other tasks, so deliveries
//! from the buffer are counted and the iterator yields once every
//! `drain_budget` entries.
//!
//! The scheduler has two modes. `Idle` means the last delivery followed a
//! real suspension (a bridge call or a yield). `Draining` counts deliveries
//! made without one.

use tracing::trace;

/// Current delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// The previous step suspended; no deliveries are owed a yield
    Idle,
    /// Deliveries made from the buffer since the last suspension
    Draining {
        /// Count of buffered deliveries
        delivered: usize,
    },
}

/// Per-iterator delivery scheduler.
#[derive(Debug)]
pub struct DeliveryScheduler {
    budget: usize,
    mode: DeliveryMode,
    yields: u64,
}

impl DeliveryScheduler {
    /// Create a scheduler allowing `budget` buffered deliveries per turn.
    ///
    /// A budget of zero is treated as one.
    pub fn new(budget: usize) -> Self {
        Self {
            budget: budget.max(1),
            mode: DeliveryMode::Idle,
            yields: 0,
        }
    }

    /// Account for one delivery from the buffer, yielding first if the
    /// budget for this turn is spent.
    pub async fn before_delivery(&mut self) {
        let delivered = match self.mode {
            DeliveryMode::Idle => 0,
            DeliveryMode::Draining { delivered } => delivered,
        };
        if delivered >= self.budget {
            trace!(delivered, "drain budget spent, yielding");
            tokio::task::yield_now().await;
            self.yields += 1;
            self.mode = DeliveryMode::Draining { delivered: 1 };
        } else {
            self.mode = DeliveryMode::Draining {
                delivered: delivered + 1,
            };
        }
    }

    /// Record a real suspension (a bridge call completed).
    pub fn suspended(&mut self) {
        self.mode = DeliveryMode::Idle;
    }

    /// Current mode
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Number of times the scheduler has yielded
    pub fn yields(&self) -> u64 {
        self.yields
    }

    /// Deliveries allowed per turn
    pub fn budget(&self) -> usize {
        self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_yields_once_per_budget() {
        let mut scheduler = DeliveryScheduler::new(3);
        for _ in 0..3 {
            scheduler.before_delivery().await;
        }
        assert_eq!(scheduler.yields(), 0);
        assert_eq!(scheduler.mode(), DeliveryMode::Draining { delivered: 3 });

        scheduler.before_delivery().await;
        assert_eq!(scheduler.yields(), 1);
        assert_eq!(scheduler.mode(), DeliveryMode::Draining { delivered: 1 });

        for _ in 0..5 {
            scheduler.before_delivery().await;
        }
        assert_eq!(scheduler.yields(), 2);
    }

    #[tokio::test]
    async fn test_suspension_resets_count() {
        let mut scheduler = DeliveryScheduler::new(2);
        scheduler.before_delivery().await;
        scheduler.before_delivery().await;
        scheduler.suspended();
        assert_eq!(scheduler.mode(), DeliveryMode::Idle);

        scheduler.before_delivery().await;
        scheduler.before_delivery().await;
        assert_eq!(scheduler.yields(), 0);
    }

    #[test]
    fn test_zero_budget_clamped() {
        assert_eq!(DeliveryScheduler::new(0).budget(), 1);
    }
}
