//! Stabilization detection for virtualized, incrementally-loaded lists.
//!
//! The upstream guest list exposes no total count and no pagination cursor;
//! the only way to know it has finished loading is to watch the rendered
//! element count while repeatedly scrolling to the bottom, and declare
//! convergence once the count holds still for several consecutive rounds. A
//! count can legitimately plateau for one round while more items are still in
//! flight, which is why a single unchanged reading is not enough.
//!
//! The loop is bounded three ways: a round cap, an overall deadline, and a
//! cancellation token. Exhausting a bound is not an error; it is the distinct
//! [`StabilizationOutcome::DidNotConverge`] outcome, and the caller decides
//! whether a partial list is worth keeping.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::config::StabilizationConfig;
use crate::errors::{DriverError, GuestflowError};

/// A live source of rendered-element counts.
#[async_trait]
pub trait CountSignal: Send + Sync {
    /// Samples the current rendered count.
    async fn sample(&self) -> Result<usize, DriverError>;
}

/// An action that provokes further loading (scroll to the end of the
/// container).
#[async_trait]
pub trait ScrollNudge: Send + Sync {
    /// Issues one scroll-to-end nudge.
    async fn nudge(&self) -> Result<(), DriverError>;
}

/// Loop-local detector state, reset at entry and discarded at exit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StabilizationState {
    /// Count observed in the previous round.
    pub last_count: Option<usize>,
    /// Consecutive rounds the current count has been observed.
    pub stable_rounds: usize,
    /// Total rounds completed.
    pub rounds: usize,
}

impl StabilizationState {
    /// Creates a fresh state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one observation into the state.
    ///
    /// A repeated count extends the streak; a new value starts a streak of
    /// one observation.
    pub fn observe(&mut self, count: usize) {
        self.rounds += 1;
        self.stable_rounds = if self.last_count == Some(count) {
            self.stable_rounds + 1
        } else {
            1
        };
        self.last_count = Some(count);
    }
}

/// How a stabilization loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StabilizationOutcome {
    /// The count held still for the configured number of rounds.
    Converged {
        /// The stable count.
        count: usize,
        /// Rounds it took.
        rounds: usize,
    },
    /// A bound (round cap or deadline) was exhausted first.
    DidNotConverge {
        /// The most recent count, if any round completed.
        last_count: Option<usize>,
        /// Rounds completed before giving up.
        rounds: usize,
    },
}

impl StabilizationOutcome {
    /// The final count regardless of convergence, if one was observed.
    #[must_use]
    pub fn final_count(&self) -> Option<usize> {
        match self {
            Self::Converged { count, .. } => Some(*count),
            Self::DidNotConverge { last_count, .. } => *last_count,
        }
    }

    /// Whether the list was judged complete.
    #[must_use]
    pub fn converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

/// Drives the signal/nudge pair until the count stabilizes or a bound is
/// exhausted.
///
/// Each round: sample the count, nudge, wait the settle interval, fold the
/// sample into the state. The returned count is informational; callers must
/// re-query the actual records after the loop, because rendered order is only
/// trustworthy at the moment of final extraction.
pub async fn run_to_stability(
    signal: &dyn CountSignal,
    scroll: &dyn ScrollNudge,
    config: &StabilizationConfig,
    cancel: &CancellationToken,
) -> Result<StabilizationOutcome, GuestflowError> {
    let mut state = StabilizationState::new();
    let deadline = Instant::now() + config.deadline();

    loop {
        cancel.ensure_active()?;

        if state.rounds >= config.max_rounds {
            warn!(
                rounds = state.rounds,
                last_count = ?state.last_count,
                "round cap reached before the list stabilized"
            );
            return Ok(StabilizationOutcome::DidNotConverge {
                last_count: state.last_count,
                rounds: state.rounds,
            });
        }
        if Instant::now() >= deadline {
            warn!(
                rounds = state.rounds,
                last_count = ?state.last_count,
                "deadline exceeded before the list stabilized"
            );
            return Ok(StabilizationOutcome::DidNotConverge {
                last_count: state.last_count,
                rounds: state.rounds,
            });
        }

        let current = signal.sample().await.map_err(GuestflowError::Driver)?;
        scroll.nudge().await.map_err(GuestflowError::Driver)?;
        settle(config.settle_interval()).await;

        state.observe(current);
        debug!(
            round = state.rounds,
            count = current,
            stable_rounds = state.stable_rounds,
            "stabilization round"
        );

        if state.stable_rounds >= config.stability_threshold {
            info!(count = current, rounds = state.rounds, "guest list stabilized");
            return Ok(StabilizationOutcome::Converged {
                count: current,
                rounds: state.rounds,
            });
        }
    }
}

async fn settle(interval: Duration) {
    if !interval.is_zero() {
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Replays a fixed count sequence; the last value repeats forever.
    struct ScriptedSignal {
        counts: Vec<usize>,
        cursor: Mutex<usize>,
    }

    impl ScriptedSignal {
        fn new(counts: &[usize]) -> Self {
            Self {
                counts: counts.to_vec(),
                cursor: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl CountSignal for ScriptedSignal {
        async fn sample(&self) -> Result<usize, DriverError> {
            let mut cursor = self.cursor.lock();
            let index = (*cursor).min(self.counts.len() - 1);
            *cursor += 1;
            Ok(self.counts[index])
        }
    }

    /// Counts nudges; never fails.
    #[derive(Default)]
    struct CountingNudge {
        nudges: Mutex<usize>,
    }

    #[async_trait]
    impl ScrollNudge for CountingNudge {
        async fn nudge(&self) -> Result<(), DriverError> {
            *self.nudges.lock() += 1;
            Ok(())
        }
    }

    fn fast_config() -> StabilizationConfig {
        StabilizationConfig::new()
            .with_stability_threshold(3)
            .with_settle_seconds(0.0)
            .with_max_rounds(50)
            .with_deadline_seconds(30.0)
    }

    #[test]
    fn test_state_observe_streaks() {
        let mut state = StabilizationState::new();
        state.observe(5);
        assert_eq!(state.stable_rounds, 1);
        state.observe(5);
        assert_eq!(state.stable_rounds, 2);
        state.observe(6);
        assert_eq!(state.stable_rounds, 1);
        assert_eq!(state.rounds, 3);
        assert_eq!(state.last_count, Some(6));
    }

    #[tokio::test]
    async fn test_three_equal_reads_converge_in_three_rounds() {
        let signal = ScriptedSignal::new(&[5, 5, 5]);
        let nudge = CountingNudge::default();
        let cancel = CancellationToken::new();

        let outcome = run_to_stability(&signal, &nudge, &fast_config(), &cancel)
            .await
            .expect("loop should complete");

        assert_eq!(
            outcome,
            StabilizationOutcome::Converged { count: 5, rounds: 3 }
        );
        assert_eq!(*nudge.nudges.lock(), 3);
    }

    #[tokio::test]
    async fn test_growth_then_plateau_converges_in_four_rounds() {
        let signal = ScriptedSignal::new(&[5, 6, 6, 6]);
        let nudge = CountingNudge::default();
        let cancel = CancellationToken::new();

        let outcome = run_to_stability(&signal, &nudge, &fast_config(), &cancel)
            .await
            .expect("loop should complete");

        assert_eq!(
            outcome,
            StabilizationOutcome::Converged { count: 6, rounds: 4 }
        );
    }

    #[tokio::test]
    async fn test_round_cap_reports_non_convergence() {
        // Strictly growing signal never stabilizes.
        let counts: Vec<usize> = (0..100).collect();
        let signal = ScriptedSignal::new(&counts);
        let nudge = CountingNudge::default();
        let cancel = CancellationToken::new();
        let config = fast_config().with_max_rounds(7);

        let outcome = run_to_stability(&signal, &nudge, &config, &cancel)
            .await
            .expect("loop should complete");

        assert_eq!(
            outcome,
            StabilizationOutcome::DidNotConverge {
                last_count: Some(6),
                rounds: 7
            }
        );
        assert!(!outcome.converged());
        assert_eq!(outcome.final_count(), Some(6));
    }

    #[tokio::test]
    async fn test_deadline_reports_non_convergence() {
        let signal = ScriptedSignal::new(&[1, 2, 3]);
        let nudge = CountingNudge::default();
        let cancel = CancellationToken::new();
        let config = fast_config().with_deadline_seconds(0.0);

        let outcome = run_to_stability(&signal, &nudge, &config, &cancel)
            .await
            .expect("loop should complete");

        assert_eq!(
            outcome,
            StabilizationOutcome::DidNotConverge {
                last_count: None,
                rounds: 0
            }
        );
    }

    #[tokio::test]
    async fn test_cancellation_aborts_the_loop() {
        let signal = ScriptedSignal::new(&[5, 5, 5]);
        let nudge = CountingNudge::default();
        let cancel = CancellationToken::new();
        cancel.cancel("operator abort");

        let err = run_to_stability(&signal, &nudge, &fast_config(), &cancel)
            .await
            .expect_err("cancelled loop should error");
        assert!(matches!(err, GuestflowError::Cancelled(_)));
    }
}
