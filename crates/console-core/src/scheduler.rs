use std::future::Future;
use std::pin::Pin;

use tokio::time::{self, Duration};
use tracing::{debug, warn};

use crate::config::PollerConfig;
use crate::sync::{LogSyncEngine, PollBackend, SyncError};

/// Chooses the delay before the next poll.
///
/// Any poll that replayed new entries refills the burst budget; every quiet
/// poll spends one unit of it. Polls stay on the fast delay while budget is
/// left and fall back to the slow delay once it runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollCadence {
    fast: Duration,
    slow: Duration,
    burst_budget: u32,
    remaining: u32,
}

impl PollCadence {
    pub fn new(fast: Duration, slow: Duration, burst_budget: u32) -> Self {
        Self {
            fast,
            slow,
            burst_budget,
            remaining: 0,
        }
    }

    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.fast_interval_ms),
            Duration::from_millis(config.slow_interval_ms),
            config.burst_budget,
        )
    }

    pub fn record(&mut self, updated: bool) -> Duration {
        if updated {
            self.remaining = self.burst_budget;
        } else {
            self.remaining = self.remaining.saturating_sub(1);
        }

        if self.remaining > 0 {
            self.fast
        } else {
            self.slow
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

pub type PollSourceFuture<'a> = Pin<Box<dyn Future<Output = Result<bool, SyncError>> + Send + 'a>>;

/// One poll round trip; resolves to whether new log content was applied.
pub trait PollSource: Send + Sync {
    fn poll_once<'a>(&'a self) -> PollSourceFuture<'a>;
}

impl<B> PollSource for LogSyncEngine<B>
where
    B: PollBackend,
{
    fn poll_once<'a>(&'a self) -> PollSourceFuture<'a> {
        Box::pin(async move { self.sync_once().await.map(|outcome| outcome.updated()) })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub polls: u64,
    pub updates: u64,
    pub failures: u64,
}

pub struct PollScheduler {
    cadence: PollCadence,
}

impl PollScheduler {
    pub fn new(cadence: PollCadence) -> Self {
        Self { cadence }
    }

    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(PollCadence::from_config(config))
    }

    pub fn cadence(&self) -> &PollCadence {
        &self.cadence
    }

    /// Polls sequentially until `shutdown` resolves. A failed poll is logged
    /// and counted as a quiet one; it never ends the loop.
    pub async fn run<S, F>(&mut self, source: &S, shutdown: F) -> SchedulerStats
    where
        S: PollSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = SchedulerStats::default();

        loop {
            let result = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                result = source.poll_once() => result,
            };

            stats.polls += 1;
            let updated = match result {
                Ok(updated) => updated,
                Err(err) => {
                    stats.failures += 1;
                    warn!(error = %err, "poll failed; continuing on the slow cadence");
                    false
                }
            };
            if updated {
                stats.updates += 1;
            }

            let delay = self.cadence.record(updated);
            debug!(
                delay_ms = delay.as_millis() as u64,
                burst_remaining = self.cadence.remaining(),
                "next poll scheduled"
            );

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = time::sleep(delay) => {}
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;
    use crate::transport::TransportError;

    const FAST: Duration = Duration::from_millis(25);
    const SLOW: Duration = Duration::from_millis(250);

    #[test]
    fn burst_budget_keeps_fast_cadence_after_activity() {
        let mut cadence = PollCadence::new(FAST, SLOW, 100);

        assert_eq!(cadence.record(false), SLOW);
        assert_eq!(cadence.record(true), FAST);
        for poll in 0..99 {
            assert_eq!(cadence.record(false), FAST, "quiet poll {poll} should stay fast");
        }
        assert_eq!(cadence.record(false), SLOW);
        assert_eq!(cadence.record(false), SLOW);
    }

    #[test]
    fn new_activity_refills_the_budget() {
        let mut cadence = PollCadence::new(FAST, SLOW, 3);

        cadence.record(true);
        cadence.record(false);
        assert_eq!(cadence.remaining(), 2);

        assert_eq!(cadence.record(true), FAST);
        assert_eq!(cadence.remaining(), 3);
    }

    #[test]
    fn zero_budget_always_polls_slowly() {
        let mut cadence = PollCadence::new(FAST, SLOW, 0);

        assert_eq!(cadence.record(true), SLOW);
        assert_eq!(cadence.record(false), SLOW);
    }

    struct ScriptedSource {
        outcomes: Mutex<VecDeque<Result<bool, SyncError>>>,
        exhausted: Arc<Notify>,
    }

    impl PollSource for ScriptedSource {
        fn poll_once<'a>(&'a self) -> PollSourceFuture<'a> {
            Box::pin(async move {
                let next = self.outcomes.lock().expect("outcomes lock").pop_front();
                match next {
                    Some(outcome) => outcome,
                    None => {
                        self.exhausted.notify_one();
                        Ok(false)
                    }
                }
            })
        }
    }

    #[tokio::test]
    async fn loop_survives_failures_and_stops_on_shutdown() {
        let exhausted = Arc::new(Notify::new());
        let source = ScriptedSource {
            outcomes: Mutex::new(VecDeque::from(vec![
                Ok(true),
                Err(SyncError::Transport(TransportError::Unavailable {
                    message: "connection refused".to_string(),
                })),
                Err(SyncError::Rejected {
                    message: "boom".to_string(),
                }),
                Ok(false),
            ])),
            exhausted: exhausted.clone(),
        };
        let mut scheduler = PollScheduler::new(PollCadence::new(
            Duration::from_millis(1),
            Duration::from_millis(2),
            10,
        ));

        let stats = scheduler
            .run(&source, async move { exhausted.notified().await })
            .await;

        assert_eq!(
            stats,
            SchedulerStats {
                polls: 5,
                updates: 1,
                failures: 2,
            }
        );
        assert_eq!(scheduler.cadence().remaining(), 6);
    }
}
