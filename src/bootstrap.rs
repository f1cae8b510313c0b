//! Bounded retry used to establish the first backend connection.

use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

pub const DEFAULT_RETRY_PERIOD: Duration = Duration::from_millis(500);
pub const DEFAULT_RETRY_BUDGET: Duration = Duration::from_millis(10_000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between the starts of consecutive attempts.
    pub period: Duration,
    /// Total time after which the whole procedure gives up.
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            period: DEFAULT_RETRY_PERIOD,
            budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Connected { attempts: u32, elapsed: Duration },
    TimedOut { attempts: u32 },
}

impl BootstrapOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, BootstrapOutcome::Connected { .. })
    }
}

/// Runs `attempt` immediately and then once per period until it reports
/// success. The budget cuts off the loop even while an attempt is pending.
pub async fn retry_within_budget<F, Fut>(policy: RetryPolicy, mut attempt: F) -> BootstrapOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let started = Instant::now();
    let mut ticker = time::interval(policy.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut attempts = 0u32;

    let outcome = time::timeout(policy.budget, async {
        loop {
            ticker.tick().await;
            attempts += 1;
            if attempt().await {
                return;
            }
            tracing::debug!(attempt = attempts, "backend not reachable yet");
        }
    })
    .await;

    match outcome {
        Ok(()) => BootstrapOutcome::Connected {
            attempts,
            elapsed: started.elapsed(),
        },
        Err(_) => BootstrapOutcome::TimedOut { attempts },
    }
}
