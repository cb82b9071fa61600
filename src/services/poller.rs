// services/poller.rs
//
// Payment confirmation watcher. An STK push resolves out of band (the
// payer reads a prompt on their phone and enters a PIN), so confirmation
// is observed by re-reading the transaction row on a fixed cadence until
// it reaches a terminal status or a wall-clock deadline passes.
//
// Poll attempts are serialized: each read is awaited before the next one
// is scheduled, so results are consumed in issuance order and a slow read
// can never overlap the next one. The cadence and the deadline live in a
// single task with a single cancellation token, so teardown is one path.
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::transaction::{TransactionRecord, TransactionStatus};
use crate::services::store::TransactionStore;

/// How a deadline expiry is surfaced to the payer. Some pages report it
/// as an outright failure, others as "still pending, check back later".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    Fail,
    Unknown,
}

/// Cadence, deadline and timeout messaging for one call site.
#[derive(Debug, Clone, Copy)]
pub struct PollPlan {
    pub interval: Duration,
    pub deadline: Duration,
    pub timeout_policy: TimeoutPolicy,
}

impl PollPlan {
    pub fn invoice() -> Self {
        PollPlan {
            interval: Duration::from_secs(2),
            deadline: Duration::from_secs(60),
            timeout_policy: TimeoutPolicy::Fail,
        }
    }

    pub fn payment_link() -> Self {
        PollPlan {
            interval: Duration::from_secs(3),
            deadline: Duration::from_secs(120),
            timeout_policy: TimeoutPolicy::Unknown,
        }
    }

    pub fn subscription() -> Self {
        PollPlan {
            interval: Duration::from_secs(3),
            deadline: Duration::from_secs(90),
            timeout_policy: TimeoutPolicy::Fail,
        }
    }
}

#[derive(Debug)]
pub enum PollOutcome {
    Completed(TransactionRecord),
    Failed(TransactionRecord),
    /// The deadline passed without a terminal status. The watcher gives
    /// up observing; the underlying charge is not cancelled and may still
    /// resolve later on the backend.
    DeadlineElapsed,
}

/// Watches one correlation reference until the transaction row reaches a
/// terminal status or the deadline passes. Returns `None` if cancelled,
/// in which case no further reads are issued.
///
/// A transient read error does not count as failure and does not stop
/// the watch; it is logged and the next cycle proceeds as scheduled.
pub async fn watch_reference(
    store: Arc<dyn TransactionStore>,
    reference: String,
    plan: PollPlan,
    cancel: CancellationToken,
) -> Option<PollOutcome> {
    let started = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return None;
        }

        match store.find_transaction(&reference).await {
            Ok(Some(tx)) => match tx.status {
                TransactionStatus::Completed => {
                    info!("Payment confirmed for {}", reference);
                    return Some(PollOutcome::Completed(tx));
                }
                TransactionStatus::Failed => {
                    info!("Payment failed for {}", reference);
                    return Some(PollOutcome::Failed(tx));
                }
                TransactionStatus::Pending => {}
            },
            // Row not written yet: the callback may lag the prompt.
            Ok(None) => {}
            Err(err) => {
                warn!("Transient poll error for {}: {}", reference, err);
            }
        }

        if started.elapsed() >= plan.deadline {
            info!("Gave up watching {} after {:?}", reference, plan.deadline);
            return Some(PollOutcome::DeadlineElapsed);
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(plan.interval) => {}
        }
    }
}
