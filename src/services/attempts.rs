// services/attempts.rs
//
// In-memory registry of payment attempts. An attempt's slot is reserved
// before the charge goes out, armed once initiation succeeds, watched by
// a single spawned task, and discarded a short while after it reaches a
// terminal state. Nothing here is persisted; the transaction row on the
// backend is the durable record.
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::attempt::{AttemptStatus, PaymentAttempt, PaymentTarget};
use crate::services::poller::{watch_reference, PollOutcome, PollPlan, TimeoutPolicy};
use crate::services::store::TransactionStore;

struct AttemptEntry {
    attempt: PaymentAttempt,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct AttemptTracker {
    store: Arc<dyn TransactionStore>,
    inner: Arc<RwLock<HashMap<Uuid, AttemptEntry>>>,
}

impl AttemptTracker {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        AttemptTracker {
            store,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Id of the pending attempt for a target, if one is being watched.
    pub fn pending_for(&self, target: &PaymentTarget) -> Option<Uuid> {
        let entries = self.inner.read().unwrap();
        entries
            .values()
            .find(|entry| {
                entry.attempt.target == *target && entry.attempt.status == AttemptStatus::Pending
            })
            .map(|entry| entry.attempt.id)
    }

    /// Early rejection for a target that is already being watched. Cheap
    /// pre-check only; `reserve` re-checks under the write lock.
    pub fn ensure_idle(&self, target: &PaymentTarget) -> Result<()> {
        if self.pending_for(target).is_some() {
            return Err(AppError::AttemptInProgress);
        }
        Ok(())
    }

    /// Claims the target before the charge is initiated. The claim is
    /// registered under the write lock, so two concurrent submissions
    /// cannot both reach the gateway: the loser gets
    /// `AttemptInProgress` here, before any prompt is sent. Dropping the
    /// reservation without committing releases the claim.
    pub fn reserve(&self, target: PaymentTarget) -> Result<Reservation> {
        let attempt = PaymentAttempt::new(target, String::new());
        let id = attempt.id;

        {
            let mut entries = self.inner.write().unwrap();
            let busy = entries.values().any(|entry| {
                entry.attempt.target == attempt.target
                    && entry.attempt.status == AttemptStatus::Pending
            });
            if busy {
                return Err(AppError::AttemptInProgress);
            }
            entries.insert(
                id,
                AttemptEntry {
                    attempt,
                    cancel: CancellationToken::new(),
                },
            );
        }

        Ok(Reservation {
            tracker: self.clone(),
            id,
            committed: false,
        })
    }

    pub fn get(&self, id: Uuid) -> Result<PaymentAttempt> {
        let entries = self.inner.read().unwrap();
        entries
            .get(&id)
            .map(|entry| entry.attempt.clone())
            .ok_or(AppError::AttemptNotFound)
    }

    /// Stops watching and discards the attempt (the unmount path). The
    /// token tears down the watcher's cadence and deadline together, so
    /// no late poll can resurrect the attempt.
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        let mut entries = self.inner.write().unwrap();
        match entries.remove(&id) {
            Some(entry) => {
                entry.cancel.cancel();
                info!("Stopped watching attempt {}", id);
                Ok(())
            }
            None => Err(AppError::AttemptNotFound),
        }
    }

    /// Applies the watcher's outcome. First write wins: once an attempt
    /// has left `Pending`, any other path is a no-op.
    async fn finish(&self, id: Uuid, outcome: PollOutcome, policy: TimeoutPolicy) {
        // Refresh the paid-for record before taking the lock so the UI
        // sees the server-side status flip along with the success.
        let target_status = match &outcome {
            PollOutcome::Completed(_) => {
                let target = {
                    let entries = self.inner.read().unwrap();
                    entries.get(&id).map(|entry| entry.attempt.target.clone())
                };
                match target {
                    Some(target) => self.refresh_target(&target).await,
                    None => None,
                }
            }
            _ => None,
        };

        let mut entries = self.inner.write().unwrap();
        let entry = match entries.get_mut(&id) {
            Some(entry) => entry,
            None => return,
        };
        if entry.attempt.status.is_terminal() {
            return;
        }

        match outcome {
            PollOutcome::Completed(tx) => {
                entry.attempt.status = AttemptStatus::Succeeded;
                entry.attempt.message = "Payment received. Thank you!".to_string();
                entry.attempt.mpesa_receipt_number = tx.mpesa_receipt_number;
                entry.attempt.target_status = target_status;
            }
            PollOutcome::Failed(_) => {
                entry.attempt.status = AttemptStatus::Failed;
                entry.attempt.message = "Payment failed. You can try again.".to_string();
            }
            PollOutcome::DeadlineElapsed => match policy {
                TimeoutPolicy::Fail => {
                    entry.attempt.status = AttemptStatus::TimedOutFailed;
                    entry.attempt.message =
                        "Payment was not confirmed in time. You can try again.".to_string();
                }
                TimeoutPolicy::Unknown => {
                    entry.attempt.status = AttemptStatus::TimedOutUnknown;
                    entry.attempt.message =
                        "Payment is still pending. Check back in a few minutes.".to_string();
                }
            },
        }
        entry.attempt.finished_at = Some(Utc::now());
        entry.cancel.cancel();
        info!(
            "Attempt {} finished as {:?}",
            id, entry.attempt.status
        );
    }

    async fn refresh_target(&self, target: &PaymentTarget) -> Option<String> {
        let refreshed = match target {
            PaymentTarget::Invoice(id) => self
                .store
                .get_invoice(*id)
                .await
                .map(|invoice| invoice.map(|i| i.status)),
            PaymentTarget::PaymentLink(slug) => self.store.get_payment_link(slug).await.map(|link| {
                link.map(|l| if l.active { "active" } else { "inactive" }.to_string())
            }),
            PaymentTarget::Subscription(id) => self
                .store
                .get_subscription(*id)
                .await
                .map(|sub| sub.map(|s| s.status)),
        };

        match refreshed {
            Ok(status) => status,
            Err(err) => {
                warn!("Could not refresh {} after payment: {}", target, err);
                None
            }
        }
    }

    /// Drops terminal attempts older than the retention window, so a
    /// later "try again" starts from a clean slate.
    pub fn sweep_once(&self, retention: Duration) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());
        let mut entries = self.inner.write().unwrap();
        entries.retain(|_, entry| match entry.attempt.finished_at {
            Some(finished) => !entry.attempt.status.is_terminal() || finished > cutoff,
            None => true,
        });
    }

    /// Background sweeper started once at boot.
    pub async fn run_sweeper(self, retention: Duration) {
        let cadence = Duration::from_secs(retention.as_secs().max(4) / 4);
        loop {
            tokio::time::sleep(cadence).await;
            self.sweep_once(retention);
        }
    }
}

/// A claimed payment target waiting on its charge initiation. Holds the
/// single-active-attempt slot across the gateway round trip; commit arms
/// the watcher, drop without commit releases the slot.
pub struct Reservation {
    tracker: AttemptTracker,
    id: Uuid,
    committed: bool,
}

impl Reservation {
    /// Attaches the gateway's correlation reference and spawns the
    /// watcher task that drives the attempt to a terminal state.
    pub fn commit(mut self, reference: String, plan: PollPlan) -> Result<PaymentAttempt> {
        self.committed = true;

        let (attempt, cancel) = {
            let mut entries = self.tracker.inner.write().unwrap();
            let entry = entries.get_mut(&self.id).ok_or(AppError::AttemptNotFound)?;
            entry.attempt.reference = reference.clone();
            (entry.attempt.clone(), entry.cancel.clone())
        };

        info!("Watching attempt {} for {}", attempt.id, attempt.target);

        let tracker = self.tracker.clone();
        let store = self.tracker.store.clone();
        let id = attempt.id;
        tokio::spawn(async move {
            // None means cancelled: the entry is already gone.
            if let Some(outcome) = watch_reference(store, reference, plan, cancel).await {
                tracker.finish(id, outcome, plan.timeout_policy).await;
            }
        });

        Ok(attempt)
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.committed {
            let mut entries = self.tracker.inner.write().unwrap();
            entries.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transaction::TransactionStatus;
    use crate::services::store::test_support::ScriptedStore;

    const REF: &str = "ws_CO_261020250001";

    fn fast_plan(policy: TimeoutPolicy) -> PollPlan {
        PollPlan {
            interval: Duration::from_secs(2),
            deadline: Duration::from_secs(10),
            timeout_policy: policy,
        }
    }

    fn start(
        tracker: &AttemptTracker,
        target: PaymentTarget,
        reference: &str,
        plan: PollPlan,
    ) -> Result<PaymentAttempt> {
        tracker.reserve(target)?.commit(reference.to_string(), plan)
    }

    async fn wait_for_terminal(tracker: &AttemptTracker, id: Uuid) -> PaymentAttempt {
        // Paused-clock tests auto-advance while every task is idle, so
        // this loop converges as fast as the watcher does.
        loop {
            let attempt = tracker.get(id).expect("attempt should exist");
            if attempt.status.is_terminal() {
                return attempt;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_succeeds_when_the_row_completes() {
        let store = Arc::new(ScriptedStore::terminal_after(
            REF,
            2,
            TransactionStatus::Completed,
        ));
        let tracker = AttemptTracker::new(store);
        let target = PaymentTarget::PaymentLink("spring-sale".to_string());

        let attempt = start(&tracker, target, REF, fast_plan(TimeoutPolicy::Unknown))
            .expect("start should succeed");
        assert_eq!(attempt.status, AttemptStatus::Pending);

        let finished = wait_for_terminal(&tracker, attempt.id).await;
        assert_eq!(finished.status, AttemptStatus::Succeeded);
        assert_eq!(finished.mpesa_receipt_number.as_deref(), Some("SBL12XYZ9"));
        assert!(finished.finished_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_fails_when_the_row_fails() {
        let store = Arc::new(ScriptedStore::terminal_after(
            REF,
            1,
            TransactionStatus::Failed,
        ));
        let tracker = AttemptTracker::new(store);

        let attempt = start(
            &tracker,
            PaymentTarget::Invoice(Uuid::new_v4()),
            REF,
            fast_plan(TimeoutPolicy::Fail),
        )
        .expect("start should succeed");

        let finished = wait_for_terminal(&tracker, attempt.id).await;
        assert_eq!(finished.status, AttemptStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_maps_to_the_call_site_timeout_policy() {
        for (policy, expected) in [
            (TimeoutPolicy::Fail, AttemptStatus::TimedOutFailed),
            (TimeoutPolicy::Unknown, AttemptStatus::TimedOutUnknown),
        ] {
            let store = Arc::new(ScriptedStore::always_pending(REF));
            let tracker = AttemptTracker::new(store);

            let attempt = start(
                &tracker,
                PaymentTarget::Subscription(Uuid::new_v4()),
                REF,
                fast_plan(policy),
            )
            .expect("start should succeed");

            let finished = wait_for_terminal(&tracker, attempt.id).await;
            assert_eq!(finished.status, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_attempt_for_the_same_target_is_rejected_while_pending() {
        let store = Arc::new(ScriptedStore::always_pending(REF));
        let tracker = AttemptTracker::new(store);
        let target = PaymentTarget::Invoice(Uuid::new_v4());

        start(&tracker, target.clone(), REF, fast_plan(TimeoutPolicy::Fail))
            .expect("first start should succeed");

        assert!(matches!(
            tracker.ensure_idle(&target),
            Err(AppError::AttemptInProgress)
        ));
        assert!(matches!(
            start(&tracker, target, "ws_CO_other", fast_plan(TimeoutPolicy::Fail)),
            Err(AppError::AttemptInProgress)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn reservation_holds_the_target_until_dropped() {
        let store = Arc::new(ScriptedStore::always_pending(REF));
        let tracker = AttemptTracker::new(store);
        let target = PaymentTarget::Invoice(Uuid::new_v4());

        let reservation = tracker
            .reserve(target.clone())
            .expect("first claim should succeed");

        // The slot is taken while the charge initiation is in flight.
        assert!(matches!(
            tracker.ensure_idle(&target),
            Err(AppError::AttemptInProgress)
        ));
        assert!(matches!(
            tracker.reserve(target.clone()),
            Err(AppError::AttemptInProgress)
        ));

        // A failed initiation drops the reservation and frees the slot.
        drop(reservation);
        assert!(tracker.ensure_idle(&target).is_ok());

        let attempt = tracker
            .reserve(target)
            .expect("claim after release should succeed")
            .commit(REF.to_string(), fast_plan(TimeoutPolicy::Fail))
            .expect("commit should succeed");
        assert_eq!(attempt.status, AttemptStatus::Pending);
        assert_eq!(attempt.reference, REF);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_a_terminal_attempt_gets_a_fresh_reference() {
        let store = Arc::new(ScriptedStore::terminal_after(
            REF,
            0,
            TransactionStatus::Failed,
        ));
        let tracker = AttemptTracker::new(store);
        let target = PaymentTarget::Invoice(Uuid::new_v4());

        let first = start(&tracker, target.clone(), REF, fast_plan(TimeoutPolicy::Fail))
            .expect("first start should succeed");
        wait_for_terminal(&tracker, first.id).await;

        let second = start(
            &tracker,
            target,
            "ws_CO_261020250002",
            fast_plan(TimeoutPolicy::Fail),
        )
        .expect("retry should be allowed once the first attempt is terminal");
        assert_ne!(first.id, second.id);
        assert_eq!(second.reference, "ws_CO_261020250002");
        assert_eq!(second.status, AttemptStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_a_pending_attempt_stops_all_updates() {
        let store = Arc::new(ScriptedStore::always_pending(REF));
        let tracker = AttemptTracker::new(store.clone());

        let attempt = start(
            &tracker,
            PaymentTarget::PaymentLink("spring-sale".to_string()),
            REF,
            fast_plan(TimeoutPolicy::Fail),
        )
        .expect("start should succeed");

        tracker.cancel(attempt.id).expect("cancel should succeed");
        assert!(matches!(
            tracker.get(attempt.id),
            Err(AppError::AttemptNotFound)
        ));

        // Let the watcher task observe the cancellation, then confirm the
        // read count has settled.
        tokio::time::sleep(Duration::from_secs(1)).await;
        let reads_after_cancel = store.read_count();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.read_count(), reads_after_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_terminal_attempts_past_retention() {
        let pending_store = Arc::new(ScriptedStore::always_pending(REF));
        let tracker = AttemptTracker::new(pending_store);

        let pending = start(
            &tracker,
            PaymentTarget::Invoice(Uuid::new_v4()),
            REF,
            fast_plan(TimeoutPolicy::Fail),
        )
        .expect("start should succeed");

        let failed_store = Arc::new(ScriptedStore::terminal_after(
            "ws_CO_other",
            0,
            TransactionStatus::Failed,
        ));
        let other = AttemptTracker {
            store: failed_store,
            inner: tracker.inner.clone(),
        };
        let finished = start(
            &other,
            PaymentTarget::Invoice(Uuid::new_v4()),
            "ws_CO_other",
            fast_plan(TimeoutPolicy::Fail),
        )
        .expect("start should succeed");
        wait_for_terminal(&other, finished.id).await;

        tracker.sweep_once(Duration::ZERO);

        assert!(tracker.get(pending.id).is_ok());
        assert!(matches!(
            tracker.get(finished.id),
            Err(AppError::AttemptNotFound)
        ));
    }
}
