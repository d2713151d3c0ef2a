use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use recap_context::DigestComposer;
use recap_store::{ConversationId, PruneReport, RetentionPolicy, RetentionTarget, StoreError};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::BotError;
use crate::notifier::AdminNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Waiting for the next tick
    Idle,
    Sweeping,
}

/// Outcome of one pass over every conversation
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub conversations: usize,
    pub removed: PruneReport,
    pub failures: Vec<(ConversationId, StoreError)>,
    pub gates_released: usize,
}

/// Periodic eviction of expired messages and the summaries they backed.
///
/// A failing conversation is logged and skipped; the rest of the pass goes on.
pub struct Sweeper {
    target: Arc<dyn RetentionTarget>,
    policy: RetentionPolicy,
    interval: Duration,
    notifier: Option<Arc<AdminNotifier>>,
    composer: Option<Arc<DigestComposer>>,
    state: watch::Sender<SweepState>,
}

impl Sweeper {
    pub fn new(target: Arc<dyn RetentionTarget>, policy: RetentionPolicy, interval: Duration) -> Self {
        let (state, _) = watch::channel(SweepState::Idle);
        Self {
            target,
            policy,
            interval,
            notifier: None,
            composer: None,
            state,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<AdminNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Also release the digest gates of conversations the sweep emptied
    pub fn with_composer(mut self, composer: Arc<DigestComposer>) -> Self {
        self.composer = Some(composer);
        self
    }

    pub fn state(&self) -> SweepState {
        *self.state.borrow()
    }

    pub fn sweep_once(&self, now: DateTime<Utc>) -> SweepSummary {
        self.state.send_replace(SweepState::Sweeping);

        let mut summary = SweepSummary::default();
        for conversation in self.target.conversations() {
            summary.conversations += 1;
            match self.target.prune_conversation(conversation, &self.policy, now) {
                Ok(report) => summary.removed += report,
                Err(e) => {
                    tracing::warn!(conversation, error = %e, "Eviction failed for conversation");
                    summary.failures.push((conversation, e));
                }
            }
        }

        if let Some(composer) = &self.composer {
            summary.gates_released = composer.release_idle_gates();
        }

        self.state.send_replace(SweepState::Idle);

        if summary.removed.messages_removed > 0
            || summary.removed.summaries_removed > 0
            || summary.gates_released > 0
            || !summary.failures.is_empty()
        {
            tracing::info!(
                conversations = summary.conversations,
                messages_removed = summary.removed.messages_removed,
                summaries_removed = summary.removed.summaries_removed,
                failures = summary.failures.len(),
                gates_released = summary.gates_released,
                "Sweep finished"
            );
        }
        summary
    }

    /// Sweep on every tick until `cancel` fires
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), BotError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        tracing::info!(interval_secs = self.interval.as_secs(), "Eviction sweeper started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Eviction sweeper stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let summary = self.sweep_once(Utc::now());
                    self.report(&summary).await;
                }
            }
        }
    }

    async fn report(&self, summary: &SweepSummary) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        for (conversation, error) in &summary.failures {
            notifier
                .report_failure(&format!("Eviction for chat {}", conversation), error)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use recap_store::{ChatMessage, ConversationStore};

    #[test]
    fn test_sweep_returns_to_idle() {
        let store = Arc::new(ConversationStore::new());
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        store
            .messages()
            .append(ChatMessage::new(1, 1, 1, "a", "old", now - chrono::Duration::hours(30)));

        let sweeper = Sweeper::new(store.clone(), RetentionPolicy::default(), Duration::from_secs(10));
        let summary = sweeper.sweep_once(now);

        assert_eq!(sweeper.state(), SweepState::Idle);
        assert_eq!(summary.removed.messages_removed, 1);
        assert!(summary.failures.is_empty());
    }
}
