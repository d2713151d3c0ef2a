use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, StoreError};
use crate::models::ConversationId;

/// The two process-wide retention horizons.
///
/// The message horizon must be at least as long as the summary horizon so a
/// cached summary never outlives the messages it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    message_horizon: Duration,
    summary_horizon: Duration,
}

impl RetentionPolicy {
    pub fn new(message_horizon: Duration, summary_horizon: Duration) -> Result<Self> {
        if summary_horizon <= Duration::zero() {
            return Err(StoreError::InvalidPolicy(
                "summary horizon must be positive".to_string(),
            ));
        }
        if message_horizon < summary_horizon {
            return Err(StoreError::InvalidPolicy(format!(
                "message horizon ({}s) is shorter than summary horizon ({}s)",
                message_horizon.num_seconds(),
                summary_horizon.num_seconds()
            )));
        }
        Ok(Self {
            message_horizon,
            summary_horizon,
        })
    }

    pub fn message_horizon(&self) -> Duration {
        self.message_horizon
    }

    pub fn summary_horizon(&self) -> Duration {
        self.summary_horizon
    }

    pub fn message_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.message_horizon
    }

    pub fn summary_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.summary_horizon
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            message_horizon: Duration::hours(24),
            summary_horizon: Duration::hours(1),
        }
    }
}

/// What one conversation lost during a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub messages_removed: usize,
    pub summaries_removed: usize,
}

impl std::ops::AddAssign for PruneReport {
    fn add_assign(&mut self, other: Self) {
        self.messages_removed += other.messages_removed;
        self.summaries_removed += other.summaries_removed;
    }
}

/// Anything the eviction sweep can walk and prune conversation by conversation
pub trait RetentionTarget: Send + Sync {
    fn conversations(&self) -> Vec<ConversationId>;

    fn prune_conversation(
        &self,
        conversation: ConversationId,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> Result<PruneReport>;
}
