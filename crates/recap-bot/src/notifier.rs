use std::sync::Arc;

use recap_store::ConversationId;

use crate::transport::Transport;

/// Operational notices for the administrative conversation.
///
/// Without a configured admin chat every notice goes to the log only.
pub struct AdminNotifier {
    transport: Arc<dyn Transport>,
    admin_chat: Option<ConversationId>,
}

impl AdminNotifier {
    pub fn new(transport: Arc<dyn Transport>, admin_chat: Option<ConversationId>) -> Self {
        Self {
            transport,
            admin_chat,
        }
    }

    pub fn is_admin_chat(&self, chat: ConversationId) -> bool {
        self.admin_chat == Some(chat)
    }

    /// Best effort; delivery failures are logged and swallowed
    pub async fn notify(&self, text: &str) {
        let Some(chat) = self.admin_chat else {
            tracing::info!(notice = text, "Admin notice (no admin chat configured)");
            return;
        };

        if let Err(e) = self.transport.send_text(chat, text).await {
            tracing::warn!(admin_chat = chat, error = %e, "Failed to deliver admin notice");
        }
    }

    pub async fn report_failure(&self, context: &str, error: &(dyn std::fmt::Display + Sync)) {
        tracing::error!(context, error = %error, "Operation failed");
        if self.admin_chat.is_some() {
            self.notify(&format!("{}: {}", context, error)).await;
        }
    }
}
