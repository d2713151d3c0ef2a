use std::sync::Arc;

use recap_context::{DigestComposer, GenerationGateway, PromptBook, Responder};
use recap_store::{ConversationStore, RetentionPolicy};

use crate::config::Config;
use crate::error::Result;
use crate::notifier::AdminNotifier;
use crate::transport::Transport;

/// Shared application state passed to every command handler
///
/// The store is the only mutable state shared with the eviction sweep.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ConversationStore>,
    pub prompts: Arc<PromptBook>,
    pub composer: Arc<DigestComposer>,
    pub responder: Arc<Responder>,
    pub transport: Arc<dyn Transport>,
    pub notifier: Arc<AdminNotifier>,
    pub retention: RetentionPolicy,
}

impl AppState {
    pub fn new(
        config: Config,
        gateway: Arc<dyn GenerationGateway>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let retention = config.retention.policy()?;
        let settings = config.digest_settings();

        let store = Arc::new(ConversationStore::new());
        let prompts = Arc::new(PromptBook::new(config.llm.model.clone()));
        let composer = Arc::new(DigestComposer::new(
            store.clone(),
            gateway.clone(),
            prompts.clone(),
            settings.clone(),
        ));
        let responder = Arc::new(Responder::new(store.clone(), gateway, prompts.clone(), settings));
        let notifier = Arc::new(AdminNotifier::new(transport.clone(), config.bot.admin_chat_id));

        Ok(Self {
            config: Arc::new(config),
            store,
            prompts,
            composer,
            responder,
            transport,
            notifier,
            retention,
        })
    }
}
