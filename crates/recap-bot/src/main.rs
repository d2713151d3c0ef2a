use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recap_bot::{
    config::Config,
    runtime,
    state::AppState,
    sweeper::Sweeper,
    transport::{TelegramTransport, Transport},
};
use recap_context::{GenerationGateway, LlmGateway};
use recap_llm::ClientFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting recap bot");
    tracing::info!(
        model = %config.llm.model,
        admin_chat = ?config.bot.admin_chat_id,
        "Config loaded"
    );

    // Generation gateway
    let chat_client = ClientFactory::create_chat_client(config.provider_config())?;
    let gateway: Arc<dyn GenerationGateway> = Arc::new(LlmGateway::new(chat_client));

    // Chat transport
    let poll_timeout = Duration::from_secs(config.bot.poll_timeout_secs);
    let transport: Arc<dyn Transport> = match &config.bot.api_base_url {
        Some(base_url) => Arc::new(TelegramTransport::with_base_url(
            config.telegram_token.clone(),
            base_url.clone(),
            poll_timeout,
        )?),
        None => Arc::new(TelegramTransport::new(config.telegram_token.clone(), poll_timeout)?),
    };

    let sweep_interval = config.retention.sweep_interval();
    let state = Arc::new(AppState::new(config, gateway, transport)?);
    let sweeper = Arc::new(
        Sweeper::new(state.store.clone(), state.retention, sweep_interval)
            .with_notifier(state.notifier.clone())
            .with_composer(state.composer.clone()),
    );

    state.notifier.notify("Bot started").await;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested");
                shutdown.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    runtime::run(state, sweeper, cancel).await?;

    tracing::info!("Recap bot stopped");
    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
