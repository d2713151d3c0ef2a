// Supervision of the two long-running tasks: ingestion and eviction

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::dispatcher;
use crate::error::{BotError, Result, TransportError};
use crate::state::AppState;
use crate::sweeper::Sweeper;

/// Pull inbound batches and dispatch them until cancelled.
///
/// Messages are appended in arrival order on this task; each command then
/// runs on its own task so a slow generation never stalls ingestion.
pub async fn ingest_loop(state: Arc<AppState>, cancel: CancellationToken) -> Result<()> {
    let backoff = Duration::from_millis(state.config.bot.error_backoff_ms);
    let mut handlers = JoinSet::new();
    // Only the first failure of a streak reaches the admin chat.
    let mut failing = false;

    tracing::info!("Ingestion loop started");
    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = state.transport.next_batch() => batch,
        };

        match batch {
            Ok(messages) => {
                if failing {
                    tracing::info!("Polling recovered");
                    failing = false;
                }
                for message in messages {
                    let arrived_at = Utc::now();
                    if let Some(request) = dispatcher::ingest(&state, message, arrived_at) {
                        let state = state.clone();
                        handlers.spawn(async move { dispatcher::handle(&state, request, arrived_at).await });
                    }
                }
            }
            Err(TransportError::Closed) => {
                tracing::warn!("Inbound stream closed");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "Polling failed, backing off");
                if !failing {
                    state.notifier.report_failure("Polling updates", &e).await;
                    failing = true;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }

        while let Some(finished) = handlers.try_join_next() {
            if let Err(e) = finished {
                tracing::error!(error = %e, "Command handler panicked");
            }
        }
    }

    handlers.shutdown().await;
    tracing::info!("Ingestion loop stopped");
    Ok(())
}

/// Run ingestion and eviction until `cancel` fires.
///
/// Either task ending on its own is fatal: the other is cancelled and the
/// first failure is returned once both have stopped.
pub async fn run(state: Arc<AppState>, sweeper: Arc<Sweeper>, cancel: CancellationToken) -> Result<()> {
    let mut tasks = JoinSet::new();
    tasks.spawn(supervised("ingestion", ingest_loop(state, cancel.clone())));
    tasks.spawn(supervised("sweeper", sweeper.run(cancel.clone())));

    let mut outcome = Ok(());
    while let Some(joined) = tasks.join_next().await {
        let cancelled = cancel.is_cancelled();
        cancel.cancel();

        let result = match joined {
            Ok((_, Ok(()))) if cancelled => Ok(()),
            Ok((task, Ok(()))) => Err(BotError::TaskExited(task)),
            Ok((_, Err(e))) => Err(e),
            Err(e) => Err(BotError::TaskPanicked {
                task: "supervisor",
                reason: e.to_string(),
            }),
        };

        if let Err(e) = result {
            tracing::error!(error = %e, "Background task failed");
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }
    }
    outcome
}

/// Run `task` on its own tokio task so a panic comes back as an error tagged
/// with the task name
async fn supervised<F>(name: &'static str, task: F) -> (&'static str, Result<()>)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    match tokio::spawn(task).await {
        Ok(result) => (name, result),
        Err(e) => (
            name,
            Err(BotError::TaskPanicked {
                task: name,
                reason: e.to_string(),
            }),
        ),
    }
}
