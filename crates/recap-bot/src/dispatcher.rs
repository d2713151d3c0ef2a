// Routes inbound messages: every message is ingested, commands then run

use chrono::{DateTime, Duration, Utc};
use recap_context::{Digest, DigestError, PromptKind};
use recap_store::ConversationId;

use crate::command::Command;
use crate::state::AppState;
use crate::transport::InboundMessage;

pub const NOTHING_TO_SUMMARIZE: &str = "Немає нових повідомлень для підсумку.";
pub const TRY_LATER: &str = "Не вдалося отримати відповідь. Спробуйте пізніше.";
pub const QUESTION_USAGE: &str = "Використання: /question [питання]";
pub const PARROT_USAGE: &str = "Використання: /parrot [ім'я]";
pub const POLL_ADMINS_ONLY: &str = "Опитування можуть створювати лише адміністратори чату.";

const HELP: &str = "/summary - отримати підсумок останніх повідомлень з попереднього запиту\n\
/summary_hour - отримати підсумок останньої години\n\
/summary_day - отримати підсумок останнього дня\n\
/question [питання] - задати питання та отримати відповідь\n\
/respect - виміряти рівень поваги в чаті\n\
/parrot [ім'я] - повторити манеру користувача\n\
/poll [питання] | [варіант] | [варіант] - створити опитування (адміністратори)\n";

const ADMIN_HELP: &str = "/prompt_summary [prompt] - змінити промпт для підсумку\n\
/prompt_summary_reset - скинути промпт для підсумку\n\
/prompt_respect [prompt] - змінити промпт для вимірювання поваги\n\
/prompt_respect_reset - скинути промпт для вимірювання поваги\n\
/prompt_answer [prompt] - змінити промпт для відповіді на питання\n\
/prompt_answer_reset - скинути промпт для відповіді на питання\n\
/prompt_parrot [prompt] - змінити промпт для повторення повідомлення\n\
/prompt_parrot_reset - скинути промпт для повторення повідомлення\n\
/model [model] - змінити модель\n\
/model_reset - повернути модель за замовчуванням\n";

/// A command waiting to run, with the identity of whoever sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub chat_id: ConversationId,
    pub author_id: i64,
    pub author_name: String,
    pub command: Command,
}

/// What a command sends back to its conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Poll { question: String, options: Vec<String> },
    Nothing,
}

/// Store the message, stamped with `arrived_at`, and return the command it
/// carries, if any.
///
/// Runs on the ingestion task so messages of one conversation are appended
/// in arrival order.
pub fn ingest(state: &AppState, message: InboundMessage, arrived_at: DateTime<Utc>) -> Option<Request> {
    tracing::debug!(
        chat_id = message.chat_id,
        author = %message.author_name,
        message_id = message.message_id,
        "Message received"
    );

    let command = Command::parse(&message.text);
    let request = command.map(|command| Request {
        chat_id: message.chat_id,
        author_id: message.author_id,
        author_name: message.author_name.clone(),
        command,
    });

    state.store.messages().append(message.into_chat_message(arrived_at));
    request
}

/// Run a command and deliver its reply
pub async fn handle(state: &AppState, request: Request, now: DateTime<Utc>) {
    let chat = request.chat_id;
    let outbound = execute(state, &request, now).await;

    let sent = match &outbound {
        Outbound::Text(text) => state.transport.send_text(chat, text).await,
        Outbound::Poll { question, options } => state.transport.send_poll(chat, question, options).await,
        Outbound::Nothing => Ok(()),
    };

    if let Err(e) = sent {
        state
            .notifier
            .report_failure(&format!("Reply to {:?} in chat {}", request.command, chat), &e)
            .await;
    }
}

/// Run a command against the shared state and decide the reply
pub async fn execute(state: &AppState, request: &Request, now: DateTime<Utc>) -> Outbound {
    let chat = request.chat_id;

    if request.command.is_privileged() && !state.notifier.is_admin_chat(chat) {
        tracing::debug!(chat_id = chat, command = ?request.command, "Privileged command outside admin chat ignored");
        return Outbound::Nothing;
    }

    match &request.command {
        Command::Summary => {
            let digest = state.composer.digest_since_last_request(chat, now).await;
            digest_reply(state, request, digest).await
        }
        Command::SummaryHour => {
            let digest = state.composer.digest_last_hour(chat, now).await;
            digest_reply(state, request, digest).await
        }
        Command::SummaryDay => {
            let digest = state.composer.digest_window(chat, now - Duration::days(1), now).await;
            digest_reply(state, request, digest).await
        }
        Command::Question(question) if question.is_empty() => Outbound::Text(QUESTION_USAGE.to_string()),
        Command::Question(question) => {
            let answer = state
                .responder
                .answer_question(chat, question, &request.author_name, now)
                .await;
            text_reply(state, request, answer).await
        }
        Command::Respect => {
            let score = state.responder.respect(chat, now).await;
            text_reply(state, request, score).await
        }
        Command::Parrot(target) if target.is_empty() => Outbound::Text(PARROT_USAGE.to_string()),
        Command::Parrot(target) => {
            let imitation = state.responder.parrot(chat, target, now).await;
            text_reply(state, request, imitation).await
        }
        Command::Poll { question, options } => match state.transport.is_admin(chat, request.author_id).await {
            Ok(true) => Outbound::Poll {
                question: question.clone(),
                options: options.clone(),
            },
            Ok(false) => Outbound::Text(POLL_ADMINS_ONLY.to_string()),
            Err(e) => {
                state
                    .notifier
                    .report_failure(&format!("Role lookup in chat {}", chat), &e)
                    .await;
                Outbound::Text(TRY_LATER.to_string())
            }
        },
        Command::Help => {
            let mut help = HELP.to_string();
            if state.notifier.is_admin_chat(chat) {
                help.push_str(ADMIN_HELP);
            }
            Outbound::Text(help)
        }
        Command::SetPrompt { kind, text } => {
            state.prompts.set_prompt(*kind, text.clone()).await;
            Outbound::Text(prompt_ack(*kind, "updated"))
        }
        Command::ResetPrompt(kind) => {
            state.prompts.reset_prompt(*kind).await;
            Outbound::Text(prompt_ack(*kind, "reset"))
        }
        Command::SetModel(model) => {
            state.prompts.set_model(model.clone()).await;
            Outbound::Text(format!("Model updated: {}", model))
        }
        Command::ResetModel => {
            state.prompts.reset_model().await;
            Outbound::Text(format!("Model reset: {}", state.prompts.model().await))
        }
    }
}

fn prompt_ack(kind: PromptKind, action: &str) -> String {
    format!("Prompt {} {}", kind, action)
}

async fn digest_reply(
    state: &AppState,
    request: &Request,
    digest: Result<Digest, DigestError>,
) -> Outbound {
    match digest {
        Ok(Digest::Empty) => Outbound::Text(NOTHING_TO_SUMMARIZE.to_string()),
        Ok(digest) => {
            tracing::info!(chat_id = request.chat_id, buckets = digest.bucket_count(), "Digest delivered");
            Outbound::Text(digest.text().unwrap_or(NOTHING_TO_SUMMARIZE).to_string())
        }
        Err(e) => failure_reply(state, request, &e).await,
    }
}

async fn text_reply(state: &AppState, request: &Request, result: Result<String, DigestError>) -> Outbound {
    match result {
        Ok(text) => Outbound::Text(text),
        Err(e) => failure_reply(state, request, &e).await,
    }
}

async fn failure_reply(state: &AppState, request: &Request, error: &DigestError) -> Outbound {
    state
        .notifier
        .report_failure(
            &format!("{:?} in chat {} failed", request.command, request.chat_id),
            error,
        )
        .await;
    Outbound::Text(TRY_LATER.to_string())
}
