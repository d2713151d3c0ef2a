use recap_store::ChatMessage;

pub const SYSTEM_CONTEXT: &str =
    "You are a chat helper for a group conversation. Answer in the language the chat is written in.";

pub const DEFAULT_SUMMARY_PROMPT: &str = "Make a summary of these messages in a few sentences or paragraphs. \
Use bullet points if necessary. \
Represent the content and main points of the conversation rather than its general vibe. \
People should be addressed as Пан or Пані. \
Try to match the chat's tone when writing the summary.";

pub const DEFAULT_RESPECT_PROMPT: &str = "You have chat messages. \
Judging by the conversation, measure the current level of respect in the chat from 1 to 10 and explain the score. \
People should be addressed as Пан or Пані. The word for respect is повага.";

pub const DEFAULT_ANSWER_PROMPT: &str = "You have context from messages of this chat. \
Answer the user's question. \
Everyone should be addressed as Пан or Пані.";

pub const DEFAULT_PARROT_PROMPT: &str = "You have context from messages of this chat. \
Write one new message the way the named user would write it, imitating their style and typical topics.";

/// Second-stage instruction for merging per-hour summaries
pub const DEFAULT_MERGE_PROMPT: &str = "Below are summaries of consecutive hours of the same chat, \
each tagged with the hour it covers. Merge them into one coherent summary of the whole period. \
Keep the chronology, drop repetition, and follow these style instructions:";

/// JSON rendering of messages as the model reads them
pub(crate) fn transcript(messages: &[ChatMessage]) -> String {
    // Strings, integers and timestamps only: encoding cannot fail.
    serde_json::to_string(messages).unwrap_or_default()
}
