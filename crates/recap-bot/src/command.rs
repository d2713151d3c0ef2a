use recap_context::PromptKind;

/// A recognized bot command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Digest of everything since the previous `/summary`
    Summary,
    SummaryHour,
    SummaryDay,
    Question(String),
    Respect,
    Parrot(String),
    Poll { question: String, options: Vec<String> },
    Help,
    SetPrompt { kind: PromptKind, text: String },
    ResetPrompt(PromptKind),
    SetModel(String),
    ResetModel,
}

impl Command {
    /// Administrative commands only run in the privileged conversation
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::SetPrompt { .. } | Self::ResetPrompt(_) | Self::SetModel(_) | Self::ResetModel
        )
    }

    /// Parse a message body. Plain chat text and unknown commands give `None`.
    ///
    /// The command word must match exactly; a trailing `@botname` is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;

        let (word, argument) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim()),
            None => (rest, ""),
        };
        let name = word.split('@').next().unwrap_or(word);

        let command = match name {
            "summary" => Self::Summary,
            "summary_hour" => Self::SummaryHour,
            "summary_day" => Self::SummaryDay,
            "question" => Self::Question(argument.to_string()),
            "respect" => Self::Respect,
            "parrot" => Self::Parrot(argument.to_string()),
            "poll" => Self::parse_poll(argument)?,
            "help" | "start" => Self::Help,
            "model" if !argument.is_empty() => Self::SetModel(argument.to_string()),
            "model_reset" => Self::ResetModel,
            other => Self::parse_prompt(other, argument)?,
        };
        Some(command)
    }

    fn parse_prompt(name: &str, argument: &str) -> Option<Self> {
        let kind = name.strip_prefix("prompt_")?;
        if let Some(kind) = kind.strip_suffix("_reset") {
            return kind.parse().ok().map(Self::ResetPrompt);
        }
        if argument.is_empty() {
            return None;
        }
        let kind: PromptKind = kind.parse().ok()?;
        Some(Self::SetPrompt {
            kind,
            text: argument.to_string(),
        })
    }

    /// `question | option | option ...`, at least two options
    fn parse_poll(argument: &str) -> Option<Self> {
        let mut parts = argument.split('|').map(str::trim).filter(|part| !part.is_empty());
        let question = parts.next()?.to_string();
        let options: Vec<String> = parts.map(str::to_string).collect();
        if options.len() < 2 {
            return None;
        }
        Some(Self::Poll { question, options })
    }
}
