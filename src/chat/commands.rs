//! Slash command parsing for the chat application.
//!
//! Input starting with `/` controls the session locally and is never sent to
//! the analytics backend as a question.

/// Questions offered on an empty conversation.
pub const EXAMPLE_QUESTIONS: &[&str] = &[
    "Show me today's revenue breakdown",
    "What are the most popular menu items?",
    "Generate a revenue chart by order type",
    "Analyze customer segments and spending",
];

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start a new session, abandoning any outstanding query.
    New,

    /// List the capabilities the backend advertises.
    Tools,

    /// List the example questions, or send the n-th one (1-based).
    Examples(Option<usize>),

    /// Probe the backend health endpoint.
    Health,

    /// Turn chart generation on or off.
    Chart(bool),

    /// Set the chart type sent with queries.
    ChartType(String),

    /// Save the transcript to a specific file immediately.
    SaveTranscript(String),

    /// Display session statistics.
    Stats,

    /// Show the current configuration.
    ShowConfig,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a question.
///
/// # Examples
///
/// ```
/// # use askdata::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/chart off").is_some());
/// assert!(parse_command("What sold best yesterday?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" | "clear" | "reset" => ChatCommand::New,
        "tools" => ChatCommand::Tools,
        "examples" => match argument {
            None => ChatCommand::Examples(None),
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) if (1..=EXAMPLE_QUESTIONS.len()).contains(&n) => {
                    ChatCommand::Examples(Some(n))
                }
                _ => ChatCommand::Invalid(format!(
                    "/examples expects a number between 1 and {}",
                    EXAMPLE_QUESTIONS.len()
                )),
            },
        },
        "health" => ChatCommand::Health,
        "chart" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Chart(value),
            None => ChatCommand::Invalid("/chart expects 'on' or 'off'".to_string()),
        },
        "chart_type" => match argument {
            Some(arg) => ChatCommand::ChartType(arg.to_lowercase()),
            None => ChatCommand::Invalid("/chart_type requires a chart type".to_string()),
        },
        "save" => match argument {
            Some(arg) => ChatCommand::SaveTranscript(arg.to_string()),
            None => ChatCommand::Invalid("/save requires a file path".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new session (alias: /clear)
  /tools                 List backend capabilities
  /examples [n]          List example questions, or ask the n-th one
  /health                Check that the backend is reachable
  /chart on|off          Request charts with answers
  /chart_type <type>     Chart type to request (e.g., auto, bar, pie)
  /save <file>           Save the current transcript immediately
  /stats                 Show session statistics
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl+C while waiting for an answer to abandon it and start over."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_new_session() {
        assert_eq!(parse_command("/new"), Some(ChatCommand::New));
        assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::New));
        assert_eq!(parse_command("/reset"), Some(ChatCommand::New));
    }

    #[test]
    fn parse_examples() {
        assert_eq!(parse_command("/examples"), Some(ChatCommand::Examples(None)));
        assert_eq!(
            parse_command("/examples 2"),
            Some(ChatCommand::Examples(Some(2)))
        );
        assert!(matches!(
            parse_command("/examples 0"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("between 1 and 4")
        ));
        assert!(matches!(
            parse_command("/examples lots"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_chart_toggle() {
        assert_eq!(parse_command("/chart on"), Some(ChatCommand::Chart(true)));
        assert_eq!(parse_command("/chart OFF"), Some(ChatCommand::Chart(false)));
        assert!(matches!(
            parse_command("/chart maybe"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("expects")
        ));
        assert!(matches!(
            parse_command("/chart"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_chart_type() {
        assert_eq!(
            parse_command("/chart_type  Pie "),
            Some(ChatCommand::ChartType("pie".to_string()))
        );
        assert_eq!(
            parse_command("/chart_type"),
            Some(ChatCommand::Invalid(
                "/chart_type requires a chart type".to_string()
            ))
        );
    }

    #[test]
    fn parse_save() {
        assert_eq!(
            parse_command("/save session.json"),
            Some(ChatCommand::SaveTranscript("session.json".to_string()))
        );
        assert!(matches!(
            parse_command("/save"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn parse_informational() {
        assert_eq!(parse_command("/tools"), Some(ChatCommand::Tools));
        assert_eq!(parse_command("/health"), Some(ChatCommand::Health));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/frobnicate now"),
            Some(ChatCommand::Invalid("Unknown command: /frobnicate".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("What is revenue by order type?"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_mentions_every_command() {
        let help = help_text();
        for name in [
            "/new", "/tools", "/examples", "/health", "/chart", "/chart_type", "/save", "/stats",
            "/config", "/help", "/quit",
        ] {
            assert!(help.contains(name), "missing {name}");
        }
    }

    #[test]
    fn example_questions_are_not_blank() {
        assert_eq!(EXAMPLE_QUESTIONS.len(), 4);
        assert!(EXAMPLE_QUESTIONS.iter().all(|q| !q.trim().is_empty()));
    }
}
