use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start over with an empty conversation
    Clear,
    /// Show help
    Help,
    /// Exit the application
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Clear => "clear the conversation (also Ctrl+L)",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "exit the application (also Esc or Ctrl+C)",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command can be run while a reply is streaming.
    pub fn available_during_streaming(self) -> bool {
        match self {
            SlashCommand::Clear => false,
            SlashCommand::Help | SlashCommand::Quit => true,
        }
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let body = input.trim().strip_prefix('/')?;

    // Anything after the command name is ignored.
    let head = body.split_whitespace().next()?.to_lowercase();

    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "reset" | "new" => Some(SlashCommand::Clear),
        "h" | "?" => Some(SlashCommand::Help),
        "q" | "exit" | "bye" => Some(SlashCommand::Quit),
        _ => None,
    })?;

    Some(ParsedCommand { command })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n");
    for command in SlashCommand::iter() {
        help.push_str(&format!("/{} - {}\n", command.command(), command.description()));
    }
    help.push_str("Enter sends, Shift+Enter inserts a newline.");
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        let parsed = parse_slash_command("/clear").unwrap();
        assert_eq!(parsed.command, SlashCommand::Clear);

        assert_eq!(parse_slash_command("/Q").unwrap().command, SlashCommand::Quit);
        assert_eq!(parse_slash_command("  /reset  ").unwrap().command, SlashCommand::Clear);
        assert_eq!(parse_slash_command("/help me out").unwrap().command, SlashCommand::Help);
    }

    #[test]
    fn ordinary_text_is_not_a_command() {
        assert_eq!(parse_slash_command("hello /clear"), None);
        assert_eq!(parse_slash_command("/unknown"), None);
        assert_eq!(parse_slash_command("/"), None);
    }

    #[test]
    fn help_lists_every_command() {
        let help = get_help_text();
        for command in SlashCommand::iter() {
            assert!(help.contains(&format!("/{}", command.command())));
        }
    }
}
