/// Commands supported by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Ship,    // !ship - fetch and post the current position
    Last,    // !last - post the newest cached snapshot
    Status,  // !status - when the next scheduled update runs
    Test,    // !test - check that a data source answers
    Help,    // !help - list commands
    Unknown, // Unrecognized command
}

impl CommandType {
    /// Parse command type from its name (prefix already stripped)
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "ship" | "where" | "position" => CommandType::Ship,
            "last" | "cached" => CommandType::Last,
            "status" => CommandType::Status,
            "test" | "ping" => CommandType::Test,
            "help" => CommandType::Help,
            _ => CommandType::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommandType::Ship => "ship",
            CommandType::Last => "last",
            CommandType::Status => "status",
            CommandType::Test => "test",
            CommandType::Help => "help",
            CommandType::Unknown => "unknown",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            CommandType::Ship => "Get the ship's current location",
            CommandType::Last => "Show the last captured location",
            CommandType::Status => "Show when the next automatic update is due",
            CommandType::Test => "Test the data source connection",
            CommandType::Help => "Show this help",
            CommandType::Unknown => "",
        }
    }

    pub const ALL: [CommandType; 5] = [
        CommandType::Ship,
        CommandType::Last,
        CommandType::Status,
        CommandType::Test,
        CommandType::Help,
    ];
}

/// Parsed command structure
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub command_type: CommandType,
    pub raw_text: String,
    pub arguments: String,
}

impl ParsedCommand {
    /// Parse a message into a command
    ///
    /// # Examples
    /// ```
    /// use shipwatch_frontend::command::{CommandType, ParsedCommand};
    ///
    /// let cmd = ParsedCommand::parse("!ship now", "!");
    /// assert_eq!(cmd.command_type, CommandType::Ship);
    /// assert_eq!(cmd.arguments, "now");
    /// ```
    pub fn parse(text: &str, prefix: &str) -> Self {
        let trimmed = text.trim();

        if let Some((name, rest)) = Self::extract_command(trimmed, prefix) {
            ParsedCommand {
                command_type: CommandType::from_name(name),
                raw_text: trimmed.to_string(),
                arguments: rest.trim().to_string(),
            }
        } else {
            // Not a command, treat as regular message
            ParsedCommand {
                command_type: CommandType::Unknown,
                raw_text: trimmed.to_string(),
                arguments: String::new(),
            }
        }
    }

    /// Split `<prefix><name> <rest>` into name and rest
    fn extract_command<'a>(text: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
        if prefix.is_empty() {
            return None;
        }
        let body = text.strip_prefix(prefix)?;
        if body.is_empty() || body.starts_with(char::is_whitespace) {
            return None;
        }

        match body.find(char::is_whitespace) {
            Some(space_pos) => Some((&body[..space_pos], &body[space_pos..])),
            None => Some((body, "")),
        }
    }

    /// Check if this is a valid command (not Unknown)
    pub fn is_command(&self) -> bool {
        self.command_type != CommandType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ship_command_and_aliases() {
        for text in ["!ship", "!where", "!POSITION", "  !ship  "] {
            let cmd = ParsedCommand::parse(text, "!");
            assert_eq!(cmd.command_type, CommandType::Ship, "{}", text);
            assert!(cmd.is_command());
        }
    }

    #[test]
    fn test_arguments_trimmed() {
        let cmd = ParsedCommand::parse("!last   extra words  ", "!");
        assert_eq!(cmd.command_type, CommandType::Last);
        assert_eq!(cmd.arguments, "extra words");
    }

    #[test]
    fn test_no_command() {
        let cmd = ParsedCommand::parse("Hello world", "!");
        assert_eq!(cmd.command_type, CommandType::Unknown);
        assert!(!cmd.is_command());

        let cmd = ParsedCommand::parse("! ship", "!");
        assert!(!cmd.is_command());
    }

    #[test]
    fn test_unknown_and_custom_prefix() {
        assert_eq!(
            ParsedCommand::parse("!dance", "!").command_type,
            CommandType::Unknown
        );
        assert_eq!(
            ParsedCommand::parse("sw!ping", "sw!").command_type,
            CommandType::Test
        );
        assert_eq!(
            ParsedCommand::parse("!ping", "sw!").command_type,
            CommandType::Unknown
        );
    }
}
