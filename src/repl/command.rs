//! Console Commands
//!
//! Maps a line of console input to the action the conversation loop takes.

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// End the conversation
    Quit,

    /// Show available commands
    Help,

    /// Show known models
    Models,

    /// Show where to get API credits
    Credits,

    /// Switch between streamed and whole responses
    ToggleStream,

    /// Blank input
    Skip,

    /// Text to send to the model
    Message(String),
}

impl Command {
    /// Parse a line; commands are matched case-insensitively after trimming
    pub fn parse(line: &str) -> Self {
        let input = line.trim();

        match input.to_lowercase().as_str() {
            "" => Command::Skip,
            "quit" | "exit" | "bye" => Command::Quit,
            "help" => Command::Help,
            "models" => Command::Models,
            "credits" => Command::Credits,
            "stream" => Command::ToggleStream,
            _ => Command::Message(input.to_string()),
        }
    }
}
