use std::str::FromStr;

/// What a user can ask of the client (the buttons of the demo page)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Presenter,
    Viewer,
    Stop,
    /// stop, then leave the event loop
    Quit,
}

impl FromStr for UserCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line.trim().to_ascii_lowercase().as_str() {
            "presenter" | "p" => Ok(UserCommand::Presenter),
            "viewer" | "v" => Ok(UserCommand::Viewer),
            "stop" | "s" => Ok(UserCommand::Stop),
            "quit" | "exit" | "q" => Ok(UserCommand::Quit),
            other => Err(format!(
                "unknown command `{other}` (expected presenter, viewer, stop or quit)"
            )),
        }
    }
}
