/// Slash commands understood by the relay before a prompt reaches the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Forget the session's conversation; the next prompt starts fresh.
    Clear,
    Help,
}

pub const HELP_TEXT: &str = "commands:\n  /clear  start a fresh conversation in this session\n  /help   show this list\n  /quit   leave the chat";
