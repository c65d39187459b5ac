use super::types::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let cmd = trimmed.split_whitespace().next()?.to_lowercase();
    match cmd.as_str() {
        "/clear" => Some(Command::Clear),
        "/help" | "/?" => Some(Command::Help),
        _ => None,
    }
}
