#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    ChatSave(Option<String>),
    ChatResume(String),
    ChatNew,
    ChatList,
    Pdf(String),
    Image(String),
    Help,
    Quit,
    /// Known command with missing or unexpected arguments; carries the usage line.
    Usage(&'static str),
    Unknown(String),
}

pub const CHAT_USAGE: &str = "Usage: /chat save [name] | /chat resume <name> | /chat new | /chat list";
pub const RESUME_USAGE: &str = "Usage: /chat resume <name>";
pub const PDF_USAGE: &str = "Usage: /pdf <path>";
pub const IMAGE_USAGE: &str = "Usage: /img <path>";

/// Parses a `/`-prefixed line. Command words match case-insensitively;
/// arguments keep their case and inner whitespace.
pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, rest) = split_first_word(trimmed);
    let parsed = match command.to_ascii_lowercase().as_str() {
        "/chat" => parse_chat_command(rest),
        "/pdf" => with_argument(rest, PDF_USAGE, SlashCommand::Pdf),
        "/img" => with_argument(rest, IMAGE_USAGE, SlashCommand::Image),
        "/help" => SlashCommand::Help,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}

fn parse_chat_command(rest: &str) -> SlashCommand {
    let (subcommand, argument) = split_first_word(rest);
    match subcommand.to_ascii_lowercase().as_str() {
        "save" => SlashCommand::ChatSave(non_empty(argument)),
        "resume" => with_argument(argument, RESUME_USAGE, SlashCommand::ChatResume),
        "new" if argument.is_empty() => SlashCommand::ChatNew,
        "list" if argument.is_empty() => SlashCommand::ChatList,
        _ => SlashCommand::Usage(CHAT_USAGE),
    }
}

fn with_argument(
    argument: &str,
    usage: &'static str,
    build: impl FnOnce(String) -> SlashCommand,
) -> SlashCommand {
    match non_empty(argument) {
        Some(argument) => build(argument),
        None => SlashCommand::Usage(usage),
    }
}

fn split_first_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(index) => (&text[..index], text[index..].trim()),
        None => (text, ""),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
