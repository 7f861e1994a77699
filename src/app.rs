use std::fs;
use std::path::{Path, PathBuf};

use agent_provider::{Attachment, Message, Role};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::commands::{parse_slash_command, SlashCommand};
use crate::mediator::{
    ApprovalDecision, PendingApproval, ToolCallMediator, TurnError, TurnState, TurnStatus,
};
use crate::session::{ResumeOutcome, SessionManager};

pub const HELP_TEXT: &str = "Commands:
  /chat save [name]    save the conversation (defaults to the current session name)
  /chat resume <name>  switch to a saved session
  /chat new            clear the conversation
  /chat list           list saved sessions
  /pdf <path>          ask about a PDF file
  /img <path>          ask about an image
  /help                show this help
  /quit, /exit         save and exit
End a line with \\ to continue typing on the next line.";

pub const APPROVAL_PENDING_NOTICE: &str =
    "A command is awaiting approval. Answer it before switching sessions.";

pub const PDF_MEDIA_TYPE: &str = "application/pdf";
pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Pdf,
    Image,
}

impl AttachmentKind {
    fn instruction_prompt(self) -> &'static str {
        match self {
            Self::Pdf => "Enter your prompt for the PDF: ",
            Self::Image => "Enter your prompt for the image: ",
        }
    }

    fn not_found(self) -> &'static str {
        match self {
            Self::Pdf => "PDF file not found.",
            Self::Image => "Image file not found.",
        }
    }
}

/// A validated attachment path waiting for the user's instruction text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub kind: AttachmentKind,
    pub path: PathBuf,
}

impl PendingAttachment {
    #[must_use]
    pub fn prompt(&self) -> &'static str {
        self.kind.instruction_prompt()
    }

    #[must_use]
    pub fn media_type(&self) -> &'static str {
        match self.kind {
            AttachmentKind::Pdf => PDF_MEDIA_TYPE,
            AttachmentKind::Image => image_media_type(&self.path),
        }
    }
}

/// Image media type from the file extension, PNG when unrecognized.
#[must_use]
pub fn image_media_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => DEFAULT_IMAGE_MEDIA_TYPE,
    }
}

/// What the host has to do before the next regular input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ready,
    NeedsApproval(PendingApproval),
    NeedsAttachmentPrompt(PendingAttachment),
    Exit,
}

/// Chat controller. Holds no I/O: user-visible text is queued and drained by
/// the host with [`ChatApp::take_output`].
pub struct ChatApp {
    session: SessionManager,
    mediator: ToolCallMediator,
    output: Vec<String>,
    pending_attachment: Option<PendingAttachment>,
    should_exit: bool,
}

impl ChatApp {
    pub fn new(session: SessionManager, mediator: ToolCallMediator) -> Self {
        Self {
            session,
            mediator,
            output: Vec::new(),
            pending_attachment: None,
            should_exit: false,
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    #[must_use]
    pub fn mediator(&self) -> &ToolCallMediator {
        &self.mediator
    }

    #[must_use]
    pub fn should_exit(&self) -> bool {
        self.should_exit
    }

    /// Drains queued output lines in the order they were produced.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn on_submit(&mut self, input: &str) -> SubmitOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SubmitOutcome::Ready;
        }

        match parse_slash_command(text) {
            Some(command) => self.on_command(command),
            None => self.run_turn(text, Vec::new()),
        }
    }

    pub fn on_approval(&mut self, decision: ApprovalDecision) -> SubmitOutcome {
        let result = self.mediator.resolve(self.session.log_mut(), decision);
        self.on_turn_result(result)
    }

    /// Sends the instruction text together with the pending attachment.
    pub fn on_attachment_prompt(&mut self, instruction: &str) -> SubmitOutcome {
        let Some(pending) = self.pending_attachment.take() else {
            return SubmitOutcome::Ready;
        };

        let bytes = match fs::read(&pending.path) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(path = %pending.path.display(), %error, "failed to read attachment");
                self.push(format!(
                    "Error: failed to read {}: {error}",
                    pending.path.display()
                ));
                return SubmitOutcome::Ready;
            }
        };
        tracing::debug!(path = %pending.path.display(), bytes = bytes.len(), "attaching file");

        let attachment = Attachment::new(pending.media_type(), STANDARD.encode(bytes));
        self.run_turn(instruction.trim(), vec![attachment])
    }

    /// Drops any suspended turn, saves the session under its current name and
    /// marks the app for exit.
    pub fn shutdown(&mut self) {
        if self.should_exit {
            return;
        }
        self.mediator.abandon();
        self.pending_attachment = None;
        self.save_session(None);
        self.should_exit = true;
    }

    fn on_command(&mut self, command: SlashCommand) -> SubmitOutcome {
        let switches_session = matches!(command, SlashCommand::ChatNew | SlashCommand::ChatResume(_));
        if switches_session && self.mediator.state() == TurnState::AwaitingHumanApproval {
            self.push(APPROVAL_PENDING_NOTICE);
            return match self.mediator.pending_approval() {
                Some(pending) => SubmitOutcome::NeedsApproval(pending),
                None => SubmitOutcome::Ready,
            };
        }

        match command {
            SlashCommand::ChatSave(name) => self.save_session(name.as_deref()),
            SlashCommand::ChatResume(name) => self.resume_session(&name),
            SlashCommand::ChatNew => {
                self.session.new_session();
                self.push("Started a new session.");
            }
            SlashCommand::ChatList => self.list_sessions(),
            SlashCommand::Pdf(path) => return self.stage_attachment(AttachmentKind::Pdf, path),
            SlashCommand::Image(path) => return self.stage_attachment(AttachmentKind::Image, path),
            SlashCommand::Help => self.push(HELP_TEXT),
            SlashCommand::Quit => {
                self.shutdown();
                return SubmitOutcome::Exit;
            }
            SlashCommand::Usage(usage) => self.push(usage),
            SlashCommand::Unknown(command) => self.push(format!("Unknown command: {command}")),
        }

        SubmitOutcome::Ready
    }

    fn run_turn(&mut self, text: &str, attachments: Vec<Attachment>) -> SubmitOutcome {
        let result = self
            .mediator
            .submit(self.session.log_mut(), text, attachments);
        self.on_turn_result(result)
    }

    fn on_turn_result(&mut self, result: Result<TurnStatus, TurnError>) -> SubmitOutcome {
        match result {
            Ok(TurnStatus::Completed(message)) => {
                self.push(render_assistant(&message));
                SubmitOutcome::Ready
            }
            Ok(TurnStatus::AwaitingApproval(pending)) => SubmitOutcome::NeedsApproval(pending),
            Err(error) => {
                tracing::error!(%error, "turn failed");
                self.push(format!("Error: {error}"));
                SubmitOutcome::Ready
            }
        }
    }

    fn stage_attachment(&mut self, kind: AttachmentKind, path: String) -> SubmitOutcome {
        let path = PathBuf::from(path);
        if !path.is_file() {
            self.push(kind.not_found());
            return SubmitOutcome::Ready;
        }

        let pending = PendingAttachment { kind, path };
        self.pending_attachment = Some(pending.clone());
        SubmitOutcome::NeedsAttachmentPrompt(pending)
    }

    fn save_session(&mut self, name: Option<&str>) {
        match self.session.save(name) {
            Ok(_) => {
                let message = format!("Session '{}' saved.", self.session.name());
                self.push(message);
            }
            Err(error) => {
                tracing::error!(%error, "failed to save session");
                self.push(format!("Error: failed to save session: {error}"));
            }
        }
    }

    fn resume_session(&mut self, name: &str) {
        match self.session.resume(name) {
            ResumeOutcome::Resumed { .. } => {
                self.push(format!("Resumed session: {name}"));
                let history = render_history(self.session.log().all_messages());
                if !history.is_empty() {
                    self.push(history);
                }
            }
            ResumeOutcome::NotFound => {
                self.push(format!(
                    "No session named '{name}' found. Starting a new one."
                ));
            }
            ResumeOutcome::Corrupt { reason } => {
                self.push(format!(
                    "Session '{name}' could not be loaded ({reason}). Starting a new one."
                ));
            }
            ResumeOutcome::InvalidName { reason } => {
                self.push(format!("Invalid session name '{name}': {reason}"));
            }
        }
    }

    fn list_sessions(&mut self) {
        match self.session.list() {
            Ok(names) if names.is_empty() => self.push("No saved sessions."),
            Ok(names) => self.push(format!("Saved sessions: {}", names.join(", "))),
            Err(error) => self.push(format!("Error: failed to list sessions: {error}")),
        }
    }

    fn push(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }
}

/// Assistant reply followed by its numbered sources, if any.
#[must_use]
pub fn render_assistant(message: &Message) -> String {
    let mut text = format!("LLM: {}", message.content);
    let mut citations = message.citations().peekable();
    if citations.peek().is_some() {
        text.push_str("\nSources:");
        for (index, citation) in citations.enumerate() {
            if citation.title.is_empty() {
                text.push_str(&format!("\n  [{}] {}", index + 1, citation.url));
            } else {
                text.push_str(&format!(
                    "\n  [{}] {} <{}>",
                    index + 1,
                    citation.title,
                    citation.url
                ));
            }
        }
    }
    text
}

/// User and assistant text of a resumed log; tool traffic and the system
/// prompt are not shown.
#[must_use]
pub fn render_history(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|message| !message.content.is_empty())
        .filter_map(|message| match message.role {
            Role::User => Some(format!("You: {}", message.content)),
            Role::Assistant => Some(render_assistant(message)),
            Role::System | Role::Tool => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
