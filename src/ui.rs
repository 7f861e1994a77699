//! The interface the chat core needs from a terminal front-end, plus a
//! line-based implementation over any reader/writer pair.

use std::io::{self, BufRead, Write};

use crate::mediator::ApprovalDecision;

pub const USER_PROMPT: &str = "You: ";
pub const CONTINUATION_PROMPT: &str = "... ";
pub const CONFIRMATION_PROMPT: &str = "Choice [1-3]: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Text(String),
    EndOfInput,
}

pub trait ChatUi {
    fn read_input(&mut self, prompt: &str) -> io::Result<InputEvent>;

    fn render_log(&mut self, text: &str) -> io::Result<()>;

    /// Blocks until the user picks an option. End of input counts as cancel.
    fn request_shell_confirmation(&mut self, command: &str) -> io::Result<ApprovalDecision>;
}

pub struct TerminalUi<R, W> {
    input: R,
    output: W,
}

impl TerminalUi<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalUi<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn prompt(&mut self, prompt: &str) -> io::Result<()> {
        write!(self.output, "{prompt}")?;
        self.output.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

impl<R: BufRead, W: Write> ChatUi for TerminalUi<R, W> {
    /// A trailing `\` continues the entry on the next line.
    fn read_input(&mut self, prompt: &str) -> io::Result<InputEvent> {
        self.prompt(prompt)?;
        let mut text = String::new();
        let mut started = false;

        loop {
            let Some(line) = self.read_line()? else {
                if started {
                    return Ok(InputEvent::Text(text));
                }
                writeln!(self.output)?;
                return Ok(InputEvent::EndOfInput);
            };
            started = true;

            match line.strip_suffix('\\') {
                Some(head) => {
                    text.push_str(head);
                    text.push('\n');
                    self.prompt(CONTINUATION_PROMPT)?;
                }
                None => {
                    text.push_str(&line);
                    return Ok(InputEvent::Text(text));
                }
            }
        }
    }

    fn render_log(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{text}")?;
        self.output.flush()
    }

    fn request_shell_confirmation(&mut self, command: &str) -> io::Result<ApprovalDecision> {
        writeln!(self.output, "LLM wants to execute: {command}")?;
        writeln!(self.output, "1. Allow\n2. Deny\n3. Stop execution and give advice")?;

        loop {
            self.prompt(CONFIRMATION_PROMPT)?;
            let Some(line) = self.read_line()? else {
                writeln!(self.output)?;
                return Ok(ApprovalDecision::Cancel);
            };
            match line.trim() {
                "1" => return Ok(ApprovalDecision::Allow),
                "2" => return Ok(ApprovalDecision::Deny),
                "3" => return Ok(ApprovalDecision::Advise),
                _ => writeln!(self.output, "Please enter 1, 2, or 3.")?,
            }
        }
    }
}
