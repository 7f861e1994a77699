#![allow(dead_code)]

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use agent_provider::{
    Message, ModelProvider, ProviderError, ToolCall, EXECUTE_SHELL_COMMAND, PERFORM_WEB_SEARCH,
};
use agent_provider_mock::MockProvider;
use chat_agent::app::ChatApp;
use chat_agent::mediator::ToolCallMediator;
use chat_agent::session::{SessionManager, SystemPromptTemplate};
use chat_agent::tools::{CommandExecutor, CommandOutput};
use session_store::SessionStore;

/// Executor that records commands and answers with canned output.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl RecordingExecutor {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock").clone()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run(&mut self, command: &str) -> io::Result<CommandOutput> {
        self.commands
            .lock()
            .expect("commands lock")
            .push(command.to_string());
        Ok(CommandOutput {
            stdout: format!("output of {command}\n"),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

pub struct Harness {
    pub app: ChatApp,
    pub provider: Arc<MockProvider>,
    pub executor: RecordingExecutor,
}

pub fn harness(dir: &Path, replies: Vec<Result<Message, ProviderError>>) -> Harness {
    harness_with_prompt(dir, replies, SystemPromptTemplate::default())
}

pub fn harness_with_prompt(
    dir: &Path,
    replies: Vec<Result<Message, ProviderError>>,
    prompt: SystemPromptTemplate,
) -> Harness {
    let provider = Arc::new(MockProvider::new(replies));
    let executor = RecordingExecutor::default();
    let app = app_with(
        dir,
        Arc::clone(&provider) as Arc<dyn ModelProvider>,
        Box::new(executor.clone()),
        prompt,
    );
    Harness {
        app,
        provider,
        executor,
    }
}

pub fn app_with(
    dir: &Path,
    provider: Arc<dyn ModelProvider>,
    executor: Box<dyn CommandExecutor>,
    prompt: SystemPromptTemplate,
) -> ChatApp {
    let session = SessionManager::new(SessionStore::new(dir.join("chats")), prompt);
    ChatApp::new(session, ToolCallMediator::new(provider, executor))
}

pub fn shell_call(id: &str, command: &str) -> ToolCall {
    let arguments = serde_json::json!({ "command": command }).to_string();
    ToolCall::function(id, EXECUTE_SHELL_COMMAND, arguments)
}

pub fn web_call(id: &str, topic: &str) -> ToolCall {
    let arguments = serde_json::json!({ "topic": topic }).to_string();
    ToolCall::function(id, PERFORM_WEB_SEARCH, arguments)
}

pub fn requesting(calls: Vec<ToolCall>) -> Result<Message, ProviderError> {
    Ok(Message::assistant_with_tool_calls("", calls))
}

/// Every tool message answers an earlier assistant tool call, exactly once.
pub fn assert_tool_messages_answer_earlier_calls(messages: &[Message]) {
    let mut answered = Vec::new();
    for (index, message) in messages.iter().enumerate() {
        let Some(call_id) = message.tool_call_id.as_deref() else {
            continue;
        };
        let issued = messages[..index]
            .iter()
            .any(|earlier| earlier.tool_calls.iter().any(|call| call.id == call_id));
        assert!(issued, "tool message {index} answers unknown call {call_id}");
        assert!(
            !answered.contains(&call_id),
            "tool call {call_id} answered twice"
        );
        answered.push(call_id);
    }
}
