//! Ordered conversation log with append-time validation.

use agent_provider::{Message, Role};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("system messages are set through set_system_prompt, not appended")]
    SystemMessageAppend,
    #[error("system message found at index {index}; only index 0 may hold the system prompt")]
    MisplacedSystemMessage { index: usize },
    #[error("tool message has no tool_call_id")]
    MissingToolCallId,
    #[error("tool message answers unknown tool call '{0}'")]
    UnknownToolCallId(String),
    #[error("tool call '{0}' already has a result")]
    DuplicateToolResult(String),
    #[error("tool call id '{0}' appears more than once in one assistant message")]
    DuplicateToolCallId(String),
    #[error("tool call '{0}' has no result")]
    UnansweredToolCall(String),
    #[error("a tool call batch needs an assistant message with tool calls followed by tool results")]
    MalformedBatch,
}

/// Append-only message log. The single mutation allowed after append is
/// replacing the system prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from persisted messages, applying the same checks as
    /// [`MessageStore::append`]. The last tool call batch must be answered.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for (index, message) in messages.into_iter().enumerate() {
            if message.role == Role::System {
                if index != 0 {
                    return Err(StoreError::MisplacedSystemMessage { index });
                }
                store.messages.push(message);
                continue;
            }
            store.append(message)?;
        }
        store.check_batch_closed()?;
        Ok(store)
    }

    /// Appends one message. User and assistant messages are refused while the
    /// latest tool call batch still has unanswered calls.
    pub fn append(&mut self, message: Message) -> Result<(), StoreError> {
        match message.role {
            Role::System => return Err(StoreError::SystemMessageAppend),
            Role::Tool => self.check_tool_result(&message)?,
            Role::User | Role::Assistant => {
                self.check_batch_closed()?;
                check_tool_call_ids(&message)?;
            }
        }

        self.messages.push(message);
        Ok(())
    }

    /// Appends an assistant tool call message together with exactly one
    /// result per call. Nothing is written unless the whole batch is valid.
    pub fn append_batch(&mut self, assistant: Message, results: Vec<Message>) -> Result<(), StoreError> {
        if assistant.role != Role::Assistant || assistant.tool_calls.is_empty() {
            return Err(StoreError::MalformedBatch);
        }
        self.check_batch_closed()?;
        check_tool_call_ids(&assistant)?;

        let mut answered: Vec<&str> = Vec::with_capacity(results.len());
        for result in &results {
            if result.role != Role::Tool {
                return Err(StoreError::MalformedBatch);
            }
            let call_id = result
                .tool_call_id
                .as_deref()
                .ok_or(StoreError::MissingToolCallId)?;
            if !assistant.tool_calls.iter().any(|call| call.id == call_id) {
                return Err(StoreError::UnknownToolCallId(call_id.to_string()));
            }
            if answered.contains(&call_id) {
                return Err(StoreError::DuplicateToolResult(call_id.to_string()));
            }
            answered.push(call_id);
        }
        if let Some(call) = assistant
            .tool_calls
            .iter()
            .find(|call| !answered.contains(&call.id.as_str()))
        {
            return Err(StoreError::UnansweredToolCall(call.id.clone()));
        }

        self.messages.push(assistant);
        self.messages.extend(results);
        Ok(())
    }

    /// Drops every system message and inserts `text` as the first message.
    pub fn set_system_prompt(&mut self, text: impl Into<String>) {
        self.messages.retain(|message| message.role != Role::System);
        self.messages.insert(0, Message::system(text));
    }

    #[must_use]
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|message| message.role == Role::System)
            .map(|message| message.content.as_str())
    }

    #[must_use]
    pub fn all_messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Index of the most recent assistant message carrying tool calls.
    fn latest_batch_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|message| message.role == Role::Assistant && message.has_tool_calls())
    }

    fn is_answered_since(&self, index: usize, call_id: &str) -> bool {
        self.messages[index + 1..].iter().any(|message| {
            message.role == Role::Tool && message.tool_call_id.as_deref() == Some(call_id)
        })
    }

    fn check_batch_closed(&self) -> Result<(), StoreError> {
        let Some(index) = self.latest_batch_index() else {
            return Ok(());
        };
        match self.messages[index]
            .tool_calls
            .iter()
            .find(|call| !self.is_answered_since(index, &call.id))
        {
            Some(call) => Err(StoreError::UnansweredToolCall(call.id.clone())),
            None => Ok(()),
        }
    }

    /// Tool results answer the latest tool call batch only, so providers may
    /// reuse call ids across turns.
    fn check_tool_result(&self, message: &Message) -> Result<(), StoreError> {
        let call_id = message
            .tool_call_id
            .as_deref()
            .ok_or(StoreError::MissingToolCallId)?;

        let issued = self.latest_batch_index().filter(|&index| {
            self.messages[index]
                .tool_calls
                .iter()
                .any(|call| call.id == call_id)
        });
        let Some(index) = issued else {
            return Err(StoreError::UnknownToolCallId(call_id.to_string()));
        };

        if self.is_answered_since(index, call_id) {
            return Err(StoreError::DuplicateToolResult(call_id.to_string()));
        }

        Ok(())
    }
}

/// Rejects an assistant message that uses one tool call id twice.
pub fn check_tool_call_ids(message: &Message) -> Result<(), StoreError> {
    for (position, call) in message.tool_calls.iter().enumerate() {
        if message.tool_calls[..position]
            .iter()
            .any(|earlier| earlier.id == call.id)
        {
            return Err(StoreError::DuplicateToolCallId(call.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use agent_provider::ToolCall;
    use pretty_assertions::assert_eq;

    use super::*;

    fn shell_call(id: &str) -> Message {
        Message::assistant_with_tool_calls(
            "",
            vec![ToolCall::function(id, "execute_shell_command", r#"{"command":"ls"}"#)],
        )
    }

    #[test]
    fn set_system_prompt_twice_leaves_one_system_message_first() {
        let mut store = MessageStore::new();
        store.append(Message::user("hello")).expect("append user");
        store.set_system_prompt("P");
        store.set_system_prompt("P");

        assert_eq!(
            store.all_messages(),
            &[Message::system("P"), Message::user("hello")]
        );
    }

    #[test]
    fn set_system_prompt_replaces_previous_prompt() {
        let mut store = MessageStore::new();
        store.set_system_prompt("old");
        store.append(Message::user("hi")).expect("append user");
        store.set_system_prompt("new");

        assert_eq!(store.system_prompt(), Some("new"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn append_rejects_system_messages() {
        let mut store = MessageStore::new();
        assert_eq!(
            store.append(Message::system("sneaky")),
            Err(StoreError::SystemMessageAppend)
        );
        assert!(store.is_empty());
    }

    #[test]
    fn tool_message_requires_matching_earlier_call() {
        let mut store = MessageStore::new();
        assert_eq!(
            store.append(Message::tool("call_1", "out")),
            Err(StoreError::UnknownToolCallId("call_1".to_string()))
        );

        let mut orphan = Message::tool("x", "out");
        orphan.tool_call_id = None;
        assert_eq!(store.append(orphan), Err(StoreError::MissingToolCallId));

        store.append(shell_call("call_1")).expect("append call");
        store
            .append(Message::tool("call_1", "out"))
            .expect("matching result is accepted");
        assert_eq!(
            store.append(Message::tool("call_1", "again")),
            Err(StoreError::DuplicateToolResult("call_1".to_string()))
        );
    }

    #[test]
    fn reused_call_id_answers_the_latest_batch() {
        let mut store = MessageStore::new();
        store.append(shell_call("call_0")).expect("first batch");
        store
            .append(Message::tool("call_0", "first"))
            .expect("first result");
        store.append(Message::user("again")).expect("append user");
        store.append(shell_call("call_0")).expect("second batch");

        store
            .append(Message::tool("call_0", "second"))
            .expect("reused id answers the new batch");
        assert_eq!(
            store.append(Message::tool("call_0", "third")),
            Err(StoreError::DuplicateToolResult("call_0".to_string()))
        );
    }

    #[test]
    fn user_message_is_refused_while_a_call_is_unanswered() {
        let mut store = MessageStore::new();
        store.append(shell_call("c1")).expect("append call");

        assert_eq!(
            store.append(Message::user("next")),
            Err(StoreError::UnansweredToolCall("c1".to_string()))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn append_batch_writes_nothing_unless_every_call_is_answered() {
        let mut store = MessageStore::new();
        store.append(Message::user("go")).expect("append user");
        let assistant = Message::assistant_with_tool_calls(
            "",
            vec![
                ToolCall::function("c1", "execute_shell_command", r#"{"command":"ls"}"#),
                ToolCall::function("c2", "execute_shell_command", r#"{"command":"pwd"}"#),
            ],
        );

        assert_eq!(
            store.append_batch(assistant.clone(), vec![Message::tool("c1", "out")]),
            Err(StoreError::UnansweredToolCall("c2".to_string()))
        );
        assert_eq!(
            store.append_batch(
                assistant.clone(),
                vec![Message::tool("c1", "out"), Message::tool("c1", "again")]
            ),
            Err(StoreError::DuplicateToolResult("c1".to_string()))
        );
        assert_eq!(store.all_messages(), &[Message::user("go")]);

        store
            .append_batch(
                assistant,
                vec![Message::tool("c2", "two"), Message::tool("c1", "one")],
            )
            .expect("complete batch");
        assert_eq!(store.len(), 4);
        store.append(Message::assistant("done")).expect("batch is closed");
    }

    #[test]
    fn repeated_call_id_in_one_message_is_rejected() {
        let message = Message::assistant_with_tool_calls(
            "",
            vec![
                ToolCall::function("c1", "execute_shell_command", r#"{"command":"ls"}"#),
                ToolCall::function("c1", "perform_web_search", r#"{"topic":"x"}"#),
            ],
        );

        assert_eq!(
            check_tool_call_ids(&message),
            Err(StoreError::DuplicateToolCallId("c1".to_string()))
        );
        let mut store = MessageStore::new();
        assert_eq!(
            store.append_batch(message, Vec::new()),
            Err(StoreError::DuplicateToolCallId("c1".to_string()))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn from_messages_validates_loaded_logs() {
        let valid = vec![
            Message::system("P"),
            Message::user("hi"),
            shell_call("c1"),
            Message::tool("c1", "User denied command execution."),
        ];
        let store = MessageStore::from_messages(valid.clone()).expect("valid log loads");
        assert_eq!(store.into_messages(), valid);

        let misplaced = vec![Message::user("hi"), Message::system("P")];
        assert_eq!(
            MessageStore::from_messages(misplaced),
            Err(StoreError::MisplacedSystemMessage { index: 1 })
        );

        let dangling = vec![Message::user("hi"), shell_call("c1")];
        assert_eq!(
            MessageStore::from_messages(dangling),
            Err(StoreError::UnansweredToolCall("c1".to_string()))
        );
    }
}
