//! Tool-call mediation for one conversation turn.
//!
//! A turn starts with a tool-enabled exchange. When the model answers with
//! tool calls, the assistant message is staged together with one result per
//! call and only written to the [`MessageStore`] once the whole batch is
//! resolved, so the log never holds an unanswered tool call. Shell commands
//! suspend the turn until the host supplies an [`ApprovalDecision`].

use std::sync::Arc;

use agent_provider::{
    Attachment, ExchangeMode, ExchangeRequest, Message, ModelProvider, ProviderError, ToolCall,
    ToolDefinition,
};
use thiserror::Error;

use crate::store::{check_tool_call_ids, MessageStore, StoreError};
use crate::tools::{
    tool_definitions, unknown_tool_result, web_search_result, CommandExecutor, ToolArgumentsError,
    ToolInvocation, ADVICE_RESULT, CANCELLED_RESULT, DENIED_RESULT, SKIPPED_RESULT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingModel,
    ProcessingToolCalls,
    AwaitingHumanApproval,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Allow,
    Deny,
    Advise,
    Cancel,
}

impl ApprovalDecision {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Advise => "advise",
            Self::Cancel => "cancel",
        }
    }
}

/// Shell command waiting for the user's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub call_id: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// The turn finished; carries the final assistant message.
    Completed(Message),
    /// The turn is suspended until [`ToolCallMediator::resolve`] is called.
    AwaitingApproval(PendingApproval),
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("a turn is already in progress")]
    TurnInProgress,
    #[error("no command is awaiting approval")]
    NoPendingApproval,
    #[error("model request failed: {0}")]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    ToolArguments(#[from] ToolArgumentsError),
    #[error("conversation log rejected a message: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug)]
struct PendingBatch {
    assistant: Message,
    invocations: Vec<ToolInvocation>,
    results: Vec<Message>,
}

impl PendingBatch {
    fn next_index(&self) -> usize {
        self.results.len()
    }

    fn call(&self, index: usize) -> &ToolCall {
        &self.assistant.tool_calls[index]
    }

    fn answer_next(&mut self, content: impl Into<String>) {
        let call_id = self.call(self.next_index()).id.clone();
        self.results.push(Message::tool(call_id, content));
    }

    /// Web search follow-up whenever a search was requested and no shell
    /// command took part in the batch.
    fn follow_up_mode(&self) -> ExchangeMode {
        let searched = self.invocations.iter().any(ToolInvocation::is_web_search);
        let shell = self
            .invocations
            .iter()
            .any(|invocation| matches!(invocation, ToolInvocation::Shell { .. }));
        if searched && !shell {
            ExchangeMode::WebSearch
        } else {
            ExchangeMode::Plain
        }
    }
}

pub struct ToolCallMediator {
    provider: Arc<dyn ModelProvider>,
    executor: Box<dyn CommandExecutor>,
    tools: Vec<ToolDefinition>,
    state: TurnState,
    pending: Option<PendingBatch>,
}

impl ToolCallMediator {
    pub fn new(provider: Arc<dyn ModelProvider>, executor: Box<dyn CommandExecutor>) -> Self {
        Self {
            provider,
            executor,
            tools: tool_definitions(),
            state: TurnState::Idle,
            pending: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> TurnState {
        self.state
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    /// The command currently awaiting a decision, if any.
    #[must_use]
    pub fn pending_approval(&self) -> Option<PendingApproval> {
        if self.state != TurnState::AwaitingHumanApproval {
            return None;
        }
        let batch = self.pending.as_ref()?;
        let index = batch.next_index();
        match batch.invocations.get(index)? {
            ToolInvocation::Shell { command } => Some(PendingApproval {
                call_id: batch.call(index).id.clone(),
                command: command.clone(),
            }),
            _ => None,
        }
    }

    /// Starts a turn with the user's text. Attachments ride along on the
    /// first exchange only.
    pub fn submit(
        &mut self,
        store: &mut MessageStore,
        text: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Result<TurnStatus, TurnError> {
        if self.state != TurnState::Idle {
            return Err(TurnError::TurnInProgress);
        }

        store.append(Message::user(text))?;
        self.state = TurnState::AwaitingModel;

        let request = ExchangeRequest::new(store.all_messages().to_vec(), ExchangeMode::ToolEnabled)
            .with_tools(self.tools.clone())
            .with_attachments(attachments);
        let response = match self.exchange(request) {
            Ok(response) => response,
            Err(error) => return Err(self.fail(error)),
        };

        if !response.has_tool_calls() {
            return self.finish(store, response);
        }

        if let Err(error) = check_tool_call_ids(&response) {
            tracing::warn!(%error, "model repeated a tool call id");
            return Err(self.fail(error));
        }

        let invocations = match response
            .tool_calls
            .iter()
            .map(ToolInvocation::from_call)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(invocations) => invocations,
            Err(error) => {
                tracing::warn!(%error, "model sent malformed tool arguments");
                return Err(self.fail(error));
            }
        };

        tracing::debug!(calls = invocations.len(), "processing tool call batch");
        self.pending = Some(PendingBatch {
            assistant: response,
            invocations,
            results: Vec::new(),
        });
        self.state = TurnState::ProcessingToolCalls;
        self.process_batch(store)
    }

    /// Applies the user's decision to the suspended shell call and finishes
    /// the turn.
    pub fn resolve(
        &mut self,
        store: &mut MessageStore,
        decision: ApprovalDecision,
    ) -> Result<TurnStatus, TurnError> {
        let Some(approval) = self.pending_approval() else {
            return Err(TurnError::NoPendingApproval);
        };
        let Some(batch) = self.pending.as_mut() else {
            return Err(TurnError::NoPendingApproval);
        };
        self.state = TurnState::ProcessingToolCalls;
        tracing::info!(decision = decision.as_str(), call_id = %approval.call_id, "shell command decision");

        let result = match decision {
            ApprovalDecision::Allow => match self.executor.run(&approval.command) {
                Ok(output) => output.to_tool_result(),
                Err(error) => format!("Error executing command: {error}"),
            },
            ApprovalDecision::Deny => DENIED_RESULT.to_string(),
            ApprovalDecision::Advise => ADVICE_RESULT.to_string(),
            ApprovalDecision::Cancel => CANCELLED_RESULT.to_string(),
        };
        batch.answer_next(result);

        while batch.next_index() < batch.invocations.len() {
            batch.answer_next(SKIPPED_RESULT);
        }

        self.complete_batch(store)
    }

    /// Drops a suspended turn without touching the log.
    pub fn abandon(&mut self) {
        if self.pending.take().is_some() {
            tracing::debug!("abandoning suspended tool call batch");
        }
        self.state = TurnState::Idle;
    }

    fn process_batch(&mut self, store: &mut MessageStore) -> Result<TurnStatus, TurnError> {
        let Some(batch) = self.pending.as_mut() else {
            return Err(TurnError::NoPendingApproval);
        };

        while batch.next_index() < batch.invocations.len() {
            match batch.invocations[batch.next_index()].clone() {
                ToolInvocation::WebSearch { topic } => {
                    tracing::debug!(%topic, "web search requested");
                    batch.answer_next(web_search_result(&topic));
                }
                ToolInvocation::Unknown { name } => {
                    tracing::warn!(tool = %name, "model called an unknown tool");
                    batch.answer_next(unknown_tool_result(&name));
                }
                ToolInvocation::Shell { command } => {
                    let call_id = batch.call(batch.next_index()).id.clone();
                    self.state = TurnState::AwaitingHumanApproval;
                    return Ok(TurnStatus::AwaitingApproval(PendingApproval { call_id, command }));
                }
            }
        }

        self.complete_batch(store)
    }

    fn complete_batch(&mut self, store: &mut MessageStore) -> Result<TurnStatus, TurnError> {
        let Some(batch) = self.pending.take() else {
            return Err(TurnError::NoPendingApproval);
        };
        let mode = batch.follow_up_mode();

        store
            .append_batch(batch.assistant, batch.results)
            .map_err(|error| self.fail(error))?;

        self.state = TurnState::AwaitingModel;
        let request = ExchangeRequest::new(store.all_messages().to_vec(), mode);
        let mut response = match self.exchange(request) {
            Ok(response) => response,
            Err(error) => return Err(self.fail(error)),
        };

        if response.has_tool_calls() {
            tracing::warn!(
                calls = response.tool_calls.len(),
                "dropping tool calls from follow-up response"
            );
            response.tool_calls.clear();
        }

        self.finish(store, response)
    }

    fn finish(&mut self, store: &mut MessageStore, message: Message) -> Result<TurnStatus, TurnError> {
        store.append(message.clone()).map_err(|error| self.fail(error))?;
        self.state = TurnState::Done;
        tracing::debug!("turn complete");
        self.state = TurnState::Idle;
        Ok(TurnStatus::Completed(message))
    }

    fn exchange(&self, request: ExchangeRequest) -> Result<Message, ProviderError> {
        let mode = request.mode;
        tracing::debug!(?mode, messages = request.messages.len(), "model exchange");
        let result = self.provider.exchange(request);
        if let Err(error) = &result {
            tracing::warn!(%error, ?mode, "model exchange failed");
        }
        result
    }

    fn fail(&mut self, error: impl Into<TurnError>) -> TurnError {
        self.pending = None;
        self.state = TurnState::Idle;
        error.into()
    }
}
