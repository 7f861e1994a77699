//! Deterministic mock implementation of the shared `agent_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and contract-level integration testing. Scripted replies are
//! returned in order; once the script runs out, the provider echoes the last
//! user message.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use agent_provider::{
    ExchangeRequest, Message, ModelProvider, ProviderError, ProviderProfile, Role,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// Deterministic mock provider used by `chat_agent` tests and local runs.
#[derive(Debug)]
pub struct MockProvider {
    model_id: String,
    replies: Mutex<VecDeque<Result<Message, ProviderError>>>,
    requests: Mutex<Vec<ExchangeRequest>>,
}

impl MockProvider {
    /// Creates a mock provider that answers with `replies` in order.
    #[must_use]
    pub fn new(replies: Vec<Result<Message, ProviderError>>) -> Self {
        Self {
            model_id: "mock".to_string(),
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock provider that only ever echoes.
    #[must_use]
    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Appends one more scripted reply.
    pub fn push_reply(&self, reply: Result<Message, ProviderError>) {
        lock_unpoisoned(&self.replies).push_back(reply);
    }

    /// Every request received so far, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<ExchangeRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    #[must_use]
    pub fn exchange_count(&self) -> usize {
        lock_unpoisoned(&self.requests).len()
    }

    /// Number of scripted replies not yet consumed.
    #[must_use]
    pub fn remaining_replies(&self) -> usize {
        lock_unpoisoned(&self.replies).len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::echo()
    }
}

impl ModelProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn exchange(&self, request: ExchangeRequest) -> Result<Message, ProviderError> {
        let reply = lock_unpoisoned(&self.replies).pop_front();
        let reply = reply.unwrap_or_else(|| Ok(echo_reply(&request)));
        lock_unpoisoned(&self.requests).push(request);
        reply
    }
}

fn echo_reply(request: &ExchangeRequest) -> Message {
    let last_user = request
        .messages
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.as_str())
        .unwrap_or_default();

    Message::assistant(format!("Mock response to: {last_user}"))
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
