//! Agent Controller - bounded model/tool loop for one conversation turn
//!
//! The controller replays the stored conversation, calls the model with the
//! tool catalog, runs every requested tool through the dispatcher, feeds
//! the results back, and stops on a plain answer or at the iteration
//! ceiling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::prompts::DEFAULT_SYSTEM_PROMPT;
use crate::config::Config;
use crate::llm::{ChatError, ChatMessage, ModelBackend, ModelResponse, ToolInvocation, ToolResult};
use crate::metrics::{AGENT_ITERATIONS, AGENT_TURNS, MODEL_CALL_DURATION};
use crate::storage::{ConversationStore, Message, StoreError};
use crate::tools::{ToolContext, ToolDispatcher};
use crate::tracing::new_trace_id;

/// Configuration for the agent controller
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of model calls per turn
    pub max_iterations: usize,
    /// Custom system prompt (uses default if None)
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            system_prompt: None,
        }
    }
}

impl AgentConfig {
    /// Loop settings from the service config. The prompt is assembled
    /// separately because it depends on the checked-out repository.
    pub fn from_config(config: &Config, system_prompt: Option<String>) -> Self {
        Self {
            max_iterations: config.max_iterations,
            system_prompt,
        }
    }
}

/// Result of one completed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResult {
    /// Final answer from the model
    pub response: String,
    /// Number of model calls made
    pub iterations: usize,
    /// Number of tool invocations executed
    pub tool_calls: usize,
    /// Unique trace ID for this turn
    pub trace_id: String,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model backend error: {0}")]
    Model(#[from] ChatError),
    #[error("exceeded maximum tool use iterations ({limit})")]
    IterationLimitExceeded { limit: usize },
    #[error("turn cancelled")]
    Cancelled,
}

impl AgentError {
    fn outcome(&self) -> &'static str {
        match self {
            AgentError::Model(_) => "model_error",
            AgentError::IterationLimitExceeded { .. } => "iteration_limit",
            AgentError::Cancelled => "cancelled",
        }
    }
}

/// Loop position. Each arm of [`AgentController::run_loop`] consumes one
/// state and produces the next.
enum LoopState {
    AwaitingModel,
    EvaluatingResponse(ModelResponse),
    ExecutingTools(Vec<ToolInvocation>),
    Done(String),
}

/// Drives model turns for any number of conversations
pub struct AgentController {
    backend: Arc<dyn ModelBackend>,
    store: Arc<dyn ConversationStore>,
    dispatcher: Arc<ToolDispatcher>,
    config: AgentConfig,
    /// One loop per conversation at a time
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AgentController {
    /// Create a new agent controller
    ///
    /// # Arguments
    /// * `backend` - model backend answering each iteration
    /// * `store` - shared conversation log
    /// * `dispatcher` - tool registry, already checked against its catalog
    /// * `config` - loop settings
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        store: Arc<dyn ConversationStore>,
        dispatcher: Arc<ToolDispatcher>,
        config: AgentConfig,
    ) -> Self {
        Self {
            backend,
            store,
            dispatcher,
            config,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Process one user message in a conversation.
    ///
    /// The user message is persisted before the loop starts and the final
    /// answer after it ends; tool round-trips are not persisted. On error the
    /// stored history stays as it was, user message included.
    ///
    /// # Arguments
    /// * `conversation_id` - conversation key
    /// * `channel_ref` - transport location, recorded when the conversation is created
    /// * `text` - the user's message
    /// * `cancel` - aborts an in-flight model call or tool promptly
    pub async fn process_message(
        &self,
        conversation_id: &str,
        channel_ref: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResult, AgentError> {
        let trace_id = new_trace_id();
        let span = info_span!(
            "agent_turn",
            trace_id = %trace_id,
            conversation = %conversation_id,
            model = %self.backend.model(),
            otel.name = "agent_turn"
        );

        async {
            let lock = self.turn_lock(conversation_id);
            let guard = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                guard = lock.clone().lock_owned() => Some(guard),
            };

            // the guard's Arc clone is gone before the lock entry is released
            let result = match guard {
                Some(_guard) => {
                    self.run_turn(conversation_id, channel_ref, text, &trace_id, cancel)
                        .await
                }
                None => Err(AgentError::Cancelled),
            };
            self.release_turn_lock(conversation_id, lock);

            match &result {
                Ok(r) => {
                    AGENT_TURNS.with_label_values(&["done"]).inc();
                    AGENT_ITERATIONS.observe(r.iterations as f64);
                    info!(iterations = r.iterations, tool_calls = r.tool_calls, "turn completed");
                }
                Err(e) => {
                    AGENT_TURNS.with_label_values(&[e.outcome()]).inc();
                    warn!(error = %e, "turn failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Forget a conversation
    pub async fn clear_conversation(&self, conversation_id: &str) -> Result<(), StoreError> {
        self.store.delete(conversation_id).await
    }

    async fn run_turn(
        &self,
        conversation_id: &str,
        channel_ref: &str,
        text: &str,
        trace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResult, AgentError> {
        let mut history = match self.store.get(conversation_id).await {
            Ok(Some(conversation)) => conversation.history(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to load conversation, starting empty");
                Vec::new()
            }
        };
        history.push(ChatMessage::user(text));

        if let Err(e) = self
            .store
            .add_message(conversation_id, channel_ref, Message::user(text))
            .await
        {
            warn!(error = %e, "failed to store user message");
        }

        let mut result = self.run_loop(history, trace_id, cancel).await?;
        result.trace_id = trace_id.to_string();

        if result.response.trim().is_empty() {
            debug!("empty final answer, not stored");
        } else if let Err(e) = self
            .store
            .add_message(conversation_id, channel_ref, Message::assistant(&result.response))
            .await
        {
            warn!(error = %e, "failed to store assistant message");
        }

        Ok(result)
    }

    async fn run_loop(
        &self,
        mut history: Vec<ChatMessage>,
        trace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResult, AgentError> {
        let system = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let tool_ctx = ToolContext::new(cancel.clone(), trace_id);

        let mut iterations = 0;
        let mut tool_calls = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if iterations >= self.config.max_iterations {
                        AGENT_ITERATIONS.observe(iterations as f64);
                        return Err(AgentError::IterationLimitExceeded {
                            limit: self.config.max_iterations,
                        });
                    }
                    iterations += 1;
                    let response = self
                        .call_model(system, &history, iterations, trace_id, cancel)
                        .await?;
                    LoopState::EvaluatingResponse(response)
                }

                LoopState::EvaluatingResponse(response) => {
                    if response.requests_tools() {
                        history.push(ChatMessage::assistant_blocks(&response.content));
                        LoopState::ExecutingTools(response.tool_invocations())
                    } else {
                        LoopState::Done(response.text())
                    }
                }

                LoopState::ExecutingTools(invocations) => {
                    debug!(count = invocations.len(), "executing tool invocations");
                    let mut results: Vec<ToolResult> = Vec::with_capacity(invocations.len());
                    for invocation in &invocations {
                        let result = self.dispatcher.dispatch(invocation, &tool_ctx).await;
                        if cancel.is_cancelled() {
                            return Err(AgentError::Cancelled);
                        }
                        tool_calls += 1;
                        results.push(result);
                    }
                    history.push(ChatMessage::tool_results(results));
                    LoopState::AwaitingModel
                }

                LoopState::Done(response) => {
                    return Ok(AgentResult {
                        response,
                        iterations,
                        tool_calls,
                        trace_id: trace_id.to_string(),
                    });
                }
            };
        }
    }

    async fn call_model(
        &self,
        system: &str,
        history: &[ChatMessage],
        iteration: usize,
        trace_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ModelResponse, AgentError> {
        let span = info_span!(
            "model_call",
            trace_id = %trace_id,
            iteration,
            model = %self.backend.model(),
            otel.name = "model_call"
        );

        let start = Instant::now();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            response = self
                .backend
                .complete(system, history, self.dispatcher.catalog())
                .instrument(span) => response?,
        };

        let elapsed = start.elapsed();
        MODEL_CALL_DURATION
            .with_label_values(&[self.backend.model()])
            .observe(elapsed.as_secs_f64());
        debug!(
            iteration,
            duration_ms = elapsed.as_millis() as u64,
            stop_reason = ?response.stop_reason,
            "model call completed"
        );

        Ok(response)
    }

    fn turn_lock(&self, conversation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .turn_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the lock entry once no other turn holds or waits on it
    fn release_turn_lock(&self, conversation_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .turn_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // map entry + ours
        if Arc::strong_count(&lock) == 2 {
            locks.remove(conversation_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolDefinition;
    use crate::storage::MemoryStore;
    use crate::tools::Toolbox;
    use async_trait::async_trait;

    struct Answer;

    #[async_trait]
    impl ModelBackend for Answer {
        fn model(&self) -> &str {
            "answer"
        }

        async fn complete(
            &self,
            _system: &str,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<ModelResponse, ChatError> {
            Ok(ModelResponse::final_text("ok"))
        }
    }

    fn idle_locks(agent: &AgentController) -> usize {
        agent.turn_locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn test_turn_lock_released_after_turn() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(Toolbox::for_repo(dir.path()).dispatcher().unwrap());
        let agent = AgentController::new(
            Arc::new(Answer),
            Arc::new(MemoryStore::new()),
            dispatcher,
            AgentConfig::default(),
        );

        let cancel = CancellationToken::new();
        agent.process_message("c1", "term", "hi", &cancel).await.unwrap();
        agent.process_message("c1", "term", "again", &cancel).await.unwrap();
        assert_eq!(idle_locks(&agent), 0);

        cancel.cancel();
        let err = agent.process_message("c2", "term", "hi", &cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(idle_locks(&agent), 0);
    }

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.max_iterations, 20);
        assert!(config.system_prompt.is_none());
    }

    #[test]
    fn test_error_outcome_labels() {
        assert_eq!(AgentError::Cancelled.outcome(), "cancelled");
        assert_eq!(
            AgentError::IterationLimitExceeded { limit: 3 }.outcome(),
            "iteration_limit"
        );
        assert_eq!(
            AgentError::IterationLimitExceeded { limit: 3 }.to_string(),
            "exceeded maximum tool use iterations (3)"
        );
    }
}
