//! Integration tests for the agent system
//!
//! The model is replaced by scripted backends; tools run for real against a
//! temporary repository.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use devbot::agent::{AgentConfig, AgentController, AgentError};
use devbot::llm::{
    ChatError, ChatMessage, ContentBlock, ModelBackend, ModelResponse, Role, StopReason,
    ToolDefinition,
};
use devbot::metrics::MODEL_CALL_DURATION;
use devbot::storage::{ConversationStore, MemoryStore, Message};
use devbot::tools::Toolbox;

fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ModelResponse {
    ModelResponse {
        content: vec![
            ContentBlock::text("Let me look."),
            ContentBlock::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
                input,
            },
        ],
        stop_reason: Some(StopReason::ToolUse),
    }
}

/// Replays canned responses and records every history it was shown
#[derive(Default)]
struct ScriptedBackend {
    responses: Mutex<VecDeque<ModelResponse>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedBackend {
    fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::default(),
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn history(&self, call: usize) -> Vec<ChatMessage> {
        self.seen.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _system: &str,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ChatError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ModelResponse::final_text("done")))
    }
}

/// Asks for a tool on every call
#[derive(Default)]
struct AlwaysToolBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl ModelBackend for AlwaysToolBackend {
    fn model(&self) -> &str {
        "always-tool"
    }

    async fn complete(
        &self,
        _system: &str,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ChatError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(tool_use(&format!("call-{}", n), "git_status", json!({})))
    }
}

/// Never answers
struct HangingBackend;

#[async_trait]
impl ModelBackend for HangingBackend {
    fn model(&self) -> &str {
        "hanging"
    }

    async fn complete(
        &self,
        _system: &str,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ChatError> {
        std::future::pending().await
    }
}

/// Slow final answers, tracking how many calls overlap
#[derive(Default)]
struct SlowBackend {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl ModelBackend for SlowBackend {
    fn model(&self) -> &str {
        "slow"
    }

    async fn complete(
        &self,
        _system: &str,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ChatError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(ModelResponse::final_text("ok"))
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    store: Arc<MemoryStore>,
    agent: AgentController,
}

fn fixture(backend: Arc<dyn ModelBackend>, max_iterations: usize) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    std::fs::write(dir.path().join("README.md"), "# demo\n").unwrap();

    let dispatcher = Arc::new(Toolbox::for_repo(dir.path()).dispatcher().unwrap());
    let store = Arc::new(MemoryStore::new());
    let config = AgentConfig {
        max_iterations,
        ..AgentConfig::default()
    };
    let agent = AgentController::new(backend, store.clone(), dispatcher, config);

    Fixture {
        _dir: dir,
        store,
        agent,
    }
}

/// Test that AgentConfig has sensible defaults
#[test]
fn test_agent_config_defaults() {
    let config = AgentConfig::default();
    assert_eq!(config.max_iterations, 20);
    assert!(config.system_prompt.is_none());
}

#[tokio::test]
async fn test_plain_answer_finishes_in_one_call() {
    let backend = Arc::new(ScriptedBackend::new(vec![ModelResponse::final_text("Hello!")]));
    let f = fixture(backend.clone(), 20);
    let timed = MODEL_CALL_DURATION
        .with_label_values(&["scripted"])
        .get_sample_count();

    let result = f
        .agent
        .process_message("c1", "term", "hi", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.response, "Hello!");
    assert_eq!(result.iterations, 1);
    assert_eq!(result.tool_calls, 0);
    assert_eq!(backend.calls(), 1);
    assert_eq!(result.trace_id.len(), 36);
    // labelled with the backend's own model name
    assert!(
        MODEL_CALL_DURATION
            .with_label_values(&["scripted"])
            .get_sample_count()
            > timed
    );
}

#[tokio::test]
async fn test_iteration_ceiling() {
    let backend = Arc::new(AlwaysToolBackend::default());
    let f = fixture(backend.clone(), 20);

    let err = f
        .agent
        .process_message("c1", "term", "loop forever", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::IterationLimitExceeded { limit: 20 }));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 20);

    // user message kept, no assistant answer
    let conversation = f.store.get("c1").await.unwrap().unwrap();
    assert_eq!(conversation.messages.len(), 1);
    assert_eq!(conversation.messages[0].role, Role::User);
}

#[tokio::test]
async fn test_tool_results_fed_back() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        tool_use("t1", "read_file", json!({"path": "README.md"})),
        ModelResponse::final_text("It is a demo."),
    ]));
    let f = fixture(backend.clone(), 20);

    let result = f
        .agent
        .process_message("c1", "term", "what is this repo?", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.response, "It is a demo.");
    assert_eq!(result.iterations, 2);
    assert_eq!(result.tool_calls, 1);

    let second = backend.history(1);
    assert_eq!(second.len(), 3);
    assert_eq!(second[1].role, Role::Assistant);
    match &second[2].content[0] {
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            assert_eq!(tool_use_id, "t1");
            assert!(content.contains("# demo"));
            assert!(!*is_error);
        }
        other => panic!("expected tool result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tool_errors_do_not_abort_turn() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        ModelResponse {
            content: vec![
                ContentBlock::ToolUse {
                    id: "a".into(),
                    name: "read_file".into(),
                    input: json!({"path": "missing.txt"}),
                },
                ContentBlock::ToolUse {
                    id: "b".into(),
                    name: "run_command".into(),
                    input: json!({"command": "sudo ls"}),
                },
                ContentBlock::ToolUse {
                    id: "c".into(),
                    name: "no_such_tool".into(),
                    input: json!({}),
                },
            ],
            stop_reason: Some(StopReason::ToolUse),
        },
        ModelResponse::final_text("Those all failed."),
    ]));
    let f = fixture(backend.clone(), 20);

    let result = f
        .agent
        .process_message("c1", "term", "try things", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.tool_calls, 3);

    let results = &backend.history(1)[2].content;
    assert_eq!(results.len(), 3);
    let ids: Vec<_> = results
        .iter()
        .map(|block| match block {
            ContentBlock::ToolResult {
                tool_use_id,
                is_error,
                content,
            } => {
                assert!(*is_error, "{} should be an error: {}", tool_use_id, content);
                assert!(content.starts_with("Error: "));
                tool_use_id.as_str()
            }
            other => panic!("expected tool result, got {:?}", other),
        })
        .collect();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[tokio::test]
async fn test_empty_answer_not_replayed() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        ModelResponse {
            content: Vec::new(),
            stop_reason: Some(StopReason::EndTurn),
        },
        ModelResponse::final_text("back again"),
    ]));
    let f = fixture(backend.clone(), 20);
    let cancel = CancellationToken::new();

    let first = f.agent.process_message("c1", "term", "one", &cancel).await.unwrap();
    assert_eq!(first.response, "");
    f.agent.process_message("c1", "term", "two", &cancel).await.unwrap();

    let second = backend.history(1);
    assert!(second
        .iter()
        .flat_map(|m| &m.content)
        .all(|block| !matches!(block, ContentBlock::Text { text } if text.is_empty())));
    let texts: Vec<_> = second.iter().map(ChatMessage::text).collect();
    assert_eq!(texts, ["one", "two"]);

    let stored = f.store.get("c1").await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 3);
}

#[tokio::test]
async fn test_history_persisted_across_turns() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        ModelResponse::final_text("first answer"),
        ModelResponse::final_text("second answer"),
    ]));
    let f = fixture(backend.clone(), 20);
    let cancel = CancellationToken::new();

    f.agent.process_message("c1", "C42", "one", &cancel).await.unwrap();
    f.agent.process_message("c1", "C42", "two", &cancel).await.unwrap();

    let conversation = f.store.get("c1").await.unwrap().unwrap();
    assert_eq!(conversation.channel_ref, "C42");
    let texts: Vec<_> = conversation.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(texts, ["one", "first answer", "two", "second answer"]);

    // second call saw the first exchange
    let seen: Vec<_> = backend.history(1).iter().map(ChatMessage::text).collect();
    assert_eq!(seen, ["one", "first answer", "two"]);

    f.agent.clear_conversation("c1").await.unwrap();
    assert!(f.store.get("c1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_aborts_model_call() {
    let f = fixture(Arc::new(HangingBackend), 20);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        f.agent.process_message("c1", "term", "hello?", &cancel),
    )
    .await
    .expect("cancellation should be prompt")
    .unwrap_err();
    assert!(matches!(err, AgentError::Cancelled));

    let conversation = f.store.get("c1").await.unwrap().unwrap();
    assert_eq!(conversation.messages.len(), 1);
}

#[tokio::test]
async fn test_one_turn_per_conversation() {
    let backend = Arc::new(SlowBackend::default());
    let f = Arc::new(fixture(backend.clone(), 20));

    let same: Vec<_> = (0..3)
        .map(|i| {
            let f = f.clone();
            tokio::spawn(async move {
                f.agent
                    .process_message("shared", "term", &format!("msg {}", i), &CancellationToken::new())
                    .await
            })
        })
        .collect();
    for handle in same {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(f.store.get("shared").await.unwrap().unwrap().messages.len(), 6);

    backend.max_in_flight.store(0, Ordering::SeqCst);
    let distinct: Vec<_> = (0..3)
        .map(|i| {
            let f = f.clone();
            tokio::spawn(async move {
                f.agent
                    .process_message(&format!("c{}", i), "term", "hi", &CancellationToken::new())
                    .await
            })
        })
        .collect();
    for handle in distinct {
        handle.await.unwrap().unwrap();
    }
    assert!(backend.max_in_flight.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn test_concurrent_appends_all_land() {
    let store = Arc::new(MemoryStore::new());

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .add_message("busy", "term", Message::user(format!("m{}", i)))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let conversation = store.get("busy").await.unwrap().unwrap();
    assert_eq!(conversation.messages.len(), 50);
    for i in 0..50 {
        let expected = format!("m{}", i);
        assert!(conversation.messages.iter().any(|m| m.content == expected));
    }
}

#[tokio::test]
async fn test_store_round_trip_keeps_order() {
    let store = MemoryStore::new();
    for i in 0..20 {
        let message = if i % 2 == 0 {
            Message::user(format!("q{}", i))
        } else {
            Message::assistant(format!("a{}", i))
        };
        store.add_message("rt", "term", message).await.unwrap();
    }

    let history = store.get("rt").await.unwrap().unwrap().history();
    assert_eq!(history.len(), 20);
    for (i, message) in history.iter().enumerate() {
        let (role, prefix) = if i % 2 == 0 {
            (Role::User, "q")
        } else {
            (Role::Assistant, "a")
        };
        assert_eq!(message.role, role);
        assert_eq!(message.text(), format!("{}{}", prefix, i));
    }
}
