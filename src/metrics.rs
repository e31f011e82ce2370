//! Prometheus metrics for the agent loop and command execution
//!
//! All metrics live in the default registry; `gather_metrics()` renders them
//! in the text exposition format for the `/metrics` REPL command.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Agent Loop Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Agent turns by how they ended.
    ///
    /// Labels:
    /// - outcome: "done", "iteration_limit", "cancelled", "model_error"
    pub static ref AGENT_TURNS: IntCounterVec = register_int_counter_vec!(
        "devbot_agent_turns_total",
        "Agent turns by outcome",
        &["outcome"]
    ).expect("failed to register AGENT_TURNS metric");

    /// Model calls per finished turn.
    pub static ref AGENT_ITERATIONS: Histogram = register_histogram!(
        "devbot_agent_iterations",
        "Model calls made per agent turn",
        vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 20.0, 40.0]
    ).expect("failed to register AGENT_ITERATIONS metric");

    /// Wall-clock time of a single model call.
    ///
    /// Labels:
    /// - model: model identifier sent to the backend
    pub static ref MODEL_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "devbot_model_call_duration_seconds",
        "Model backend call duration in seconds",
        &["model"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).expect("failed to register MODEL_CALL_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Tool Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Tool invocations by tool and status.
    ///
    /// Labels:
    /// - tool: tool name from the catalog (or "unknown")
    /// - status: "ok" or "error"
    pub static ref TOOL_CALLS: IntCounterVec = register_int_counter_vec!(
        "devbot_tool_calls_total",
        "Tool invocations by tool and status",
        &["tool", "status"]
    ).expect("failed to register TOOL_CALLS metric");

    /// Validator verdicts for model-requested commands.
    ///
    /// Labels:
    /// - verdict: "allowed" or "rejected"
    pub static ref COMMAND_VERDICTS: IntCounterVec = register_int_counter_vec!(
        "devbot_command_verdicts_total",
        "Command validation verdicts",
        &["verdict"]
    ).expect("failed to register COMMAND_VERDICTS metric");

    /// Subprocess duration by how it ended.
    ///
    /// Labels:
    /// - status: "success", "failure", "timeout"
    pub static ref COMMAND_DURATION: HistogramVec = register_histogram_vec!(
        "devbot_command_duration_seconds",
        "Shell command duration in seconds",
        &["status"],
        vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 180.0, 300.0]
    ).expect("failed to register COMMAND_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Store Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Conversations currently held in memory.
    pub static ref CONVERSATIONS_ACTIVE: IntGauge = register_int_gauge!(
        "devbot_conversations_active",
        "Conversations currently held by the store"
    ).expect("failed to register CONVERSATIONS_ACTIVE metric");

    /// Conversations removed by TTL cleanup.
    pub static ref CONVERSATIONS_EXPIRED: IntCounter = register_int_counter!(
        "devbot_conversations_expired_total",
        "Conversations removed by time-based cleanup"
    ).expect("failed to register CONVERSATIONS_EXPIRED metric");
}

/// Render every registered metric in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
