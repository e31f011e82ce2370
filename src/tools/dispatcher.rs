//! Name → handler registry and the dispatcher built on it

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};

use super::{ToolContext, ToolError, ToolHandler};
use crate::llm::{ToolDefinition, ToolInvocation, ToolResult};
use crate::metrics::TOOL_CALLS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool {0} is in the catalog but has no handler")]
    MissingHandler(String),
    #[error("handler {0} has no catalog entry")]
    Uncatalogued(String),
    #[error("tool {0} is listed more than once in the catalog")]
    DuplicateDefinition(String),
}

#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; a later registration under the same name wins.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Routes tool invocations to their handlers
pub struct ToolDispatcher {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    catalog: Vec<ToolDefinition>,
}

impl ToolDispatcher {
    /// Pair a registry with the catalog shown to the model. Every catalog
    /// entry needs a handler and every handler needs a catalog entry.
    pub fn new(registry: ToolRegistry, catalog: Vec<ToolDefinition>) -> Result<Self, RegistryError> {
        let mut seen = std::collections::HashSet::new();
        for def in &catalog {
            if !seen.insert(def.name.as_str()) {
                return Err(RegistryError::DuplicateDefinition(def.name.clone()));
            }
            if !registry.handlers.contains_key(&def.name) {
                return Err(RegistryError::MissingHandler(def.name.clone()));
            }
        }

        let mut extra: Vec<&String> = registry
            .handlers
            .keys()
            .filter(|name| !seen.contains(name.as_str()))
            .collect();
        extra.sort();
        if let Some(name) = extra.first() {
            return Err(RegistryError::Uncatalogued((*name).clone()));
        }

        Ok(Self {
            handlers: registry.handlers,
            catalog,
        })
    }

    /// Tool definitions for the model request
    pub fn catalog(&self) -> &[ToolDefinition] {
        &self.catalog
    }

    /// Execute one invocation. Failures become error-flagged results so
    /// the loop can report them to the model and keep going.
    pub async fn dispatch(&self, invocation: &ToolInvocation, ctx: &ToolContext) -> ToolResult {
        let span = info_span!(
            "tool_call",
            trace_id = %ctx.trace_id,
            tool = %invocation.name,
            otel.name = "tool_call"
        );

        // model-supplied names stay out of the metric labels
        let label = if self.handlers.contains_key(&invocation.name) {
            invocation.name.as_str()
        } else {
            "unknown"
        };

        async {
            match self.execute(&invocation.name, invocation.arguments.clone(), ctx).await {
                Ok(output) => {
                    TOOL_CALLS.with_label_values(&[label, "ok"]).inc();
                    debug!(output_len = output.len(), "tool succeeded");
                    ToolResult::ok(&invocation.id, output)
                }
                Err(e) => {
                    TOOL_CALLS.with_label_values(&[label, "error"]).inc();
                    match &e {
                        ToolError::Rejected(_) => debug!(error = %e, "tool rejected"),
                        _ => warn!(error = %e, "tool failed"),
                    }
                    ToolResult::error(&invocation.id, format!("Error: {}", e))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run a tool by name. Aborts with `Cancelled` as soon as the context's
    /// token fires; dropping the handler future kills any subprocess it
    /// spawned.
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(ToolError::Cancelled),
            result = handler.call(args, ctx) => result,
        }
    }
}
