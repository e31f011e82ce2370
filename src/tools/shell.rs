//! Command execution tools
//!
//! Model-supplied commands go through the validator before the runner
//! ever sees them. Build and test commands come from configuration; only
//! their extra arguments are model-supplied.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{parse_args, ToolContext, ToolError, ToolHandler, ToolRegistry, Toolbox};
use crate::executor::{CommandRunner, RunnerError};
use crate::metrics::COMMAND_VERDICTS;
use crate::security::{CommandValidator, ValidatedCommand, Verdict};

pub(super) fn register(registry: &mut ToolRegistry, toolbox: &Toolbox) {
    let shell = Shell {
        validator: toolbox.validator.clone(),
        runner: toolbox.runner.clone(),
        timeout: toolbox.command_timeout,
    };

    registry.register("run_command", Arc::new(RunCommand(shell.clone())));
    registry.register(
        "run_build",
        Arc::new(RunConfigured {
            shell: shell.clone(),
            command: toolbox.build_cmd.clone(),
        }),
    );
    registry.register(
        "run_tests",
        Arc::new(RunConfigured {
            shell,
            command: toolbox.test_cmd.clone(),
        }),
    );
}

#[derive(Clone)]
struct Shell {
    validator: Arc<CommandValidator>,
    runner: Arc<CommandRunner>,
    timeout: Duration,
}

impl Shell {
    fn admit(
        &self,
        authorized: Result<ValidatedCommand, Verdict>,
    ) -> Result<ValidatedCommand, ToolError> {
        match authorized {
            Ok(command) => {
                COMMAND_VERDICTS.with_label_values(&["allowed"]).inc();
                Ok(command)
            }
            Err(verdict) => {
                COMMAND_VERDICTS.with_label_values(&["rejected"]).inc();
                debug!(reason = %verdict.reason, "command rejected");
                Err(ToolError::Rejected(verdict.reason))
            }
        }
    }

    async fn run(&self, command: ValidatedCommand, ctx: &ToolContext) -> Result<String, ToolError> {
        info!(trace_id = %ctx.trace_id, command = %command, "running command");
        match self.runner.run(&command, self.timeout, &ctx.cancel).await {
            Ok(result) => Ok(result.format_result()),
            Err(RunnerError::Cancelled) => Err(ToolError::Cancelled),
            Err(e) => Err(e.into()),
        }
    }
}

struct RunCommand(Shell);

#[derive(Deserialize)]
struct RunCommandArgs {
    command: String,
}

#[async_trait]
impl ToolHandler for RunCommand {
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let args: RunCommandArgs = parse_args(args)?;
        let command = self.0.admit(self.0.validator.authorize(&args.command))?;
        self.0.run(command, ctx).await
    }
}

/// `run_build` / `run_tests`
struct RunConfigured {
    shell: Shell,
    command: String,
}

#[derive(Deserialize)]
struct RunConfiguredArgs {
    args: Option<String>,
}

#[async_trait]
impl ToolHandler for RunConfigured {
    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let args: RunConfiguredArgs = parse_args(args)?;
        let command = self.shell.admit(
            self.shell
                .validator
                .authorize_operator(&self.command, args.args.as_deref()),
        )?;
        self.shell.run(command, ctx).await
    }
}
