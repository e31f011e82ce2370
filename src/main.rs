//! devbot terminal front-end
//!
//! Each input line is one user turn in a single conversation. Replies go to
//! stdout, logs to stderr.
//!
//! Commands: `/reset` forgets the conversation, `/metrics` prints the
//! Prometheus registry, `/quit` exits. Ctrl-C cancels the turn in flight, or
//! exits when idle.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use devbot::agent::{load_system_prompt, AgentConfig, AgentController, AgentError};
use devbot::config::Config;
use devbot::executor::CommandRunner;
use devbot::git::{GitHub, GitOps};
use devbot::llm::AnthropicClient;
use devbot::metrics::gather_metrics;
use devbot::security::CommandValidator;
use devbot::storage::{ConversationStore, MemoryStore};
use devbot::tools::Toolbox;
use devbot::tracing::{init_tracing, new_trace_id, shutdown_tracing};
use devbot::workspace::RepoWorkspace;

const CHANNEL_REF: &str = "terminal";
const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    init_tracing("devbot", config.otlp_endpoint.as_deref(), config.log_format)
        .map_err(|e| anyhow!(e))
        .context("failed to initialize tracing")?;

    let result = run(config).await;
    shutdown_tracing();
    result
}

async fn run(config: Config) -> Result<()> {
    let workspace = RepoWorkspace::from_config(&config).context("invalid workspace settings")?;
    workspace
        .ensure_ready()
        .await
        .context("failed to prepare repository")?;
    let repo = workspace.repo_path().to_path_buf();
    info!(mode = %workspace.mode(), repo = %repo.display(), "repository ready");

    let validator = Arc::new(CommandValidator::default());
    let toolbox = Toolbox {
        root: devbot::codebase::RepoRoot::new(&repo),
        runner: Arc::new(CommandRunner::new(&repo).with_max_output_bytes(config.max_output_bytes)),
        git: Arc::new(GitOps::new(&repo, validator.clone())),
        github: Arc::new(GitHub::new(&repo, config.github_token.clone())),
        validator,
        build_cmd: config.build_cmd.clone(),
        test_cmd: config.test_cmd.clone(),
        guidelines_file: config.guidelines_file.clone(),
        command_timeout: config.command_timeout,
    };
    let dispatcher = Arc::new(
        toolbox
            .dispatcher()
            .context("tool registry does not match the catalog")?,
    );

    let backend = Arc::new(AnthropicClient::new(
        &config.anthropic_base_url,
        &config.anthropic_api_key,
        &config.model,
        config.max_tokens,
    ));
    let store = Arc::new(MemoryStore::new());
    let system_prompt = load_system_prompt(&repo, Some(&config.guidelines_file));
    let agent = AgentController::new(
        backend,
        store.clone(),
        dispatcher,
        AgentConfig::from_config(&config, Some(system_prompt)),
    );

    let cleanup = spawn_cleanup(store, config.conversation_ttl);

    println!("devbot ready on {} ({} mode)", repo.display(), workspace.mode());
    println!("Commands: /reset, /metrics, /quit. Ctrl-C cancels a running turn.\n");

    let outcome = repl(&agent).await;
    cleanup.abort();
    outcome
}

async fn repl(agent: &AgentController) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut conversation_id = new_trace_id();

    loop {
        print!("devbot> ");
        std::io::stdout().flush().context("failed to write prompt")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read input")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };

        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => return Ok(()),
            "/metrics" => {
                print!("{}", gather_metrics());
                continue;
            }
            "/reset" => {
                if let Err(e) = agent.clear_conversation(&conversation_id).await {
                    warn!(error = %e, "failed to clear conversation");
                }
                conversation_id = new_trace_id();
                println!("Conversation cleared.\n");
                continue;
            }
            _ => {}
        }

        let cancel = CancellationToken::new();
        let turn = agent.process_message(&conversation_id, CHANNEL_REF, line, &cancel);
        tokio::pin!(turn);

        let result = tokio::select! {
            result = &mut turn => result,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                turn.await
            }
        };

        match result {
            Ok(reply) => println!("{}\n", reply.response),
            Err(AgentError::Cancelled) => println!("(cancelled)\n"),
            Err(e) => println!("Sorry, I encountered an error: {}\n", e),
        }
    }
}

fn spawn_cleanup(store: Arc<MemoryStore>, ttl: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL.min(ttl));
        loop {
            ticker.tick().await;
            match store.cleanup(ttl).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired idle conversations"),
                Err(e) => warn!(error = %e, "conversation cleanup failed"),
            }
        }
    })
}
