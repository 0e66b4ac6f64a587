//! math-agent: tool-calling math assistant.
//!
//! Usage:
//!   math-agent run "Integrate x^2"     Run one request through the agent
//!   math-agent tools                    Print the tool catalog as JSON
//!   math-agent call add '{"a":1,"b":2}' Invoke one tool directly
//!   math-agent init                     Write a default config file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use math_agent::agent::{Agent, Completion, LoopOptions};
use math_agent::cas::SymbolicEngine;
use math_agent::config::{self, AgentConfig};
use math_agent::error::ErrorReport;
use math_agent::inference::InferenceClient;
use math_agent::search::TavilyClient;
use math_agent::tools::ToolRegistry;
use math_agent::types::*;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "math-agent")]
#[command(version)]
#[command(about = "Tool-calling LLM agent for arithmetic, calculus and web lookups")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ~/.math-agent/config.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one request through the agent loop.
    Run {
        /// The question or task for the agent.
        request: String,

        /// Print every step of the run.
        #[arg(short, long)]
        verbose: bool,

        /// Override the maximum number of model turns.
        #[arg(long)]
        max_iterations: Option<usize>,
    },

    /// Print the tool catalog as JSON.
    Tools,

    /// Invoke a single tool directly, without the model.
    Call {
        /// Tool name, e.g. `symbolic_integral`.
        tool: String,

        /// Arguments as a JSON object.
        #[arg(default_value = "{}")]
        args: String,
    },

    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config_path = cli
        .config
        .as_deref()
        .map(config::resolve_path)
        .unwrap_or_else(config::default_config_path);
    let cfg = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        .with_env_overrides();

    // Initialize logging
    let level = cli.log_level.clone().unwrap_or_else(|| cfg.log_level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            request,
            verbose,
            max_iterations,
        } => cmd_run(cfg, &request, verbose, max_iterations).await,
        Commands::Tools => cmd_tools(&cfg),
        Commands::Call { tool, args } => cmd_call(&cfg, &tool, &args).await,
        Commands::Init { force } => cmd_init(&config_path, force),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_run(
    mut cfg: AgentConfig,
    request: &str,
    verbose: bool,
    max_iterations: Option<usize>,
) -> Result<()> {
    if let Some(n) = max_iterations {
        cfg.max_iterations = n;
    }
    cfg.validate().context("Invalid configuration")?;
    if cfg.inference_api_key.is_empty() {
        bail!("No inference API key. Set OPENAI_API_KEY or inference_api_key in the config file.");
    }
    if cfg.search_api_key.is_empty() {
        warn!("No TAVILY_API_KEY set; web_searcher will report itself unavailable");
    }

    let registry = Arc::new(build_registry(&cfg)?);
    let model = Arc::new(InferenceClient::from_config(&cfg));
    let agent = Agent::new(model, registry, LoopOptions::from_config(&cfg));

    println!(
        "{} Running with {} (max {} turns)",
        ">>>".green().bold(),
        cfg.model,
        cfg.max_iterations,
    );

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{} Cancelling...", "<<<".red().bold());
            ctrl_c_cancel.cancel();
        }
    });

    match agent.run_with_cancel(request, cancel).await {
        Ok(done) => {
            if verbose {
                print_steps(&done);
            }
            println!("\n{}", done.answer);
            info!(
                "{} model turns, {} tokens",
                done.model_turns, done.usage.total_tokens
            );
            Ok(())
        }
        Err(e) => {
            print_report(&e.report());
            std::process::exit(1);
        }
    }
}

fn cmd_tools(cfg: &AgentConfig) -> Result<()> {
    let registry = build_registry(cfg)?;
    let schema = serde_json::to_string_pretty(&registry.schema())?;
    println!("{}", schema);
    Ok(())
}

async fn cmd_call(cfg: &AgentConfig, tool: &str, args: &str) -> Result<()> {
    let arguments: serde_json::Value =
        serde_json::from_str(args).context("Arguments must be valid JSON")?;
    let registry = build_registry(cfg)?;

    match registry.invoke(tool, &arguments).await {
        Ok(value) => {
            println!("{}", value);
            Ok(())
        }
        Err(e) => {
            print_report(&e.report());
            std::process::exit(1);
        }
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    config::save_config(&AgentConfig::default(), config_path)?;
    println!(
        "{} Wrote default config to {}",
        ">>>".green().bold(),
        config_path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_registry(cfg: &AgentConfig) -> Result<ToolRegistry> {
    let registry = ToolRegistry::with_default_tools(
        Arc::new(SymbolicEngine::new()),
        Arc::new(TavilyClient::from_config(cfg)),
    )
    .context("Failed to build tool registry")?;
    Ok(registry)
}

fn print_steps(done: &Completion) {
    println!();
    println!("{}", "=== Steps ===".bold());
    for turn in done.conversation.turns() {
        match turn {
            Turn::User { content } => println!("  {} {}", "user".cyan().bold(), content),
            Turn::ToolRequests { content, calls } => {
                if let Some(text) = content {
                    println!("  {} {}", "model".blue().bold(), text);
                }
                for call in calls {
                    println!(
                        "  {} {}({})",
                        "call".yellow().bold(),
                        call.name,
                        call.arguments
                    );
                }
            }
            Turn::ToolResult(result) if result.success => {
                println!("  {} {}", "  ok".green(), result.output);
            }
            Turn::ToolResult(result) => {
                println!("  {} {}", " err".red(), result.output);
            }
            Turn::Assistant { .. } => {}
        }
    }
    let trace: Vec<String> = done.trace.iter().map(|s| s.to_string()).collect();
    println!("  {} {}", "states".dimmed(), trace.join(" -> ").dimmed());
    let elapsed = done.finished_at - done.started_at;
    println!(
        "  {} {} ({} ms)",
        "started".dimmed(),
        done.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed(),
        elapsed.num_milliseconds()
    );
}

fn print_report(report: &ErrorReport) {
    eprintln!(
        "{} [{}] {}",
        "Error:".red().bold(),
        report.kind,
        report.message
    );
}
