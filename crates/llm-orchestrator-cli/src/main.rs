// Copyright (c) 2025 LLM DevOps
// SPDX-License-Identifier: Apache-2.0

//! LLM Orchestrator CLI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use llm_orchestrator_core::engine::Engine;
use llm_orchestrator_functions::{AnthropicProvider, OpenAIProvider};
use std::fs;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "llm-orchestrator")]
#[command(version, about = "LLM Workflow Orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a workflow definition
    Validate {
        /// Path to workflow file
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Print the task graph's nodes and dependency edges
    Describe {
        /// Path to workflow file
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Run a workflow
    Run {
        /// Path to workflow file
        #[arg(value_name = "FILE")]
        file: String,

        /// Maximum number of tasks in flight at once (unset = whole ready frontier at once)
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Shallow-merge a "key=json_value" pair into the workflow's input
        /// data before running. May be repeated.
        #[arg(long = "override", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// List every task function available to loaded workflows
    ListFunctions,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("llm_orchestrator={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Validate { file } => validate_workflow(&file),
        Commands::Describe { file } => describe_workflow(&file),
        Commands::Run {
            file,
            max_concurrency,
            overrides,
        } => run_workflow(&file, max_concurrency, &overrides).await,
        Commands::ListFunctions => list_functions(),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Builds an engine with every builtin task function, plus the Anthropic and
/// OpenAI completion functions when their API key is present in the
/// environment.
fn build_engine() -> Engine {
    let engine = Engine::new();

    let anthropic = AnthropicProvider::from_env().ok().map(std::sync::Arc::new);
    if anthropic.is_some() {
        info!("Registered Anthropic provider");
    }
    let openai = OpenAIProvider::from_env().ok().map(std::sync::Arc::new);
    if openai.is_some() {
        info!("Registered OpenAI provider");
    }

    llm_orchestrator_functions::register_defaults(&engine.registry(), anthropic, openai);
    engine
}

fn load_workflow(engine: &Engine, file_path: &str) -> Result<String> {
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read workflow file: {}", file_path))?;
    engine
        .load(&content, None)
        .with_context(|| format!("Failed to parse workflow file: {}", file_path))
}

fn validate_workflow(file_path: &str) -> Result<()> {
    info!("Validating workflow: {}", file_path);
    println!("{} {}", "Validating workflow:".cyan().bold(), file_path);

    let engine = build_engine();
    let name = load_workflow(&engine, file_path)?;
    engine
        .validate(&name)
        .with_context(|| "Workflow validation failed")?;

    println!("{}", "\u{2713} Workflow is valid".green().bold());
    println!("  Name: {}", name);

    Ok(())
}

fn describe_workflow(file_path: &str) -> Result<()> {
    let engine = build_engine();
    let name = load_workflow(&engine, file_path)?;
    let view = engine
        .describe(&name)
        .with_context(|| "Failed to describe workflow")?;

    println!("{}", "Nodes:".cyan().bold());
    for node in &view.nodes {
        println!("  {}", node);
    }
    println!("{}", "Edges:".cyan().bold());
    for (from, to) in &view.edges {
        println!("  {} -> {}", from, to);
    }
    if !view.metadata.version.is_empty() || !view.metadata.description.is_empty() {
        println!("{}", "Metadata:".cyan().bold());
        println!("  version: {}", view.metadata.version);
        println!("  description: {}", view.metadata.description);
    }

    Ok(())
}

async fn run_workflow(file_path: &str, max_concurrency: Option<usize>, overrides: &[String]) -> Result<()> {
    info!("Running workflow: {}", file_path);
    println!("{} {}", "Running workflow:".cyan().bold(), file_path);

    let engine = build_engine();
    let name = load_workflow(&engine, file_path)?;
    engine
        .validate(&name)
        .with_context(|| "Workflow validation failed")?;

    let overrides = parse_overrides(overrides)?;

    println!("{}", "Executing workflow...".cyan());

    let outcome = engine
        .run_with_options(&name, overrides, max_concurrency)
        .await
        .with_context(|| "Workflow execution failed")?;

    let failed = outcome
        .tasks
        .values()
        .any(|t| !matches!(t.state, llm_orchestrator_core::state::TaskState::Success));

    if failed {
        println!("{}", "\u{26a0} Workflow completed with failures".yellow().bold());
    } else {
        println!("{}", "\u{2713} Workflow completed successfully".green().bold());
    }

    println!("\n{}", "Output:".cyan().bold());
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome.output).unwrap_or_else(|_| outcome.output.to_string())
    );

    println!("\n{}", "Tasks:".cyan().bold());
    for (name, summary) in &outcome.tasks {
        println!("  {}: {:?} ({} attempt(s))", name, summary.state, summary.attempts);
    }

    Ok(())
}

/// Parses repeated `--override key=json_value` arguments into the shallow
/// merge map `Engine::run_with_options` expects. A value that doesn't parse
/// as JSON is kept as a plain string (so `--override name=bob` doesn't
/// require quoting).
fn parse_overrides(raw: &[String]) -> Result<Option<serde_json::Map<String, serde_json::Value>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut map = serde_json::Map::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .with_context(|| format!("invalid --override '{}': expected KEY=VALUE", entry))?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        map.insert(key.to_string(), value);
    }
    Ok(Some(map))
}

fn list_functions() -> Result<()> {
    let engine = build_engine();
    println!("{}", "Available functions:".cyan().bold());
    for name in engine.list_functions() {
        println!("  {}", name);
    }
    Ok(())
}
