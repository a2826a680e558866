//! Orrery CLI
//!
//! - `orrery validate <files>...` checks definition files and lists every problem
//! - `orrery run <file>` runs a definition with echo handlers, delivering
//!   `--signal`s once the instance settles

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use orrery_definition::{ProcessDefinition, validate_definition};
use orrery_engine::ProcessEngine;
use orrery_execution::CorrelationKey;
use orrery_workitem::{
    DataMap, HandlerFault, WorkItem, WorkItemHandler, WorkItemManager, WorkItemOutcome,
};
use serde_json::{Value, json};

mod config;

use config::CliConfig;

/// Orrery process engine CLI
#[derive(Parser)]
#[command(name = "orrery")]
#[command(about = "Validate and run Orrery process definitions", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ORRERY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Reject writes to undeclared variables
    #[arg(long, global = true)]
    strict: bool,

    /// Log format (pretty, compact, json)
    #[arg(long, global = true)]
    log_format: Option<orrery_log::Format>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate definition files
    Validate {
        /// JSON definition files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run a definition until it settles
    Run {
        /// JSON definition file
        file: PathBuf,

        /// Initial variable, `name=value`; the value is parsed as JSON when possible
        #[arg(long = "var", value_parser = parse_assignment)]
        vars: Vec<(String, Value)>,

        /// Signal to deliver after start, `name` or `name=payload`
        #[arg(long = "signal", value_parser = parse_assignment)]
        signals: Vec<(String, Value)>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.strict {
        config.engine.strict_variables = true;
    }
    if let Some(format) = cli.log_format {
        config.log.format = format;
    }
    let _guard = orrery_log::init_with(config.log.clone())?;

    match cli.command {
        Commands::Validate { files } => validate(&files),
        Commands::Run {
            file,
            vars,
            signals,
        } => run(config, &file, vars, signals).await,
    }
}

fn validate(files: &[PathBuf]) -> anyhow::Result<()> {
    let mut invalid = 0usize;
    for file in files {
        let definition = load_definition(file)?;
        let errors = validate_definition(&definition);
        if errors.is_empty() {
            println!("{}: ok ({} nodes)", file.display(), definition.nodes.len());
            continue;
        }
        invalid += 1;
        println!("{}: {} problem(s)", file.display(), errors.len());
        for error in errors {
            println!("  - {error}");
        }
    }
    if invalid > 0 {
        bail!("{invalid} of {} definition(s) invalid", files.len());
    }
    Ok(())
}

async fn run(
    config: CliConfig,
    file: &Path,
    vars: Vec<(String, Value)>,
    signals: Vec<(String, Value)>,
) -> anyhow::Result<()> {
    let definition = load_definition(file)?;
    let process = definition.id.clone();
    let engine = ProcessEngine::new(config.engine);
    let echo: Arc<dyn WorkItemHandler> = Arc::new(EchoHandler);
    for task_type in definition.task_types() {
        engine.register_handler(task_type.clone(), Arc::clone(&echo));
    }
    engine.register_definition(definition)?;

    let mut summary = engine.start(&process, vars.into_iter().collect()).await?;
    for (name, payload) in signals {
        if summary.is_terminal() {
            tracing::warn!(signal = %name, "instance already finished, remaining signals skipped");
            break;
        }
        summary = engine
            .signal(summary.id, &CorrelationKey::signal(name), payload)
            .await?;
    }

    let variables = engine.variables(summary.id).await?;
    let report = json!({ "summary": summary, "variables": variables });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn load_definition(path: &Path) -> anyhow::Result<ProcessDefinition> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = match raw.split_once('=') {
        Some((name, value)) => (name, parse_value(value)),
        None => (raw, Value::Null),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing name in `{raw}`"));
    }
    Ok((name.to_owned(), value))
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

/// Completes every work item with its own parameters.
struct EchoHandler;

#[async_trait]
impl WorkItemHandler for EchoHandler {
    async fn execute(
        &self,
        item: &WorkItem,
        _manager: Arc<dyn WorkItemManager>,
    ) -> Result<WorkItemOutcome, HandlerFault> {
        tracing::info!(
            work_item = %item.id,
            task_type = %item.task_type,
            "echoing work item parameters"
        );
        let results: DataMap = item.parameters.clone();
        Ok(WorkItemOutcome::Completed(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn assignments_parse_json_or_fall_back_to_string() {
        assert_eq!(parse_assignment("n=3").unwrap(), ("n".to_owned(), json!(3)));
        assert_eq!(
            parse_assignment("who=mary").unwrap(),
            ("who".to_owned(), json!("mary"))
        );
        assert_eq!(
            parse_assignment("approved").unwrap(),
            ("approved".to_owned(), Value::Null)
        );
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "orrery",
            "run",
            "p.json",
            "--var",
            "x=1",
            "--signal",
            "go",
            "--strict",
        ])
        .unwrap();
        assert!(cli.strict);
        let Commands::Run { vars, signals, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(vars, vec![("x".to_owned(), json!(1))]);
        assert_eq!(signals, vec![("go".to_owned(), Value::Null)]);
    }
}
