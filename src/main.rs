// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use the_cncwood::config::{load_config, validate_config, ExecutionMode, RuntimeBuilder, RuntimeConfig};
use the_cncwood::demos::{self, Transcript};
use the_cncwood::errors::ConfigError;
use the_cncwood::observability::init_subscriber;
use the_cncwood::observability::messages::config::ConfigLoaded;
use the_cncwood::observability::messages::StructuredLog;

/// cncwood - run tag-driven dataflow graphs
#[derive(Parser)]
#[command(name = "cncwood")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one of the demo graphs
    Run(RunArgs),
    /// List the demo graphs
    Demos,
}

#[derive(Args)]
struct RunArgs {
    /// Name of the demo, as listed by `cncwood demos`
    demo: String,

    /// Runtime configuration file (YAML or TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override `execution.mode`
    #[arg(long, value_enum)]
    mode: Option<ExecutionMode>,

    /// Override `execution.workers`
    #[arg(long)]
    workers: Option<usize>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    report: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Demos => {
            for demo in demos::all() {
                println!("{:<14} {}", demo.name, demo.title);
                println!("{:<14} {}", "", demo.description);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run(args) => run_demo(args).await,
    }
}

async fn run_demo(args: RunArgs) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.execution.mode = mode;
    }
    if let Some(workers) = args.workers {
        config.execution.workers = Some(workers);
    }

    init_subscriber(&config.logging.filter);
    validate_config(&config).map_err(ConfigError::Invalid)?;
    if let Some(path) = &args.config {
        ConfigLoaded {
            path: &path.display().to_string(),
            mode: config.execution.mode.as_str(),
            workers: config.execution.workers,
        }
        .log();
    }

    let demo = demos::find(&args.demo).ok_or_else(|| {
        anyhow!(
            "unknown demo '{}'; run `cncwood demos` to list them",
            args.demo
        )
    })?;

    let cancellation = CancellationToken::new();
    let options = RuntimeBuilder::from_config(&config).with_cancellation(cancellation.clone());
    let transcript = Transcript::echo();
    let mut task = tokio::task::spawn_blocking(move || demo.run(options, &transcript));

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("interrupted, aborting {}", demo.name);
            cancellation.cancel();
            task.await
        }
    };
    let run = joined
        .context("demo task failed")?
        .with_context(|| format!("invalid graph definition in demo '{}'", demo.name))?;

    if args.report {
        println!("{}", serde_json::to_string_pretty(&run.report)?);
    } else {
        eprintln!("{}", run.report);
    }

    match run.result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("error: {}", err);
            Ok(ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1)))
        }
    }
}
