//! ringcheck - three-tier compliance gap scanner
//!
//! `ringcheck scan <path>` consults the configured tiers, runs the reasoning
//! agent over the scan root, and prints (or writes) the compliance report.
//!
//! **Startup order:**
//! 1. Parse CLI
//! 2. Load configuration (CLI → `RINGCHECK_CONFIG` → TOML file → defaults)
//! 3. Initialize tracing, log build identification
//! 4. Authentication phase: resolve tier tokens into the credential store
//! 5. Build the engine and scan
//!
//! Exit codes: 0 completed scan, 2 configuration error, 3 contract breach.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ringcheck::config::build_engine;
use ringcheck::{
    parse_ring_selection, ScanError, ScanRequest, EXIT_CONFIG, EXIT_CONTRACT_BREACH, EXIT_OK,
};
use ringcheck_common::config::{load_config, AgentKind, ScanMode, TomlConfig};
use ringcheck_common::credentials::CredentialStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for ringcheck
#[derive(Parser, Debug)]
#[command(name = "ringcheck")]
#[command(about = "Three-tier compliance gap scanner")]
#[command(version)]
struct Cli {
    /// Configuration file (overrides RINGCHECK_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a directory
    Scan(ScanArgs),
}

#[derive(clap::Args, Debug)]
struct ScanArgs {
    /// Scan root
    path: PathBuf,

    /// Tiers to consult: comma-separated codified, informal, external, or all
    #[arg(long, default_value = "all")]
    ring: String,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Orchestration mode
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Candidate manifest produced by an offline agent run
    #[arg(long, conflicts_with = "agent_command")]
    candidates: Option<PathBuf>,

    /// Agent process command line (whitespace-separated)
    #[arg(long)]
    agent_command: Option<String>,

    /// Per-tier timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    tier_timeout: Option<u64>,

    /// Scan deadline in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    deadline: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Eager,
    Agent,
}

impl From<ModeArg> for ScanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Eager => ScanMode::Eager,
            ModeArg::Agent => ScanMode::Agent,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<ScanError>()
                .map_or(EXIT_CONFIG, ScanError::exit_code);
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let (mut config, config_path) =
        load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    init_tracing(&config, cli.verbose);

    info!(
        "Starting ringcheck v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No configuration file found, using built-in defaults"),
    }

    match cli.command {
        Command::Scan(args) => scan(&mut config, args).await,
    }
}

async fn scan(config: &mut TomlConfig, args: ScanArgs) -> Result<i32> {
    apply_overrides(config, &args);
    let rings = parse_ring_selection(&args.ring)?;

    // Authentication phase: the only process-wide state, populated once
    let credentials = Arc::new(CredentialStore::new());
    credentials
        .initialize_from_config(&config.tiers, |name| std::env::var(name).ok())
        .context("Failed to resolve tier credentials")?;

    let engine = build_engine(config, credentials)?;
    let report = engine
        .scan(ScanRequest {
            path: args.path,
            rings,
        })
        .await?;

    match &args.output {
        Some(path) => {
            report
                .write_to(path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", report.to_json()?),
    }

    if let Some(breach) = report.assembly_error() {
        error!(error = breach, "Internal contract breach, report emitted empty");
        return Ok(EXIT_CONTRACT_BREACH);
    }
    Ok(EXIT_OK)
}

/// CLI flags take priority over the TOML file
fn apply_overrides(config: &mut TomlConfig, args: &ScanArgs) {
    if let Some(mode) = args.mode {
        config.scan.mode = mode.into();
    }
    if let Some(secs) = args.tier_timeout {
        config.scan.tier_timeout_secs = secs;
    }
    if let Some(secs) = args.deadline {
        config.scan.deadline_secs = secs;
    }
    if let Some(path) = &args.candidates {
        config.agent.kind = AgentKind::Manifest;
        config.agent.candidates = Some(path.clone());
    }
    if let Some(command) = &args.agent_command {
        config.agent.kind = AgentKind::Command;
        config.agent.command = command.split_whitespace().map(str::to_string).collect();
    }
}

/// Logs go to stderr; `--verbose` beats `RUST_LOG`, which beats `[logging] level`
fn init_tracing(config: &TomlConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("ringcheck=debug,ringcheck_common=debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.logging.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
