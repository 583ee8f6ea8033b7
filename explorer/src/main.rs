//! `explorer` CLI: run exploration sessions and inspect their results.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

use explorer::exit_codes;
use explorer::explore::{ExplorationMode, Explorer};
use explorer::io::config::{DEFAULT_CONFIG_FILE, ExplorerConfig, load_config, write_config};
use explorer::io::device::{AdbDevice, list_devices};
use explorer::io::doc_store::DocumentationStore;
use explorer::io::layout::{AppPaths, SessionPaths};
use explorer::io::reasoning::OpenAiReasoning;
use explorer::io::similarity::GraySsim;
use explorer::logging;

#[derive(Parser)]
#[command(
    name = "explorer",
    version,
    about = "Autonomous UI exploration agent that documents app elements"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Explore an app toward a task, documenting the elements it touches.
    Explore {
        /// App name; selects `apps/<app>/` under the root directory.
        #[arg(long)]
        app: String,
        /// Task description given to the planner.
        #[arg(long)]
        task: String,
        #[arg(long, default_value = ".")]
        root_dir: PathBuf,
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Device serial; overrides `device.serial`.
        #[arg(long)]
        device: Option<String>,
        /// Screenshot of the goal screen; enables the early-exit similarity check.
        #[arg(long)]
        reference: Option<PathBuf>,
    },
    /// List attached devices.
    Devices {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Print the documentation recorded for an app.
    Docs {
        #[arg(long)]
        app: String,
        #[arg(long, default_value = ".")]
        root_dir: PathBuf,
    },
    /// Write a config file with default values.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Explore {
            app,
            task,
            root_dir,
            config,
            device,
            reference,
        } => cmd_explore(&app, &task, &root_dir, &config, device, reference),
        Command::Devices { config } => cmd_devices(&config),
        Command::Docs { app, root_dir } => cmd_docs(&app, &root_dir),
        Command::InitConfig { force, config } => cmd_init_config(&config, force),
    }
}

fn cmd_explore(
    app: &str,
    task: &str,
    root_dir: &Path,
    config_path: &Path,
    serial: Option<String>,
    reference: Option<PathBuf>,
) -> Result<i32> {
    let mut cfg = load_config(config_path)?;
    if serial.is_some() {
        cfg.device.serial = serial;
    }
    let paths = SessionPaths::new(AppPaths::new(root_dir, app)?, &Local::now());

    let device = AdbDevice::connect(&cfg.device).context("connect device")?;
    let reasoning = OpenAiReasoning::from_config(&cfg.reasoning)?;
    let mode = match reference {
        Some(reference) => {
            if !reference.is_file() {
                anyhow::bail!("reference image {} not found", reference.display());
            }
            ExplorationMode::EarlyExit {
                reference,
                scorer: Box::new(GraySsim::default()),
            }
        }
        None => ExplorationMode::Plain,
    };

    let report = Explorer::new(&device, &reasoning, &cfg, mode)?.run(&paths, task)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serialize report")?
    );
    Ok(report.outcome.exit_code())
}

fn cmd_devices(config_path: &Path) -> Result<i32> {
    let cfg = load_config(config_path)?;
    for serial in list_devices(&cfg.device)? {
        println!("{serial}");
    }
    Ok(exit_codes::OK)
}

fn cmd_docs(app: &str, root_dir: &Path) -> Result<i32> {
    let app = AppPaths::new(root_dir, app)?;
    if !app.docs_dir.is_dir() {
        anyhow::bail!("no documentation at {}", app.docs_dir.display());
    }
    let records = DocumentationStore::open(&app.docs_dir)?.list()?;
    println!(
        "{}",
        serde_json::to_string_pretty(&records).context("serialize docs")?
    );
    Ok(exit_codes::OK)
}

fn cmd_init_config(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &ExplorerConfig::default())?;
    Ok(exit_codes::OK)
}
