// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Snapclass: image classification log
//!
//! Web front end plus command line access to the same store.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use snapclass::config::AppConfig;
use snapclass::db::{AnalysisRecord, Database};
use snapclass::export;
use snapclass::submission::{self, Classifiers, Notice, SubmissionForm};
use snapclass::{Result, SnapclassError};

/// Snapclass CLI - image classification log
#[derive(Parser, Debug)]
#[command(name = "snapclass")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Submit image paths for classification and keep a history", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web UI
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Open browser automatically
        #[arg(long)]
        open: bool,
    },

    /// Submit one image path and store the outcome
    Analyze {
        /// Image path sent to the classification API
        image_path: String,

        /// Use the randomized mock instead of the remote API
        #[arg(short, long)]
        debug: bool,

        /// Output format
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// List stored results, newest first
    List {
        /// Maximum number to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Export all results as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Serve { host, port, open }) => run_serve(config, host, port, open).await,
        Some(Commands::Analyze { image_path, debug, format }) => {
            run_analyze(config, image_path, debug, &format).await
        }
        Some(Commands::List { limit, format }) => run_list(config, limit, &format),
        Some(Commands::Export { output }) => run_export(config, output),
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        None => run_serve(config, None, None, false).await,
    }
}

/// Run the web server
async fn run_serve(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
    open: bool,
) -> Result<()> {
    info!("Snapclass v1.0.0");

    if let Some(host) = host {
        config.web.host = host;
    }
    if let Some(port) = port {
        config.web.port = port;
    }

    let db = Database::open(&config.database.path)?;
    info!("Database: {}", config.database.path);

    if open {
        let url = format!("http://{}:{}", config.web.host, config.web.port);
        if let Err(e) = open_browser(&url) {
            error!("Failed to open browser: {}", e);
        }
    }

    snapclass::web::start_server(config, db).await
}

/// Submit a single image path from the command line
async fn run_analyze(config: AppConfig, image_path: String, debug: bool, format: &str) -> Result<()> {
    let form = SubmissionForm {
        image_path: Some(image_path),
        debug_mode: debug.then(|| "on".to_string()),
    };
    let submission = form
        .validate()
        .map_err(|errors| SnapclassError::Validation(format!("image_path: {}", errors.image_path.join(" "))))?;

    let db = Database::open(&config.database.path)?;
    let classifiers = Classifiers::from_config(&config.classifier)?;
    let record = submission::submit(&db, &classifiers, &submission).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&record)?),
        _ => {
            println!("{}", Notice::for_record(&record).text());
            println!("{}", format_record(&record));
        }
    }
    Ok(())
}

/// List stored results
fn run_list(config: AppConfig, limit: Option<usize>, format: &str) -> Result<()> {
    let db = Database::open(&config.database.path)?;
    let mut records = db.list_results()?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&records)?),
        _ => {
            println!("Results ({} shown):", records.len());
            for record in &records {
                println!("  {}", format_record(record));
            }
        }
    }
    Ok(())
}

/// Export results as CSV to a file or stdout
fn run_export(config: AppConfig, output: Option<PathBuf>) -> Result<()> {
    let db = Database::open(&config.database.path)?;
    let records = db.list_results()?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)?;
            export::write_csv(&records, std::io::BufWriter::new(file))?;
            info!("Exported {} results to {:?}", records.len(), path);
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            export::write_csv(&records, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Classifier URL: {}", config.classifier.url);
            println!("  Mock failure rate: {}", config.classifier.mock.failure_rate);
            println!("  Database: {}", config.database.path);
        }
    }
    Ok(())
}

fn format_record(record: &AnalysisRecord) -> String {
    let outcome = if record.success {
        format!(
            "class {} ({})",
            record.class_id.map(|c| c.to_string()).unwrap_or_default(),
            record.confidence.map(|c| c.to_string()).unwrap_or_default()
        )
    } else {
        format!("failed: {}", record.message.as_deref().unwrap_or(""))
    };
    format!(
        "{} {} -> {}",
        record.request_timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.image_path,
        outcome
    )
}

fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()?;
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }
    Ok(())
}
