use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use logdeck::config::{load_config, AnalyticsConfig};
use logdeck::logs::entry_format::{format_access_entry, format_error_entry, AccessEntry};
use logdeck::logs::log_filters::FilterCriteria;
use logdeck::logs::{
    build_listing, export, summarize, ExportFormat, FileLogStore, LogRepository, LogStore, LogType,
};
use logdeck::server::{self, AppState};

#[derive(Parser)]
#[command(name = "logdeck")]
#[command(about = "Parse, query, summarize and export application access and error logs")]
#[command(version)]
struct Cli {
    /// Configuration directory (default: /etc/logdeck/config if it exists,
    /// otherwise ~/.config/logdeck/config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Application access log (overrides sources.app_log)
    #[arg(long, global = true)]
    app_log: Option<PathBuf>,
    /// Error log (overrides sources.error_log)
    #[arg(long, global = true)]
    error_log: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Bind address (overrides server.host)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print one filtered page of records with statistics as JSON
    List {
        /// Exact level (INFO, ERROR, UNKNOWN)
        #[arg(long)]
        level: Option<String>,
        /// Exact HTTP method
        #[arg(long)]
        method: Option<String>,
        /// Exact HTTP status
        #[arg(long)]
        status: Option<String>,
        /// Earliest timestamp (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)
        #[arg(long)]
        date_from: Option<String>,
        /// Latest timestamp (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)
        #[arg(long)]
        date_to: Option<String>,
        /// Case-insensitive text search
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
        /// Page size (default: query.default_limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print statistics over all records as JSON
    Stats,
    /// Export all records
    Export {
        /// Output format (json or csv)
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,
        /// Output file (default: logs-YYYY-MM-DD.<ext> in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Truncate both logs
    Clear,
    /// Append a single entry to one of the logs
    Record {
        #[command(subcommand)]
        entry: RecordCommands,
    },
}

#[derive(Subcommand)]
enum RecordCommands {
    /// Append an HTTP request to the access log
    App {
        method: String,
        url: String,
        status: u16,
        /// Response time in milliseconds
        #[arg(long, default_value = "0")]
        response_time: f64,
        #[arg(long, default_value = "127.0.0.1")]
        client_ip: String,
        #[arg(long, default_value = "logdeck")]
        user_agent: String,
        #[arg(long)]
        content_length: Option<u64>,
        /// Request body
        #[arg(long)]
        data: Option<String>,
    },
    /// Append a stack trace to the error log
    Error {
        /// Stack text; read from stdin when omitted
        stack: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    // Determine config directory with proper precedence:
    // 1. CLI argument if provided
    // 2. System-wide config (/etc/logdeck/config) if it exists
    // 3. User config (~/.config/logdeck/config)
    let config_dir = cli.config.clone().unwrap_or_else(|| {
        let system_config = PathBuf::from("/etc/logdeck/config");
        if system_config.exists() {
            system_config
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("logdeck")
                .join("config")
        }
    });

    let mut config = load_config(&config_dir)
        .with_context(|| format!("failed to load configuration from {}", config_dir.display()))?;
    if let Some(app_log) = cli.app_log {
        config.sources.app_log = app_log;
    }
    if let Some(error_log) = cli.error_log {
        config.sources.error_log = error_log;
    }

    let store = Arc::new(FileLogStore::from_config(&config.sources));
    let repository = LogRepository::new(store.clone());

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(&config, repository).await?;
        }
        Commands::List {
            level,
            method,
            status,
            date_from,
            date_to,
            search,
            page,
            limit,
        } => {
            let criteria = FilterCriteria {
                level,
                method,
                status,
                date_from,
                date_to,
                search,
            };
            let records = repository.load_merged()?;
            let listing = build_listing(
                &records,
                &criteria,
                page,
                limit.unwrap_or(config.query.default_limit),
            )?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Commands::Stats => {
            let records = repository.load_merged()?;
            println!("{}", serde_json::to_string_pretty(&summarize(&records))?);
        }
        Commands::Export { format, output } => {
            let records = repository.load_merged()?;
            let exported = export(&records, format)?;
            let path = output.unwrap_or_else(|| PathBuf::from(&exported.filename));
            std::fs::write(&path, &exported.body)
                .with_context(|| format!("failed to write export to {}", path.display()))?;
            info!("Exported {} records to {}", records.len(), path.display());
        }
        Commands::Clear => {
            repository.clear()?;
            info!(
                "Cleared {} and {}",
                config.sources.app_log.display(),
                config.sources.error_log.display()
            );
        }
        Commands::Record { entry } => {
            let timestamp = Local::now().naive_local();
            match entry {
                RecordCommands::App {
                    method,
                    url,
                    status,
                    response_time,
                    client_ip,
                    user_agent,
                    content_length,
                    data,
                } => {
                    let text = format_access_entry(&AccessEntry {
                        timestamp,
                        method: &method.to_uppercase(),
                        url: &url,
                        status,
                        response_time_ms: response_time,
                        client_ip: &client_ip,
                        user_agent: &user_agent,
                        content_length,
                        request_data: data.as_deref(),
                    });
                    store.append(LogType::App, &text)?;
                }
                RecordCommands::Error { stack } => {
                    let stack = match stack {
                        Some(stack) => stack,
                        None => {
                            let mut buffer = String::new();
                            std::io::stdin()
                                .read_to_string(&mut buffer)
                                .context("failed to read stack from stdin")?;
                            buffer
                        }
                    };
                    store.append(LogType::Error, &format_error_entry(timestamp, &stack))?;
                }
            }
        }
    }

    Ok(())
}

async fn run_server(config: &AnalyticsConfig, repository: LogRepository) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid bind address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    info!("App log: {}", config.sources.app_log.display());
    info!("Error log: {}", config.sources.error_log.display());
    info!("Health check endpoint available at http://{}/health", addr);

    let state = AppState::new(repository, config.query.default_limit);
    server::serve(addr, state, config.server.cors).await
}
