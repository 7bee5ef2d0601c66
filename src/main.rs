use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use speedsite::api::error::ApiError;
use speedsite::config::{Config, LogFormat, LoggingConfig};
use speedsite::executor::{BoundedExecutor, ExecutionOutcome};
use speedsite::measurement::{self, MeasurementRequest};

#[derive(Parser)]
#[command(
    name = "speedsite",
    about = "Self-hosted Wi-Fi speed test page with bounded-time measurements",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (otherwise SPEEDSITE_CONFIG, then ./speedsite.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        /// Bind address
        #[arg(long, env = "SPEEDSITE_BIND")]
        bind: Option<String>,

        /// Measurement provider (speedtest-cli, ookla, simulated)
        #[arg(long)]
        provider: Option<String>,

        /// Wall-clock limit for one measurement, in seconds (fractions allowed)
        #[arg(long)]
        deadline_secs: Option<f64>,

        /// Number of results kept in history
        #[arg(long)]
        history_capacity: Option<usize>,
    },

    /// Run one bounded measurement and print the result
    Run {
        /// Measurement provider (speedtest-cli, ookla, simulated)
        #[arg(long)]
        provider: Option<String>,

        /// Wall-clock limit in seconds
        #[arg(long)]
        deadline_secs: Option<f64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List measurement providers and whether they are installed
    Providers,
}

fn init_tracing(cfg: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));

    match cfg.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut cfg, source) = Config::load_or_default(cli.config.as_deref())?;
    init_tracing(&cfg.logging);
    source.log();

    match cli.command {
        Commands::Serve {
            bind,
            provider,
            deadline_secs,
            history_capacity,
        } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            if let Some(provider) = provider {
                cfg.measurement.provider = provider;
            }
            if let Some(secs) = deadline_secs {
                cfg.measurement.deadline_secs = secs;
            }
            if let Some(capacity) = history_capacity {
                cfg.history.capacity = capacity;
            }
            tracing::info!(bind = %cfg.server.bind, "Starting speedsite");
            speedsite::serve(cfg).await?;
        }
        Commands::Run {
            provider,
            deadline_secs,
            json,
        } => {
            if let Some(provider) = provider {
                cfg.measurement.provider = provider;
            }
            if let Some(secs) = deadline_secs {
                cfg.measurement.deadline_secs = secs;
            }
            cfg.validate()?;

            let provider = measurement::provider_by_id(&cfg.measurement.provider, &cfg.measurement)?;
            let executor = BoundedExecutor::new(provider, cfg.measurement.deadline()).with_request(
                MeasurementRequest {
                    server_id: cfg.measurement.server_id.clone(),
                },
            );

            match executor.execute().await {
                ExecutionOutcome::Completed(result) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                    } else {
                        println!("{}", speedsite::report::format_summary(&result));
                    }
                }
                ExecutionOutcome::Failed(reason) => return Err(ApiError::Measurement(reason).into()),
                ExecutionOutcome::TimedOut(deadline) => {
                    return Err(ApiError::Timeout {
                        deadline_secs: deadline.as_secs_f64(),
                    }
                    .into())
                }
            }
        }
        Commands::Providers => {
            println!("{:<15} | {:<30} | Installed", "Id", "Name");
            println!("{:-<15}-|-{:-<30}-|-{:-<9}", "", "", "");
            for provider in measurement::all_providers(&cfg.measurement) {
                let meta = provider.meta();
                let installed = if provider.is_available() { "yes" } else { "no" };
                println!("{:<15} | {:<30} | {}", meta.id, meta.display_name, installed);
                if installed == "no" {
                    println!("{:<15} | {:<30} |   -> {}", "", "", meta.install_hint);
                }
            }
        }
    }

    Ok(())
}
