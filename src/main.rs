mod config;
mod data;
mod grouping;
mod monitoring;
mod strategies;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, EnvConfig};
use data::gamma_api::{markets_from_json, GammaApiClient};
use monitoring::{heartbeat, report};

#[derive(Parser)]
#[command(
    name = "polymarket-consistency",
    about = "Flag prediction markets whose prices contradict each other"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the market listing for underbooks, overbooks and contradictions
    Scan {
        #[arg(long, default_value = "config.toml")]
        config: String,
        /// Print a JSON array instead of text
        #[arg(long)]
        json: bool,
        /// Also write the report to this file
        #[arg(long)]
        output: Option<String>,
        /// Read listing rows from a JSON file instead of the API
        #[arg(long)]
        input: Option<String>,
    },
    /// Build an alert digest from a text report written by `scan`
    Heartbeat {
        #[arg(long)]
        report: String,
        #[arg(long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.command {
        Command::Scan { config, .. } | Command::Heartbeat { config, .. } => {
            Config::load_or_default(config)?
        }
    };
    config.apply_env(&EnvConfig::load());

    match cli.command {
        Command::Scan {
            json,
            output,
            input,
            ..
        } => {
            let markets = match input {
                Some(path) => {
                    tracing::info!("Loading markets from {}", path);
                    let body = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read market file: {}", path))?;
                    markets_from_json(&body)?
                }
                None => {
                    tracing::info!("Fetching markets from {}", config.gamma.base_url);
                    GammaApiClient::new(&config.gamma)?
                        .fetch_active_markets()
                        .await?
                }
            };

            let opportunities = strategies::consistency::scan(&markets);

            let body = if json {
                report::render_json(&opportunities)?
            } else {
                report::render_text(&opportunities)
            };

            print!("{}", body);
            if json {
                println!();
            }

            if let Some(path) = output {
                report::write_report(&path, &body)?;
                tracing::info!("Report written to {}", path);
            }
        }
        Command::Heartbeat {
            report: report_path,
            ..
        } => {
            let text = std::fs::read_to_string(&report_path)
                .with_context(|| format!("Failed to read report: {}", report_path))?;
            let parsed = heartbeat::parse_report(&text)
                .with_context(|| format!("Failed to parse report: {}", report_path))?;

            match heartbeat::format_alert(&parsed, &config.alerts, chrono::Utc::now()) {
                Some(digest) => println!("{}", digest),
                None => println!(
                    "[{}] no alerts ({} opportunities below thresholds)",
                    config.alerts.session_label,
                    parsed.len()
                ),
            }
        }
    }

    Ok(())
}
