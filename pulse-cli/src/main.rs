//! Onion Pulse CLI
//!
//! Tracks the Tor share of the Bitcoin peer network and turns the change
//! between the last two snapshots into a confidence-scored signal.

mod render;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pulse_core::SnapshotStore;
use pulse_net::HttpFetcher;
use pulse_runtime::{Analysis, Analyzer, AnalyzerConfig};

use crate::render::{render_analysis, render_refresh};

#[derive(Parser)]
#[command(name = "onion-pulse")]
#[command(author, version, about = "Onion Pulse: Tor node signals from Bitcoin network snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Where the snapshot window is stored (overrides config)
    #[arg(long, global = true, env = "ONION_PULSE_DATA")]
    data_file: Option<PathBuf>,

    /// Snapshot API endpoint (overrides config)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Fetch timeout in seconds (overrides config)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// SOCKS proxy for the fetch, e.g. socks5h://127.0.0.1:9050
    #[arg(long, global = true, env = "ONION_PULSE_SOCKS")]
    socks_proxy: Option<String>,

    /// Print the analysis as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a new snapshot, rotate the window and show the signal
    Refresh,

    /// Show the signal for the stored window without fetching
    Show,

    /// Refresh on a fixed interval
    Watch {
        /// Seconds between refreshes
        #[arg(short, long, default_value = "600")]
        interval: u64,

        /// Stop after this many refreshes (0 = run until Ctrl-C)
        #[arg(long, default_value = "0")]
        cycles: u64,
    },

    /// Check that the telemetry source is reachable
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Refresh => {
            let analyzer = Analyzer::from_config(&config)?;
            let report = analyzer.refresh().await;
            if !cli.json {
                println!("{}\n", render_refresh(&report));
            }
            print_analysis(&analyzer.analyze().await, cli.json)?;
        }
        Commands::Show => {
            let store = SnapshotStore::new(&config.data_file);
            let analysis = Analysis::of(store.load(), store.last_updated());
            print_analysis(&analysis, cli.json)?;
        }
        Commands::Watch { interval, cycles } => {
            run_watch(&config, interval, cycles, cli.json).await?;
        }
        Commands::Status => {
            check_status(&config).await?;
        }
    }

    Ok(())
}

/// Config file first, then command-line overrides
fn resolve_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let mut config = AnalyzerConfig::load(cli.config.as_deref())?;

    if let Some(path) = &cli.data_file {
        config.data_file = path.clone();
    }
    if let Some(url) = &cli.api_url {
        config.fetcher.api_url = url.clone();
    }
    if let Some(secs) = cli.timeout {
        config.fetcher.timeout_secs = secs;
    }
    if let Some(proxy) = &cli.socks_proxy {
        config.fetcher.socks_proxy = Some(proxy.clone());
    }

    Ok(config)
}

fn print_analysis(analysis: &Analysis, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(analysis)?);
    } else {
        print!("{}", render_analysis(analysis));
    }
    Ok(())
}

/// One JSON line per watch cycle; a cycle that cannot be encoded is logged and skipped
fn analysis_line(analysis: &Analysis) -> Option<String> {
    match serde_json::to_string(analysis) {
        Ok(line) => Some(line),
        Err(e) => {
            warn!("Cannot serialize analysis: {}", e);
            None
        }
    }
}

async fn run_watch(config: &AnalyzerConfig, interval: u64, cycles: u64, json: bool) -> Result<()> {
    if interval == 0 {
        anyhow::bail!("--interval must be at least 1 second");
    }

    let analyzer = Analyzer::from_config(config)?;
    println!("🧅 Onion Pulse - watching {} every {}s\n", config.fetcher.api_url, interval);

    let ran = analyzer
        .watch(Duration::from_secs(interval), cycles, |report, analysis| {
            if json {
                if let Some(line) = analysis_line(analysis) {
                    println!("{}", line);
                }
            } else {
                println!("{}", "=".repeat(60));
                println!("{}\n", render_refresh(report));
                print!("{}", render_analysis(analysis));
            }
        })
        .await;

    println!("\n📊 Ran {} refresh cycle(s)", ran);
    Ok(())
}

async fn check_status(config: &AnalyzerConfig) -> Result<()> {
    println!("🔌 Checking telemetry source...\n");

    let fetcher = HttpFetcher::new(config.fetcher.clone())?;

    match fetcher.probe().await {
        Ok(true) => {
            println!("✅ Source is reachable");
            println!("   Endpoint: {}", config.fetcher.api_url);
        }
        Ok(false) => {
            println!("❌ Source answered with an error status");
            println!("   Endpoint: {}", config.fetcher.api_url);
        }
        Err(e) => {
            println!("❌ Error reaching source: {}", e);
            if let Some(proxy) = &config.fetcher.socks_proxy {
                println!("   Via proxy: {} (is Tor running?)", proxy);
            }
        }
    }

    let store = SnapshotStore::new(&config.data_file);
    let window = store.load();
    println!(
        "\n💾 Window at {}: {}",
        store.path().display(),
        match (window.previous(), window.current()) {
            (Some(_), Some(_)) => "two snapshots",
            (None, Some(_)) => "one snapshot",
            _ => "empty",
        }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::SnapshotWindow;

    #[test]
    fn test_watch_line_is_single_json_object() {
        let line = analysis_line(&Analysis::of(SnapshotWindow::empty(), None)).unwrap();
        assert!(!line.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["signal"]["signal"], "INSUFFICIENT_DATA");
        assert!(value["last_updated"].is_null());
    }
}
