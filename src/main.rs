use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use clap::Parser;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use walletsnap::config::{AppConfig, ChainAssets};
use walletsnap::models::{Chain, SnapshotCutoff};
use walletsnap::snapshot::{write_report, RunSummary, Snapshotter};

/// End-of-day wallet holdings and USD valuation.
#[derive(Debug, Parser)]
#[command(name = "walletsnap", version, about)]
struct Cli {
    /// Chain to read: btc, eth or sol.
    #[arg(long)]
    chain: Chain,

    /// Snapshot day (UTC), YYYY-MM-DD. Balances are taken at 23:59:59.
    #[arg(long)]
    date: NaiveDate,

    /// Wallet address. Repeat for several wallets.
    #[arg(long = "wallet", required = true)]
    wallets: Vec<String>,

    /// Output CSV path. Defaults to <chain>_snapshot_<date>.csv.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let metrics_handle = walletsnap::metrics::init_metrics()?;

    if cli.chain == Chain::Ethereum && !config.has_etherscan_key() {
        tracing::warn!("ETHERSCAN_KEY is not set, historical block resolution will fail");
    }

    let cutoff = SnapshotCutoff::end_of_day(cli.date);
    let snapshotter = Snapshotter::from_config(&config, ChainAssets::mainnet())?;

    tracing::info!(
        chain = %cli.chain,
        cutoff = %cutoff,
        wallets = cli.wallets.len(),
        "Starting snapshot run"
    );

    let mut rows = Vec::with_capacity(cli.wallets.len());
    let mut failed = Vec::new();

    for wallet in &cli.wallets {
        let started = Instant::now();
        match snapshotter.snapshot(cli.chain, wallet, &cutoff).await {
            Ok(row) => {
                metrics::counter!("snapshots_completed_total").increment(1);
                metrics::histogram!("snapshot_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    wallet = %wallet,
                    total_usd = %row.total_usd_value,
                    "{row}"
                );
                rows.push(row);
            }
            Err(e) => {
                metrics::counter!("snapshots_failed_total").increment(1);
                tracing::error!(wallet = %wallet, error = %e, "Snapshot failed");
                failed.push(wallet.clone());
            }
        }
    }

    let grand_total: Decimal = rows.iter().map(|r| r.total_usd_value).sum();
    metrics::gauge!("snapshot_total_usd_value").set(grand_total.to_f64().unwrap_or_default());

    let output = cli.output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "{}_snapshot_{}.csv",
            cli.chain.short_name(),
            cli.date
        ))
    });
    let mut summary = RunSummary {
        succeeded: rows.len(),
        failed,
        report_error: None,
    };
    if rows.is_empty() {
        tracing::warn!("No wallet produced a snapshot, report not written");
    } else if let Err(e) = write_report(&output, &rows) {
        tracing::error!(error = %e, path = %output.display(), "Failed to write report");
        summary.report_error = Some(e.to_string());
    }

    if let Some(path) = &config.metrics_textfile {
        if let Err(e) = walletsnap::metrics::write_textfile(&metrics_handle, path) {
            tracing::warn!(error = %e, path = %path.display(), "Failed to write metrics textfile");
        }
    }

    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        report_written = summary.report_error.is_none() && !rows.is_empty(),
        total_usd = %grand_total,
        "Snapshot run finished"
    );

    summary.into_result()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
