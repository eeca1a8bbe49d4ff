use std::fs::File;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::models::{Chain, ValuedSnapshotRow};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Column headers for rows holding `symbols`, in that order.
pub fn header(chain: Chain, symbols: &[String]) -> Vec<String> {
    let mut cols = vec!["wallet".to_string(), "date".to_string()];
    if chain == Chain::Ethereum {
        cols.push("block_closest_before".to_string());
    }
    let lower: Vec<String> = symbols.iter().map(|s| s.to_lowercase()).collect();
    cols.extend(lower.iter().cloned());
    cols.extend(lower.iter().map(|s| format!("{s}_usd_rate")));
    cols.extend(lower.iter().map(|s| format!("{s}_usd_value")));
    cols.push("total_usd_value".to_string());
    cols
}

fn record(row: &ValuedSnapshotRow, symbols: &[String]) -> Vec<String> {
    let mut cells = vec![row.wallet.clone(), row.date.to_string()];
    if row.chain == Chain::Ethereum {
        cells.push(row.block_number.map(|b| b.to_string()).unwrap_or_default());
    }

    let assets: Vec<_> = symbols.iter().map(|s| row.asset(s)).collect();
    cells.extend(
        assets
            .iter()
            .map(|a| a.map(|a| a.amount.to_string()).unwrap_or_default()),
    );
    cells.extend(assets.iter().map(|a| {
        a.and_then(|a| a.usd_rate)
            .map(|r| r.to_string())
            .unwrap_or_default()
    }));
    cells.extend(
        assets
            .iter()
            .map(|a| a.map(|a| a.usd_value.to_string()).unwrap_or_default()),
    );
    cells.push(row.total_usd_value.to_string());
    cells
}

/// Write `rows` as CSV. The first row fixes the asset columns; rows are
/// expected to share a chain.
pub fn write_rows<W: io::Write>(rows: &[ValuedSnapshotRow], out: W) -> Result<(), ReportError> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    let symbols: Vec<String> = first.assets.iter().map(|a| a.symbol.clone()).collect();

    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(header(first.chain, &symbols))?;
    for row in rows {
        wtr.write_record(record(row, &symbols))?;
    }
    wtr.flush()?;
    Ok(())
}

/// What a batch run produced. The run is reported as failed if any wallet
/// failed or the report could not be written.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: Vec<String>,
    pub report_error: Option<String>,
}

impl RunSummary {
    pub fn into_result(self) -> anyhow::Result<()> {
        let mut problems = Vec::new();
        if !self.failed.is_empty() {
            problems.push(format!(
                "{} wallet(s) failed: {}",
                self.failed.len(),
                self.failed.join(", ")
            ));
        }
        if let Some(e) = self.report_error {
            problems.push(format!("report not written: {e}"));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("{}", problems.join("; "))
        }
    }
}

pub fn write_report(path: &Path, rows: &[ValuedSnapshotRow]) -> Result<(), ReportError> {
    let file = File::create(path)?;
    write_rows(rows, file)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "Report written");
    Ok(())
}
