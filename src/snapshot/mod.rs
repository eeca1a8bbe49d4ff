pub mod assembler;
pub mod report;

pub use assembler::{combine, Snapshotter};
pub use report::{write_report, write_rows, ReportError, RunSummary};
