//! Per-user post summary over the analytics database.

use std::path::Path;

use apietl_outputs::write_summary_csv;
use apietl_shared::{OutputPaths, Result, UserPostSummary};
use apietl_storage::Storage;
use tracing::{info, instrument};

/// Run the summary query and write the summary CSV.
#[instrument(skip_all, fields(path = %summary_csv.display()))]
pub async fn summarize(storage: &Storage, summary_csv: &Path) -> Result<Vec<UserPostSummary>> {
    let summary = storage.user_post_summary().await?;
    write_summary_csv(summary_csv, &summary)?;
    info!(users = summary.len(), "generated user post summary");
    Ok(summary)
}

/// Re-run the summary against a database produced by an earlier run.
pub async fn summarize_existing(outputs: &OutputPaths) -> Result<Vec<UserPostSummary>> {
    let storage = Storage::open_readonly(&outputs.database).await?;
    summarize(&storage, &outputs.summary_csv).await
}
