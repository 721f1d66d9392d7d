//! End-to-end run: extract → transform → CSV + database → summary.

use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use apietl_extract::ApiClient;
use apietl_outputs::{write_posts_csv, write_users_csv};
use apietl_shared::{
    EtlError, OutputPaths, PipelineConfig, Result, RunId, RunStats, UserPostSummary,
};
use apietl_storage::Storage;
use apietl_transform::{clean_users, enrich_posts};

use crate::analytics;

/// The steps of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    RawUserData,
    RawPostData,
    CleanedUserData,
    EnrichedPostData,
    UserDataCsv,
    PostDataCsv,
    AnalyticsDatabase,
    UserPostSummary,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::RawUserData,
        Step::RawPostData,
        Step::CleanedUserData,
        Step::EnrichedPostData,
        Step::UserDataCsv,
        Step::PostDataCsv,
        Step::AnalyticsDatabase,
        Step::UserPostSummary,
    ];

    /// Stable identifier used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RawUserData => "raw_user_data",
            Self::RawPostData => "raw_post_data",
            Self::CleanedUserData => "cleaned_user_data",
            Self::EnrichedPostData => "enriched_post_data",
            Self::UserDataCsv => "user_data_csv",
            Self::PostDataCsv => "post_data_csv",
            Self::AnalyticsDatabase => "analytics_database",
            Self::UserPostSummary => "user_post_summary",
        }
    }

    /// Human-readable phase label for progress output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RawUserData => "Fetching users",
            Self::RawPostData => "Fetching posts",
            Self::CleanedUserData => "Cleaning users",
            Self::EnrichedPostData => "Enriching posts",
            Self::UserDataCsv => "Writing users CSV",
            Self::PostDataCsv => "Writing posts CSV",
            Self::AnalyticsDatabase => "Loading database",
            Self::UserPostSummary => "Summarizing posts per user",
        }
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct RunResult {
    pub run_id: RunId,
    pub stats: RunStats,
    /// Summary rows, busiest authors first.
    pub summary: Vec<UserPostSummary>,
    pub outputs: OutputPaths,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a step starts.
    fn phase(&self, step: Step);
    /// Called when a step finishes, with the number of records it produced.
    fn step_done(&self, step: Step, records: usize);
    /// Called when the run completes successfully.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _step: Step) {}
    fn step_done(&self, _step: Step, _records: usize) {}
    fn done(&self, _result: &RunResult) {}
}

/// Run the whole job once.
///
/// The run is recorded in the database's run history; if any step fails the
/// run is marked failed with the error message and the error is returned.
#[instrument(skip_all, fields(base_url = %config.source.base_url))]
pub async fn run_pipeline(
    config: &PipelineConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let data_dir = &config.outputs.data_dir;
    std::fs::create_dir_all(data_dir).map_err(|e| EtlError::io(data_dir, e))?;

    let storage = Storage::open(&config.outputs.database).await?;
    let run_id = storage.insert_run().await?;

    info!(%run_id, data_dir = %data_dir.display(), "starting pipeline run");

    match execute(config, &storage, progress).await {
        Ok((stats, summary)) => {
            storage.finish_run(&run_id, &stats).await?;

            let result = RunResult {
                run_id,
                stats,
                summary,
                outputs: config.outputs.clone(),
                elapsed: start.elapsed(),
            };
            progress.done(&result);

            info!(
                run_id = %result.run_id,
                users = result.stats.users_loaded,
                posts = result.stats.posts_loaded,
                elapsed_ms = result.elapsed.as_millis(),
                "pipeline run complete"
            );
            Ok(result)
        }
        Err(e) => {
            error!(%run_id, error = %e, "pipeline run failed");
            if let Err(record_err) = storage.fail_run(&run_id, &e.to_string()).await {
                warn!(%run_id, error = %record_err, "could not record failed run");
            }
            Err(e)
        }
    }
}

async fn execute(
    config: &PipelineConfig,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<(RunStats, Vec<UserPostSummary>)> {
    let outputs = &config.outputs;

    // --- Extract ---
    let client = ApiClient::new(&config.source)?;

    progress.phase(Step::RawUserData);
    let raw_users = client.fetch_users().await?;
    progress.step_done(Step::RawUserData, raw_users.len());

    progress.phase(Step::RawPostData);
    let raw_posts = client.fetch_posts().await?;
    progress.step_done(Step::RawPostData, raw_posts.len());

    // --- Transform ---
    progress.phase(Step::CleanedUserData);
    let users = clean_users(&raw_users);
    progress.step_done(Step::CleanedUserData, users.len());

    progress.phase(Step::EnrichedPostData);
    let processed_at = chrono::Local::now().naive_local();
    let posts = enrich_posts(&raw_posts, &raw_users, processed_at);
    let orphan_posts = posts.iter().filter(|p| p.author_name.is_none()).count();
    progress.step_done(Step::EnrichedPostData, posts.len());

    // --- Load ---
    progress.phase(Step::UserDataCsv);
    let written = write_users_csv(&outputs.users_csv, &users)?;
    progress.step_done(Step::UserDataCsv, written);

    progress.phase(Step::PostDataCsv);
    let written = write_posts_csv(&outputs.posts_csv, &posts)?;
    progress.step_done(Step::PostDataCsv, written);

    progress.phase(Step::AnalyticsDatabase);
    let users_loaded = storage.replace_users(&users).await?;
    let posts_loaded = storage.replace_posts(&posts).await?;
    progress.step_done(Step::AnalyticsDatabase, users_loaded + posts_loaded);

    // --- Analytics ---
    progress.phase(Step::UserPostSummary);
    let summary = analytics::summarize(storage, &outputs.summary_csv).await?;
    progress.step_done(Step::UserPostSummary, summary.len());

    let stats = RunStats {
        users_extracted: raw_users.len(),
        posts_extracted: raw_posts.len(),
        users_loaded,
        posts_loaded,
        orphan_posts,
        summary_rows: summary.len(),
    };

    Ok((stats, summary))
}
