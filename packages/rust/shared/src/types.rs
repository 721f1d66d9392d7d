//! Record types flowing through the pipeline, plus run-history types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Source records (as served by the API)
// ---------------------------------------------------------------------------

/// A user record as returned by `GET /users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUser {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub company: Option<Company>,
}

/// Nested `address` object of a [`RawUser`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub suite: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zipcode: Option<String>,
}

/// Nested `company` object of a [`RawUser`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "catchPhrase")]
    pub catch_phrase: Option<String>,
    #[serde(default)]
    pub bs: Option<String>,
}

/// A post record as returned by `GET /posts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub id: i64,
    pub title: String,
    pub body: String,
}

// ---------------------------------------------------------------------------
// Derived records
// ---------------------------------------------------------------------------

/// A flattened, cleaned user row.
///
/// Field order is the CSV column order and the `users` table column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedUser {
    pub id: i64,
    pub name: String,
    pub username: String,
    /// Lowercased.
    pub email: String,
    pub phone: Option<String>,
    /// `address.city`, or empty when absent.
    pub city: String,
    /// `company.name`, or empty when absent.
    pub company_name: String,
}

impl CleanedUser {
    pub const COLUMNS: [&'static str; 7] = [
        "id",
        "name",
        "username",
        "email",
        "phone",
        "city",
        "company_name",
    ];
}

/// A post joined with its author and annotated with processing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPost {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub id: i64,
    pub title: String,
    pub body: String,
    /// `None` when no user with `user_id` exists.
    pub author_name: Option<String>,
    pub author_username: Option<String>,
    pub word_count: i64,
    /// Batch timestamp, ISO-8601 local time.
    pub processed_at: String,
}

impl EnrichedPost {
    pub const COLUMNS: [&'static str; 8] = [
        "userId",
        "id",
        "title",
        "body",
        "author_name",
        "author_username",
        "word_count",
        "processed_at",
    ];
}

/// One row of the per-user post summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPostSummary {
    pub name: String,
    pub city: String,
    pub company_name: String,
    pub total_posts: i64,
    /// `None` for users without posts.
    pub avg_word_count: Option<f64>,
}

impl UserPostSummary {
    pub const COLUMNS: [&'static str; 5] = [
        "name",
        "city",
        "company_name",
        "total_posts",
        "avg_word_count",
    ];
}

// ---------------------------------------------------------------------------
// Run history
// ---------------------------------------------------------------------------

/// Lifecycle state of a recorded pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// Row counts recorded for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub users_extracted: usize,
    pub posts_extracted: usize,
    pub users_loaded: usize,
    pub posts_loaded: usize,
    /// Posts whose `userId` matched no extracted user.
    pub orphan_posts: usize,
    pub summary_rows: usize,
}

/// A pipeline run as stored in the `pipeline_runs` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
