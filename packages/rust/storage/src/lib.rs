//! libSQL storage layer for the analytics database (local file mode).
//!
//! The [`Storage`] struct wraps a local libSQL database holding the loaded
//! `users` and `posts` tables, the per-user summary query over them, and the
//! pipeline run history.
//!
//! **Access rules:**
//! - `run`: read-write via [`Storage::open`]
//! - `summary` / `runs`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use apietl_shared::{
    CleanedUser, EnrichedPost, EtlError, PipelineRun, Result, RunId, RunStats, RunStatus,
    UserPostSummary,
};
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};

/// Per-user post counts and average word count, busiest authors first.
const USER_POST_SUMMARY_SQL: &str = "
SELECT
    u.name,
    u.city,
    u.company_name,
    COUNT(p.id) AS total_posts,
    AVG(p.word_count) AS avg_word_count
FROM users u
LEFT JOIN posts p ON u.id = p.userId
GROUP BY u.id, u.name, u.city, u.company_name
ORDER BY total_posts DESC, u.id
";

/// Tables replaced on every load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Users,
    Posts,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Posts => "posts",
        }
    }
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| EtlError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EtlError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        EtlError::Storage(format!("migration v{} failed: {e}", migration.version))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(EtlError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Table loads
    // -----------------------------------------------------------------------

    /// Drop, recreate and fill the `users` table in one transaction.
    /// Returns the number of rows inserted.
    pub async fn replace_users(&self, users: &[CleanedUser]) -> Result<usize> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute_batch(migrations::REPLACE_USERS_SQL)
            .await
            .map_err(storage_err)?;

        for user in users {
            tx.execute(
                "INSERT INTO users (id, name, username, email, phone, city, company_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id,
                    user.name.as_str(),
                    user.username.as_str(),
                    user.email.as_str(),
                    user.phone.as_deref(),
                    user.city.as_str(),
                    user.company_name.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        tracing::info!(rows = users.len(), "loaded users table");
        Ok(users.len())
    }

    /// Drop, recreate and fill the `posts` table in one transaction.
    /// Returns the number of rows inserted.
    pub async fn replace_posts(&self, posts: &[EnrichedPost]) -> Result<usize> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(storage_err)?;
        tx.execute_batch(migrations::REPLACE_POSTS_SQL)
            .await
            .map_err(storage_err)?;

        for post in posts {
            tx.execute(
                "INSERT INTO posts (userId, id, title, body, author_name, author_username, word_count, processed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    post.user_id,
                    post.id,
                    post.title.as_str(),
                    post.body.as_str(),
                    post.author_name.as_deref(),
                    post.author_username.as_deref(),
                    post.word_count,
                    post.processed_at.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        tracing::info!(rows = posts.len(), "loaded posts table");
        Ok(posts.len())
    }

    /// Number of rows currently in `table`.
    pub async fn row_count(&self, table: Table) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let mut rows = self.conn.query(&sql, params![]).await.map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(storage_err)? as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(storage_err(e)),
        }
    }

    // -----------------------------------------------------------------------
    // Analytics
    // -----------------------------------------------------------------------

    /// One summary row per loaded user, ordered by post count descending.
    pub async fn user_post_summary(&self) -> Result<Vec<UserPostSummary>> {
        let mut rows = self
            .conn
            .query(USER_POST_SUMMARY_SQL, params![])
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(UserPostSummary {
                name: row.get::<String>(0).map_err(storage_err)?,
                city: row.get::<String>(1).unwrap_or_default(),
                company_name: row.get::<String>(2).unwrap_or_default(),
                total_posts: row.get::<i64>(3).map_err(storage_err)?,
                avg_word_count: row.get::<f64>(4).ok(),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Run history
    // -----------------------------------------------------------------------

    /// Record the start of a pipeline run. Returns the generated run ID.
    pub async fn insert_run(&self) -> Result<RunId> {
        self.check_writable()?;
        let id = RunId::new();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO pipeline_runs (id, started_at, status) VALUES (?1, ?2, ?3)",
                params![id.to_string(), now.as_str(), RunStatus::Running.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Mark a run as succeeded with its row counts.
    pub async fn finish_run(&self, id: &RunId, stats: &RunStats) -> Result<()> {
        self.check_writable()?;
        let stats_json = serde_json::to_string(stats)
            .map_err(|e| EtlError::Storage(format!("failed to encode run stats: {e}")))?;
        self.update_run(id, RunStatus::Succeeded, Some(&stats_json), None)
            .await
    }

    /// Mark a run as failed with an error message.
    pub async fn fail_run(&self, id: &RunId, error: &str) -> Result<()> {
        self.check_writable()?;
        self.update_run(id, RunStatus::Failed, None, Some(error)).await
    }

    async fn update_run(
        &self,
        id: &RunId,
        status: RunStatus,
        stats_json: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE pipeline_runs SET finished_at = ?1, status = ?2, stats_json = ?3, error = ?4
                 WHERE id = ?5",
                params![now.as_str(), status.as_str(), stats_json, error, id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Get a run by ID.
    pub async fn get_run(&self, id: &RunId) -> Result<Option<PipelineRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, started_at, finished_at, status, stats_json, error
                 FROM pipeline_runs WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_run(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// List the most recent runs, newest first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<PipelineRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, started_at, finished_at, status, stats_json, error
                 FROM pipeline_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_run(&row)?);
        }
        Ok(results)
    }
}

fn storage_err(e: libsql::Error) -> EtlError {
    EtlError::Storage(e.to_string())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EtlError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`PipelineRun`].
fn row_to_run(row: &libsql::Row) -> Result<PipelineRun> {
    let id: String = row.get(0).map_err(storage_err)?;
    let started_at: String = row.get(1).map_err(storage_err)?;
    let status: String = row.get(3).map_err(storage_err)?;

    let stats = match row.get::<String>(4).ok() {
        Some(json) => Some(
            serde_json::from_str::<RunStats>(&json)
                .map_err(|e| EtlError::Storage(format!("invalid stats_json: {e}")))?,
        ),
        None => None,
    };

    Ok(PipelineRun {
        id: id
            .parse()
            .map_err(|e| EtlError::Storage(format!("invalid run id '{id}': {e}")))?,
        started_at: parse_timestamp(&started_at)?,
        finished_at: row
            .get::<String>(2)
            .ok()
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        status: status.parse().map_err(EtlError::Storage)?,
        stats,
        error: row.get::<String>(5).ok(),
    })
}
