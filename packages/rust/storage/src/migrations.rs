//! SQL migration definitions for the analytics database.
//!
//! Migrations are applied in order on database open. They cover the tables
//! that persist across runs; `users` and `posts` are replaced wholesale on
//! every load and are not part of the migrated schema.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: schema_migrations, pipeline_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Pipeline run history
CREATE TABLE IF NOT EXISTS pipeline_runs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    status      TEXT NOT NULL DEFAULT 'running',
    stats_json  TEXT,
    error       TEXT
);

CREATE INDEX IF NOT EXISTS idx_pipeline_runs_started ON pipeline_runs(started_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

/// DDL run before each users load.
pub(crate) const REPLACE_USERS_SQL: &str = r#"
DROP TABLE IF EXISTS users;
CREATE TABLE users (
    id           INTEGER,
    name         TEXT,
    username     TEXT,
    email        TEXT,
    phone        TEXT,
    city         TEXT,
    company_name TEXT
);
"#;

/// DDL run before each posts load.
pub(crate) const REPLACE_POSTS_SQL: &str = r#"
DROP TABLE IF EXISTS posts;
CREATE TABLE posts (
    userId          INTEGER,
    id              INTEGER,
    title           TEXT,
    body            TEXT,
    author_name     TEXT,
    author_username TEXT,
    word_count      INTEGER,
    processed_at    TEXT
);
CREATE INDEX idx_posts_user_id ON posts(userId);
"#;
