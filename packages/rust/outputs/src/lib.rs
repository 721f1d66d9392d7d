//! CSV output files.
//!
//! Each writer emits a header row (even for an empty batch), then one row per
//! record in the record type's column order. `None` becomes an empty field;
//! quoting follows RFC 4180 via the `csv` crate.

use std::path::Path;

use apietl_shared::{CleanedUser, EnrichedPost, EtlError, Result, UserPostSummary};
use serde::Serialize;
use tracing::info;

/// Write cleaned users. Returns the number of data rows written.
pub fn write_users_csv(path: &Path, users: &[CleanedUser]) -> Result<usize> {
    write_csv(path, &CleanedUser::COLUMNS, users)
}

/// Write enriched posts. Returns the number of data rows written.
pub fn write_posts_csv(path: &Path, posts: &[EnrichedPost]) -> Result<usize> {
    write_csv(path, &EnrichedPost::COLUMNS, posts)
}

/// Write the per-user summary. Returns the number of data rows written.
pub fn write_summary_csv(path: &Path, rows: &[UserPostSummary]) -> Result<usize> {
    write_csv(path, &UserPostSummary::COLUMNS, rows)
}

fn write_csv<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| EtlError::io(parent, e))?;
    }

    // Headers are written explicitly so an empty batch still gets one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| EtlError::output(path, e.to_string()))?;

    writer
        .write_record(columns)
        .map_err(|e| EtlError::output(path, e.to_string()))?;

    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| EtlError::output(path, e.to_string()))?;
    }

    writer.flush().map_err(|e| EtlError::io(path, e))?;

    info!(path = %path.display(), rows = rows.len(), "wrote csv");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tmp_csv(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("apietl_out_{}", uuid::Uuid::now_v7()))
            .join(name)
    }

    fn read_back(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).expect("open csv");
        let headers = reader
            .headers()
            .expect("headers")
            .iter()
            .map(String::from)
            .collect();
        let rows = reader
            .records()
            .map(|r| r.expect("record").iter().map(String::from).collect())
            .collect();
        (headers, rows)
    }

    #[test]
    fn test_users_csv_columns_and_rows() {
        let path = tmp_csv("users_cleaned.csv");
        let users = vec![
            CleanedUser {
                id: 1,
                name: "Leanne Graham".into(),
                username: "Bret".into(),
                email: "sincere@april.biz".into(),
                phone: Some("1-770-736-8031 x56442".into()),
                city: "Gwenborough".into(),
                company_name: "Romaguera-Crona".into(),
            },
            CleanedUser {
                id: 4,
                name: "Patricia Lebsack".into(),
                username: "Karianne".into(),
                email: "julianne.oconner@kory.org".into(),
                phone: None,
                city: String::new(),
                company_name: String::new(),
            },
        ];

        let written = write_users_csv(&path, &users).expect("write");
        assert_eq!(written, 2);

        let (headers, rows) = read_back(&path);
        assert_eq!(headers, CleanedUser::COLUMNS);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][5], "Gwenborough");
        assert_eq!(rows[1][4], "");
        assert_eq!(rows[1][6], "");
    }

    #[test]
    fn test_posts_csv_quotes_multiline_body() {
        let path = tmp_csv("posts_enriched.csv");
        let posts = vec![EnrichedPost {
            user_id: 1,
            id: 1,
            title: "a, b".into(),
            body: "line one\nline \"two\"".into(),
            author_name: None,
            author_username: None,
            word_count: 4,
            processed_at: "2024-03-09T14:05:07.000250".into(),
        }];

        write_posts_csv(&path, &posts).expect("write");

        let (headers, rows) = read_back(&path);
        assert_eq!(headers[0], "userId");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][2], "a, b");
        assert_eq!(rows[0][3], "line one\nline \"two\"");
        assert_eq!(rows[0][4], "");
        assert_eq!(rows[0][6], "4");
    }

    #[test]
    fn test_empty_batch_writes_header_only() {
        let path = tmp_csv("user_post_summary.csv");
        let written = write_summary_csv(&path, &[]).expect("write");
        assert_eq!(written, 0);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "name,city,company_name,total_posts,avg_word_count\n");
    }

    #[test]
    fn test_summary_null_average() {
        let path = tmp_csv("user_post_summary.csv");
        let rows = vec![
            UserPostSummary {
                name: "Ervin Howell".into(),
                city: "Wisokyburgh".into(),
                company_name: "Deckow-Crist".into(),
                total_posts: 2,
                avg_word_count: Some(25.5),
            },
            UserPostSummary {
                name: "Patricia Lebsack".into(),
                city: String::new(),
                company_name: String::new(),
                total_posts: 0,
                avg_word_count: None,
            },
        ];

        write_summary_csv(&path, &rows).expect("write");

        let (_, read) = read_back(&path);
        assert_eq!(read[0][4], "25.5");
        assert_eq!(read[1][3], "0");
        assert_eq!(read[1][4], "");
    }
}
