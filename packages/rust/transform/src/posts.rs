//! Post enrichment: author join, word counts, batch timestamp.

use std::collections::HashMap;

use apietl_shared::{EnrichedPost, RawPost, RawUser};
use chrono::NaiveDateTime;
use tracing::{debug, warn};

/// Enrich posts with their author and per-post metadata.
///
/// Left join on `post.userId == user.id`: posts without a matching user are
/// kept with `None` author fields. Every post gets the same `processed_at`.
/// Output has exactly one row per input post, in input order.
pub fn enrich_posts(
    posts: &[RawPost],
    users: &[RawUser],
    processed_at: NaiveDateTime,
) -> Vec<EnrichedPost> {
    // First occurrence wins if the source ever repeats an id.
    let mut authors: HashMap<i64, &RawUser> = HashMap::with_capacity(users.len());
    for user in users {
        authors.entry(user.id).or_insert(user);
    }

    let stamp = format_processed_at(processed_at);
    let mut orphans = 0usize;

    let enriched: Vec<EnrichedPost> = posts
        .iter()
        .map(|post| {
            let author = authors.get(&post.user_id);
            if author.is_none() {
                orphans += 1;
            }
            EnrichedPost {
                user_id: post.user_id,
                id: post.id,
                title: post.title.clone(),
                body: post.body.clone(),
                author_name: author.map(|u| u.name.clone()),
                author_username: author.map(|u| u.username.clone()),
                word_count: word_count(&post.body) as i64,
                processed_at: stamp.clone(),
            }
        })
        .collect();

    if orphans > 0 {
        warn!(orphans, "posts reference unknown users, author fields left empty");
    }
    debug!(count = enriched.len(), "enriched post records");

    enriched
}

/// Number of whitespace-separated tokens in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// ISO-8601 local timestamp with microsecond precision, no offset.
pub fn format_processed_at(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(14, 5, 7, 250)
            .unwrap()
    }

    fn user(id: i64, name: &str, username: &str) -> RawUser {
        RawUser {
            id,
            name: name.into(),
            username: username.into(),
            email: format!("{username}@example.com"),
            phone: None,
            website: None,
            address: None,
            company: None,
        }
    }

    fn post(user_id: i64, id: i64, body: &str) -> RawPost {
        RawPost {
            user_id,
            id,
            title: format!("post {id}"),
            body: body.into(),
        }
    }

    #[test]
    fn test_word_count_whitespace() {
        assert_eq!(word_count("quia et suscipit\nsuscipit  recusandae\t x"), 6);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   \n  "), 0);
    }

    #[test]
    fn test_format_processed_at() {
        assert_eq!(format_processed_at(stamp()), "2024-03-09T14:05:07.000250");
    }

    #[test]
    fn test_joins_author() {
        let users = vec![user(1, "Leanne Graham", "Bret"), user(2, "Ervin Howell", "Antonette")];
        let posts = vec![post(2, 11, "one two three"), post(1, 1, "four")];

        let enriched = enrich_posts(&posts, &users, stamp());

        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].author_name.as_deref(), Some("Ervin Howell"));
        assert_eq!(enriched[0].author_username.as_deref(), Some("Antonette"));
        assert_eq!(enriched[0].word_count, 3);
        assert_eq!(enriched[1].author_username.as_deref(), Some("Bret"));
        assert_eq!(enriched[1].word_count, 1);
    }

    #[test]
    fn test_unknown_user_keeps_post() {
        let users = vec![user(1, "Leanne Graham", "Bret")];
        let posts = vec![post(99, 101, "written by nobody")];

        let enriched = enrich_posts(&posts, &users, stamp());

        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].user_id, 99);
        assert!(enriched[0].author_name.is_none());
        assert!(enriched[0].author_username.is_none());
    }

    #[test]
    fn test_single_timestamp_for_batch() {
        let users = vec![user(1, "A", "a")];
        let posts: Vec<RawPost> = (1..=5).map(|i| post(1, i, "x y")).collect();

        let enriched = enrich_posts(&posts, &users, stamp());

        assert!(enriched.iter().all(|p| p.processed_at == "2024-03-09T14:05:07.000250"));
        let ids: Vec<i64> = enriched.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_duplicate_user_ids_do_not_duplicate_posts() {
        let users = vec![user(1, "First", "first"), user(1, "Second", "second")];
        let posts = vec![post(1, 1, "body")];

        let enriched = enrich_posts(&posts, &users, stamp());

        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].author_name.as_deref(), Some("First"));
    }
}
