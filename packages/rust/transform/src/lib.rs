//! Record cleaning and enrichment.
//!
//! Everything here is a pure function over in-memory records: no I/O, no
//! clock reads. The pipeline supplies the batch timestamp.

mod posts;
mod users;

pub use posts::{enrich_posts, format_processed_at, word_count};
pub use users::clean_users;
