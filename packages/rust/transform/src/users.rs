//! User cleaning: flatten nested objects, project columns, normalize email.

use apietl_shared::{CleanedUser, RawUser};
use tracing::debug;

/// Clean raw users into flat rows.
///
/// `address.city` and `company.name` are flattened (empty when absent), all
/// other nested fields are dropped, and emails are lowercased. Order and
/// count are preserved.
pub fn clean_users(raw: &[RawUser]) -> Vec<CleanedUser> {
    let cleaned: Vec<CleanedUser> = raw.iter().map(clean_user).collect();
    debug!(count = cleaned.len(), "cleaned user records");
    cleaned
}

fn clean_user(user: &RawUser) -> CleanedUser {
    let city = user
        .address
        .as_ref()
        .and_then(|a| a.city.clone())
        .unwrap_or_default();
    let company_name = user
        .company
        .as_ref()
        .and_then(|c| c.name.clone())
        .unwrap_or_default();

    CleanedUser {
        id: user.id,
        name: user.name.clone(),
        username: user.username.clone(),
        email: user.email.to_lowercase(),
        phone: user.phone.clone(),
        city,
        company_name,
    }
}
