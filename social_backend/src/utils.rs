//! Shared helpers and constants.

use chrono::Utc;
use std::collections::BTreeSet;

pub const APP_NAME: &str = "social_backend";

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Deduplicates while keeping first-seen order.
pub fn dedup_ordered<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = BTreeSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence() {
        let ids = vec!["b".to_string(), "a".into(), "b".into(), "c".into(), "a".into()];
        assert_eq!(dedup_ordered(ids), vec!["b", "a", "c"]);
    }
}
