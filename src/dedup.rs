use std::collections::HashSet;

use crate::models::job::JobRecord;

/// Why a candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    /// Link already persisted in the store.
    KnownLink,
    /// Link seen earlier in this batch.
    RepeatedLink,
    /// Same lowercased title and company as an earlier record.
    SameTitleCompany,
}

#[derive(Debug, Default)]
pub struct Deduplication {
    /// Accepted records, in input order.
    pub unique: Vec<JobRecord>,
    /// `(input index, reason)` for each dropped record.
    pub dropped: Vec<(usize, DuplicateKind)>,
}

impl Deduplication {
    pub fn duplicates_removed(&self) -> usize {
        self.dropped.len()
    }

    pub fn count(&self, kind: DuplicateKind) -> usize {
        self.dropped.iter().filter(|(_, k)| *k == kind).count()
    }
}

/// Keep the candidates that are neither already stored nor repeated within
/// the batch. First occurrence wins, so the caller's ordering decides which
/// source keeps a posting listed by several. Inputs are not modified.
pub fn deduplicate(candidates: &[JobRecord], known_links: &HashSet<String>) -> Deduplication {
    let mut seen_links: HashSet<&str> = known_links.iter().map(String::as_str).collect();
    let mut seen_keys: HashSet<(String, String)> = HashSet::new();
    let mut result = Deduplication::default();

    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.has_link() && seen_links.contains(candidate.link.as_str()) {
            let kind = if known_links.contains(&candidate.link) {
                DuplicateKind::KnownLink
            } else {
                DuplicateKind::RepeatedLink
            };
            result.dropped.push((index, kind));
            continue;
        }

        let key = candidate.secondary_key();
        if seen_keys.contains(&key) {
            result.dropped.push((index, DuplicateKind::SameTitleCompany));
            continue;
        }

        if candidate.has_link() {
            seen_links.insert(candidate.link.as_str());
        }
        seen_keys.insert(key);
        result.unique.push(candidate.clone());
    }

    result
}
