//! De-duplication of releases by guid.

use std::collections::HashSet;

use super::Release;

/// Merge release batches in order, keeping the first release seen per guid.
///
/// Batches are expected in fan-out order; a later duplicate is dropped
/// regardless of which source it came from.
pub fn merge_unique<I>(batches: I) -> Vec<Release>
where
    I: IntoIterator<Item = Vec<Release>>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for batch in batches {
        for release in batch {
            if seen.insert(release.guid.clone()) {
                merged.push(release);
            }
        }
    }

    merged
}
