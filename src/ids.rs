use std::collections::HashSet;

/// Assign record identifiers for a batch of `count` new passages in `collection`.
///
/// The candidate for the passage at batch position `i` is `<collection>_doc_<i>`.
/// While the candidate is taken, a suffix `_1`, `_2`, ... is appended. Identifiers
/// handed out earlier in the same batch count as taken, so the returned ids are
/// distinct from each other and from `existing`.
pub fn assign_ids(collection: &str, count: usize, existing: &HashSet<String>) -> Vec<String> {
    let mut assigned_in_batch: HashSet<String> = HashSet::with_capacity(count);
    let is_taken =
        |id: &str, batch: &HashSet<String>| existing.contains(id) || batch.contains(id);

    (0..count)
        .map(|index| {
            let base = format!("{}_doc_{}", collection, index);
            let mut candidate = base.clone();
            let mut counter = 0;
            while is_taken(&candidate, &assigned_in_batch) {
                counter += 1;
                candidate = format!("{}_{}", base, counter);
            }
            assigned_in_batch.insert(candidate.clone());
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fresh_collection() {
        let ids = assign_ids("docs", 3, &HashSet::new());
        assert_eq!(ids, vec!["docs_doc_0", "docs_doc_1", "docs_doc_2"]);
    }

    #[test]
    fn test_collision_gets_suffix() {
        let ids = assign_ids("docs", 1, &set(&["docs_doc_0"]));
        assert_eq!(ids, vec!["docs_doc_0_1"]);
    }

    #[test]
    fn test_suffix_increments_until_free() {
        let existing = set(&["docs_doc_0", "docs_doc_0_1", "docs_doc_0_2", "docs_doc_1"]);
        let ids = assign_ids("docs", 3, &existing);
        assert_eq!(ids, vec!["docs_doc_0_3", "docs_doc_1_1", "docs_doc_2"]);
    }

    #[test]
    fn test_second_upload_never_reuses_ids() {
        let first = assign_ids("report", 4, &HashSet::new());
        let existing: HashSet<String> = first.iter().cloned().collect();
        let second = assign_ids("report", 6, &existing);

        assert_eq!(second.len(), 6);
        let unique: HashSet<&String> = second.iter().collect();
        assert_eq!(unique.len(), 6);
        assert!(second.iter().all(|id| !existing.contains(id)));
    }

    #[test]
    fn test_empty_batch() {
        assert!(assign_ids("docs", 0, &set(&["docs_doc_0"])).is_empty());
    }
}
