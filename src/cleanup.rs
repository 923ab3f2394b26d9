use crate::model::Item;
use crate::store::TreeStore;
use chrono::{DateTime, Duration, Utc};

/// Top-level items old enough to be offered for cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleSet {
    pub ids: Vec<String>,
    pub total_size: u64,
}

impl StaleSet {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<Item>,
    /// Ids that had already disappeared when their turn came.
    pub missing: Vec<String>,
}

impl CleanupReport {
    pub fn freed_bytes(&self) -> u64 {
        self.removed.iter().map(|i| i.size_bytes).sum()
    }
}

/// Collects roots last modified more than `days` before `now`, skipping
/// `protected` ids.
pub fn find_stale(roots: &[Item], now: DateTime<Utc>, days: u32, protected: &[String]) -> StaleSet {
    let cutoff = now - Duration::days(i64::from(days));
    let stale: Vec<&Item> = roots
        .iter()
        .filter(|item| item.modified_at < cutoff)
        .filter(|item| !protected.contains(&item.id))
        .collect();

    StaleSet {
        ids: stale.iter().map(|i| i.id.clone()).collect(),
        total_size: stale.iter().map(|i| i.size_bytes).sum(),
    }
}

/// Removes `ids` one at a time. There is no rollback: whatever was removed
/// before an interruption stays removed, and a later `find_stale` simply
/// finds less.
pub fn perform_cleanup(store: &mut TreeStore, ids: &[String]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for id in ids {
        match store.remove_by_id(id) {
            Ok(item) => report.removed.push(item),
            Err(e) => {
                log::warn!("cleanup skipped {id}: {e}");
                report.missing.push(id.clone());
            }
        }
    }
    log::info!(
        "cleanup removed {} items ({} bytes), {} missing",
        report.removed.len(),
        report.freed_bytes(),
        report.missing.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemKind, parse_timestamp};

    fn ts(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).expect("valid timestamp")
    }

    fn forest() -> Vec<Item> {
        vec![
            Item::folder(
                "old-run",
                "old-run",
                4096,
                ts("2024-01-01"),
                vec![Item::leaf("old-run/a.v", "a.v", ItemKind::File, 4096, ts("2023-01-01"))],
            ),
            Item::leaf("fresh.zip", "fresh.zip", ItemKind::Archive, 100, ts("2024-03-01")),
            Item::leaf("golden.zip", "golden.zip", ItemKind::Archive, 900, ts("2023-06-01")),
        ]
    }

    #[test]
    fn only_old_roots_are_stale() {
        let now = ts("2024-03-10");
        let stale = find_stale(&forest(), now, 30, &[]);
        assert_eq!(stale.ids, vec!["old-run", "golden.zip"]);
        assert_eq!(stale.total_size, 4996);

        let stale = find_stale(&forest(), now, 30, &["golden.zip".to_string()]);
        assert_eq!(stale.ids, vec!["old-run"]);
    }

    #[test]
    fn cleanup_is_resumable() {
        let now = ts("2024-03-10");
        let mut store = TreeStore::new(forest());
        let stale = find_stale(store.roots(), now, 30, &[]);

        // Simulate an interruption after the first removal.
        let first = perform_cleanup(&mut store, &stale.ids[..1]);
        assert_eq!(first.removed.len(), 1);

        let rest = find_stale(store.roots(), now, 30, &[]);
        assert_eq!(rest.ids, vec!["golden.zip"]);

        let report = perform_cleanup(&mut store, &stale.ids);
        assert_eq!(report.missing, vec!["old-run"]);
        assert_eq!(report.freed_bytes(), 900);
        assert_eq!(store.len(), 1);
        assert!(find_stale(store.roots(), now, 30, &[]).is_empty());
    }
}
