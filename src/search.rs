//! Debounced search input and persisted view preferences, layered on top of
//! a [`TreeStore`] without changing its contract.

use crate::model::{SortKey, View};
use crate::store::TreeStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// What survives between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewPrefs {
    pub view: View,
    pub sort: SortKey,
    pub search: String,
}

#[derive(Debug)]
pub struct SearchSession {
    store: TreeStore,
    debounce: Duration,
    input: String,
    deadline: Option<Instant>,
    state_path: Option<PathBuf>,
}

impl SearchSession {
    pub fn new(store: TreeStore, debounce: Duration) -> Self {
        let input = store.search().to_string();
        Self {
            store,
            debounce,
            input,
            deadline: None,
            state_path: None,
        }
    }

    /// Enables saving to and restoring from `path`.
    #[must_use]
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TreeStore {
        &mut self.store
    }

    /// The raw text typed so far, which may not be applied yet.
    pub fn input(&self) -> &str {
        &self.input
    }

    #[allow(dead_code)]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Records new search input; it reaches the store once input has been
    /// quiet for the debounce interval.
    pub fn type_search(&mut self, term: &str, now: Instant) {
        term.clone_into(&mut self.input);
        self.deadline = Some(now + self.debounce);
    }

    /// Applies pending input whose deadline has passed. Returns whether the
    /// store's search changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => false,
        }
    }

    /// Applies pending input immediately.
    pub fn flush(&mut self) -> bool {
        if self.deadline.take().is_none() {
            return false;
        }
        let before = self.store.search().to_string();
        self.store.set_search(&self.input);
        before != self.store.search()
    }

    pub fn clear_search(&mut self) {
        self.input.clear();
        self.deadline = None;
        self.store.set_search("");
    }

    pub fn prefs(&self) -> ViewPrefs {
        ViewPrefs {
            view: self.store.view(),
            sort: self.store.sort(),
            search: self.store.search().to_string(),
        }
    }

    pub fn apply_prefs(&mut self, prefs: &ViewPrefs) {
        self.store.set_view(prefs.view);
        self.store.set_sort(prefs.sort);
        self.store.set_search(&prefs.search);
        prefs.search.clone_into(&mut self.input);
        self.deadline = None;
    }

    /// Restores saved preferences, if a state file is configured and present.
    pub fn restore(&mut self) -> Result<bool> {
        let Some(path) = self.state_path.clone() else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }
        let prefs = read_prefs(&path)?;
        log::debug!("restored view prefs from {}", path.display());
        self.apply_prefs(&prefs);
        Ok(true)
    }

    pub fn save(&mut self) -> Result<()> {
        self.flush();
        let Some(path) = &self.state_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.prefs())?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::debug!("saved view prefs to {}", path.display());
        Ok(())
    }
}

fn read_prefs(path: &Path) -> Result<ViewPrefs> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::sample_forest;
    use tempfile::tempdir;

    fn session() -> SearchSession {
        SearchSession::new(TreeStore::new(sample_forest()), Duration::from_millis(250))
    }

    #[test]
    fn input_applies_after_quiet_period() {
        let mut session = session();
        let start = Instant::now();

        session.type_search("scr", start);
        session.type_search("screen", start + Duration::from_millis(100));
        assert!(!session.tick(start + Duration::from_millis(300)));
        assert_eq!(session.store().search(), "");
        assert!(session.is_pending());

        assert!(session.tick(start + Duration::from_millis(350)));
        assert_eq!(session.store().search(), "screen");
        assert!(!session.is_pending());
        assert_eq!(session.store().project().ids(), vec!["3"]);
    }

    #[test]
    fn flush_without_pending_input_is_noop() {
        let mut session = session();
        assert!(!session.flush());
        session.type_search("  ", Instant::now());
        assert!(!session.flush());
    }

    #[test]
    fn prefs_round_trip_through_state_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("state.json");

        let mut first = session().with_state_file(&path);
        assert!(!first.restore()?);
        first.store_mut().set_view(View::Grid);
        first.store_mut().set_sort(SortKey::Name);
        first.type_search("Backup", Instant::now());
        first.save()?;

        let mut second = session().with_state_file(&path);
        assert!(second.restore()?);
        assert_eq!(
            second.prefs(),
            ViewPrefs {
                view: View::Grid,
                sort: SortKey::Name,
                search: "backup".to_string(),
            }
        );
        assert_eq!(second.input(), "backup");
        Ok(())
    }
}
