use crate::cleaner;
use crate::cleanup::{self, StaleSet};
use crate::config::Config;
use crate::download;
use crate::model::Item;
use crate::notify::{Notifier, Severity, Toasts};
use crate::search::SearchSession;
use crate::source::Source;
use crate::store::TreeStore;
use chrono::Utc;
use humansize::{BINARY, format_size};
use ratatui::widgets::ListState;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

pub enum AppState {
    Browsing,
    Searching,
    Renaming { id: String, buffer: String },
    Confirming(PendingAction),
    Loading,
}

/// Outcome of a background file job.
pub enum JobDone {
    Trashed(Result<usize, String>),
    Downloaded {
        name: String,
        result: Result<PathBuf, String>,
    },
}

/// A destructive action waiting for the user's answer.
pub enum PendingAction {
    Delete { id: String, name: String },
    Cleanup(StaleSet),
}

impl PendingAction {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "Delete",
            Self::Cleanup(_) => "Clean up stale items",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Delete { name, .. } => format!("Are you sure you want to delete \"{name}\"?"),
            Self::Cleanup(stale) => format!(
                "{} stale items will be removed.\nTotal size: {}\n\nThis action cannot be undone.",
                stale.len(),
                format_size(stale.total_size, BINARY)
            ),
        }
    }
}

pub struct App {
    pub session: SearchSession,
    pub source: Source,
    pub config: Config,
    pub toasts: Toasts,
    pub list_state: ListState,
    pub state: AppState,
    // Channel receiver for the refresh thread
    pub load_rx: Option<mpsc::Receiver<Result<Vec<Item>, String>>>,
    // One channel shared by every trash and download thread
    jobs_tx: mpsc::Sender<JobDone>,
    jobs_rx: mpsc::Receiver<JobDone>,
    pub pending_jobs: usize,
}

impl App {
    pub fn new(session: SearchSession, source: Source, config: Config) -> Self {
        let toasts = Toasts::new(Duration::from_secs(config.toast_ttl_secs));
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let mut app = Self {
            session,
            source,
            config,
            toasts,
            list_state: ListState::default(),
            state: AppState::Browsing,
            load_rx: None,
            jobs_tx,
            jobs_rx,
            pending_jobs: 0,
        };
        app.clamp_cursor();
        app
    }

    pub fn store(&self) -> &TreeStore {
        self.session.store()
    }

    fn row_count(&self) -> usize {
        self.store().project().len()
    }

    /// Id of the row under the cursor.
    pub fn cursor_id(&self) -> Option<String> {
        let i = self.list_state.selected()?;
        self.store().project().get(i).map(|n| n.item.id.clone())
    }

    /// Keeps the cursor on a valid row after the projection changed.
    pub fn clamp_cursor(&mut self) {
        let len = self.row_count();
        match self.list_state.selected() {
            _ if len == 0 => self.list_state.select(None),
            Some(i) if i >= len => self.list_state.select(Some(len - 1)),
            None => self.list_state.select(Some(0)),
            Some(_) => {}
        }
    }

    /// Moves the cursor to `id` if it is visible, otherwise clamps it.
    fn follow(&mut self, id: &str) {
        let position = self.store().project().position(id);
        match position {
            Some(i) => self.list_state.select(Some(i)),
            None => self.clamp_cursor(),
        }
    }

    pub fn next(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }

        let i = match self.list_state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }

        let i = match self.list_state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn toggle_expand(&mut self) {
        if let Some(id) = self.cursor_id() {
            self.session.store_mut().toggle_expand(&id);
            self.follow(&id);
        }
    }

    pub fn toggle_select(&mut self) {
        if let Some(id) = self.cursor_id()
            && let Err(e) = self.session.store_mut().select(&id)
        {
            self.toasts.notify(&e.to_string(), Severity::Error);
        }
    }

    /// Folders open by expanding; other items just report that they opened.
    pub fn open(&mut self) {
        let Some(id) = self.cursor_id() else {
            return;
        };
        let Ok((is_folder, name)) = self
            .store()
            .find_by_id(&id)
            .map(|i| (i.is_folder(), i.name.clone()))
        else {
            return;
        };

        if is_folder {
            self.session.store_mut().toggle_expand(&id);
            self.follow(&id);
            self.toasts.notify(&format!("Folder \"{name}\" opened"), Severity::Success);
        } else {
            self.toasts.notify(&format!("File \"{name}\" opened"), Severity::Success);
        }
    }

    /// Copies the files behind the item under the cursor to the download directory.
    pub fn download(&mut self) {
        let Some(id) = self.cursor_id() else {
            return;
        };
        let Ok(item) = self.store().find_by_id(&id).cloned() else {
            return;
        };
        let Some(root) = self.source.backing_root().map(PathBuf::from) else {
            self.toasts.notify(
                &format!("\"{}\" has no files to download", item.name),
                Severity::Info,
            );
            return;
        };
        let Some(dest) = self.config.download_dir() else {
            self.toasts.notify("No download directory configured", Severity::Error);
            return;
        };

        self.toasts.notify(&format!("Downloading \"{}\"", item.name), Severity::Info);
        self.spawn_job(move || JobDone::Downloaded {
            result: download::download(&root, &item, &dest).map_err(|e| format!("{e:#}")),
            name: item.name,
        });
    }

    pub fn toggle_view(&mut self) {
        let view = self.store().view().toggled();
        self.session.store_mut().set_view(view);
    }

    pub fn cycle_sort(&mut self) {
        let id = self.cursor_id();
        let sort = self.store().sort().next();
        self.session.store_mut().set_sort(sort);
        match id {
            Some(id) => self.follow(&id),
            None => self.clamp_cursor(),
        }
    }

    pub fn begin_search(&mut self) {
        self.state = AppState::Searching;
    }

    pub fn search_push(&mut self, c: char, now: Instant) {
        let mut input = self.session.input().to_string();
        input.push(c);
        self.session.type_search(&input, now);
    }

    pub fn search_pop(&mut self, now: Instant) {
        let mut input = self.session.input().to_string();
        input.pop();
        self.session.type_search(&input, now);
    }

    /// Leaves search mode keeping the term.
    pub fn end_search(&mut self) {
        self.session.flush();
        self.clamp_cursor();
        self.state = AppState::Browsing;
    }

    /// Leaves search mode and clears the term.
    pub fn cancel_search(&mut self) {
        self.session.clear_search();
        self.clamp_cursor();
        self.state = AppState::Browsing;
    }

    pub fn begin_rename(&mut self) {
        let Some(id) = self.cursor_id() else {
            return;
        };
        let Ok(buffer) = self.store().find_by_id(&id).map(|i| i.name.clone()) else {
            return;
        };
        self.state = AppState::Renaming { id, buffer };
    }

    pub fn rename_push(&mut self, c: char) {
        if let AppState::Renaming { buffer, .. } = &mut self.state {
            buffer.push(c);
        }
    }

    pub fn rename_pop(&mut self) {
        if let AppState::Renaming { buffer, .. } = &mut self.state {
            buffer.pop();
        }
    }

    pub fn commit_rename(&mut self) {
        let AppState::Renaming { id, buffer } =
            std::mem::replace(&mut self.state, AppState::Browsing)
        else {
            return;
        };

        match self.session.store_mut().rename(&id, &buffer) {
            Ok(previous) => {
                let name = buffer.trim();
                self.toasts.notify(
                    &format!("\"{previous}\" renamed to \"{name}\""),
                    Severity::Success,
                );
                self.follow(&id);
            }
            Err(e) => self.toasts.notify(&e.to_string(), Severity::Error),
        }
    }

    pub fn request_delete(&mut self) {
        let Some(id) = self.cursor_id() else {
            return;
        };
        let Ok(name) = self.store().find_by_id(&id).map(|i| i.name.clone()) else {
            return;
        };
        self.state = AppState::Confirming(PendingAction::Delete { id, name });
    }

    pub fn request_cleanup(&mut self) {
        let stale = cleanup::find_stale(
            self.store().roots(),
            Utc::now(),
            self.config.stale_after_days,
            &self.config.protected,
        );
        if stale.is_empty() {
            self.toasts.notify("No stale items to clean up", Severity::Info);
            return;
        }
        self.state = AppState::Confirming(PendingAction::Cleanup(stale));
    }

    pub fn cancel(&mut self) {
        self.state = AppState::Browsing;
    }

    /// Runs the pending action the user just accepted.
    pub fn confirm(&mut self) {
        let AppState::Confirming(action) = std::mem::replace(&mut self.state, AppState::Browsing)
        else {
            return;
        };

        let removed = match action {
            PendingAction::Delete { id, name } => match self.session.store_mut().remove_by_id(&id) {
                Ok(item) => {
                    self.toasts.notify(&format!("\"{name}\" deleted"), Severity::Success);
                    vec![item]
                }
                Err(e) => {
                    self.toasts.notify(&e.to_string(), Severity::Error);
                    return;
                }
            },
            PendingAction::Cleanup(stale) => {
                let report = cleanup::perform_cleanup(self.session.store_mut(), &stale.ids);
                self.toasts.notify(
                    &format!(
                        "Removed {} stale items ({})",
                        report.removed.len(),
                        format_size(report.freed_bytes(), BINARY)
                    ),
                    Severity::Success,
                );
                report.removed
            }
        };

        self.clamp_cursor();
        self.trash_in_background(removed);
    }

    fn trash_in_background(&mut self, items: Vec<Item>) {
        let Some(root) = self.source.backing_root().map(PathBuf::from) else {
            return;
        };
        if items.is_empty() {
            return;
        }

        self.spawn_job(move || {
            JobDone::Trashed(cleaner::move_to_trash(&root, &items).map_err(|e| format!("{e:#}")))
        });
    }

    fn spawn_job<F>(&mut self, job: F)
    where
        F: FnOnce() -> JobDone + Send + 'static,
    {
        let tx = self.jobs_tx.clone();
        self.pending_jobs += 1;
        thread::spawn(move || {
            // The receiver lives as long as the app.
            let _ = tx.send(job());
        });
    }

    /// Reports every background job that finished since the last tick.
    pub fn check_jobs(&mut self) {
        while let Ok(done) = self.jobs_rx.try_recv() {
            self.pending_jobs = self.pending_jobs.saturating_sub(1);
            match done {
                JobDone::Trashed(Ok(count)) => log::info!("trashed {count} paths"),
                JobDone::Trashed(Err(msg)) => self
                    .toasts
                    .notify(&format!("Files left in place: {msg}"), Severity::Warning),
                JobDone::Downloaded { name, result: Ok(path) } => self.toasts.notify(
                    &format!("\"{name}\" downloaded to {}", path.display()),
                    Severity::Success,
                ),
                JobDone::Downloaded { name, result: Err(msg) } => self
                    .toasts
                    .notify(&format!("Download of \"{name}\" failed: {msg}"), Severity::Error),
            }
        }
    }

    pub fn start_refresh(&mut self) {
        let (tx, rx) = mpsc::channel();
        self.load_rx = Some(rx);
        self.state = AppState::Loading;

        let source = self.source.clone();
        let config = self.config.clone();
        thread::spawn(move || {
            let res = source.load(&config).map_err(|e| format!("{e:#}"));
            let _ = tx.send(res);
        });
    }

    pub fn check_load_status(&mut self) {
        if let Some(rx) = &self.load_rx
            && let Ok(result) = rx.try_recv()
        {
            match result {
                Ok(roots) => {
                    let id = self.cursor_id();
                    self.session.store_mut().replace_roots(roots);
                    match id {
                        Some(id) => self.follow(&id),
                        None => self.clamp_cursor(),
                    }
                    self.toasts.notify("Data refreshed successfully", Severity::Success);
                }
                Err(msg) => self
                    .toasts
                    .notify(&format!("Refresh failed: {msg}"), Severity::Error),
            }
            self.load_rx = None;
            self.state = AppState::Browsing;
        }
    }

    /// Periodic housekeeping, called once per UI tick.
    pub fn tick(&mut self, now: Instant) {
        if self.session.tick(now) {
            self.clamp_cursor();
        }
        self.toasts.prune(now);
        self.check_jobs();
        if let AppState::Loading = self.state {
            self.check_load_status();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemKind, parse_timestamp};
    use crate::source::sample_forest;

    fn app() -> App {
        let config = Config::default();
        let session = SearchSession::new(
            TreeStore::new(sample_forest()),
            Duration::from_millis(config.search_debounce_ms),
        );
        App::new(session, Source::Sample, config)
    }

    fn toast(app: &App) -> Option<&str> {
        app.toasts.latest().map(|t| t.message.as_str())
    }

    fn wait_for_jobs(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while app.pending_jobs > 0 && Instant::now() < deadline {
            app.check_jobs();
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn cursor_wraps_around() {
        let mut app = app();
        assert_eq!(app.cursor_id().as_deref(), Some("1"));
        app.previous();
        assert_eq!(app.cursor_id().as_deref(), Some("2"));
        app.next();
        app.next();
        assert_eq!(app.cursor_id().as_deref(), Some("3"));
    }

    #[test]
    fn open_folder_expands_it() {
        let mut app = app();
        app.open();
        assert!(app.store().is_expanded("1"));
        assert_eq!(toast(&app), Some("Folder \"project-backup-2024\" opened"));
        app.next();
        assert_eq!(app.cursor_id().as_deref(), Some("1-1"));
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = app();
        app.request_delete();
        assert!(matches!(
            app.state,
            AppState::Confirming(PendingAction::Delete { .. })
        ));
        app.cancel();
        assert!(app.store().find_by_id("1").is_ok());

        app.request_delete();
        app.confirm();
        assert!(app.store().find_by_id("1").is_err());
        assert!(app.store().find_by_id("1-1-1").is_err());
        assert_eq!(toast(&app), Some("\"project-backup-2024\" deleted"));
        assert_eq!(app.cursor_id().as_deref(), Some("3"));
        assert_eq!(app.pending_jobs, 0);
    }

    #[test]
    fn rename_flow() {
        let mut app = app();
        app.begin_rename();
        for _ in 0.."project-backup-2024".len() {
            app.rename_pop();
        }
        app.commit_rename();
        assert_eq!(
            app.store().find_by_id("1").map(|i| i.name.as_str()),
            Ok("project-backup-2024")
        );
        assert_eq!(toast(&app), Some("invalid argument: name must not be empty"));

        app.begin_rename();
        app.rename_push('!');
        app.commit_rename();
        assert_eq!(
            app.store().find_by_id("1").map(|i| i.name.as_str()),
            Ok("project-backup-2024!")
        );
        assert!(matches!(app.state, AppState::Browsing));
    }

    #[test]
    fn cleanup_with_nothing_stale_only_notifies() {
        let mut app = app();
        app.config.stale_after_days = 100_000;
        app.request_cleanup();
        assert!(matches!(app.state, AppState::Browsing));
        assert_eq!(toast(&app), Some("No stale items to clean up"));
    }

    #[test]
    fn cleanup_removes_stale_roots() {
        let mut app = app();
        let recent = Item::leaf("new", "fresh.v", ItemKind::File, 1, Utc::now());
        let mut roots = sample_forest();
        roots.push(recent);
        app.session.store_mut().replace_roots(roots);
        app.config.protected = vec!["3".to_string()];

        app.request_cleanup();
        let AppState::Confirming(action) = &app.state else {
            panic!("expected confirmation");
        };
        assert!(action.message().starts_with("2 stale items"));

        app.confirm();
        let ids: Vec<&str> = app.store().roots().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "new"]);
    }

    #[test]
    fn search_applies_after_debounce() {
        let mut app = app();
        let start = Instant::now();
        app.begin_search();
        for c in "dash".chars() {
            app.search_push(c, start);
        }
        app.tick(start);
        assert_eq!(app.row_count(), 3);

        app.tick(start + Duration::from_secs(1));
        assert_eq!(app.store().project().ids(), vec!["3"]);
        app.end_search();
        assert!(matches!(app.state, AppState::Browsing));
        assert_eq!(app.cursor_id().as_deref(), Some("3"));

        app.begin_search();
        app.cancel_search();
        assert_eq!(app.row_count(), 3);
    }

    #[test]
    fn refresh_replaces_roots_and_keeps_state() {
        let mut app = app();
        app.session.store_mut().toggle_expand("1");

        let (tx, rx) = mpsc::channel();
        app.load_rx = Some(rx);
        app.state = AppState::Loading;

        let ts = parse_timestamp("2024-02-01").expect("valid timestamp");
        let mut roots = sample_forest();
        roots.push(Item::leaf("4", "new_run.zip", ItemKind::Archive, 10, ts));
        tx.send(Ok(roots)).expect("send");

        app.tick(Instant::now());
        assert!(matches!(app.state, AppState::Browsing));
        assert!(app.load_rx.is_none());
        assert!(app.store().is_expanded("1"));
        assert_eq!(app.store().roots().len(), 4);
        assert_eq!(toast(&app), Some("Data refreshed successfully"));
    }

    #[test]
    fn failed_refresh_keeps_data() {
        let mut app = app();
        let (tx, rx) = mpsc::channel();
        app.load_rx = Some(rx);
        app.state = AppState::Loading;
        tx.send(Err("listing unavailable".to_string())).expect("send");

        app.check_load_status();
        assert_eq!(app.store().roots().len(), 3);
        assert_eq!(toast(&app), Some("Refresh failed: listing unavailable"));
    }

    #[test]
    fn cycle_sort_keeps_cursor_on_item() {
        let mut app = app();
        app.next();
        assert_eq!(app.cursor_id().as_deref(), Some("3"));
        app.cycle_sort();
        assert_eq!(app.cursor_id().as_deref(), Some("3"));
        assert_eq!(app.store().project().ids(), vec!["2", "3", "1"]);
    }

    #[test]
    fn back_to_back_trash_jobs_all_report() {
        let mut app = app();
        app.spawn_job(|| JobDone::Trashed(Err("first".to_string())));
        app.spawn_job(|| JobDone::Trashed(Err("second".to_string())));
        assert_eq!(app.pending_jobs, 2);

        wait_for_jobs(&mut app);
        assert_eq!(app.pending_jobs, 0);
        assert_eq!(app.toasts.len(), 2);
        assert!(app.toasts.latest().is_some_and(|t| t.severity == Severity::Warning));
    }

    #[test]
    fn download_copies_backing_files() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let dest = tempfile::tempdir()?;
        std::fs::create_dir(root.path().join("run"))?;
        std::fs::write(root.path().join("run").join("top.v"), "module top;")?;

        let config = Config {
            download_dir: Some(dest.path().to_path_buf()),
            ..Config::default()
        };
        let source = Source::Dir(root.path().to_path_buf());
        let session = SearchSession::new(
            TreeStore::new(source.load(&config)?),
            Duration::from_millis(config.search_debounce_ms),
        );
        let mut app = App::new(session, source, config);
        assert_eq!(app.cursor_id().as_deref(), Some("run"));

        app.download();
        assert_eq!(toast(&app), Some("Downloading \"run\""));
        wait_for_jobs(&mut app);

        let copy = dest.path().join("run").join("top.v");
        assert_eq!(std::fs::read_to_string(copy)?, "module top;");
        assert!(toast(&app).is_some_and(|m| m.starts_with("\"run\" downloaded to")));
        Ok(())
    }

    #[test]
    fn download_without_backing_files_only_notifies() {
        let mut app = app();
        app.download();
        assert_eq!(app.pending_jobs, 0);
        assert_eq!(
            toast(&app),
            Some("\"project-backup-2024\" has no files to download")
        );
    }
}
