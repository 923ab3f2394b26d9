mod cleaner;
mod cleanup;
mod config;
mod download;
mod error;
mod model;
mod notify;
mod search;
mod source;
mod store;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use env_logger::{Env, Target};
use model::{SortKey, View};
use ratatui::prelude::*;
use search::SearchSession;
use source::Source;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use store::TreeStore;
use ui::app::App;

#[derive(Parser)]
#[command(version, about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Print version information
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Load the item listing from a JSON file
    #[arg(long, value_name = "FILE", conflicts_with = "dir")]
    json: Option<PathBuf>,

    /// Browse the contents of a directory
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Initial view (grid or list)
    #[arg(long, value_parser = parse_view)]
    view: Option<View>,

    /// Initial sort (date-desc, date-asc, name or status)
    #[arg(long, value_parser = parse_sort)]
    sort: Option<SortKey>,

    /// Age in days after which top-level items count as stale
    #[arg(long, value_name = "DAYS")]
    stale_days: Option<u32>,

    /// Where to write the log
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn parse_view(s: &str) -> Result<View, String> {
    s.parse().map_err(|e: error::StoreError| e.to_string())
}

fn parse_sort(s: &str) -> Result<SortKey, String> {
    s.parse().map_err(|e: error::StoreError| e.to_string())
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

/// Picks the log file. A requested file must open; the default one is
/// best effort and logging is skipped when it cannot be created.
fn log_target(requested: Option<&Path>, fallback: Option<&Path>) -> Result<Option<fs::File>> {
    if let Some(path) = requested {
        return open_log_file(path).map(Some);
    }
    let Some(path) = fallback else {
        return Ok(None);
    };
    match open_log_file(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) => {
            eprintln!("logging disabled: {e:#}");
            Ok(None)
        }
    }
}

/// Sends log output to a file; the terminal belongs to the UI.
fn init_logging(file: fs::File) {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(Target::Pipe(Box::new(file)))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_log = config::cache_dir().map(|d| d.join("runtree.log"));
    if let Some(file) = log_target(cli.log_file.as_deref(), default_log.as_deref())? {
        init_logging(file);
    }

    let mut config = Config::load();
    if let Some(days) = cli.stale_days {
        config.stale_after_days = days;
    }

    let source = match (cli.json, cli.dir) {
        (Some(path), _) => Source::Json(path),
        (None, Some(path)) => Source::Dir(path),
        (None, None) => Source::Sample,
    };
    let roots = source
        .load(&config)
        .with_context(|| format!("loading {source}"))?;
    log::info!("starting with {} roots from {source}", roots.len());

    let mut store = TreeStore::new(roots);
    store.set_view(config.default_view);
    store.set_sort(config.default_sort);

    let mut session = SearchSession::new(store, Duration::from_millis(config.search_debounce_ms));
    if let Some(dir) = config::data_dir() {
        session = session.with_state_file(dir.join("state.json"));
    }
    if let Err(e) = session.restore() {
        log::warn!("could not restore view state: {e:#}");
    }
    if let Some(view) = cli.view {
        session.store_mut().set_view(view);
    }
    if let Some(sort) = cli.sort {
        session.store_mut().set_sort(sort);
    }

    let mut app = App::new(session, source, config);

    enable_raw_mode()?;
    let mut stderr = io::stderr();
    execute!(stderr, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stderr);
    let mut terminal = Terminal::new(backend)?;

    let res = ui::run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = app.session.save() {
        log::warn!("could not save view state: {e:#}");
    }

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cli_rejects_unknown_sort_keys() {
        let cli = Cli::try_parse_from(["runtree", "--sort", "name", "--view", "grid"])
            .expect("valid arguments");
        assert_eq!(cli.sort, Some(SortKey::Name));
        assert_eq!(cli.view, Some(View::Grid));

        let err = Cli::try_parse_from(["runtree", "--sort", "size"])
            .err()
            .expect("unknown sort key");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.to_string().contains("unknown sort key: size"));
    }

    #[test]
    fn unusable_default_log_file_disables_logging() -> Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "")?;
        let bad = blocker.join("runtree.log");

        assert!(log_target(None, Some(&bad))?.is_none());
        assert!(log_target(Some(&bad), None).is_err());
        assert!(log_target(None, None)?.is_none());

        let good = dir.path().join("logs").join("runtree.log");
        assert!(log_target(None, Some(&good))?.is_some());
        assert!(good.exists());
        Ok(())
    }
}
