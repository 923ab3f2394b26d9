use crate::config::Config;
use crate::model::{Item, ItemKind, Status, parse_timestamp};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use jwalk::WalkDir;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Where the forest comes from. Refresh reloads from the same source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Sample,
    Json(PathBuf),
    Dir(PathBuf),
}

impl Source {
    pub fn load(&self, config: &Config) -> Result<Vec<Item>> {
        match self {
            Self::Sample => Ok(sample_forest()),
            Self::Json(path) => load_json(path),
            Self::Dir(path) => scan_dir(path, config),
        }
    }

    /// The directory whose files back the items, when there is one.
    pub fn backing_root(&self) -> Option<&Path> {
        match self {
            Self::Dir(path) => Some(path),
            Self::Sample | Self::Json(_) => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sample => f.write_str("sample data"),
            Self::Json(path) => write!(f, "{}", path.display()),
            Self::Dir(path) => write!(f, "{}/", path.display()),
        }
    }
}

/// Reads a listing file: a JSON array of item records.
pub fn load_json(path: &Path) -> Result<Vec<Item>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut roots: Vec<Item> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    normalize(&mut roots);
    warn_duplicate_ids(&roots);
    log::info!("loaded {} roots from {}", roots.len(), path.display());
    Ok(roots)
}

/// Folders always own a (possibly empty) child list; other kinds never do.
fn normalize(items: &mut [Item]) {
    for item in items {
        if item.is_folder() {
            normalize(item.children.get_or_insert_with(Vec::new));
        } else if item.children.take().is_some() {
            log::warn!("dropping children of non-folder item {}", item.id);
        }
    }
}

fn warn_duplicate_ids(roots: &[Item]) {
    fn walk<'a>(items: &'a [Item], seen: &mut HashSet<&'a str>) {
        for item in items {
            if !seen.insert(&item.id) {
                log::warn!("duplicate item id {}", item.id);
            }
            walk(item.children(), seen);
        }
    }
    walk(roots, &mut HashSet::new());
}

struct Entry {
    id: String,
    name: String,
    is_dir: bool,
    size: u64,
    modified: DateTime<Utc>,
}

/// Builds a forest from the contents of `root`.
///
/// Ids are `/`-separated paths relative to `root`. A folder's size and
/// modification time are aggregated from its subtree at scan time.
pub fn scan_dir(root: &Path, config: &Config) -> Result<Vec<Item>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let base = root.to_path_buf();
    let rules = config.clone();
    let walker = WalkDir::new(root)
        .skip_hidden(false)
        .sort(true)
        .process_read_dir(move |_, _, _, children| {
            children.retain(|child| {
                child
                    .as_ref()
                    .map_or(true, |e| !rules.is_ignored(&relative_id(&base, &e.path())))
            });
        });

    let mut by_parent: HashMap<String, Vec<Entry>> = HashMap::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("scan error under {}: {e}", root.display());
                continue;
            }
        };
        if entry.depth == 0 {
            continue;
        }

        let path = entry.path();
        let id = relative_id(root, &path);
        let parent = id.rsplit_once('/').map_or("", |(p, _)| p).to_string();
        let (size, modified) = match entry.metadata() {
            Ok(meta) => (
                if meta.is_file() { meta.len() } else { 0 },
                meta.modified().map_or(DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::from),
            ),
            Err(e) => {
                log::warn!("no metadata for {}: {e}", path.display());
                (0, DateTime::<Utc>::UNIX_EPOCH)
            }
        };

        by_parent.entry(parent).or_default().push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: entry.file_type().is_dir(),
            id,
            size,
            modified,
        });
    }

    let roots = build_level("", &mut by_parent);
    log::info!("scanned {} roots under {}", roots.len(), root.display());
    Ok(roots)
}

fn build_level(parent: &str, by_parent: &mut HashMap<String, Vec<Entry>>) -> Vec<Item> {
    let Some(entries) = by_parent.remove(parent) else {
        return Vec::new();
    };

    entries
        .into_iter()
        .map(|entry| {
            if entry.is_dir {
                let children = build_level(&entry.id, by_parent);
                let size = children.iter().map(|c| c.size_bytes).sum();
                let modified = children
                    .iter()
                    .map(|c| c.modified_at)
                    .fold(entry.modified, std::cmp::max);
                Item::folder(entry.id, entry.name, size, modified, children)
            } else {
                let kind = Path::new(&entry.name)
                    .extension()
                    .map_or(ItemKind::File, |ext| {
                        ItemKind::from_extension(&ext.to_string_lossy())
                    });
                Item::leaf(entry.id, entry.name, kind, entry.size, entry.modified)
            }
        })
        .collect()
}

fn relative_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn day(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// A small demo forest, shown when no source is given.
pub fn sample_forest() -> Vec<Item> {
    vec![
        Item::folder(
            "1",
            "project-backup-2024",
            256_000_000,
            day("2024-01-15"),
            vec![
                Item::folder(
                    "1-1",
                    "src",
                    128_000_000,
                    day("2024-01-14"),
                    vec![Item::leaf(
                        "1-1-1",
                        "top.v",
                        ItemKind::File,
                        1_024_000,
                        day("2024-01-14"),
                    )],
                ),
                Item::leaf("1-2", "config.json", ItemKind::File, 2048, day("2024-01-13")),
            ],
        )
        .with_status(Status::Success),
        Item::leaf(
            "2",
            "archive-2023",
            ItemKind::Archive,
            512_000_000,
            day("2023-12-20"),
        )
        .with_status(Status::Warning),
        Item::folder(
            "3",
            "screenshots",
            128_000_000,
            day("2024-01-10"),
            vec![Item::leaf(
                "3-1",
                "dashboard.png",
                ItemKind::Image,
                2_560_000,
                day("2024-01-10"),
            )],
        ),
    ]
}
