use crate::error::StoreError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Folder,
    File,
    Archive,
    Image,
}

impl ItemKind {
    pub fn icon(self) -> &'static str {
        match self {
            Self::Folder => "📁",
            Self::File => "📄",
            Self::Archive => "🗜",
            Self::Image => "🖼",
        }
    }

    /// Guesses the kind of a plain file from its extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "zip" | "tar" | "gz" | "tgz" | "bz2" | "xz" | "7z" => Self::Archive,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "bmp" => Self::Image,
            _ => Self::File,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Warning,
    Error,
    Info,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Info => "info",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "Active",
            Self::Warning => "Attention",
            Self::Error => "Error",
            Self::Info => "Info",
        }
    }
}

/// A node of the forest. Only folders carry `children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(rename = "size", default)]
    pub size_bytes: u64,
    #[serde(rename = "modified", deserialize_with = "deserialize_timestamp")]
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Item>>,
}

impl Item {
    pub fn folder(
        id: impl Into<String>,
        name: impl Into<String>,
        size_bytes: u64,
        modified_at: DateTime<Utc>,
        children: Vec<Item>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::Folder,
            size_bytes,
            modified_at,
            status: None,
            children: Some(children),
        }
    }

    /// Builds a non-folder item. Passing `ItemKind::Folder` yields an empty folder.
    pub fn leaf(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: ItemKind,
        size_bytes: u64,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            size_bytes,
            modified_at,
            status: None,
            children: (kind == ItemKind::Folder).then(Vec::new),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    pub fn children(&self) -> &[Item] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(Item::subtree_len).sum::<usize>()
    }
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid timestamp: {raw}"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Grid,
    #[default]
    List,
}

impl View {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Grid => Self::List,
            Self::List => Self::Grid,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::List => "list",
        }
    }
}

impl FromStr for View {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid" => Ok(Self::Grid),
            "list" => Ok(Self::List),
            other => Err(StoreError::InvalidArgument(format!("unknown view: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    DateDesc,
    DateAsc,
    Name,
    Status,
}

impl SortKey {
    pub const ALL: [Self; 4] = [Self::DateDesc, Self::DateAsc, Self::Name, Self::Status];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DateDesc => "date-desc",
            Self::DateAsc => "date-asc",
            Self::Name => "name",
            Self::Status => "status",
        }
    }

    /// The key after `self` in [`SortKey::ALL`], wrapping around.
    #[must_use]
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| StoreError::InvalidArgument(format!("unknown sort key: {s}")))
    }
}

/// One row of a projection: an item plus render-only facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayNode<'a> {
    pub item: &'a Item,
    pub depth: usize,
    pub expanded: bool,
    pub selected: bool,
    pub has_visible_children: bool,
}

/// Filtered, sorted, expansion-aware rows in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection<'a> {
    nodes: Vec<DisplayNode<'a>>,
}

impl<'a> Projection<'a> {
    pub(crate) fn new(nodes: Vec<DisplayNode<'a>>) -> Self {
        Self { nodes }
    }

    /// Nothing to show: the forest is empty or the search filtered everything out.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, index: usize) -> Option<&DisplayNode<'a>> {
        self.nodes.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DisplayNode<'a>> {
        self.nodes.iter()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.item.id == id)
    }

    #[allow(dead_code)]
    pub fn ids(&self) -> Vec<&'a str> {
        self.nodes.iter().map(|n| n.item.id.as_str()).collect()
    }
}
