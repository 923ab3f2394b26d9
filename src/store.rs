//! The forest of items plus the view state that decides what is shown.
//!
//! `TreeStore` is the single writer of the forest: callers never reach into
//! `children` vectors, they go through [`TreeStore::find_by_id`],
//! [`TreeStore::remove_by_id`] and [`TreeStore::rename`]. Everything the
//! renderer needs comes from [`TreeStore::project`], which never mutates.

use crate::error::{StoreError, StoreResult};
use crate::model::{DisplayNode, Item, Projection, SortKey, View};
use feruca::Collator;
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct TreeStore {
    roots: Vec<Item>,
    view: View,
    sort: SortKey,
    search: String,
    expanded: HashSet<String>,
    selected: Option<String>,
}

/// An item that survived the search filter, with its surviving children.
struct Filtered<'a> {
    item: &'a Item,
    children: Vec<Filtered<'a>>,
}

impl TreeStore {
    pub fn new(roots: Vec<Item>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    pub fn roots(&self) -> &[Item] {
        &self.roots
    }

    /// Swaps in a freshly loaded forest. View state is kept; ids that no
    /// longer exist simply become stale.
    pub fn replace_roots(&mut self, roots: Vec<Item>) {
        log::debug!("replacing forest ({} roots)", roots.len());
        self.roots = roots;
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected
            .as_deref()
            .filter(|id| self.find_by_id(id).is_ok())
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id) && self.find_by_id(id).is_ok()
    }

    /// Total number of nodes in the forest.
    pub fn len(&self) -> usize {
        self.roots.iter().map(Item::subtree_len).sum()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Sum of the (cached) sizes of the top-level items.
    pub fn total_size(&self) -> u64 {
        self.roots.iter().map(|i| i.size_bytes).sum()
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    /// Parses and applies a sort key; unknown keys leave the store untouched.
    #[allow(dead_code)]
    pub fn set_sort_key(&mut self, key: &str) -> StoreResult<()> {
        self.sort = key.parse()?;
        Ok(())
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = normalize(term);
    }

    /// Flips the expansion of `id`. Unknown ids are ignored.
    ///
    /// Returns whether `id` is expanded afterwards.
    pub fn toggle_expand(&mut self, id: &str) -> bool {
        if self.find_by_id(id).is_err() {
            return false;
        }
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.to_string());
            true
        }
    }

    /// Selects `id`, or clears the selection if `id` is already selected.
    ///
    /// Unknown ids are rejected and the current selection is kept.
    pub fn select(&mut self, id: &str) -> StoreResult<Option<&str>> {
        self.find_by_id(id)?;
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        } else {
            self.selected = Some(id.to_string());
        }
        Ok(self.selected.as_deref())
    }

    pub fn find_by_id(&self, id: &str) -> StoreResult<&Item> {
        find_in(&self.roots, id).ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Detaches `id` and its whole subtree from the forest.
    ///
    /// Ancestor sizes are left as they were.
    pub fn remove_by_id(&mut self, id: &str) -> StoreResult<Item> {
        let removed =
            remove_from(&mut self.roots, id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        log::debug!(
            "removed {id} ({} nodes, {} bytes)",
            removed.subtree_len(),
            removed.size_bytes
        );
        Ok(removed)
    }

    /// Renames `id` to the trimmed `new_name`, returning the previous name.
    pub fn rename(&mut self, id: &str, new_name: &str) -> StoreResult<String> {
        let name = new_name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidArgument("name must not be empty".into()));
        }
        let item =
            find_in_mut(&mut self.roots, id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut item.name, name.to_string());
        log::debug!("renamed {id}: {previous:?} -> {name:?}");
        Ok(previous)
    }

    /// Computes the rows to display for the current search, sort, expansion
    /// and selection.
    pub fn project(&self) -> Projection<'_> {
        let mut filtered = self.filter(&self.roots);
        sort_level(&mut filtered, self.sort, &mut None);

        let mut nodes = Vec::new();
        self.emit(&filtered, 0, &mut nodes);
        Projection::new(nodes)
    }

    fn filter<'a>(&self, items: &'a [Item]) -> Vec<Filtered<'a>> {
        items
            .iter()
            .filter_map(|item| {
                let children = self.filter(item.children());
                let matches =
                    self.search.is_empty() || normalize(&item.name).contains(&self.search);
                (matches || !children.is_empty()).then_some(Filtered { item, children })
            })
            .collect()
    }

    fn emit<'a>(&self, level: &[Filtered<'a>], depth: usize, out: &mut Vec<DisplayNode<'a>>) {
        for node in level {
            let id = node.item.id.as_str();
            let has_visible_children = !node.children.is_empty();
            let expanded = self.expanded.contains(id);
            out.push(DisplayNode {
                item: node.item,
                depth,
                expanded,
                selected: self.selected.as_deref() == Some(id),
                has_visible_children,
            });
            if expanded && has_visible_children {
                self.emit(&node.children, depth + 1, out);
            }
        }
    }
}

fn normalize(term: &str) -> String {
    term.trim().to_lowercase()
}

/// Sorts every level independently. The collator is built on first use.
fn sort_level(level: &mut [Filtered<'_>], sort: SortKey, collator: &mut Option<Collator>) {
    level.sort_by(|a, b| compare(sort, collator, a.item, b.item));
    for node in level {
        sort_level(&mut node.children, sort, collator);
    }
}

fn compare(sort: SortKey, collator: &mut Option<Collator>, a: &Item, b: &Item) -> Ordering {
    match sort {
        SortKey::DateDesc => b.modified_at.cmp(&a.modified_at),
        SortKey::DateAsc => a.modified_at.cmp(&b.modified_at),
        SortKey::Name => collator
            .get_or_insert_with(Collator::default)
            .collate(a.name.as_str(), b.name.as_str()),
        SortKey::Status => {
            let a = a.status.map_or("", |s| s.as_str());
            let b = b.status.map_or("", |s| s.as_str());
            a.cmp(b)
        }
    }
}

fn find_in<'a>(items: &'a [Item], id: &str) -> Option<&'a Item> {
    items.iter().find_map(|item| {
        if item.id == id {
            Some(item)
        } else {
            find_in(item.children(), id)
        }
    })
}

fn find_in_mut<'a>(items: &'a mut [Item], id: &str) -> Option<&'a mut Item> {
    for item in items {
        if item.id == id {
            return Some(item);
        }
        if let Some(children) = item.children.as_mut()
            && let Some(found) = find_in_mut(children, id)
        {
            return Some(found);
        }
    }
    None
}

fn remove_from(items: &mut Vec<Item>, id: &str) -> Option<Item> {
    if let Some(pos) = items.iter().position(|i| i.id == id) {
        return Some(items.remove(pos));
    }
    items
        .iter_mut()
        .filter_map(|item| item.children.as_mut())
        .find_map(|children| remove_from(children, id))
}
