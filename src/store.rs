// File: src/store.rs
//! Per-document checklist state.
//!
//! `ChecklistStore` owns, for every document id, the items last extracted from
//! it and the subset the user pinned. The two have independent lifecycles: a
//! selection is created on first pin and survives re-extractions as long as the
//! pinned content is still present in the document.
use crate::model::{ChecklistItem, FileItems, SelectedItems};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

// Increment on breaking changes to the persisted blob layout.
// - v1: itemsForFile / selectedItemsForFile with synthetic item ids
const STATE_VERSION: u32 = 1;

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    ItemsChanged(String),
    SelectionChanged(String),
    FileRemoved(String),
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    items_for_file: BTreeMap<String, FileItems>,
    #[serde(default)]
    selected_items_for_file: BTreeMap<String, SelectedItems>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshotRef<'a> {
    version: u32,
    items_for_file: &'a BTreeMap<String, FileItems>,
    selected_items_for_file: &'a BTreeMap<String, SelectedItems>,
}

#[derive(Debug, Default)]
pub struct ChecklistStore {
    items_for_file: BTreeMap<String, FileItems>,
    selected_items_for_file: BTreeMap<String, SelectedItems>,
    listeners: Vec<mpsc::UnboundedSender<StoreEvent>>,
}

/// Repoints every selected entry to an item of `items`.
///
/// An entry whose id is still present keeps that item. The others take the
/// first unclaimed item with equal content; without one they are dropped when
/// `drop_missing` is set, kept as-is otherwise.
fn reconcile(selection: &mut SelectedItems, items: &[ChecklistItem], drop_missing: bool) {
    let mut claimed = vec![false; items.len()];
    let mut matched: Vec<Option<usize>> = selection
        .items
        .iter()
        .map(|old| items.iter().position(|i| i.id == old.id))
        .collect();
    for idx in matched.iter().flatten() {
        claimed[*idx] = true;
    }

    for (pos, old) in selection.items.iter().enumerate() {
        if matched[pos].is_some() {
            continue;
        }
        let found = (0..items.len()).find(|&i| !claimed[i] && items[i].content == old.content);
        if let Some(idx) = found {
            claimed[idx] = true;
            matched[pos] = Some(idx);
        }
    }

    let mut kept = Vec::with_capacity(selection.items.len());
    for (old, found) in selection.items.drain(..).zip(matched) {
        match found {
            Some(idx) => kept.push(items[idx].clone()),
            None if drop_missing => {
                log::debug!("Dropping pinned item no longer in source: {:?}", old.content);
            }
            None => kept.push(old),
        }
    }

    selection.items = kept;
}

impl ChecklistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer. Receivers that were dropped are forgotten on the next event.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: StoreEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // --- Mutations ---

    /// Replaces the items of `file_id` and reconciles its selection, if any.
    ///
    /// Pinned entries whose content still appears are repointed to the new
    /// items (so their `checked` state follows the document); the rest are dropped.
    pub fn update_items(&mut self, file_id: &str, items: Vec<ChecklistItem>) {
        let has_selection =
            if let Some(selection) = self.selected_items_for_file.get_mut(file_id) {
                reconcile(selection, &items, true);
                true
            } else {
                false
            };

        log::debug!("{} item(s) recorded for {}", items.len(), file_id);
        self.items_for_file
            .insert(file_id.to_string(), FileItems { items });

        self.emit(StoreEvent::ItemsChanged(file_id.to_string()));
        if has_selection {
            self.emit(StoreEvent::SelectionChanged(file_id.to_string()));
        }
    }

    /// The document lost its tag: drop its item record and empty its selection.
    pub fn clear_items(&mut self, file_id: &str) {
        let had_items = self.items_for_file.remove(file_id).is_some();
        let has_selection =
            if let Some(selection) = self.selected_items_for_file.get_mut(file_id) {
                reconcile(selection, &[], true);
                true
            } else {
                false
            };

        if had_items {
            self.emit(StoreEvent::ItemsChanged(file_id.to_string()));
        }
        if has_selection {
            self.emit(StoreEvent::SelectionChanged(file_id.to_string()));
        }
    }

    /// Pins `item`. Returns false if an item with the same id is already pinned.
    pub fn select_item(&mut self, file_id: &str, item: &ChecklistItem) -> bool {
        let selection = self
            .selected_items_for_file
            .entry(file_id.to_string())
            .or_default();

        if selection.contains(&item.id) {
            return false;
        }

        selection.items.push(item.clone());
        self.emit(StoreEvent::SelectionChanged(file_id.to_string()));
        true
    }

    /// Unpins the item with `item_id`. The emptied selection record is kept;
    /// see [`ChecklistStore::prune_empty_selections`].
    pub fn deselect_item(&mut self, file_id: &str, item_id: &str) -> bool {
        let Some(selection) = self.selected_items_for_file.get_mut(file_id) else {
            return false;
        };

        let before = selection.items.len();
        selection.items.retain(|i| i.id != item_id);
        let removed = selection.items.len() != before;

        self.emit(StoreEvent::SelectionChanged(file_id.to_string()));
        removed
    }

    pub fn set_folded(&mut self, file_id: &str, folded: bool) -> bool {
        let Some(selection) = self.selected_items_for_file.get_mut(file_id) else {
            return false;
        };
        selection.folded = folded;
        self.emit(StoreEvent::SelectionChanged(file_id.to_string()));
        true
    }

    /// Returns the new fold state, or `None` when nothing is pinned for `file_id`.
    pub fn toggle_folded(&mut self, file_id: &str) -> Option<bool> {
        let folded = !self.selected_items_for_file.get(file_id)?.folded;
        self.set_folded(file_id, folded);
        Some(folded)
    }

    /// Forgets everything about a deleted document.
    pub fn remove_file(&mut self, file_id: &str) {
        let had_items = self.items_for_file.remove(file_id).is_some();
        let had_selection = self.selected_items_for_file.remove(file_id).is_some();
        if had_items || had_selection {
            self.emit(StoreEvent::FileRemoved(file_id.to_string()));
        }
    }

    /// Drops emptied selection records and returns their ids.
    pub fn prune_empty_selections(&mut self) -> Vec<String> {
        let empty: Vec<String> = self
            .selected_items_for_file
            .iter()
            .filter(|(_, s)| s.is_empty())
            .map(|(id, _)| id.clone())
            .collect();

        for id in &empty {
            self.selected_items_for_file.remove(id);
        }
        empty
    }

    // --- Queries ---

    pub fn items_for_file(&self, file_id: &str) -> Option<&[ChecklistItem]> {
        self.items_for_file.get(file_id).map(|f| f.items.as_slice())
    }

    pub fn selected_items_for_file(&self, file_id: &str) -> Option<&SelectedItems> {
        self.selected_items_for_file.get(file_id)
    }

    pub fn find_item(&self, file_id: &str, item_id: &str) -> Option<&ChecklistItem> {
        self.items_for_file(file_id)?
            .iter()
            .find(|i| i.id == item_id)
    }

    pub fn is_selected(&self, file_id: &str, item_id: &str) -> bool {
        self.selected_items_for_file
            .get(file_id)
            .is_some_and(|s| s.contains(item_id))
    }

    /// Document ids with recorded items, in id order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.items_for_file.keys().map(String::as_str)
    }

    /// Non-empty selections, in id order.
    pub fn selections(&self) -> impl Iterator<Item = (&str, &SelectedItems)> {
        self.selected_items_for_file
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(id, s)| (id.as_str(), s))
    }

    pub fn items_by_file(&self) -> &BTreeMap<String, FileItems> {
        &self.items_for_file
    }

    pub fn selections_by_file(&self) -> &BTreeMap<String, SelectedItems> {
        &self.selected_items_for_file
    }

    // --- Persistence ---

    pub fn serialize(&self) -> String {
        let snapshot = StoreSnapshotRef {
            version: STATE_VERSION,
            items_for_file: &self.items_for_file,
            selected_items_for_file: &self.selected_items_for_file,
        };
        // String-keyed maps of plain structs always serialize.
        serde_json::to_string_pretty(&snapshot).expect("checklist state is always serializable")
    }

    /// Rebuilds a store from a blob produced by [`ChecklistStore::serialize`].
    ///
    /// A missing, malformed or newer-version blob yields an empty store.
    pub fn restore(blob: Option<&str>) -> Self {
        let Some(blob) = blob else {
            log::debug!("No persisted checklist state, starting empty");
            return Self::default();
        };

        let snapshot = match serde_json::from_str::<StoreSnapshot>(blob) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Ignoring malformed checklist state: {}", e);
                return Self::default();
            }
        };

        if snapshot.version > STATE_VERSION {
            log::warn!(
                "Ignoring checklist state from a newer version (v{} > v{})",
                snapshot.version,
                STATE_VERSION
            );
            return Self::default();
        }

        let mut store = Self {
            items_for_file: snapshot.items_for_file,
            selected_items_for_file: snapshot.selected_items_for_file,
            listeners: Vec::new(),
        };

        // Blobs without ids get fresh ones on both sides; line the selections back up.
        for (file_id, selection) in store.selected_items_for_file.iter_mut() {
            if let Some(file) = store.items_for_file.get(file_id) {
                reconcile(selection, &file.items, false);
            }
        }

        store
    }
}
