// File: ./src/model/item.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_id() -> String {
    Uuid::new_v4().to_string()
}

/// One parsed checklist line.
///
/// `id` is assigned at extraction time and is what selections are keyed by.
/// Two items extracted from the same line at different times share `content`
/// but never `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    // Older blobs carry no id; give them a fresh one on load.
    #[serde(default = "default_id")]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub checked: bool,
}

impl ChecklistItem {
    pub fn new(content: impl Into<String>, checked: bool) -> Self {
        Self {
            id: default_id(),
            content: content.into(),
            checked,
        }
    }

    /// Structural equality, ignoring the synthetic id.
    pub fn same_entry(&self, other: &ChecklistItem) -> bool {
        self.content == other.content && self.checked == other.checked
    }

    /// Content with surrounding whitespace removed, for display only.
    pub fn label(&self) -> &str {
        self.content.trim()
    }
}

/// Items of one document, replaced wholesale on every extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItems {
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

/// The pinned subset of a document's items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedItems {
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
    #[serde(default)]
    pub folded: bool,
}

impl SelectedItems {
    pub fn contains(&self, item_id: &str) -> bool {
        self.items.iter().any(|i| i.id == item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
