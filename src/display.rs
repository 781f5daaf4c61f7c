// File: ./src/display.rs
// Plain-text rendering of the checklist panel.
use crate::model::ChecklistItem;
use crate::store::ChecklistStore;

/// Basename of a document id without the `.md` extension.
pub fn file_label(file_id: &str) -> &str {
    let base = file_id.rsplit('/').next().unwrap_or(file_id);
    base.strip_suffix(".md").unwrap_or(base)
}

fn checkbox(item: &ChecklistItem) -> &'static str {
    if item.checked { "[x]" } else { "[ ]" }
}

/// Renders the items of one document, numbered from 1.
///
/// A document with no recorded items renders nothing and logs a warning.
pub fn render_file(store: &ChecklistStore, file_id: &str) -> String {
    let Some(items) = store.items_for_file(file_id) else {
        log::warn!("Nothing recorded for {}, cannot draw it", file_id);
        return String::new();
    };

    let mut out = String::new();
    out.push_str(&format!("#### {}\n", file_label(file_id)));
    for (idx, item) in items.iter().enumerate() {
        let pin = if store.is_selected(file_id, &item.id) {
            " *"
        } else {
            ""
        };
        out.push_str(&format!(
            "{:>3}. {} {}{}\n",
            idx + 1,
            checkbox(item),
            item.label(),
            pin
        ));
    }
    out
}

/// Renders every document with items, then the pinned list.
pub fn render_panel(store: &ChecklistStore) -> String {
    let mut out = String::new();

    for file_id in store.files() {
        if store.items_for_file(file_id).is_some_and(|i| i.is_empty()) {
            continue;
        }
        out.push_str(&render_file(store, file_id));
        out.push('\n');
    }

    let mut pinned = store.selections().peekable();
    if pinned.peek().is_some() {
        out.push_str("=== Pinned ===\n");
    }
    for (file_id, selection) in pinned {
        if selection.folded {
            out.push_str(&format!("> {} ({})\n", file_label(file_id), selection.len()));
            continue;
        }
        out.push_str(&format!("v {}\n", file_label(file_id)));
        for item in &selection.items {
            out.push_str(&format!("    {} {}\n", checkbox(item), item.label()));
        }
    }

    out
}
