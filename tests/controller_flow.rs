// Host events driving the store through the controller.
use anyhow::{Result, anyhow};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tada::controller::TadaController;
use tada::storage::{MemoryStorage, StateStorage};
use tada::store::StoreEvent;
use tada::model::find_tag_line;
use tada::vault::{DocumentEvent, DocumentHost, TagLocation};
use tokio::sync::Notify;

#[derive(Default)]
struct MemoryHost {
    docs: Mutex<HashMap<String, String>>,
    // The next read waits on this before returning.
    gate: Mutex<Option<Arc<Notify>>>,
    // Documents the index has no entry for yet.
    unindexed: Mutex<HashSet<String>>,
}

impl MemoryHost {
    fn with_docs(docs: &[(&str, &str)]) -> Self {
        let host = Self::default();
        for (id, text) in docs {
            host.write(id, text);
        }
        host
    }

    fn write(&self, id: &str, text: &str) {
        self.docs
            .lock()
            .unwrap()
            .insert(id.to_string(), text.to_string());
    }

    fn delete(&self, id: &str) {
        self.docs.lock().unwrap().remove(id);
    }

    fn rename(&self, from: &str, to: &str) {
        let mut docs = self.docs.lock().unwrap();
        if let Some(text) = docs.remove(from) {
            docs.insert(to.to_string(), text);
        }
    }

    fn set_indexed(&self, id: &str, indexed: bool) {
        let mut unindexed = self.unindexed.lock().unwrap();
        if indexed {
            unindexed.remove(id);
        } else {
            unindexed.insert(id.to_string());
        }
    }

    fn gate_next_read(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }
}

impl DocumentHost for MemoryHost {
    fn list_documents(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.docs.lock().unwrap().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn read_document(&self, file_id: &str) -> Result<String> {
        let text = self.docs.lock().unwrap().get(file_id).cloned();
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        text.ok_or_else(|| anyhow!("no such document: {}", file_id))
    }

    fn locate_tag(&self, file_id: &str, text: &str) -> TagLocation {
        if self.unindexed.lock().unwrap().contains(file_id) {
            return TagLocation::NotIndexed;
        }
        find_tag_line(text).into()
    }
}

fn controller(host: MemoryHost) -> (TadaController<MemoryHost>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let controller = TadaController::load(Arc::new(host), storage.clone());
    (controller, storage)
}

async fn contents(controller: &TadaController<MemoryHost>, id: &str) -> Option<Vec<(String, bool)>> {
    let store = controller.store.lock().await;
    store
        .items_for_file(id)
        .map(|items| items.iter().map(|i| (i.content.clone(), i.checked)).collect())
}

async fn first_item_id(controller: &TadaController<MemoryHost>, id: &str) -> String {
    controller.store.lock().await.items_for_file(id).unwrap()[0]
        .id
        .clone()
}

#[tokio::test]
async fn test_refresh_all_skips_untagged_documents() {
    let host = MemoryHost::with_docs(&[
        ("Notes.md", "# Notes\n\nIntro\n#tada\n- [ ] task1\n- [X] task2\n\n"),
        ("Plain.md", "- [ ] not under a tag"),
    ]);
    let (controller, storage) = controller(host);

    controller.refresh_all().await.unwrap();

    assert_eq!(
        contents(&controller, "Notes.md").await,
        Some(vec![(" task1".to_string(), false), (" task2".to_string(), true)])
    );
    assert_eq!(contents(&controller, "Plain.md").await, None);
    assert!(storage.load().unwrap().unwrap().contains("itemsForFile"));
}

#[tokio::test]
async fn test_modify_event_updates_pins() {
    let (controller, storage) = controller(MemoryHost::with_docs(&[("a.md", "#tada\n- [ ] one")]));
    controller.refresh_all().await.unwrap();

    let id = first_item_id(&controller, "a.md").await;
    assert!(controller.select_item("a.md", &id).await.unwrap());
    assert!(!controller.select_item("a.md", &id).await.unwrap());
    assert!(!controller.select_item("a.md", "no-such-id").await.unwrap());

    controller.host().write("a.md", "#tada\n- [x] one");
    controller
        .handle_event(DocumentEvent::Modified("a.md".to_string()))
        .await;

    {
        let store = controller.store.lock().await;
        let pinned = store.selected_items_for_file("a.md").unwrap();
        assert_eq!(pinned.items.len(), 1);
        assert!(pinned.items[0].checked);
    }

    // Pins were persisted with the reconciled state.
    let blob = storage.load().unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
    assert_eq!(
        value["selectedItemsForFile"]["a.md"]["items"][0]["checked"],
        true
    );
}

#[tokio::test]
async fn test_tag_removed_empties_document() {
    let (controller, _) = controller(MemoryHost::with_docs(&[("a.md", "#tada\n- [ ] one")]));
    controller.refresh_all().await.unwrap();
    let id = first_item_id(&controller, "a.md").await;
    controller.select_item("a.md", &id).await.unwrap();

    controller.host().write("a.md", "- [ ] one");
    controller
        .handle_event(DocumentEvent::Modified("a.md".to_string()))
        .await;

    let store = controller.store.lock().await;
    assert!(store.items_for_file("a.md").is_none());
    assert_eq!(store.selections().count(), 0);
}

#[tokio::test]
async fn test_delete_and_rename_events() {
    let (controller, _) = controller(MemoryHost::with_docs(&[
        ("a.md", "#tada\n- [ ] one"),
        ("b.md", "#tada\n- [ ] two"),
    ]));
    controller.refresh_all().await.unwrap();
    let id = first_item_id(&controller, "b.md").await;
    controller.select_item("b.md", &id).await.unwrap();

    controller.host().delete("a.md");
    controller
        .handle_event(DocumentEvent::Deleted("a.md".to_string()))
        .await;
    assert_eq!(contents(&controller, "a.md").await, None);

    controller.host().rename("b.md", "c.md");
    controller
        .handle_event(DocumentEvent::Renamed {
            from: "b.md".to_string(),
            to: "c.md".to_string(),
        })
        .await;

    assert_eq!(contents(&controller, "b.md").await, None);
    assert_eq!(
        contents(&controller, "c.md").await,
        Some(vec![(" two".to_string(), false)])
    );
    // Pins do not follow a rename.
    let store = controller.store.lock().await;
    assert!(store.selected_items_for_file("b.md").is_none());
    assert!(store.selected_items_for_file("c.md").is_none());
}

#[tokio::test]
async fn test_refresh_all_drops_vanished_documents() {
    let (controller, _) = controller(MemoryHost::with_docs(&[("a.md", "#tada\n- [ ] one")]));
    controller.refresh_all().await.unwrap();

    controller.host().delete("a.md");
    controller.refresh_all().await.unwrap();

    assert_eq!(contents(&controller, "a.md").await, None);
}

#[tokio::test]
async fn test_stale_read_is_discarded() {
    let host = MemoryHost::with_docs(&[("a.md", "#tada\n- [ ] old")]);
    let gate = host.gate_next_read();
    let (controller, _) = controller(host);

    let slow = controller.refresh_document("a.md");
    let fast = async {
        controller.host().write("a.md", "#tada\n- [ ] new");
        controller.refresh_document("a.md").await;
        gate.notify_one();
    };
    tokio::join!(slow, fast);

    assert_eq!(
        contents(&controller, "a.md").await,
        Some(vec![(" new".to_string(), false)])
    );
}

#[tokio::test]
async fn test_deselect_and_fold() {
    let (controller, _) = controller(MemoryHost::with_docs(&[("a.md", "#tada\n- [ ] one")]));
    controller.refresh_all().await.unwrap();
    let id = first_item_id(&controller, "a.md").await;

    assert_eq!(controller.toggle_folded("a.md").await.unwrap(), None);
    controller.select_item("a.md", &id).await.unwrap();
    assert_eq!(controller.toggle_folded("a.md").await.unwrap(), Some(true));

    assert!(controller.deselect_item("a.md", &id).await.unwrap());
    assert!(!controller.deselect_item("a.md", &id).await.unwrap());
    // Emptied selections are pruned by the controller.
    assert!(
        controller
            .store
            .lock()
            .await
            .selected_items_for_file("a.md")
            .is_none()
    );
}

#[tokio::test]
async fn test_subscribers_see_selection_changes() {
    let (controller, _) = controller(MemoryHost::with_docs(&[("a.md", "#tada\n- [ ] one")]));
    let mut rx = controller.subscribe().await;
    controller.refresh_all().await.unwrap();
    let id = first_item_id(&controller, "a.md").await;
    controller.select_item("a.md", &id).await.unwrap();

    assert_eq!(rx.recv().await, Some(StoreEvent::ItemsChanged("a.md".to_string())));
    assert_eq!(
        rx.recv().await,
        Some(StoreEvent::SelectionChanged("a.md".to_string()))
    );
}

#[tokio::test]
async fn test_restart_restores_state() {
    let storage = Arc::new(MemoryStorage::new());
    let host = Arc::new(MemoryHost::with_docs(&[("a.md", "#tada\n- [ ] one")]));

    let first = TadaController::load(host.clone(), storage.clone());
    first.refresh_all().await.unwrap();
    let id = first_item_id(&first, "a.md").await;
    first.select_item("a.md", &id).await.unwrap();
    first.shutdown().await.unwrap();

    let second = TadaController::load(host, storage.clone());
    let store = second.store.lock().await;
    assert!(store.is_selected("a.md", &id));
}

#[tokio::test]
async fn test_malformed_state_starts_empty() {
    let storage = Arc::new(MemoryStorage::with_blob("{ definitely not json"));
    let controller = TadaController::load(Arc::new(MemoryHost::default()), storage);
    assert!(controller.store.lock().await.items_by_file().is_empty());
}

#[tokio::test]
async fn test_unindexed_document_keeps_pins_after_restart() {
    let storage = Arc::new(MemoryStorage::new());
    let host = Arc::new(MemoryHost::with_docs(&[("a.md", "#tada\n- [ ] one")]));

    let first = TadaController::load(host.clone(), storage.clone());
    first.refresh_all().await.unwrap();
    let id = first_item_id(&first, "a.md").await;
    first.select_item("a.md", &id).await.unwrap();
    first.shutdown().await.unwrap();

    // The index is still being built when the first change arrives.
    host.set_indexed("a.md", false);
    let second = TadaController::load(host.clone(), storage.clone());
    second
        .handle_event(DocumentEvent::Modified("a.md".to_string()))
        .await;
    assert!(second.store.lock().await.is_selected("a.md", &id));
    assert!(storage.load().unwrap().unwrap().contains(&id));

    host.set_indexed("a.md", true);
    host.write("a.md", "#tada\n- [x] one");
    second
        .handle_event(DocumentEvent::Modified("a.md".to_string()))
        .await;

    let store = second.store.lock().await;
    let pinned = store.selected_items_for_file("a.md").unwrap();
    assert_eq!(pinned.items.len(), 1);
    assert!(pinned.items[0].checked);
}

#[tokio::test]
async fn test_read_error_keeps_items_and_pins() {
    let (controller, _) = controller(MemoryHost::with_docs(&[("a.md", "#tada\n- [ ] one")]));
    controller.refresh_all().await.unwrap();
    let id = first_item_id(&controller, "a.md").await;
    controller.select_item("a.md", &id).await.unwrap();

    // Unreadable for a moment, with no delete reported.
    controller.host().delete("a.md");
    controller
        .handle_event(DocumentEvent::Modified("a.md".to_string()))
        .await;

    let store = controller.store.lock().await;
    assert_eq!(store.items_for_file("a.md").unwrap().len(), 1);
    assert!(store.is_selected("a.md", &id));
}
