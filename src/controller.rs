// File: src/controller.rs
//! Wires a document host, the checklist store and state storage together.
//!
//! The host reports document changes; the controller reads the document,
//! extracts the checklist below the tag and pushes the result into the store.
//! Presentation code talks to the store through the controller so that every
//! user-visible change is persisted.
use crate::model::{TADA_TAG, extract};
use crate::storage::StateStorage;
use crate::store::{ChecklistStore, StoreEvent};
use crate::vault::{DocumentEvent, DocumentHost, TagLocation};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

pub struct TadaController<H: DocumentHost> {
    pub store: Arc<Mutex<ChecklistStore>>,
    host: Arc<H>,
    storage: Arc<dyn StateStorage>,
    // Latest refresh issued per document; reads finishing for an older one are dropped.
    generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl<H: DocumentHost> Clone for TadaController<H> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            host: Arc::clone(&self.host),
            storage: Arc::clone(&self.storage),
            generations: Arc::clone(&self.generations),
        }
    }
}

impl<H: DocumentHost> TadaController<H> {
    pub fn new(store: ChecklistStore, host: Arc<H>, storage: Arc<dyn StateStorage>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            host,
            storage,
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Restores the persisted state. Unreadable state means an empty store.
    pub fn load(host: Arc<H>, storage: Arc<dyn StateStorage>) -> Self {
        let blob = match storage.load() {
            Ok(blob) => blob,
            Err(e) => {
                log::warn!("Could not load checklist state: {:#}", e);
                None
            }
        };
        let store = ChecklistStore::restore(blob.as_deref());
        Self::new(store, host, storage)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<StoreEvent> {
        self.store.lock().await.subscribe()
    }

    async fn next_generation(&self, file_id: &str) -> u64 {
        let mut generations = self.generations.lock().await;
        let generation = generations.entry(file_id.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    async fn is_current(&self, file_id: &str, generation: u64) -> bool {
        self.generations.lock().await.get(file_id).copied() == Some(generation)
    }

    /// Re-reads one document and records its checklist.
    ///
    /// Never fails. An untagged document has no items; a read error or a
    /// document the host has not indexed yet leaves the store untouched.
    pub async fn refresh_document(&self, file_id: &str) {
        let generation = self.next_generation(file_id).await;

        let text = match self.host.read_document(file_id).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Could not read {}, keeping its items: {:#}", file_id, e);
                return;
            }
        };

        let items = match self.host.locate_tag(file_id, &text) {
            TagLocation::Found(tag_line) => Some(extract(&text, tag_line + 1)),
            TagLocation::Absent => {
                log::debug!("No {} tag in {}", TADA_TAG, file_id);
                None
            }
            TagLocation::NotIndexed => {
                log::debug!("{} is not indexed yet, skipping", file_id);
                return;
            }
        };

        let mut store = self.store.lock().await;
        if !self.is_current(file_id, generation).await {
            log::debug!("Discarding stale read of {} (generation {})", file_id, generation);
            return;
        }

        match items {
            Some(items) => store.update_items(file_id, items),
            None => store.clear_items(file_id),
        }
    }

    /// Refreshes every document the host lists and forgets the ones that vanished.
    pub async fn refresh_all(&self) -> Result<()> {
        let ids = self.host.list_documents()?;
        let present: HashSet<&str> = ids.iter().map(String::as_str).collect();

        {
            let mut store = self.store.lock().await;
            let known: Vec<String> = store
                .files()
                .chain(store.selections_by_file().keys().map(String::as_str))
                .filter(|id| !present.contains(id))
                .map(str::to_string)
                .collect();
            for id in known {
                log::info!("{} no longer exists, dropping it", id);
                store.remove_file(&id);
            }
        }

        for id in &ids {
            self.refresh_document(id).await;
        }

        self.persist().await
    }

    pub async fn handle_event(&self, event: DocumentEvent) {
        log::debug!("Document event: {:?}", event);
        match event {
            DocumentEvent::Created(id) | DocumentEvent::Modified(id) => {
                self.refresh_document(&id).await;
            }
            DocumentEvent::Renamed { from, to } => {
                // Pins do not follow the document to its new id.
                self.forget(&from).await;
                self.refresh_document(&to).await;
            }
            DocumentEvent::Deleted(id) => {
                self.forget(&id).await;
            }
        }

        if let Err(e) = self.persist().await {
            log::warn!("Could not save checklist state: {:#}", e);
        }
    }

    async fn forget(&self, file_id: &str) {
        // Bump so an in-flight read cannot resurrect the document.
        self.next_generation(file_id).await;
        self.store.lock().await.remove_file(file_id);
    }

    /// Pins the item with `item_id`. Returns false if it is unknown or already pinned.
    pub async fn select_item(&self, file_id: &str, item_id: &str) -> Result<bool> {
        let selected = {
            let mut store = self.store.lock().await;
            let Some(item) = store.find_item(file_id, item_id).cloned() else {
                log::warn!("No item {} in {}", item_id, file_id);
                return Ok(false);
            };
            store.select_item(file_id, &item)
        };
        if selected {
            self.persist().await?;
        }
        Ok(selected)
    }

    pub async fn deselect_item(&self, file_id: &str, item_id: &str) -> Result<bool> {
        let removed = {
            let mut store = self.store.lock().await;
            let removed = store.deselect_item(file_id, item_id);
            store.prune_empty_selections();
            removed
        };
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    pub async fn toggle_folded(&self, file_id: &str) -> Result<Option<bool>> {
        let folded = self.store.lock().await.toggle_folded(file_id);
        if folded.is_some() {
            self.persist().await?;
        }
        Ok(folded)
    }

    pub async fn persist(&self) -> Result<()> {
        let blob = self.store.lock().await.serialize();
        self.storage.save(&blob)
    }

    /// Saves current state before the controller is dropped.
    pub async fn shutdown(self) -> Result<()> {
        log::info!("Saving checklist state on shutdown");
        self.persist().await
    }
}
