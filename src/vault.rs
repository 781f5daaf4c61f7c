/*
 * tada/src/vault.rs
 *
 * Document host abstraction and the filesystem vault implementation.
 *
 * The controller never touches the filesystem directly: it lists, reads and
 * locates tags through `DocumentHost`. `FsVault` is the host used by the CLI,
 * a plain directory tree of markdown files.
 */

use crate::model::find_tag_line;
use anyhow::{Context, Result};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Change notifications delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    Created(String),
    Modified(String),
    Renamed { from: String, to: String },
    Deleted(String),
}

/// Where a document's checklist tag sits, as far as the host knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagLocation {
    Found(usize),
    /// The document is indexed and carries no tag.
    Absent,
    /// The host has no index entry yet; nothing can be concluded.
    NotIndexed,
}

impl From<Option<usize>> for TagLocation {
    fn from(line: Option<usize>) -> Self {
        match line {
            Some(line) => TagLocation::Found(line),
            None => TagLocation::Absent,
        }
    }
}

pub trait DocumentHost: Send + Sync {
    /// Ids of every markdown document the host knows about.
    fn list_documents(&self) -> Result<Vec<String>>;

    fn read_document(&self, file_id: &str) -> impl Future<Output = Result<String>> + Send;

    /// Line of the checklist tag. Hosts with their own index override this
    /// and report `NotIndexed` until the index has an entry for `file_id`.
    fn locate_tag(&self, _file_id: &str, text: &str) -> TagLocation {
        find_tag_line(text).into()
    }
}

/// A directory of markdown files. Document ids are `/`-separated paths
/// relative to the root.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, file_id: &str) -> PathBuf {
        file_id
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn collect(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        let entries =
            fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }

            if entry.file_type()?.is_dir() {
                self.collect(&path, out)?;
            } else if path.extension().is_some_and(|ext| ext == "md")
                && let Ok(rel) = path.strip_prefix(&self.root)
            {
                let id = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(id);
            }
        }
        Ok(())
    }
}

impl DocumentHost for FsVault {
    fn list_documents(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        self.collect(&self.root, &mut ids)?;
        ids.sort();
        Ok(ids)
    }

    async fn read_document(&self, file_id: &str) -> Result<String> {
        let path = self.path_for(file_id);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read document {:?}", path))
    }
}
