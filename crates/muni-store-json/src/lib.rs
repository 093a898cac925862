//! muni-store-json
//!
//! The authoritative node store: an in-process, thread-safe map with
//! optional JSON-file persistence. All version guards run under the write
//! lock at commit time, so only one writer can advance a node from
//! version V to V + 1; readers clone snapshots under the read lock and
//! never block unrelated mutations for the duration of a query.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use muni_core::{CasOutcome, CoreError, NodeChanges, NodeStore};
use muni_domain::AccountNode;

const STORE_FORMAT_VERSION: u32 = 1;
const TMP_SUFFIX: &str = "tmp";

/// Filesystem-backed JSON node store. `in_memory` stores skip persistence
/// entirely; path-backed stores rewrite the file atomically after every
/// committed mutation.
pub struct JsonNodeStore {
    nodes: RwLock<HashMap<Uuid, AccountNode>>,
    path: Option<PathBuf>,
}

impl JsonNodeStore {
    pub fn in_memory() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    /// Opens a store at `path`, loading the existing document when one is
    /// present.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let nodes = if path.exists() {
            let document = load_document(&path)?;
            document
                .nodes
                .into_iter()
                .map(|node| (node.id, node))
                .collect()
        } else {
            HashMap::new()
        };
        Ok(Self {
            nodes: RwLock::new(nodes),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.read_nodes().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seeds the store with an initial node set, bypassing version guards.
    /// Intended for bootstrap and test setup, not for live mutations.
    pub fn seed(&self, nodes: Vec<AccountNode>) -> Result<(), CoreError> {
        let mut guard = self.write_nodes()?;
        for node in nodes {
            guard.insert(node.id, node);
        }
        self.persist_guarded(&guard)
    }

    /// Rewrites the JSON document (tmp file + rename). No-op for
    /// in-memory stores.
    pub fn persist(&self) -> Result<(), CoreError> {
        let guard = self.read_nodes()?;
        self.persist_guarded(&guard)
    }

    /// Persists the given node map while the caller still holds the lock.
    /// Mutators call this before releasing the write guard so a failed
    /// write can roll the in-memory state back and the commit stays
    /// all-or-nothing.
    fn persist_guarded(&self, nodes: &HashMap<Uuid, AccountNode>) -> Result<(), CoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut sorted: Vec<AccountNode> = nodes.values().cloned().collect();
        sorted.sort_by(|a, b| {
            (a.period_id, &a.account_number).cmp(&(b.period_id, &b.account_number))
        });
        let document = StoreDocument {
            format_version: STORE_FORMAT_VERSION,
            saved_at: Utc::now(),
            nodes: sorted,
        };
        save_document(&document, path)?;
        debug!(path = %path.display(), nodes = document.nodes.len(), "store persisted");
        Ok(())
    }

    fn read_nodes(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, AccountNode>>, CoreError> {
        self.nodes
            .read()
            .map_err(|_| CoreError::Storage("store lock poisoned".into()))
    }

    fn write_nodes(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, AccountNode>>, CoreError> {
        self.nodes
            .write()
            .map_err(|_| CoreError::Storage("store lock poisoned".into()))
    }
}

impl NodeStore for JsonNodeStore {
    fn snapshot(&self, period_id: Uuid) -> Result<Vec<AccountNode>, CoreError> {
        let guard = self.read_nodes()?;
        let mut nodes: Vec<AccountNode> = guard
            .values()
            .filter(|node| node.period_id == period_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        Ok(nodes)
    }

    fn fetch(&self, id: Uuid) -> Result<Option<AccountNode>, CoreError> {
        Ok(self.read_nodes()?.get(&id).cloned())
    }

    fn insert(&self, node: AccountNode) -> Result<AccountNode, CoreError> {
        let mut guard = self.write_nodes()?;
        if guard.contains_key(&node.id) {
            return Err(CoreError::DuplicateNode(node.id));
        }
        if guard.values().any(|existing| {
            existing.period_id == node.period_id
                && existing.account_number == node.account_number
        }) {
            return Err(CoreError::DuplicateNumber(node.account_number.clone()));
        }
        guard.insert(node.id, node.clone());
        if let Err(err) = self.persist_guarded(&guard) {
            guard.remove(&node.id);
            return Err(err);
        }
        Ok(node)
    }

    fn compare_and_update(
        &self,
        id: Uuid,
        expected_version: u64,
        changes: &NodeChanges,
    ) -> Result<CasOutcome, CoreError> {
        let mut guard = self.write_nodes()?;

        // Renumbering collisions are checked before the version guard;
        // both are commit-time decisions under the same lock.
        if let Some(number) = &changes.account_number {
            let node = guard.get(&id).ok_or(CoreError::NotFound(id))?;
            if guard.values().any(|existing| {
                existing.id != id
                    && existing.period_id == node.period_id
                    && existing.account_number == *number
            }) {
                return Err(CoreError::DuplicateNumber(number.clone()));
            }
            if guard.values().any(|existing| existing.parent_id == Some(id)) {
                return Err(CoreError::Validation(
                    "cannot renumber a node that still has children".into(),
                ));
            }
        }

        let node = guard.get_mut(&id).ok_or(CoreError::NotFound(id))?;
        if node.version != expected_version {
            return Ok(CasOutcome::Stale(node.clone()));
        }
        let prior = node.clone();
        changes.apply_to(node);
        node.version += 1;
        let committed = node.clone();
        if let Err(err) = self.persist_guarded(&guard) {
            guard.insert(id, prior);
            return Err(err);
        }
        Ok(CasOutcome::Committed(committed))
    }

    fn compare_and_delete(
        &self,
        id: Uuid,
        expected_version: u64,
    ) -> Result<CasOutcome, CoreError> {
        let mut guard = self.write_nodes()?;
        if guard.values().any(|node| node.parent_id == Some(id)) {
            return Err(CoreError::Validation(
                "cannot delete a node that still has children".into(),
            ));
        }
        let node = guard.get(&id).ok_or(CoreError::NotFound(id))?;
        if node.version != expected_version {
            return Ok(CasOutcome::Stale(node.clone()));
        }
        let removed = guard.remove(&id).ok_or(CoreError::NotFound(id))?;
        if let Err(err) = self.persist_guarded(&guard) {
            guard.insert(removed.id, removed);
            return Err(err);
        }
        Ok(CasOutcome::Committed(removed))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    format_version: u32,
    saved_at: DateTime<Utc>,
    nodes: Vec<AccountNode>,
}

fn load_document(path: &Path) -> Result<StoreDocument, CoreError> {
    let data = fs::read_to_string(path)?;
    let document: StoreDocument =
        serde_json::from_str(&data).map_err(|err| CoreError::Storage(err.to_string()))?;
    if document.format_version > STORE_FORMAT_VERSION {
        return Err(CoreError::Storage(format!(
            "store document format {} is newer than supported {}",
            document.format_version, STORE_FORMAT_VERSION
        )));
    }
    Ok(document)
}

fn save_document(document: &StoreDocument, path: &Path) -> Result<(), CoreError> {
    let data = serde_json::to_string_pretty(document)
        .map_err(|err| CoreError::Storage(err.to_string()))?;
    let tmp = tmp_path(path);
    write_atomic(&tmp, &data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}
