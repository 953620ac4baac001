//! Sled-backed NodeRecord store
//!
//! Layout, one sled tree per keyspace:
//!
//! * `nodes`     id -> bincode(NodeRecord)
//! * `by_parent` parent ++ 0x00 ++ id -> ()
//! * `by_name`   parent ++ 0x00 ++ name -> id
//! * `blobs`     id -> file content
//!
//! Every write touching more than one keyspace runs in a single sled
//! transaction. Blocking work is moved off the async executor with
//! `spawn_blocking`.

use crate::concurrency::ParentLockManager;
use crate::config::StorageConfig;
use crate::error::{ApiError, StorageError};
use crate::store::{validate_name, NodeRecord, NodeRecordStore};
use crate::tree::hasher::verify_payload;
use crate::types::{now_millis, NodeId};
use async_trait::async_trait;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Transactional, Tree};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

const NODES_TREE: &str = "nodes";
const BY_PARENT_TREE: &str = "by_parent";
const BY_NAME_TREE: &str = "by_name";
const BLOBS_TREE: &str = "blobs";

const KEY_SEPARATOR: u8 = 0x00;

type TxResult<T> = Result<T, ConflictableTransactionError<ApiError>>;

fn scoped_key(parent_id: &NodeId, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parent_id.as_bytes().len() + 1 + suffix.len());
    key.extend_from_slice(parent_id.as_bytes());
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(suffix);
    key
}

fn child_key(parent_id: &NodeId, id: &NodeId) -> Vec<u8> {
    scoped_key(parent_id, id.as_bytes())
}

fn name_key(parent_id: &NodeId, name: &str) -> Vec<u8> {
    scoped_key(parent_id, name.as_bytes())
}

fn children_prefix(parent_id: &NodeId) -> Vec<u8> {
    scoped_key(parent_id, &[])
}

fn encode(record: &NodeRecord) -> Result<Vec<u8>, StorageError> {
    Ok(bincode::serialize(record)?)
}

fn decode(bytes: &[u8]) -> Result<NodeRecord, StorageError> {
    Ok(bincode::deserialize(bytes)?)
}

fn abort<T>(err: ApiError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

fn decode_in_tx(bytes: &[u8]) -> TxResult<NodeRecord> {
    decode(bytes).map_err(|e| ConflictableTransactionError::Abort(ApiError::from(e)))
}

fn encode_in_tx(record: &NodeRecord) -> TxResult<Vec<u8>> {
    encode(record).map_err(|e| ConflictableTransactionError::Abort(ApiError::from(e)))
}

fn tx_error(err: TransactionError<ApiError>) -> ApiError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => ApiError::from(e),
    }
}

/// Persistent node store on a sled database.
///
/// Cloning is cheap and yields a handle onto the same database and lock table.
#[derive(Clone)]
pub struct SledNodeRecordStore {
    db: sled::Db,
    nodes: Tree,
    by_parent: Tree,
    by_name: Tree,
    blobs: Tree,
    locks: ParentLockManager,
}

impl SledNodeRecordStore {
    /// Open (or create) a store at `path` with default tuning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let db = sled::Config::new().path(path.as_ref()).open()?;
        Self::from_db(db)
    }

    /// Open the store described by the storage configuration.
    pub fn open_with(config: &StorageConfig) -> Result<Self, ApiError> {
        let path = config.resolve_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::from)?;
        }
        let db = sled::Config::new()
            .path(&path)
            .cache_capacity(config.cache_capacity_bytes)
            .flush_every_ms(config.flush_every_ms)
            .open()?;
        info!(path = %path.display(), "Opened node store");
        Self::from_db(db)
    }

    /// Throwaway store removed when the last handle is dropped.
    pub fn temporary() -> Result<Self, ApiError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, ApiError> {
        Ok(Self {
            nodes: db.open_tree(NODES_TREE)?,
            by_parent: db.open_tree(BY_PARENT_TREE)?,
            by_name: db.open_tree(BY_NAME_TREE)?,
            blobs: db.open_tree(BLOBS_TREE)?,
            locks: ParentLockManager::new(),
            db,
        })
    }

    /// Flush all dirty buffers to disk.
    pub async fn flush(&self) -> Result<usize, ApiError> {
        Ok(self.db.flush_async().await?)
    }

    /// Total number of records.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&SledNodeRecordStore) -> Result<T, ApiError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }

    fn record(&self, id: &NodeId) -> Result<Option<NodeRecord>, ApiError> {
        match self.nodes.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn child_ids(&self, parent_id: &NodeId) -> Result<Vec<NodeId>, ApiError> {
        let prefix = children_prefix(parent_id);
        let mut ids = Vec::new();
        for entry in self.by_parent.scan_prefix(&prefix) {
            let (key, _) = entry?;
            let raw = &key[prefix.len()..];
            let id = String::from_utf8(raw.to_vec()).map_err(|e| {
                StorageError::Corrupt(format!("non UTF-8 id in parent index: {}", e))
            })?;
            ids.push(NodeId::from(id));
        }
        Ok(ids)
    }

    fn children(&self, parent_id: &NodeId) -> Result<Vec<NodeRecord>, ApiError> {
        let mut records = Vec::new();
        for id in self.child_ids(parent_id)? {
            match self.record(&id)? {
                Some(record) => records.push(record),
                None => warn!(
                    parent_id = %parent_id,
                    node_id = %id,
                    "Parent index entry without record, skipping"
                ),
            }
        }
        Ok(records)
    }

    fn insert_record(
        &self,
        record: NodeRecord,
        content: Option<Vec<u8>>,
    ) -> Result<NodeRecord, ApiError> {
        record.validate(content.as_deref())?;

        let lock = self.locks.get_lock(&record.parent_id);
        let _guard = lock.write();

        let encoded = encode(&record)?;
        let id_key = record.id.as_bytes().to_vec();
        let parent_key = child_key(&record.parent_id, &record.id);
        let sibling_key = name_key(&record.parent_id, &record.name);

        (&self.nodes, &self.by_parent, &self.by_name, &self.blobs)
            .transaction(|(nodes, by_parent, by_name, blobs)| {
                if !record.parent_id.is_root() {
                    match nodes.get(record.parent_id.as_bytes())? {
                        None => {
                            return abort(ApiError::NotFound(format!(
                                "parent folder {}",
                                record.parent_id
                            )))
                        }
                        Some(bytes) => {
                            if !decode_in_tx(&bytes)?.is_folder() {
                                return abort(ApiError::ValidationError(format!(
                                    "parent {} is not a folder",
                                    record.parent_id
                                )));
                            }
                        }
                    }
                }
                if nodes.get(id_key.as_slice())?.is_some() {
                    return abort(ApiError::ValidationError(format!(
                        "node id {} already exists",
                        record.id
                    )));
                }
                if by_name.get(sibling_key.as_slice())?.is_some() {
                    return abort(ApiError::NameConflict {
                        name: record.name.clone(),
                        parent: record.parent_id.to_string(),
                    });
                }

                nodes.insert(id_key.as_slice(), encoded.as_slice())?;
                by_parent.insert(parent_key.as_slice(), Vec::<u8>::new())?;
                by_name.insert(sibling_key.as_slice(), id_key.as_slice())?;
                if let Some(bytes) = &content {
                    blobs.insert(id_key.as_slice(), bytes.as_slice())?;
                }
                Ok(())
            })
            .map_err(tx_error)?;

        info!(
            node_id = %record.id,
            parent_id = %record.parent_id,
            name = %record.name,
            kind = ?record.kind,
            "Created node"
        );
        Ok(record)
    }

    fn rename_record(&self, id: &NodeId, new_name: &str) -> Result<NodeRecord, ApiError> {
        validate_name(new_name)?;

        let current = self
            .record(id)?
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        if current.name == new_name {
            return Ok(current);
        }

        let lock = self.locks.get_lock(&current.parent_id);
        let _guard = lock.write();

        let id_key = id.as_bytes().to_vec();
        let renamed = (&self.nodes, &self.by_name)
            .transaction(|(nodes, by_name)| {
                let mut node = match nodes.get(id_key.as_slice())? {
                    Some(bytes) => decode_in_tx(&bytes)?,
                    None => return abort(ApiError::NotFound(id.to_string())),
                };
                if node.name == new_name {
                    return Ok(node);
                }

                let new_key = name_key(&node.parent_id, new_name);
                if let Some(owner) = by_name.get(new_key.as_slice())? {
                    if &owner[..] != id_key.as_slice() {
                        return abort(ApiError::NameConflict {
                            name: new_name.to_string(),
                            parent: node.parent_id.to_string(),
                        });
                    }
                }

                by_name.remove(name_key(&node.parent_id, &node.name))?;
                by_name.insert(new_key.as_slice(), id_key.as_slice())?;

                node.name = new_name.to_string();
                node.updated_at = now_millis().max(node.updated_at + 1);
                nodes.insert(id_key.as_slice(), encode_in_tx(&node)?)?;
                Ok(node)
            })
            .map_err(tx_error)?;

        info!(node_id = %id, name = %renamed.name, "Renamed node");
        Ok(renamed)
    }

    /// Remove one record with its index entries and content.
    ///
    /// When the record is already gone, a leftover parent index entry under
    /// `listed_under` is cleared instead.
    fn remove_record(&self, id: &NodeId, listed_under: Option<&NodeId>) -> Result<bool, ApiError> {
        let id_key = id.as_bytes().to_vec();
        (&self.nodes, &self.by_parent, &self.by_name, &self.blobs)
            .transaction(|(nodes, by_parent, by_name, blobs)| {
                let node = match nodes.get(id_key.as_slice())? {
                    Some(bytes) => decode_in_tx(&bytes)?,
                    None => {
                        if let Some(parent_id) = listed_under {
                            by_parent.remove(child_key(parent_id, id))?;
                        }
                        return Ok(false);
                    }
                };

                nodes.remove(id_key.as_slice())?;
                by_parent.remove(child_key(&node.parent_id, id))?;
                let sibling_key = name_key(&node.parent_id, &node.name);
                if let Some(owner) = by_name.get(sibling_key.as_slice())? {
                    if &owner[..] == id_key.as_slice() {
                        by_name.remove(sibling_key)?;
                    }
                }
                blobs.remove(id_key.as_slice())?;
                Ok(true)
            })
            .map_err(tx_error)
    }

    /// Depth-first removal driven by an explicit work-list.
    ///
    /// A node is removed only once it has no children left, so an interrupted
    /// cascade never leaves a child without its parent record.
    fn remove_subtree(&self, id: &NodeId) -> Result<Vec<NodeId>, ApiError> {
        if self.record(id)?.is_none() {
            debug!(node_id = %id, "Delete of absent node, nothing to do");
            return Ok(Vec::new());
        }

        let mut removed = Vec::new();
        // (node, parent it was listed under)
        let mut stack: Vec<(NodeId, Option<NodeId>)> = vec![(id.clone(), None)];
        while let Some((current, listed_under)) = stack.last().cloned() {
            let children = self.child_ids(&current)?;
            if !children.is_empty() {
                stack.extend(
                    children
                        .into_iter()
                        .map(|child| (child, Some(current.clone()))),
                );
                continue;
            }

            // Creates into `current` hold this lock, so re-check under it
            let lock = self.locks.get_lock(&current);
            {
                let _guard = lock.write();
                if !self.child_ids(&current)?.is_empty() {
                    continue;
                }
                if self.remove_record(&current, listed_under.as_ref())? {
                    removed.push(current.clone());
                }
            }
            drop(lock);
            self.locks.release(&current);
            stack.pop();
        }

        info!(
            node_id = %id,
            removed = removed.len(),
            lock_scopes = self.locks.tracked(),
            "Deleted subtree"
        );
        Ok(removed)
    }

    fn ancestors(&self, id: &NodeId) -> Result<Vec<NodeRecord>, ApiError> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = id.clone();

        loop {
            if !visited.insert(current.clone()) {
                warn!(node_id = %id, at = %current, "Parent chain revisits a node, truncating");
                break;
            }
            let Some(node) = self.record(&current)? else {
                if !path.is_empty() {
                    warn!(node_id = %id, missing = %current, "Ancestor missing, path truncated");
                }
                break;
            };
            let parent_id = node.parent_id.clone();
            path.push(node);
            if parent_id.is_root() {
                break;
            }
            current = parent_id;
        }

        path.reverse();
        Ok(path)
    }

    fn scan_names(&self, query: &str) -> Result<Vec<NodeRecord>, ApiError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in self.nodes.iter() {
            let (_, bytes) = entry?;
            let record = decode(&bytes)?;
            if record.name.to_lowercase().contains(&needle) {
                matches.push(record);
            }
        }
        debug!(query, matches = matches.len(), "Searched node names");
        Ok(matches)
    }

    fn payload_bytes(&self, id: &NodeId) -> Result<Vec<u8>, ApiError> {
        let record = self
            .record(id)?
            .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
        let Some(payload) = record.payload else {
            return Err(ApiError::ValidationError(format!(
                "{} is a folder and has no content",
                record.name
            )));
        };
        let bytes = self.blobs.get(id.as_bytes())?.ok_or_else(|| {
            StorageError::Corrupt(format!("content missing for file {}", id))
        })?;
        if !verify_payload(&payload.handle, &bytes) {
            return Err(StorageError::Corrupt(format!("content hash mismatch for file {}", id)).into());
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl NodeRecordStore for SledNodeRecordStore {
    async fn list_children(&self, parent_id: &NodeId) -> Result<Vec<NodeRecord>, ApiError> {
        let parent_id = parent_id.clone();
        self.run(move |store| store.children(&parent_id)).await
    }

    async fn get_by_id(&self, id: &NodeId) -> Result<Option<NodeRecord>, ApiError> {
        let id = id.clone();
        self.run(move |store| store.record(&id)).await
    }

    async fn create(
        &self,
        record: NodeRecord,
        content: Option<Vec<u8>>,
    ) -> Result<NodeRecord, ApiError> {
        self.run(move |store| store.insert_record(record, content))
            .await
    }

    async fn rename(&self, id: &NodeId, new_name: &str) -> Result<NodeRecord, ApiError> {
        let id = id.clone();
        let new_name = new_name.to_string();
        self.run(move |store| store.rename_record(&id, &new_name))
            .await
    }

    async fn delete(&self, id: &NodeId) -> Result<Vec<NodeId>, ApiError> {
        let id = id.clone();
        self.run(move |store| store.remove_subtree(&id)).await
    }

    async fn resolve_path(&self, id: &NodeId) -> Result<Vec<NodeRecord>, ApiError> {
        let id = id.clone();
        self.run(move |store| store.ancestors(&id)).await
    }

    async fn search(&self, query: &str) -> Result<Vec<NodeRecord>, ApiError> {
        let query = query.to_string();
        self.run(move |store| store.scan_names(&query)).await
    }

    async fn read_payload(&self, id: &NodeId) -> Result<Vec<u8>, ApiError> {
        let id = id.clone();
        self.run(move |store| store.payload_bytes(&id)).await
    }
}
