//! NodeRecord Store
//!
//! The node model and the store interface. Every invariant on the hierarchy
//! (unique sibling names, existing parents, cascading deletes) is enforced by
//! the store implementation, never by its callers.

pub mod persistence;

use crate::error::ApiError;
use crate::tree::hasher::compute_payload_handle;
use crate::types::{now_millis, NodeId, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use persistence::SledNodeRecordStore;

/// Node kind, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// Metadata of a file's content. The bytes live beside the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    /// Opaque handle (content hash) handed to viewers
    pub handle: String,
    pub size: u64,
    pub mime_type: String,
}

/// NodeRecord: a file or folder in the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub parent_id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub payload: Option<FilePayload>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl NodeRecord {
    /// New folder record with a freshly generated id.
    pub fn new_folder(parent_id: NodeId, name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: NodeId::generate(),
            parent_id,
            name: name.into(),
            kind: NodeKind::Folder,
            payload: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// New file record describing `content`.
    pub fn new_file(
        id: NodeId,
        parent_id: NodeId,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        content: &[u8],
    ) -> Self {
        let now = now_millis();
        Self {
            id,
            parent_id,
            name: name.into(),
            kind: NodeKind::File,
            payload: Some(FilePayload {
                handle: compute_payload_handle(content),
                size: content.len() as u64,
                mime_type: mime_type.into(),
            }),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Check the record (and the content it will be stored with) before insertion.
    pub fn validate(&self, content: Option<&[u8]>) -> Result<(), ApiError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ApiError::ValidationError("Node id cannot be empty".to_string()));
        }
        if self.id.is_root() {
            return Err(ApiError::ValidationError(
                "Node id cannot be the root sentinel".to_string(),
            ));
        }
        validate_name(&self.name)?;

        match (self.kind, &self.payload, content) {
            (NodeKind::Folder, None, None) => Ok(()),
            (NodeKind::Folder, _, _) => Err(ApiError::ValidationError(format!(
                "Folder '{}' cannot carry a payload",
                self.name
            ))),
            (NodeKind::File, Some(payload), Some(bytes)) => {
                if payload.size != bytes.len() as u64 {
                    return Err(ApiError::ValidationError(format!(
                        "File '{}' declares {} bytes but {} were supplied",
                        self.name,
                        payload.size,
                        bytes.len()
                    )));
                }
                Ok(())
            }
            (NodeKind::File, _, _) => Err(ApiError::ValidationError(format!(
                "File '{}' requires a payload and its content",
                self.name
            ))),
        }
    }
}

/// Names must contain something other than whitespace.
pub fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::ValidationError("Name cannot be empty".to_string()));
    }
    Ok(())
}

/// NodeRecord Store interface
///
/// Every method is a potential suspension point (durable I/O).
#[async_trait]
pub trait NodeRecordStore: Send + Sync {
    /// All records whose parent is `parent_id` (use the root sentinel for top level).
    async fn list_children(&self, parent_id: &NodeId) -> Result<Vec<NodeRecord>, ApiError>;

    async fn get_by_id(&self, id: &NodeId) -> Result<Option<NodeRecord>, ApiError>;

    /// Insert a new record. Files must be accompanied by their content.
    async fn create(
        &self,
        record: NodeRecord,
        content: Option<Vec<u8>>,
    ) -> Result<NodeRecord, ApiError>;

    async fn rename(&self, id: &NodeId, new_name: &str) -> Result<NodeRecord, ApiError>;

    /// Remove a node and, for folders, its whole subtree.
    ///
    /// Returns the ids actually removed, descendants first. Missing ids succeed
    /// with an empty list.
    async fn delete(&self, id: &NodeId) -> Result<Vec<NodeId>, ApiError>;

    /// Ancestor chain from the root-most ancestor down to `id` itself.
    ///
    /// Stops early at the first missing ancestor instead of failing.
    async fn resolve_path(&self, id: &NodeId) -> Result<Vec<NodeRecord>, ApiError>;

    /// Case-insensitive substring match on names. Blank queries match nothing.
    async fn search(&self, query: &str) -> Result<Vec<NodeRecord>, ApiError>;

    /// Content bytes of a file node.
    async fn read_payload(&self, id: &NodeId) -> Result<Vec<u8>, ApiError>;
}
