//! Breadcrumb trails
//!
//! Thin composition over `NodeRecordStore::resolve_path` used by navigation.

use crate::error::ApiError;
use crate::store::{NodeRecord, NodeRecordStore};
use crate::types::NodeId;
use std::sync::Arc;

/// Produces the ancestor chain shown above a folder listing.
#[derive(Clone)]
pub struct PathResolver {
    store: Arc<dyn NodeRecordStore>,
}

impl PathResolver {
    pub fn new(store: Arc<dyn NodeRecordStore>) -> Self {
        Self { store }
    }

    /// Ordered trail from the root-most ancestor to `folder_id` itself.
    ///
    /// The root sentinel has no trail and yields an empty sequence.
    pub async fn breadcrumbs(&self, folder_id: &NodeId) -> Result<Vec<NodeRecord>, ApiError> {
        if folder_id.is_root() {
            return Ok(Vec::new());
        }
        self.store.resolve_path(folder_id).await
    }
}
