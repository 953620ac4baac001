//! Immutable view published to observers.

use crate::store::NodeRecord;
use crate::types::NodeId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Folder browsing state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowseStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Search state, orthogonal to browsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    #[default]
    Idle,
    Searching,
    Results,
    Error,
}

/// One upload as the presentation layer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadEntry {
    InProgress { name: String, percent: u8 },
    Failed { name: String, message: String },
}

impl UploadEntry {
    pub fn name(&self) -> &str {
        match self {
            UploadEntry::InProgress { name, .. } | UploadEntry::Failed { name, .. } => name,
        }
    }
}

/// Changes to the navigation target that landed while its listing was loading.
///
/// The listing may have been read before they committed, so they are replayed
/// over it once it arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct InFlight {
    pub(crate) created: Vec<NodeRecord>,
    pub(crate) renamed: Vec<NodeRecord>,
    pub(crate) deleted: BTreeSet<NodeId>,
}

/// Snapshot of everything the user currently sees
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub current_folder_id: NodeId,
    pub breadcrumbs: Vec<NodeRecord>,
    pub items: Vec<NodeRecord>,
    pub browse: BrowseStatus,
    pub error: Option<String>,
    pub uploads: BTreeMap<NodeId, UploadEntry>,
    pub search: SearchStatus,
    pub search_query: Option<String>,
    pub search_results: Vec<NodeRecord>,
    pub search_error: Option<String>,
    /// Folder whose children `items` holds
    #[serde(skip)]
    pub(crate) listed_folder_id: NodeId,
    #[serde(skip)]
    pub(crate) in_flight: InFlight,
    /// Newest navigation whose start has been applied
    #[serde(skip)]
    pub(crate) navigation_generation: u64,
    /// Newest search (or clear) whose start has been applied
    #[serde(skip)]
    pub(crate) search_generation: u64,
}

impl Snapshot {
    pub fn is_loading(&self) -> bool {
        self.browse == BrowseStatus::Loading
    }

    pub fn is_searching(&self) -> bool {
        self.search == SearchStatus::Searching
    }

    pub fn item(&self, id: &NodeId) -> Option<&NodeRecord> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn upload(&self, id: &NodeId) -> Option<&UploadEntry> {
        self.uploads.get(id)
    }
}
