//! State Controller
//!
//! Accepts user intents, drives the store and the path resolver, and publishes
//! immutable [`Snapshot`]s. Intents may be issued concurrently from many tasks;
//! their outcomes are folded into the snapshot one at a time, in completion
//! order, through a single update channel.

mod action;
mod channel;
pub mod snapshot;
mod upload;

pub use snapshot::{BrowseStatus, SearchStatus, Snapshot, UploadEntry};

use crate::config::ControllerConfig;
use crate::error::ApiError;
use crate::session::{AlwaysActive, SessionGate};
use crate::store::{validate_name, NodeRecord, NodeRecordStore};
use crate::tree::PathResolver;
use crate::types::NodeId;
use action::Action;
use channel::UpdateChannel;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use upload::ProgressTicker;

/// A file handed over by the presentation layer.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content,
        }
    }
}

pub struct StateController {
    store: Arc<dyn NodeRecordStore>,
    resolver: PathResolver,
    session: Arc<dyn SessionGate>,
    config: ControllerConfig,
    channel: Arc<UpdateChannel>,
    navigation_generation: AtomicU64,
    search_generation: AtomicU64,
}

impl StateController {
    pub fn new(store: Arc<dyn NodeRecordStore>, config: ControllerConfig) -> Self {
        Self {
            resolver: PathResolver::new(Arc::clone(&store)),
            store,
            session: Arc::new(AlwaysActive),
            config,
            channel: Arc::new(UpdateChannel::new()),
            navigation_generation: AtomicU64::new(0),
            search_generation: AtomicU64::new(0),
        }
    }

    /// Replace the session gate consulted before every intent.
    pub fn with_session(mut self, session: Arc<dyn SessionGate>) -> Self {
        self.session = session;
        self
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.channel.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.channel.subscribe()
    }

    fn ensure_session(&self) -> Result<(), ApiError> {
        if self.session.is_active() {
            Ok(())
        } else {
            Err(ApiError::Unauthorized("No active session".to_string()))
        }
    }

    /// Display the children of `folder_id`.
    ///
    /// A navigation overtaken by a newer one leaves the snapshot alone when it
    /// finally resolves, whatever its outcome.
    #[instrument(skip(self), fields(folder = %folder_id))]
    pub async fn navigate(&self, folder_id: &NodeId) -> Result<(), ApiError> {
        self.ensure_session()?;

        let generation = self.navigation_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.channel.apply(Action::NavigateStart {
            generation,
            folder_id: folder_id.clone(),
        });

        let loaded = futures::future::try_join(
            self.store.list_children(folder_id),
            self.resolver.breadcrumbs(folder_id),
        )
        .await
        .and_then(|(items, breadcrumbs)| {
            check_folder_trail(folder_id, &breadcrumbs)?;
            Ok((items, breadcrumbs))
        });

        match loaded {
            Ok((items, breadcrumbs)) => {
                let applied = self.channel.apply(Action::NavigateSuccess {
                    generation,
                    folder_id: folder_id.clone(),
                    items,
                    breadcrumbs,
                });
                if !applied {
                    debug!(generation, "Discarded superseded navigation result");
                }
                Ok(())
            }
            Err(err) => {
                warn!(generation, error = %err, "Folder load failed");
                self.channel.apply(Action::NavigateError {
                    generation,
                    message: self.config.load_error_message.clone(),
                });
                Err(err)
            }
        }
    }

    /// Reload the folder currently displayed.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let current = self.snapshot().current_folder_id.clone();
        self.navigate(&current).await
    }

    /// Create a folder inside the folder currently displayed.
    #[instrument(skip(self))]
    pub async fn create_folder(&self, name: &str) -> Result<NodeRecord, ApiError> {
        self.ensure_session()?;
        let parent = self.snapshot().current_folder_id.clone();
        let record = NodeRecord::new_folder(parent, name);
        let created = self.store.create(record, None).await?;

        info!(id = %created.id, parent = %created.parent_id, "Folder created");
        self.channel.apply(Action::NodeCreated(created.clone()));
        Ok(created)
    }

    /// Store a file inside the folder currently displayed.
    ///
    /// Progress reported in the snapshot while the write runs is cosmetic. A
    /// failed upload stays visible as [`UploadEntry::Failed`] until dismissed.
    #[instrument(skip(self, file), fields(name = %file.name, size = file.content.len()))]
    pub async fn upload_file(&self, file: UploadFile) -> Result<NodeRecord, ApiError> {
        self.ensure_session()?;
        validate_name(&file.name)?;

        let id = NodeId::generate();
        let parent = self.snapshot().current_folder_id.clone();
        self.channel.apply(Action::UploadStarted {
            id: id.clone(),
            name: file.name.clone(),
        });
        let ticker = ProgressTicker::start(
            Arc::clone(&self.channel),
            id.clone(),
            self.config.upload_progress_steps,
            Duration::from_millis(self.config.upload_progress_interval_ms),
        );

        let record = NodeRecord::new_file(
            id.clone(),
            parent,
            file.name.as_str(),
            file.mime_type.as_str(),
            &file.content,
        );
        let result = self.store.create(record, Some(file.content)).await;
        ticker.cancel();

        match result {
            Ok(created) => {
                info!(id = %created.id, "Upload stored");
                self.channel.apply(Action::UploadComplete {
                    id,
                    node: created.clone(),
                });
                Ok(created)
            }
            Err(err) => {
                warn!(id = %id, error = %err, "Upload failed");
                self.channel.apply(Action::UploadFailed {
                    id,
                    name: file.name,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Forget a failed upload. Returns false if no failed entry has that id.
    pub fn dismiss_upload(&self, id: &NodeId) -> bool {
        let name = self
            .channel
            .current()
            .upload(id)
            .map(|entry| entry.name().to_string());
        let dismissed = self
            .channel
            .apply(Action::UploadDismissed { id: id.clone() });
        if dismissed {
            info!(
                upload = %id,
                name = name.as_deref().unwrap_or_default(),
                "Upload dismissed"
            );
        }
        dismissed
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_node(&self, id: &NodeId) -> Result<usize, ApiError> {
        self.ensure_session()?;
        let removed = self.store.delete(id).await?;
        let count = removed.len();
        info!(removed = count, "Node deleted");
        self.channel.apply(Action::NodeDeleted {
            id: id.clone(),
            removed,
        });
        Ok(count)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn rename_node(&self, id: &NodeId, new_name: &str) -> Result<NodeRecord, ApiError> {
        self.ensure_session()?;
        let renamed = self.store.rename(id, new_name).await?;
        info!(name = %renamed.name, "Node renamed");
        self.channel.apply(Action::NodeRenamed(renamed.clone()));
        Ok(renamed)
    }

    /// Run a name search. The outcome lands in the search part of the snapshot.
    #[instrument(skip(self))]
    pub async fn search_files(&self, query: &str) -> Result<Vec<NodeRecord>, ApiError> {
        self.ensure_session()?;

        let generation = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.channel.apply(Action::SearchStart {
            generation,
            query: query.to_string(),
        });

        match self.store.search(query).await {
            Ok(results) => {
                debug!(generation, hits = results.len(), "Search finished");
                self.channel.apply(Action::SearchSuccess {
                    generation,
                    results: results.clone(),
                });
                Ok(results)
            }
            Err(err) => {
                warn!(generation, error = %err, "Search failed");
                self.channel.apply(Action::SearchError {
                    generation,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Reset search to idle. Any search still running is discarded when it lands.
    pub fn clear_search(&self) {
        let generation = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.channel.apply(Action::ClearSearch { generation });
    }

    /// Content bytes of a file, for the binary viewer.
    pub async fn read_file(&self, id: &NodeId) -> Result<Vec<u8>, ApiError> {
        self.ensure_session()?;
        self.store.read_payload(id).await
    }
}

/// A non-root target must exist (last trail entry) and be a folder.
fn check_folder_trail(folder_id: &NodeId, breadcrumbs: &[NodeRecord]) -> Result<(), ApiError> {
    if folder_id.is_root() {
        return Ok(());
    }
    match breadcrumbs.last() {
        Some(target) if &target.id == folder_id => {
            if target.is_folder() {
                Ok(())
            } else {
                Err(ApiError::ValidationError(format!(
                    "'{}' is a file, not a folder",
                    target.name
                )))
            }
        }
        _ => Err(ApiError::NotFound(format!("Folder not found: {}", folder_id))),
    }
}
