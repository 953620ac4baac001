//! Single writer for the published snapshot.

use super::action::{reduce, Action};
use super::snapshot::Snapshot;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

/// All snapshot changes funnel through [`UpdateChannel::apply`], so two
/// completions can never overwrite each other's fields.
#[derive(Debug)]
pub(crate) struct UpdateChannel {
    tx: watch::Sender<Arc<Snapshot>>,
}

impl UpdateChannel {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshot::default()));
        Self { tx }
    }

    /// Fold `action` into the current snapshot. Returns whether observers were notified.
    pub(crate) fn apply(&self, action: Action) -> bool {
        self.tx.send_if_modified(|current| match reduce(current, action) {
            Some(next) => {
                *current = Arc::new(next);
                true
            }
            None => {
                trace!("Action left snapshot unchanged");
                false
            }
        })
    }

    pub(crate) fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.tx.borrow())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }
}
