//! Cosmetic upload progress
//!
//! Progress is simulated: the real write is a single store call, so a ticker
//! walks the entry towards 100% while it runs. The ticker is cancelled as soon
//! as the upload settles and the reducer ignores ticks for entries that are
//! gone, so a late tick can never resurrect a finished upload.

use super::action::Action;
use super::channel::UpdateChannel;
use crate::types::NodeId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

pub(crate) struct ProgressTicker {
    guard: Option<DropGuard>,
}

impl ProgressTicker {
    /// Spawn the ticker. Dropping the returned value stops it.
    pub(crate) fn start(
        channel: Arc<UpdateChannel>,
        id: NodeId,
        steps: u32,
        interval: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let child = token.child_token();
        let steps = steps.max(1);

        tokio::spawn(async move {
            // The last step is left to completion itself
            for step in 1..steps {
                tokio::select! {
                    _ = child.cancelled() => {
                        debug!(upload = %id, step, "Progress ticker cancelled");
                        return;
                    }
                    _ = sleep(interval) => {}
                }
                let percent = (step * 100 / steps) as u8;
                channel.apply(Action::UploadProgress {
                    id: id.clone(),
                    percent,
                });
            }
        });

        Self {
            guard: Some(token.drop_guard()),
        }
    }

    pub(crate) fn cancel(mut self) {
        self.guard.take();
    }
}
