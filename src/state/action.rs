//! State transitions
//!
//! Every change to the published snapshot is an [`Action`] folded in by
//! [`reduce`], a pure function of the previous snapshot and the outcome of one
//! operation. `None` means the action does not change anything (stale or
//! redundant) and observers are not woken.

use super::snapshot::{BrowseStatus, InFlight, SearchStatus, Snapshot, UploadEntry};
use crate::store::NodeRecord;
use crate::types::NodeId;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub(crate) enum Action {
    NavigateStart {
        generation: u64,
        folder_id: NodeId,
    },
    NavigateSuccess {
        generation: u64,
        folder_id: NodeId,
        items: Vec<NodeRecord>,
        breadcrumbs: Vec<NodeRecord>,
    },
    NavigateError {
        generation: u64,
        message: String,
    },
    SearchStart {
        generation: u64,
        query: String,
    },
    SearchSuccess {
        generation: u64,
        results: Vec<NodeRecord>,
    },
    SearchError {
        generation: u64,
        message: String,
    },
    ClearSearch {
        generation: u64,
    },
    NodeCreated(NodeRecord),
    UploadStarted {
        id: NodeId,
        name: String,
    },
    UploadProgress {
        id: NodeId,
        percent: u8,
    },
    UploadComplete {
        id: NodeId,
        node: NodeRecord,
    },
    UploadFailed {
        id: NodeId,
        name: String,
        message: String,
    },
    UploadDismissed {
        id: NodeId,
    },
    NodeDeleted {
        id: NodeId,
        /// Every node the cascade removed
        removed: Vec<NodeId>,
    },
    NodeRenamed(NodeRecord),
}

/// Place a freshly stored node in the view.
///
/// `items` only ever holds the children of `listed_folder_id`. A node created
/// into a folder whose listing is still loading is kept aside and merged when
/// the listing lands.
fn admit_created(next: &mut Snapshot, node: NodeRecord) {
    if node.parent_id != next.current_folder_id {
        return;
    }
    if next.is_loading() && !next.in_flight.created.iter().any(|c| c.id == node.id) {
        next.in_flight.created.push(node.clone());
    }
    if node.parent_id == next.listed_folder_id && next.item(&node.id).is_none() {
        next.items.push(node);
    }
}

/// Apply a rename to every copy of the node. Older renames never win.
fn apply_rename(records: &mut [NodeRecord], renamed: &NodeRecord) {
    for record in records.iter_mut().filter(|r| r.id == renamed.id) {
        if record.updated_at <= renamed.updated_at {
            record.name = renamed.name.clone();
            record.updated_at = renamed.updated_at;
        }
    }
}

/// Replay changes that raced a folder load over the loaded listing.
fn merge_in_flight(
    in_flight: InFlight,
    items: &mut Vec<NodeRecord>,
    breadcrumbs: &mut [NodeRecord],
) {
    let InFlight {
        created,
        renamed,
        deleted,
    } = in_flight;
    items.retain(|item| !deleted.contains(&item.id));
    for node in created {
        if !deleted.contains(&node.id) && !items.iter().any(|item| item.id == node.id) {
            items.push(node);
        }
    }
    for node in &renamed {
        apply_rename(items, node);
        apply_rename(breadcrumbs, node);
    }
}

pub(crate) fn reduce(state: &Snapshot, action: Action) -> Option<Snapshot> {
    let mut next = state.clone();
    match action {
        Action::NavigateStart {
            generation,
            folder_id,
        } => {
            if generation < state.navigation_generation {
                return None;
            }
            next.navigation_generation = generation;
            next.browse = BrowseStatus::Loading;
            next.error = None;
            next.current_folder_id = folder_id;
            next.in_flight = InFlight::default();
        }
        Action::NavigateSuccess {
            generation,
            folder_id,
            mut items,
            mut breadcrumbs,
        } => {
            if generation != state.navigation_generation {
                return None;
            }
            merge_in_flight(
                std::mem::take(&mut next.in_flight),
                &mut items,
                &mut breadcrumbs,
            );
            next.browse = BrowseStatus::Ready;
            next.listed_folder_id = folder_id.clone();
            next.current_folder_id = folder_id;
            next.items = items;
            next.breadcrumbs = breadcrumbs;
        }
        Action::NavigateError {
            generation,
            message,
        } => {
            if generation != state.navigation_generation {
                return None;
            }
            // Previously displayed items and breadcrumbs stay
            next.browse = BrowseStatus::Error;
            next.error = Some(message);
            next.in_flight = InFlight::default();
        }
        Action::SearchStart { generation, query } => {
            if generation < state.search_generation {
                return None;
            }
            next.search_generation = generation;
            next.search = SearchStatus::Searching;
            next.search_query = Some(query);
            next.search_error = None;
        }
        Action::SearchSuccess {
            generation,
            results,
        } => {
            if generation != state.search_generation || state.search != SearchStatus::Searching {
                return None;
            }
            next.search = SearchStatus::Results;
            next.search_results = results;
        }
        Action::SearchError {
            generation,
            message,
        } => {
            if generation != state.search_generation || state.search != SearchStatus::Searching {
                return None;
            }
            next.search = SearchStatus::Error;
            next.search_error = Some(message);
        }
        Action::ClearSearch { generation } => {
            if generation < state.search_generation {
                return None;
            }
            next.search_generation = generation;
            next.search = SearchStatus::Idle;
            next.search_query = None;
            next.search_error = None;
            next.search_results.clear();
        }
        Action::NodeCreated(node) => admit_created(&mut next, node),
        Action::UploadStarted { id, name } => {
            next.uploads
                .insert(id, UploadEntry::InProgress { name, percent: 0 });
        }
        Action::UploadProgress { id, percent } => match next.uploads.get_mut(&id) {
            Some(UploadEntry::InProgress {
                percent: current, ..
            }) if percent > *current => *current = percent.min(100),
            _ => return None,
        },
        Action::UploadComplete { id, node } => {
            next.uploads.remove(&id);
            admit_created(&mut next, node);
        }
        Action::UploadFailed { id, name, message } => {
            next.uploads.insert(id, UploadEntry::Failed { name, message });
        }
        Action::UploadDismissed { id } => {
            // In-flight uploads cannot be dismissed
            if !matches!(next.uploads.get(&id), Some(UploadEntry::Failed { .. })) {
                return None;
            }
            next.uploads.remove(&id);
        }
        Action::NodeDeleted { id, removed } => {
            let gone: BTreeSet<NodeId> = removed.into_iter().chain(std::iter::once(id)).collect();
            if gone.contains(&next.listed_folder_id)
                || next.breadcrumbs.iter().any(|b| gone.contains(&b.id))
            {
                // The displayed folder went with the subtree
                next.items.clear();
            } else {
                next.items.retain(|item| !gone.contains(&item.id));
            }
            next.search_results.retain(|result| !gone.contains(&result.id));
            if next.is_loading() {
                next.in_flight
                    .created
                    .retain(|node| !gone.contains(&node.id));
                next.in_flight.deleted.extend(gone);
            }
        }
        Action::NodeRenamed(renamed) => {
            apply_rename(&mut next.items, &renamed);
            apply_rename(&mut next.breadcrumbs, &renamed);
            apply_rename(&mut next.search_results, &renamed);
            if next.is_loading() {
                next.in_flight.renamed.retain(|node| node.id != renamed.id);
                next.in_flight.renamed.push(renamed);
            }
        }
    }

    if next == *state {
        None
    } else {
        Some(next)
    }
}
