//! NodeVault: hierarchical files and folders on an indexed key-value store
//!
//! The [`store`] keeps the hierarchy (unique sibling names, existing parents,
//! cascading deletes) on sled trees and secondary indexes. The [`state`]
//! controller turns user intents into store calls and publishes immutable
//! snapshots that stay consistent under concurrent, partially failing work.

pub mod concurrency;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod state;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
