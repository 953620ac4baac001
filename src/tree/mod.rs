//! Tree helpers layered over the node store: payload hashing and ancestor paths.

pub mod hasher;
pub mod path;

pub use path::PathResolver;
