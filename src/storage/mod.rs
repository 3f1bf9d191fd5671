//! Persistent Storage
//!
//! Sled-backed record of every chat exchange. The context key-value store
//! lives in `crate::store`; this module only holds what the service writes.

pub mod interactions;

pub use interactions::{InteractionLog, InteractionLogError, InteractionRecord};
