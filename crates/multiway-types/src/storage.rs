//! Storage seam for persisted routing tables.
//!
//! Defined here so the relay engine does not depend on a concrete backend.
//! Implemented by `multiway-memory` over SQLite.

use crate::error::RelayResult;

/// A key-value store of JSON documents.
pub trait DocumentStore: Send + Sync {
    /// Load a document. `Ok(None)` if the key has never been written.
    fn load(&self, key: &str) -> RelayResult<Option<serde_json::Value>>;

    /// Write (insert or replace) a document.
    fn save(&self, key: &str, value: serde_json::Value) -> RelayResult<()>;
}
