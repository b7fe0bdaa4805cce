//! Persistence for the Multiway channel relay.
//!
//! Routing tables are stored as JSON documents in a single SQLite table,
//! one row per document key. See [`SqliteDocumentStore`].

pub mod documents;
pub mod migration;

pub use documents::SqliteDocumentStore;
