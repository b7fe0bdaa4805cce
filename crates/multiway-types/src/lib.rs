//! Core types and traits for the Multiway channel relay.
//!
//! This crate defines the shared data structures used by the relay engine,
//! the document store and the kernel. It contains no business logic.

pub mod channel;
pub mod config;
pub mod error;
pub mod message;
pub mod relay;
pub mod storage;
