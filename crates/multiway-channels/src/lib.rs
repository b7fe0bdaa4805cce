//! Relay engine for Multiway.
//!
//! Mirrors messages between groups of channels ("relays"), forwards them
//! one-to-many ("broadcasts") and redirects feed posts into broadcasts
//! ("RSS links"). The host platform is reached through [`types::RelayPlatform`].

pub mod announcer;
pub mod bridge;
pub mod commands;
pub mod dispatcher;
pub mod formatter;
pub mod index;
pub mod router;
pub mod store;
pub mod types;
pub mod validator;

#[cfg(test)]
mod testing;
