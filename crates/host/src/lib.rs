//! `lotparty-host` — in-memory stand-in for the host ERP.
//!
//! Provides the pieces the lot/party module consumes from its host: a record
//! store with transactional (commit/rollback) batch mutation, a move
//! lifecycle dispatcher with explicitly registered pipeline stages, and the
//! period-close driver that dispatches aggregations through the grouping
//! registry.

pub mod lifecycle;
pub mod period_close;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use lifecycle::{MoveDispatcher, MoveLifecycle};
pub use period_close::{close_period, delete_period};
pub use store::{HostState, InMemoryHost};
