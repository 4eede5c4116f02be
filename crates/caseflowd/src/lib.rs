//! Caseflow Daemon - case workflow engine and HTTP surface
//!
//! The daemon owns the SQLite store, the lifecycle engine that is the
//! only writer of case status fields, the assignment manager, the
//! append-only status history, and post-commit notification dispatch.

pub mod assignments;
pub mod dispatcher;
pub mod engine;
pub mod history;
pub mod routes;
pub mod server;
pub mod store;
