//! # Run History
//!
//! Finished runs are kept in a local SQLite database so pass rates can be
//! compared across runs (`apicheck history`).

pub mod sqlite;

pub use sqlite::{HistoryStore, RunSummary};
