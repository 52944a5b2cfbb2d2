//! Black-box HTTP API conformance runner.
//!
//! Suites of ordered request cases run against a live service; each case
//! yields one outcome and the run aggregates into a scored report.

pub mod cli;
pub mod collections;
pub mod config;
pub mod environment;
pub mod error;
pub mod http;
pub mod store;
pub mod testing;
