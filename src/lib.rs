//! Dune client - run Dune queries to completion and fetch their paginated results.
//!
//! [`DuneClient`] submits executions, polls them until they finish and stitches
//! multi-page JSON or CSV results into a single value. Latest results can be
//! reused while they are younger than a freshness threshold.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod types;

pub use client::DuneClient;
pub use config::ClientConfig;
pub use error::{DuneError, Result};
