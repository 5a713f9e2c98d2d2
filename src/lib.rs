//! Kumquat Search
//!
//! Query construction and result mapping for the Kumquat digital library's
//! Elasticsearch/OpenSearch indexes: fluent builders for items, collections
//! and cross-entity search, faceting, authorization filtering, and a small
//! HTTP client for query execution and index administration.

pub mod config;
pub mod error;
pub mod metrics;
pub mod search;

pub use error::{AppError, Result};
