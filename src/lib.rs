//! Module ingestion and package search.
//!
//! Versions are fetched from an upstream module proxy through a [`queue::FetchQueue`],
//! indexed into weighted full-text documents by the [`store::Store`], and served back
//! as ranked [`types::SearchResult`]s.

pub mod config;
pub mod error;
pub mod exclusion;
pub mod fetch;
pub mod logging;
pub mod queue;
pub mod search;
pub mod store;
pub mod types;
