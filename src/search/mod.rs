//! Ranking and query construction for package search
//!
//! The store fetches raw relevance, version and import rows; everything that
//! decides the final order lives here so it can be tested without a database.
//!
//! # Modules
//!
//! - [`query`]: Builds the full-text match expression from search terms
//! - [`ranking`]: Latest-version selection, popularity boost and pagination

pub mod query;
pub mod ranking;
