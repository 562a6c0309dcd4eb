//! Shared fixtures for integration tests

#![allow(dead_code)]

pub mod fixtures;
pub mod source;

pub use fixtures::{create_test_store, package, version};
pub use source::InMemorySource;
