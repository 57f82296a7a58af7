//! Unit tests for task-list reconciliation.

mod github_tests;
mod memory_store_tests;
mod support;
