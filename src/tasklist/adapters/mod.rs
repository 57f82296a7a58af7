//! Adapter implementations for task-list reconciliation ports.

pub mod github;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod process;
