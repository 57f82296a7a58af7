//! Step definitions for task-list reconciliation scenarios.

mod given;
mod then;
mod when;
pub mod world;
