//! Task-list reconciliation for issue trackers.
//!
//! A source issue's markdown checklist is mirrored into one job with one
//! task per line. Passes move tasks through classification, issue state
//! sync, issue creation and a body rewrite, committing after each stage so
//! that a pass killed by its time budget can be resumed by the next one.
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
