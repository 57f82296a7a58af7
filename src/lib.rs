//! Bartholomew: task-list reconciliation for GitHub issues.
//!
//! A markdown checklist in an issue body is mirrored into linked issues.
//! Checkbox state and issue open/closed state are kept in sync, new issues
//! are created for plain items, and the body is rewritten to reference
//! them. Passes run in disposable workers under a time budget and resume
//! from persisted state after a timeout.
//!
//! # Architecture
//!
//! Bartholomew follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, APIs, etc.)
//!
//! # Modules
//!
//! - [`tasklist`]: Task-list reconciliation engine
//! - [`config`]: Command-line and environment settings
//! - [`server`]: Webhook and continuation endpoints
//! - [`telemetry`]: Tracing setup

pub mod config;
pub mod server;
pub mod tasklist;
pub mod telemetry;
