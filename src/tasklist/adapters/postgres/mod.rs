//! `PostgreSQL` adapters for job and task persistence.

mod models;
mod repository;
mod schema;

pub use repository::{JobPgPool, PostgresJobStore, SCHEMA_SQL};
