//! Diesel row models for task-list persistence.

use super::schema::{issue_jobs, tasklist_tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Row of `issue_jobs`, used for reads and inserts.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Insertable)]
#[diesel(table_name = issue_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IssueJobRow {
    /// Source issue reference.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub issue_ref: String,
    /// Source issue title.
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub title: String,
    /// Source issue milestone number.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Int8>)]
    pub milestone: Option<i64>,
    /// Job status.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub status: String,
    /// Bot progress comment identifier.
    #[diesel(sql_type = diesel::sql_types::Int8)]
    pub progress_comment: i64,
    /// Installation acting on the job.
    #[diesel(sql_type = diesel::sql_types::Int8)]
    pub installation_id: i64,
    /// Claim timestamp of the running pass.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub running_since: Option<DateTime<Utc>>,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Mutable columns of `issue_jobs`.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = issue_jobs)]
#[diesel(treat_none_as_null = true)]
pub struct IssueJobChangeset {
    /// Job status.
    pub status: String,
    /// Bot progress comment identifier.
    pub progress_comment: i64,
    /// Claim timestamp of the running pass.
    pub running_since: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Row of `tasklist_tasks`, used for reads and inserts.
///
/// `seq` is assigned by the database and only used for ordering.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = tasklist_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Source issue of the owning job.
    pub parent: String,
    /// Checklist text.
    pub raw_text: String,
    /// Last observed checkbox state.
    pub checked: bool,
    /// Task status.
    pub status: String,
    /// Seeded classification as JSON.
    pub kind: Value,
    /// Bound issue reference.
    pub resolved_issue: Option<String>,
    /// Creation destination as JSON.
    pub target: Option<Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Mutable columns of `tasklist_tasks`.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = tasklist_tasks)]
#[diesel(treat_none_as_null = true)]
pub struct TaskChangeset {
    /// Last observed checkbox state.
    pub checked: bool,
    /// Task status.
    pub status: String,
    /// Bound issue reference.
    pub resolved_issue: Option<String>,
    /// Creation destination as JSON.
    pub target: Option<Value>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
