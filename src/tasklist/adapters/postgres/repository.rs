//! `PostgreSQL` job store.

use super::{
    models::{IssueJobChangeset, IssueJobRow, TaskChangeset, TaskRow},
    schema::{issue_jobs, tasklist_tasks},
};
use crate::tasklist::{
    domain::{
        ClaimToken, CommentId, CreationTarget, InstallationContext, IssueJob, IssueJobStatus,
        IssueRef, MilestoneNumber, PersistedIssueJobData, PersistedTaskData, Task, TaskId,
        TaskKind, TaskStatus,
    },
    ports::{JobStore, JobStoreError, JobStoreResult, TaskFilter},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by the job store.
pub type JobPgPool = Pool<ConnectionManager<PgConnection>>;

/// Schema applied by [`PostgresJobStore::apply_schema`].
pub const SCHEMA_SQL: &str =
    include_str!("../../../../migrations/2026-10-01-000000_create_tasklist_tables/up.sql");

const RAW_TEXT_CONSTRAINT: &str = "uq_tasklist_tasks_parent_raw_text";
const RESOLVED_ISSUE_CONSTRAINT: &str = "uq_tasklist_tasks_parent_resolved_issue";

const CLAIM_SQL: &str = concat!(
    "UPDATE issue_jobs SET status = 'running', running_since = $2, updated_at = $2 ",
    "WHERE issue_ref = $1 AND (status = 'pending' OR (status = 'running' ",
    "AND (running_since IS NULL OR running_since <= $3))) ",
    "RETURNING issue_ref, title, milestone, status, progress_comment, installation_id, ",
    "running_since, created_at, updated_at",
);

/// `PostgreSQL`-backed job store.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: JobPgPool,
}

impl PostgresJobStore {
    /// Creates a store from a connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool for `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::Persistence`] when the pool cannot be built.
    pub fn connect(database_url: &str, max_size: u32) -> JobStoreResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(JobStoreError::persistence)?;
        Ok(Self::new(pool))
    }

    /// Creates the job tables when they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::Persistence`] when the schema cannot be
    /// applied.
    pub async fn apply_schema(&self) -> JobStoreResult<()> {
        self.run_blocking(|connection| {
            connection
                .batch_execute(SCHEMA_SQL)
                .map_err(JobStoreError::persistence)
        })
        .await
    }

    async fn run_blocking<F, T>(&self, f: F) -> JobStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> JobStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(JobStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(JobStoreError::persistence)?
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn find_job(&self, issue_ref: &IssueRef) -> JobStoreResult<Option<IssueJob>> {
        let key = issue_ref.to_string();
        self.run_blocking(move |connection| load_job(connection, &key)).await
    }

    async fn insert_job(&self, job: &IssueJob) -> JobStoreResult<()> {
        let row = to_job_row(job)?;
        let issue_ref = job.issue_ref().clone();
        self.run_blocking(move |connection| {
            diesel::insert_into(issue_jobs::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        JobStoreError::DuplicateJob(issue_ref.clone())
                    }
                    _ => JobStoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_job(&self, job: &IssueJob) -> JobStoreResult<()> {
        let changeset = to_job_changeset(job)?;
        let issue_ref = job.issue_ref().clone();
        self.run_blocking(move |connection| {
            let updated = diesel::update(issue_jobs::table.find(issue_ref.to_string()))
                .set(&changeset)
                .execute(connection)
                .map_err(JobStoreError::persistence)?;
            if updated == 0 {
                return Err(JobStoreError::JobNotFound(issue_ref));
            }
            Ok(())
        })
        .await
    }

    async fn claim_job(
        &self,
        issue_ref: &IssueRef,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> JobStoreResult<Option<IssueJob>> {
        let key = issue_ref.to_string();
        self.run_blocking(move |connection| {
            let row = diesel::sql_query(CLAIM_SQL)
                .bind::<diesel::sql_types::Varchar, _>(&key)
                .bind::<diesel::sql_types::Timestamptz, _>(now)
                .bind::<diesel::sql_types::Timestamptz, _>(stale_before)
                .get_result::<IssueJobRow>(connection)
                .optional()
                .map_err(JobStoreError::persistence)?;
            row.map(row_to_job).transpose()
        })
        .await
    }

    async fn checkpoint_job(
        &self,
        issue_ref: &IssueRef,
        claim: ClaimToken,
        now: DateTime<Utc>,
    ) -> JobStoreResult<Option<IssueJob>> {
        let key = issue_ref.to_string();
        self.run_blocking(move |connection| {
            connection.transaction::<_, JobStoreError, _>(|tx| {
                diesel::update(
                    issue_jobs::table
                        .find(&key)
                        .filter(issue_jobs::status.eq(IssueJobStatus::Running.as_str()))
                        .filter(issue_jobs::running_since.eq(claim.claimed_at())),
                )
                .set((
                    issue_jobs::status.eq(IssueJobStatus::Pending.as_str()),
                    issue_jobs::running_since.eq(None::<DateTime<Utc>>),
                    issue_jobs::updated_at.eq(now),
                ))
                .execute(tx)
                .map_err(JobStoreError::persistence)?;
                load_job(tx, &key)
            })
        })
        .await
    }

    async fn release_job(
        &self,
        job: &IssueJob,
        claim: ClaimToken,
    ) -> JobStoreResult<Option<IssueJob>> {
        let released = job.clone();
        self.run_blocking(move |connection| {
            connection.transaction::<_, JobStoreError, _>(|tx| {
                let key = released.issue_ref().to_string();
                // The row lock waits for task inserts still holding the
                // parent key, so the count below sees them.
                let stored = issue_jobs::table
                    .find(&key)
                    .select(IssueJobRow::as_select())
                    .for_update()
                    .first::<IssueJobRow>(tx)
                    .optional()
                    .map_err(JobStoreError::persistence)?
                    .map(row_to_job)
                    .transpose()?
                    .ok_or_else(|| JobStoreError::JobNotFound(released.issue_ref().clone()))?;
                if !stored.is_owned_by(claim) {
                    return Ok(None);
                }
                let open: i64 = tasklist_tasks::table
                    .filter(tasklist_tasks::parent.eq(&key))
                    .filter(tasklist_tasks::status.ne_all([
                        TaskStatus::Done.as_str(),
                        TaskStatus::Error.as_str(),
                    ]))
                    .count()
                    .get_result(tx)
                    .map_err(JobStoreError::persistence)?;
                let mut written = released;
                if written.status() == IssueJobStatus::Done && open > 0 {
                    let now = written.updated_at();
                    written.reopen(now);
                }
                diesel::update(issue_jobs::table.find(&key))
                    .set(&to_job_changeset(&written)?)
                    .execute(tx)
                    .map_err(JobStoreError::persistence)?;
                Ok(Some(written))
            })
        })
        .await
    }

    async fn reopen_job(
        &self,
        issue_ref: &IssueRef,
        now: DateTime<Utc>,
    ) -> JobStoreResult<Option<IssueJob>> {
        let key = issue_ref.to_string();
        self.run_blocking(move |connection| {
            connection.transaction::<_, JobStoreError, _>(|tx| {
                diesel::update(
                    issue_jobs::table
                        .find(&key)
                        .filter(issue_jobs::status.eq(IssueJobStatus::Done.as_str())),
                )
                .set((
                    issue_jobs::status.eq(IssueJobStatus::Pending.as_str()),
                    issue_jobs::running_since.eq(None::<DateTime<Utc>>),
                    issue_jobs::updated_at.eq(now),
                ))
                .execute(tx)
                .map_err(JobStoreError::persistence)?;
                load_job(tx, &key)
            })
        })
        .await
    }

    async fn set_progress_comment(
        &self,
        issue_ref: &IssueRef,
        comment: CommentId,
    ) -> JobStoreResult<()> {
        let issue_ref = issue_ref.clone();
        let value = to_i64(comment.value())?;
        self.run_blocking(move |connection| {
            let updated = diesel::update(issue_jobs::table.find(issue_ref.to_string()))
                .set(issue_jobs::progress_comment.eq(value))
                .execute(connection)
                .map_err(JobStoreError::persistence)?;
            if updated == 0 {
                return Err(JobStoreError::JobNotFound(issue_ref));
            }
            Ok(())
        })
        .await
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> JobStoreResult<Vec<Task>> {
        let parent = filter.parent.to_string();
        let status = filter.status;
        self.run_blocking(move |connection| {
            let mut query = tasklist_tasks::table
                .filter(tasklist_tasks::parent.eq(parent))
                .order(tasklist_tasks::seq.asc())
                .select(TaskRow::as_select())
                .into_boxed();
            if let Some(wanted) = status {
                query = query.filter(tasklist_tasks::status.eq(wanted.as_str()));
            }
            let rows = query
                .load::<TaskRow>(connection)
                .map_err(JobStoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn insert_tasks(&self, tasks: &[Task]) -> JobStoreResult<()> {
        let rows = tasks
            .iter()
            .map(|task| Ok((task.clone(), to_task_row(task)?)))
            .collect::<JobStoreResult<Vec<_>>>()?;
        self.run_blocking(move |connection| {
            connection.transaction::<_, JobStoreError, _>(|tx| {
                for (task, row) in &rows {
                    diesel::insert_into(tasklist_tasks::table)
                        .values(row)
                        .execute(tx)
                        .map_err(|err| map_task_write_error(err, task))?;
                }
                Ok(())
            })
        })
        .await
    }

    async fn update_task(&self, task: &Task) -> JobStoreResult<()> {
        self.update_tasks(std::slice::from_ref(task)).await
    }

    async fn update_tasks(&self, tasks: &[Task]) -> JobStoreResult<()> {
        let changes = tasks
            .iter()
            .map(|task| Ok((task.clone(), to_task_changeset(task)?)))
            .collect::<JobStoreResult<Vec<_>>>()?;
        self.run_blocking(move |connection| {
            connection.transaction::<_, JobStoreError, _>(|tx| {
                for (task, changeset) in &changes {
                    let updated = diesel::update(tasklist_tasks::table.find(task.id().into_inner()))
                        .set(changeset)
                        .execute(tx)
                        .map_err(|err| map_task_write_error(err, task))?;
                    if updated == 0 {
                        return Err(JobStoreError::TaskNotFound(task.id()));
                    }
                }
                Ok(())
            })
        })
        .await
    }
}

impl From<DieselError> for JobStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

fn load_job(connection: &mut PgConnection, key: &str) -> JobStoreResult<Option<IssueJob>> {
    let row = issue_jobs::table
        .find(key)
        .select(IssueJobRow::as_select())
        .first::<IssueJobRow>(connection)
        .optional()
        .map_err(JobStoreError::persistence)?;
    row.map(row_to_job).transpose()
}

fn map_task_write_error(err: DieselError, task: &Task) -> JobStoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
            if violates(info.as_ref(), RAW_TEXT_CONSTRAINT) =>
        {
            JobStoreError::DuplicateTask {
                parent: task.parent().clone(),
                raw_text: task.raw_text().to_owned(),
            }
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
            if violates(info.as_ref(), RESOLVED_ISSUE_CONSTRAINT) =>
        {
            match task.resolved_issue() {
                Some(resolved) => JobStoreError::DuplicateResolvedIssue {
                    parent: task.parent().clone(),
                    resolved: resolved.clone(),
                },
                None => JobStoreError::persistence(err),
            }
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            JobStoreError::JobNotFound(task.parent().clone())
        }
        _ => JobStoreError::persistence(err),
    }
}

fn violates(info: &dyn DatabaseErrorInformation, constraint: &str) -> bool {
    info.constraint_name().is_some_and(|name| name == constraint)
}

fn to_i64(value: u64) -> JobStoreResult<i64> {
    i64::try_from(value).map_err(JobStoreError::persistence)
}

fn to_u64(value: i64) -> JobStoreResult<u64> {
    u64::try_from(value).map_err(JobStoreError::persistence)
}

fn to_job_row(job: &IssueJob) -> JobStoreResult<IssueJobRow> {
    Ok(IssueJobRow {
        issue_ref: job.issue_ref().to_string(),
        title: job.title().to_owned(),
        milestone: job
            .milestone()
            .map(|milestone| to_i64(milestone.value()))
            .transpose()?,
        status: job.status().as_str().to_owned(),
        progress_comment: to_i64(job.progress_comment().value())?,
        installation_id: to_i64(job.installation().installation_id())?,
        running_since: job.running_since(),
        created_at: job.created_at(),
        updated_at: job.updated_at(),
    })
}

fn to_job_changeset(job: &IssueJob) -> JobStoreResult<IssueJobChangeset> {
    Ok(IssueJobChangeset {
        status: job.status().as_str().to_owned(),
        progress_comment: to_i64(job.progress_comment().value())?,
        running_since: job.running_since(),
        updated_at: job.updated_at(),
    })
}

fn row_to_job(row: IssueJobRow) -> JobStoreResult<IssueJob> {
    let IssueJobRow {
        issue_ref,
        title,
        milestone,
        status,
        progress_comment,
        installation_id,
        running_since,
        created_at,
        updated_at,
    } = row;
    let data = PersistedIssueJobData {
        issue_ref: issue_ref
            .parse::<IssueRef>()
            .map_err(JobStoreError::persistence)?,
        title,
        milestone: milestone
            .map(|value| to_u64(value).map(MilestoneNumber::new))
            .transpose()?,
        status: IssueJobStatus::try_from(status.as_str()).map_err(JobStoreError::persistence)?,
        progress_comment: CommentId::new(to_u64(progress_comment)?),
        installation: InstallationContext::new(to_u64(installation_id)?),
        running_since,
        created_at,
        updated_at,
    };
    Ok(IssueJob::from_persisted(data))
}

fn to_task_row(task: &Task) -> JobStoreResult<TaskRow> {
    Ok(TaskRow {
        id: task.id().into_inner(),
        parent: task.parent().to_string(),
        raw_text: task.raw_text().to_owned(),
        checked: task.checked(),
        status: task.status().as_str().to_owned(),
        kind: serde_json::to_value(task.kind()).map_err(JobStoreError::persistence)?,
        resolved_issue: task.resolved_issue().map(ToString::to_string),
        target: task
            .target()
            .map(serde_json::to_value)
            .transpose()
            .map_err(JobStoreError::persistence)?,
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn to_task_changeset(task: &Task) -> JobStoreResult<TaskChangeset> {
    Ok(TaskChangeset {
        checked: task.checked(),
        status: task.status().as_str().to_owned(),
        resolved_issue: task.resolved_issue().map(ToString::to_string),
        target: task
            .target()
            .map(serde_json::to_value)
            .transpose()
            .map_err(JobStoreError::persistence)?,
        updated_at: task.updated_at(),
    })
}

fn row_to_task(row: TaskRow) -> JobStoreResult<Task> {
    let TaskRow {
        id,
        parent,
        raw_text,
        checked,
        status,
        kind,
        resolved_issue,
        target,
        created_at,
        updated_at,
    } = row;
    let data = PersistedTaskData {
        id: TaskId::from_uuid(id),
        parent: parent.parse::<IssueRef>().map_err(JobStoreError::persistence)?,
        raw_text,
        checked,
        status: TaskStatus::try_from(status.as_str()).map_err(JobStoreError::persistence)?,
        kind: serde_json::from_value::<TaskKind>(kind).map_err(JobStoreError::persistence)?,
        resolved_issue: resolved_issue
            .map(|value| value.parse::<IssueRef>())
            .transpose()
            .map_err(JobStoreError::persistence)?,
        target: target
            .map(serde_json::from_value::<CreationTarget>)
            .transpose()
            .map_err(JobStoreError::persistence)?,
        created_at,
        updated_at,
    };
    Ok(Task::from_persisted(data))
}
