//! Diesel schema for task-list persistence.

diesel::table! {
    /// One reconciliation job per source issue.
    issue_jobs (issue_ref) {
        /// Source issue reference, `owner/repo#number`.
        #[max_length = 300]
        issue_ref -> Varchar,
        /// Source issue title at creation time.
        title -> Text,
        /// Source issue milestone number.
        milestone -> Nullable<Int8>,
        /// Job status.
        #[max_length = 50]
        status -> Varchar,
        /// Bot progress comment identifier.
        progress_comment -> Int8,
        /// Installation acting on the job.
        installation_id -> Int8,
        /// Claim timestamp of the running pass.
        running_since -> Nullable<Timestamptz>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// One task per checklist line of a job.
    tasklist_tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Insertion sequence.
        seq -> Int8,
        /// Source issue of the owning job.
        #[max_length = 300]
        parent -> Varchar,
        /// Checklist text observed at seeding.
        raw_text -> Text,
        /// Last observed checkbox state.
        checked -> Bool,
        /// Task status.
        #[max_length = 50]
        status -> Varchar,
        /// Seeded classification.
        kind -> Jsonb,
        /// Bound issue reference.
        #[max_length = 300]
        resolved_issue -> Nullable<Varchar>,
        /// Creation destination.
        target -> Nullable<Jsonb>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(tasklist_tasks -> issue_jobs (parent));
diesel::allow_tables_to_appear_in_same_query!(issue_jobs, tasklist_tasks);
