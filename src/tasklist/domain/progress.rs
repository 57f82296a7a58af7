//! Progress comment texts posted on the source issue.

use super::TaskListDomainError;
use minijinja::{Environment, context};

/// Login the progress comment is written under unless configured otherwise.
pub const DEFAULT_BOT_LOGIN: &str = "bartholomew-smith[bot]";

const STARTED_TEMPLATE: &str = "I'll manage the issues in the next minutes";

const IN_PROGRESS_TEMPLATE: &str = concat!(
    "Analyzing the task list [{{ done }}/{{ total }}]\n",
    "![](https://geps.dev/progress/{{ percent }}",
    "?dangerColor=006600&warningColor=006600&successColor=006600)",
);

const FINISHED_TEMPLATE: &str = "Job's done";

/// State reported in the bot's progress comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressReport {
    /// The job was just created.
    Started,
    /// Some tasks are still being reconciled.
    InProgress {
        /// Tasks in a terminal status.
        done: usize,
        /// All tasks of the job.
        total: usize,
    },
    /// Every task is terminal.
    Finished,
}

impl ProgressReport {
    /// Builds the report for `done` terminal tasks out of `total`.
    #[must_use]
    pub const fn from_counts(done: usize, total: usize) -> Self {
        if done >= total {
            Self::Finished
        } else {
            Self::InProgress { done, total }
        }
    }

    /// Renders the comment text.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListDomainError::Template`] when rendering fails.
    pub fn render(self) -> Result<String, TaskListDomainError> {
        let environment = Environment::new();
        let rendered = match self {
            Self::Started => environment.render_str(STARTED_TEMPLATE, context! {}),
            Self::InProgress { done, total } => environment.render_str(
                IN_PROGRESS_TEMPLATE,
                context! { done, total, percent => percent(done, total) },
            ),
            Self::Finished => environment.render_str(FINISHED_TEMPLATE, context! {}),
        };
        rendered.map_err(|error| TaskListDomainError::Template(error.to_string()))
    }
}

/// Whole percentage of `done` over `total`, 100 for an empty job.
#[must_use]
pub fn percent(done: usize, total: usize) -> usize {
    done.saturating_mul(100).checked_div(total).unwrap_or(100)
}
