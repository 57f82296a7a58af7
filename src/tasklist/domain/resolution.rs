//! Classification of checklist text and destination decisions.

use super::{IssueJob, IssueNumber, IssueRef, RepositoryFullName, TaskListDomainError};
use serde::{Deserialize, Serialize};

/// Shape of a checklist item, decided once when the task is seeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    /// `owner/repo#N` or `#N`.
    IssueRef {
        /// Repository named by the reference, `None` for the `#N` form.
        repository: Option<RepositoryFullName>,
        /// Referenced issue number.
        number: IssueNumber,
    },
    /// `[repo-spec] optional title`.
    RepoTitle {
        /// Repository the new issue goes to.
        repository: RepositorySpec,
        /// Title text after the bracket, `None` when blank.
        title: Option<String>,
    },
    /// Anything else.
    Bare {
        /// Item text.
        text: String,
    },
}

/// Repository named inside a `[repo-spec]` bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", content = "value", rename_all = "snake_case")]
pub enum RepositorySpec {
    /// `owner/name`.
    Qualified(RepositoryFullName),
    /// `name`, owned by the source issue's owner.
    Name(String),
}

impl RepositorySpec {
    fn parse(spec: &str) -> Option<Self> {
        if spec.is_empty() || spec.chars().any(char::is_whitespace) {
            return None;
        }
        if spec.contains('/') {
            return RepositoryFullName::new(spec).ok().map(Self::Qualified);
        }
        Some(Self::Name(spec.to_owned()))
    }

    /// Resolves the spec against the owner of the source repository.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListDomainError::InvalidRepository`] when the combined
    /// name is not a valid repository name.
    pub fn qualify(&self, default_owner: &str) -> Result<RepositoryFullName, TaskListDomainError> {
        match self {
            Self::Qualified(repository) => Ok(repository.clone()),
            Self::Name(name) => RepositoryFullName::from_parts(default_owner, name),
        }
    }
}

impl TaskKind {
    /// Classifies checklist text.
    ///
    /// Issue references win over bracketed repositories, which win over bare
    /// text. The result depends on the text alone.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let trimmed = text.trim();
        parse_issue_reference(trimmed)
            .or_else(|| parse_repo_title(trimmed))
            .unwrap_or_else(|| Self::Bare {
                text: trimmed.to_owned(),
            })
    }

    /// Returns the repository a bare single-token item could name.
    ///
    /// Only bare items without whitespace qualify. An `owner/name` token is
    /// taken as-is, a plain token is owned by `default_owner`.
    #[must_use]
    pub fn repository_candidate(&self, default_owner: &str) -> Option<RepositoryFullName> {
        let Self::Bare { text } = self else {
            return None;
        };
        if text.is_empty() || text.chars().any(char::is_whitespace) {
            return None;
        }
        if text.contains('/') {
            RepositoryFullName::new(text.as_str()).ok()
        } else {
            RepositoryFullName::from_parts(default_owner, text).ok()
        }
    }

    /// Decides where the task points.
    ///
    /// `existing_repository` is the lookup answer for
    /// [`Self::repository_candidate`]; it is ignored for other kinds.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListDomainError`] when a bracketed repository name
    /// cannot be qualified with the job owner.
    pub fn destination(
        &self,
        job: &IssueJob,
        existing_repository: Option<RepositoryFullName>,
    ) -> Result<Destination, TaskListDomainError> {
        let destination = match self {
            Self::IssueRef { repository, number } => {
                let repo = repository.clone().unwrap_or_else(|| job.repository().clone());
                Destination::Existing(IssueRef::new(repo, *number))
            }
            Self::RepoTitle { repository, title } => Destination::Create(CreationTarget {
                repository: repository.qualify(job.repository().owner())?,
                title: title.clone().unwrap_or_else(|| job.title().to_owned()),
            }),
            Self::Bare { text } => match existing_repository {
                Some(repository) => Destination::Create(CreationTarget {
                    repository,
                    title: job.title().to_owned(),
                }),
                None => Destination::Create(CreationTarget {
                    repository: job.repository().clone(),
                    title: text.clone(),
                }),
            },
        };
        Ok(destination)
    }
}

/// Where a resolved task points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The item already references an issue.
    Existing(IssueRef),
    /// A new issue has to be created.
    Create(CreationTarget),
}

/// Repository and title for an issue that has to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationTarget {
    /// Repository receiving the new issue.
    pub repository: RepositoryFullName,
    /// Title of the new issue.
    pub title: String,
}

fn parse_issue_reference(text: &str) -> Option<TaskKind> {
    let (repo_part, number_part) = text.split_once('#')?;
    if number_part.is_empty() || !number_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let number = IssueNumber::new(number_part.parse().ok()?).ok()?;
    let repository = if repo_part.is_empty() {
        None
    } else {
        Some(RepositoryFullName::new(repo_part).ok()?)
    };
    Some(TaskKind::IssueRef { repository, number })
}

fn parse_repo_title(text: &str) -> Option<TaskKind> {
    let rest = text.strip_prefix('[')?;
    let (spec, title) = rest.split_once(']')?;
    let repository = RepositorySpec::parse(spec.trim())?;
    let trimmed_title = title.trim();
    Some(TaskKind::RepoTitle {
        repository,
        title: (!trimmed_title.is_empty()).then(|| trimmed_title.to_owned()),
    })
}
