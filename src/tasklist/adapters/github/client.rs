//! GitHub REST v3 issue tracker.

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

use crate::tasklist::{
    domain::{
        CommentId, IssueNumber, IssueRef, IssueState, MilestoneNumber, RepositoryFullName,
        StateReason, TrackedIssue,
    },
    ports::{IssueEdit, IssueTracker, IssueTrackerError, IssueTrackerResult},
};

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "bartholomew-tasklist";
const COMMENTS_PAGE_SIZE: usize = 100;

/// Issue tracker backed by the GitHub REST API for one installation.
#[derive(Debug, Clone)]
pub struct GitHubIssueTracker {
    http: reqwest::Client,
    api_base: String,
    bot_login: String,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    number: u64,
    title: String,
    body: Option<String>,
    state: String,
    state_reason: Option<String>,
    milestone: Option<MilestonePayload>,
}

#[derive(Debug, Deserialize)]
struct MilestonePayload {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct CreatedIssuePayload {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct CommentPayload {
    id: u64,
    user: Option<UserPayload>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    full_name: String,
}

#[derive(Debug, Serialize)]
struct EditIssueRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    milestone: Option<u64>,
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

impl GitHubIssueTracker {
    /// Creates a tracker authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`IssueTrackerError::Transport`] when the token is not a valid
    /// header value or the HTTP client cannot be built.
    pub fn new(
        api_base: &str,
        token: &str,
        bot_login: impl Into<String>,
        request_timeout: Duration,
    ) -> IssueTrackerResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            header::HeaderValue::from_static(API_VERSION),
        );
        let mut authorization = header::HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(IssueTrackerError::transport)?;
        authorization.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, authorization);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(IssueTrackerError::transport)?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_owned(),
            bot_login: bot_login.into(),
        })
    }

    fn issue_url(&self, issue_ref: &IssueRef) -> String {
        format!(
            "{}/repos/{}/issues/{}",
            self.api_base,
            issue_ref.repository(),
            issue_ref.number()
        )
    }

    async fn request_json<T>(
        &self,
        subject: &str,
        request: reqwest::RequestBuilder,
    ) -> IssueTrackerResult<T>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await.map_err(IssueTrackerError::transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(IssueTrackerError::NotFound(subject.to_owned()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IssueTrackerError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response.json::<T>().await.map_err(IssueTrackerError::transport)
    }

    async fn find_bot_comment(
        &self,
        issue_ref: &IssueRef,
    ) -> IssueTrackerResult<Option<CommentId>> {
        let mut page = 1_u32;
        loop {
            let request = self
                .http
                .get(format!("{}/comments", self.issue_url(issue_ref)))
                .query(&[
                    ("per_page", COMMENTS_PAGE_SIZE.to_string()),
                    ("page", page.to_string()),
                ]);
            let comments: Vec<CommentPayload> =
                self.request_json(&issue_ref.to_string(), request).await?;
            let found = comments.iter().find(|comment| {
                comment
                    .user
                    .as_ref()
                    .is_some_and(|user| user.login == self.bot_login)
            });
            if let Some(comment) = found {
                return Ok(Some(CommentId::new(comment.id)));
            }
            if comments.len() < COMMENTS_PAGE_SIZE {
                return Ok(None);
            }
            page = page.saturating_add(1);
        }
    }

    async fn edit_comment(
        &self,
        issue_ref: &IssueRef,
        comment: CommentId,
        text: &str,
    ) -> IssueTrackerResult<CommentId> {
        let request = self
            .http
            .patch(format!(
                "{}/repos/{}/issues/comments/{}",
                self.api_base,
                issue_ref.repository(),
                comment
            ))
            .json(&CommentRequest { body: text });
        let edited: CommentPayload = self
            .request_json(&format!("comment {comment}"), request)
            .await?;
        Ok(CommentId::new(edited.id))
    }
}

impl IssuePayload {
    fn into_tracked(self, repository: &RepositoryFullName) -> IssueTrackerResult<TrackedIssue> {
        let number = IssueNumber::new(self.number).map_err(IssueTrackerError::transport)?;
        let state = if self.state.eq_ignore_ascii_case("closed") {
            IssueState::Closed
        } else {
            IssueState::Open
        };
        Ok(TrackedIssue {
            issue_ref: IssueRef::new(repository.clone(), number),
            title: self.title,
            body: self.body.unwrap_or_default(),
            state,
            state_reason: self
                .state_reason
                .as_deref()
                .and_then(|reason| StateReason::try_from(reason).ok()),
            milestone: self
                .milestone
                .map(|milestone| MilestoneNumber::new(milestone.number)),
        })
    }
}

#[async_trait]
impl IssueTracker for GitHubIssueTracker {
    async fn get_issue(&self, issue_ref: &IssueRef) -> IssueTrackerResult<TrackedIssue> {
        let request = self.http.get(self.issue_url(issue_ref));
        let payload: IssuePayload = self.request_json(&issue_ref.to_string(), request).await?;
        payload.into_tracked(issue_ref.repository())
    }

    async fn edit_issue(&self, issue_ref: &IssueRef, edit: &IssueEdit) -> IssueTrackerResult<()> {
        debug!(issue = %issue_ref, state = ?edit.state, body = edit.body.is_some(), "editing issue");
        let request = self.http.patch(self.issue_url(issue_ref)).json(&EditIssueRequest {
            state: edit.state.map(IssueState::as_str),
            state_reason: edit.state_reason.map(StateReason::as_str),
            body: edit.body.as_deref(),
        });
        let _: serde_json::Value = self.request_json(&issue_ref.to_string(), request).await?;
        Ok(())
    }

    async fn create_issue(
        &self,
        repository: &RepositoryFullName,
        title: &str,
        milestone: Option<MilestoneNumber>,
    ) -> IssueTrackerResult<IssueRef> {
        let request = self
            .http
            .post(format!("{}/repos/{}/issues", self.api_base, repository))
            .json(&CreateIssueRequest {
                title,
                milestone: milestone.map(MilestoneNumber::value),
            });
        let created: CreatedIssuePayload =
            self.request_json(repository.as_str(), request).await?;
        let number = IssueNumber::new(created.number).map_err(IssueTrackerError::transport)?;
        debug!(repository = %repository, number = created.number, "created issue");
        Ok(IssueRef::new(repository.clone(), number))
    }

    async fn upsert_comment(
        &self,
        issue_ref: &IssueRef,
        comment: Option<CommentId>,
        text: &str,
    ) -> IssueTrackerResult<CommentId> {
        let known = match comment {
            Some(id) => Some(id),
            None => self.find_bot_comment(issue_ref).await?,
        };
        if let Some(id) = known {
            match self.edit_comment(issue_ref, id, text).await {
                Err(IssueTrackerError::NotFound(_)) => {}
                other => return other,
            }
        }
        let request = self
            .http
            .post(format!("{}/comments", self.issue_url(issue_ref)))
            .json(&CommentRequest { body: text });
        let created: CommentPayload = self.request_json(&issue_ref.to_string(), request).await?;
        Ok(CommentId::new(created.id))
    }

    async fn find_repository(
        &self,
        repository: &RepositoryFullName,
    ) -> IssueTrackerResult<Option<RepositoryFullName>> {
        let request = self
            .http
            .get(format!("{}/repos/{}", self.api_base, repository));
        match self
            .request_json::<RepositoryPayload>(repository.as_str(), request)
            .await
        {
            Ok(found) => RepositoryFullName::new(found.full_name)
                .map(Some)
                .map_err(IssueTrackerError::transport),
            Err(IssueTrackerError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
