use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        accounts::AccountError, comments::CommentError, feed::FeedError, follows::FollowError,
        groups::GroupError, posts::PostError, repos::RepoError,
    },
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Error chain attached to a response for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn internal(source: &'static str, error: &dyn StdError) -> Self {
        Self::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            error,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

pub fn repo_error_to_http(source: &'static str, error: RepoError) -> HttpError {
    match &error {
        RepoError::Timeout => HttpError::from_error(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
            &error,
        ),
        RepoError::NotFound => {
            HttpError::from_error(source, StatusCode::NOT_FOUND, "Not found", &error)
        }
        RepoError::Duplicate { .. } => {
            HttpError::from_error(source, StatusCode::CONFLICT, "Conflict", &error)
        }
        RepoError::InvalidInput { .. } => {
            HttpError::from_error(source, StatusCode::BAD_REQUEST, "Invalid input", &error)
        }
        RepoError::Persistence(_) | RepoError::Integrity { .. } => {
            HttpError::internal(source, &error)
        }
    }
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        match error {
            FeedError::Repo(err) => repo_error_to_http("application::feed", err),
        }
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        const SOURCE: &str = "application::posts";
        match error {
            PostError::Repo(err) => repo_error_to_http(SOURCE, err),
            PostError::Storage(ref err) => HttpError::internal(SOURCE, err),
            PostError::Invalid { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid post",
                &error,
            ),
        }
    }
}

impl From<CommentError> for HttpError {
    fn from(error: CommentError) -> Self {
        const SOURCE: &str = "application::comments";
        match error {
            CommentError::Repo(err) => repo_error_to_http(SOURCE, err),
            CommentError::PostNotFound => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            CommentError::Invalid(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid comment",
                &error,
            ),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        const SOURCE: &str = "application::follows";
        match error {
            FollowError::Repo(err) => repo_error_to_http(SOURCE, err),
            FollowError::AuthorNotFound => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
        }
    }
}

impl From<AccountError> for HttpError {
    fn from(error: AccountError) -> Self {
        const SOURCE: &str = "application::accounts";
        match error {
            AccountError::Repo(err) => repo_error_to_http(SOURCE, err),
            AccountError::PasswordHash(_) => HttpError::internal(SOURCE, &error),
            AccountError::Invalid(_) | AccountError::InvalidCredentials => {
                HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Invalid account form", &error)
            }
        }
    }
}

impl From<GroupError> for HttpError {
    fn from(error: GroupError) -> Self {
        const SOURCE: &str = "application::groups";
        match error {
            GroupError::Repo(err) => repo_error_to_http(SOURCE, err),
            GroupError::DuplicateSlug(_) => HttpError::from_error(
                SOURCE,
                StatusCode::CONFLICT,
                "Group slug already exists",
                &error,
            ),
            GroupError::InvalidTitle | GroupError::InvalidSlug(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid group",
                &error,
            ),
        }
    }
}

/// Process-level failures surfaced by `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Domain(DomainError::Validation { .. })
            | AppError::Validation(_)
            | AppError::Group(GroupError::InvalidTitle | GroupError::InvalidSlug(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Group(GroupError::DuplicateSlug(_)) => StatusCode::CONFLICT,
            AppError::Infra(InfraError::Database { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_)
            | AppError::Group(GroupError::Repo(_))
            | AppError::Domain(DomainError::Invariant { .. })
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self.status_code() {
            StatusCode::NOT_FOUND => "Resource not found",
            StatusCode::BAD_REQUEST => "Request could not be processed",
            StatusCode::CONFLICT => "Resource already exists",
            StatusCode::SERVICE_UNAVAILABLE => "Service temporarily unavailable",
            _ => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_collects_error_chain() {
        let inner = std::io::Error::other("disk on fire");
        let outer = InfraError::from(inner);
        let report =
            ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &outer);
        assert_eq!(report.messages[0], "io error: disk on fire");
    }

    #[test]
    fn repo_errors_map_to_statuses() {
        assert_eq!(
            repo_error_to_http("test", RepoError::Timeout).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            repo_error_to_http(
                "test",
                RepoError::Duplicate {
                    constraint: "groups_slug_key".into()
                }
            )
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            repo_error_to_http("test", RepoError::from_persistence("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn app_error_carries_report_extension() {
        let response = AppError::Group(GroupError::DuplicateSlug("cats".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let report = response.extensions().get::<ErrorReport>().expect("report");
        assert!(report.messages[0].contains("cats"));
    }
}
