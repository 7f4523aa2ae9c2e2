use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{listing::ListingError, pages::PageError},
    infra::{error::InfraError, export::ExportError},
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
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

impl From<PageError> for HttpError {
    fn from(error: PageError) -> Self {
        match &error {
            PageError::NotFound { .. } => HttpError::from_error(
                "application::error::page_error",
                StatusCode::NOT_FOUND,
                "Page not found",
                &error,
            ),
            PageError::Fetch(_) => HttpError::from_error(
                "application::error::page_error",
                StatusCode::BAD_GATEWAY,
                "Content is temporarily unavailable",
                &error,
            ),
            PageError::Render(_) => HttpError::from_error(
                "application::error::page_error",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                &error,
            ),
        }
    }
}

impl From<ListingError> for HttpError {
    fn from(error: ListingError) -> Self {
        let status = match &error {
            ListingError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ListingError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpError::from_error(
            "application::error::listing_error",
            status,
            "Content is temporarily unavailable",
            &error,
        )
    }
}

/// Failures that end the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{content::QueryError, store::StoreError};

    #[test]
    fn report_collects_the_source_chain() {
        let error = PageError::Fetch(QueryError::Store(StoreError::Unavailable(
            "connection refused".to_string(),
        )));
        let report = ErrorReport::from_error("test", StatusCode::BAD_GATEWAY, &error);

        assert_eq!(report.messages.len(), 2);
        assert_eq!(report.messages[0], "failed to load page content");
        assert!(report.messages[1].contains("connection refused"));
    }

    #[test]
    fn page_errors_map_to_distinct_statuses() {
        let not_found = HttpError::from(PageError::NotFound {
            slug: "missing".to_string(),
        });
        let fetch = HttpError::from(PageError::Fetch(QueryError::Store(
            StoreError::Unavailable("down".to_string()),
        )));

        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(fetch.status(), StatusCode::BAD_GATEWAY);
    }
}
