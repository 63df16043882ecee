//! HTTP error taxonomy. Every failure renders as `{timestamp, message, validation_errors?}`.

use crate::{
    auth::{AuthError, GuardError},
    model::RoleParseError,
    store::StoreError,
};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    DuplicateIdentifier(String),
    #[error("Invalid username/email or password")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidRoleName(String),
    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Report a policy denial as a missing resource so identifiers cannot be probed.
    #[must_use]
    pub fn conceal(self) -> Self {
        match self {
            Self::Forbidden(_) => Self::NotFound("Resource not found".to_string()),
            other => other,
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateIdentifier(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRoleName(_) | Self::Validation(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, validation_errors) = match self {
            Self::Internal(detail) => {
                error!("internal error: {detail}");
                ("An unexpected error occurred".to_string(), None)
            }
            Self::Validation(errors) => ("Validation failed".to_string(), Some(errors)),
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message,
            validation_errors,
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DuplicateIdentifier(field) => {
                Self::DuplicateIdentifier(AuthError::DuplicateIdentifier(field).to_string())
            }
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::Store(err) => err.into(),
            AuthError::Hash(err) => Self::Internal(err.to_string()),
            AuthError::Token(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(field) => AuthError::DuplicateIdentifier(field).into(),
            StoreError::MissingOwner(_) => Self::NotFound("User not found".to_string()),
            other @ (StoreError::Corrupt(_) | StoreError::Database(_)) => {
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<RoleParseError> for ApiError {
    fn from(err: RoleParseError) -> Self {
        Self::InvalidRoleName(err.to_string())
    }
}

impl From<GuardError> for ApiError {
    fn from(_: GuardError) -> Self {
        Self::Unauthenticated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UniqueField;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (ApiError::DuplicateIdentifier("x".into()), StatusCode::CONFLICT),
            (ApiError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::InvalidRoleName("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Validation(BTreeMap::new()), StatusCode::BAD_REQUEST),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn conceal_only_touches_forbidden() {
        assert!(matches!(
            ApiError::Forbidden("Access denied".into()).conceal(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::InvalidCredentials.conceal(),
            ApiError::InvalidCredentials
        ));
    }

    #[tokio::test]
    async fn unauthenticated_sets_challenge_header() {
        let response = ApiError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE),
            Some(&HeaderValue::from_static("Bearer"))
        );
        let body = body_json(response).await;
        assert_eq!(body["message"], "Authentication required");
        assert!(body["timestamp"].as_str().is_some_and(|ts| ts.ends_with('Z')));
        assert!(body.get("validation_errors").is_none());
    }

    #[tokio::test]
    async fn validation_errors_are_listed() {
        let mut errors = BTreeMap::new();
        errors.insert("title".to_string(), "Title is required".to_string());
        let body = body_json(ApiError::Validation(errors).into_response()).await;
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["validation_errors"]["title"], "Title is required");
    }

    #[tokio::test]
    async fn internal_details_stay_in_logs() {
        let response = ApiError::Internal("connection refused on 10.0.0.3".into()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], "An unexpected error occurred");
    }

    #[test]
    fn domain_errors_convert() {
        let err: ApiError = StoreError::Conflict(UniqueField::Email).into();
        assert!(matches!(err, ApiError::DuplicateIdentifier(ref m) if m == "Email is already in use"));

        let err: ApiError = "root".parse::<crate::model::Role>().unwrap_err().into();
        assert_eq!(
            err.to_string(),
            "Invalid role: root. Valid roles are USER, ADMIN."
        );

        let err: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
