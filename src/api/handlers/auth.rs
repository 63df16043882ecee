//! Registration and login endpoints.

use super::{FieldErrors, missing_payload};
use crate::{
    api::{AppState, error::ApiError, error::ErrorBody},
    auth::{
        Authenticated, Registration,
        utils::{USERNAME_MAX_LEN, USERNAME_MIN_LEN, normalize_email, valid_email, valid_username},
    },
    model::Role,
};
use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Ignored; new accounts are always `USER`.
    #[serde(default)]
    pub role: Option<String>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    /// Username, or email address when it contains `@`.
    pub login_identifier: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("login_identifier", &self.login_identifier)
            .field("password", &"***")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<Authenticated> for AuthResponse {
    fn from(authenticated: Authenticated) -> Self {
        Self {
            access_token: authenticated.token,
            token_type: "Bearer".to_string(),
            expires_in: authenticated.expires_in,
            user_id: authenticated.identity.id,
            username: authenticated.identity.username,
            role: authenticated.identity.role,
        }
    }
}

fn validate_registration(request: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();

    let username = request.username.trim();
    errors.check(!username.is_empty(), "username", "Username is required");
    let len = username.chars().count();
    errors.check(
        (USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len),
        "username",
        "Username must be between 3 and 50 characters",
    );
    errors.check(
        valid_username(username),
        "username",
        "Username must not contain '@' or whitespace",
    );

    let email = normalize_email(&request.email);
    errors.check(!email.is_empty(), "email", "Email is required");
    errors.check(valid_email(&email), "email", "Email should be valid");

    errors.check(
        !request.password.trim().is_empty(),
        "password",
        "Password is required",
    );

    errors.into_result()
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses (
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 409, description = "Username or email already registered", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(state))]
pub async fn register(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(missing_payload());
    };
    validate_registration(&request)?;

    let authenticated = state
        .authenticator
        .register(Registration {
            username: request.username,
            email: request.email,
            password: SecretString::from(request.password),
            requested_role: request.role,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AuthResponse::from(authenticated))))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 400, description = "Validation failed", body = ErrorBody),
        (status = 401, description = "Invalid username/email or password", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(state))]
pub async fn login(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(missing_payload());
    };

    let mut errors = FieldErrors::new();
    errors.check(
        !request.login_identifier.trim().is_empty(),
        "login_identifier",
        "Login identifier is required",
    );
    errors.check(
        !request.password.trim().is_empty(),
        "password",
        "Password is required",
    );
    errors.into_result()?;

    let authenticated = state
        .authenticator
        .login(&request.login_identifier, &request.password)
        .await?;

    Ok(Json(AuthResponse::from(authenticated)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: None,
        }
    }

    fn field_errors(result: Result<(), ApiError>) -> Vec<String> {
        match result {
            Err(ApiError::Validation(map)) => map.into_keys().collect(),
            Ok(()) => Vec::new(),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(validate_registration(&request("alice", "alice@x.com", "pw1")).is_ok());
    }

    #[test]
    fn registration_reports_each_field() {
        let fields = field_errors(validate_registration(&request("al", "nope", " ")));
        assert_eq!(fields, vec!["email", "password", "username"]);

        let fields = field_errors(validate_registration(&request(
            "al@ice",
            "alice@x.com",
            "pw1",
        )));
        assert_eq!(fields, vec!["username"]);
    }

    #[test]
    fn debug_redacts_passwords() {
        let rendered = format!("{:?}", request("alice", "alice@x.com", "hunter2"));
        assert!(!rendered.contains("hunter2"));

        let login = LoginRequest {
            login_identifier: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{login:?}").contains("hunter2"));
    }
}
