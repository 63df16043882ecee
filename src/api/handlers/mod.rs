//! Route handlers.
//!
//! Handlers validate input, consult the authorization policy, and only then
//! touch the stores. Resource-scoped routes report a policy denial as 404.

pub mod admin;
pub mod auth;
pub mod health;
pub mod root;
pub mod tasks;
pub mod users;

use super::error::ApiError;
use crate::auth::{Decision, Principal};
use std::collections::BTreeMap;

/// Field → message map collected during validation.
#[derive(Debug, Default)]
pub(crate) struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record the first failure per field.
    pub(crate) fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub(crate) fn check(&mut self, condition: bool, field: &str, message: &str) {
        if !condition {
            self.add(field, message);
        }
    }

    pub(crate) fn into_result(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.0))
        }
    }
}

pub(crate) fn missing_payload() -> ApiError {
    ApiError::BadRequest("Missing or invalid payload".to_string())
}

/// Policy denials surface as [`ApiError::Forbidden`]; callers decide whether to conceal them.
pub(crate) fn enforce(decision: Decision) -> Result<(), ApiError> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(ApiError::Forbidden("Access denied".to_string())),
    }
}

pub(crate) fn require_admin(principal: &Principal) -> Result<(), ApiError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Administrator role required".to_string(),
        ))
    }
}
