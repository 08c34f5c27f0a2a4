use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// A single violated input constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every constraint an input violated, collected in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.field).collect()
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("User with this email already exists")]
    Conflict,

    /// Bad credentials, inactive account and bad tokens all collapse here.
    #[error("Invalid credentials")]
    Unauthorized,

    #[error("User not found")]
    NotFound,

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Dependency(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add("body", rejection.body_text());
        AppError::Validation(errors)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add("query", rejection.body_text());
        AppError::Validation(errors)
    }
}

impl From<crate::users::repo::StoreError> for AppError {
    fn from(err: crate::users::repo::StoreError) -> Self {
        use crate::users::repo::StoreError;
        match err {
            StoreError::DuplicateEmail => AppError::Conflict,
            StoreError::Backend(e) => AppError::Dependency(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AppError::Conflict => (StatusCode::CONFLICT, "conflict"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Dependency(e) => {
                error!(error = ?e, "dependency failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = match self {
            AppError::Validation(fields) => json!({
                "error": {
                    "type": error_type,
                    "message": "Validation failed",
                    "fields": fields,
                }
            }),
            AppError::Dependency(_) => json!({
                "error": {
                    "type": error_type,
                    "message": "An internal error occurred",
                }
            }),
            other => json!({
                "error": {
                    "type": error_type,
                    "message": other.to_string(),
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_collect_every_field() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "must be a valid email");
        errors.add("firstName", "must be 1-50 characters");
        assert_eq!(errors.fields(), vec!["email", "firstName"]);
        assert!(errors.clone().into_result(()).is_err());
        assert_eq!(
            errors.to_string(),
            "email: must be a valid email; firstName: must be 1-50 characters"
        );
    }

    #[test]
    fn status_codes_per_variant() {
        assert_eq!(AppError::Conflict.into_response().status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Validation(ValidationErrors::new()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Dependency(anyhow::anyhow!("db down")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
