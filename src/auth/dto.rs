use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;
use crate::users::repo_types::PublicAccount;

pub(crate) const NAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn check_name(errors: &mut ValidationErrors, field: &'static str, value: &str) {
    let len = value.chars().count();
    if len == 0 || len > NAME_MAX {
        errors.add(field, format!("must be between 1 and {NAME_MAX} characters"));
    }
}

/// Request body for registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegisterRequest {
    /// Trims the email and reports every violated constraint.
    pub fn validate(mut self) -> Result<Self, ValidationErrors> {
        self.email = self.email.trim().to_string();
        let mut errors = ValidationErrors::new();
        if !is_valid_email(&self.email) {
            errors.add("email", "must be a valid email address");
        }
        check_name(&mut errors, "firstName", &self.first_name);
        check_name(&mut errors, "lastName", &self.last_name);
        if self.password.chars().count() < PASSWORD_MIN {
            errors.add(
                "password",
                format!("must be at least {PASSWORD_MIN} characters"),
            );
        }
        errors.into_result(self)
    }
}

/// Request body for login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(mut self) -> Result<Self, ValidationErrors> {
        self.email = self.email.trim().to_string();
        let mut errors = ValidationErrors::new();
        if !is_valid_email(&self.email) {
            errors.add("email", "must be a valid email address");
        }
        if self.password.is_empty() {
            errors.add("password", "must not be empty");
        }
        errors.into_result(self)
    }
}

/// Account without its hash, plus a freshly issued token.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub user: PublicAccount,
    pub token: String,
}

/// Response returned after register or login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub user: PublicAccount,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, first: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            first_name: first.into(),
            last_name: "User".into(),
            password: password.into(),
        }
    }

    #[test]
    fn register_accepts_valid_input_and_trims_email() {
        let ok = register("  Test@Example.com ", "Test", "password123")
            .validate()
            .unwrap();
        assert_eq!(ok.email, "Test@Example.com");
    }

    #[test]
    fn register_reports_every_violation() {
        let err = register("not-an-email", "", "short").validate().unwrap_err();
        assert_eq!(err.fields(), vec!["email", "firstName", "password"]);

        let long = "x".repeat(51);
        let err = register("a@b.co", &long, "password123").validate().unwrap_err();
        assert_eq!(err.fields(), vec!["firstName"]);
    }

    #[test]
    fn login_requires_email_and_password() {
        let err = LoginRequest {
            email: "nope".into(),
            password: String::new(),
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.fields(), vec!["email", "password"]);
    }
}
