//! Input rules shared by the account endpoints.
//!
//! Field rules are declared with `validator`; a failure becomes a
//! `DomainError::Validation` carrying the message of the first failing field.

use std::sync::LazyLock;

use domains::DomainError;
use regex::Regex;
use validator::{Validate, ValidationErrors};

pub const USERNAME_MIN: usize = 3;

static USERNAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").expect("username pattern compiles"));

/// A signup after trimming and normalization, ready to be checked.
#[derive(Debug, Clone, Validate)]
pub struct NewAccount {
    #[validate(length(min = 1, max = 80, message = "full_name must be between 1 and 80 characters"))]
    pub full_name:    String,
    #[validate(length(min = 6, max = 25, message = "phone_number must be between 6 and 25 characters"))]
    pub phone_number: Option<String>,
    #[validate(
        length(min = 3, max = 30, message = "username must be between 3 and 30 characters"),
        regex(path = *USERNAME_CHARS, message = "username may only contain letters, digits, '_' and '.'")
    )]
    pub username:     String,
    #[validate(email(message = "email is not a valid address"))]
    pub email:        String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password:     String,
}

impl NewAccount {
    const FIELD_ORDER: [&'static str; 5] = ["full_name", "phone_number", "username", "email", "password"];

    pub fn check(&self) -> Result<(), DomainError> {
        self.validate().map_err(|errors| first_failure(&errors, &Self::FIELD_ORDER))
    }
}

#[derive(Debug, Validate)]
struct NewPassword {
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    password: String,
}

/// Usernames are stored lower-cased and trimmed.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Blank means "no phone number".
pub fn normalize_phone(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string)
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    NewPassword { password: password.to_string() }
        .validate()
        .map_err(|errors| first_failure(&errors, &["password"]))
}

/// `ValidationErrors` is unordered; report fields in the order the form shows them.
fn first_failure(errors: &ValidationErrors, order: &[&str]) -> DomainError {
    let fields = errors.field_errors();
    let message = order
        .iter()
        .filter_map(|name| fields.get(*name))
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "invalid input".to_string());
    DomainError::Validation(message)
}
