use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;
use validator::{Validate, ValidationError, ValidationErrors};

use super::dto::{
    Credentials, LoginRequest, NewAccount, RegisterRequest, UpdateUserRequest, UserChanges,
};
use crate::error::AppError;

const NOT_EMPTY: &str = "should not be empty";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}

pub(crate) fn email_address(value: &str) -> Result<(), ValidationError> {
    if !is_valid_email(value) {
        return Err(ValidationError::new("email"));
    }
    Ok(())
}

/// Joins failed constraints into one message: `, ` within a field, `; `
/// between fields, fields in `order`.
fn flatten(errors: &ValidationErrors, order: &[&str]) -> String {
    let by_field = errors.field_errors();
    order
        .iter()
        .filter_map(|field| {
            let mut messages: Vec<Cow<'static, str>> = by_field
                .get(*field)?
                .iter()
                .map(|e| e.message.clone().unwrap_or_else(|| e.code.clone()))
                .collect();
            messages.sort_by_key(|m| m != NOT_EMPTY);
            let joined = messages
                .iter()
                .map(|m| format!("{field} {m}"))
                .collect::<Vec<_>>()
                .join(", ");
            Some(joined)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn checked<T: Validate>(value: T, order: &[&str]) -> Result<T, AppError> {
    value
        .validate()
        .map_err(|e| AppError::BadRequest(flatten(&e, order)))?;
    Ok(value)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl RegisterRequest {
    pub fn validate(self) -> Result<NewAccount, AppError> {
        let account = NewAccount {
            username: self.username.unwrap_or_default().trim().to_string(),
            email: normalize_email(&self.email.unwrap_or_default()),
            password: self.password.unwrap_or_default(),
        };
        checked(account, &["username", "email", "password"])
    }
}

impl LoginRequest {
    pub fn validate(self) -> Result<Credentials, AppError> {
        let creds = Credentials {
            username: self.username.unwrap_or_default().trim().to_string(),
            password: self.password.unwrap_or_default(),
        };
        checked(creds, &["username", "password"])
    }
}

impl UpdateUserRequest {
    pub fn validate(self) -> Result<UserChanges, AppError> {
        let changes = UserChanges {
            email: self
                .email
                .map(|e| normalize_email(&e))
                .filter(|e| !e.is_empty()),
            password: self.password.filter(|p| !p.is_empty()),
        };
        checked(changes, &["email", "password"])
    }
}
