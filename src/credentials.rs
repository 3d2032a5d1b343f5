use crate::errors::AppError;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Email and password for one account, as handed to an operator.
#[derive(Clone, Serialize)]
pub struct Credential {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Random 32-character hex password drawn from a v4 UUID (122 random bits).
pub fn generate_password() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Uses `supplied` when given, after checking its length, or generates one.
pub fn choose_password(supplied: Option<String>) -> Result<String, AppError> {
    match supplied {
        Some(password) => {
            if password.chars().count() < MIN_PASSWORD_LEN {
                return Err(AppError::BadRequest(format!(
                    "password must be at least {} characters",
                    MIN_PASSWORD_LEN
                )));
            }
            Ok(password)
        }
        None => Ok(generate_password()),
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        // RFC 5322 simplified: local@domain.tld
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email regex is valid")
    })
}

/// Validate a login email before it is sent to the auth service.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || email.len() > 254 {
        return false;
    }
    if !email_regex().is_match(email) {
        tracing::warn!("Invalid email format: {}", email);
        return false;
    }
    true
}
