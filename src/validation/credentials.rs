use lazy_static::lazy_static;
use regex::Regex;

use super::{ValidationErrors, ValidationResult};

const MAX_EMAIL_LEN: usize = 254;
const MAX_PASSWORD_LEN: usize = 128;
const MIN_LOGIN_PASSWORD_LEN: usize = 6;
const MIN_REGISTER_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Normalized email plus the password exactly as given.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub fn validate_login(email: &str, password: &str) -> ValidationResult<Credentials> {
    let mut errors = ValidationErrors::new();
    let email = check_email(email).map_err(|m| errors.push("email", m)).ok();
    if let Err(m) = check_password_length(password, MIN_LOGIN_PASSWORD_LEN) {
        errors.push("password", m);
    }
    finish(errors, email, password)
}

/// Same as login, plus a minimum of 8 characters and mixed character classes.
pub fn validate_registration(email: &str, password: &str) -> ValidationResult<Credentials> {
    let mut errors = ValidationErrors::new();
    let email = check_email(email).map_err(|m| errors.push("email", m)).ok();
    match check_password_length(password, MIN_REGISTER_PASSWORD_LEN) {
        Err(m) => errors.push("password", m),
        Ok(()) if !has_required_classes(password) => errors.push(
            "password",
            "Password must contain at least one lowercase letter, one uppercase letter, and one number",
        ),
        Ok(()) => {}
    }
    finish(errors, email, password)
}

fn finish(
    errors: ValidationErrors,
    email: Option<String>,
    password: &str,
) -> ValidationResult<Credentials> {
    match email {
        Some(email) if errors.is_empty() => Ok(Credentials {
            email,
            password: password.to_string(),
        }),
        _ => Err(errors),
    }
}

fn check_email(raw: &str) -> Result<String, String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err("Email is required".into());
    }
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(format!("Email cannot exceed {MAX_EMAIL_LEN} characters"));
    }
    if !EMAIL_RE.is_match(&email) {
        return Err("Please provide a valid email address".into());
    }
    Ok(email)
}

fn check_password_length(password: &str, min: usize) -> Result<(), String> {
    let len = password.chars().count();
    if len == 0 {
        return Err("Password is required".into());
    }
    if len < min {
        return Err(format!("Password must be at least {min} characters long"));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password cannot exceed {MAX_PASSWORD_LEN} characters"
        ));
    }
    Ok(())
}

fn has_required_classes(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}
