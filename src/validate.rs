use lazy_static::lazy_static;
use regex::Regex;

use crate::error::FieldErrors;

pub const MIN_PASSWORD_LEN: usize = 10;
pub const MAX_TEXT_LEN: usize = 255;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn too_long(value: &str) -> bool {
    value.chars().count() > MAX_TEXT_LEN
}

/// Required free-text field: trimmed, non-blank, at most 255 characters.
pub fn required_text(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<&str>,
) -> Option<String> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if too_long(value) {
        errors.add(
            field,
            format!("Ensure this field has no more than {MAX_TEXT_LEN} characters."),
        );
        return None;
    }
    Some(value.to_string())
}

/// Returns the normalized address when it is acceptable. Lower-casing can
/// grow a string, so the length is checked on the normalized form.
pub fn email(errors: &mut FieldErrors, value: Option<&str>) -> Option<String> {
    let Some(raw) = value else {
        errors.add("email", REQUIRED);
        return None;
    };
    let email = normalize_email(raw);
    if email.is_empty() {
        errors.add("email", BLANK);
        return None;
    }
    if too_long(&email) {
        errors.add(
            "email",
            format!("Ensure this field has no more than {MAX_TEXT_LEN} characters."),
        );
        return None;
    }
    if !is_valid_email(&email) {
        errors.add("email", "Enter a valid email address.");
        return None;
    }
    Some(email)
}

/// Passwords are taken verbatim, whitespace included.
pub fn new_password<'a>(errors: &mut FieldErrors, value: Option<&'a str>) -> Option<&'a str> {
    let Some(password) = value else {
        errors.add("password", REQUIRED);
        return None;
    };
    if password.is_empty() {
        errors.add("password", BLANK);
        return None;
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        );
        return None;
    }
    Some(password)
}

/// Presence check only, for credential exchange.
pub fn given_password<'a>(errors: &mut FieldErrors, value: Option<&'a str>) -> Option<&'a str> {
    match value {
        None => {
            errors.add("password", REQUIRED);
            None
        }
        Some("") => {
            errors.add("password", BLANK);
            None
        }
        Some(p) => Some(p),
    }
}
