use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;

use crate::error::{ApiError, ApiResult};

const USERNAME_MAX: usize = 150;
const EMAIL_MAX: usize = 254;
const NAME_MAX: usize = 256;
const SLUG_MAX: usize = 50;
pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 10;

// Word characters (unicode), '.', '@', '+' and '-'.
static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

// URL-safe: ASCII letters, digits, underscores and hyphens.
static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());

/// Validates a username for signup, token requests and profile updates alike.
/// The literal name "me" is reserved for the profile endpoint path.
pub fn validate_username(value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::validation("username", "username is required."));
    }
    if value.chars().count() > USERNAME_MAX {
        return Err(ApiError::validation(
            "username",
            format!("username too long (max {USERNAME_MAX} characters)."),
        ));
    }
    if !USERNAME_RE.is_match(value) {
        return Err(ApiError::validation(
            "username",
            "enter a valid username.",
        ));
    }
    if value == "me" {
        return Err(ApiError::validation(
            "username",
            "username \"me\" is not allowed.",
        ));
    }
    Ok(())
}

pub fn validate_email(value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::validation("email", "email is required."));
    }
    if value.chars().count() > EMAIL_MAX {
        return Err(ApiError::validation(
            "email",
            format!("email too long (max {EMAIL_MAX} characters)."),
        ));
    }
    // Minimal well-formedness check; real deliverability is the mail
    // gateway's problem.
    let well_formed = value
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(ApiError::validation("email", "enter a valid email address."));
    }
    Ok(())
}

pub fn validate_slug(value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::validation("slug", "slug is required."));
    }
    if value.chars().count() > SLUG_MAX {
        return Err(ApiError::validation(
            "slug",
            format!("slug too long (max {SLUG_MAX} characters)."),
        ));
    }
    if !SLUG_RE.is_match(value) {
        return Err(ApiError::validation("slug", "slug must be URL-safe."));
    }
    Ok(())
}

pub fn validate_name(field: &'static str, value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::validation(field, "this field is required."));
    }
    if value.chars().count() > NAME_MAX {
        return Err(ApiError::validation(
            field,
            format!("too long (max {NAME_MAX} characters)."),
        ));
    }
    Ok(())
}

/// A title description is optional and may be empty, but the stored column
/// caps it at the same length as a name.
pub fn validate_description(value: &str) -> ApiResult<()> {
    if value.chars().count() > NAME_MAX {
        return Err(ApiError::validation(
            "description",
            format!("too long (max {NAME_MAX} characters)."),
        ));
    }
    Ok(())
}

/// A title year must not lie in the future.
pub fn validate_year(value: i32) -> ApiResult<()> {
    let current_year = Utc::now().year();
    if value > current_year {
        return Err(ApiError::validation("year", "enter a real year."));
    }
    Ok(())
}

/// Review scores are integers in [1, 10].
pub fn validate_score(value: i32) -> ApiResult<()> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
        return Err(ApiError::validation(
            "score",
            format!("score must be between {MIN_SCORE} and {MAX_SCORE}."),
        ));
    }
    Ok(())
}

pub fn validate_text(value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::validation("text", "this field is required."));
    }
    Ok(())
}
