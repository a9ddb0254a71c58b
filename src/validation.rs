//! Bail-style input rules. Each helper checks one rule for one field and
//! returns the first failure as [`AppError::Validation`]; callers check
//! fields in order, so the client only ever sees one message.

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Numeric id as sent by clients: a JSON number or a string of digits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IdInput {
    Number(i64),
    Text(String),
}

impl IdInput {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            IdInput::Number(n) => Some(*n),
            IdInput::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn fail<T>(message: String) -> AppResult<T> {
    Err(AppError::Validation(message))
}

/// Present and not blank. Returns the value trimmed.
pub fn required<'a>(field: &str, value: Option<&'a str>) -> AppResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => fail(format!("The {} field is required.", label(field))),
    }
}

/// Present and free of whitespace at the ends. Passwords are taken verbatim.
pub fn required_raw<'a>(field: &str, value: Option<&'a str>) -> AppResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => fail(format!("The {} field is required.", label(field))),
    }
}

pub fn id(field: &str, value: Option<&IdInput>) -> AppResult<i64> {
    let Some(value) = value else {
        return fail(format!("The {} field is required.", label(field)));
    };
    if matches!(value, IdInput::Text(s) if s.trim().is_empty()) {
        return fail(format!("The {} field is required.", label(field)));
    }
    match value.as_i64() {
        Some(n) => Ok(n),
        None => fail(format!("The {} must be a number.", label(field))),
    }
}

/// Like [`id`], but also rejects negatives (offsets, limits).
pub fn non_negative(field: &str, value: Option<&IdInput>) -> AppResult<i64> {
    let n = id(field, value)?;
    if n < 0 {
        return fail(format!("The {} must be at least 0.", label(field)));
    }
    Ok(n)
}

/// Syntactic check: one `@`, a non-empty local part and a dotted domain.
pub fn email(field: &str, value: &str) -> AppResult<()> {
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !value.chars().any(char::is_whitespace)
                && domain.contains('.')
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        fail(format!("The {} must be a valid email address.", label(field)))
    }
}

pub fn min_chars(field: &str, value: &str, min: usize) -> AppResult<()> {
    if value.chars().count() < min {
        return fail(format!(
            "The {} must be at least {} characters.",
            label(field),
            min
        ));
    }
    Ok(())
}

pub fn max_chars(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.chars().count() > max {
        return fail(format!(
            "The {} must not be greater than {} characters.",
            label(field),
            max
        ));
    }
    Ok(())
}

pub fn confirmed(field: &str, value: &str, confirmation: Option<&str>) -> AppResult<()> {
    if confirmation != Some(value) {
        return fail(format!("The {} confirmation does not match.", label(field)));
    }
    Ok(())
}

/// Outcome of an `exists` lookup against the store.
pub fn exists(field: &str, found: bool) -> AppResult<()> {
    if !found {
        return fail(format!("The selected {} is invalid.", label(field)));
    }
    Ok(())
}

/// Like [`exists`], handing back the record that was looked up.
pub fn found<T>(field: &str, record: Option<T>) -> AppResult<T> {
    record.ok_or_else(|| {
        AppError::Validation(format!("The selected {} is invalid.", label(field)))
    })
}

pub fn unique(field: &str, taken: bool) -> AppResult<()> {
    if taken {
        return fail(format!("The {} has already been taken.", label(field)));
    }
    Ok(())
}

/// Length bounds for new passwords.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min: usize,
    pub max: usize,
}

impl PasswordPolicy {
    /// required, min, max, confirmed; in that order.
    pub fn check<'a>(
        &self,
        field: &str,
        value: Option<&'a str>,
        confirmation: Option<&str>,
    ) -> AppResult<&'a str> {
        let password = required_raw(field, value)?;
        min_chars(field, password, self.min)?;
        max_chars(field, password, self.max)?;
        confirmed(field, password, confirmation)?;
        Ok(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message<T: std::fmt::Debug>(result: AppResult<T>) -> String {
        match result.unwrap_err() {
            AppError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    const POLICY: PasswordPolicy = PasswordPolicy { min: 8, max: 16 };

    #[test]
    fn required_rejects_missing_and_blank() {
        assert_eq!(message(required("email", None)), "The email field is required.");
        assert_eq!(
            message(required("user_id", Some("   "))),
            "The user id field is required."
        );
        assert_eq!(required("title", Some("  hello  ")).unwrap(), "hello");
    }

    #[test]
    fn id_accepts_numbers_and_numeric_strings() {
        assert_eq!(id("user_id", Some(&IdInput::Number(7))).unwrap(), 7);
        assert_eq!(id("user_id", Some(&IdInput::Text(" 12 ".into()))).unwrap(), 12);
        assert_eq!(
            message(id("user_id", Some(&IdInput::Text("abc".into())))),
            "The user id must be a number."
        );
        assert_eq!(message(id("id", None)), "The id field is required.");
    }

    #[test]
    fn id_input_deserializes_from_json_number_or_string() {
        let n: IdInput = serde_json::from_str("5").unwrap();
        let s: IdInput = serde_json::from_str("\"5\"").unwrap();
        assert_eq!(n.as_i64(), Some(5));
        assert_eq!(s.as_i64(), Some(5));
    }

    #[test]
    fn non_negative_rejects_negative() {
        assert_eq!(non_negative("limit", Some(&IdInput::Number(0))).unwrap(), 0);
        assert_eq!(
            message(non_negative("offset", Some(&IdInput::Number(-1)))),
            "The offset must be at least 0."
        );
    }

    #[test]
    fn email_shape() {
        assert!(email("email", "a@x.com").is_ok());
        assert!(email("email", "first.last@mail.example.org").is_ok());
        for bad in ["ax.com", "@x.com", "a@x", "a@@x.com", "a b@x.com", "a@x..com", "a@.com"] {
            assert_eq!(
                message(email("email", bad)),
                "The email must be a valid email address.",
                "{bad}"
            );
        }
    }

    #[test]
    fn char_bounds_count_characters_not_bytes() {
        assert!(min_chars("title", "héllo", 5).is_ok());
        assert_eq!(
            message(min_chars("title", "hey", 5)),
            "The title must be at least 5 characters."
        );
        assert_eq!(
            message(max_chars("password", &"x".repeat(17), 16)),
            "The password must not be greater than 16 characters."
        );
    }

    #[test]
    fn password_policy_bails_in_order() {
        assert_eq!(
            message(POLICY.check("password", None, None)),
            "The password field is required."
        );
        assert_eq!(
            message(POLICY.check("password", Some("short"), Some("short"))),
            "The password must be at least 8 characters."
        );
        assert_eq!(
            message(POLICY.check("password", Some("a-very-long-password"), None)),
            "The password must not be greater than 16 characters."
        );
        assert_eq!(
            message(POLICY.check("password", Some("password1"), Some("password2"))),
            "The password confirmation does not match."
        );
        assert_eq!(
            POLICY
                .check("password", Some("password1"), Some("password1"))
                .unwrap(),
            "password1"
        );
    }

    #[test]
    fn exists_and_unique_messages() {
        assert_eq!(
            message(exists("user_id", false)),
            "The selected user id is invalid."
        );
        assert_eq!(
            message(unique("email", true)),
            "The email has already been taken."
        );
        assert!(exists("user_id", true).is_ok());
        assert_eq!(found("email", Some(3)).unwrap(), 3);
        assert_eq!(
            message(found::<i64>("email", None)),
            "The selected email is invalid."
        );
        assert!(unique("email", false).is_ok());
    }
}
