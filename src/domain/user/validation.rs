//! User validation utilities

use thiserror::Error;
use validator::ValidateEmail;

/// Errors that can occur during account payload validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UserValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0} must be a string")]
    NotText(&'static str),

    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Email must be a valid email address")]
    InvalidEmail,

    #[error("{field} must be at least {min} characters")]
    PasswordTooShort { field: &'static str, min: usize },

    #[error("confirmPassword must match password")]
    PasswordMismatch,
}

impl UserValidationError {
    /// Name of the payload field the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField(field) | Self::NotText(field) => field,
            Self::EmptyName => "name",
            Self::InvalidEmail => "email",
            Self::PasswordTooShort { field, .. } => field,
            Self::PasswordMismatch => "confirmPassword",
        }
    }
}

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Validate a display name
///
/// Rules:
/// - Cannot be empty
pub fn validate_name(name: &str) -> Result<(), UserValidationError> {
    if name.is_empty() {
        return Err(UserValidationError::EmptyName);
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), UserValidationError> {
    if email.is_empty() || !email.validate_email() {
        return Err(UserValidationError::InvalidEmail);
    }

    Ok(())
}

/// Validate a password-like field
///
/// Rules:
/// - Minimum 6 characters (counted as chars, not bytes)
pub fn validate_password(field: &'static str, password: &str) -> Result<(), UserValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(UserValidationError::PasswordTooShort {
            field,
            min: MIN_PASSWORD_LENGTH,
        });
    }

    Ok(())
}

/// Validate the password fields of an account update
///
/// `password` becomes required once `old_password` is given, and
/// `confirm_password` becomes required and must equal `password` once
/// `password` is given.
pub fn validate_password_change(
    old_password: Option<&str>,
    password: Option<&str>,
    confirm_password: Option<&str>,
) -> Result<(), UserValidationError> {
    if let Some(old_password) = old_password {
        validate_password("oldPassword", old_password)?;
    }

    match password {
        Some(password) => validate_password("password", password)?,
        None if old_password.is_some() => {
            return Err(UserValidationError::MissingField("password"));
        }
        None => return Ok(()),
    }

    match confirm_password {
        None => Err(UserValidationError::MissingField("confirmPassword")),
        Some(confirm) if Some(confirm) != password => Err(UserValidationError::PasswordMismatch),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_name("A").is_ok());
        assert!(validate_name("Maria da Silva").is_ok());
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(validate_name(""), Err(UserValidationError::EmptyName));
    }

    #[test]
    fn test_not_text_names_its_field() {
        let error = UserValidationError::NotText("confirmPassword");

        assert_eq!(error.field(), "confirmPassword");
        assert_eq!(error.to_string(), "confirmPassword must be a string");
    }

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("a@x.com").is_ok());
        assert!(validate_email("first.last+tag@example.co.uk").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert_eq!(validate_email(""), Err(UserValidationError::InvalidEmail));
        assert_eq!(validate_email("not-an-email"), Err(UserValidationError::InvalidEmail));
        assert_eq!(validate_email("a@"), Err(UserValidationError::InvalidEmail));
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("password", "secret").is_ok());
        assert_eq!(
            validate_password("password", "12345"),
            Err(UserValidationError::PasswordTooShort {
                field: "password",
                min: 6
            })
        );
    }

    #[test]
    fn test_password_length_counts_chars() {
        // 6 chars, 12 bytes
        assert!(validate_password("password", "ééééé1").is_ok());
        assert!(validate_password("password", "éééé1").is_err());
    }

    #[test]
    fn test_no_password_fields() {
        assert!(validate_password_change(None, None, None).is_ok());
    }

    #[test]
    fn test_confirm_without_password_is_ignored() {
        assert!(validate_password_change(None, None, Some("whatever")).is_ok());
    }

    #[test]
    fn test_old_password_requires_password() {
        assert_eq!(
            validate_password_change(Some("oldpass1"), None, None),
            Err(UserValidationError::MissingField("password"))
        );
    }

    #[test]
    fn test_old_password_too_short() {
        let err = validate_password_change(Some("old"), Some("newpass1"), Some("newpass1"))
            .unwrap_err();
        assert_eq!(err.field(), "oldPassword");
    }

    #[test]
    fn test_password_requires_confirmation() {
        assert_eq!(
            validate_password_change(None, Some("newpass1"), None),
            Err(UserValidationError::MissingField("confirmPassword"))
        );
    }

    #[test]
    fn test_password_confirmation_mismatch() {
        assert_eq!(
            validate_password_change(None, Some("newpass1"), Some("different")),
            Err(UserValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn test_full_password_change() {
        assert!(validate_password_change(Some("oldpass1"), Some("newpass1"), Some("newpass1")).is_ok());
    }

    #[test]
    fn test_password_change_without_old_password_is_allowed() {
        assert!(validate_password_change(None, Some("newpass1"), Some("newpass1")).is_ok());
    }
}
