//! Input validation for player names, passwords and contact addresses.

use thiserror::Error;

/// Minimum player name length.
pub const MIN_NAME_LENGTH: usize = 3;

/// Maximum player name length.
pub const MAX_NAME_LENGTH: usize = 16;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Player name is too short.
    #[error("player name must be at least {MIN_NAME_LENGTH} characters")]
    NameTooShort,

    /// Player name is too long.
    #[error("player name must be at most {MAX_NAME_LENGTH} characters")]
    NameTooLong,

    /// Player name contains invalid characters.
    #[error("player name can only contain alphanumeric characters and underscores")]
    NameInvalidChars,

    /// Password is too short.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,

    /// Password is too long.
    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    PasswordTooLong,

    /// Email is too long.
    #[error("email must be at most {MAX_EMAIL_LENGTH} characters")]
    EmailTooLong,

    /// Email format is invalid.
    #[error("invalid email format")]
    EmailInvalidFormat,
}

/// Validate a player name.
///
/// Requirements:
/// - Length: 3-16 characters
/// - Characters: alphanumeric (a-z, A-Z, 0-9) and underscore (_)
///
/// # Examples
///
/// ```
/// use logingate::auth::validation::validate_player_name;
///
/// assert!(validate_player_name("Notch").is_ok());
/// assert!(validate_player_name("ab").is_err()); // too short
/// assert!(validate_player_name("no spaces").is_err());
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.len() < MIN_NAME_LENGTH {
        return Err(ValidationError::NameTooShort);
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::NameTooLong);
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::NameInvalidChars);
    }

    Ok(())
}

/// Check whether a string is a valid player name.
pub fn is_valid_player_name(name: &str) -> bool {
    validate_player_name(name).is_ok()
}

/// Validate a password.
///
/// Requirements:
/// - Length: 8-128 characters
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooLong);
    }
    Ok(())
}

/// Validate an email address.
///
/// An empty string is accepted; it means "no contact address".
///
/// # Examples
///
/// ```
/// use logingate::auth::validation::validate_email;
///
/// assert!(validate_email("").is_ok());
/// assert!(validate_email("steve@example.com").is_ok());
/// assert!(validate_email("invalid").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Ok(());
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong);
    }

    if email.chars().any(|c| c.is_whitespace()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::EmailInvalidFormat);
    };

    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ValidationError::EmailInvalidFormat);
    }

    if domain.split('.').any(|p| p.is_empty()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    Ok(())
}
