//! Account naming rules.

use thiserror::Error;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("username is required")]
    Empty,
    #[error("username must be at most {MAX_USERNAME_LEN} characters")]
    TooLong,
    #[error("username may contain only letters, numbers, and @/./+/-/_ characters")]
    InvalidCharacters,
}

/// Usernames appear in `/profile/<username>/`; letters of any script are allowed.
pub fn validate_username(username: &str) -> Result<(), UsernameError> {
    if username.is_empty() {
        return Err(UsernameError::Empty);
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(UsernameError::TooLong);
    }
    if !username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(UsernameError::InvalidCharacters);
    }
    Ok(())
}
