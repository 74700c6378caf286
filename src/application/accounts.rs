//! Sign-up, log-in and cookie sessions.
//!
//! A session token has the shape `ms_<prefix>_<secret>`. Only the prefix and
//! a SHA-256 digest of the secret are persisted; lookups go by prefix and the
//! digest is compared in constant time.

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use metrics::counter;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::forms::{FormErrors, REQUIRED};
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::accounts::{MIN_PASSWORD_LEN, validate_username};
use crate::domain::entities::UserRecord;

const TOKEN_PREFIX: &str = "ms";
const MIN_SECRET_LEN: usize = 32;

pub const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";
pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn’t match.";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("submitted account form is invalid")]
    Invalid(FormErrors),
    #[error("invalid username or password")]
    InvalidCredentials,
}

/// The viewer behind a valid session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct SignupCommand {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone)]
pub struct SessionIssued {
    pub token: String,
    pub user: UserRecord,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
    argon2: Argon2<'static>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
            argon2: Argon2::default(),
        }
    }

    /// Replace the password hasher, e.g. with cheaper parameters in tests.
    pub fn with_argon2(mut self, argon2: Argon2<'static>) -> Self {
        self.argon2 = argon2;
        self
    }

    /// Hash a password on the blocking pool; Argon2 is CPU-bound.
    pub async fn hash_password(&self, password: &str) -> Result<String, AccountError> {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();
        task::spawn_blocking(move || hash_with(&argon2, &password))
            .await
            .map_err(|err| AccountError::PasswordHash(err.to_string()))?
    }

    async fn verify_password(
        &self,
        password: &str,
        password_hash: &str,
    ) -> Result<bool, AccountError> {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();
        task::spawn_blocking(move || verify_with(&argon2, &password, &password_hash))
            .await
            .map_err(|err| AccountError::PasswordHash(err.to_string()))?
    }

    pub async fn signup(&self, cmd: SignupCommand) -> Result<SessionIssued, AccountError> {
        let mut errors = FormErrors::new();

        let username = cmd.username.trim().to_string();
        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if let Err(err) = validate_username(&username) {
            errors.add("username", format!("Enter a valid username. {err}."));
        } else if self.users.find_by_username(&username).await?.is_some() {
            errors.add("username", DUPLICATE_USERNAME);
        }

        let email = cmd.email.trim().to_string();
        if !email.is_empty() && !looks_like_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }

        if cmd.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if cmd.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !cmd.password1.is_empty() && !cmd.password2.is_empty() {
            if cmd.password1 != cmd.password2 {
                errors.add("password2", PASSWORD_MISMATCH);
            } else if cmd.password1.chars().count() < MIN_PASSWORD_LEN {
                errors.add(
                    "password2",
                    format!(
                        "This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."
                    ),
                );
            }
        }

        errors.into_result().map_err(AccountError::Invalid)?;

        let password_hash = self.hash_password(&cmd.password1).await?;
        let user = match self
            .users
            .create_user(CreateUserParams {
                username,
                first_name: cmd.first_name.trim().to_string(),
                last_name: cmd.last_name.trim().to_string(),
                email,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => {
                let mut errors = FormErrors::new();
                errors.add("username", DUPLICATE_USERNAME);
                return Err(AccountError::Invalid(errors));
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            target: "murmur::accounts",
            user_id = user.id,
            username = %user.username,
            "account created"
        );

        self.issue_session(user).await
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionIssued, AccountError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            let mut errors = FormErrors::new();
            if username.is_empty() {
                errors.add("username", REQUIRED);
            }
            if password.is_empty() {
                errors.add("password", REQUIRED);
            }
            return Err(AccountError::Invalid(errors));
        }

        let Some(user) = self.users.find_by_username(username).await? else {
            counter!("murmur_login_failed_total").increment(1);
            return Err(AccountError::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash).await? {
            counter!("murmur_login_failed_total").increment(1);
            return Err(AccountError::InvalidCredentials);
        }

        self.issue_session(user).await
    }

    /// Resolve a cookie token to its user. Unknown, malformed or expired
    /// tokens resolve to `None`.
    pub async fn authenticate(
        &self,
        token: &str,
    ) -> Result<Option<AuthenticatedUser>, AccountError> {
        let Some(parsed) = parse_token(token) else {
            return Ok(None);
        };
        let Some(session) = self.sessions.find_by_prefix(&parsed.prefix).await? else {
            return Ok(None);
        };

        let hashed_input = hash_secret(&parsed.secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Ok(None);
        }

        if session.is_expired(OffsetDateTime::now_utc()) {
            debug!(session_id = %session.id, "dropping expired session");
            self.sessions.delete_session(session.id).await?;
            return Ok(None);
        }

        let Some(user) = self.users.find_by_id(session.user_id).await? else {
            return Ok(None);
        };

        Ok(Some(AuthenticatedUser {
            id: user.id,
            full_name: user.full_name(),
            username: user.username,
            session_id: session.id,
        }))
    }

    pub async fn logout(&self, session_id: Uuid) -> Result<(), AccountError> {
        self.sessions.delete_session(session_id).await?;
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> Result<u64, AccountError> {
        Ok(self
            .sessions
            .delete_expired(OffsetDateTime::now_utc())
            .await?)
    }

    async fn issue_session(&self, user: UserRecord) -> Result<SessionIssued, AccountError> {
        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                id: Uuid::new_v4(),
                prefix,
                hashed_secret: hash_secret(&secret),
                user_id: user.id,
                expires_at,
            })
            .await?;

        Ok(SessionIssued {
            token,
            user,
            expires_at,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}

fn hash_with(argon2: &Argon2<'static>, password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::PasswordHash(err.to_string()))
}

fn verify_with(
    argon2: &Argon2<'static>,
    password: &str,
    password_hash: &str,
) -> Result<bool, AccountError> {
    let parsed =
        PasswordHash::new(password_hash).map_err(|err| AccountError::PasswordHash(err.to_string()))?;
    match argon2.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(AccountError::PasswordHash(err.to_string())),
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    Sha256::digest(secret.as_bytes()).to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
