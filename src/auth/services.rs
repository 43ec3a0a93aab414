use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, SignupForm},
        password::{hash_password, verify_password},
        repo_types::User,
        session::{new_session_id, CurrentUser, SessionUser},
    },
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("User already exists")]
    UserAlreadyExists,
    /// Shared by unknown email and wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Server error")]
    Store(#[from] anyhow::Error),
}

impl AuthError {
    /// Messages shown on the form.
    pub fn messages(&self) -> Vec<String> {
        match self {
            AuthError::Validation(msgs) => msgs.clone(),
            other => vec![other.to_string()],
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Every failing rule, in form order.
pub fn validate_signup(form: &SignupForm) -> Vec<String> {
    let mut errors = Vec::new();
    if !is_valid_email(&normalize_email(&form.email)) {
        errors.push("Valid email required".to_string());
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if form.confirm_password != form.password {
        errors.push("Password confirmation does not match password".to_string());
    }
    errors
}

#[instrument(skip(state, form), fields(email = %form.email))]
pub async fn signup(state: &AppState, form: &SignupForm) -> Result<User, AuthError> {
    let errors = validate_signup(form);
    if !errors.is_empty() {
        warn!(count = errors.len(), "signup validation failed");
        return Err(AuthError::Validation(errors));
    }

    let email = normalize_email(&form.email);
    if state.users.find_by_email(&email).await?.is_some() {
        warn!("email already registered");
        return Err(AuthError::UserAlreadyExists);
    }

    let hash = hash_password(&form.password)?;
    let user = state
        .users
        .create(&email, &hash)
        .await?
        .ok_or(AuthError::UserAlreadyExists)?;

    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Verifies credentials and opens a session. Returns the new session id.
#[instrument(skip(state, form), fields(email = %form.email))]
pub async fn login(state: &AppState, form: &LoginForm) -> Result<(String, SessionUser), AuthError> {
    let email = normalize_email(&form.email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!("login unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(&form.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let snapshot = SessionUser::from(&user);
    let session_id = new_session_id();
    let expires_at =
        OffsetDateTime::now_utc() + time::Duration::minutes(state.config.session.ttl_minutes);
    state
        .sessions
        .insert(&session_id, &snapshot, expires_at)
        .await?;

    info!(user_id = %user.id, "user logged in");
    Ok((session_id, snapshot))
}

pub async fn logout(state: &AppState, session_id: &str) -> anyhow::Result<()> {
    state.sessions.delete(session_id).await
}

/// Re-reads the user behind a session and rewrites the stored snapshot.
/// A vanished user ends the session and yields `None`.
#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn refresh_session(
    state: &AppState,
    current: &CurrentUser,
) -> anyhow::Result<Option<SessionUser>> {
    match state.users.find_by_id(current.user.id).await? {
        Some(user) => {
            let fresh = SessionUser::from(&user);
            if fresh != current.user {
                state
                    .sessions
                    .update_user(&current.session_id, &fresh)
                    .await?;
            }
            Ok(Some(fresh))
        }
        None => {
            warn!("session user no longer exists");
            state.sessions.delete(&current.session_id).await?;
            Ok(None)
        }
    }
}
