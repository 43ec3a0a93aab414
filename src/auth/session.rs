use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, response::Redirect};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    auth::repo_types::User, config::SessionConfig, state::AppState, token::random_hex,
};

pub const LOGIN_PATH: &str = "/users/login";

/// Serialized copy of the user kept server-side for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
}

impl From<&User> for SessionUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
        }
    }
}

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn insert(
        &self,
        id: &str,
        user: &SessionUser,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()>;
    /// Returns the snapshot of a live session. Expired rows are removed and reported as absent.
    async fn load(&self, id: &str) -> anyhow::Result<Option<SessionUser>>;
    async fn update_user(&self, id: &str, user: &SessionUser) -> anyhow::Result<()>;
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
    async fn delete_expired(&self) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgSessionRepo {
    db: PgPool,
}

impl PgSessionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionRepo for PgSessionRepo {
    async fn insert(
        &self,
        id: &str,
        user: &SessionUser,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id)
        .bind(Json(user))
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("insert session")?;
        Ok(())
    }

    async fn load(&self, id: &str) -> anyhow::Result<Option<SessionUser>> {
        let row = sqlx::query_as::<_, (Json<SessionUser>, OffsetDateTime)>(
            r#"
            SELECT data, expires_at
              FROM sessions
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("load session")?;

        match row {
            Some((Json(user), expires_at)) if expires_at > OffsetDateTime::now_utc() => Ok(Some(user)),
            Some(_) => {
                self.delete(id).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn update_user(&self, id: &str, user: &SessionUser) -> anyhow::Result<()> {
        sqlx::query("UPDATE sessions SET data = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(user))
            .execute(&self.db)
            .await
            .context("update session")?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete session")?;
        Ok(())
    }

    async fn delete_expired(&self) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.db)
            .await
            .context("delete expired sessions")?;
        Ok(res.rows_affected())
    }
}

/// 32 random bytes, hex encoded.
pub fn new_session_id() -> String {
    random_hex(32)
}

pub fn session_cookie(cfg: &SessionConfig, session_id: String) -> Cookie<'static> {
    Cookie::build((cfg.cookie_name.clone(), session_id))
        .path("/")
        .http_only(true)
        .secure(cfg.secure_cookie)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(cfg.ttl_minutes))
        .build()
}

pub fn removal_cookie(cfg: &SessionConfig) -> Cookie<'static> {
    Cookie::build((cfg.cookie_name.clone(), "")).path("/").build()
}

/// Authenticated caller. Rejects with a redirect to the login page.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session_id: String,
    pub user: SessionUser,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(session_id) = jar
            .get(&state.config.session.cookie_name)
            .map(|c| c.value().to_string())
        else {
            debug!("no session cookie");
            return Err(Redirect::to(LOGIN_PATH));
        };

        match state.sessions.load(&session_id).await {
            Ok(Some(user)) => Ok(CurrentUser { session_id, user }),
            Ok(None) => {
                debug!("unknown or expired session");
                Err(Redirect::to(LOGIN_PATH))
            }
            Err(e) => {
                error!(error = %e, "session lookup failed");
                Err(Redirect::to(LOGIN_PATH))
            }
        }
    }
}

/// Periodically drops expired sessions. Runs until the process exits.
pub async fn sweep_expired(sessions: Arc<dyn SessionRepo>, every: Duration) {
    let mut tick = tokio::time::interval(every);
    loop {
        tick.tick().await;
        match sessions.delete_expired().await {
            Ok(0) => {}
            Ok(n) => info!(removed = n, "expired sessions swept"),
            Err(e) => warn!(error = %e, "session sweep failed"),
        }
    }
}
