//! In-process repositories backing `AppState::fake()` in tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserRepo,
        repo_types::User,
        session::{SessionRepo, SessionUser},
    },
    urls::{
        repo::UrlRepo,
        repo_types::{InsertOutcome, Url},
        shortcode::generate_short_code,
    },
};

#[derive(Default)]
pub struct MemoryUserRepo {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(Some(user))
    }
}

#[derive(Default)]
pub struct MemoryUrlRepo {
    urls: Mutex<Vec<Url>>,
    seq: AtomicI64,
    /// Code lengths reported as already taken, to force collisions.
    colliding_lens: Vec<usize>,
}

impl MemoryUrlRepo {
    pub fn colliding_len(len: usize) -> Self {
        Self {
            colliding_lens: vec![len],
            ..Self::default()
        }
    }

    pub fn and_len(mut self, len: usize) -> Self {
        self.colliding_lens.push(len);
        self
    }

    /// Inserts without the quota check. Each call is strictly newer than the last.
    pub fn seed(&self, user_id: Uuid, title: &str, original_url: &str) -> Url {
        let url = Url {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            original_url: original_url.to_string(),
            short_code: generate_short_code(),
            created_at: self.next_timestamp(),
        };
        self.urls.lock().unwrap().push(url.clone());
        url
    }

    fn next_timestamp(&self) -> OffsetDateTime {
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        OffsetDateTime::now_utc() + time::Duration::seconds(n)
    }

    fn matches(url: &Url, needle: &str) -> bool {
        [&url.title, &url.original_url, &url.short_code]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

#[async_trait]
impl UrlRepo for MemoryUrlRepo {
    async fn short_code_exists(&self, short_code: &str) -> anyhow::Result<bool> {
        if self.colliding_lens.contains(&short_code.len()) {
            return Ok(true);
        }
        let urls = self.urls.lock().unwrap();
        Ok(urls.iter().any(|u| u.short_code == short_code))
    }

    async fn count_owned(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let urls = self.urls.lock().unwrap();
        Ok(urls.iter().filter(|u| u.user_id == user_id).count() as i64)
    }

    async fn insert_within_quota(
        &self,
        user_id: Uuid,
        title: &str,
        original_url: &str,
        short_code: &str,
        quota: i64,
    ) -> anyhow::Result<InsertOutcome> {
        let created_at = self.next_timestamp();
        let mut urls = self.urls.lock().unwrap();
        if urls.iter().filter(|u| u.user_id == user_id).count() as i64 >= quota {
            return Ok(InsertOutcome::QuotaExceeded);
        }
        if urls.iter().any(|u| u.short_code == short_code) {
            return Ok(InsertOutcome::ShortCodeTaken);
        }
        let url = Url {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            original_url: original_url.to_string(),
            short_code: short_code.to_string(),
            created_at,
        };
        urls.push(url.clone());
        Ok(InsertOutcome::Inserted(url))
    }

    async fn list_page(
        &self,
        user_id: Uuid,
        search: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Url>, i64)> {
        let needle = search.to_lowercase();
        let urls = self.urls.lock().unwrap();
        let mut hits: Vec<Url> = urls
            .iter()
            .filter(|u| u.user_id == user_id && Self::matches(u, &needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = hits.len() as i64;
        let page = hits
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn find_by_short_code(&self, short_code: &str) -> anyhow::Result<Option<Url>> {
        let urls = self.urls.lock().unwrap();
        Ok(urls.iter().find(|u| u.short_code == short_code).cloned())
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Url>> {
        let urls = self.urls.lock().unwrap();
        Ok(urls
            .iter()
            .find(|u| u.id == id && u.user_id == user_id)
            .cloned())
    }

    async fn update_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        title: &str,
        original_url: &str,
    ) -> anyhow::Result<u64> {
        let mut urls = self.urls.lock().unwrap();
        match urls.iter_mut().find(|u| u.id == id && u.user_id == user_id) {
            Some(u) => {
                u.title = title.to_string();
                u.original_url = original_url.to_string();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<u64> {
        let mut urls = self.urls.lock().unwrap();
        let before = urls.len();
        urls.retain(|u| !(u.id == id && u.user_id == user_id));
        Ok((before - urls.len()) as u64)
    }
}

/// Every call fails, as when the database is unreachable.
pub struct FailingUrlRepo;

fn unavailable<T>() -> anyhow::Result<T> {
    Err(anyhow::anyhow!("url store unavailable"))
}

#[async_trait]
impl UrlRepo for FailingUrlRepo {
    async fn short_code_exists(&self, _short_code: &str) -> anyhow::Result<bool> {
        unavailable()
    }

    async fn count_owned(&self, _user_id: Uuid) -> anyhow::Result<i64> {
        unavailable()
    }

    async fn insert_within_quota(
        &self,
        _user_id: Uuid,
        _title: &str,
        _original_url: &str,
        _short_code: &str,
        _quota: i64,
    ) -> anyhow::Result<InsertOutcome> {
        unavailable()
    }

    async fn list_page(
        &self,
        _user_id: Uuid,
        _search: &str,
        _limit: i64,
        _offset: i64,
    ) -> anyhow::Result<(Vec<Url>, i64)> {
        unavailable()
    }

    async fn find_by_short_code(&self, _short_code: &str) -> anyhow::Result<Option<Url>> {
        unavailable()
    }

    async fn find_owned(&self, _id: Uuid, _user_id: Uuid) -> anyhow::Result<Option<Url>> {
        unavailable()
    }

    async fn update_owned(
        &self,
        _id: Uuid,
        _user_id: Uuid,
        _title: &str,
        _original_url: &str,
    ) -> anyhow::Result<u64> {
        unavailable()
    }

    async fn delete_owned(&self, _id: Uuid, _user_id: Uuid) -> anyhow::Result<u64> {
        unavailable()
    }
}

#[derive(Default)]
pub struct MemorySessionRepo {
    sessions: Mutex<HashMap<String, (SessionUser, OffsetDateTime)>>,
}

#[async_trait]
impl SessionRepo for MemorySessionRepo {
    async fn insert(
        &self,
        id: &str,
        user: &SessionUser,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(id.to_string(), (user.clone(), expires_at));
        Ok(())
    }

    async fn load(&self, id: &str) -> anyhow::Result<Option<SessionUser>> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get(id) {
            Some((user, expires_at)) if *expires_at > OffsetDateTime::now_utc() => {
                Ok(Some(user.clone()))
            }
            Some(_) => {
                sessions.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn update_user(&self, id: &str, user: &SessionUser) -> anyhow::Result<()> {
        if let Some(entry) = self.sessions.lock().unwrap().get_mut(id) {
            entry.0 = user.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.sessions.lock().unwrap().remove(id);
        Ok(())
    }

    async fn delete_expired(&self) -> anyhow::Result<u64> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}
