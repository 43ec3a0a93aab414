use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::urls::repo_types::{InsertOutcome, Url};

#[async_trait]
pub trait UrlRepo: Send + Sync {
    async fn short_code_exists(&self, short_code: &str) -> anyhow::Result<bool>;
    async fn count_owned(&self, user_id: Uuid) -> anyhow::Result<i64>;

    /// Inserts unless the owner already holds `quota` records. The count and the
    /// insert are atomic with respect to other inserts for the same owner.
    async fn insert_within_quota(
        &self,
        user_id: Uuid,
        title: &str,
        original_url: &str,
        short_code: &str,
        quota: i64,
    ) -> anyhow::Result<InsertOutcome>;

    /// Newest first. `search` is matched case-insensitively as a plain substring
    /// of title, original_url or short_code. Returns the page and the total match count.
    async fn list_page(
        &self,
        user_id: Uuid,
        search: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Url>, i64)>;

    async fn find_by_short_code(&self, short_code: &str) -> anyhow::Result<Option<Url>>;
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Url>>;

    /// Rows affected; 0 when the record is missing or owned by someone else.
    async fn update_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        title: &str,
        original_url: &str,
    ) -> anyhow::Result<u64>;
    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<u64>;
}

/// `%term%` with LIKE metacharacters escaped by `\`.
pub fn like_pattern(search: &str) -> String {
    let mut out = String::with_capacity(search.len() + 2);
    out.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[derive(Clone)]
pub struct PgUrlRepo {
    db: PgPool,
}

impl PgUrlRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UrlRepo for PgUrlRepo {
    async fn short_code_exists(&self, short_code: &str) -> anyhow::Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM urls WHERE short_code = $1)")
                .bind(short_code)
                .fetch_one(&self.db)
                .await
                .context("check short code")?;
        Ok(exists)
    }

    async fn count_owned(&self, user_id: Uuid) -> anyhow::Result<i64> {
        let (owned,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM urls WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await
            .context("count owned urls")?;
        Ok(owned)
    }

    async fn insert_within_quota(
        &self,
        user_id: Uuid,
        title: &str,
        original_url: &str,
        short_code: &str,
        quota: i64,
    ) -> anyhow::Result<InsertOutcome> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        // Serializes concurrent inserts of the same owner.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .context("lock owner")?;

        let (owned,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM urls WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .context("count owned urls")?;
        if owned >= quota {
            tx.rollback().await.context("rollback tx")?;
            return Ok(InsertOutcome::QuotaExceeded);
        }

        let res = sqlx::query_as::<_, Url>(
            r#"
            INSERT INTO urls (user_id, title, original_url, short_code)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, title, original_url, short_code, created_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(original_url)
        .bind(short_code)
        .fetch_one(&mut *tx)
        .await;

        match res {
            Ok(url) => {
                tx.commit().await.context("commit tx")?;
                Ok(InsertOutcome::Inserted(url))
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tx.rollback().await.context("rollback tx")?;
                Ok(InsertOutcome::ShortCodeTaken)
            }
            Err(e) => Err(e).context("insert url"),
        }
    }

    async fn list_page(
        &self,
        user_id: Uuid,
        search: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Url>, i64)> {
        let pattern = like_pattern(search);

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
              FROM urls
             WHERE user_id = $1
               AND (title ILIKE $2 ESCAPE '\'
                    OR original_url ILIKE $2 ESCAPE '\'
                    OR short_code ILIKE $2 ESCAPE '\')
            "#,
        )
        .bind(user_id)
        .bind(&pattern)
        .fetch_one(&self.db)
        .await
        .context("count urls")?;

        let rows = sqlx::query_as::<_, Url>(
            r#"
            SELECT id, user_id, title, original_url, short_code, created_at
              FROM urls
             WHERE user_id = $1
               AND (title ILIKE $2 ESCAPE '\'
                    OR original_url ILIKE $2 ESCAPE '\'
                    OR short_code ILIKE $2 ESCAPE '\')
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list urls")?;

        Ok((rows, total))
    }

    async fn find_by_short_code(&self, short_code: &str) -> anyhow::Result<Option<Url>> {
        let row = sqlx::query_as::<_, Url>(
            r#"
            SELECT id, user_id, title, original_url, short_code, created_at
              FROM urls
             WHERE short_code = $1
            "#,
        )
        .bind(short_code)
        .fetch_optional(&self.db)
        .await
        .context("find url by short code")?;
        Ok(row)
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Url>> {
        let row = sqlx::query_as::<_, Url>(
            r#"
            SELECT id, user_id, title, original_url, short_code, created_at
              FROM urls
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("find owned url")?;
        Ok(row)
    }

    async fn update_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        title: &str,
        original_url: &str,
    ) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE urls
               SET title = $3, original_url = $4
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(title)
        .bind(original_url)
        .execute(&self.db)
        .await
        .context("update url")?;
        Ok(res.rows_affected())
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM urls WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete url")?;
        Ok(res.rows_affected())
    }
}
