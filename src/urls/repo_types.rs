use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Short-link record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Url {
    pub id: Uuid,
    pub user_id: Uuid, // owner
    pub title: String,
    pub original_url: String,
    pub short_code: String,
    pub created_at: OffsetDateTime,
}

/// Result of a quota-checked insert.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(Url),
    QuotaExceeded,
    ShortCodeTaken,
}
