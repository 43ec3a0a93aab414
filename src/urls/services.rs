use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    state::AppState,
    urls::{
        dto::UrlForm,
        repo_types::{InsertOutcome, Url},
        shortcode::{generate_long_short_code, generate_short_code},
    },
};

/// Most records a single user may own.
pub const URL_QUOTA: i64 = 5;
pub const PAGE_SIZE: i64 = 3;
/// Attempts with a regular-length code before falling back to a long one.
pub const SHORT_CODE_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum UrlError {
    #[error("{0}")]
    Validation(String),
    #[error(
        "You have reached the maximum limit of {} URLs. Delete some to add more.",
        URL_QUOTA
    )]
    QuotaExceeded,
    #[error("could not assign a unique short code")]
    ShortCodeExhausted,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug)]
pub struct UrlPage {
    pub urls: Vec<Url>,
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
}

/// Absolute http(s) URL with a host. Input made of visible ASCII is kept as
/// typed; anything else is replaced by its percent-encoded serialization so
/// the stored value is always a valid `Location` header.
pub(crate) fn parse_destination(input: &str) -> Option<String> {
    let parsed = url::Url::parse(input).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    if input.bytes().all(|b| b.is_ascii_graphic()) {
        Some(input.to_string())
    } else {
        Some(parsed.as_str().to_owned())
    }
}

fn validate(form: &UrlForm) -> Result<(String, String), UrlError> {
    let original_url = parse_destination(form.original_url.trim()).ok_or_else(|| {
        UrlError::Validation("URL must start with http:// or https://".into())
    })?;
    Ok((form.title.trim().to_string(), original_url))
}

pub fn total_pages(total: i64) -> i64 {
    (total + PAGE_SIZE - 1) / PAGE_SIZE
}

/// Stores a new record under a fresh, unused short code.
#[instrument(skip(state, form), fields(%user_id))]
pub async fn create_url(state: &AppState, user_id: Uuid, form: &UrlForm) -> Result<Url, UrlError> {
    let (title, original_url) = validate(form)?;

    // Checked again under the owner lock at insert time.
    if state.urls.count_owned(user_id).await? >= URL_QUOTA {
        warn!("url quota reached");
        return Err(UrlError::QuotaExceeded);
    }

    for attempt in 0..=SHORT_CODE_ATTEMPTS {
        let short_code = if attempt < SHORT_CODE_ATTEMPTS {
            generate_short_code()
        } else {
            generate_long_short_code()
        };

        if state.urls.short_code_exists(&short_code).await? {
            debug!(attempt, %short_code, "short code collision");
            continue;
        }

        match state
            .urls
            .insert_within_quota(user_id, &title, &original_url, &short_code, URL_QUOTA)
            .await?
        {
            InsertOutcome::Inserted(url) => {
                info!(url_id = %url.id, short_code = %url.short_code, "url created");
                return Ok(url);
            }
            InsertOutcome::QuotaExceeded => {
                warn!("url quota reached");
                return Err(UrlError::QuotaExceeded);
            }
            InsertOutcome::ShortCodeTaken => {
                debug!(attempt, %short_code, "short code taken at insert");
            }
        }
    }

    warn!("short code space exhausted");
    Err(UrlError::ShortCodeExhausted)
}

#[instrument(skip(state), fields(%user_id))]
pub async fn list_urls(
    state: &AppState,
    user_id: Uuid,
    search: &str,
    page: i64,
) -> Result<UrlPage, UrlError> {
    let page = page.max(1);
    // Too far past the end to address; still an empty page.
    let offset = (page - 1).checked_mul(PAGE_SIZE).unwrap_or(i64::MAX);
    let (urls, total) = state
        .urls
        .list_page(user_id, search, PAGE_SIZE, offset)
        .await?;
    Ok(UrlPage {
        urls,
        current_page: page,
        total_pages: total_pages(total),
        total,
    })
}

pub async fn resolve(state: &AppState, short_code: &str) -> anyhow::Result<Option<String>> {
    Ok(state
        .urls
        .find_by_short_code(short_code)
        .await?
        .map(|u| u.original_url))
}

pub async fn find_owned(state: &AppState, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Url>> {
    state.urls.find_owned(id, user_id).await
}

/// Silently does nothing when `id` is not owned by `user_id`.
#[instrument(skip(state, form), fields(%id, %user_id))]
pub async fn update_url(
    state: &AppState,
    id: Uuid,
    user_id: Uuid,
    form: &UrlForm,
) -> Result<(), UrlError> {
    let (title, original_url) = validate(form)?;
    let n = state
        .urls
        .update_owned(id, user_id, &title, &original_url)
        .await?;
    debug!(rows = n, "url update applied");
    Ok(())
}

/// Silently does nothing when `id` is not owned by `user_id`.
#[instrument(skip(state), fields(%id, %user_id))]
pub async fn delete_url(state: &AppState, id: Uuid, user_id: Uuid) -> anyhow::Result<()> {
    let n = state.urls.delete_owned(id, user_id).await?;
    debug!(rows = n, "url delete applied");
    Ok(())
}
