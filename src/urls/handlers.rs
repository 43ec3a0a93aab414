use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        services::refresh_session,
        session::{CurrentUser, SessionUser, LOGIN_PATH},
    },
    state::AppState,
    urls::{
        dto::{ListQuery, UrlForm},
        repo_types::Url,
        services::{self, UrlError},
    },
    views::{render, AddUrlPage, EditUrlPage, UrlHomePage, UrlRow},
};

const HOME_PATH: &str = "/url-home";

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/url-home", get(url_home))
        .route("/:short_code", get(follow_short_code))
}

pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/users/add-url", get(add_url_page).post(add_url))
        .route("/users/edit-url/:id", get(edit_url_page).post(edit_url))
        .route("/users/delete-url/:id", post(delete_url))
}

pub async fn root() -> Redirect {
    Redirect::to(LOGIN_PATH)
}

#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn url_home(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(q): Query<ListQuery>,
) -> Response {
    let search = q.search();
    let page = match services::list_urls(&state, current.user.id, &search, q.page()).await {
        Ok(p) => UrlHomePage {
            email: current.user.email,
            urls: p.urls.iter().map(|u| to_row(&state, u)).collect(),
            current_page: p.current_page,
            total_pages: p.total_pages,
            total: p.total,
            search,
            error: None,
        },
        Err(e) => {
            error!(error = %e, "list urls failed");
            UrlHomePage {
                email: current.user.email,
                urls: Vec::new(),
                current_page: 1,
                total_pages: 1,
                total: 0,
                search,
                error: Some("Error loading URLs".into()),
            }
        }
    };
    render(page)
}

#[instrument(skip(state))]
pub async fn follow_short_code(
    State(state): State<AppState>,
    Path(short_code): Path<String>,
) -> Response {
    match services::resolve(&state, &short_code).await {
        Ok(Some(target)) => match HeaderValue::try_from(target.as_str()) {
            Ok(location) => {
                info!(%short_code, "redirecting");
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
            Err(e) => {
                error!(error = %e, %short_code, "stored destination is not a valid Location");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
            }
        },
        Ok(None) => {
            warn!(%short_code, "short code not found");
            (StatusCode::NOT_FOUND, "Short URL not found").into_response()
        }
        Err(e) => {
            error!(error = %e, %short_code, "resolve failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
        }
    }
}

pub async fn add_url_page(_current: CurrentUser) -> Response {
    render(AddUrlPage::default())
}

#[instrument(skip(state, current, form), fields(user_id = %current.user.id))]
pub async fn add_url(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<UrlForm>,
) -> Response {
    let user = match fresh_user(&state, &current).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match services::create_url(&state, user.id, &form).await {
        Ok(_) => Redirect::to(HOME_PATH).into_response(),
        Err(e) => {
            let message = match &e {
                UrlError::Validation(_) | UrlError::QuotaExceeded => e.to_string(),
                _ => {
                    error!(error = %e, "create url failed");
                    "Error adding URL".to_string()
                }
            };
            render(AddUrlPage {
                error: Some(message),
                title: form.title,
                original_url: form.original_url,
            })
        }
    }
}

#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn edit_url_page(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        return Redirect::to(HOME_PATH).into_response();
    };
    match services::find_owned(&state, id, current.user.id).await {
        Ok(Some(url)) => render(EditUrlPage {
            id: url.id.to_string(),
            title: url.title,
            original_url: url.original_url,
            error: None,
        }),
        Ok(None) => Redirect::to(HOME_PATH).into_response(),
        Err(e) => {
            error!(error = %e, %id, "load url for edit failed");
            Redirect::to(HOME_PATH).into_response()
        }
    }
}

#[instrument(skip(state, current, form), fields(user_id = %current.user.id))]
pub async fn edit_url(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<UrlForm>,
) -> Response {
    let Ok(url_id) = Uuid::parse_str(&id) else {
        return Redirect::to(HOME_PATH).into_response();
    };
    let user = match fresh_user(&state, &current).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match services::update_url(&state, url_id, user.id, &form).await {
        Ok(()) => Redirect::to(HOME_PATH).into_response(),
        Err(e) => {
            let message = match e {
                UrlError::Validation(msg) => msg,
                other => {
                    error!(error = %other, %url_id, "update url failed");
                    "Error updating URL".to_string()
                }
            };
            render(EditUrlPage {
                id,
                title: form.title,
                original_url: form.original_url,
                error: Some(message),
            })
        }
    }
}

#[instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn delete_url(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Response {
    let Ok(url_id) = Uuid::parse_str(&id) else {
        return Redirect::to(HOME_PATH).into_response();
    };
    let user = match fresh_user(&state, &current).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    if let Err(e) = services::delete_url(&state, url_id, user.id).await {
        error!(error = %e, %url_id, "delete url failed");
    }
    Redirect::to(HOME_PATH).into_response()
}

/// Re-reads the session's user before a write.
async fn fresh_user(state: &AppState, current: &CurrentUser) -> Result<SessionUser, Response> {
    match refresh_session(state, current).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(Redirect::to(LOGIN_PATH).into_response()),
        Err(e) => {
            error!(error = %e, "session refresh failed");
            Err(Redirect::to(HOME_PATH).into_response())
        }
    }
}

fn to_row(state: &AppState, url: &Url) -> UrlRow {
    UrlRow {
        id: url.id.to_string(),
        title: url.title.clone(),
        original_url: url.original_url.clone(),
        short_code: url.short_code.clone(),
        short_link: format!("{}/{}", state.config.base_url, url.short_code),
        created_at: url
            .created_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| url.created_at.to_string()),
    }
}
