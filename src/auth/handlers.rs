use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::CookieJar;
use tracing::{error, info, instrument};

use crate::{
    auth::{
        dto::{LoginForm, SignupForm},
        services::{self, normalize_email, AuthError},
        session::{removal_cookie, session_cookie, LOGIN_PATH},
    },
    state::AppState,
    views::{render, LoginPage, SignupPage},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/signup", get(signup_page).post(signup))
        .route("/users/login", get(login_page).post(login))
        .route("/users/logout", get(logout))
}

pub async fn signup_page() -> Response {
    render(SignupPage::default())
}

pub async fn login_page() -> Response {
    render(LoginPage::default())
}

#[instrument(skip(state, form))]
pub async fn signup(State(state): State<AppState>, Form(form): Form<SignupForm>) -> Response {
    match services::signup(&state, &form).await {
        Ok(_) => Redirect::to(LOGIN_PATH).into_response(),
        Err(e) => {
            if let AuthError::Store(ref source) = e {
                error!(error = %source, "signup failed");
            }
            render(SignupPage {
                errors: e.messages(),
                email: normalize_email(&form.email),
            })
        }
    }
}

#[instrument(skip(state, jar, form))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match services::login(&state, &form).await {
        Ok((session_id, _)) => {
            let cookie = session_cookie(&state.config.session, session_id);
            (jar.add(cookie), Redirect::to("/url-home")).into_response()
        }
        Err(e) => {
            if let AuthError::Store(ref source) = e {
                error!(error = %source, "login failed");
            }
            render(LoginPage {
                errors: e.messages(),
                email: normalize_email(&form.email),
            })
        }
    }
}

#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    let cfg = &state.config.session;
    if let Some(cookie) = jar.get(&cfg.cookie_name) {
        let session_id = cookie.value().to_string();
        match services::logout(&state, &session_id).await {
            Ok(()) => info!("session closed"),
            Err(e) => error!(error = %e, "logout failed"),
        }
    }
    (jar.remove(removal_cookie(cfg)), Redirect::to(LOGIN_PATH)).into_response()
}
