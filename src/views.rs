use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

#[derive(Template, Default)]
#[template(path = "signup.html")]
pub struct SignupPage {
    pub errors: Vec<String>,
    pub email: String,
}

#[derive(Template, Default)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub errors: Vec<String>,
    pub email: String,
}

/// One row of the URL list.
pub struct UrlRow {
    pub id: String,
    pub title: String,
    pub original_url: String,
    pub short_code: String,
    pub short_link: String,
    pub created_at: String,
}

#[derive(Template)]
#[template(path = "url_home.html")]
pub struct UrlHomePage {
    pub email: String,
    pub urls: Vec<UrlRow>,
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub search: String,
    pub error: Option<String>,
}

impl UrlHomePage {
    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

#[derive(Template, Default)]
#[template(path = "add_url.html")]
pub struct AddUrlPage {
    pub error: Option<String>,
    pub title: String,
    pub original_url: String,
}

#[derive(Template)]
#[template(path = "edit_url.html")]
pub struct EditUrlPage {
    pub id: String,
    pub title: String,
    pub original_url: String,
    pub error: Option<String>,
}

pub fn render<T: Template>(page: T) -> Response {
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "template render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response()
        }
    }
}
