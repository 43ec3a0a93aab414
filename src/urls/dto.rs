use serde::Deserialize;

/// Body of the add and edit forms.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct UrlForm {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "originalUrl")]
    pub original_url: String,
}

/// Query of `GET /url-home`. Kept as raw strings so bad input falls back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub search: Option<String>,
}

impl ListQuery {
    /// 1-based page; missing, unparsable or non-positive values give 1.
    pub fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }

    pub fn search(&self) -> String {
        self.search.clone().unwrap_or_default()
    }
}
