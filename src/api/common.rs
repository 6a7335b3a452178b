//! Common API utilities and shared types

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::Deserialize;

use crate::api::middleware::AppState;
use crate::models::{ListParams, Locale};

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size for public APIs
pub fn default_page_size() -> u32 {
    10
}

/// Default page size for admin APIs
pub fn default_per_page() -> u32 {
    20
}

/// Basic pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.page_size)
    }
}

/// Admin pagination query parameters
#[derive(Debug, Deserialize)]
pub struct AdminPaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl AdminPaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

/// Locale a response is rendered in.
///
/// Taken from `?lang=`, then `Accept-Language`, then the configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveLocale(pub Locale);

impl ActiveLocale {
    pub fn resolve(query: Option<&str>, accept_language: Option<&str>, fallback: Locale) -> Self {
        let from_query = query.and_then(|q| {
            q.split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "lang")
                .and_then(|(_, value)| value.parse::<Locale>().ok())
        });
        let locale = from_query
            .or_else(|| accept_language.and_then(Locale::from_accept_language))
            .unwrap_or(fallback);
        ActiveLocale(locale)
    }
}

impl FromRequestParts<AppState> for ActiveLocale {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let accept_language = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());
        Ok(ActiveLocale::resolve(
            parts.uri.query(),
            accept_language,
            state.default_locale,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_wins() {
        let locale = ActiveLocale::resolve(Some("page=2&lang=ru"), Some("en"), Locale::Uz);
        assert_eq!(locale.0, Locale::Ru);
    }

    #[test]
    fn test_accept_language_then_default() {
        let locale = ActiveLocale::resolve(None, Some("de-DE, en;q=0.8"), Locale::Uz);
        assert_eq!(locale.0, Locale::En);

        let locale = ActiveLocale::resolve(Some("lang=fr"), Some("de"), Locale::Ru);
        assert_eq!(locale.0, Locale::Ru);
    }

    #[test]
    fn test_pagination_is_clamped() {
        let params = PaginationQuery { page: 0, page_size: 1000 }.params();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
    }
}
