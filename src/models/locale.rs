//! Locales and multilingual text
//!
//! Uzbek is the mandatory language: every piece of user-facing content has
//! an Uzbek value, and Russian/English translations fall back to it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported content locale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Uz,
    Ru,
    En,
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::Uz, Locale::Ru, Locale::En];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Uz => "uz",
            Locale::Ru => "ru",
            Locale::En => "en",
        }
    }

    /// Pick the first supported locale from an `Accept-Language` header value.
    ///
    /// Quality weights are honoured; region subtags (`ru-RU`) match their language.
    pub fn from_accept_language(header: &str) -> Option<Locale> {
        let mut candidates: Vec<(f32, Locale)> = header
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.trim().split(';');
                let tag = pieces.next()?.trim();
                let lang = tag.split('-').next()?.to_lowercase();
                let locale = lang.parse::<Locale>().ok()?;
                let quality = pieces
                    .find_map(|p| p.trim().strip_prefix("q="))
                    .and_then(|q| q.parse::<f32>().ok())
                    .unwrap_or(1.0);
                Some((quality, locale))
            })
            .collect();
        // stable sort keeps header order for equal weights
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        candidates.first().map(|(_, locale)| *locale)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uz" => Ok(Locale::Uz),
            "ru" => Ok(Locale::Ru),
            "en" => Ok(Locale::En),
            _ => Err(anyhow::anyhow!("Unsupported locale: {}", s)),
        }
    }
}

/// Text stored once per locale
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    pub uz: String,
    #[serde(default)]
    pub ru: Option<String>,
    #[serde(default)]
    pub en: Option<String>,
}

impl LocalizedText {
    pub fn new(uz: impl Into<String>) -> Self {
        Self {
            uz: uz.into(),
            ru: None,
            en: None,
        }
    }

    pub fn with_ru(mut self, ru: impl Into<String>) -> Self {
        self.ru = Some(ru.into());
        self
    }

    pub fn with_en(mut self, en: impl Into<String>) -> Self {
        self.en = Some(en.into());
        self
    }

    /// Text for `locale`, falling back to Uzbek when the translation is missing or blank
    pub fn get(&self, locale: Locale) -> &str {
        let translated = match locale {
            Locale::Uz => None,
            Locale::Ru => self.ru.as_deref(),
            Locale::En => self.en.as_deref(),
        };
        match translated {
            Some(text) if !text.trim().is_empty() => text,
            _ => &self.uz,
        }
    }

    /// Whether an explicit, non-blank translation exists for `locale`
    pub fn has(&self, locale: Locale) -> bool {
        match locale {
            Locale::Uz => !self.uz.trim().is_empty(),
            Locale::Ru => self.ru.as_deref().is_some_and(|t| !t.trim().is_empty()),
            Locale::En => self.en.as_deref().is_some_and(|t| !t.trim().is_empty()),
        }
    }

    /// Trim every value and turn blank translations into `None`
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        }
        Self {
            uz: self.uz.trim().to_string(),
            ru: clean(&self.ru),
            en: clean(&self.en),
        }
    }
}
