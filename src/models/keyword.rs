//! Article keywords
//!
//! Keywords are shared between articles and stored once, lowercased.
//! Authors send them as one comma-separated string.

use serde::{Deserialize, Serialize};

/// Longest keyword, in characters
pub const MAX_KEYWORD_LENGTH: usize = 100;

/// Most keywords one article may carry
pub const MAX_KEYWORDS_PER_ARTICLE: usize = 20;

/// A keyword with the number of published articles using it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub article_count: i64,
}

/// Split a comma-separated keyword string.
///
/// Entries are trimmed and lowercased; blanks and repeats are dropped and
/// first-seen order is kept.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for entry in raw.split(',') {
        let name = entry.trim().to_lowercase();
        if !name.is_empty() && !keywords.contains(&name) {
            keywords.push(name);
        }
    }
    keywords
}

/// Join keywords back into the comma-separated form
pub fn join_keywords(keywords: &[String]) -> String {
    keywords.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords_normalizes() {
        assert_eq!(
            parse_keywords(" Rust, tokio ,RUST,, Ma'lumotlar bazasi ,"),
            vec!["rust", "tokio", "ma'lumotlar bazasi"]
        );
        assert!(parse_keywords("").is_empty());
        assert!(parse_keywords(" , ,").is_empty());
    }

    #[test]
    fn test_parse_keywords_lowercases_cyrillic() {
        assert_eq!(parse_keywords("Тарих, тарих"), vec!["тарих"]);
        assert_eq!(
            join_keywords(&parse_keywords("Fan,Texnika")),
            "fan, texnika"
        );
    }
}
