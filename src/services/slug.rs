//! URL slugs
//!
//! Slugs are lowercase ASCII where possible: Cyrillic is transliterated and
//! the apostrophes of Uzbek Latin (`o'`, `g'`) are dropped. Separators
//! collapse into single hyphens.

/// Longest generated slug, in characters
pub const MAX_SLUG_LENGTH: usize = 100;

/// Build a slug from a title or name. Never returns an empty string.
pub fn generate_slug(text: &str) -> String {
    let mut raw = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        match c {
            'a'..='z' | '0'..='9' => raw.push(c),
            '\'' | '`' | 'ʻ' | 'ʼ' | '‘' | '’' => {}
            c if !c.is_ascii() => match transliterate(c) {
                Some(latin) => raw.push_str(latin),
                None if c.is_alphanumeric() => raw.push(c),
                None => raw.push('-'),
            },
            _ => raw.push('-'),
        }
    }

    let mut slug = String::with_capacity(raw.len());
    let mut prev_hyphen = true;
    for c in raw.chars() {
        if c == '-' {
            if !prev_hyphen {
                slug.push('-');
            }
            prev_hyphen = true;
        } else {
            slug.push(c);
            prev_hyphen = false;
        }
    }

    let slug: String = slug.chars().take(MAX_SLUG_LENGTH).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug.to_string()
    }
}

/// `base` with a numeric suffix, for resolving collisions
pub fn with_suffix(base: &str, n: u32) -> String {
    format!("{}-{}", base, n)
}

fn transliterate(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "j",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "x",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        'ў' => "o",
        'қ' => "q",
        'ғ' => "g",
        'ҳ' => "h",
        _ => return None,
    };
    Some(latin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_uzbek_latin() {
        assert_eq!(generate_slug("O'zbekiston bo'ylab sayohat"), "ozbekiston-boylab-sayohat");
        assert_eq!(generate_slug("Gʻalaba  —  2024!"), "galaba-2024");
    }

    #[test]
    fn test_cyrillic() {
        assert_eq!(generate_slug("Привет, мир"), "privet-mir");
        assert_eq!(generate_slug("Ўзбекистон ҳақида"), "ozbekiston-haqida");
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(generate_slug(""), "item");
        assert_eq!(generate_slug("!!!"), "item");
        assert_eq!(generate_slug("--a--"), "a");
    }

    #[test]
    fn test_suffix() {
        assert_eq!(with_suffix("rust", 2), "rust-2");
    }

    proptest! {
        #[test]
        fn prop_slug_shape(text in "\\PC{0,200}") {
            let slug = generate_slug(&text);
            prop_assert!(!slug.is_empty());
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(slug.chars().count() <= MAX_SLUG_LENGTH);
            prop_assert!(slug.chars().all(|c| c == '-' || c.is_alphanumeric()));
            prop_assert!(!slug.chars().any(|c| c.is_ascii_uppercase()));
        }

        #[test]
        fn prop_ascii_words_survive(words in prop::collection::vec("[a-z0-9]{1,8}", 1..6)) {
            prop_assert_eq!(generate_slug(&words.join(" ")), words.join("-"));
        }
    }
}
