//! Slug generation for public URLs.

use std::collections::HashSet;

/// Maximum length of a base slug. Leaves room for a numeric suffix within the
/// 150 character column.
pub const MAX_BASE_SLUG_LENGTH: usize = 140;

/// Converts a human-readable title into a URL-safe slug.
///
/// Keeps ASCII alphanumerics (lowercased); any run of other characters that
/// contains whitespace, `-` or `_` becomes a single `-`. Remaining characters
/// are dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' || c == '.' || c == '/' {
            pending_dash = true;
        }
    }

    truncate(slug, MAX_BASE_SLUG_LENGTH)
}

/// Slugifies `text`, falling back to `fallback` when nothing URL-safe remains.
pub fn slugify_or(text: &str, fallback: &str) -> String {
    let slug = slugify(text);
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

fn truncate(slug: String, max: usize) -> String {
    if slug.len() <= max {
        return slug;
    }
    slug[..max].trim_end_matches('-').to_string()
}

/// Picks the first free slug among `base`, `base-1`, `base-2`, ...
///
/// `taken` holds the existing slugs that collide with `base`; anything else in
/// it is ignored.
pub fn next_available_slug<S: AsRef<str>>(base: &str, taken: &[S]) -> String {
    let taken: HashSet<&str> = taken.iter().map(|s| s.as_ref()).collect();

    if !taken.contains(base) {
        return base.to_string();
    }

    let mut counter: usize = 1;
    loop {
        let candidate = format!("{}-{}", base, counter);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Summer Fair 2025"), "summer-fair-2025");
        assert_eq!(slugify("Sunday  Service"), "sunday-service");
    }

    #[test]
    fn test_slugify_separators() {
        assert_eq!(slugify("coffee_tasting-night"), "coffee-tasting-night");
        assert_eq!(slugify("  -- Opening Day --  "), "opening-day");
        assert_eq!(slugify("Q&A: Meet the Baker!"), "qa-meet-the-baker");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Café Olé"), "caf-ol");
        assert_eq!(slugify("日本語"), "");
    }

    #[test]
    fn test_slugify_truncates() {
        let long = "word ".repeat(60);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_BASE_SLUG_LENGTH);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_slugify_or_fallback() {
        assert_eq!(slugify_or("!!!", "album"), "album");
        assert_eq!(slugify_or("Easter", "album"), "easter");
    }

    #[test]
    fn test_next_available_slug_free() {
        let taken: Vec<String> = vec![];
        assert_eq!(next_available_slug("easter", &taken), "easter");
    }

    #[test]
    fn test_next_available_slug_increments() {
        assert_eq!(next_available_slug("easter", &["easter"]), "easter-1");
        assert_eq!(
            next_available_slug("easter", &["easter", "easter-1", "easter-2"]),
            "easter-3"
        );
    }

    #[test]
    fn test_next_available_slug_fills_gaps() {
        assert_eq!(
            next_available_slug("easter", &["easter", "easter-2"]),
            "easter-1"
        );
    }

    #[test]
    fn test_next_available_slug_ignores_unrelated() {
        assert_eq!(
            next_available_slug("easter", &["easter-egg-hunt"]),
            "easter"
        );
    }
}
