// Slug minting and validation
// Edit slugs are short and shareable; view slugs are long and unguessable

use once_cell::sync::Lazy;
use rand::{distr::Alphanumeric, Rng};
use regex::Regex;

use crate::error::{AppError, AppResult};

pub const EDIT_SLUG_LEN: usize = 8;
pub const VIEW_SLUG_LEN: usize = 16;

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid slug pattern"));

/// A freshly minted edit/view slug pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugPair {
    pub edit_slug: String,
    pub view_slug: String,
}

impl SlugPair {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let edit_slug: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(EDIT_SLUG_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        let view_slug: String = rng
            .sample_iter(&Alphanumeric)
            .take(VIEW_SLUG_LEN)
            .map(char::from)
            .collect();

        Self {
            edit_slug,
            view_slug,
        }
    }

    /// A pair is usable only if neither slug collides with the other or with `taken`
    pub fn is_distinct_from(&self, taken: &[&str]) -> bool {
        self.edit_slug != self.view_slug
            && !taken
                .iter()
                .any(|s| *s == self.edit_slug || *s == self.view_slug)
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}

/// Malformed slugs cannot name an adventure, so they stop before storage
pub fn check_slug(slug: &str) -> AppResult<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(AppError::NotFound("Adventure not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_lengths_and_charset() {
        let pair = SlugPair::generate();
        assert_eq!(pair.edit_slug.len(), EDIT_SLUG_LEN);
        assert_eq!(pair.view_slug.len(), VIEW_SLUG_LEN);
        assert!(pair
            .edit_slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert!(pair.view_slug.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(is_valid_slug(&pair.edit_slug));
        assert!(is_valid_slug(&pair.view_slug));
    }

    #[test]
    fn test_distinct_from_source() {
        let pair = SlugPair {
            edit_slug: "abcd1234".to_string(),
            view_slug: "ViewViewViewView".to_string(),
        };
        assert!(pair.is_distinct_from(&["zzzz9999", "other"]));
        assert!(!pair.is_distinct_from(&["abcd1234"]));
        assert!(!pair.is_distinct_from(&["ViewViewViewView"]));
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("abc_DEF-123"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("../etc"));
        assert!(!is_valid_slug("a/b"));
        assert!(check_slug("abcd1234").is_ok());
        assert!(matches!(check_slug("a b"), Err(AppError::NotFound(_))));
    }
}
