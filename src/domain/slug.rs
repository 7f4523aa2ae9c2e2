//! Slug checks for the public page address space.
//!
//! Slugs are authored in the content store and reach it only as bound query
//! parameters, so any authored slug is addressable. This side only refuses
//! input that could never be one, or that would escape the export tree.

use crate::domain::error::DomainError;

const MAX_SLUG_LEN: usize = 200;

/// Validate a requested slug: non-empty, bounded, a single path segment with
/// no `..` and no control characters.
pub fn validate_slug(slug: &str) -> Result<(), DomainError> {
    if slug.is_empty() {
        return Err(DomainError::validation("slug is empty"));
    }

    if slug.len() > MAX_SLUG_LEN {
        return Err(DomainError::validation(format!(
            "slug exceeds {MAX_SLUG_LEN} bytes"
        )));
    }

    if slug.contains("..") {
        return Err(DomainError::validation("slug contains `..`"));
    }

    if let Some(ch) = slug
        .chars()
        .find(|ch| *ch == '/' || *ch == '\\' || ch.is_control())
    {
        return Err(DomainError::validation(format!(
            "slug contains unsupported character {ch:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_slugs() {
        assert!(validate_slug("hello-world").is_ok());
        assert!(validate_slug("Post_2022-03").is_ok());
        assert!(validate_slug("release-v1.2").is_ok());
        assert!(validate_slug("café-notes").is_ok());
    }

    #[test]
    fn rejects_empty_and_path_like_input() {
        assert!(validate_slug("").is_err());
        assert!(validate_slug("../etc").is_err());
        assert!(validate_slug("..").is_err());
        assert!(validate_slug("a/b").is_err());
        assert!(validate_slug("a\\b").is_err());
        assert!(validate_slug("line\nbreak").is_err());
    }

    #[test]
    fn rejects_overlong_slugs() {
        let slug = "a".repeat(MAX_SLUG_LEN + 1);
        assert!(validate_slug(&slug).is_err());
    }
}
