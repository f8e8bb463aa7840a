//! URL handling module for Parcel-Scout
//!
//! Builds the canonical target URLs for county street indexes and per-road
//! property-record pages, and resolves relative links found on index pages.

mod format;

pub use format::{
    abbreviate_street_suffixes, format_county_url, format_road_url, format_town_segment,
    hyphenate, validate_road_target,
};

use url::Url;

/// Resolves a link href against the page it was found on
///
/// Returns None for empty hrefs, fragment-only links, non-HTTP(S) schemes
/// and anything that fails to parse.
///
/// # Examples
///
/// ```
/// use parcel_scout::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://www.geographic.org/streetview/usa/nj/morris/index.html").unwrap();
/// assert_eq!(
///     resolve_link("madison.html", &base).as_deref(),
///     Some("https://www.geographic.org/streetview/usa/nj/morris/madison.html")
/// );
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:") || href.starts_with("mailto:") {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn county_url() -> Url {
        Url::parse("https://www.geographic.org/streetview/usa/nj/morris/index.html").unwrap()
    }

    #[test]
    fn test_resolve_relative_town_link() {
        let resolved = resolve_link("chatham.html", &county_url());
        assert_eq!(
            resolved.as_deref(),
            Some("https://www.geographic.org/streetview/usa/nj/morris/chatham.html")
        );
    }

    #[test]
    fn test_resolve_absolute_link() {
        let resolved = resolve_link("https://other.org/a.html", &county_url());
        assert_eq!(resolved.as_deref(), Some("https://other.org/a.html"));
    }

    #[test]
    fn test_skip_fragment_and_empty() {
        assert_eq!(resolve_link("#top", &county_url()), None);
        assert_eq!(resolve_link("   ", &county_url()), None);
    }

    #[test]
    fn test_skip_non_http_schemes() {
        assert_eq!(resolve_link("javascript:void(0)", &county_url()), None);
        assert_eq!(resolve_link("mailto:a@b.org", &county_url()), None);
        assert_eq!(resolve_link("ftp://files.example.org/x", &county_url()), None);
    }
}
