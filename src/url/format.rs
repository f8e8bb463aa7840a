//! Canonical target URL construction
//!
//! The property-records site keys each road page by a slug of the form
//! `{road}-{town}-{state}-property-records`. Road names are abbreviated the
//! way the site abbreviates them; town names are only slugged.

use crate::ScoutError;
use regex::Regex;
use std::sync::OnceLock;

/// Street-type substitutions, applied in this order as whole words
const STREET_SUFFIXES: [(&str, &str); 7] = [
    ("court", "ct"),
    ("street", "st"),
    ("road", "rd"),
    ("avenue", "ave"),
    ("boulevard", "blvd"),
    ("drive", "dr"),
    ("lane", "ln"),
];

fn suffix_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        STREET_SUFFIXES
            .iter()
            .map(|(word, abbrev)| {
                let pattern = Regex::new(&format!(r"\b{}\b", word))
                    .expect("street suffix pattern is a valid regex");
                (pattern, *abbrev)
            })
            .collect()
    })
}

fn whitespace_run() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is a valid regex"))
}

/// Replaces every whitespace run with a single hyphen
pub fn hyphenate(value: &str) -> String {
    whitespace_run().replace_all(value, "-").into_owned()
}

/// Applies the whole-word street suffix abbreviations to an already lower-cased name
///
/// ```
/// use parcel_scout::url::abbreviate_street_suffixes;
///
/// assert_eq!(abbreviate_street_suffixes("oak street"), "oak st");
/// assert_eq!(abbreviate_street_suffixes("broadway"), "broadway");
/// ```
pub fn abbreviate_street_suffixes(name: &str) -> String {
    suffix_patterns()
        .iter()
        .fold(name.to_string(), |acc, (pattern, abbrev)| {
            pattern.replace_all(&acc, *abbrev).into_owned()
        })
}

/// Formats a town name as a URL slug: lower-case, trimmed, hyphenated
pub fn format_town_segment(town: &str) -> String {
    hyphenate(town.trim().to_lowercase().as_str())
}

/// Builds the property-records URL for one road
///
/// An empty road yields a malformed URL; use [`validate_road_target`] first.
///
/// # Examples
///
/// ```
/// use parcel_scout::url::format_road_url;
///
/// let url = format_road_url("https://www.countyoffice.org", "NJ", "Madison", "Kings Road");
/// assert_eq!(url, "https://www.countyoffice.org/kings-rd-madison-nj-property-records/");
/// ```
pub fn format_road_url(base: &str, state: &str, town: &str, road: &str) -> String {
    let road = hyphenate(&abbreviate_street_suffixes(&road.trim().to_lowercase()));
    let town = format_town_segment(town);
    let state = state.trim().to_lowercase();

    format!(
        "{}/{}-{}-{}-property-records/",
        base.trim_end_matches('/'),
        road,
        town,
        state
    )
}

/// Builds the street-index URL listing the towns of a county
pub fn format_county_url(base: &str, state: &str, county: &str) -> String {
    format!(
        "{}/streetview/usa/{}/{}/index.html",
        base.trim_end_matches('/'),
        state.trim().to_lowercase(),
        county.trim().to_lowercase()
    )
}

/// Rejects road targets that would produce a malformed URL
pub fn validate_road_target(state: &str, town: &str, road: &str) -> Result<(), ScoutError> {
    for (field, value) in [("state", state), ("town", town), ("road", road)] {
        if value.trim().is_empty() {
            return Err(ScoutError::InvalidTarget(format!(
                "{} is empty (state='{}', town='{}', road='{}')",
                field, state, town, road
            )));
        }
    }
    Ok(())
}
