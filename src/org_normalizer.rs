//! Company Name Normalization
//!
//! Turns raw company names from lead lists into a short display form:
//! - Corporate suffixes: Ltd, LLC, GmbH, Pvt, Private, Limited, Inc, Technologies
//! - Trademark glyphs and commas
//! - Domain-like tails: "Monday.com" -> "Monday"
//! - Non-printable and non-ASCII characters
//! - Casing: every word capitalised, possessive 's kept lowercase
//! - Taglines after `|` or `:` ("Acme | We build things" -> "Acme")

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Substrings removed from the lowercased name, applied in this order.
/// Matching is plain substring replacement, so " inc" also strips the
/// prefix of words such as "incubator".
const CORPORATE_SUFFIXES: &[&str] = &[
    " ltd",
    " llc",
    " gmbh",
    " pvt",
    " private",
    " limited",
    " inc",
    "®",
    "™",
    ",",
    " technologies",
];

static DOT_WORD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.[a-z]+").unwrap()
});

static TAGLINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*[|:]\s*.*").unwrap()
});

/// Normalize a company name for display and matching.
///
/// `"Acme Technologies, Inc."` -> `"Acme"`, `"joe's pizza ltd"` -> `"Joe's Pizza"`.
/// Empty input gives an empty string.
pub fn clean_company_name(name: &str) -> String {
    if name.trim().is_empty() {
        return String::new();
    }

    let mut result = name.to_lowercase();

    result = remove_corporate_suffixes(&result);
    result = strip_domain_suffix(&result);
    result = keep_printable_ascii(&result);
    result = to_title_case(&result);
    result = result.replace("'S", "'s");
    result = strip_tagline(&result);

    let cleaned = result.trim().to_string();
    debug!("Normalized company '{}' to '{}'", name, cleaned);
    cleaned
}

fn remove_corporate_suffixes(name: &str) -> String {
    CORPORATE_SUFFIXES
        .iter()
        .fold(name.to_string(), |acc, suffix| acc.replace(suffix, ""))
}

/// Drop `.com`-style tokens anywhere in the name, then one trailing period.
fn strip_domain_suffix(name: &str) -> String {
    let without_tokens = DOT_WORD_REGEX.replace_all(name, "");
    without_tokens
        .strip_suffix('.')
        .unwrap_or(&without_tokens)
        .to_string()
}

/// Keep only printable ASCII (space through `~`).
fn keep_printable_ascii(name: &str) -> String {
    name.chars().filter(|c| (' '..='~').contains(c)).collect()
}

/// Upper-case the first character of every word. A word starts at an
/// alphanumeric or `_` character that does not follow another one.
fn to_title_case(name: &str) -> String {
    let mut prev_is_word = false;
    name.chars()
        .map(|c| {
            let is_word = c.is_ascii_alphanumeric() || c == '_';
            let out = if is_word && !prev_is_word {
                c.to_ascii_uppercase()
            } else {
                c
            };
            prev_is_word = is_word;
            out
        })
        .collect()
}

/// Cut everything from the first `|` or `:` onwards.
fn strip_tagline(name: &str) -> String {
    TAGLINE_REGEX.replace(name, "").to_string()
}
