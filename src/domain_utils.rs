use once_cell::sync::Lazy;
use regex::Regex;

// Leading scheme and "www." prefix, matched case-insensitively
static URL_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.)?").unwrap()
});

// Host part: everything up to the first path, query or fragment delimiter
static HOST_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^/?#]+)").unwrap()
});

/// Reduce a website value to its bare host, e.g.
/// `https://www.Example.com/path?x=1` -> `Example.com`.
///
/// The cleanup pass is repeated until the value stops changing, so cleaning
/// an already-clean domain is a no-op. Never fails; worst case the trimmed
/// input comes back.
pub fn clean_domain(url: &str) -> String {
    let mut current = url.trim().to_string();
    loop {
        let next = clean_domain_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_domain_once(url: &str) -> String {
    if url.is_empty() {
        return String::new();
    }

    let stripped = URL_PREFIX_REGEX.replace(url, "");

    match HOST_REGEX.captures(&stripped).and_then(|c| c.get(1)) {
        Some(host) => host.as_str().trim().to_string(),
        None => stripped.trim().to_string(),
    }
}

/// Domain portion of an email address (text after the first `@`).
/// Returns an empty string when the value has no `@`.
pub fn domain_from_email(email: &str) -> String {
    let email = email.trim();
    if !email.contains('@') {
        return String::new();
    }
    email.split('@').nth(1).unwrap_or("").trim().to_string()
}

/// Grouping key for a row: the cleaned website when present, otherwise the
/// domain of the row's first email. Lowercased so `Acme.com` and
/// `acme.com` land in the same group.
pub fn effective_domain(cleaned_website: &str, first_email: &str) -> String {
    let website = cleaned_website.trim();
    if !website.is_empty() {
        return website.to_lowercase();
    }
    domain_from_email(first_email).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_domain_strips_scheme_www_and_path() {
        assert_eq!(clean_domain("https://www.Example.com/path?x=1"), "Example.com");
        assert_eq!(clean_domain("http://acme.io"), "acme.io");
        assert_eq!(clean_domain("HTTPS://WWW.acme.io/"), "acme.io");
        assert_eq!(clean_domain("www.acme.io#contact"), "acme.io");
        assert_eq!(clean_domain("acme.io?ref=list"), "acme.io");
    }

    #[test]
    fn test_clean_domain_empty_and_whitespace() {
        assert_eq!(clean_domain(""), "");
        assert_eq!(clean_domain("   "), "");
        assert_eq!(clean_domain("  acme.io  "), "acme.io");
    }

    #[test]
    fn test_clean_domain_keeps_subdomains() {
        assert_eq!(clean_domain("https://shop.acme.co.uk/cart"), "shop.acme.co.uk");
    }

    #[test]
    fn test_clean_domain_is_idempotent() {
        let inputs = [
            "https://www.Example.com/path?x=1",
            "www.www.acme.io",
            "  www. www.acme.io",
            "http://https://acme.io",
            "/just/a/path",
            "?q=1",
            "not a url at all",
            "https://",
            "",
        ];
        for input in inputs {
            let once = clean_domain(input);
            assert_eq!(clean_domain(&once), once, "not stable for {:?}", input);
        }
    }

    #[test]
    fn test_domain_from_email() {
        assert_eq!(domain_from_email("jane@acme.io"), "acme.io");
        assert_eq!(domain_from_email(" jane@Acme.io "), "Acme.io");
        assert_eq!(domain_from_email("no-at-sign"), "");
        assert_eq!(domain_from_email(""), "");
    }

    #[test]
    fn test_effective_domain_prefers_website() {
        assert_eq!(effective_domain("Acme.io", "jane@other.com"), "acme.io");
        assert_eq!(effective_domain("", "jane@Other.com"), "other.com");
        assert_eq!(effective_domain("", ""), "");
    }
}
