//! Record extraction: rendered guest entries to structured candidates.
//!
//! Pure functions over the snapshots the driver hands back, so the rules are
//! testable without a browser. Entries are mapped in rendered order and the
//! mapping is deterministic, which makes extraction idempotent on an
//! unchanged list.

use tracing::debug;

use crate::driver::RenderedGuest;
use crate::records::GuestCandidate;

/// Maps rendered entries to candidates, preserving order.
///
/// Rules, applied per entry:
/// 1. A display name containing `@` is an email placeholder (the guest never
///    set a name); the entry is discarded.
/// 2. The name splits on its first whitespace run; first token is the first
///    name, the remainder (possibly empty) the last name, each capitalized.
/// 3. An entry with a missing or empty href is discarded.
/// 4. The profile URL is the href joined to `base_origin`.
#[must_use]
pub fn extract_candidates(entries: &[RenderedGuest], base_origin: &str) -> Vec<GuestCandidate> {
    entries
        .iter()
        .filter_map(|entry| extract_one(entry, base_origin))
        .collect()
}

fn extract_one(entry: &RenderedGuest, base_origin: &str) -> Option<GuestCandidate> {
    let name = entry.name_text.trim();
    if name.contains('@') {
        debug!(name, "skipping email-placeholder entry");
        return None;
    }

    let (first_name, last_name) = split_name(name)?;

    let href = match entry.href.as_deref() {
        Some(href) if !href.is_empty() => href,
        _ => {
            debug!(name, "skipping entry without a profile href");
            return None;
        }
    };

    Some(GuestCandidate::new(
        first_name,
        last_name,
        absolute_url(base_origin, href),
    ))
}

/// Splits a display name on its first whitespace run and capitalizes both
/// parts. Returns `None` for an empty name.
#[must_use]
pub fn split_name(name: &str) -> Option<(String, String)> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => Some((capitalize(first), capitalize(rest.trim_start()))),
        None => Some((capitalize(trimmed), String::new())),
    }
}

/// Uppercases the first character and lowercases the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Joins an href to the base origin; already-absolute hrefs pass through.
#[must_use]
pub fn absolute_url(base_origin: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let origin = base_origin.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        format!("{origin}/{href}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ORIGIN: &str = "https://lu.ma";

    #[test]
    fn test_two_part_name() {
        assert_eq!(
            split_name("Jane Doe"),
            Some(("Jane".to_string(), "Doe".to_string()))
        );
    }

    #[test]
    fn test_single_name_has_empty_last_name() {
        assert_eq!(
            split_name("Madonna"),
            Some(("Madonna".to_string(), String::new()))
        );
    }

    #[test]
    fn test_name_capitalization_normalizes_case() {
        assert_eq!(
            split_name("jane DOE"),
            Some(("Jane".to_string(), "Doe".to_string()))
        );
        // The remainder is capitalized as a whole, not per word.
        assert_eq!(
            split_name("anna van der berg"),
            Some(("Anna".to_string(), "Van der berg".to_string()))
        );
    }

    #[test]
    fn test_email_placeholder_produces_no_candidate() {
        let entries = vec![RenderedGuest::new("user@example.com", "/user/usr-1")];
        assert!(extract_candidates(&entries, ORIGIN).is_empty());
    }

    #[test]
    fn test_missing_or_empty_href_is_discarded() {
        let entries = vec![
            RenderedGuest::without_href("Jane Doe"),
            RenderedGuest::new("John Roe", ""),
        ];
        assert!(extract_candidates(&entries, ORIGIN).is_empty());
    }

    #[test]
    fn test_profile_urls_are_origin_prefixed() {
        let entries = vec![
            RenderedGuest::new("Jane Doe", "/user/usr-1"),
            RenderedGuest::new("John Roe", "user/usr-2"),
            RenderedGuest::new("Sam Poe", "https://lu.ma/user/usr-3"),
        ];
        let candidates = extract_candidates(&entries, ORIGIN);
        assert_eq!(candidates.len(), 3);
        for candidate in &candidates {
            assert!(candidate.profile_url.starts_with("https://lu.ma/"));
        }
        assert_eq!(candidates[0].profile_url, "https://lu.ma/user/usr-1");
        assert_eq!(candidates[1].profile_url, "https://lu.ma/user/usr-2");
    }

    #[test]
    fn test_extraction_order_matches_rendered_order() {
        let entries = vec![
            RenderedGuest::new("Bravo One", "/user/usr-b"),
            RenderedGuest::new("Alpha Two", "/user/usr-a"),
        ];
        let candidates = extract_candidates(&entries, ORIGIN);
        assert_eq!(candidates[0].first_name, "Bravo");
        assert_eq!(candidates[1].first_name, "Alpha");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let entries = vec![
            RenderedGuest::new("Jane Doe", "/user/usr-1"),
            RenderedGuest::new("user@example.com", "/user/usr-2"),
            RenderedGuest::new("Madonna", "/user/usr-3"),
        ];
        let first_pass = extract_candidates(&entries, ORIGIN);
        let second_pass = extract_candidates(&entries, ORIGIN);
        assert_eq!(first_pass, second_pass);
        assert_eq!(first_pass.len(), 2);
    }

    #[test]
    fn test_mixed_list() {
        let entries = vec![
            RenderedGuest::new("Jane Doe", "/user/usr-1"),
            RenderedGuest::new("someone@corp.io", "/user/usr-2"),
            RenderedGuest::without_href("Ghost Entry"),
            RenderedGuest::new("Madonna", "/user/usr-4"),
        ];
        let candidates = extract_candidates(&entries, ORIGIN);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].display_name(), "Jane Doe");
        assert_eq!(candidates[1].display_name(), "Madonna");
        assert_eq!(candidates[1].last_name, "");
    }
}
