//! Core record types produced by the pipeline.

use serde::{Deserialize, Serialize};

/// A provisional guest record, before and after profile enrichment.
///
/// Built by the extractor from a rendered guest entry; the resolver sets
/// `linkedin_url` at most once. Identity is `profile_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCandidate {
    /// First token of the display name, capitalized.
    pub first_name: String,
    /// Remainder of the display name; may be empty.
    pub last_name: String,
    /// Absolute URL of the guest's profile page.
    pub profile_url: String,
    /// LinkedIn URL found on the profile page, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
}

impl GuestCandidate {
    /// Creates an unenriched candidate.
    #[must_use]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        profile_url: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            profile_url: profile_url.into(),
            linkedin_url: None,
        }
    }

    /// The display name as exported ("First Last" or just "First").
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// Metadata of the event, read once per run and attached to every row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Event title.
    pub title: String,
    /// Event date line.
    pub date: String,
    /// Event time line.
    pub time: String,
    /// Venue ("name, address" for in-person events, platform name for
    /// virtual ones).
    pub place: String,
    /// Host name from the "Presented by" link.
    pub host: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_with_last_name() {
        let c = GuestCandidate::new("Jane", "Doe", "https://lu.ma/user/usr-1");
        assert_eq!(c.display_name(), "Jane Doe");
    }

    #[test]
    fn test_display_name_without_last_name() {
        let c = GuestCandidate::new("Madonna", "", "https://lu.ma/user/usr-2");
        assert_eq!(c.display_name(), "Madonna");
    }

    #[test]
    fn test_candidate_serializes_without_unset_linkedin() {
        let c = GuestCandidate::new("Jane", "Doe", "https://lu.ma/user/usr-1");
        let json = serde_json::to_string(&c).expect("serializes");
        assert!(!json.contains("linkedin_url"));
    }
}
