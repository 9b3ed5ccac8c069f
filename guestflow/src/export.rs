//! Export pipeline: filter, dedup, and CSV serialization.
//!
//! Only candidates that resolved to a LinkedIn URL are exported, and each
//! profile URL is exported at most once (a re-rendered virtualization window
//! can present the same guest twice; the first occurrence wins). Event
//! metadata is merged into every row under the fixed custom-attribute
//! columns. Writing is a single pass after all collection, so a failed run
//! never leaves a half-written file behind earlier stages.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::GuestflowError;
use crate::records::{EventMetadata, GuestCandidate};

/// The fixed CSV header.
pub const CSV_HEADER: [&str; 9] = [
    "first_name",
    "last_name",
    "linkedin",
    "custom_att_1",
    "custom_att_2",
    "custom_att_3",
    "custom_att_4",
    "custom_att_5",
    "custom_att_6",
];

/// What an export pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Rows written (excluding the header).
    pub written: usize,
    /// Candidates dropped for lacking a LinkedIn URL.
    pub without_link: usize,
    /// Candidates dropped as duplicate profile URLs.
    pub duplicates: usize,
}

/// Builds export rows: filter to linked candidates, dedup by profile URL,
/// merge metadata. Order follows the candidate list.
#[must_use]
pub fn build_rows(
    candidates: &[GuestCandidate],
    metadata: &EventMetadata,
    source_tag: &str,
) -> (Vec<Vec<String>>, ExportSummary) {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut without_link = 0;
    let mut duplicates = 0;

    for candidate in candidates {
        let Some(linkedin) = candidate.linkedin_url.as_deref().filter(|l| !l.is_empty()) else {
            without_link += 1;
            continue;
        };
        if !seen.insert(candidate.profile_url.clone()) {
            debug!(profile = %candidate.profile_url, "dropping duplicate profile");
            duplicates += 1;
            continue;
        }

        rows.push(vec![
            candidate.first_name.clone(),
            candidate.last_name.clone(),
            linkedin.to_string(),
            metadata.title.clone(),
            metadata.date.clone(),
            metadata.time.clone(),
            metadata.place.clone(),
            metadata.host.clone(),
            source_tag.to_string(),
        ]);
    }

    let summary = ExportSummary {
        written: rows.len(),
        without_link,
        duplicates,
    };
    (rows, summary)
}

/// Writes header and rows to `path` in one pass.
pub fn write_csv(path: &Path, rows: &[Vec<String>]) -> Result<(), GuestflowError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);

    let header: Vec<String> = CSV_HEADER.iter().map(|s| (*s).to_string()).collect();
    write_row(&mut file, &header)?;
    for row in rows {
        write_row(&mut file, row)?;
    }
    file.flush()?;
    Ok(())
}

/// Filters, dedups, and writes candidates in one step.
pub fn export_guests(
    path: &Path,
    candidates: &[GuestCandidate],
    metadata: &EventMetadata,
    source_tag: &str,
) -> Result<ExportSummary, GuestflowError> {
    let (rows, summary) = build_rows(candidates, metadata, source_tag);
    write_csv(path, &rows)?;
    info!(
        written = summary.written,
        without_link = summary.without_link,
        duplicates = summary.duplicates,
        path = %path.display(),
        "CSV export complete"
    );
    Ok(summary)
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(mut w: W, row: &[String]) -> std::io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            let escaped = cell.replace('"', "\"\"");
            write!(w, "\"{escaped}\"")?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metadata() -> EventMetadata {
        EventMetadata {
            title: "AI for Developers".to_string(),
            date: "Thursday, March 6".to_string(),
            time: "6:00 PM - 9:00 PM".to_string(),
            place: "Moscone Center, 747 Howard St".to_string(),
            host: "GitAuto".to_string(),
        }
    }

    fn linked(first: &str, last: &str, profile: &str, linkedin: &str) -> GuestCandidate {
        let mut c = GuestCandidate::new(first, last, profile);
        c.linkedin_url = Some(linkedin.to_string());
        c
    }

    #[test]
    fn test_candidates_without_link_are_filtered_out() {
        let candidates = vec![
            linked("Jane", "Doe", "https://lu.ma/user/usr-1", "https://linkedin.com/in/jane"),
            GuestCandidate::new("John", "Roe", "https://lu.ma/user/usr-2"),
        ];

        let (rows, summary) = build_rows(&candidates, &metadata(), "Luma");
        assert_eq!(rows.len(), 1);
        assert_eq!(summary.written, 1);
        assert_eq!(summary.without_link, 1);
    }

    #[test]
    fn test_all_rows_carry_identical_metadata_and_nonempty_linkedin() {
        let candidates = vec![
            linked("Jane", "Doe", "https://lu.ma/user/usr-1", "https://linkedin.com/in/jane"),
            linked("Madonna", "", "https://lu.ma/user/usr-2", "https://linkedin.com/in/madonna"),
        ];

        let (rows, _) = build_rows(&candidates, &metadata(), "Luma");
        for row in &rows {
            assert!(!row[2].is_empty());
            assert_eq!(row[3], "AI for Developers");
            assert_eq!(row[4], "Thursday, March 6");
            assert_eq!(row[5], "6:00 PM - 9:00 PM");
            assert_eq!(row[6], "Moscone Center, 747 Howard St");
            assert_eq!(row[7], "GitAuto");
            assert_eq!(row[8], "Luma");
        }
    }

    #[test]
    fn test_duplicate_profile_urls_export_once() {
        let candidates = vec![
            linked("Jane", "Doe", "https://lu.ma/user/usr-1", "https://linkedin.com/in/jane"),
            linked("Jane", "Doe", "https://lu.ma/user/usr-1", "https://linkedin.com/in/jane"),
        ];

        let (rows, summary) = build_rows(&candidates, &metadata(), "Luma");
        assert_eq!(rows.len(), 1);
        assert_eq!(summary.duplicates, 1);
    }

    #[test]
    fn test_empty_linkedin_counts_as_unset() {
        let mut candidate = GuestCandidate::new("Jane", "Doe", "https://lu.ma/user/usr-1");
        candidate.linkedin_url = Some(String::new());

        let (rows, summary) = build_rows(&[candidate], &metadata(), "Luma");
        assert!(rows.is_empty());
        assert_eq!(summary.without_link, 1);
    }

    #[test]
    fn test_csv_quoting_of_commas_and_quotes() {
        let mut buf = Vec::new();
        write_row(
            &mut buf,
            &[
                "plain".to_string(),
                "has,comma".to_string(),
                "has\"quote".to_string(),
            ],
        )
        .expect("write");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "plain,\"has,comma\",\"has\"\"quote\"\n"
        );
    }

    #[test]
    fn test_written_file_has_header_and_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.csv");

        let candidates = vec![linked(
            "Jane",
            "Doe",
            "https://lu.ma/user/usr-1",
            "https://linkedin.com/in/jane",
        )];
        let summary = export_guests(&path, &candidates, &metadata(), "Luma").expect("export");
        assert_eq!(summary.written, 1);

        let text = std::fs::read_to_string(&path).expect("read back");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("first_name,last_name,linkedin,custom_att_1,custom_att_2,custom_att_3,custom_att_4,custom_att_5,custom_att_6")
        );
        let row = lines.next().expect("one row");
        assert!(row.starts_with("Jane,Doe,https://linkedin.com/in/jane,"));
        // The place contains a comma and must be quoted.
        assert!(row.contains("\"Moscone Center, 747 Howard St\""));
        assert!(row.ends_with(",Luma"));
        assert_eq!(lines.next(), None);
    }
}
