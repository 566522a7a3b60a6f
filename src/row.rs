//! Row model shared by every pipeline stage.
//!
//! A row is an ordered column -> value map. Source columns keep their input
//! order; pipelines append derived columns after them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One CSV record, keyed by header name in column order.
pub type Row = IndexMap<String, String>;

pub const CLEANED_WEBSITE: &str = "cleaned_website";
pub const CLEANED_COMPANY_NAME: &str = "cleaned_company_name";
pub const MX_PROVIDER: &str = "mx_provider";
pub const OTHER_DM_NAME: &str = "other_dm_name";
pub const TO_BE_DELETED: &str = "to_be_deleted";
pub const DOMAIN_OCCURRENCE_COUNT: &str = "domain_occurrence_count";
pub const EMAIL: &str = "email";
pub const FULL_NAME: &str = "full_name";
pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const TITLE: &str = "title";
pub const PHONE: &str = "phone";

/// Number of numbered email slots (`email_1` .. `email_3`) read from
/// multiple-email files.
pub const MAX_NUMBERED_EMAILS: usize = 3;

/// Rows ranked above this within their effective domain are suppressed.
pub const MAX_DOMAIN_OCCURRENCES: usize = 6;

/// `mx_provider_<n>` column for numbered email slot `n` (1-based).
pub fn numbered_mx_column(slot: usize) -> String {
    format!("{}_{}", MX_PROVIDER, slot)
}

/// `email_<n>` column for numbered email slot `n` (1-based).
pub fn numbered_email_column(slot: usize) -> String {
    format!("{}_{}", EMAIL, slot)
}

/// Value of `column`, or "" when the row does not carry it.
pub fn value<'a>(row: &'a Row, column: &str) -> &'a str {
    row.get(column).map(String::as_str).unwrap_or("")
}

/// Tombstone attached to a row during a pipeline run.
///
/// Rows start at `No` and may move once into one of the `Yes (...)` reasons.
/// A reason is never replaced or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeletionMarker {
    No,
    DuplicateEmail,
    DomainFrequency,
    AllEmailsDuplicate,
    NoEmails,
}

impl DeletionMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionMarker::No => "No",
            DeletionMarker::DuplicateEmail => "Yes (Duplicate Email)",
            DeletionMarker::DomainFrequency => "Yes (Domain Frequency > 6)",
            DeletionMarker::AllEmailsDuplicate => "Yes (All Emails Duplicate)",
            DeletionMarker::NoEmails => "Yes (No Emails)",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "No" => Some(DeletionMarker::No),
            "Yes (Duplicate Email)" => Some(DeletionMarker::DuplicateEmail),
            "Yes (Domain Frequency > 6)" => Some(DeletionMarker::DomainFrequency),
            "Yes (All Emails Duplicate)" => Some(DeletionMarker::AllEmailsDuplicate),
            "Yes (No Emails)" => Some(DeletionMarker::NoEmails),
            _ => None,
        }
    }

    /// Reasons that make the finalizer drop the row.
    pub fn removes_row(&self) -> bool {
        matches!(
            self,
            DeletionMarker::DuplicateEmail
                | DeletionMarker::DomainFrequency
                | DeletionMarker::AllEmailsDuplicate
        )
    }
}

impl std::fmt::Display for DeletionMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current marker of a row. Missing or unrecognised values read as `No`.
pub fn marker(row: &Row) -> DeletionMarker {
    DeletionMarker::parse(value(row, TO_BE_DELETED)).unwrap_or(DeletionMarker::No)
}

pub fn is_live(row: &Row) -> bool {
    marker(row) == DeletionMarker::No
}

/// Move a row from `No` to `reason`. Returns false (and leaves the row
/// untouched) when the row already carries a reason.
pub fn mark_for_deletion(row: &mut Row, reason: DeletionMarker) -> bool {
    if !is_live(row) || reason == DeletionMarker::No {
        return false;
    }
    row.insert(TO_BE_DELETED.to_string(), reason.as_str().to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_marker_round_trips_through_strings() {
        for m in [
            DeletionMarker::No,
            DeletionMarker::DuplicateEmail,
            DeletionMarker::DomainFrequency,
            DeletionMarker::AllEmailsDuplicate,
            DeletionMarker::NoEmails,
        ] {
            assert_eq!(DeletionMarker::parse(m.as_str()), Some(m));
        }
        assert_eq!(DeletionMarker::parse("maybe"), None);
    }

    #[test]
    fn test_mark_only_moves_forward() {
        let mut r = row(&[(TO_BE_DELETED, "No")]);
        assert!(mark_for_deletion(&mut r, DeletionMarker::DuplicateEmail));
        assert!(!mark_for_deletion(&mut r, DeletionMarker::DomainFrequency));
        assert_eq!(marker(&r), DeletionMarker::DuplicateEmail);
    }

    #[test]
    fn test_missing_marker_reads_as_live() {
        let r = row(&[("email", "a@b.com")]);
        assert!(is_live(&r));
    }

    #[test]
    fn test_no_emails_is_not_a_removal_reason() {
        assert!(!DeletionMarker::NoEmails.removes_row());
        assert!(DeletionMarker::AllEmailsDuplicate.removes_row());
    }

    #[test]
    fn test_numbered_columns() {
        assert_eq!(numbered_email_column(2), "email_2");
        assert_eq!(numbered_mx_column(3), "mx_provider_3");
    }
}
