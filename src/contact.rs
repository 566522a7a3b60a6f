//! Contact-level helpers: email classification, full-name extraction,
//! numbered-email consolidation and round-robin alternate assignment.

use std::collections::{HashMap, HashSet};

use crate::row::{self, Row, MAX_NUMBERED_EMAILS};

/// Role mailboxes that never identify a decision maker.
const GENERIC_LOCAL_PARTS: &[&str] = &[
    "info",
    "contact",
    "hello",
    "support",
    "admin",
    "sales",
    "marketing",
    "help",
    "service",
    "billing",
    "office",
    "mail",
    "team",
    "enquiries",
    "enquiry",
    "general",
    "hr",
    "careers",
    "feedback",
    "webmaster",
    "helpdesk",
    "customerservice",
    "noreply",
    "no-reply",
    "donotreply",
    "do-not-reply",
];

/// Columns tried, in order, when no full-name column is mapped.
const FULL_NAME_FALLBACKS: &[&str] = &[
    "full_name",
    "Full Name",
    "name",
    "Name",
    "contact_name",
    "person_name",
];

/// True when the local part of `email` is a role mailbox such as `info@`.
/// Plus-addressed variants (`info+x@`) are not generic.
pub fn is_generic_email(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() {
        return false;
    }
    let local = email.split('@').next().unwrap_or("").to_lowercase();
    GENERIC_LOCAL_PARTS.contains(&local.as_str())
}

/// Deduplication key for an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_empty<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    let v = row::value(row, column).trim();
    (!v.is_empty()).then_some(v)
}

fn join_name(first: &str, last: &str) -> String {
    format!("{} {}", first.trim(), last.trim()).trim().to_string()
}

/// Best available full name for a single-contact row.
///
/// Order: the mapped column, the common name columns, then
/// `first_name`/`last_name` and `firstName`/`lastName` pairs. A pair is
/// used only when both halves are present.
pub fn extract_full_name(row: &Row, mapped_column: Option<&str>) -> String {
    if let Some(name) = mapped_column.and_then(|c| non_empty(row, c)) {
        return name.to_string();
    }

    if let Some(name) = FULL_NAME_FALLBACKS.iter().find_map(|c| non_empty(row, c)) {
        return name.to_string();
    }

    for (first_col, last_col) in [("first_name", "last_name"), ("firstName", "lastName")] {
        if let (Some(first), Some(last)) = (non_empty(row, first_col), non_empty(row, last_col)) {
            return join_name(first, last);
        }
    }

    String::new()
}

/// One person read from a numbered email slot of a multiple-email row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contact {
    /// 1-based slot (`email_<slot>`).
    pub slot: usize,
    pub email: String,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub phone: String,
}

/// Contacts held in `email_1..email_3` and their per-slot companion columns.
/// Slots with a blank email are skipped. Title and phone fall back to the
/// row-level `title` / `phone` columns.
pub fn consolidate_multiple_emails(row: &Row) -> Vec<Contact> {
    (1..=MAX_NUMBERED_EMAILS)
        .filter_map(|slot| {
            let prefix = row::numbered_email_column(slot);
            let email = non_empty(row, &prefix)?.to_string();

            let field = |suffix: &str| row::value(row, &format!("{}_{}", prefix, suffix)).trim().to_string();
            let first_name = field("first_name");
            let last_name = field("last_name");
            let full_name = match non_empty(row, &format!("{}_full_name", prefix)) {
                Some(name) => name.to_string(),
                None => join_name(&first_name, &last_name),
            };
            let title = non_empty(row, &format!("{}_title", prefix))
                .or_else(|| non_empty(row, row::TITLE))
                .unwrap_or("")
                .to_string();
            let phone = non_empty(row, &format!("{}_phone", prefix))
                .or_else(|| non_empty(row, row::PHONE))
                .unwrap_or("")
                .to_string();

            Some(Contact {
                slot,
                email,
                full_name,
                first_name,
                last_name,
                title,
                phone,
            })
        })
        .collect()
}

/// A contact eligible to be someone's alternate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Index of the owning row in the pipeline's row vector.
    pub row_index: usize,
    pub domain: String,
    pub email: String,
    pub full_name: String,
    /// Normalized emails of every contact on the owning row, this one included.
    pub row_emails: HashSet<String>,
}

impl Candidate {
    /// Candidate for a row holding a single contact.
    pub fn new(row_index: usize, domain: impl Into<String>, email: impl Into<String>, full_name: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            row_index,
            domain: domain.into(),
            row_emails: HashSet::from([normalize_email(&email)]),
            email,
            full_name: full_name.into(),
        }
    }

    /// Also count `emails` as belonging to this candidate's row.
    pub fn with_row_emails<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.row_emails.extend(
            emails
                .into_iter()
                .map(|e| normalize_email(e.as_ref()))
                .filter(|e| !e.is_empty()),
        );
        self
    }

    /// Named, non-generic and addressed to a known domain.
    pub fn is_valid(&self) -> bool {
        !self.full_name.trim().is_empty()
            && !self.email.trim().is_empty()
            && !self.domain.is_empty()
            && !is_generic_email(&self.email)
    }
}

/// Round-robin alternate assignment.
///
/// Candidates are grouped by domain in encounter order. Within a group of
/// two or more, each candidate receives the full name of the next one
/// (wrapping to the first). A next candidate whose email already appears on
/// the current candidate's row is passed over for the one after it; when
/// every other candidate is passed over, nothing is assigned.
/// Returns `row_index -> name`.
pub fn assign_other_dm_names(candidates: &[Candidate]) -> HashMap<usize, String> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&Candidate>> = HashMap::new();

    for candidate in candidates.iter().filter(|c| c.is_valid()) {
        let key = candidate.domain.as_str();
        if !groups.contains_key(key) {
            order.push(key);
        }
        groups.entry(key).or_default().push(candidate);
    }

    let mut assigned = HashMap::new();
    for key in order {
        let group = &groups[key];
        if group.len() < 2 {
            continue;
        }
        for (i, current) in group.iter().enumerate() {
            let next = (1..group.len())
                .map(|step| group[(i + step) % group.len()])
                .find(|other| !current.row_emails.contains(&normalize_email(&other.email)));
            if let Some(next) = next {
                assigned.insert(current.row_index, next.full_name.trim().to_string());
            }
        }
    }
    assigned
}
