//! Pipeline for files carrying numbered email slots (`email_1` .. `email_3`).

use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{Progress, ProcessingError};
use crate::contact::{consolidate_multiple_emails, normalize_email, Candidate, Contact};
use crate::detector::ColumnMapping;
use crate::dns::MxResolver;
use crate::domain_utils::{domain_from_email, effective_domain};
use crate::row::{self, DeletionMarker, Row, MAX_NUMBERED_EMAILS};

pub async fn process(
    rows: Vec<Row>,
    mapping: &ColumnMapping,
    resolver: Option<&MxResolver>,
    progress: Progress<'_>,
) -> Result<Vec<Row>, ProcessingError> {
    let email_columns: Vec<String> = (1..=MAX_NUMBERED_EMAILS).map(row::numbered_email_column).collect();

    let total = rows.len();
    let mut rows: Vec<Row> = rows
        .into_iter()
        .filter(|r| email_columns.iter().any(|c| !row::value(r, c).is_empty()))
        .collect();
    debug!("{} of {} rows carry a numbered email", rows.len(), total);
    if rows.is_empty() && total > 0 {
        warn!(
            "None of {} rows has a value in {}; numbered columns must be named email_1 to email_{}",
            total,
            email_columns.join(", "),
            MAX_NUMBERED_EMAILS
        );
    }
    progress(20);

    let provider_columns: Vec<String> = (1..=MAX_NUMBERED_EMAILS).map(row::numbered_mx_column).collect();
    let mut contacts: Vec<Vec<Contact>> = Vec::with_capacity(rows.len());
    for r in rows.iter_mut() {
        let row_contacts = consolidate_multiple_emails(r);
        let first = row_contacts.first().cloned().unwrap_or_default();

        let website = super::cleaned_website(r, mapping);
        super::set(r, row::CLEANED_WEBSITE, website);
        if let Some(company) = super::cleaned_company(r, mapping) {
            super::set(r, row::CLEANED_COMPANY_NAME, company);
        }
        super::set(r, row::FULL_NAME, first.full_name);
        super::set(r, row::FIRST_NAME, first.first_name);
        super::set(r, row::LAST_NAME, first.last_name);
        super::set(r, row::TITLE, first.title);
        super::set(r, row::PHONE, first.phone);
        super::init_bookkeeping(r, &provider_columns);

        contacts.push(row_contacts);
    }
    progress(30);

    mark_duplicate_rows(&mut rows, &contacts);
    progress(40);

    let domains: Vec<String> = rows
        .iter()
        .zip(&contacts)
        .map(|(r, row_contacts)| {
            let first_email = row_contacts.first().map(|c| c.email.as_str()).unwrap_or("");
            effective_domain(row::value(r, row::CLEANED_WEBSITE), first_email)
        })
        .collect();
    super::count_domain_occurrences(&mut rows, &domains);
    progress(50);

    // The first named, non-generic contact stands in for the whole row;
    // the row's other addresses keep its own contacts out of its alternate
    let candidates = contacts
        .iter()
        .zip(&domains)
        .enumerate()
        .filter_map(|(row_index, (row_contacts, domain))| {
            row_contacts
                .iter()
                .map(|c| Candidate::new(row_index, domain.as_str(), c.email.as_str(), c.full_name.as_str()))
                .find(Candidate::is_valid)
                .map(|c| c.with_row_emails(row_contacts.iter().map(|other| other.email.as_str())))
        })
        .collect();
    super::assign_alternates(&mut rows, candidates);

    let targets = contacts
        .iter()
        .enumerate()
        .flat_map(|(row_index, row_contacts)| {
            row_contacts.iter().map(move |c| super::MxTarget {
                row_index,
                column: row::numbered_mx_column(c.slot),
                domain: domain_from_email(&c.email),
            })
        })
        .collect();
    super::resolve_providers(&mut rows, targets, resolver, progress).await;
    progress(super::PIPELINE_PROGRESS_END);

    Ok(rows)
}

/// Tombstone rows that add no new address.
///
/// A row with no usable email is marked `No Emails`. A row whose every
/// email was seen on an earlier row is marked `All Emails Duplicate`.
/// Surviving rows register all of their emails.
fn mark_duplicate_rows(rows: &mut [Row], contacts: &[Vec<Contact>]) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut duplicates = 0;

    for (r, row_contacts) in rows.iter_mut().zip(contacts) {
        let keys: Vec<String> = row_contacts
            .iter()
            .map(|c| normalize_email(&c.email))
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            row::mark_for_deletion(r, DeletionMarker::NoEmails);
            continue;
        }

        if keys.iter().all(|k| seen.contains(k)) {
            if row::mark_for_deletion(r, DeletionMarker::AllEmailsDuplicate) {
                duplicates += 1;
            }
            continue;
        }

        seen.extend(keys);
    }

    if duplicates > 0 {
        info!("Marked {} rows whose emails were all seen before", duplicates);
    }
}
