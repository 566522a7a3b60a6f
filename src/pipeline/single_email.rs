//! Pipeline for files with one email address per row.

use std::collections::HashSet;
use tracing::{debug, info};

use super::{Progress, ProcessingError};
use crate::contact::{extract_full_name, normalize_email, Candidate};
use crate::detector::{ColumnMapping, MappingRole};
use crate::dns::MxResolver;
use crate::domain_utils::effective_domain;
use crate::row::{self, DeletionMarker, Row};

pub async fn process(
    rows: Vec<Row>,
    mapping: &ColumnMapping,
    resolver: Option<&MxResolver>,
    progress: Progress<'_>,
) -> Result<Vec<Row>, ProcessingError> {
    let email_column = mapping
        .get(MappingRole::Email)
        .ok_or(ProcessingError::MissingMapping { role: MappingRole::Email })?;
    let full_name_column = mapping.get(MappingRole::FullName);

    let total = rows.len();
    let mut rows: Vec<Row> = rows
        .into_iter()
        .filter(|r| !row::value(r, email_column).trim().is_empty())
        .collect();
    debug!("{} of {} rows carry an email", rows.len(), total);
    progress(20);

    let provider_columns = [row::MX_PROVIDER.to_string()];
    for r in rows.iter_mut() {
        let website = super::cleaned_website(r, mapping);
        let full_name = extract_full_name(r, full_name_column);
        super::set(r, row::CLEANED_WEBSITE, website);
        if let Some(company) = super::cleaned_company(r, mapping) {
            super::set(r, row::CLEANED_COMPANY_NAME, company);
        }
        super::set(r, row::FULL_NAME, full_name);
        super::init_bookkeeping(r, &provider_columns);
    }
    progress(30);

    mark_duplicate_emails(&mut rows, email_column);
    progress(40);

    let domains: Vec<String> = rows
        .iter()
        .map(|r| effective_domain(row::value(r, row::CLEANED_WEBSITE), row::value(r, email_column)))
        .collect();
    super::count_domain_occurrences(&mut rows, &domains);
    progress(50);

    let candidates = rows
        .iter()
        .zip(&domains)
        .enumerate()
        .map(|(row_index, (r, domain))| {
            Candidate::new(
                row_index,
                domain.as_str(),
                row::value(r, email_column).trim(),
                row::value(r, row::FULL_NAME),
            )
        })
        .collect();
    super::assign_alternates(&mut rows, candidates);

    let targets = domains
        .into_iter()
        .enumerate()
        .map(|(row_index, domain)| super::MxTarget {
            row_index,
            column: row::MX_PROVIDER.to_string(),
            domain,
        })
        .collect();
    super::resolve_providers(&mut rows, targets, resolver, progress).await;
    progress(super::PIPELINE_PROGRESS_END);

    Ok(rows)
}

/// Keep the first row per normalized email; later ones are tombstoned.
fn mark_duplicate_emails(rows: &mut [Row], email_column: &str) {
    let mut seen = HashSet::new();
    let mut duplicates = 0;

    for r in rows.iter_mut() {
        let key = normalize_email(row::value(r, email_column));
        if key.is_empty() {
            continue;
        }
        if !seen.insert(key) && row::mark_for_deletion(r, DeletionMarker::DuplicateEmail) {
            duplicates += 1;
        }
    }

    if duplicates > 0 {
        info!("Marked {} duplicate email rows", duplicates);
    }
}
