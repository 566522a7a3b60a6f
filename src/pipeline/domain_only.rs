//! Pipeline for files that list websites but no email addresses.

use tracing::debug;

use super::{Progress, ProcessingError};
use crate::detector::{ColumnMapping, MappingRole};
use crate::dns::MxResolver;
use crate::domain_utils::effective_domain;
use crate::row::{self, Row};

pub async fn process(
    rows: Vec<Row>,
    mapping: &ColumnMapping,
    resolver: Option<&MxResolver>,
    progress: Progress<'_>,
) -> Result<Vec<Row>, ProcessingError> {
    let website_column = mapping
        .get(MappingRole::Website)
        .ok_or(ProcessingError::MissingMapping { role: MappingRole::Website })?;

    let total = rows.len();
    let mut rows: Vec<Row> = rows
        .into_iter()
        .filter(|r| !row::value(r, website_column).trim().is_empty())
        .collect();
    debug!("{} of {} rows carry a website", rows.len(), total);
    progress(20);

    let provider_columns = [row::MX_PROVIDER.to_string()];
    for r in rows.iter_mut() {
        let website = super::cleaned_website(r, mapping);
        super::set(r, row::CLEANED_WEBSITE, website);
        if let Some(company) = super::cleaned_company(r, mapping) {
            super::set(r, row::CLEANED_COMPANY_NAME, company);
        }
        super::init_bookkeeping(r, &provider_columns);
    }
    progress(40);

    let domains: Vec<String> = rows
        .iter()
        .map(|r| effective_domain(row::value(r, row::CLEANED_WEBSITE), ""))
        .collect();
    super::count_domain_occurrences(&mut rows, &domains);
    progress(50);

    // No email addresses, so no alternates to assign
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
