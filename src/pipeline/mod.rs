//! Row pipelines.
//!
//! Each shape has its own module for filtering, enrichment and email
//! deduplication. Domain counting, alternate assignment and MX resolution
//! are shared and live here. All passes run over one `Vec<Row>` by index,
//! each finishing before the next starts.

pub mod domain_only;
pub mod multiple_email;
pub mod single_email;

use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::contact::{self, Candidate};
use crate::detector::{ColumnMapping, CsvShape, MappingRole};
use crate::dns::{MxProvider, MxResolver};
use crate::row::{self, DeletionMarker, Row, MAX_DOMAIN_OCCURRENCES};

/// Fatal input errors. Anything else degrades to a value in the row.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("No headers found in CSV file")]
    NoHeaders,

    #[error("No data found in CSV file")]
    NoData,

    #[error("Unknown CSV type")]
    UnknownShape,

    #[error("{} column not mapped", .role.label())]
    MissingMapping { role: MappingRole },

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task {0} has no processed data to export")]
    NoResult(String),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Progress callback receiving a percentage.
pub type Progress<'a> = &'a mut dyn FnMut(u8);

/// Percent reported once MX resolution starts
const MX_PROGRESS_START: u8 = 60;
/// Percent reported when a pipeline finishes
const PIPELINE_PROGRESS_END: u8 = 90;

/// Run the pipeline for `shape` over `rows`.
///
/// With no resolver the provider columns stay empty. The returned rows
/// include tombstoned ones; removal is the finalizer's job.
pub async fn process(
    shape: CsvShape,
    rows: Vec<Row>,
    mapping: &ColumnMapping,
    resolver: Option<&MxResolver>,
    progress: Progress<'_>,
) -> Result<Vec<Row>, ProcessingError> {
    mapping.validate(shape)?;
    info!("Processing {} rows as {}", rows.len(), shape);

    match shape {
        CsvShape::DomainOnly => domain_only::process(rows, mapping, resolver, progress).await,
        CsvShape::SingleEmail => single_email::process(rows, mapping, resolver, progress).await,
        CsvShape::MultipleEmail => multiple_email::process(rows, mapping, resolver, progress).await,
        CsvShape::Unknown => Err(ProcessingError::UnknownShape),
    }
}

/// Insert or overwrite a column. Overwriting keeps the column's position.
pub(crate) fn set(row: &mut Row, column: &str, value: impl Into<String>) {
    row.insert(column.to_string(), value.into());
}

/// Bookkeeping columns every pipeline starts from, appended after the
/// shape-specific fields.
pub(crate) fn init_bookkeeping(row: &mut Row, provider_columns: &[String]) {
    for column in provider_columns {
        set(row, column, "");
    }
    set(row, row::OTHER_DM_NAME, "");
    set(row, row::TO_BE_DELETED, DeletionMarker::No.as_str());
    set(row, row::DOMAIN_OCCURRENCE_COUNT, "0");
}

/// `clean_company_name` of the mapped company column, when one is mapped.
pub(crate) fn cleaned_company(row: &Row, mapping: &ColumnMapping) -> Option<String> {
    mapping
        .get(MappingRole::Company)
        .map(|column| crate::org_normalizer::clean_company_name(row::value(row, column)))
}

/// `clean_domain` of the mapped website column, or "" when unmapped.
pub(crate) fn cleaned_website(row: &Row, mapping: &ColumnMapping) -> String {
    mapping
        .get(MappingRole::Website)
        .map(|column| crate::domain_utils::clean_domain(row::value(row, column)))
        .unwrap_or_default()
}

/// Rank live rows within their effective domain, in row order, and
/// tombstone every row ranked past the limit.
///
/// Rows already tombstoned or without a domain keep a count of 0.
pub(crate) fn count_domain_occurrences(rows: &mut [Row], domains: &[String]) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut suppressed = 0;

    for (row, domain) in rows.iter_mut().zip(domains) {
        if domain.is_empty() || !row::is_live(row) {
            continue;
        }

        let rank = counts.entry(domain.as_str()).or_insert(0);
        *rank += 1;
        set(row, row::DOMAIN_OCCURRENCE_COUNT, rank.to_string());

        if *rank > MAX_DOMAIN_OCCURRENCES && row::mark_for_deletion(row, DeletionMarker::DomainFrequency) {
            suppressed += 1;
        }
    }

    if suppressed > 0 {
        info!(
            "Suppressed {} rows from domains with more than {} contacts",
            suppressed, MAX_DOMAIN_OCCURRENCES
        );
    }
}

/// Write round-robin alternates into `other_dm_name`.
///
/// Candidates whose row is no longer live are ignored.
pub(crate) fn assign_alternates(rows: &mut [Row], candidates: Vec<Candidate>) {
    let live: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| rows.get(c.row_index).map(row::is_live).unwrap_or(false))
        .collect();

    let assigned = contact::assign_other_dm_names(&live);
    debug!("Assigned alternate contacts to {} rows", assigned.len());

    for (index, name) in assigned {
        if let Some(row) = rows.get_mut(index) {
            set(row, row::OTHER_DM_NAME, name);
        }
    }
}

/// One provider cell to fill: row index, target column, domain to resolve.
pub(crate) struct MxTarget {
    pub row_index: usize,
    pub column: String,
    pub domain: String,
}

/// Resolve MX providers for `targets` and write the labels into the rows.
///
/// Only live rows are looked up. Progress moves from 60 to 90 as batches
/// complete. Without a resolver nothing is written.
pub(crate) async fn resolve_providers(
    rows: &mut [Row],
    targets: Vec<MxTarget>,
    resolver: Option<&MxResolver>,
    progress: Progress<'_>,
) {
    let Some(resolver) = resolver else {
        debug!("MX resolution disabled; provider columns left empty");
        return;
    };

    let targets: Vec<MxTarget> = targets
        .into_iter()
        .filter(|t| rows.get(t.row_index).map(row::is_live).unwrap_or(false))
        .collect();

    progress(MX_PROGRESS_START);

    let span = (PIPELINE_PROGRESS_END - MX_PROGRESS_START) as usize;
    let providers = resolver
        .batch_resolve(
            targets.iter().map(|t| t.domain.as_str()),
            resolver.batch_size(),
            |done, total| {
                let pct = MX_PROGRESS_START as usize + span * done / total.max(1);
                progress(pct as u8);
            },
        )
        .await;

    for target in targets {
        let key = target.domain.trim().to_lowercase();
        let provider = providers.get(&key).copied().unwrap_or(MxProvider::Unknown);
        if let Some(row) = rows.get_mut(target.row_index) {
            set(row, &target.column, provider.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_row() -> Row {
        let mut r = Row::new();
        init_bookkeeping(&mut r, &[row::MX_PROVIDER.to_string()]);
        r
    }

    #[test]
    fn test_bookkeeping_columns_in_order() {
        let r = live_row();
        let keys: Vec<&str> = r.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![row::MX_PROVIDER, row::OTHER_DM_NAME, row::TO_BE_DELETED, row::DOMAIN_OCCURRENCE_COUNT]
        );
        assert!(row::is_live(&r));
    }

    #[test]
    fn test_seventh_row_for_domain_is_suppressed() {
        let mut rows: Vec<Row> = (0..8).map(|_| live_row()).collect();
        let domains: Vec<String> = (0..8).map(|_| "busy.com".to_string()).collect();

        count_domain_occurrences(&mut rows, &domains);

        assert_eq!(row::value(&rows[0], row::DOMAIN_OCCURRENCE_COUNT), "1");
        assert_eq!(row::value(&rows[5], row::DOMAIN_OCCURRENCE_COUNT), "6");
        assert!(row::is_live(&rows[5]));
        assert_eq!(row::marker(&rows[6]), DeletionMarker::DomainFrequency);
        assert_eq!(row::marker(&rows[7]), DeletionMarker::DomainFrequency);
    }

    #[test]
    fn test_tombstoned_rows_do_not_consume_a_rank() {
        let mut rows: Vec<Row> = (0..3).map(|_| live_row()).collect();
        row::mark_for_deletion(&mut rows[0], DeletionMarker::DuplicateEmail);
        let domains = vec!["x.com".to_string(); 3];

        count_domain_occurrences(&mut rows, &domains);

        assert_eq!(row::value(&rows[0], row::DOMAIN_OCCURRENCE_COUNT), "0");
        assert_eq!(row::value(&rows[1], row::DOMAIN_OCCURRENCE_COUNT), "1");
        assert_eq!(row::value(&rows[2], row::DOMAIN_OCCURRENCE_COUNT), "2");
        assert_eq!(row::marker(&rows[0]), DeletionMarker::DuplicateEmail);
    }

    #[test]
    fn test_rows_without_domain_are_not_counted() {
        let mut rows: Vec<Row> = (0..2).map(|_| live_row()).collect();
        count_domain_occurrences(&mut rows, &[String::new(), String::new()]);
        assert_eq!(row::value(&rows[0], row::DOMAIN_OCCURRENCE_COUNT), "0");
    }

    #[test]
    fn test_alternates_skip_dead_rows() {
        let mut rows: Vec<Row> = (0..3).map(|_| live_row()).collect();
        row::mark_for_deletion(&mut rows[2], DeletionMarker::DomainFrequency);
        let candidates = vec![
            Candidate::new(0, "x.com", "a@x.com", "A"),
            Candidate::new(1, "x.com", "b@x.com", "B"),
            Candidate::new(2, "x.com", "c@x.com", "C"),
        ];

        assign_alternates(&mut rows, candidates);

        assert_eq!(row::value(&rows[0], row::OTHER_DM_NAME), "B");
        assert_eq!(row::value(&rows[1], row::OTHER_DM_NAME), "A");
        assert_eq!(row::value(&rows[2], row::OTHER_DM_NAME), "");
    }

    #[tokio::test]
    async fn test_no_resolver_leaves_providers_empty() {
        let mut rows = vec![live_row()];
        let targets = vec![MxTarget {
            row_index: 0,
            column: row::MX_PROVIDER.to_string(),
            domain: "acme.io".to_string(),
        }];
        let mut seen = Vec::new();
        resolve_providers(&mut rows, targets, None, &mut |p| seen.push(p)).await;
        assert_eq!(row::value(&rows[0], row::MX_PROVIDER), "");
        assert!(seen.is_empty());
    }

    #[test]
    fn test_missing_mapping_message() {
        let err = ProcessingError::MissingMapping { role: MappingRole::Email };
        assert_eq!(err.to_string(), "Email column not mapped");
    }
}
