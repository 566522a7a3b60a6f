//! Final column policy and tombstone removal before export.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::info;

use crate::row::{self, Row, MAX_DOMAIN_OCCURRENCES};

/// Source metadata and bookkeeping columns never exported.
pub const COLUMNS_TO_REMOVE: &[&str] = &[
    // Reviews and media
    "reviews_link",
    "reviews_tags",
    "reviews_per_score",
    "reviews_per_score_1",
    "reviews_per_score_2",
    "reviews_per_score_3",
    "reviews_per_score_4",
    "reviews_per_score_5",
    "photos_count",
    "photo",
    "street_view",
    "located_in",
    // Listing details
    "working_hours",
    "working_hours_old_format",
    "other_hours",
    "popular_times",
    "business_status",
    "about",
    "range",
    "posts",
    "logo",
    "description",
    "typical_time_spent",
    "verified",
    "owner_id",
    "owner_title",
    "owner_link",
    "reservation_links",
    "booking_appointment_link",
    "menu_link",
    "order_links",
    "location_link",
    "location_reviews_link",
    // Listing identifiers
    "place_id",
    "google_id",
    "cid",
    "kgmid",
    "reviews_id",
    "located_google_id",
    // Website metadata
    "website_title",
    "website_generator",
    "website_description",
    "website_keywords",
    "website_has_fb_pixel",
    "website_has_google_tag",
    // Social profiles
    "tiktok",
    "medium",
    "reddit",
    "skype",
    "snapchat",
    "telegram",
    "whatsapp",
    "twitter",
    "vimeo",
    "youtube",
    "github",
    "crunchbase",
    "instagram",
    "facebook",
    // Geo
    "latitude",
    "longitude",
    "h3",
    "plus_code",
    "area_service",
    // Enrichment vendor fields
    "Seniority",
    "Function",
    "Key",
    "ID",
    "Company ID",
    "Headline",
    "Company Twitter",
    "Company Facebook",
    "Alexa Ranking",
    "Keywords",
    "Industries",
    "Secondary Industries",
    "Company Postal Code",
    "Company Founded Year",
    // Pipeline bookkeeping
    row::TO_BE_DELETED,
    row::DOMAIN_OCCURRENCE_COUNT,
    "email_occurrence",
];

/// Columns kept even when listed in [`COLUMNS_TO_REMOVE`].
pub const PRESERVED_COLUMNS: &[&str] = &[
    row::EMAIL,
    row::FULL_NAME,
    row::FIRST_NAME,
    row::LAST_NAME,
    row::TITLE,
    row::PHONE,
    row::OTHER_DM_NAME,
    row::MX_PROVIDER,
    "mx_provider_1",
    "mx_provider_2",
    "mx_provider_3",
    row::CLEANED_WEBSITE,
    row::CLEANED_COMPANY_NAME,
];

// email_1, email_2_full_name, ...
static NUMBERED_EMAIL_COLUMN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^email_\d+(_.*)?$").unwrap()
});

static REMOVED: Lazy<HashSet<&'static str>> = Lazy::new(|| COLUMNS_TO_REMOVE.iter().copied().collect());

pub fn is_preserved(column: &str) -> bool {
    PRESERVED_COLUMNS.contains(&column) || NUMBERED_EMAIL_COLUMN_REGEX.is_match(column)
}

/// Whether `column` appears in exported rows.
pub fn keeps_column(column: &str) -> bool {
    is_preserved(column) || !REMOVED.contains(column)
}

/// Rows whose domain rank is past the limit, judged from the stored count.
/// Only applies to rows with a website.
fn exceeds_domain_limit(r: &Row) -> bool {
    if row::value(r, row::CLEANED_WEBSITE).trim().is_empty() {
        return false;
    }
    row::value(r, row::DOMAIN_OCCURRENCE_COUNT)
        .trim()
        .parse::<usize>()
        .map(|count| count > MAX_DOMAIN_OCCURRENCES)
        .unwrap_or(false)
}

/// Turn pipeline output into exportable rows: drop over-limit and
/// tombstoned rows, then strip unwanted columns from what remains.
pub fn finalize(rows: Vec<Row>) -> Vec<Row> {
    let total = rows.len();

    let finalized: Vec<Row> = rows
        .into_iter()
        .filter(|r| !exceeds_domain_limit(r))
        .filter(|r| !row::marker(r).removes_row())
        .map(|r| r.into_iter().filter(|(column, _)| keeps_column(column)).collect())
        .collect();

    info!("Finalized {} of {} rows for export", finalized.len(), total);
    finalized
}
