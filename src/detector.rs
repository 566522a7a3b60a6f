//! Shape detection for uploaded contact lists and the column-mapping roles
//! each shape accepts.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::pipeline::ProcessingError;

// Matched case-sensitively: `Email_1` alone does not make a file multi-email.
static NUMBERED_EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"email_?[1-9]").unwrap()
});

/// Structural category of a contact-list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsvShape {
    DomainOnly,
    SingleEmail,
    MultipleEmail,
    Unknown,
}

impl CsvShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            CsvShape::DomainOnly => "domain_only",
            CsvShape::SingleEmail => "single_email",
            CsvShape::MultipleEmail => "multiple_email",
            CsvShape::Unknown => "unknown",
        }
    }

    /// Mapping roles offered for this shape, in display order.
    pub fn mapping_fields(&self) -> &'static [MappingField] {
        match self {
            CsvShape::DomainOnly => &[MappingField {
                role: MappingRole::Website,
                required: true,
            }],
            CsvShape::SingleEmail => &[
                MappingField {
                    role: MappingRole::Email,
                    required: true,
                },
                MappingField {
                    role: MappingRole::Website,
                    required: false,
                },
                MappingField {
                    role: MappingRole::Company,
                    required: false,
                },
                MappingField {
                    role: MappingRole::FullName,
                    required: false,
                },
            ],
            CsvShape::MultipleEmail => &[
                MappingField {
                    role: MappingRole::Company,
                    required: false,
                },
                MappingField {
                    role: MappingRole::Website,
                    required: false,
                },
            ],
            CsvShape::Unknown => &[],
        }
    }
}

impl fmt::Display for CsvShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a file from its header row.
///
/// Order of the headers never matters.
pub fn detect_shape<S: AsRef<str>>(headers: &[S]) -> CsvShape {
    let lowered: Vec<String> = headers.iter().map(|h| h.as_ref().to_lowercase()).collect();

    let has_website = lowered
        .iter()
        .any(|h| h.contains("website") || h.contains("domain") || h.contains("url"));
    let has_email_columns = lowered.iter().any(|h| h.contains("email"));
    let has_multiple_emails = headers
        .iter()
        .any(|h| NUMBERED_EMAIL_REGEX.is_match(h.as_ref()));

    if !has_email_columns && has_website {
        CsvShape::DomainOnly
    } else if has_multiple_emails {
        CsvShape::MultipleEmail
    } else if has_email_columns {
        CsvShape::SingleEmail
    } else {
        CsvShape::Unknown
    }
}

/// Logical column roles a user can map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingRole {
    Website,
    Email,
    Company,
    FullName,
}

impl MappingRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingRole::Website => "website",
            MappingRole::Email => "email",
            MappingRole::Company => "company",
            MappingRole::FullName => "full_name",
        }
    }

    /// Human-readable name used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            MappingRole::Website => "Website",
            MappingRole::Email => "Email",
            MappingRole::Company => "Company name",
            MappingRole::FullName => "Full name",
        }
    }
}

impl fmt::Display for MappingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingField {
    pub role: MappingRole,
    pub required: bool,
}

/// Role -> source header chosen for a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub website: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub full_name: Option<String>,
}

impl ColumnMapping {
    pub fn get(&self, role: MappingRole) -> Option<&str> {
        let column = match role {
            MappingRole::Website => &self.website,
            MappingRole::Email => &self.email,
            MappingRole::Company => &self.company,
            MappingRole::FullName => &self.full_name,
        };
        column.as_deref().filter(|c| !c.trim().is_empty())
    }

    fn set(&mut self, role: MappingRole, column: Option<String>) {
        match role {
            MappingRole::Website => self.website = column,
            MappingRole::Email => self.email = column,
            MappingRole::Company => self.company = column,
            MappingRole::FullName => self.full_name = column,
        }
    }

    /// Guess a mapping from header names for the roles `shape` accepts.
    pub fn suggest<S: AsRef<str>>(headers: &[S], shape: CsvShape) -> Self {
        let mut mapping = ColumnMapping::default();
        for field in shape.mapping_fields() {
            mapping.set(field.role, suggest_column(headers, field.role));
        }
        mapping
    }

    /// Keep explicit choices, filling unmapped roles with suggestions.
    pub fn or_suggested<S: AsRef<str>>(self, headers: &[S], shape: CsvShape) -> Self {
        let suggested = Self::suggest(headers, shape);
        ColumnMapping {
            website: self.website.or(suggested.website),
            email: self.email.or(suggested.email),
            company: self.company.or(suggested.company),
            full_name: self.full_name.or(suggested.full_name),
        }
    }

    /// Fails on the first required role of `shape` left unmapped.
    pub fn validate(&self, shape: CsvShape) -> Result<(), ProcessingError> {
        if shape == CsvShape::Unknown {
            return Err(ProcessingError::UnknownShape);
        }
        match shape
            .mapping_fields()
            .iter()
            .find(|f| f.required && self.get(f.role).is_none())
        {
            Some(field) => Err(ProcessingError::MissingMapping { role: field.role }),
            None => Ok(()),
        }
    }
}

fn suggest_column<S: AsRef<str>>(headers: &[S], role: MappingRole) -> Option<String> {
    let find = |pred: &dyn Fn(&str) -> bool| -> Option<String> {
        headers
            .iter()
            .map(|h| h.as_ref())
            .find(|h| pred(&h.to_lowercase()))
            .map(|h| h.to_string())
    };

    match role {
        MappingRole::Website => find(&|h| h.contains("website") || h.contains("domain") || h.contains("url")),
        MappingRole::Email => find(&|h| h == "email").or_else(|| find(&|h| h.contains("email"))),
        MappingRole::Company => find(&|h| h.contains("company")),
        MappingRole::FullName => find(&|h| h == "full_name" || h == "full name")
            .or_else(|| find(&|h| h.contains("name") && !h.contains("company"))),
    }
}
