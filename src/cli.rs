use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::detector::ColumnMapping;
use crate::export::LongNameFlag;

#[derive(Parser, Debug)]
#[command(name = "leadcleaner")]
#[command(about = "Clean, deduplicate and enrich contact-list CSV files")]
#[command(version)]
pub struct Cli {
    /// CSV files to clean (each becomes its own task)
    #[arg(value_name = "FILES", required_unless_present = "init")]
    pub files: Vec<PathBuf>,

    /// Create default configuration file at ./config/leadcleaner.toml
    #[arg(long)]
    pub init: bool,

    /// Path to configuration file (defaults to ./config/leadcleaner.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Column holding website URLs
    #[arg(long, value_name = "COLUMN")]
    pub website_column: Option<String>,

    /// Column holding email addresses (single-email files)
    #[arg(long, value_name = "COLUMN")]
    pub email_column: Option<String>,

    /// Column holding company names
    #[arg(long, value_name = "COLUMN")]
    pub company_column: Option<String>,

    /// Column holding the contact's full name
    #[arg(long, value_name = "COLUMN")]
    pub full_name_column: Option<String>,

    /// Directory for cleaned files
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Mark company names longer than the configured threshold (overrides config)
    #[arg(long, value_enum, value_name = "MODE")]
    pub flag_long_names: Option<FlagMode>,

    /// Skip MX provider lookups; provider columns stay empty
    #[arg(long)]
    pub no_mx: bool,

    /// Verbose logging (use -v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagMode {
    None,
    Prefix,
    Highlight,
}

impl From<FlagMode> for LongNameFlag {
    fn from(mode: FlagMode) -> Self {
        match mode {
            FlagMode::None => LongNameFlag::None,
            FlagMode::Prefix => LongNameFlag::Prefix,
            FlagMode::Highlight => LongNameFlag::Highlight,
        }
    }
}

impl Cli {
    /// Column choices given on the command line; unset roles stay `None`
    pub fn mapping(&self) -> ColumnMapping {
        ColumnMapping {
            website: self.website_column.clone(),
            email: self.email_column.clone(),
            company: self.company_column.clone(),
            full_name: self.full_name_column.clone(),
        }
    }
}
