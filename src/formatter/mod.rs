//! Receipt output: field registry, detail view, and list rendering.

mod error;
pub mod fields;
pub mod receipt;
pub mod table;

use std::fmt;

use clap::ValueEnum;

pub use error::FormatError;
pub use fields::{ALL_FIELD_NAMES, DEFAULT_FIELD_NAMES, FieldDefinition, FieldRegistry, parse_field_list};
pub use receipt::{ReceiptDetail, ReceiptList, extract_receipt_fields, format_amount, format_date_time, format_string};

/// Shown in place of a missing value.
pub const NONE_PLACEHOLDER: &str = "(none)";

/// Output format for receipt commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}
