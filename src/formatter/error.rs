use thiserror::Error;

/// Errors from rendering receipts.
#[derive(Debug, Error)]
pub enum FormatError {
    /// A requested field name is not in the registry.
    #[error("unsupported field[{index}]: {name}")]
    UnsupportedField { index: usize, name: String },

    #[error("receipt is missing")]
    NilRecord,

    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("serialize receipt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("write output: {0}")]
    Io(#[from] std::io::Error),
}

impl FormatError {
    /// The offending field name for [`FormatError::UnsupportedField`].
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::UnsupportedField { name, .. } => Some(name),
            _ => None,
        }
    }
}
