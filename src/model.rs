//! freee API record types.
//!
//! These mirror the JSON returned by the freee accounting API for the file box
//! ("receipts") endpoints, plus the parameters used to create a new receipt.
//!
//! Documentation:
//! <https://developer.freee.co.jp/reference/accounting/reference#/Receipts>

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A single file box entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    pub mime_type: String,
    pub origin: String,
    /// Registration timestamp in RFC 3339 format.
    pub created_at: String,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub qualified_invoice: Option<String>,
    #[serde(default)]
    pub invoice_registration_number: Option<String>,
    #[serde(default)]
    pub receipt_metadatum: Option<ReceiptMetadatum>,
    pub user: User,
}

/// Transaction details attached to a receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptMetadatum {
    #[serde(default)]
    pub partner_name: Option<String>,
    /// Issue date in `YYYY-MM-DD` format.
    #[serde(default)]
    pub issue_date: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
}

/// The user who registered a receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A company (事業所) the authenticated user belongs to.
///
/// Only the commonly used fields are typed; everything else is kept as-is so the
/// `companies` output stays faithful to the API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// Response body of `GET /api/1/companies`.
#[derive(Debug, Default, Deserialize)]
pub struct CompaniesResponse {
    #[serde(default)]
    pub companies: Option<Vec<Company>>,
}

/// Response body of `GET /api/1/receipts`.
#[derive(Debug, Default, Deserialize)]
pub struct ReceiptsResponse {
    #[serde(default)]
    pub receipts: Option<Vec<Receipt>>,
}

/// Response body of `GET /api/1/receipts/{id}` and `POST /api/1/receipts`.
#[derive(Debug, Default, Deserialize)]
pub struct ReceiptResponse {
    #[serde(default)]
    pub receipt: Option<Receipt>,
}

/// Kind of document (書類の種類).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Receipt,
    Invoice,
    Other,
}

/// Qualified invoice status (適格請求書等).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifiedInvoice {
    Qualified,
    #[value(name = "not_qualified")]
    NotQualified,
    Unselected,
}

impl DocumentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Invoice => "invoice",
            Self::Other => "other",
        }
    }
}

impl QualifiedInvoice {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Qualified => "qualified",
            Self::NotQualified => "not_qualified",
            Self::Unselected => "unselected",
        }
    }
}

/// File attachment for a new receipt.
///
/// The content is either held in memory or read lazily from disk while encoding.
#[derive(Debug, Clone)]
pub struct ReceiptFile {
    filename: String,
    source: FileSource,
}

#[derive(Debug, Clone)]
enum FileSource {
    Memory(Vec<u8>),
    Path(PathBuf),
}

impl ReceiptFile {
    /// Create an in-memory attachment. Only the basename of `filename` is kept.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, filename: &str) -> Self {
        Self {
            filename: basename(filename),
            source: FileSource::Memory(bytes),
        }
    }

    /// Read all of `reader` into an in-memory attachment.
    ///
    /// # Errors
    /// Returns an error if reading fails.
    pub fn from_reader<R: Read>(mut reader: R, filename: &str) -> io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::from_bytes(bytes, filename))
    }

    /// Attachment backed by a file on disk. The file is opened when the request is encoded.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        Self {
            filename: crate::path_to_filename_string(path),
            source: FileSource::Path(path.to_path_buf()),
        }
    }

    /// Filename sent in the `Content-Disposition` header.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Open a reader over the attachment content.
    ///
    /// # Errors
    /// Returns an error if the backing file cannot be opened.
    pub fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(Box::new(bytes.as_slice())),
            FileSource::Path(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        }
    }
}

/// Parameters for `POST /api/1/receipts`.
#[derive(Debug, Clone)]
pub struct ReceiptCreateParams {
    pub company_id: i64,
    pub receipt: ReceiptFile,
    /// Free-text memo, at most 255 characters.
    pub description: Option<String>,
    pub document_type: Option<DocumentType>,
    pub qualified_invoice: Option<QualifiedInvoice>,
    pub receipt_metadatum_amount: Option<i64>,
    /// Issue date in `YYYY-MM-DD` format.
    pub receipt_metadatum_issue_date: Option<String>,
    pub receipt_metadatum_partner_name: Option<String>,
}

impl ReceiptCreateParams {
    /// Create params with only the required fields set.
    #[must_use]
    pub const fn new(company_id: i64, receipt: ReceiptFile) -> Self {
        Self {
            company_id,
            receipt,
            description: None,
            document_type: None,
            qualified_invoice: None,
            receipt_metadatum_amount: None,
            receipt_metadatum_issue_date: None,
            receipt_metadatum_partner_name: None,
        }
    }

    /// Optional form fields in wire order, with their values when set.
    #[must_use]
    pub fn optional_fields(&self) -> [(&'static str, Option<Cow<'_, str>>); 6] {
        [
            ("description", self.description.as_deref().map(Cow::Borrowed)),
            (
                "document_type",
                self.document_type.map(|value| Cow::Borrowed(value.as_str())),
            ),
            (
                "qualified_invoice",
                self.qualified_invoice.map(|value| Cow::Borrowed(value.as_str())),
            ),
            (
                "receipt_metadatum_amount",
                self.receipt_metadatum_amount.map(|amount| Cow::Owned(amount.to_string())),
            ),
            (
                "receipt_metadatum_issue_date",
                self.receipt_metadatum_issue_date.as_deref().map(Cow::Borrowed),
            ),
            (
                "receipt_metadatum_partner_name",
                self.receipt_metadatum_partner_name.as_deref().map(Cow::Borrowed),
            ),
        ]
    }
}

fn basename(filename: &str) -> String {
    let name = crate::path_to_filename_string(Path::new(filename));
    if name.is_empty() { filename.to_string() } else { name }
}
