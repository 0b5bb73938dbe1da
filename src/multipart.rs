//! `multipart/form-data` encoding for receipt uploads.
//!
//! The freee API expects new receipts as a multipart form with the file in a part
//! named `receipt`. The body is built in full before sending so the exact bytes and
//! the boundary are known up front.

use std::io::{self, Read, Write};

use thiserror::Error;
use uuid::Uuid;

use crate::model::ReceiptCreateParams;

/// Content type used for the file part.
const FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Maximum boundary length allowed by RFC 2046.
const MAX_BOUNDARY_LENGTH: usize = 70;

/// Errors from building a multipart body.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("invalid boundary: {0:?}")]
    InvalidBoundary(String),

    #[error("open receipt file: {0}")]
    OpenAttachment(#[source] io::Error),

    #[error("read receipt file: {0}")]
    ReadAttachment(#[source] io::Error),

    #[error("write {part}: {source}")]
    WritePart {
        part: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("close writer: {0}")]
    Close(#[source] io::Error),
}

/// Encoded request body together with its `Content-Type` header value.
#[derive(Debug, Clone)]
pub struct EncodedBody {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Streaming `multipart/form-data` writer.
#[derive(Debug)]
pub struct MultipartWriter<W: Write> {
    writer: W,
    boundary: String,
    has_parts: bool,
}

impl<W: Write> MultipartWriter<W> {
    /// Create a writer with a random 64 character boundary.
    pub fn new(writer: W) -> Self {
        let boundary = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self {
            writer,
            boundary,
            has_parts: false,
        }
    }

    /// Create a writer with an explicit boundary.
    ///
    /// # Errors
    /// Returns an error if the boundary is empty, too long, or contains characters
    /// not allowed by RFC 2046.
    pub fn with_boundary(writer: W, boundary: &str) -> Result<Self, EncodeError> {
        if !is_valid_boundary(boundary) {
            return Err(EncodeError::InvalidBoundary(boundary.to_string()));
        }
        Ok(Self {
            writer,
            boundary: boundary.to_string(),
            has_parts: false,
        })
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `Content-Type` header value for the body being written.
    #[must_use]
    pub fn form_data_content_type(&self) -> String {
        if self.boundary.chars().any(|c| " ()<>@,;:\\\"/[]?=".contains(c)) {
            format!("multipart/form-data; boundary=\"{}\"", self.boundary)
        } else {
            format!("multipart/form-data; boundary={}", self.boundary)
        }
    }

    /// Write a plain text form field.
    ///
    /// # Errors
    /// Returns an error if writing to the underlying writer fails.
    pub fn write_field(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.begin_part(name, None)?;
        self.writer.write_all(value.as_bytes())
    }

    /// Write the headers of a file part and return the writer for its content.
    ///
    /// # Errors
    /// Returns an error if writing to the underlying writer fails.
    pub fn create_form_file(&mut self, name: &str, filename: &str) -> io::Result<&mut W> {
        self.begin_part(name, Some(filename))?;
        Ok(&mut self.writer)
    }

    /// Write the closing boundary and return the underlying writer.
    ///
    /// # Errors
    /// Returns an error if writing or flushing fails.
    pub fn close(mut self) -> io::Result<W> {
        if self.has_parts {
            write!(self.writer, "\r\n--{}--\r\n", self.boundary)?;
        } else {
            write!(self.writer, "--{}--\r\n", self.boundary)?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn begin_part(&mut self, name: &str, filename: Option<&str>) -> io::Result<()> {
        if self.has_parts {
            write!(self.writer, "\r\n--{}\r\n", self.boundary)?;
        } else {
            write!(self.writer, "--{}\r\n", self.boundary)?;
        }
        self.has_parts = true;

        match filename {
            Some(filename) => write!(
                self.writer,
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: {FILE_CONTENT_TYPE}\r\n\r\n",
                escape_quotes(name),
                escape_quotes(filename)
            ),
            None => write!(
                self.writer,
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_quotes(name)
            ),
        }
    }
}

/// Encode receipt creation params into an in-memory multipart body.
///
/// Parts are written in a fixed order: `company_id`, `receipt`, then the optional
/// fields that are set. Unset fields are left out entirely.
///
/// # Errors
/// Returns an error identifying the part that failed.
pub fn encode_receipt_create_params(params: &ReceiptCreateParams) -> Result<EncodedBody, EncodeError> {
    encode_with(MultipartWriter::new(Vec::new()), params)
}

/// Same as [`encode_receipt_create_params`] but with a fixed boundary.
///
/// # Errors
/// Returns an error if the boundary is invalid or a part fails to encode.
pub fn encode_receipt_create_params_with_boundary(
    params: &ReceiptCreateParams,
    boundary: &str,
) -> Result<EncodedBody, EncodeError> {
    encode_with(MultipartWriter::with_boundary(Vec::new(), boundary)?, params)
}

fn encode_with(writer: MultipartWriter<Vec<u8>>, params: &ReceiptCreateParams) -> Result<EncodedBody, EncodeError> {
    let (body, content_type) = write_receipt_create_params(writer, params)?;
    Ok(EncodedBody { body, content_type })
}

/// Write all parts of `params` and close the multipart body.
///
/// Returns the inner writer and the `Content-Type` value. The content type is only
/// returned after the closing boundary has been written.
///
/// # Errors
/// Returns an error identifying the part that failed.
pub fn write_receipt_create_params<W: Write>(
    mut writer: MultipartWriter<W>,
    params: &ReceiptCreateParams,
) -> Result<(W, String), EncodeError> {
    writer
        .write_field("company_id", &params.company_id.to_string())
        .map_err(|source| EncodeError::WritePart {
            part: "company_id",
            source,
        })?;

    {
        // Reader is dropped at the end of this block on every path.
        let mut reader = params.receipt.open().map_err(EncodeError::OpenAttachment)?;
        let part = writer
            .create_form_file("receipt", params.receipt.filename())
            .map_err(|source| EncodeError::WritePart {
                part: "receipt",
                source,
            })?;
        copy_attachment(&mut reader, part)?;
    }

    for (name, value) in params.optional_fields() {
        if let Some(value) = value {
            writer
                .write_field(name, &value)
                .map_err(|source| EncodeError::WritePart { part: name, source })?;
        }
    }

    let content_type = writer.form_data_content_type();
    let inner = writer.close().map_err(EncodeError::Close)?;
    Ok((inner, content_type))
}

/// Copy attachment bytes, keeping read and write failures apart.
fn copy_attachment<R: Read + ?Sized, W: Write + ?Sized>(reader: &mut R, writer: &mut W) -> Result<u64, EncodeError> {
    let mut buffer = [0_u8; 8 * 1024];
    let mut total: u64 = 0;
    loop {
        let count = match reader.read(&mut buffer) {
            Ok(0) => return Ok(total),
            Ok(count) => count,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(EncodeError::ReadAttachment(error)),
        };
        writer
            .write_all(&buffer[..count])
            .map_err(|source| EncodeError::WritePart {
                part: "receipt",
                source,
            })?;
        total += count as u64;
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn is_valid_boundary(boundary: &str) -> bool {
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LENGTH || boundary.ends_with(' ') {
        return false;
    }
    boundary
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c))
}

#[cfg(test)]
mod test_multipart {
    use super::*;

    use crate::model::{DocumentType, QualifiedInvoice, ReceiptFile};

    const BOUNDARY: &str = "test-boundary";

    #[derive(Debug)]
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device unplugged"))
        }
    }

    fn params() -> ReceiptCreateParams {
        ReceiptCreateParams::new(7, ReceiptFile::from_bytes(b"%PDF-1.4".to_vec(), "a.pdf"))
    }

    fn encode(params: &ReceiptCreateParams) -> (String, String) {
        let encoded = encode_receipt_create_params_with_boundary(params, BOUNDARY).expect("should encode");
        (
            String::from_utf8(encoded.body).expect("utf-8 body"),
            encoded.content_type,
        )
    }

    #[test]
    fn required_fields_only_produce_exact_body() {
        let (body, content_type) = encode(&params());
        assert_eq!(content_type, "multipart/form-data; boundary=test-boundary");
        assert_eq!(
            body,
            "--test-boundary\r\n\
             Content-Disposition: form-data; name=\"company_id\"\r\n\
             \r\n\
             7\r\n\
             --test-boundary\r\n\
             Content-Disposition: form-data; name=\"receipt\"; filename=\"a.pdf\"\r\n\
             Content-Type: application/octet-stream\r\n\
             \r\n\
             %PDF-1.4\r\n\
             --test-boundary--\r\n"
        );
    }

    #[test]
    fn optional_fields_follow_fixed_order() {
        let mut params = params();
        params.receipt_metadatum_partner_name = Some("取引先".to_string());
        params.description = Some("lunch".to_string());
        params.receipt_metadatum_amount = Some(1500);
        params.document_type = Some(DocumentType::Receipt);
        params.qualified_invoice = Some(QualifiedInvoice::Unselected);
        params.receipt_metadatum_issue_date = Some("2025-04-01".to_string());

        let (body, _) = encode(&params);
        let order = [
            "name=\"company_id\"",
            "name=\"receipt\"",
            "name=\"description\"",
            "name=\"document_type\"",
            "name=\"qualified_invoice\"",
            "name=\"receipt_metadatum_amount\"",
            "name=\"receipt_metadatum_issue_date\"",
            "name=\"receipt_metadatum_partner_name\"",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|needle| body.find(needle).expect("part should exist"))
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(body.contains("\r\n\r\n1500\r\n"));
        assert!(body.contains("\r\n\r\n取引先\r\n--test-boundary--\r\n"));
    }

    #[test]
    fn absent_optionals_are_not_written() {
        let (body, _) = encode(&params());
        assert_eq!(body.matches("Content-Disposition").count(), 2);
        assert!(!body.contains("description"));
        assert!(!body.contains("receipt_metadatum"));
    }

    #[test]
    fn random_boundary_is_used_in_content_type() {
        let encoded = encode_receipt_create_params(&params()).expect("should encode");
        let boundary = encoded
            .content_type
            .strip_prefix("multipart/form-data; boundary=")
            .expect("content type prefix");
        assert_eq!(boundary.len(), 64);
        assert!(boundary.chars().all(|c| c.is_ascii_hexdigit()));
        let body = String::from_utf8(encoded.body).expect("utf-8 body");
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.ends_with(&format!("\r\n--{boundary}--\r\n")));
    }

    #[test]
    fn quotes_in_filename_are_escaped() {
        let params = ReceiptCreateParams::new(1, ReceiptFile::from_bytes(Vec::new(), "say \"hi\".pdf"));
        let (body, _) = encode(&params);
        assert!(body.contains("filename=\"say \\\"hi\\\".pdf\""));
    }

    #[test]
    fn rejects_invalid_boundaries() {
        assert!(MultipartWriter::with_boundary(Vec::new(), "").is_err());
        assert!(MultipartWriter::with_boundary(Vec::new(), &"a".repeat(71)).is_err());
        assert!(MultipartWriter::with_boundary(Vec::new(), "bad\"quote").is_err());
        assert!(MultipartWriter::with_boundary(Vec::new(), "trailing ").is_err());
    }

    #[test]
    fn boundary_with_special_characters_is_quoted() {
        let writer = MultipartWriter::with_boundary(Vec::new(), "a:b").expect("valid boundary");
        assert_eq!(writer.form_data_content_type(), "multipart/form-data; boundary=\"a:b\"");
    }

    #[test]
    fn write_failure_names_the_first_part() {
        let writer = MultipartWriter::with_boundary(FailingWriter, BOUNDARY).expect("valid boundary");
        let error = write_receipt_create_params(writer, &params()).expect_err("should fail");
        assert!(matches!(error, EncodeError::WritePart { part: "company_id", .. }));
        assert_eq!(error.to_string(), "write company_id: disk full");
    }

    #[test]
    fn unreadable_attachment_fails_to_open() {
        let params = ReceiptCreateParams::new(
            1,
            ReceiptFile::from_path(std::path::Path::new("/nonexistent/ffbox/a.pdf")),
        );
        let error = encode_receipt_create_params(&params).expect_err("should fail");
        assert!(matches!(error, EncodeError::OpenAttachment(_)));
    }

    #[test]
    fn read_failure_is_reported_separately() {
        let mut output = Vec::new();
        let error = copy_attachment(&mut FailingReader, &mut output).expect_err("should fail");
        assert!(matches!(error, EncodeError::ReadAttachment(_)));
        assert_eq!(error.to_string(), "read receipt file: device unplugged");
    }

    #[test]
    fn copy_attachment_copies_all_bytes() {
        let content: Vec<u8> = (0..20_000_u32).map(|i| (i % 251) as u8).collect();
        let mut output = Vec::new();
        let copied = copy_attachment(&mut content.as_slice(), &mut output).expect("should copy");
        assert_eq!(copied, 20_000);
        assert_eq!(output, content);
    }

    #[test]
    fn empty_form_closes_with_final_boundary_only() {
        let writer = MultipartWriter::with_boundary(Vec::new(), BOUNDARY).expect("valid boundary");
        let body = writer.close().expect("should close");
        assert_eq!(body, b"--test-boundary--\r\n");
    }
}
