//! Receipt output formatters.
//!
//! [`ReceiptDetail`] prints a single receipt as a fixed report similar to `gh pr view`.
//! [`ReceiptList`] prints many receipts as a table or newline-delimited JSON using
//! the fields selected from the [`FieldRegistry`].
//!
//! Output is rendered in memory first, so an error never leaves partial output behind.

use std::io::Write;

use chrono::{DateTime, Local};
use serde_json::{Map, Value};

use super::error::FormatError;
use super::fields::{FieldRegistry, ResolvedField};
use super::table::Table;
use super::{NONE_PLACEHOLDER, OutputFormat};
use crate::model::Receipt;

/// Local time format used for timestamps.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of the label column in the detail view.
const LABEL_WIDTH: usize = 17;

/// Width of the label column inside detail view sections.
const SECTION_LABEL_WIDTH: usize = 15;

/// Formats a single receipt in a human-readable layout.
pub struct ReceiptDetail<W: Write> {
    writer: W,
}

/// Formats a list of receipts as a table or JSON lines.
pub struct ReceiptList<'r, W: Write> {
    writer: W,
    registry: &'r FieldRegistry,
}

impl<W: Write> ReceiptDetail<W> {
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write the detail report.
    ///
    /// # Errors
    /// Returns [`FormatError::NilRecord`] if there is no receipt,
    /// or an error if the timestamp cannot be parsed or writing fails.
    pub fn format(&mut self, receipt: Option<&Receipt>) -> Result<(), FormatError> {
        let receipt = receipt.ok_or(FormatError::NilRecord)?;
        let report = render_detail(receipt)?;
        self.writer.write_all(report.as_bytes())?;
        Ok(())
    }

    /// Write the whole receipt as a single JSON line.
    ///
    /// Field selection does not apply to the detail view.
    ///
    /// # Errors
    /// Returns [`FormatError::NilRecord`] if there is no receipt,
    /// or an error if serialization or writing fails.
    pub fn format_json(&mut self, receipt: Option<&Receipt>) -> Result<(), FormatError> {
        let receipt = receipt.ok_or(FormatError::NilRecord)?;
        let line = serde_json::to_string(receipt)?;
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<'r, W: Write> ReceiptList<'r, W> {
    pub const fn new(writer: W, registry: &'r FieldRegistry) -> Self {
        Self { writer, registry }
    }

    /// Write receipts in the given output format.
    ///
    /// # Errors
    /// Returns an error if a field is unsupported or rendering fails.
    pub fn format<S: AsRef<str>>(
        &mut self,
        receipts: &[Receipt],
        fields: &[S],
        format: OutputFormat,
    ) -> Result<(), FormatError> {
        match format {
            OutputFormat::Table => self.format_table(receipts, fields),
            OutputFormat::Json => self.format_json(receipts, fields),
        }
    }

    /// Write receipts as a table. An empty field list selects the default fields.
    ///
    /// Nothing is written for an empty receipt list.
    ///
    /// # Errors
    /// Returns an error if a field is unsupported or a value cannot be rendered.
    pub fn format_table<S: AsRef<str>>(&mut self, receipts: &[Receipt], fields: &[S]) -> Result<(), FormatError> {
        let selected = self.registry.resolve(fields)?;
        if receipts.is_empty() {
            return Ok(());
        }

        let header = selected
            .iter()
            .map(|field| field.definition.header.to_string())
            .collect();
        let alignments = selected.iter().map(|field| field.definition.alignment).collect();
        let mut table = Table::new(header, alignments);

        for receipt in receipts {
            let row = selected
                .iter()
                .map(|field| (field.definition.cell)(receipt))
                .collect::<Result<Vec<_>, _>>()?;
            table.add_row(row);
        }

        table.render(&mut self.writer)?;
        Ok(())
    }

    /// Write one JSON object per receipt, one per line.
    ///
    /// With an empty field list each line holds the whole receipt.
    ///
    /// # Errors
    /// Returns an error if a field is unsupported or serialization fails.
    pub fn format_json<S: AsRef<str>>(&mut self, receipts: &[Receipt], fields: &[S]) -> Result<(), FormatError> {
        let selected = if fields.is_empty() {
            None
        } else {
            Some(self.registry.resolve(fields)?)
        };

        let mut output = String::new();
        for receipt in receipts {
            let line = match &selected {
                Some(selected) => serde_json::to_string(&project(selected, receipt))?,
                None => serde_json::to_string(receipt)?,
            };
            output.push_str(&line);
            output.push('\n');
        }

        self.writer.write_all(output.as_bytes())?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Extract the selected fields of a receipt into a JSON object.
///
/// An empty field list returns every field of the receipt.
///
/// # Errors
/// Returns an error if a field is unsupported or the receipt cannot be serialized.
pub fn extract_receipt_fields<S: AsRef<str>>(
    registry: &FieldRegistry,
    receipt: &Receipt,
    fields: &[S],
) -> Result<Map<String, Value>, FormatError> {
    if fields.is_empty() {
        return match serde_json::to_value(receipt)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        };
    }
    let selected = registry.resolve(fields)?;
    Ok(project(&selected, receipt))
}

fn project(selected: &[ResolvedField<'_>], receipt: &Receipt) -> Map<String, Value> {
    selected
        .iter()
        .map(|field| (field.key.to_string(), (field.definition.json)(receipt)))
        .collect()
}

/// Return the string, or the placeholder for a missing or empty value.
#[must_use]
pub fn format_string(value: Option<&str>) -> &str {
    match value {
        Some(value) if !value.is_empty() => value,
        _ => NONE_PLACEHOLDER,
    }
}

/// Format an amount in yen with thousands separators, e.g. `-¥1,234`.
#[must_use]
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}¥{grouped}")
}

/// Convert an RFC 3339 timestamp to local time.
///
/// # Errors
/// Returns [`FormatError::InvalidTimestamp`] if the value cannot be parsed.
pub fn format_date_time(value: &str) -> Result<String, FormatError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Local).format(DATE_TIME_FORMAT).to_string())
        .map_err(|source| FormatError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

fn push_line(output: &mut String, label: &str, value: &str) {
    output.push_str(&format!("{:<LABEL_WIDTH$}{value}\n", format!("{label}:")));
}

fn push_section_line(output: &mut String, label: &str, value: &str) {
    output.push_str(&format!("  {:<SECTION_LABEL_WIDTH$}{value}\n", format!("{label}:")));
}

fn render_detail(receipt: &Receipt) -> Result<String, FormatError> {
    let created_at = format_date_time(&receipt.created_at)?;
    let mut output = String::new();

    push_line(&mut output, "ID", &receipt.id.to_string());
    push_line(&mut output, "Status", &receipt.status);
    push_line(&mut output, "Created", &created_at);
    push_line(&mut output, "Origin", &receipt.origin);
    push_line(&mut output, "MIME Type", &receipt.mime_type);
    push_line(&mut output, "Description", format_string(receipt.description.as_deref()));
    push_line(&mut output, "Document Type", format_string(receipt.document_type.as_deref()));
    push_line(
        &mut output,
        "Invoice Reg No",
        format_string(receipt.invoice_registration_number.as_deref()),
    );
    push_line(&mut output, "Qualified", format_string(receipt.qualified_invoice.as_deref()));

    if let Some(metadatum) = &receipt.receipt_metadatum {
        let amount = metadatum
            .amount
            .map_or_else(|| NONE_PLACEHOLDER.to_string(), format_amount);
        output.push_str("\nReceipt Information\n");
        push_section_line(&mut output, "Partner", format_string(metadatum.partner_name.as_deref()));
        push_section_line(&mut output, "Amount", &amount);
        push_section_line(&mut output, "Issue Date", format_string(metadatum.issue_date.as_deref()));
    }

    output.push_str("\nUser\n");
    push_section_line(&mut output, "Name", format_string(receipt.user.display_name.as_deref()));
    push_section_line(&mut output, "Email", &receipt.user.email);
    push_section_line(&mut output, "ID", &receipt.user.id.to_string());

    Ok(output)
}

#[cfg(test)]
mod test_format_amount {
    use super::*;

    #[test]
    fn groups_thousands() {
        assert_eq!(format_amount(1_234_567), "¥1,234,567");
        assert_eq!(format_amount(1000), "¥1,000");
        assert_eq!(format_amount(999), "¥999");
        assert_eq!(format_amount(100_000), "¥100,000");
    }

    #[test]
    fn negative_sign_comes_before_currency() {
        assert_eq!(format_amount(-500), "-¥500");
        assert_eq!(format_amount(-1_500), "-¥1,500");
    }

    #[test]
    fn zero() {
        assert_eq!(format_amount(0), "¥0");
    }

    #[test]
    fn extremes_do_not_overflow() {
        assert_eq!(format_amount(i64::MIN), "-¥9,223,372,036,854,775,808");
        assert_eq!(format_amount(i64::MAX), "¥9,223,372,036,854,775,807");
    }
}

#[cfg(test)]
mod test_format_helpers {
    use super::*;

    #[test]
    fn missing_or_empty_string_uses_placeholder() {
        assert_eq!(format_string(None), "(none)");
        assert_eq!(format_string(Some("")), "(none)");
        assert_eq!(format_string(Some("memo")), "memo");
    }

    #[test]
    fn converts_timestamp_to_local_time() {
        let expected = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
            .expect("valid timestamp")
            .with_timezone(&Local)
            .format(DATE_TIME_FORMAT)
            .to_string();
        assert_eq!(
            format_date_time("2025-01-02T03:04:05Z").expect("should format"),
            expected
        );
    }

    #[test]
    fn invalid_timestamp_is_an_error() {
        let error = format_date_time("yesterday").expect_err("should fail");
        assert!(matches!(error, FormatError::InvalidTimestamp { .. }));
    }
}
