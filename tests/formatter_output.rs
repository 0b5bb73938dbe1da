//! Receipt formatting through the public API, starting from API response JSON.

use ffbox::formatter::{FieldRegistry, FormatError, OutputFormat, ReceiptDetail, ReceiptList, parse_field_list};
use ffbox::model::ReceiptsResponse;

const RESPONSE: &str = r#"{
  "receipts": [
    {
      "id": 42,
      "status": "unconfirmed",
      "description": "出張 交通費",
      "mime_type": "image/png",
      "origin": "ios",
      "created_at": "2025-05-01T12:00:00+09:00",
      "document_type": "receipt",
      "qualified_invoice": "qualified",
      "invoice_registration_number": "T1234567890123",
      "receipt_metadatum": {"partner_name": "JR東日本", "issue_date": "2025-04-30", "amount": 1000},
      "user": {"id": 5, "email": "hanako@example.com", "display_name": "Hanako"}
    },
    {
      "id": 43,
      "status": "confirmed",
      "mime_type": "application/pdf",
      "origin": "web",
      "created_at": "2025-05-02T08:30:00Z",
      "user": {"id": 6, "email": "ken@example.com"}
    }
  ]
}"#;

fn receipts() -> Vec<ffbox::model::Receipt> {
    let response: ReceiptsResponse = serde_json::from_str(RESPONSE).expect("valid response");
    response.receipts.expect("receipts")
}

fn render_list(fields: &str, format: OutputFormat) -> Result<String, FormatError> {
    let registry = FieldRegistry::new();
    let fields = parse_field_list(fields);
    let mut list = ReceiptList::new(Vec::new(), &registry);
    list.format(&receipts(), &fields, format)?;
    Ok(String::from_utf8(list.into_inner()).expect("utf-8 output"))
}

#[test]
fn json_lines_follow_field_selection() {
    let output = render_list("id, amount, partner", OutputFormat::Json).expect("should format");
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines, [
        r#"{"id":42,"amount":1000,"partner":"JR東日本"}"#,
        r#"{"id":43,"amount":null,"partner":null}"#,
    ]);
}

#[test]
fn table_has_one_row_per_receipt() {
    let output = render_list("id,status,receipt_metadatum.partner_name", OutputFormat::Table).expect("should format");
    let lines: Vec<&str> = output.lines().collect();
    // Top border, header, separator, two rows, bottom border.
    assert_eq!(lines.len(), 6);
    assert!(lines[1].contains("ID") && lines[1].contains("Status") && lines[1].contains("Partner"));
    assert!(lines[3].contains("JR東日本"));
    assert!(lines[4].contains("(none)"));
}

#[test]
fn table_columns_line_up_with_wide_characters() {
    let output = render_list("receipt_metadatum.partner_name", OutputFormat::Table).expect("should format");
    let widths: Vec<usize> = output
        .lines()
        .map(unicode_width::UnicodeWidthStr::width)
        .collect();
    assert!(widths.windows(2).all(|pair| pair[0] == pair[1]), "{output}");
}

#[test]
fn unknown_field_fails_in_both_formats() {
    for format in [OutputFormat::Table, OutputFormat::Json] {
        let error = render_list("id,nonexistent_field", format).expect_err("should fail");
        assert_eq!(error.to_string(), "unsupported field[1]: nonexistent_field");
    }
}

#[test]
fn detail_view_shows_every_section() {
    let receipts = receipts();
    let mut detail = ReceiptDetail::new(Vec::new());
    detail.format(receipts.first()).expect("should format");
    let output = String::from_utf8(detail.into_inner()).expect("utf-8 output");

    assert!(output.starts_with("ID:              42\n"));
    assert!(output.contains("Invoice Reg No:  T1234567890123\n"));
    assert!(output.contains("Qualified:       qualified\n"));
    assert!(output.contains("  Amount:        ¥1,000\n"));
    assert!(output.contains("  Email:         hanako@example.com\n"));
}

#[test]
fn detail_view_of_sparse_receipt_uses_placeholders() {
    let receipts = receipts();
    let mut detail = ReceiptDetail::new(Vec::new());
    detail.format(receipts.get(1)).expect("should format");
    let output = String::from_utf8(detail.into_inner()).expect("utf-8 output");

    assert!(output.contains("Description:     (none)\n"));
    assert!(output.contains("Document Type:   (none)\n"));
    assert!(!output.contains("Receipt Information"));
    assert!(output.contains("  Name:          (none)\n"));
}

#[test]
fn multi_line_description_keeps_table_borders_aligned() {
    let mut receipts = receipts();
    receipts[0].description = Some("first line\nsecond".to_string());
    let registry = FieldRegistry::new();
    let mut list = ReceiptList::new(Vec::new(), &registry);
    list.format(&receipts, &["id", "description"], OutputFormat::Table)
        .expect("should format");
    let output = String::from_utf8(list.into_inner()).expect("utf-8 output");

    let widths: Vec<usize> = output
        .lines()
        .map(unicode_width::UnicodeWidthStr::width)
        .collect();
    assert!(widths.windows(2).all(|pair| pair[0] == pair[1]), "{output}");
    assert_eq!(output.lines().count(), 7);
}
