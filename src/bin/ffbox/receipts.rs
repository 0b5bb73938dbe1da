//! `ffbox receipts` subcommands.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{Days, Local, NaiveDate};
use clap::{Args, Subcommand};
use ffbox::formatter::{FieldRegistry, OutputFormat, ReceiptDetail, ReceiptList, parse_field_list};
use ffbox::model::{DocumentType, QualifiedInvoice, ReceiptCreateParams, ReceiptFile};
use ffbox::{print_info, print_warning};

use crate::config::Config;
use crate::freee::ReceiptQuery;

/// Default number of receipts to list.
const DEFAULT_LIMIT: u32 = 50;

/// Default length of the registration date range in days.
const DEFAULT_RANGE_DAYS: u64 = 30;

/// Maximum description length accepted by the API.
const MAX_DESCRIPTION_CHARS: usize = 255;

/// Printed between receipts in the detail view.
const RECEIPT_SEPARATOR: &str = "\n---\n\n";

#[derive(Debug, Subcommand)]
pub enum ReceiptsCommand {
    /// List receipts in the file box
    ///
    /// Note: --created-start and --created-end filter on the date the receipt was
    /// registered in freee, which may differ from its issue date.
    List(ListArgs),

    /// Show receipts by ID
    Show(ShowArgs),

    /// Upload files as new receipts
    Create(CreateArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Start of the registration date range [default: 30 days ago]
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    created_start: Option<NaiveDate>,

    /// End of the registration date range [default: today]
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    created_end: Option<NaiveDate>,

    /// Maximum number of receipts to list (1-3000)
    #[arg(
        short = 'n',
        long,
        default_value_t = DEFAULT_LIMIT,
        value_parser = clap::value_parser!(u32).range(1..=3000)
    )]
    limit: u32,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Comma-separated list of fields to show, e.g. id,status,amount
    #[arg(long, value_name = "FIELDS")]
    fields: Option<String>,

    /// Print the available field names and exit
    #[arg(long)]
    list_fields: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Receipt IDs
    #[arg(required = true, value_name = "ID")]
    ids: Vec<i64>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Files to upload
    #[arg(required = true, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    files: Vec<PathBuf>,

    /// Memo, at most 255 characters
    #[arg(long, value_parser = parse_description)]
    description: Option<String>,

    /// Kind of document
    #[arg(long, value_enum)]
    document_type: Option<DocumentType>,

    /// Qualified invoice status
    #[arg(long, value_enum)]
    qualified_invoice: Option<QualifiedInvoice>,

    /// Amount in yen
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
    amount: Option<i64>,

    /// Issue date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    issue_date: Option<NaiveDate>,

    /// Issuer of the document
    #[arg(long)]
    partner_name: Option<String>,
}

impl CreateArgs {
    /// Build upload params for one file using the optional flags.
    fn params_for(&self, company_id: i64, file: ReceiptFile) -> ReceiptCreateParams {
        let mut params = ReceiptCreateParams::new(company_id, file);
        params.description = self.description.clone().filter(|value| !value.is_empty());
        params.document_type = self.document_type;
        params.qualified_invoice = self.qualified_invoice;
        params.receipt_metadatum_amount = self.amount;
        params.receipt_metadatum_issue_date = self.issue_date.map(|date| date.format("%Y-%m-%d").to_string());
        params.receipt_metadatum_partner_name = self.partner_name.clone().filter(|value| !value.is_empty());
        params
    }
}

/// Run a `receipts` subcommand.
pub async fn run(command: ReceiptsCommand, config: &Config, registry: &FieldRegistry) -> Result<()> {
    match command {
        ReceiptsCommand::List(args) => list(args, config, registry).await,
        ReceiptsCommand::Show(args) => show(args, config).await,
        ReceiptsCommand::Create(args) => create(args, config).await,
    }
}

async fn list(args: ListArgs, config: &Config, registry: &FieldRegistry) -> Result<()> {
    if args.list_fields {
        let mut stdout = io::stdout().lock();
        for name in registry.all_names() {
            writeln!(stdout, "{name}")?;
        }
        return Ok(());
    }

    let fields = args.fields.as_deref().map(parse_field_list).unwrap_or_default();
    registry.resolve(&fields)?;

    let company_id = config.company_id()?;
    let (start_date, end_date) = date_range(args.created_start, args.created_end, Local::now().date_naive())?;

    let client = crate::connect(config).await?;
    let query = ReceiptQuery {
        company_id,
        start_date,
        end_date,
        limit: args.limit,
    };
    if config.verbose {
        print_info!("Listing receipts registered {start_date} to {end_date}");
    }

    let Some(receipts) = client.get_receipts(&query).await.context("Failed to get receipts")? else {
        print_warning!("No receipts found");
        return Ok(());
    };
    if receipts.is_empty() && config.verbose {
        print_info!("No receipts found");
    }

    ReceiptList::new(io::stdout().lock(), registry)
        .format(&receipts, &fields, args.format)
        .context("Failed to format receipts")
}

async fn show(args: ShowArgs, config: &Config) -> Result<()> {
    let company_id = config.company_id()?;
    let client = crate::connect(config).await?;

    for (index, id) in args.ids.iter().enumerate() {
        let receipt = client
            .get_receipt(company_id, *id)
            .await
            .with_context(|| format!("Failed to get receipt ID {id}"))?;

        let mut stdout = io::stdout().lock();
        let mut formatter = ReceiptDetail::new(&mut stdout);
        match args.format {
            OutputFormat::Json => formatter.format_json(Some(&receipt)),
            OutputFormat::Table => formatter.format(Some(&receipt)),
        }
        .with_context(|| format!("Failed to format receipt ID {id}"))?;

        if args.format == OutputFormat::Table && index + 1 < args.ids.len() {
            write!(stdout, "{RECEIPT_SEPARATOR}")?;
        }
    }
    Ok(())
}

async fn create(args: CreateArgs, config: &Config) -> Result<()> {
    for path in &args.files {
        if !path.is_file() {
            bail!("File does not exist: {}", path.display());
        }
    }

    let company_id = config.company_id()?;
    let client = crate::connect(config).await?;

    for path in &args.files {
        let params = args.params_for(company_id, ReceiptFile::from_path(path));
        if config.verbose {
            print_info!("Uploading {}", path.display());
        }
        let created = client
            .create_receipt(&params)
            .await
            .with_context(|| format!("Failed to create receipt with file {}", path.display()))?;
        println!("{}", created.id);
    }
    Ok(())
}

/// Resolve the registration date range, defaulting to the last 30 days.
fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    let end = end.unwrap_or(today);
    let start = start.unwrap_or_else(|| {
        today
            .checked_sub_days(Days::new(DEFAULT_RANGE_DAYS))
            .unwrap_or(NaiveDate::MIN)
    });
    if start > end {
        bail!("--created-start {start} is after --created-end {end}");
    }
    Ok((start, end))
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| format!("expected YYYY-MM-DD: {error}"))
}

fn parse_description(value: &str) -> Result<String, String> {
    let length = value.chars().count();
    if length > MAX_DESCRIPTION_CHARS {
        return Err(format!(
            "must be at most {MAX_DESCRIPTION_CHARS} characters, got {length}"
        ));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod test_receipt_args {
    use clap::Parser;

    use super::*;
    use crate::{Command, FfboxArgs};

    fn parse(arguments: &[&str]) -> Result<ReceiptsCommand, clap::Error> {
        let args = FfboxArgs::try_parse_from(arguments)?;
        match args.command {
            Some(Command::Receipts { command }) => Ok(command),
            _ => panic!("expected receipts command"),
        }
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn list_defaults() {
        let Ok(ReceiptsCommand::List(args)) = parse(&["ffbox", "receipts", "list"]) else {
            panic!("expected list");
        };
        assert_eq!(args.limit, 50);
        assert_eq!(args.format, OutputFormat::Table);
        assert!(args.fields.is_none());
        assert!(!args.list_fields);
    }

    #[test]
    fn list_limit_range() {
        assert!(parse(&["ffbox", "receipts", "list", "--limit", "0"]).is_err());
        assert!(parse(&["ffbox", "receipts", "list", "-n", "3001"]).is_err());
        assert!(parse(&["ffbox", "receipts", "list", "-n", "3000"]).is_ok());
        assert!(parse(&["ffbox", "receipts", "list", "-n", "1"]).is_ok());
    }

    #[test]
    fn list_format_and_fields() {
        let Ok(ReceiptsCommand::List(args)) = parse(&[
            "ffbox",
            "receipts",
            "list",
            "--format",
            "json",
            "--fields",
            "id, amount",
            "--created-start",
            "2025-01-01",
        ]) else {
            panic!("expected list");
        };
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.fields.as_deref(), Some("id, amount"));
        assert_eq!(args.created_start, Some(date("2025-01-01")));
        assert!(parse(&["ffbox", "receipts", "list", "--format", "csv"]).is_err());
    }

    #[test]
    fn list_rejects_invalid_dates() {
        assert!(parse(&["ffbox", "receipts", "list", "--created-end", "2025/01/01"]).is_err());
        assert!(parse(&["ffbox", "receipts", "list", "--created-end", "2025-02-30"]).is_err());
    }

    #[test]
    fn show_requires_numeric_ids() {
        assert!(parse(&["ffbox", "receipts", "show"]).is_err());
        assert!(parse(&["ffbox", "receipts", "show", "abc"]).is_err());
        let Ok(ReceiptsCommand::Show(args)) = parse(&["ffbox", "receipts", "show", "3", "1", "2"]) else {
            panic!("expected show");
        };
        assert_eq!(args.ids, [3, 1, 2]);
    }

    #[test]
    fn create_validates_flags() {
        assert!(parse(&["ffbox", "receipts", "create"]).is_err());
        assert!(parse(&["ffbox", "receipts", "create", "a.pdf", "--amount", "-1"]).is_err());
        assert!(parse(&["ffbox", "receipts", "create", "a.pdf", "--document-type", "memo"]).is_err());
        assert!(parse(&["ffbox", "receipts", "create", "a.pdf", "--issue-date", "tomorrow"]).is_err());

        let long = "あ".repeat(256);
        assert!(parse(&["ffbox", "receipts", "create", "a.pdf", "--description", &long]).is_err());
        let limit = "あ".repeat(255);
        assert!(parse(&["ffbox", "receipts", "create", "a.pdf", "--description", &limit]).is_ok());
    }

    #[test]
    fn create_flags_map_to_params() {
        let Ok(ReceiptsCommand::Create(args)) = parse(&[
            "ffbox",
            "receipts",
            "create",
            "scan.pdf",
            "--description",
            "lunch",
            "--document-type",
            "invoice",
            "--qualified-invoice",
            "not_qualified",
            "--amount",
            "0",
            "--issue-date",
            "2025-04-01",
            "--partner-name",
            "",
        ]) else {
            panic!("expected create");
        };

        let params = args.params_for(9, ReceiptFile::from_bytes(Vec::new(), "scan.pdf"));
        assert_eq!(params.company_id, 9);
        assert_eq!(params.description.as_deref(), Some("lunch"));
        assert_eq!(params.document_type, Some(DocumentType::Invoice));
        assert_eq!(params.qualified_invoice, Some(QualifiedInvoice::NotQualified));
        assert_eq!(params.receipt_metadatum_amount, Some(0));
        assert_eq!(params.receipt_metadatum_issue_date.as_deref(), Some("2025-04-01"));
        assert_eq!(params.receipt_metadatum_partner_name, None);
    }

    #[tokio::test]
    async fn unknown_field_error_is_shown_as_is() {
        let mut args =
            FfboxArgs::try_parse_from(["ffbox", "receipts", "list", "--fields", "id,bogus"]).expect("valid arguments");
        let config = Config::from_args_and_config(&args, &crate::config::UserConfig::default());
        let Some(Command::Receipts { command }) = args.command.take() else {
            panic!("expected receipts command");
        };

        let error = run(command, &config, &FieldRegistry::new())
            .await
            .expect_err("should fail before connecting");
        assert_eq!(format!("{error:#}"), "unsupported field[1]: bogus");
    }
}
