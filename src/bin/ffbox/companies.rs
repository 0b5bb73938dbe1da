use std::io::{self, Write};

use anyhow::{Context, Result};
use ffbox::model::Company;
use ffbox::print_warning;

use crate::config::Config;

/// Print the companies the user belongs to as JSON lines.
pub async fn run(config: &Config) -> Result<()> {
    let client = crate::connect(config).await?;
    let companies = client.get_companies().await.context("Failed to get companies")?;

    let Some(companies) = companies else {
        print_warning!("No companies found");
        return Ok(());
    };

    write_companies(&mut io::stdout().lock(), &companies)
}

fn write_companies<W: Write>(writer: &mut W, companies: &[Company]) -> Result<()> {
    let mut output = String::new();
    for company in companies {
        output.push_str(&serde_json::to_string(company).context("Failed to serialize company")?);
        output.push('\n');
    }
    writer.write_all(output.as_bytes())?;
    Ok(())
}
