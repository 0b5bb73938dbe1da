//! ffbox - Manage receipts in the freee accounting file box.
//!
//! Lists, shows and uploads receipts (証憑ファイル) through the freee API,
//! authenticating with OAuth2.

mod companies;
mod config;
mod freee;
mod oauth;
mod receipts;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use ffbox::formatter::FieldRegistry;

use crate::config::{Config, ConfigCommand, UserConfig};
use crate::freee::FreeeClient;
use crate::oauth::OAuth2Manager;
use crate::receipts::ReceiptsCommand;

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Manage receipts in the freee accounting file box"
)]
pub struct FfboxArgs {
    #[command(subcommand)]
    command: Option<Command>,

    /// OAuth2 client ID
    #[arg(long, value_name = "ID", env = "FREEEAPI_OAUTH2_CLIENT_ID", hide_env_values = true, global = true)]
    client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, value_name = "SECRET", env = "FREEEAPI_OAUTH2_CLIENT_SECRET", hide_env_values = true, global = true)]
    client_secret: Option<String>,

    /// freee company ID
    #[arg(short = 'c', long, value_name = "ID", env = "FREEEAPI_COMPANY_ID", global = true)]
    company_id: Option<i64>,

    /// Generate shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    completion: Option<Shell>,

    /// Print verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List the companies you belong to
    Companies,

    /// Manage receipts in the file box
    Receipts {
        #[command(subcommand)]
        command: ReceiptsCommand,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Authenticate and create an API client.
async fn connect(config: &Config) -> Result<FreeeClient> {
    let access_token = OAuth2Manager::from_config(config)?.access_token().await?;
    FreeeClient::new(access_token)
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = FfboxArgs::parse();

    if let Some(ref shell) = args.completion {
        return ffbox::generate_shell_completion(*shell, FfboxArgs::command(), true, env!("CARGO_BIN_NAME"));
    }

    let Some(command) = args.command.take() else {
        FfboxArgs::command().print_help()?;
        return Ok(());
    };

    let user_config = UserConfig::get_user_config();
    match command {
        Command::Config { command } => config::run(&command, &user_config),
        Command::Companies => companies::run(&Config::from_args_and_config(&args, &user_config)).await,
        Command::Receipts { command } => {
            let config = Config::from_args_and_config(&args, &user_config);
            let registry = FieldRegistry::new();
            receipts::run(command, &config, &registry).await
        }
    }
}
