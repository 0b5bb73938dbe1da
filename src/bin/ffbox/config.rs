//! Configuration for ffbox.
//!
//! Handles reading configuration from CLI arguments, environment variables and the
//! user config file, and the `config` subcommands that manage that file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use ffbox::print_warning;
use serde::{Deserialize, Serialize};

use crate::FfboxArgs;

/// Default address for the local OAuth2 callback listener.
const DEFAULT_LOCAL_ADDR: &str = "127.0.0.1:3485";

/// Editor used when neither `VISUAL` nor `EDITOR` is set.
const FALLBACK_EDITOR: &str = "vi";

/// `[oauth2]` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuth2Config {
    /// Where the access and refresh tokens are stored.
    pub token_file: Option<PathBuf>,
    /// Listen address for the authorization callback.
    pub local_addr: String,
    /// Redirect URI registered for the app. Derived from `local_addr` when unset.
    pub redirect_uri: Option<String>,
}

/// `[freee]` section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeeConfig {
    /// Default company ID. Zero means unset.
    pub company_id: i64,
}

/// Contents of the user config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub oauth2: OAuth2Config,
    pub freee: FreeeConfig,
}

/// Final config combined from CLI arguments and user config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub company_id: Option<i64>,
    pub token_file: PathBuf,
    pub local_addr: String,
    pub redirect_uri: Option<String>,
    pub verbose: bool,
}

/// `ffbox config` subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create the config file with default values
    Init,

    /// Open the config file in $VISUAL or $EDITOR
    Edit,

    /// Print the effective configuration
    Show {
        /// Print the config file path before the contents
        #[arg(long)]
        show_file_path: bool,
    },
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            token_file: ffbox::config::default_token_path(),
            local_addr: DEFAULT_LOCAL_ADDR.to_string(),
            redirect_uri: None,
        }
    }
}

impl UserConfig {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    pub fn get_user_config() -> Self {
        let Some(path) = ffbox::config::CONFIG_PATH.as_deref() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::from_file(path).unwrap_or_else(|error| {
            print_warning!("Failed to load config, using defaults: {error:#}");
            Self::default()
        })
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_string =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&config_string).with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse config from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid config TOML.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("Invalid config TOML")
    }

    /// Serialize config to a TOML string.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

impl Config {
    /// Create config from given command line args and user config file.
    ///
    /// Values from the command line and environment take priority over the file.
    pub fn from_args_and_config(args: &FfboxArgs, user_config: &UserConfig) -> Self {
        let company_id = args
            .company_id
            .or_else(|| (user_config.freee.company_id != 0).then_some(user_config.freee.company_id));

        let token_file = user_config
            .oauth2
            .token_file
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
            .or_else(ffbox::config::default_token_path)
            .unwrap_or_else(|| PathBuf::from("token.json"));

        let local_addr = if user_config.oauth2.local_addr.trim().is_empty() {
            DEFAULT_LOCAL_ADDR.to_string()
        } else {
            user_config.oauth2.local_addr.trim().to_string()
        };

        Self {
            client_id: args.client_id.clone().filter(|id| !id.is_empty()),
            client_secret: args.client_secret.clone().filter(|secret| !secret.is_empty()),
            company_id,
            token_file,
            local_addr,
            redirect_uri: user_config.oauth2.redirect_uri.clone().filter(|uri| !uri.is_empty()),
            verbose: args.verbose,
        }
    }

    /// Company ID from the command line, environment, or config file.
    ///
    /// # Errors
    /// Returns an error if no company ID has been given anywhere.
    pub fn company_id(&self) -> Result<i64> {
        self.company_id.context(
            "Company ID is not set. Use --company-id, FREEEAPI_COMPANY_ID or `company_id` in the config file",
        )
    }

    /// OAuth2 client credentials.
    ///
    /// # Errors
    /// Returns an error if either the client ID or the secret is missing.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Ok((id.as_str(), secret.as_str())),
            _ => bail!("client-id and client-secret must be set"),
        }
    }
}

/// Run a `config` subcommand.
///
/// # Errors
/// Returns an error if the config file cannot be created, edited or shown.
pub fn run(command: &ConfigCommand, user_config: &UserConfig) -> Result<()> {
    let path = ffbox::config::CONFIG_PATH
        .as_deref()
        .context("Failed to determine config file location")?;

    match command {
        ConfigCommand::Init => {
            if init_config_file(path)? {
                println!("Config file created: {}", path.display());
            } else {
                print_warning!("Config file already exists: {}", path.display());
            }
            Ok(())
        }
        ConfigCommand::Edit => edit_config_file(path),
        ConfigCommand::Show { show_file_path } => {
            if *show_file_path {
                println!("{}", path.display());
            }
            print!("{}", user_config.to_toml_string()?);
            Ok(())
        }
    }
}

/// Write the default config to `path`.
///
/// Returns `false` without touching anything if the file already exists.
///
/// # Errors
/// Returns an error if the directory or file cannot be created.
pub fn init_config_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create config directory {}", dir.display()))?;
    }
    let content = UserConfig::default().to_toml_string()?;
    fs::write(path, content).with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(true)
}

fn edit_config_file(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!(
            "Config file does not exist: {}\nRun `ffbox config init` to create it",
            path.display()
        );
    }

    let editor = select_editor_from(std::env::var("VISUAL").ok(), std::env::var("EDITOR").ok());
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or(FALLBACK_EDITOR);

    let status = process::Command::new(program)
        .args(parts)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to launch editor '{editor}'"))?;

    if !status.success() {
        bail!("Editor '{editor}' exited with {status}");
    }
    Ok(())
}

/// Pick the editor command: `VISUAL`, then `EDITOR`, then `vi`.
///
/// Blank values count as unset.
#[must_use]
pub fn select_editor_from(visual: Option<String>, editor: Option<String>) -> String {
    visual
        .filter(|value| !value.trim().is_empty())
        .or_else(|| editor.filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| FALLBACK_EDITOR.to_string())
}
