//! OAuth2 access token handling for the freee API.
//!
//! A stored token is reused while it is valid, refreshed when it has expired,
//! and otherwise obtained with the authorization code flow through a local
//! callback listener.
//!
//! Documentation:
//! <https://developer.freee.co.jp/startguide/getting-access-token>

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::get;
use chrono::{DateTime, TimeDelta, Utc};
use ffbox::{print_info, print_warning};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::config::Config;

const AUTHORIZE_URL: &str = "https://accounts.secure.freee.co.jp/public_api/authorize";
const TOKEN_URL: &str = "https://accounts.secure.freee.co.jp/public_api/token";
const SCOPES: &str = "read write";
const CALLBACK_PATH: &str = "/callback";

/// Tokens expiring sooner than this are treated as expired.
const EXPIRY_MARGIN: TimeDelta = TimeDelta::seconds(60);

/// How long to wait for the browser to hit the callback.
const AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);

/// How long to let the callback response finish after the code has arrived.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Stored OAuth2 token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry time. A token without one never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Query parameters received on the callback.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Obtains and persists access tokens.
#[derive(Debug)]
pub struct OAuth2Manager {
    client: Client,
    client_id: String,
    client_secret: String,
    token_file: PathBuf,
    local_addr: String,
    redirect_uri: String,
    verbose: bool,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    /// True if the token can still be used at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && self.expiry.is_none_or(|expiry| expiry - now > EXPIRY_MARGIN)
    }

    /// Read a token file. A missing file is not an error.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read token file {}", path.display()))?;
        let token =
            serde_json::from_str(&content).with_context(|| format!("Failed to parse token file {}", path.display()))?;
        Ok(Some(token))
    }

    /// Write the token file, creating parent directories as needed.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize token")?;
        fs::write(path, content).with_context(|| format!("Failed to write token file {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }
        Ok(())
    }
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>, previous_refresh_token: Option<String>) -> Token {
        Token {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expiry: self.expires_in.map(|seconds| now + TimeDelta::seconds(seconds)),
        }
    }
}

impl OAuth2Manager {
    /// Create a token manager from the resolved config.
    ///
    /// # Errors
    /// Returns an error if the client credentials are missing or the HTTP client fails to build.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (client_id, client_secret) = config.credentials()?;
        let local_addr = normalize_local_addr(&config.local_addr);
        let redirect_uri = config
            .redirect_uri
            .clone()
            .unwrap_or_else(|| default_redirect_uri(&local_addr));
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token_file: config.token_file.clone(),
            local_addr,
            redirect_uri,
            verbose: config.verbose,
        })
    }

    /// Return a usable access token, refreshing or authorizing as needed.
    ///
    /// # Errors
    /// Returns an error if no token can be obtained.
    pub async fn access_token(&self) -> Result<String> {
        let stored = Token::load(&self.token_file).unwrap_or_else(|error| {
            print_warning!("Ignoring stored token: {error:#}");
            None
        });

        if let Some(token) = stored {
            if token.is_valid_at(Utc::now()) {
                if self.verbose {
                    print_info!("Using stored token from {}", self.token_file.display());
                }
                return Ok(token.access_token);
            }
            if let Some(refresh_token) = token.refresh_token {
                match self.refresh(refresh_token).await {
                    Ok(token) => return self.store(token),
                    Err(error) => print_warning!("Token refresh failed, authorizing again: {error:#}"),
                }
            }
        }

        let token = self.authorize().await?;
        self.store(token)
    }

    fn store(&self, token: Token) -> Result<String> {
        token.save(&self.token_file)?;
        if self.verbose {
            print_info!("Saved token to {}", self.token_file.display());
        }
        Ok(token.access_token)
    }

    async fn refresh(&self, refresh_token: String) -> Result<Token> {
        if self.verbose {
            print_info!("Refreshing access token");
        }
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
        ];
        let response = self.request_token(&form).await?;
        Ok(response.into_token(Utc::now(), Some(refresh_token)))
    }

    async fn authorize(&self) -> Result<Token> {
        let state = Uuid::new_v4().simple().to_string();
        let url = build_authorize_url(&self.client_id, &self.redirect_uri, &state)?;

        let listener = TcpListener::bind(&self.local_addr)
            .await
            .with_context(|| format!("Failed to listen on {}", self.local_addr))?;

        eprintln!("Open the following URL in your browser to authorize ffbox:\n\n{url}\n");

        let path = callback_path(&self.redirect_uri);
        let code = tokio::time::timeout(AUTHORIZATION_TIMEOUT, wait_for_code(listener, &path, &state))
            .await
            .context("Timed out waiting for authorization")??;

        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let response = self.request_token(&form).await?;
        Ok(response.into_token(Utc::now(), None))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(form)
            .send()
            .await
            .context("Failed to send token request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read token response")?;
        if status != StatusCode::OK {
            bail!("Token request failed: HTTP {status} - {body}");
        }
        serde_json::from_str(&body).context("Failed to parse token response JSON")
    }
}

/// Shared state of the callback handler.
#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<oneshot::Sender<Result<String, String>>>>>,
}

/// Routes the authorization callback to a handler that reports the result once.
fn callback_router(path: &str, expected_state: &str, sender: oneshot::Sender<Result<String, String>>) -> Router {
    let state = CallbackState {
        expected_state: Arc::from(expected_state),
        sender: Arc::new(Mutex::new(Some(sender))),
    };
    Router::new().route(path, get(handle_callback)).with_state(state)
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, &'static str) {
    let result = check_callback(params, &state.expected_state).map_err(|error| error.to_string());
    let response = if result.is_ok() {
        (StatusCode::OK, "Authorization complete. You can close this window.")
    } else {
        (StatusCode::BAD_REQUEST, "Authorization failed")
    };

    let sender = state.sender.lock().ok().and_then(|mut sender| sender.take());
    if let Some(sender) = sender {
        let _ = sender.send(result);
    }
    response
}

/// Serve the callback until it has been hit once and return the authorization code.
async fn wait_for_code(listener: TcpListener, path: &str, expected_state: &str) -> Result<String> {
    let (code_sender, code_receiver) = oneshot::channel();
    let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
    let app = callback_router(path, expected_state, code_sender);

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_receiver.await;
            })
            .await
    });

    let result = code_receiver.await;
    let _ = shutdown_sender.send(());
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server).await {
        Ok(Ok(Err(error))) => print_warning!("Callback server failed: {error}"),
        Ok(Err(error)) => print_warning!("Callback server task failed: {error}"),
        Ok(Ok(Ok(()))) | Err(_) => {}
    }

    result
        .context("Callback server stopped before authorization completed")?
        .map_err(anyhow::Error::msg)
}

/// Validate the callback against the expected state and extract the code.
fn check_callback(params: CallbackParams, expected_state: &str) -> Result<String> {
    if let Some(error) = params.error {
        bail!("Authorization was denied: {error}");
    }
    if params.state.as_deref() != Some(expected_state) {
        bail!("Authorization state mismatch");
    }
    match params.code {
        Some(code) if !code.is_empty() => Ok(code),
        _ => bail!("Authorization callback did not include a code"),
    }
}

/// Path the callback is served on, taken from the redirect URI.
#[must_use]
pub fn callback_path(redirect_uri: &str) -> String {
    Url::parse(redirect_uri)
        .ok()
        .map(|url| url.path().to_string())
        .filter(|path| path.len() > 1)
        .unwrap_or_else(|| CALLBACK_PATH.to_string())
}

/// Build the authorization URL the user opens in a browser.
///
/// # Errors
/// Returns an error if the URL cannot be built.
pub fn build_authorize_url(client_id: &str, redirect_uri: &str, state: &str) -> Result<Url> {
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", SCOPES),
            ("state", state),
            ("prompt", "select_company"),
        ],
    )
    .context("Failed to build authorization URL")
}

/// Accept Go-style `:port` addresses by binding to the loopback interface.
#[must_use]
pub fn normalize_local_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("127.0.0.1{addr}")
    } else {
        addr.to_string()
    }
}

#[must_use]
pub fn default_redirect_uri(local_addr: &str) -> String {
    format!("http://{local_addr}{CALLBACK_PATH}")
}

#[cfg(test)]
mod test_token {
    use super::*;

    use tempfile::tempdir;

    fn token(expiry: Option<DateTime<Utc>>) -> Token {
        Token {
            access_token: "access".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("refresh".to_string()),
            expiry,
        }
    }

    #[test]
    fn token_near_expiry_is_not_valid() {
        let now = Utc::now();
        assert!(token(Some(now + TimeDelta::seconds(3600))).is_valid_at(now));
        assert!(!token(Some(now + TimeDelta::seconds(30))).is_valid_at(now));
        assert!(!token(Some(now - TimeDelta::seconds(1))).is_valid_at(now));
        assert!(token(None).is_valid_at(now));
    }

    #[test]
    fn empty_access_token_is_not_valid() {
        let mut token = token(None);
        token.access_token.clear();
        assert!(!token.is_valid_at(Utc::now()));
    }

    #[test]
    fn response_sets_absolute_expiry() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","token_type":"bearer","expires_in":21600}"#)
                .expect("should parse");
        let now = Utc::now();
        let token = response.into_token(now, Some("old".to_string()));
        assert_eq!(token.expiry, Some(now + TimeDelta::seconds(21600)));
        assert_eq!(token.refresh_token.as_deref(), Some("old"));
    }

    #[test]
    fn saves_and_loads_token() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("token.json");
        let token = token(Some(Utc::now()));

        token.save(&path).expect("should save");
        assert_eq!(Token::load(&path).expect("should load"), Some(token));
    }

    #[test]
    fn missing_token_file_is_none() {
        let dir = tempdir().expect("temp dir");
        assert_eq!(Token::load(&dir.path().join("token.json")).expect("should load"), None);
    }

    #[test]
    fn corrupt_token_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("token.json");
        fs::write(&path, "{not json").expect("write file");
        assert!(Token::load(&path).is_err());
    }
}
