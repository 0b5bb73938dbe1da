//! freee accounting API client.
//!
//! Covers the company listing and the file box ("receipts") endpoints.
//!
//! Documentation:
//! <https://developer.freee.co.jp/reference/accounting/reference>

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use ffbox::model::{
    CompaniesResponse, Company, Receipt, ReceiptCreateParams, ReceiptResponse, ReceiptsResponse,
};
use ffbox::multipart::encode_receipt_create_params;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

/// Production API base URL.
const API_BASE_URL: &str = "https://api.freee.co.jp/";

/// freee API client authenticated with a bearer token.
#[derive(Debug)]
pub struct FreeeClient {
    client: Client,
    base_url: String,
    access_token: String,
}

/// Query for `GET /api/1/receipts`.
#[derive(Debug, Clone)]
pub struct ReceiptQuery {
    pub company_id: i64,
    /// Start of the registration date range.
    pub start_date: NaiveDate,
    /// End of the registration date range.
    pub end_date: NaiveDate,
    pub limit: u32,
}

impl FreeeClient {
    /// Create a client for the production API.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(access_token: String) -> Result<Self> {
        Self::with_base_url(API_BASE_URL, access_token)
    }

    /// Create a client for a custom API base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str, access_token: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    /// List companies the user belongs to.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is unexpected.
    pub async fn get_companies(&self) -> Result<Option<Vec<Company>>> {
        let request = self.authorized(self.client.get(self.build_url("api/1/companies")));
        let response: CompaniesResponse = self
            .send_and_parse(request, StatusCode::OK, "companies")
            .await?;
        Ok(response.companies)
    }

    /// List receipts registered in the given date range.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is unexpected.
    pub async fn get_receipts(&self, query: &ReceiptQuery) -> Result<Option<Vec<Receipt>>> {
        let request = self.authorized(self.client.get(self.build_url("api/1/receipts")).query(&[
            ("company_id", query.company_id.to_string()),
            ("start_date", query.start_date.format("%Y-%m-%d").to_string()),
            ("end_date", query.end_date.format("%Y-%m-%d").to_string()),
            ("limit", query.limit.to_string()),
        ]));
        let response: ReceiptsResponse = self.send_and_parse(request, StatusCode::OK, "receipts").await?;
        Ok(response.receipts)
    }

    /// Get a single receipt.
    ///
    /// # Errors
    /// Returns an error if the request fails or the receipt is not found.
    pub async fn get_receipt(&self, company_id: i64, receipt_id: i64) -> Result<Receipt> {
        let request = self.authorized(
            self.client
                .get(self.build_url(&format!("api/1/receipts/{receipt_id}")))
                .query(&[("company_id", company_id)]),
        );
        let response: ReceiptResponse = self.send_and_parse(request, StatusCode::OK, "receipt").await?;
        response.receipt.context("Response did not contain a receipt")
    }

    /// Upload a new receipt.
    ///
    /// # Errors
    /// Returns an error if the file cannot be encoded or the upload is rejected.
    pub async fn create_receipt(&self, params: &ReceiptCreateParams) -> Result<Receipt> {
        let encoded = encode_receipt_create_params(params).context("Failed to encode receipt params")?;
        let request = self.authorized(
            self.client
                .post(self.build_url("api/1/receipts"))
                .header(CONTENT_TYPE, encoded.content_type)
                .body(encoded.body),
        );
        let response: ReceiptResponse = self
            .send_and_parse(request, StatusCode::CREATED, "created receipt")
            .await?;
        response.receipt.context("Response did not contain the created receipt")
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.access_token)
    }

    async fn send_and_parse<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        expected: StatusCode,
        what: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {what} request"))?;
        let body = check_status(response, expected).await?;
        serde_json::from_str(&body).with_context(|| format!("Failed to parse {what} JSON"))
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }
}

/// Return the response body if the status is the expected one.
async fn check_status(response: Response, expected: StatusCode) -> Result<String> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        _ if status == expected => Ok(body),
        StatusCode::UNAUTHORIZED => {
            bail!("Access token was rejected ({status}). Remove the token file to authorize again: {body}")
        }
        _ => bail!("got unexpected response: {status} - {body}"),
    }
}
