/*
[INPUT]:  HTTP configuration (base URL, timeouts, credentials)
[OUTPUT]: Configured reqwest client ready for signed and public API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::http::error::{AsterError, Result};
use crate::http::signature;

/// Base URL for the AsterDEX spot API
const DEFAULT_BASE_URL: &str = "https://sapi.asterdex.com";

/// Header carrying the API key on signed requests
const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Window (ms) within which a signed request must reach the server.
    pub recv_window: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            recv_window: 5_000,
        }
    }
}

/// Credentials for signed requests
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Error body returned by the API on failed requests
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

/// Main HTTP client for the AsterDEX spot API
#[derive(Debug, Clone)]
pub struct AsterClient {
    http_client: Client,
    base_url: Url,
    credentials: Option<Credentials>,
    recv_window: u64,
}

impl AsterClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        Self::with_config_and_base_url(config, DEFAULT_BASE_URL)
    }

    /// Create a client pointed at a custom base URL (used by tests)
    pub fn with_config_and_base_url(config: ClientConfig, base_url: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(base_url)?,
            credentials: None,
            recv_window: config.recv_window,
        })
    }

    /// Set credentials for signed requests
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
    }

    /// Get credentials if set
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Build a request builder for public endpoints
    pub(crate) fn public_request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(endpoint)?;
        Ok(self.http_client.request(method, url))
    }

    /// Build a signed request builder.
    ///
    /// Appends `timestamp`, `recvWindow` and `signature` to the canonical
    /// query string and attaches the API key header.
    pub(crate) fn signed_request(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<RequestBuilder> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(AsterError::MissingCredentials)?;

        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut query = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "recvWindow={}&timestamp={timestamp}",
            self.recv_window
        ));

        let signature = signature::sign(&query, &credentials.api_secret);
        let mut url = self.base_url.join(endpoint)?;
        url.set_query(Some(&format!("{query}&signature={signature}")));

        Ok(self
            .http_client
            .request(method, url)
            .header(API_KEY_HEADER, &credentials.api_key))
    }

    /// Send a request and decode the JSON response
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&body)
                .map_err(|err| AsterError::InvalidResponse(format!("{err}: {body}")))
        } else {
            Err(Self::map_error(status, &body))
        }
    }

    /// Send a request where only success/failure matters
    pub(crate) async fn send_ok(&self, builder: RequestBuilder) -> Result<()> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Self::map_error(status, &body))
        }
    }

    fn map_error(status: StatusCode, body: &str) -> AsterError {
        let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AsterError::Authentication {
                message: parsed.map(|e| e.msg).unwrap_or_else(|| body.to_string()),
            },
            StatusCode::TOO_MANY_REQUESTS => AsterError::RateLimit { retry_after: 1 },
            _ => match parsed {
                Some(err) => AsterError::Api {
                    code: err.code,
                    message: err.msg,
                },
                None => AsterError::api_error(status, body.to_string()),
            },
        }
    }
}
