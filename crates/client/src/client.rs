//! Archive HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Covers the full editing flow: fetch records → validate fields →
//! batch save.

use std::time::Duration;

use glotgrid_protocol::{
    BatchSaveRequest, BatchSaveResponse, RecordData, RecordQuery, ValidationRequest,
    ValidationVerdict,
};

use crate::auth::{load_auth, AuthCredentials};

/// Archive API client (blocking).
#[derive(Clone)]
pub struct ArchiveClient {
    http: reqwest::blocking::Client,
    api_base: String,
    token: String,
}

/// Error type for archive operations.
#[derive(Debug)]
pub enum ClientError {
    /// No auth credentials configured
    NotAuthenticated,
    /// Network error
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// JSON parsing error
    Parse(String),
    /// File I/O error
    Io(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::NotAuthenticated => write!(f, "Not authenticated — log in first"),
            ClientError::Network(msg) => write!(f, "Network error: {}", msg),
            ClientError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            ClientError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ClientError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl ArchiveClient {
    /// Create a new client using saved auth credentials.
    pub fn from_saved_auth() -> Result<Self, ClientError> {
        let creds = load_auth().ok_or(ClientError::NotAuthenticated)?;
        Self::new(creds)
    }

    /// Create a new client with explicit credentials.
    pub fn new(creds: AuthCredentials) -> Result<Self, ClientError> {
        Self::with_timeout(creds, Duration::from_secs(30))
    }

    pub fn with_timeout(creds: AuthCredentials, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("glotgrid/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: creds.api_base,
            token: creds.token,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Fetch the working set of records. The editor loads the whole
    /// result up front; there is no pagination on this path.
    pub fn fetch_records(&self, query: &RecordQuery) -> Result<Vec<RecordData>, ClientError> {
        let url = format!("{}/api/grid/records", self.api_base);
        let body = serde_json::to_value(query).map_err(|e| ClientError::Parse(e.to_string()))?;
        let resp = self.post_json(&url, &body)?;
        resp.json::<Vec<RecordData>>()
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Validate one field value against the server's domain rules.
    pub fn validate_field(&self, request: &ValidationRequest) -> Result<ValidationVerdict, ClientError> {
        let url = format!("{}/api/grid/validate", self.api_base);
        let body = serde_json::to_value(request).map_err(|e| ClientError::Parse(e.to_string()))?;
        let resp = self.post_json(&url, &body)?;
        resp.json::<ValidationVerdict>()
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Submit a batch save. Partial failure is not an HTTP error: the
    /// response body carries the saved/conflict split.
    pub fn save_batch(&self, request: &BatchSaveRequest) -> Result<BatchSaveResponse, ClientError> {
        let url = format!("{}/api/grid/save", self.api_base);
        let body = serde_json::to_value(request).map_err(|e| ClientError::Parse(e.to_string()))?;
        let resp = self.post_json(&url, &body)?;
        resp.json::<BatchSaveResponse>()
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<reqwest::blocking::Response, ClientError> {
        let response = self.http.post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClientError::Http(status, body));
        }

        Ok(response)
    }
}
