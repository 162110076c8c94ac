//! REST gateway client for the bookkeeping server.
//!
//! Thin typed wrapper over the per-record-type endpoints, with bearer-token
//! auth attached to every request. The client performs no retry and no
//! backoff; failures surface as errors for the sync engine to classify.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::collections::HashMap;
use std::time::Duration;

use ledgerbook_core::errors::{Error, Result};
use ledgerbook_core::models::{CustomCard, Entry, Note};
use ledgerbook_core::remote::RemoteGateway;

use crate::types::{ApiErrorResponse, CardsEnvelope, LimitLockRequest, SuccessResponse};

/// Default timeout for API requests. A timeout maps to the same
/// leave-unsynced-retry-later path as any other transport failure.
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Client for the bookkeeping REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the server (e.g., "https://books.example.app")
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::unreachable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create headers for an API request.
    fn headers(&self, token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| Error::auth("invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    fn transport_err(err: reqwest::Error) -> Error {
        Error::unreachable(err.to_string())
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await.map_err(Self::transport_err)?;
        Self::log_response(status, &body);

        if !status.is_success() {
            // Prefer the structured error message when the server sent one.
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(Error::remote(
                    status.as_u16(),
                    format!("{}: {}", error.code, error.message),
                ));
            }
            return Err(Error::remote(status.as_u16(), body));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!("failed to deserialize response. Body: {}, Error: {}", body, e);
            Error::remote(status.as_u16(), format!("failed to parse response: {}", e))
        })
    }

    /// Parse an acknowledgement-only response.
    async fn parse_success(response: reqwest::Response) -> Result<()> {
        let ack: SuccessResponse = Self::parse_response(response).await?;
        if !ack.success {
            return Err(Error::remote(200, "server reported success: false"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for ApiClient {
    /// GET /api/entries
    async fn list_entries(&self, token: &str) -> Result<Vec<Entry>> {
        let url = format!("{}/api/entries", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_response(response).await
    }

    /// POST /api/entries
    async fn create_entry(&self, token: &str, entry: &Entry) -> Result<Entry> {
        let url = format!("{}/api/entries", self.base_url);
        debug!("creating entry {}", entry.id);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(token)?)
            .json(entry)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_response(response).await
    }

    /// PUT /api/entries/{id}
    async fn update_entry(
        &self,
        token: &str,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<Entry> {
        let url = format!("{}/api/entries/{}", self.base_url, id);

        let response = self
            .client
            .put(&url)
            .headers(self.headers(token)?)
            .json(patch)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_response(response).await
    }

    /// DELETE /api/entries/{id}
    async fn delete_entry(&self, token: &str, id: &str) -> Result<()> {
        let url = format!("{}/api/entries/{}", self.base_url, id);

        let response = self
            .client
            .delete(&url)
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_success(response).await
    }

    /// DELETE /api/entries/delete-all
    async fn delete_all_entries(&self, token: &str) -> Result<()> {
        let url = format!("{}/api/entries/delete-all", self.base_url);

        let response = self
            .client
            .delete(&url)
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_success(response).await
    }

    /// GET /api/notes
    async fn list_notes(&self, token: &str) -> Result<Vec<Note>> {
        let url = format!("{}/api/notes", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_response(response).await
    }

    /// POST /api/notes
    async fn create_note(&self, token: &str, note: &Note) -> Result<Note> {
        let url = format!("{}/api/notes", self.base_url);
        debug!("creating note {}", note.id);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(token)?)
            .json(note)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_response(response).await
    }

    /// PUT /api/notes/{id}
    async fn update_note(&self, token: &str, id: &str, patch: &serde_json::Value) -> Result<Note> {
        let url = format!("{}/api/notes/{}", self.base_url, id);

        let response = self
            .client
            .put(&url)
            .headers(self.headers(token)?)
            .json(patch)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_response(response).await
    }

    /// DELETE /api/notes/{id}
    async fn delete_note(&self, token: &str, id: &str) -> Result<()> {
        let url = format!("{}/api/notes/{}", self.base_url, id);

        let response = self
            .client
            .delete(&url)
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_success(response).await
    }

    /// GET /api/balances
    async fn get_balances(&self, token: &str) -> Result<HashMap<String, f64>> {
        let url = format!("{}/api/balances", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_response(response).await
    }

    /// POST /api/balances
    async fn save_balances(&self, token: &str, balances: &HashMap<String, f64>) -> Result<()> {
        let url = format!("{}/api/balances", self.base_url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(token)?)
            .json(balances)
            .send()
            .await
            .map_err(Self::transport_err)?;

        // The server echoes the saved map.
        Self::parse_response::<HashMap<String, f64>>(response)
            .await
            .map(|_| ())
    }

    /// GET /api/custom-limits
    async fn get_custom_cards(&self, token: &str) -> Result<Vec<CustomCard>> {
        let url = format!("{}/api/custom-limits", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers(token)?)
            .send()
            .await
            .map_err(Self::transport_err)?;

        let envelope: CardsEnvelope = Self::parse_response(response).await?;
        Ok(envelope.cards)
    }

    /// POST /api/custom-limits (full replace: deletes all then reinserts)
    async fn save_custom_cards(&self, token: &str, cards: &[CustomCard]) -> Result<Vec<CustomCard>> {
        let url = format!("{}/api/custom-limits", self.base_url);
        debug!("replacing {} custom cards", cards.len());

        let response = self
            .client
            .post(&url)
            .headers(self.headers(token)?)
            .json(&CardsEnvelope {
                cards: cards.to_vec(),
            })
            .send()
            .await
            .map_err(Self::transport_err)?;

        let envelope: CardsEnvelope = Self::parse_response(response).await?;
        Ok(envelope.cards)
    }

    /// POST /api/limits
    async fn save_limit_lock(&self, token: &str, locked: bool) -> Result<()> {
        let url = format!("{}/api/limits", self.base_url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers(token)?)
            .json(&LimitLockRequest { locked })
            .send()
            .await
            .map_err(Self::transport_err)?;

        Self::parse_success(response).await
    }
}
