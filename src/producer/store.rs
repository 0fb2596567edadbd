//! Document store client
//!
//! [`DocumentStore`] is the seam between the fetch loop and the backing
//! store; the real implementation speaks the Cosmos DB REST protocol with
//! master-key authentication and continuation-token paging.

use crate::domain::StrataError;
use crate::producer::retry::IsRetryable;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

const API_VERSION: &str = "2018-12-31";
const TOKEN_VERSION: &str = "1.0";

/// One page of query results
#[derive(Debug)]
pub struct Page {
    pub documents: Vec<Value>,
    /// Opaque resume token; `None` on the last page
    pub continuation: Option<String>,
}

/// Failure of a store request
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The caller gave something the store rejects; retrying cannot help.
    #[error("{0}")]
    User(String),
    /// Transient condition worth another attempt
    #[error("{0}")]
    Transient(String),
    /// Unexpected protocol or client failure
    #[error("{0}")]
    Internal(String),
}

impl IsRetryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<StoreError> for StrataError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::User(msg) => StrataError::Query(msg),
            // A transient failure only converts once the retry budget is
            // spent; a store that stays throttled or broken past the budget
            // is an unexpected condition, not something the operator can
            // fix, so both remaining classes are internal.
            StoreError::Transient(msg) | StoreError::Internal(msg) => {
                StrataError::Internal(msg)
            }
        }
    }
}

/// Paged query access to a document container
#[async_trait]
pub trait DocumentStore {
    /// Verify that the endpoint, credentials and database are reachable.
    async fn connect(&self) -> Result<(), StoreError>;

    /// Execute `query`, resuming from `continuation` when present.
    async fn fetch_page(
        &self,
        query: &str,
        continuation: Option<&str>,
    ) -> Result<Page, StoreError>;
}

/// Connection parameters for the REST store
pub struct StoreSettings {
    pub endpoint: String,
    pub key: Secret<String>,
    pub database_id: String,
    pub container_id: String,
    pub page_size: u32,
}

/// Cosmos DB REST client with master-key authentication
pub struct CosmosRestStore {
    client: reqwest::Client,
    settings: StoreSettings,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

impl CosmosRestStore {
    pub fn new(settings: StoreSettings) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StoreError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    fn base_url(&self) -> String {
        self.settings.endpoint.trim_end_matches('/').to_string()
    }

    fn database_link(&self) -> String {
        format!("dbs/{}", self.settings.database_id)
    }

    fn collection_link(&self) -> String {
        format!(
            "dbs/{}/colls/{}",
            self.settings.database_id, self.settings.container_id
        )
    }

    // RFC 1123 date, lowercased as the signature scheme requires. The same
    // lowercased value goes into the x-ms-date header.
    fn request_date() -> String {
        chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
            .to_lowercase()
    }

    /// Master-key authorization token for one request.
    ///
    /// The signature is an HMAC-SHA256 over
    /// `"{verb}\n{resource_type}\n{resource_link}\n{date}\n\n"` with the
    /// verb, resource type and date lowercased, keyed by the base64-decoded
    /// master key.
    fn auth_token(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> Result<String, StoreError> {
        let key = base64::engine::general_purpose::STANDARD
            .decode(self.settings.key.expose_secret())
            .map_err(|_| {
                StoreError::User("The configured database key is not valid base64".to_string())
            })?;

        let text = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(&key)
            .map_err(|e| StoreError::Internal(format!("Failed to build signature: {e}")))?;
        mac.update(text.as_bytes());
        let signature = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        Ok(urlencoding::encode(&format!(
            "type=master&ver={TOKEN_VERSION}&sig={signature}"
        ))
        .into_owned())
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                StoreError::Transient(format!("Failed to reach the database endpoint: {e}"))
            } else {
                StoreError::Internal(format!("Request failed: {e}"))
            }
        })
    }

    async fn classify_failure(response: reqwest::Response) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = extract_error_message(&body);

        match status.as_u16() {
            400 => StoreError::User(format!("The database rejected the query: {detail}")),
            401 | 403 => StoreError::User(
                "Authentication failed. Please check the configured database key.".to_string(),
            ),
            404 => StoreError::User(format!("The requested resource was not found: {detail}")),
            429 => StoreError::Transient("The database throttled the request".to_string()),
            s if s >= 500 => {
                StoreError::Transient(format!("The database returned a server error ({status})"))
            }
            _ => StoreError::Internal(format!(
                "Unexpected response from the database ({status}): {detail}"
            )),
        }
    }
}

// The error body is JSON with a "message" field; fall back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.chars().take(256).collect())
}

#[async_trait]
impl DocumentStore for CosmosRestStore {
    async fn connect(&self) -> Result<(), StoreError> {
        let link = self.database_link();
        let date = Self::request_date();
        let token = self.auth_token("GET", "dbs", &link, &date)?;

        let url = format!("{}/{}", self.base_url(), link);
        url::Url::parse(&url).map_err(|_| {
            StoreError::User(format!(
                "The configured endpoint is not a valid URL: {}",
                self.settings.endpoint
            ))
        })?;

        let request = self
            .client
            .get(url)
            .header("authorization", token)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION);

        let response = self.send(request).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::classify_failure(response).await)
        }
    }

    async fn fetch_page(
        &self,
        query: &str,
        continuation: Option<&str>,
    ) -> Result<Page, StoreError> {
        let link = self.collection_link();
        let date = Self::request_date();
        let token = self.auth_token("POST", "docs", &link, &date)?;

        let mut request = self
            .client
            .post(format!("{}/{}/docs", self.base_url(), link))
            .header("authorization", token)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header("content-type", "application/query+json")
            .header("x-ms-documentdb-isquery", "True")
            .header("x-ms-documentdb-query-enablecrosspartition", "True")
            .header("x-ms-max-item-count", self.settings.page_size.to_string())
            .json(&serde_json::json!({ "query": query, "parameters": [] }));

        if let Some(token) = continuation {
            request = request.header("x-ms-continuation", token);
        }

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let continuation = response
            .headers()
            .get("x-ms-continuation")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from);

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Internal(format!("Failed to parse query response: {e}")))?;

        Ok(Page {
            documents: body.documents,
            continuation,
        })
    }
}
