//! Request execution
//!
//! One `WireRequest` is one network round trip. The executor owns the
//! retry policy: transient failures on reads back off exponentially with
//! jitter up to the configured attempt limit; writes are re-issued only
//! when the caller supplied an idempotency token, since a retried write
//! after an ambiguous failure could duplicate an append.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use rand::Rng;
use tracing::{debug, warn};
use url::Url;

use cirrus_types::TypeDescriptor;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::wire::WireSelection;

/// Direction of a wire request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Retrieve selected elements
    Read,
    /// Submit packed elements for the selection
    Write,
}

/// One encoded request against a single target
#[derive(Debug, Clone)]
pub struct WireRequest {
    /// Dataset identifier on the service
    pub target: String,
    /// Read or write
    pub kind: RequestKind,
    /// Encoded selection
    pub selection: WireSelection,
    /// Wire type descriptor for the transferred elements
    pub descriptor: TypeDescriptor,
    /// Packed payload, writes only
    pub payload: Option<Bytes>,
    /// Caller-supplied token that makes a write safe to retry
    pub idempotency_token: Option<String>,
}

/// Raw response from the service
#[derive(Debug, Clone)]
pub struct WireResponse {
    /// Binary payload for reads, empty acknowledgement for writes
    pub body: Bytes,
}

/// One network round trip
///
/// Implementations must be safe to call concurrently from multiple
/// workers over a shared connection pool. Retry is the executor's
/// concern, not the transport's.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request once and classify the outcome
    async fn send(&self, request: &WireRequest) -> ClientResult<WireResponse>;
}

/// HTTP transport over a shared connection pool
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    auth_header: Option<String>,
    timeout_ms: u64,
}

impl HttpTransport {
    /// Build a transport for the configured endpoint
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ClientError::InvalidConfig(format!("endpoint: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ClientError::Transient(format!("client init: {e}")))?;
        let auth_header = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                Some(format!("Basic {}", BASE64.encode(format!("{user}:{pass}"))))
            }
            _ => None,
        };
        Ok(Self {
            client,
            endpoint,
            auth_header,
            timeout_ms: config.request_timeout_ms,
        })
    }

    fn value_url(&self, target: &str) -> ClientResult<Url> {
        self.endpoint
            .join(&format!("datasets/{target}/value"))
            .map_err(|e| ClientError::InvalidConfig(format!("target {target}: {e}")))
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_header {
            Some(header) => builder.header(reqwest::header::AUTHORIZATION, header),
            None => builder,
        }
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout {
                elapsed_ms: self.timeout_ms,
            }
        } else {
            ClientError::Transient(err.to_string())
        }
    }
}

/// JSON envelope for requests too large for query parameters
#[derive(serde::Serialize)]
struct ValueBody<'a> {
    select: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    zipped: bool,
    #[serde(rename = "type")]
    descriptor: &'a TypeDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &WireRequest) -> ClientResult<WireResponse> {
        let url = self.value_url(&request.target)?;
        let sel = &request.selection;

        let builder = match request.kind {
            RequestKind::Read if !sel.prefers_body() => {
                let mut b = self.client.get(url).query(&[("select", sel.select.as_str())]);
                if let Some(fields) = &sel.fields {
                    b = b.query(&[("fields", fields.as_str())]);
                }
                if sel.zipped {
                    b = b.query(&[("zipped", "1")]);
                }
                b.header(reqwest::header::ACCEPT, "application/octet-stream")
            }
            RequestKind::Read => {
                // Long point lists exceed practical query-string limits.
                let body = ValueBody {
                    select: &sel.select,
                    fields: sel.fields.as_deref(),
                    zipped: sel.zipped,
                    descriptor: &request.descriptor,
                    data: None,
                };
                self.client
                    .post(url)
                    .json(&body)
                    .header(reqwest::header::ACCEPT, "application/octet-stream")
            }
            RequestKind::Write => {
                let payload = request.payload.as_deref().unwrap_or_default();
                let body = ValueBody {
                    select: &sel.select,
                    fields: sel.fields.as_deref(),
                    zipped: sel.zipped,
                    descriptor: &request.descriptor,
                    data: Some(BASE64.encode(payload)),
                };
                let mut b = self.client.put(url).json(&body);
                if let Some(token) = &request.idempotency_token {
                    b = b.header("X-Idempotency-Key", token);
                }
                b
            }
        };

        let response = self
            .apply_auth(builder)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            // Services wrap error detail as {"message": "..."}.
            let message = serde_json::from_str::<serde_json::Value>(&raw)
                .ok()
                .and_then(|v| v.get("message")?.as_str().map(str::to_string))
                .unwrap_or(raw);
            return Err(ClientError::from_status(status.as_u16(), message));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transient(format!("reading body: {e}")))?;
        Ok(WireResponse { body })
    }
}

/// Executes wire requests with timeout and retry
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl RequestExecutor {
    /// Build an executor with the default HTTP transport
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self { transport, config })
    }

    /// Build an executor over a caller-supplied transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> ClientResult<Self> {
        config.validate()?;
        Ok(Self { transport, config })
    }

    /// Client configuration in effect
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute one request, retrying transient read failures
    pub async fn execute(&self, request: &WireRequest) -> ClientResult<WireResponse> {
        let retryable = request.kind == RequestKind::Read || request.idempotency_token.is_some();
        let deadline = Duration::from_millis(self.config.request_timeout_ms);
        let mut attempt = 1u32;
        loop {
            let outcome = match tokio::time::timeout(deadline, self.transport.send(request)).await
            {
                Ok(result) => result,
                Err(_) => Err(ClientError::Timeout {
                    elapsed_ms: self.config.request_timeout_ms,
                }),
            };
            match outcome {
                Ok(response) => {
                    debug!(target = %request.target, attempt, "request complete");
                    return Ok(response);
                }
                Err(err) if retryable && err.is_transient() && attempt < self.config.max_retries => {
                    let base = self.config.retry_base_delay_ms * 2u64.pow(attempt - 1);
                    let jitter = rand::thread_rng().gen_range(0..=base / 2);
                    warn!(
                        target = %request.target,
                        attempt,
                        delay_ms = base + jitter,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(base + jitter)).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(target = %request.target, attempt, error = %err, "request failed");
                    return Err(err);
                }
            }
        }
    }
}
