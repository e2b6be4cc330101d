//! Reqwest-backed transport
//!
//! Sends exactly one attempt per call and maps every failure onto an
//! [`ErrorEnvelope`] that carries the descriptor it came from. Retries are
//! owned by the recovery state machine, never by the transport.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ecm_core::ports::Transport;
use ecm_domain::constants::CONTENT_TYPE_HEADER;
use ecm_domain::{
    EcmError, ErrorEnvelope, HttpConfig, HttpMethod, HttpResponse, RequestBody,
    RequestDescriptor, TimeoutBudgets,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// HTTP transport over a shared reqwest client
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: String,
    content_type: String,
    budgets: TimeoutBudgets,
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Transport configured from the HTTP section of the app config
    pub fn from_config(config: &HttpConfig) -> Result<Self, EcmError> {
        Self::builder()
            .base_url(&config.base_url)
            .content_type(&config.content_type)
            .timeouts(config.timeouts)
            .build()
    }

    /// Base URL relative paths resolve against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a descriptor URL
    ///
    /// Absolute URLs pass through unchanged; paths are joined onto the base.
    pub fn resolve_url(&self, url: &str) -> Result<Url, url::ParseError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Url::parse(url);
        }

        let base = self.base_url.trim_end_matches('/');
        let path = url.trim_start_matches('/');
        if path.is_empty() {
            Url::parse(base)
        } else {
            Url::parse(&format!("{base}/{path}"))
        }
    }

    /// Per-attempt timeout: the descriptor override, else its class budget
    pub fn timeout_for(&self, request: &RequestDescriptor) -> Duration {
        request.timeout.unwrap_or_else(|| self.budgets.budget(request.operation))
    }

    fn build_request(&self, request: &RequestDescriptor, url: Url) -> RequestBuilder {
        let multipart = matches!(request.body, RequestBody::Multipart(_));
        let mut builder =
            self.client.request(to_method(request.method), url).timeout(self.timeout_for(request));

        // reqwest writes the multipart boundary header itself
        let has_content_type =
            request.headers.keys().any(|name| name.eq_ignore_ascii_case(CONTENT_TYPE_HEADER));
        if !multipart && !has_content_type {
            builder = builder.header(CONTENT_TYPE_HEADER, &self.content_type);
        }
        for (name, value) in &request.headers {
            if multipart && name.eq_ignore_ascii_case(CONTENT_TYPE_HEADER) {
                continue;
            }
            builder = builder.header(name, value);
        }

        match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(part) => {
                let file = Part::bytes(part.bytes.clone()).file_name(part.file_name.clone());
                builder.multipart(Form::new().part(part.field.clone(), file))
            }
        }
    }

    async fn exchange(
        &self,
        builder: RequestBuilder,
        timeout: Duration,
    ) -> Result<HttpResponse, ErrorEnvelope> {
        let response = builder.send().await.map_err(|err| map_reqwest_error(&err, timeout))?;

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|err| map_reqwest_error(&err, timeout))?;

        if status.is_success() {
            return Ok(HttpResponse {
                status: status.as_u16(),
                headers,
                body: body.to_vec(),
                url: Some(final_url),
            });
        }

        Err(ErrorEnvelope::from_status(status.as_u16(), error_body(&body))
            .with_response_url(final_url))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<HttpResponse, ErrorEnvelope> {
        if request.is_cancelled() {
            return Err(ErrorEnvelope::cancelled().with_request(request.clone()));
        }

        let url = self.resolve_url(&request.url).map_err(|err| {
            ErrorEnvelope {
                message: format!("invalid request url {}: {err}", request.url),
                ..ErrorEnvelope::default()
            }
            .with_request(request.clone())
        })?;

        let timeout = self.timeout_for(request);
        debug!(
            method = request.method.as_str(),
            %url,
            timeout_ms = timeout.as_millis() as u64,
            "sending HTTP request"
        );

        let exchange = self.exchange(self.build_request(request, url), timeout);
        let outcome = match &request.cancellation {
            Some(token) => tokio::select! {
                () = token.cancelled() => Err(ErrorEnvelope::cancelled()),
                outcome = exchange => outcome,
            },
            None => exchange.await,
        };

        match &outcome {
            Ok(response) => debug!(status = response.status, "received HTTP response"),
            Err(envelope) => debug!(error = %envelope, "HTTP request failed"),
        }
        outcome.map_err(|envelope| envelope.with_request(request.clone()))
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    base_url: String,
    content_type: String,
    budgets: TimeoutBudgets,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        let config = HttpConfig::default();
        Self {
            base_url: config.base_url,
            content_type: config.content_type,
            budgets: config.timeouts,
            connect_timeout: None,
            user_agent: None,
        }
    }
}

impl HttpTransportBuilder {
    /// Base URL for relative paths
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Default `Content-Type` for JSON bodies
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Per-operation timeout budgets
    pub fn timeouts(mut self, budgets: TimeoutBudgets) -> Self {
        self.budgets = budgets;
        self
    }

    /// TCP connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// User agent header
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the reqwest client
    pub fn build(self) -> Result<HttpTransport, EcmError> {
        Url::parse(&self.base_url).map_err(|err| {
            EcmError::Config(format!("invalid base url {}: {err}", self.base_url))
        })?;

        let mut builder = ReqwestClient::builder().no_proxy();
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|err| EcmError::Config(format!("failed to build http client: {err}")))?;

        Ok(HttpTransport {
            client,
            base_url: self.base_url,
            content_type: self.content_type,
            budgets: self.budgets,
        })
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// JSON error body, or the raw text when the server sent something else
fn error_body(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    serde_json::from_slice(bytes)
        .ok()
        .or_else(|| Some(Value::String(String::from_utf8_lossy(bytes).into_owned())))
}

fn map_reqwest_error(err: &reqwest::Error, timeout: Duration) -> ErrorEnvelope {
    let envelope = if err.is_timeout() {
        ErrorEnvelope::timeout(format!("timeout of {}ms exceeded", timeout.as_millis()))
    } else if err.is_builder() {
        ErrorEnvelope { message: err.to_string(), ..ErrorEnvelope::default() }
    } else if err.is_connect() || err.is_request() {
        ErrorEnvelope::network("Network Error")
    } else {
        ErrorEnvelope::network(err.to_string())
    };

    match err.url() {
        Some(url) => envelope.with_response_url(url.as_str()),
        None => envelope,
    }
}
