use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::{HttpResponse, RequestBody, RequestSpec, RetryError, TransportConfig, TransportError};

/// Sends a single request. Implementations report every unsuccessful outcome,
/// including non-2xx responses, as a [`TransportError`].
#[async_trait]
pub trait Transport: Send + Sync {
    type Request: Send + Sync;
    type Response: Send;

    async fn send(&self, request: &Self::Request) -> Result<Self::Response, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ReqwestTransport {
    /// Builds the underlying `reqwest::Client` with the configured default
    /// headers, bearer token, timeout and user agent.
    pub fn new(config: &TransportConfig) -> Result<Self, RetryError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| RetryError::Config(format!("invalid header name '{name}': {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| RetryError::Config(format!("invalid value for '{name}': {err}")))?;
            headers.insert(name, value);
        }

        if let Some(token) = &config.bearer_token {
            let mut value = HeaderValue::from_str(&normalize_bearer_authorization(token))
                .map_err(|err| RetryError::Config(format!("invalid bearer token: {err}")))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        let base_url = config
            .base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/').to_owned())
            .filter(|url| !url.is_empty());
        if let Some(url) = &base_url {
            if !is_absolute(url) {
                return Err(RetryError::Config(format!(
                    "base url must start with http:// or https://, got '{url}'"
                )));
            }
        }

        Ok(Self {
            http: builder.build().map_err(RetryError::Build)?,
            base_url,
        })
    }

    fn resolve_url(&self, url: &str) -> Result<String, TransportError> {
        if is_absolute(url) {
            return Ok(url.to_owned());
        }
        match &self.base_url {
            Some(base) => Ok(format!("{base}/{}", url.trim_start_matches('/'))),
            None => Err(TransportError::other(format!(
                "relative url '{url}' requires a base url"
            ))),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    type Request = RequestSpec;
    type Response = HttpResponse;

    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, TransportError> {
        let url = self.resolve_url(&request.url)?;
        let mut builder = self.http.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
            None => builder,
        };

        let response = builder.send().await.map_err(TransportError::Request)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(TransportError::Request)?
            .to_vec();

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
