use crate::config::{ConfigError, KioskConfig};
use crate::verification::interface::VerificationBackend;
use crate::verification::types::{
    RawResponse, RegisterRequest, ScanRequest, TransportError, REGISTER_PATH, SCAN_PATH,
};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

/// `VerificationBackend` over HTTPS using reqwest.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &KioskConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConfigError::Invalid(format!("header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::Invalid(format!("header value for '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client: {}", e)))?;

        Ok(HttpBackend {
            client,
            base_url: config.backend_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(endpoint: &str, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout { endpoint: endpoint.to_string() }
        } else {
            TransportError::Network { endpoint: endpoint.to_string(), cause: e.to_string() }
        }
    }

    async fn read(endpoint: &str, response: reqwest::Response) -> Result<RawResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_send_error(endpoint, e))?;
        debug!("[Http] {} answered HTTP {} ({} bytes)", endpoint, status, body.len());
        Ok(RawResponse::new(status, body.to_vec()))
    }

    async fn post_json<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<RawResponse, TransportError> {
        let endpoint = self.endpoint(path);
        let response = self
            .client
            .post(&endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!("[Http] POST {} failed: {}", endpoint, e);
                Self::map_send_error(&endpoint, e)
            })?;
        Self::read(&endpoint, response).await
    }

    /// GET with query parameters, for the read-only admin endpoints.
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<RawResponse, TransportError> {
        let endpoint = self.endpoint(path);
        let response = self
            .client
            .get(&endpoint)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                warn!("[Http] GET {} failed: {}", endpoint, e);
                Self::map_send_error(&endpoint, e)
            })?;
        Self::read(&endpoint, response).await
    }
}

#[async_trait]
impl VerificationBackend for HttpBackend {
    async fn post_scan(&self, request: &ScanRequest) -> Result<RawResponse, TransportError> {
        self.post_json(SCAN_PATH, request).await
    }

    async fn post_registration(&self, request: &RegisterRequest) -> Result<RawResponse, TransportError> {
        self.post_json(REGISTER_PATH, request).await
    }
}
