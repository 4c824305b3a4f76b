//! The HTTP capability providers are built on.
//!
//! Providers only ever issue a GET and look at the status and body, so the
//! seam is kept that small. [`ReqwestHttpClient`] is the production
//! implementation; tests substitute an in-memory one.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync + Debug {
    async fn get(&self, url: Url) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    http: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }

    pub fn with_timeout(timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: Url) -> Result<HttpResponse, TransportError> {
        let endpoint = redact(&url);

        let res = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| TransportError::Request { endpoint: endpoint.clone(), source })?;

        let status = res.status().as_u16();
        let body = res.text().await.map_err(|source| TransportError::Body { endpoint, source })?;

        Ok(HttpResponse { status, body })
    }
}

/// Scheme, host and path only. The query string carries the API key.
pub fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.set_fragment(None);
    shown.to_string()
}
