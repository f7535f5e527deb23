use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};

use super::http::{Request, Response};

/// Live network access. Non-2xx answers are responses, not errors; only
/// transport failures surface as `Err`.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

pub struct HttpNetwork {
    client: Client,
}

impl Default for HttpNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpNetwork {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let resp = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await
            .with_context(|| format!("request to {} failed", request.url))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("reading body of {} failed", request.url))?;

        Ok(Response {
            status,
            content_type,
            body,
        })
    }
}
