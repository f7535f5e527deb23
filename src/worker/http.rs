//! Minimal request/response model shared by the cache, the network and callers.

use bytes::Bytes;
pub use reqwest::{Method, StatusCode, Url};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    Subresource,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::Subresource,
        }
    }

    pub fn navigate(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            mode: RequestMode::Navigate,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Cache key: the URL without its fragment.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, Some(content_type), body)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Self-contained page served when a navigation cannot reach the app shell.
    pub fn offline_page() -> Self {
        Self::new(
            StatusCode::OK,
            Some("text/html; charset=utf-8"),
            Bytes::from_static(OFFLINE_PAGE.as_bytes()),
        )
    }

    /// Audio miss with no network: empty 404.
    pub fn audio_unavailable() -> Self {
        Self::new(StatusCode::NOT_FOUND, None, Bytes::new())
    }

    pub fn service_unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            Some("text/plain; charset=utf-8"),
            Bytes::from_static(b"Service Unavailable"),
        )
    }
}

pub const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
<style>
  body { margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center;
         font-family: system-ui, sans-serif; background: #1f1f2e; color: #f4f4f8; text-align: center; }
  h1 { font-size: 1.6rem; margin-bottom: .5rem; }
  p { opacity: .75; }
</style>
</head>
<body>
<main>
  <h1>You're offline</h1>
  <p>The timer will come back as soon as your connection does.</p>
</main>
<script>
  window.addEventListener('online', function () { window.location.reload(); });
</script>
</body>
</html>
"#;
