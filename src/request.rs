use std::env;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Sent when `APOD_USER_AGENT` isn't set.
const DEFAULT_USER_AGENT: &str = concat!("apod/", env!("CARGO_PKG_VERSION"));

/// A fully built request for the metadata endpoint.
#[derive(Debug, Clone)]
pub struct ApodRequest {
    pub url: Url,
    pub timeout: Duration,
}

/// Status and buffered body of a completed exchange. Kept together so
/// failing responses can surface what the server actually said.
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub code: StatusCode,
    pub body: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("http transport failure")]
    Http(#[from] reqwest::Error),
    #[error("disk failure while saving a download")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// The two network capabilities the rest of the crate consumes, kept behind
/// a trait so tests can substitute a scripted double for the real client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request and buffer the complete response.
    async fn issue(&self, request: ApodRequest) -> Result<ResponseParts, TransportError>;

    /// Stream the body at `url` into a fresh temporary file and return its
    /// location. The caller owns the file afterwards.
    async fn download_to_file(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<PathBuf, TransportError>;
}

pub fn request_default_headers() -> HeaderMap {
    let user_agent =
        env::var("APOD_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_owned());
    HeaderMap::from_iter([(
        HeaderName::from_static("user-agent"),
        HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
    )])
}

/// Production transport backed by a shared reqwest client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn issue(&self, request: ApodRequest) -> Result<ResponseParts, TransportError> {
        let response = self
            .client
            .get(request.url)
            .headers(request_default_headers())
            .timeout(request.timeout)
            .send()
            .await?;
        let code = response.status();
        let body = response.bytes().await?.to_vec();
        Ok(ResponseParts { code, body })
    }

    async fn download_to_file(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> Result<PathBuf, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .headers(request_default_headers())
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;

        let path = temp_download_path();
        let mut file = File::create(&path).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        debug!("downloaded {} to {}", url, path.display());
        Ok(path)
    }
}

fn temp_download_path() -> PathBuf {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    env::temp_dir().join(format!("apod-{}", suffix))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_headers_carry_a_user_agent() {
        let headers = request_default_headers();

        assert!(headers.get("user-agent").is_some());
    }

    #[test]
    fn temp_paths_do_not_collide() {
        assert_ne!(temp_download_path(), temp_download_path());
    }
}
