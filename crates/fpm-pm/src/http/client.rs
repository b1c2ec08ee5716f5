//! HTTP client for registry and tarball traffic.
//!
//! A thin wrapper around `reqwest` that adds:
//! - a package-manager User-Agent and gzip transfer encoding
//! - optional request/connect timeouts (none by default, a stalled read blocks)
//! - streaming downloads that hash the body while writing it to disk
//!
//! Every request is a single attempt; non-success statuses are reported as
//! [`HttpError::HttpStatus`] and never retried.
//!
//! # Examples
//!
//! ```no_run
//! use fpm_pm::http::{HttpClient, HttpClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::with_config(
//!     HttpClientConfig::new().with_timeout(Duration::from_secs(60)),
//! )?;
//!
//! let digest = client
//!     .download_hashed(
//!         "https://registry.npmjs.org/lodash/-/lodash-4.17.21.tgz",
//!         "/tmp/lodash.tgz".as_ref(),
//!     )
//!     .await?;
//! println!("sha1 {}", digest);
//! # Ok(())
//! # }
//! ```

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::FpmError;

pub const DEFAULT_USER_AGENT: &str = concat!("fpm/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<HttpError> for FpmError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Request(e) => FpmError::Network(e),
            HttpError::HttpStatus { status, url } => FpmError::Upstream { url, status },
            HttpError::Io(e) => FpmError::Io(e),
            HttpError::JsonParse(e) => FpmError::JsonParse(e),
        }
    }
}

pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().gzip(true).user_agent(&config.user_agent);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            user_agent: config.user_agent,
        })
    }

    /// Perform a GET request
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.get_with_accept(url, "*/*").await
    }

    /// Perform a GET request with an explicit Accept header
    pub async fn get_with_accept(&self, url: &str, accept: &str) -> Result<Response, HttpError> {
        log::debug!("HTTP GET {}", url);
        let start = Instant::now();

        let response = self.client.get(url).header(ACCEPT, accept).send().await?;
        let status = response.status();
        log::debug!("HTTP {} {} in {:?}", status.as_u16(), url, start.elapsed());

        if !status.is_success() {
            return Err(HttpError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// GET JSON and deserialize
    pub async fn get_json_with_accept<T: DeserializeOwned>(
        &self,
        url: &str,
        accept: &str,
    ) -> Result<T, HttpError> {
        let response = self.get_with_accept(url, accept).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Stream a download to `dest`, hashing it on the way, and return the
    /// lowercase hex SHA-1 of the body. The body is never held in memory whole.
    pub async fn download_hashed(&self, url: &str, dest: &Path) -> Result<String, HttpError> {
        let response = self.get(url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(dest).await?;
        let mut hasher = Sha1::new();
        let mut downloaded: u64 = 0;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }

        file.flush().await?;
        log::trace!("Downloaded {} bytes from {}", downloaded, url);

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Get the configured user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}
