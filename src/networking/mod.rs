use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, LAST_MODIFIED};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::util::format_speed;

const CHUNK_SIZE: usize = 8 * 1024;

/// Why a probe or fetch did not produce a file. Only `Timeout` is retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("bad response status: {0}")]
    Status(String),
    #[error("write error: {0}")]
    Io(String),
    #[error("gave up after {attempts} timed out attempts")]
    Exhausted { attempts: u32 },
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        // A connect timeout means the host never answered; treat it as unreachable.
        if err.is_connect() {
            FetchError::Connection(err.to_string())
        } else if err.is_timeout() {
            FetchError::Timeout(err.to_string())
        } else if err.is_status() {
            FetchError::Status(err.to_string())
        } else {
            FetchError::Connection(err.to_string())
        }
    }
}

/// Metadata learned from a HEAD request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteProbe {
    pub content_length: Option<u64>,
    pub last_modified: Option<String>,
}

/// Called with (bytes written so far, expected total).
pub type ProgressFn<'a> = &'a mut (dyn FnMut(u64, Option<u64>) + Send);

/// Where assets come from. The pipeline only talks to remotes through this.
pub trait AssetSource {
    async fn probe(&self, url: &str) -> Result<RemoteProbe, FetchError>;

    /// Stream `url` into `dest`, returning the number of bytes written.
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected_size: Option<u64>,
        progress: ProgressFn<'_>,
    ) -> Result<u64, FetchError>;
}

/// Bounded retry with linear backoff: attempt `i` waits `backoff_unit * (i + 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_unit: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_unit,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff_unit * (attempt + 1)
    }

    /// Sleep after a timed out `attempt` unless it was the last one.
    async fn pause(&self, label: &str, attempt: u32, reason: &str) {
        if attempt + 1 >= self.attempts {
            warn!("{label}: request timed out ({reason}); no attempts left");
            return;
        }
        let wait = self.delay(attempt);
        warn!(
            "{label}: request timed out ({reason}); retrying in {:.1}s",
            wait.as_secs_f32()
        );
        tokio::time::sleep(wait).await;
    }
}

/// Run `op` until it stops timing out or the policy runs out of attempts.
pub async fn retry_on_timeout<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    for attempt in 0..policy.attempts {
        match op().await {
            Err(FetchError::Timeout(reason)) => policy.pause(label, attempt, &reason).await,
            other => return other,
        }
    }
    Err(FetchError::Exhausted {
        attempts: policy.attempts,
    })
}

/// HTTP-backed asset source.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    retry: RetryPolicy,
}

impl Downloader {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(concat!("gen7-deps/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                warn!("downloader: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client, retry }
    }

    async fn head_once(&self, url: &str) -> Result<RemoteProbe, FetchError> {
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;
        if !resp.status().is_success() {
            debug!("HEAD {url} returned {}; no remote metadata", resp.status());
            return Ok(RemoteProbe::default());
        }
        let headers = resp.headers();
        Ok(RemoteProbe {
            content_length: headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
            last_modified: headers
                .get(LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        })
    }

    async fn stream_once(
        &self,
        url: &str,
        dest: &Path,
        expected_size: Option<u64>,
        progress: ProgressFn<'_>,
    ) -> Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?
            .error_for_status()
            .map_err(FetchError::from_reqwest)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::Io(format!("failed to create download dir: {e}")))?;
        }
        let file = File::create(dest)
            .await
            .map_err(|e| FetchError::Io(format!("failed to create file: {e}")))?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);

        let total = response.content_length().or(expected_size);
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let started = Instant::now();
        progress(0, total);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FetchError::from_reqwest)?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| FetchError::Io(e.to_string()))?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total);
        }

        writer
            .flush()
            .await
            .map_err(|e| FetchError::Io(format!("flush error: {e}")))?;

        let elapsed = started.elapsed().as_secs_f32();
        let speed = if elapsed > 0.0 {
            downloaded as f32 / elapsed
        } else {
            0.0
        };
        debug!(
            "GET {url}: {downloaded} bytes in {elapsed:.1}s ({})",
            format_speed(speed)
        );
        Ok(downloaded)
    }
}

impl AssetSource for Downloader {
    async fn probe(&self, url: &str) -> Result<RemoteProbe, FetchError> {
        retry_on_timeout(self.retry, url, || self.head_once(url)).await
    }

    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected_size: Option<u64>,
        progress: ProgressFn<'_>,
    ) -> Result<u64, FetchError> {
        for attempt in 0..self.retry.attempts {
            match self.stream_once(url, dest, expected_size, &mut *progress).await {
                Err(FetchError::Timeout(reason)) => self.retry.pause(url, attempt, &reason).await,
                other => return other,
            }
        }
        Err(FetchError::Exhausted {
            attempts: self.retry.attempts,
        })
    }
}
