//! Fetch with retry and cache.
//!
//! A [`FetchRequest`] names equivalent mirrors for one payload. Each mirror is
//! tried up to the retry budget before moving on; with [`CachePolicy::CheckETag`]
//! a cached copy is revalidated with `If-None-Match` instead of re-downloaded.

pub mod cache;
pub mod sink;

pub use cache::{CacheEntry, CacheMetadata, CacheRepository};
pub use sink::{BytesSink, FetchSink, FileSink, TextSink};

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::task::{CancelToken, Task, TaskExecutor};
use crate::utils::url_validation::parse_http_url;

/// Whether a fetch consults and fills the local cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    #[default]
    Bypass,
    CheckETag,
}

/// Ordered mirrors, retry budget and cache policy for one payload
#[derive(Debug, Clone)]
pub struct FetchRequest {
    urls: Vec<String>,
    retry: u32,
    cache: CachePolicy,
    cancel: Option<CancelToken>,
}

impl FetchRequest {
    /// Fails with `InvalidUrl` when `urls` is empty or holds a non-http(s) location.
    pub fn new<I, S>(urls: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|u| parse_http_url(u.as_ref()).map(|u| u.to_string()))
            .collect::<AppResult<Vec<_>>>()?;

        if urls.is_empty() {
            return Err(AppError::InvalidUrl("no candidate location given".to_string()));
        }

        Ok(Self {
            urls,
            retry: 1,
            cache: CachePolicy::Bypass,
            cancel: None,
        })
    }

    pub fn single(url: &str) -> AppResult<Self> {
        Self::new([url])
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    /// Checked before every attempt. Without one, the fetcher's token applies.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn retry(&self) -> u32 {
        self.retry
    }

    /// Attempts made against each location. A zero budget still tries once.
    pub fn attempts_per_location(&self) -> u32 {
        self.retry.max(1)
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }
}

/// Runs fetch requests on the task executor
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    cache: Arc<CacheRepository>,
    executor: TaskExecutor,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, cache: Arc<CacheRepository>, executor: TaskExecutor) -> Self {
        Self {
            client,
            cache,
            executor,
            retry_delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Same client and cache; fetches are bound to `cancel`.
    pub fn with_cancel(&self, cancel: CancelToken) -> Self {
        Self {
            executor: self.executor.with_cancel(cancel),
            ..self.clone()
        }
    }

    pub fn cache(&self) -> &Arc<CacheRepository> {
        &self.cache
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    /// Schedule `request`; each attempt accumulates into a fresh sink from `make_sink`.
    pub fn fetch<S, F>(&self, request: FetchRequest, make_sink: F) -> Task<S::Output>
    where
        S: FetchSink + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        let fetcher = match request.cancel_token() {
            Some(cancel) => self.with_cancel(cancel.clone()),
            None => self.clone(),
        };
        let executor = fetcher.executor.clone();
        executor.spawn(async move { fetcher.execute(&request, make_sink).await })
    }

    /// Raw bytes, revalidated against the cache
    pub fn fetch_bytes(&self, url: &str, retry: u32) -> Task<Vec<u8>> {
        match FetchRequest::single(url) {
            Ok(request) => self.fetch(
                request.with_retry(retry).with_cache(CachePolicy::CheckETag),
                BytesSink::new,
            ),
            Err(e) => self.executor.failed(e),
        }
    }

    /// UTF-8 text, single attempt, never cached
    pub fn fetch_text(&self, url: &str) -> Task<String> {
        match FetchRequest::single(url) {
            Ok(request) => self.fetch(request, TextSink::new),
            Err(e) => self.executor.failed(e),
        }
    }

    /// Run `request` to completion on the current task.
    pub async fn execute<S, F>(&self, request: &FetchRequest, make_sink: F) -> AppResult<S::Output>
    where
        S: FetchSink,
        F: Fn() -> S,
    {
        let cancel = request
            .cancel_token()
            .cloned()
            .unwrap_or_else(|| self.executor.cancel_token());
        let attempts = request.attempts_per_location();
        let mut last_error = None;
        let mut first_attempt = true;

        for url in request.urls() {
            for attempt in 1..=attempts {
                cancel.check()?;

                if !first_attempt && !self.retry_delay.is_zero() {
                    tokio::time::sleep(self.retry_delay).await;
                }
                first_attempt = false;

                debug!("Fetching {} (attempt {}/{})", url, attempt, attempts);
                match self.attempt(url, request.cache_policy(), make_sink()).await {
                    Ok(output) => return Ok(output),
                    Err(e) if e.is_retryable() => {
                        warn!("Fetch of {} failed (attempt {}/{}): {}", url, attempt, attempts, e);
                        last_error = Some(e);
                    }
                    Err(e) => return Err(e),
                }
            }
            warn!("Giving up on {} after {} attempts", url, attempts);
        }

        Err(last_error.unwrap_or_else(|| AppError::Network("no attempt was made".to_string())))
    }

    async fn attempt<S: FetchSink>(
        &self,
        url: &str,
        policy: CachePolicy,
        sink: S,
    ) -> AppResult<S::Output> {
        if policy == CachePolicy::Bypass {
            return self.download(url, sink).await;
        }

        let _guard = self.cache.lock(url).await;
        let cached = self.cache.get(url).await.unwrap_or_else(|e| {
            warn!("Ignoring unreadable cache entry for {}: {}", url, e);
            None
        });

        let mut req = self.client.get(url);
        if let Some(entry) = &cached {
            req = req.header(IF_NONE_MATCH, entry.etag.as_str());
        }
        let response = req.send().await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return match cached {
                Some(entry) => {
                    debug!("Cache hit for {} (etag {})", url, entry.etag);
                    sink.use_cached(entry.payload).await
                }
                None => Err(AppError::Network(format!(
                    "{} answered 304 without a cached copy",
                    url
                ))),
            };
        }

        self.stream_body(url, response, sink, true).await
    }

    async fn download<S: FetchSink>(&self, url: &str, sink: S) -> AppResult<S::Output> {
        let response = self.client.get(url).send().await?;
        self.stream_body(url, response, sink, false).await
    }

    async fn stream_body<S: FetchSink>(
        &self,
        url: &str,
        response: reqwest::Response,
        mut sink: S,
        store: bool,
    ) -> AppResult<S::Output> {
        let status = response.status();
        if !status.is_success() {
            sink.on_complete(false).await?;
            return Err(AppError::Network(format!("{} returned HTTP {}", url, status)));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut copy = Vec::new();

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    sink.on_complete(false).await?;
                    return Err(AppError::Network(format!("Transfer of {} broke off: {}", url, e)));
                }
            };
            if let Err(e) = sink.on_bytes(&chunk).await {
                sink.on_complete(false).await?;
                return Err(e);
            }
            if store {
                copy.extend_from_slice(&chunk);
            }
        }

        let output = sink
            .on_complete(true)
            .await?
            .ok_or_else(|| AppError::Network(format!("Transfer of {} produced no result", url)))?;

        if store {
            match etag {
                Some(etag) => {
                    if let Err(e) = self.cache.put(url, &copy, &etag).await {
                        warn!("Failed to cache {}: {}", url, e);
                    }
                }
                None => debug!("{} sent no ETag, not caching", url),
            }
        }

        Ok(output)
    }
}
