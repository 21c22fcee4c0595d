use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};

/// Accumulates a response body and turns it into the fetch result.
///
/// A fresh sink is created for every attempt, so an implementation only ever
/// sees the bytes of one response.
#[async_trait]
pub trait FetchSink: Send + Sized {
    type Output: Send + 'static;

    async fn on_bytes(&mut self, chunk: &[u8]) -> AppResult<()>;

    /// Called once the body has ended. `success` is false when the transfer
    /// broke off; the sink should release what it holds and return `None`.
    async fn on_complete(self, success: bool) -> AppResult<Option<Self::Output>>;

    /// Produce the result from a cached payload the server confirmed unchanged.
    async fn use_cached(mut self, payload: Vec<u8>) -> AppResult<Self::Output> {
        self.on_bytes(&payload).await?;
        self.on_complete(true)
            .await?
            .ok_or_else(|| AppError::Io("sink produced no result from cached payload".to_string()))
    }
}

/// Collects the body in memory.
#[derive(Debug, Default)]
pub struct BytesSink {
    buffer: Vec<u8>,
}

impl BytesSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FetchSink for BytesSink {
    type Output = Vec<u8>;

    async fn on_bytes(&mut self, chunk: &[u8]) -> AppResult<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn on_complete(self, success: bool) -> AppResult<Option<Vec<u8>>> {
        Ok(success.then_some(self.buffer))
    }

    async fn use_cached(self, payload: Vec<u8>) -> AppResult<Vec<u8>> {
        Ok(payload)
    }
}

/// Collects the body as UTF-8 text.
#[derive(Debug, Default)]
pub struct TextSink {
    buffer: Vec<u8>,
}

impl TextSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FetchSink for TextSink {
    type Output = String;

    async fn on_bytes(&mut self, chunk: &[u8]) -> AppResult<()> {
        self.buffer.extend_from_slice(chunk);
        Ok(())
    }

    async fn on_complete(self, success: bool) -> AppResult<Option<String>> {
        if !success {
            return Ok(None);
        }
        String::from_utf8(self.buffer)
            .map(Some)
            .map_err(|e| AppError::Parse(format!("Response is not valid UTF-8: {}", e)))
    }
}

/// Streams the body into a file. A partial file is removed on failure.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<fs::File>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    async fn open(&mut self) -> AppResult<&mut fs::File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::Io(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
            let file = fs::File::create(&self.path).await.map_err(|e| {
                AppError::Io(format!("Failed to create {}: {}", self.path.display(), e))
            })?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| AppError::Io("file sink is not open".to_string()))
    }
}

#[async_trait]
impl FetchSink for FileSink {
    type Output = PathBuf;

    async fn on_bytes(&mut self, chunk: &[u8]) -> AppResult<()> {
        let path = self.path.clone();
        let file = self.open().await?;
        file.write_all(chunk)
            .await
            .map_err(|e| AppError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    async fn on_complete(mut self, success: bool) -> AppResult<Option<PathBuf>> {
        if !success {
            // Drop the handle before removing the file
            self.file.take();
            fs::remove_file(&self.path).await.ok();
            return Ok(None);
        }

        // An empty body never opened the file
        self.open().await?;
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| AppError::Io(format!("Failed to flush {}: {}", self.path.display(), e)))?;
        }
        Ok(Some(self.path))
    }
}
