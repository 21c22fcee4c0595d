use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::fetch::{CacheRepository, Fetcher};
use crate::skins::{ImageTextureDecoder, SerdeJsonCodec, SkinResolver};
use crate::task::TaskExecutor;

/// Shared services built from a `LoaderConfig`
pub struct AppState {
    pub config: LoaderConfig,
    pub http_client: reqwest::Client,
    pub executor: TaskExecutor,
    pub cache: Arc<CacheRepository>,
    pub fetcher: Fetcher,
    pub resolver: SkinResolver,
}

impl AppState {
    /// Must be called from inside a tokio runtime.
    pub async fn new(config: LoaderConfig) -> anyhow::Result<Self> {
        // Ensure data directory exists
        std::fs::create_dir_all(&config.data_dir)?;

        let cache = Arc::new(CacheRepository::new(config.cache_dir()));
        cache
            .init()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize skin cache: {}", e))?;

        // Create HTTP client with timeouts to prevent hanging requests
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        let executor = TaskExecutor::new(config.max_workers);
        let fetcher = Fetcher::new(http_client.clone(), cache.clone(), executor.clone())
            .with_retry_delay(config.retry_delay());
        let resolver = SkinResolver::new(
            fetcher.clone(),
            Arc::new(SerdeJsonCodec),
            Arc::new(ImageTextureDecoder),
        )
        .with_little_skin_api(config.little_skin_api.clone())
        .with_texture_retry(config.texture_retry);

        tracing::debug!(
            "State ready: {} workers, cache at {}",
            executor.max_workers(),
            cache.root().display()
        );

        Ok(Self {
            config,
            http_client,
            executor,
            cache,
            fetcher,
            resolver,
        })
    }
}
