use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use super::assets::default_skin;
use super::profile::{JsonCodec, ProfileResponse};
use super::texture::{Texture, TextureDecoder};
use super::{LoadedSkin, SkinSource, SkinSourceKind, TextureModel};
use crate::error::{AppError, AppResult};
use crate::fetch::Fetcher;
use crate::task::{all_of, CancelToken, Task, TaskExecutor};
use crate::utils::url_validation::normalize_api_base;

pub const LITTLE_SKIN_API: &str = "http://mcskin.littleservice.cn";
pub const DEFAULT_TEXTURE_RETRY: u32 = 3;

/// Model plus raw skin and cape payloads, in that order
type FetchedTextures = Option<(TextureModel, Vec<Option<Vec<u8>>>)>;

/// Resolves a configured skin source into decoded textures
#[derive(Clone)]
pub struct SkinResolver {
    executor: TaskExecutor,
    fetcher: Fetcher,
    codec: Arc<dyn JsonCodec>,
    decoder: Arc<dyn TextureDecoder>,
    little_skin_api: String,
    texture_retry: u32,
}

impl SkinResolver {
    pub fn new(fetcher: Fetcher, codec: Arc<dyn JsonCodec>, decoder: Arc<dyn TextureDecoder>) -> Self {
        Self {
            executor: fetcher.executor().clone(),
            fetcher,
            codec,
            decoder,
            little_skin_api: LITTLE_SKIN_API.to_string(),
            texture_retry: DEFAULT_TEXTURE_RETRY,
        }
    }

    pub fn with_little_skin_api(mut self, base: impl Into<String>) -> Self {
        self.little_skin_api = base.into();
        self
    }

    pub fn with_texture_retry(mut self, retry: u32) -> Self {
        self.texture_retry = retry;
        self
    }

    /// Resolve `source` for `username`.
    ///
    /// `None` means no skin is configured; the caller picks its own default.
    pub fn load(&self, source: &SkinSource, username: &str) -> Task<Option<LoadedSkin>> {
        self.load_with_cancel(source, username, self.executor.cancel_token().child())
    }

    /// Like [`SkinResolver::load`], with every stage and fetch of this
    /// resolution bound to `cancel`. Other resolutions are unaffected.
    pub fn load_with_cancel(
        &self,
        source: &SkinSource,
        username: &str,
        cancel: CancelToken,
    ) -> Task<Option<LoadedSkin>> {
        self.with_cancel(cancel).dispatch(source, username)
    }

    fn with_cancel(&self, cancel: CancelToken) -> Self {
        Self {
            executor: self.executor.with_cancel(cancel.clone()),
            fetcher: self.fetcher.with_cancel(cancel),
            ..self.clone()
        }
    }

    fn dispatch(&self, source: &SkinSource, username: &str) -> Task<Option<LoadedSkin>> {
        debug!("Resolving {} skin for {}", source.kind(), username);

        match source.kind() {
            SkinSourceKind::Default => self.executor.supply_async(|| Ok(None)),
            SkinSourceKind::Steve => self.load_bundled(TextureModel::Steve),
            SkinSourceKind::Alex => self.load_bundled(TextureModel::Alex),
            SkinSourceKind::LocalFile => self.load_local(source),
            SkinSourceKind::LittleSkin => {
                let base = self.little_skin_api.clone();
                self.load_from_api(&base, source, username)
            }
            SkinSourceKind::CustomApi => match source.csl_api() {
                Some(base) => self.load_from_api(base, source, username),
                None => self.executor.failed(AppError::InvalidUrl(
                    "custom skin API base URL is not configured".to_string(),
                )),
            },
            SkinSourceKind::YggdrasilApi => self.executor.failed(AppError::Unsupported(
                "yggdrasil skin source is not implemented".to_string(),
            )),
        }
    }

    /// Resolve, falling back to the bundled skin for the source's model when
    /// nothing was resolved or resolution failed.
    pub fn load_or_default(&self, source: &SkinSource, username: &str) -> Task<LoadedSkin> {
        let scoped = self.with_cancel(self.executor.cancel_token().child());
        let model = source.texture_model();
        let decoder = self.decoder.clone();
        let pool = scoped.executor.clone();
        let task = scoped.dispatch(source, username);

        scoped.executor.spawn(async move {
            let (model, cape) = match task.join().await {
                Ok(Some(loaded)) if loaded.has_skin() => return Ok(loaded),
                Ok(Some(loaded)) => (loaded.model, loaded.cape),
                Ok(None) => (model, None),
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => {
                    warn!("Skin resolution failed, using bundled {} skin: {}", model, e);
                    (model, None)
                }
            };

            pool.run_blocking(move || {
                let skin = decoder.decode(default_skin(model))?;
                Ok(LoadedSkin::new(model, Some(skin), cape))
            })
            .await
        })
    }

    fn load_bundled(&self, model: TextureModel) -> Task<Option<LoadedSkin>> {
        let decoder = self.decoder.clone();
        self.executor.supply_async(move || {
            let skin = decoder.decode(default_skin(model))?;
            Ok(Some(LoadedSkin::new(model, Some(skin), None)))
        })
    }

    fn load_local(&self, source: &SkinSource) -> Task<Option<LoadedSkin>> {
        let decoder = self.decoder.clone();
        let model = source.texture_model();
        let skin_path = source.local_skin_path().map(str::to_string);
        let cape_path = source.local_cape_path().map(str::to_string);

        self.executor.supply_async(move || {
            let skin = read_local_texture(decoder.as_ref(), skin_path.as_deref())?;
            let cape = read_local_texture(decoder.as_ref(), cape_path.as_deref())?;
            Ok(Some(LoadedSkin::new(model, skin, cape)))
        })
    }

    fn load_from_api(&self, base: &str, source: &SkinSource, username: &str) -> Task<Option<LoadedSkin>> {
        let base = match normalize_api_base(base) {
            Ok(base) => base,
            Err(e) => return self.executor.failed(e),
        };
        let profile_url = format!("{}/{}.json", base, urlencoding::encode(username));

        let executor = self.executor.clone();
        let fetcher = self.fetcher.clone();
        let codec = self.codec.clone();
        let decoder = self.decoder.clone();
        let fallback_model = source.texture_model();
        let retry = self.texture_retry;

        let profile = self.fetcher.fetch_text(&profile_url);
        profile
            .then_compose_async(move |json| -> AppResult<Task<FetchedTextures>> {
                let profile = ProfileResponse::parse(codec.as_ref(), &json)?;
                if !profile.has_skin() {
                    debug!("{} has no skin configured", profile_url);
                    return Ok(executor.completed(None));
                }

                let resolved = profile.resolve(fallback_model);
                let skin = texture_payload(&fetcher, &base, resolved.skin_hash.as_deref(), retry);
                let cape = texture_payload(&fetcher, &base, resolved.cape_hash.as_deref(), retry);
                let model = resolved.model;

                Ok(all_of(&executor, vec![skin, cape])
                    .then_apply_async(move |payloads| Ok(Some((model, payloads)))))
            })
            .then_apply_async(move |fetched| {
                let Some((model, payloads)) = fetched else {
                    return Ok(None);
                };
                let mut payloads = payloads.into_iter();
                let skin = decode_payload(decoder.as_ref(), payloads.next().flatten())?;
                let cape = decode_payload(decoder.as_ref(), payloads.next().flatten())?;
                Ok(Some(LoadedSkin::new(model, skin, cape)))
            })
    }
}

/// Fetch `{base}/textures/{hash}`, or nothing when there is no hash
fn texture_payload(fetcher: &Fetcher, base: &str, hash: Option<&str>, retry: u32) -> Task<Option<Vec<u8>>> {
    let executor = fetcher.executor();
    match hash {
        None => executor.completed(None),
        Some(hash) => {
            let url = format!("{}/textures/{}", base, urlencoding::encode(hash));
            let download = fetcher.fetch_bytes(&url, retry);
            executor.spawn(async move { download.join().await.map(Some) })
        }
    }
}

fn decode_payload(decoder: &dyn TextureDecoder, payload: Option<Vec<u8>>) -> AppResult<Option<Texture>> {
    payload.map(|bytes| decoder.decode(&bytes)).transpose()
}

/// A missing path or file is an absent texture, not an error
fn read_local_texture(decoder: &dyn TextureDecoder, path: Option<&str>) -> AppResult<Option<Texture>> {
    let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    let path = Path::new(path);
    if !path.is_file() {
        debug!("Local texture {} does not exist", path.display());
        return Ok(None);
    }

    let bytes = std::fs::read(path)
        .map_err(|e| AppError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    decoder.decode(&bytes).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::CacheRepository;
    use crate::skins::texture::png_bytes;
    use crate::skins::{ImageTextureDecoder, SerdeJsonCodec};
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn resolver(cache_dir: &Path) -> SkinResolver {
        let executor = TaskExecutor::new(4);
        let cache = Arc::new(CacheRepository::new(cache_dir));
        let fetcher = Fetcher::new(reqwest::Client::new(), cache, executor);
        SkinResolver::new(fetcher, Arc::new(SerdeJsonCodec), Arc::new(ImageTextureDecoder))
    }

    #[tokio::test]
    async fn test_default_is_absent_without_network() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.path_contains("/");
                then.status(200);
            })
            .await;

        let resolver = resolver(dir.path()).with_little_skin_api(server.base_url());
        let result = resolver
            .load(&SkinSource::new(SkinSourceKind::Default), "Kai")
            .join()
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(any.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_bundled_models() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(dir.path());

        for (kind, model) in [
            (SkinSourceKind::Steve, TextureModel::Steve),
            (SkinSourceKind::Alex, TextureModel::Alex),
        ] {
            let loaded = resolver.load(&SkinSource::new(kind), "Kai").join().await.unwrap().unwrap();
            assert_eq!(loaded.model, model);
            assert!(loaded.has_skin());
            assert!(!loaded.has_cape());
        }
    }

    #[tokio::test]
    async fn test_local_file_tolerates_missing_cape() {
        let dir = TempDir::new().unwrap();
        let skin_path = dir.path().join("skin.png");
        std::fs::write(&skin_path, png_bytes(64, 64)).unwrap();
        let cape_path = dir.path().join("missing-cape.png");

        let source = SkinSource::local_file(
            Some(skin_path.to_string_lossy().into_owned()),
            Some(cape_path.to_string_lossy().into_owned()),
        )
        .with_texture_model(TextureModel::Alex);

        let loaded = resolver(dir.path()).load(&source, "Kai").join().await.unwrap().unwrap();
        assert_eq!(loaded.model, TextureModel::Alex);
        assert!(loaded.has_skin());
        assert!(!loaded.has_cape());
    }

    #[tokio::test]
    async fn test_local_file_without_paths() {
        let dir = TempDir::new().unwrap();
        let source = SkinSource::local_file(None, Some("   ".to_string()));
        let loaded = resolver(dir.path()).load(&source, "Kai").join().await.unwrap().unwrap();
        assert_eq!(loaded.model, TextureModel::Steve);
        assert!(loaded.skin.is_none() && loaded.cape.is_none());
    }

    #[tokio::test]
    async fn test_local_file_corrupt_image_fails() {
        let dir = TempDir::new().unwrap();
        let skin_path = dir.path().join("skin.png");
        std::fs::write(&skin_path, b"not an image").unwrap();

        let source = SkinSource::local_file(Some(skin_path.to_string_lossy().into_owned()), None);
        let result = resolver(dir.path()).load(&source, "Kai").join().await;
        assert!(matches!(result, Err(AppError::Decode(_))));
    }

    #[tokio::test]
    async fn test_yggdrasil_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let result = resolver(dir.path())
            .load(&SkinSource::new(SkinSourceKind::YggdrasilApi), "Kai")
            .join()
            .await;
        assert!(matches!(result, Err(AppError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_custom_api_requires_base() {
        let dir = TempDir::new().unwrap();
        let result = resolver(dir.path())
            .load(&SkinSource::new(SkinSourceKind::CustomApi), "Kai")
            .join()
            .await;
        assert!(matches!(result, Err(AppError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_cancelled_resolution_leaves_others_running() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(dir.path());
        let cancel = CancelToken::new();
        cancel.cancel();

        let cancelled = resolver
            .load_with_cancel(&SkinSource::new(SkinSourceKind::Steve), "Kai", cancel)
            .join()
            .await;
        assert!(matches!(cancelled, Err(AppError::Cancelled)));

        let other = resolver
            .load(&SkinSource::new(SkinSourceKind::Steve), "Other")
            .join()
            .await
            .unwrap()
            .unwrap();
        assert!(other.has_skin());
    }

    #[tokio::test]
    async fn test_cancelled_api_resolution_makes_no_request() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.path_contains("/");
                then.status(200).body(r#"{"username":"Kai","skin":"H"}"#);
            })
            .await;

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = resolver(dir.path())
            .with_little_skin_api(server.base_url())
            .load_with_cancel(&SkinSource::new(SkinSourceKind::LittleSkin), "Kai", cancel)
            .join()
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(any.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_load_or_default_falls_back_on_error() {
        let dir = TempDir::new().unwrap();
        let source = SkinSource::new(SkinSourceKind::YggdrasilApi).with_texture_model(TextureModel::Alex);
        let loaded = resolver(dir.path()).load_or_default(&source, "Kai").join().await.unwrap();
        assert_eq!(loaded.model, TextureModel::Alex);
        assert!(loaded.has_skin());
    }

    #[tokio::test]
    async fn test_load_or_default_fills_default_source() {
        let dir = TempDir::new().unwrap();
        let loaded = resolver(dir.path())
            .load_or_default(&SkinSource::default(), "Kai")
            .join()
            .await
            .unwrap();
        assert_eq!(loaded.model, TextureModel::Steve);
        assert!(loaded.has_skin());
    }
}
