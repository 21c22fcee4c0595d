use std::io::Cursor;
use std::sync::Arc;

use httpmock::prelude::*;
use image::{DynamicImage, ImageFormat, RgbaImage};
use tempfile::TempDir;

use kaizen_skins_lib::fetch::{CacheRepository, Fetcher};
use kaizen_skins_lib::skins::{ImageTextureDecoder, SerdeJsonCodec};
use kaizen_skins_lib::{AppError, SkinResolver, SkinSource, SkinSourceKind, TaskExecutor, TextureModel};

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, image::Rgba([90, 60, 40, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn resolver(cache_dir: &std::path::Path) -> SkinResolver {
    let executor = TaskExecutor::new(4);
    let cache = Arc::new(CacheRepository::new(cache_dir));
    let fetcher = Fetcher::new(reqwest::Client::new(), cache, executor);
    SkinResolver::new(fetcher, Arc::new(SerdeJsonCodec), Arc::new(ImageTextureDecoder))
}

/// Trailing slash on purpose, the resolver normalizes it away
fn custom_source(server: &MockServer) -> SkinSource {
    SkinSource::custom_api(format!("{}/", server.base_url()))
}

#[tokio::test]
async fn test_slim_profile_resolves_alex() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/Kai.json");
            then.status(200)
                .header("Content-Type", "application/json")
                .body(r#"{"username":"Kai","textures":{"slim":"H1"}}"#);
        })
        .await;
    let texture = server
        .mock_async(|when, then| {
            when.path("/textures/H1");
            then.status(200).body(png(64, 64));
        })
        .await;

    let loaded = resolver(dir.path())
        .load(&custom_source(&server), "Kai")
        .join()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded.model, TextureModel::Alex);
    let skin = loaded.skin.unwrap();
    assert_eq!((skin.width(), skin.height()), (64, 64));
    assert!(loaded.cape.is_none());
    texture.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_flat_profile_uses_source_model() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/Kai.json");
            then.status(200).body(r#"{"username":"Kai","skin":"H2","cape":"C2"}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.path("/textures/H2");
            then.status(200).body(png(64, 32));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.path("/textures/C2");
            then.status(200).body(png(64, 32));
        })
        .await;

    let source = custom_source(&server).with_texture_model(TextureModel::Alex);
    let loaded = resolver(dir.path()).load(&source, "Kai").join().await.unwrap().unwrap();

    assert_eq!(loaded.model, TextureModel::Alex);
    assert_eq!(loaded.skin.as_ref().unwrap().height(), 32);
    assert!(loaded.has_cape());
}

#[tokio::test]
async fn test_blank_username_is_absent() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/Kai.json");
            then.status(200).body(r#"{"username":"","skin":"H2"}"#);
        })
        .await;
    let textures = server
        .mock_async(|when, then| {
            when.path_contains("/textures/");
            then.status(200).body(png(64, 64));
        })
        .await;

    let result = resolver(dir.path())
        .load(&custom_source(&server), "Kai")
        .join()
        .await
        .unwrap();

    assert!(result.is_none());
    textures.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_missing_cape_hash_skips_download() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/Kai.json");
            then.status(200).body(r#"{"username":"Kai","skin":"H2","cape":null}"#);
        })
        .await;
    let textures = server
        .mock_async(|when, then| {
            when.path_contains("/textures/");
            then.status(200).body(png(64, 64));
        })
        .await;

    let loaded = resolver(dir.path())
        .load(&custom_source(&server), "Kai")
        .join()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded.model, TextureModel::Steve);
    assert!(loaded.has_skin());
    assert!(!loaded.has_cape());
    textures.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_failed_texture_fails_resolution() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/Kai.json");
            then.status(200).body(r#"{"username":"Kai","skin":"H2"}"#);
        })
        .await;
    let broken = server
        .mock_async(|when, then| {
            when.path("/textures/H2");
            then.status(500);
        })
        .await;

    let result = resolver(dir.path())
        .with_texture_retry(3)
        .load(&custom_source(&server), "Kai")
        .join()
        .await;

    assert!(matches!(result, Err(AppError::Network(_))));
    broken.assert_hits_async(3).await;
}

#[tokio::test]
async fn test_malformed_profile_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/Kai.json");
            then.status(200).body("{\"username\": \"Kai\",");
        })
        .await;

    let result = resolver(dir.path())
        .load(&custom_source(&server), "Kai")
        .join()
        .await;
    assert!(matches!(result, Err(AppError::Parse(_))));
}

#[tokio::test]
async fn test_missing_profile_is_network_error() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let profile = server
        .mock_async(|when, then| {
            when.path("/Kai.json");
            then.status(404);
        })
        .await;

    let result = resolver(dir.path())
        .load(&custom_source(&server), "Kai")
        .join()
        .await;
    assert!(matches!(result, Err(AppError::Network(_))));
    profile.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_little_skin_uses_configured_base() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let profile = server
        .mock_async(|when, then| {
            when.path("/Kai.json");
            then.status(200).body(r#"{"username":"Kai","skins":{"default":"H0"}}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.path("/textures/H0");
            then.status(200).body(png(64, 64));
        })
        .await;

    let loaded = resolver(dir.path())
        .with_little_skin_api(server.base_url())
        .load(&SkinSource::new(SkinSourceKind::LittleSkin), "Kai")
        .join()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded.model, TextureModel::Steve);
    assert!(loaded.has_skin());
    profile.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_load_or_default_keeps_api_cape() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.path("/Kai.json");
            then.status(200).body(r#"{"username":"Kai","textures":{"cape":"C1"}}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.path("/textures/C1");
            then.status(200).body(png(64, 32));
        })
        .await;

    let source = custom_source(&server).with_texture_model(TextureModel::Alex);
    let loaded = resolver(dir.path())
        .load_or_default(&source, "Kai")
        .join()
        .await
        .unwrap();

    assert_eq!(loaded.model, TextureModel::Alex);
    assert!(loaded.has_skin());
    assert!(loaded.has_cape());
}
