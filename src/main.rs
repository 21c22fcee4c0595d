use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use kaizen_skins_lib::logging::init_logging;
use kaizen_skins_lib::skins::Texture;
use kaizen_skins_lib::{AppState, LoaderConfig, SkinSource, SkinSourceKind, TextureModel};

/// Resolve a player's skin and cape
#[derive(Parser, Debug)]
#[command(name = "kaizen-skins", version, about)]
struct Cli {
    /// Player name
    #[arg(short, long)]
    username: String,

    /// Source type: default, steve, alex, local_file, little_skin,
    /// custom_skin_loader_api, yggdrasil_api
    #[arg(short, long, default_value = "default")]
    source: String,

    /// Base URL for the custom skin API
    #[arg(long)]
    api: Option<String>,

    /// Texture model hint: default or slim
    #[arg(short, long, default_value = "default")]
    model: String,

    /// Local skin file
    #[arg(long)]
    skin: Option<String>,

    /// Local cape file
    #[arg(long)]
    cape: Option<String>,

    /// Config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the bundled skin when nothing resolves
    #[arg(long)]
    fallback: bool,
}

fn describe(label: &str, texture: Option<&Texture>) {
    match texture {
        Some(t) => println!("{}: {}x{}", label, t.width(), t.height()),
        None => println!("{}: none", label),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LoaderConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LoaderConfig::default(),
    };
    let _guard = init_logging(&config.logging);

    let kind = SkinSourceKind::from_storage_name(&cli.source)
        .with_context(|| format!("Unknown skin source '{}'", cli.source))?;
    let mut source = SkinSource::new(kind)
        .with_texture_model(TextureModel::from_model_name(&cli.model))
        .with_local_paths(cli.skin.clone(), cli.cape.clone());
    if let Some(api) = &cli.api {
        source = source.with_csl_api(api.as_str());
    }

    let state = AppState::new(config).await?;

    let loaded = if cli.fallback {
        Some(state.resolver.load_or_default(&source, &cli.username).join().await?)
    } else {
        state.resolver.load(&source, &cli.username).join().await?
    };

    match loaded {
        Some(skin) => {
            println!("model: {}", skin.model);
            describe("skin", skin.skin.as_ref());
            describe("cape", skin.cape.as_ref());
        }
        None => println!("No skin configured for {}", cli.username),
    }

    Ok(())
}
