//! Skin-profile JSON served by CustomSkinLoader-compatible APIs
//! (`GET {base}/{username}.json`).

use serde::Deserialize;
use serde_json::Value;

use super::TextureModel;
use crate::error::{AppError, AppResult};

/// Text to JSON tree. Passed explicitly to the profile parser.
pub trait JsonCodec: Send + Sync {
    fn parse(&self, text: &str) -> AppResult<Value>;
}

/// `serde_json` backed codec
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn parse(&self, text: &str) -> AppResult<Value> {
        serde_json::from_str(text).map_err(|e| AppError::Parse(format!("Invalid profile JSON: {}", e)))
    }
}

/// Nested texture hashes
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TextureSet {
    #[serde(rename = "default")]
    pub default_skin: Option<String>,
    pub slim: Option<String>,
    pub cape: Option<String>,
    pub elytra: Option<String>,
}

/// Profile document. Older APIs use the flat `skin`/`cape` fields, newer
/// ones a `textures` (or `skins`) object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileResponse {
    pub username: Option<String>,
    pub skin: Option<String>,
    pub cape: Option<String>,
    pub elytra: Option<String>,
    pub textures: Option<TextureSet>,
}

#[derive(Deserialize)]
struct RawProfile {
    username: Option<String>,
    skin: Option<String>,
    cape: Option<String>,
    elytra: Option<String>,
    textures: Option<TextureSet>,
    skins: Option<TextureSet>,
}

/// Model and texture hashes after applying the schema fallbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub model: TextureModel,
    pub skin_hash: Option<String>,
    pub cape_hash: Option<String>,
}

impl ProfileResponse {
    /// When both `textures` and `skins` are present, the one written last wins.
    pub fn parse(codec: &dyn JsonCodec, text: &str) -> AppResult<Self> {
        let value = codec.parse(text)?;
        let skins_last = value
            .as_object()
            .and_then(|map| map.keys().rev().find(|k| *k == "textures" || *k == "skins"))
            .is_some_and(|key| key == "skins");

        let raw: RawProfile = serde_json::from_value(value)
            .map_err(|e| AppError::Parse(format!("Unexpected profile schema: {}", e)))?;

        Ok(Self {
            username: raw.username,
            skin: raw.skin,
            cape: raw.cape,
            elytra: raw.elytra,
            textures: if skins_last { raw.skins } else { raw.textures },
        })
    }

    /// A blank or missing username means the API has no skin for this player
    pub fn has_skin(&self) -> bool {
        self.username
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    }

    /// Model named by the nested textures, if any
    pub fn model(&self) -> Option<TextureModel> {
        let textures = self.textures.as_ref()?;
        if textures.slim.is_some() {
            Some(TextureModel::Alex)
        } else if textures.default_skin.is_some() {
            Some(TextureModel::Steve)
        } else {
            None
        }
    }

    pub fn skin_hash(&self) -> Option<&str> {
        let nested = self.textures.as_ref().and_then(|t| match self.model() {
            Some(TextureModel::Alex) => t.slim.as_deref(),
            Some(TextureModel::Steve) => t.default_skin.as_deref(),
            None => None,
        });
        nested.or(self.skin.as_deref())
    }

    pub fn cape_hash(&self) -> Option<&str> {
        self.textures
            .as_ref()
            .and_then(|t| t.cape.as_deref())
            .or(self.cape.as_deref())
    }

    /// Apply the fallbacks; `fallback_model` is used when the profile names none.
    pub fn resolve(&self, fallback_model: TextureModel) -> ResolvedProfile {
        ResolvedProfile {
            model: self.model().unwrap_or(fallback_model),
            skin_hash: self.skin_hash().map(str::to_string),
            cape_hash: self.cape_hash().map(str::to_string),
        }
    }
}
