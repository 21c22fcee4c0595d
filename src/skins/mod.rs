pub mod assets;
pub mod profile;
pub mod resolver;
pub mod source;
pub mod texture;

use serde::{Deserialize, Serialize};

pub use profile::{JsonCodec, ProfileResponse, SerdeJsonCodec};
pub use resolver::SkinResolver;
pub use source::{SkinSource, SkinSourceKind};
pub use texture::{ImageTextureDecoder, Texture, TextureDecoder};

/// Skin proportions (Steve vs Alex arm width)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TextureModel {
    /// 4px arms, stored as "default"
    #[default]
    #[serde(rename = "default")]
    Steve,
    /// 3px arms, stored as "slim"
    #[serde(rename = "slim")]
    Alex,
}

impl TextureModel {
    pub fn model_name(&self) -> &'static str {
        match self {
            TextureModel::Steve => "default",
            TextureModel::Alex => "slim",
        }
    }

    /// Unknown names fall back to Steve
    pub fn from_model_name(name: &str) -> Self {
        match name {
            "slim" => TextureModel::Alex,
            _ => TextureModel::Steve,
        }
    }
}

impl std::fmt::Display for TextureModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.model_name())
    }
}

/// Result of one resolution. Skin and cape are independently optional.
#[derive(Debug, Clone)]
pub struct LoadedSkin {
    pub model: TextureModel,
    pub skin: Option<Texture>,
    pub cape: Option<Texture>,
}

impl LoadedSkin {
    pub fn new(model: TextureModel, skin: Option<Texture>, cape: Option<Texture>) -> Self {
        Self { model, skin, cape }
    }

    pub fn has_skin(&self) -> bool {
        self.skin.is_some()
    }

    pub fn has_cape(&self) -> bool {
        self.cape.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_names() {
        assert_eq!(TextureModel::Steve.model_name(), "default");
        assert_eq!(TextureModel::Alex.model_name(), "slim");
        assert_eq!(TextureModel::from_model_name("slim"), TextureModel::Alex);
        assert_eq!(TextureModel::from_model_name("default"), TextureModel::Steve);
        assert_eq!(TextureModel::from_model_name("wide"), TextureModel::Steve);
    }

    #[test]
    fn test_model_serde_uses_storage_names() {
        assert_eq!(serde_json::to_string(&TextureModel::Alex).unwrap(), "\"slim\"");
        let model: TextureModel = serde_json::from_str("\"default\"").unwrap();
        assert_eq!(model, TextureModel::Steve);
    }
}
