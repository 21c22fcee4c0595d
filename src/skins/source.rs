//! Configured skin source and its persisted key-value form.

use serde_json::{Map, Value};

use super::TextureModel;

/// Where a player's skin comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SkinSourceKind {
    /// No skin, the renderer picks its own default
    #[default]
    Default,
    Steve,
    Alex,
    LocalFile,
    LittleSkin,
    CustomApi,
    YggdrasilApi,
}

impl SkinSourceKind {
    pub const ALL: [SkinSourceKind; 7] = [
        SkinSourceKind::Default,
        SkinSourceKind::Steve,
        SkinSourceKind::Alex,
        SkinSourceKind::LocalFile,
        SkinSourceKind::LittleSkin,
        SkinSourceKind::CustomApi,
        SkinSourceKind::YggdrasilApi,
    ];

    pub fn storage_name(&self) -> &'static str {
        match self {
            SkinSourceKind::Default => "default",
            SkinSourceKind::Steve => "steve",
            SkinSourceKind::Alex => "alex",
            SkinSourceKind::LocalFile => "local_file",
            SkinSourceKind::LittleSkin => "little_skin",
            SkinSourceKind::CustomApi => "custom_skin_loader_api",
            SkinSourceKind::YggdrasilApi => "yggdrasil_api",
        }
    }

    pub fn from_storage_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(SkinSourceKind::Default),
            "steve" => Some(SkinSourceKind::Steve),
            "alex" => Some(SkinSourceKind::Alex),
            "local_file" => Some(SkinSourceKind::LocalFile),
            "little_skin" => Some(SkinSourceKind::LittleSkin),
            "custom_skin_loader_api" | "custom_api" => Some(SkinSourceKind::CustomApi),
            "yggdrasil_api" => Some(SkinSourceKind::YggdrasilApi),
            _ => None,
        }
    }
}

impl std::fmt::Display for SkinSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_name())
    }
}

/// Immutable skin source description.
///
/// Only the fields relevant to `kind` are used when resolving; the others are
/// kept so that saving writes back what was loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SkinSource {
    kind: SkinSourceKind,
    csl_api: Option<String>,
    texture_model: TextureModel,
    local_skin_path: Option<String>,
    local_cape_path: Option<String>,
}

impl SkinSource {
    pub fn new(kind: SkinSourceKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn custom_api(base: impl Into<String>) -> Self {
        Self::new(SkinSourceKind::CustomApi).with_csl_api(base)
    }

    pub fn local_file(skin: Option<String>, cape: Option<String>) -> Self {
        Self::new(SkinSourceKind::LocalFile).with_local_paths(skin, cape)
    }

    pub fn with_csl_api(mut self, base: impl Into<String>) -> Self {
        self.csl_api = Some(base.into());
        self
    }

    pub fn with_texture_model(mut self, model: TextureModel) -> Self {
        self.texture_model = model;
        self
    }

    pub fn with_local_paths(mut self, skin: Option<String>, cape: Option<String>) -> Self {
        self.local_skin_path = skin;
        self.local_cape_path = cape;
        self
    }

    pub fn kind(&self) -> SkinSourceKind {
        self.kind
    }

    pub fn csl_api(&self) -> Option<&str> {
        self.csl_api.as_deref()
    }

    /// Model hint, also the fallback when an API profile names no model
    pub fn texture_model(&self) -> TextureModel {
        self.texture_model
    }

    pub fn local_skin_path(&self) -> Option<&str> {
        self.local_skin_path.as_deref()
    }

    pub fn local_cape_path(&self) -> Option<&str> {
        self.local_cape_path.as_deref()
    }

    /// Persisted key-value form
    pub fn to_storage(&self) -> Map<String, Value> {
        let optional = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);

        let mut map = Map::new();
        map.insert("type".into(), Value::String(self.kind.storage_name().into()));
        map.insert("cslApi".into(), optional(&self.csl_api));
        map.insert(
            "textureModel".into(),
            Value::String(self.texture_model.model_name().into()),
        );
        map.insert("localSkinPath".into(), optional(&self.local_skin_path));
        map.insert("localCapePath".into(), optional(&self.local_cape_path));
        map
    }

    /// Load the persisted form. Unknown or missing `type` means `Default`,
    /// an unknown `textureModel` means Steve, and non-string values count as
    /// absent. Returns `None` when `storage` is not an object.
    pub fn from_storage(storage: &Value) -> Option<Self> {
        let map = storage.as_object()?;
        let string = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

        let kind = string("type")
            .and_then(|t| SkinSourceKind::from_storage_name(&t))
            .unwrap_or_default();
        let texture_model = string("textureModel")
            .map(|m| TextureModel::from_model_name(&m))
            .unwrap_or_default();

        Some(Self {
            kind,
            csl_api: string("cslApi"),
            texture_model,
            local_skin_path: string("localSkinPath"),
            local_cape_path: string("localCapePath"),
        })
    }
}
