use super::TextureModel;

const STEVE_PNG: &[u8] = include_bytes!("../../assets/steve.png");
const ALEX_PNG: &[u8] = include_bytes!("../../assets/alex.png");

/// Bundled default skin for `model`
pub fn default_skin(model: TextureModel) -> &'static [u8] {
    match model {
        TextureModel::Steve => STEVE_PNG,
        TextureModel::Alex => ALEX_PNG,
    }
}
