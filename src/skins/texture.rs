use image::RgbaImage;

use crate::error::{AppError, AppResult};

/// Decoded texture in RGBA8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    image: RgbaImage,
}

impl Texture {
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.image
    }
}

/// Turns raw image bytes into a texture for rendering.
pub trait TextureDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> AppResult<Texture>;
}

/// Decoder backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTextureDecoder;

impl TextureDecoder for ImageTextureDecoder {
    fn decode(&self, bytes: &[u8]) -> AppResult<Texture> {
        if bytes.is_empty() {
            return Err(AppError::Decode("empty texture payload".to_string()));
        }
        let image = image::load_from_memory(bytes)
            .map_err(|e| AppError::Decode(format!("failed to decode image: {}", e)))?
            .to_rgba8();
        Ok(Texture::from_rgba(image))
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, image::Rgba([180, 132, 108, 255]));
    let mut buffer = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("encode test png");
    buffer.into_inner()
}
