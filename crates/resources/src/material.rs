//! Materials and texture pixel data.
//!
//! Only the parts the G-buffer stores are kept: the base colour (factor and
//! optional texture) feeds the diffuse channel and a scalar specular
//! intensity, derived from glTF roughness, feeds its alpha.

use glam::Vec4;
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage};

use crate::error::{ResourceError, ResourceResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub base_color_factor: Vec4,
    /// In [0, 1]; written to the G-buffer's specular channel.
    pub specular: f32,
    /// Index into [`crate::Model::textures`].
    pub base_color_texture: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color_factor: Vec4::ONE,
            specular: 0.5,
            base_color_texture: None,
        }
    }
}

impl Material {
    pub fn from_gltf(material: &gltf::Material<'_>) -> Self {
        let pbr = material.pbr_metallic_roughness();
        Self {
            base_color_factor: Vec4::from_array(pbr.base_color_factor()),
            specular: specular_from_roughness(pbr.roughness_factor()),
            base_color_texture: pbr
                .base_color_texture()
                .map(|info| info.texture().source().index()),
        }
    }
}

/// Smooth surfaces read as shiny: `1 - roughness`, clamped.
pub fn specular_from_roughness(roughness: f32) -> f32 {
    (1.0 - roughness).clamp(0.0, 1.0)
}

/// Tightly packed RGBA8 pixels, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        }
    }

    /// Converts decoded glTF image data to RGBA8. 16-bit and float images
    /// are rejected.
    pub fn from_gltf(index: usize, data: &gltf::image::Data) -> ResourceResult<Self> {
        use gltf::image::Format;

        let (width, height) = (data.width, data.height);
        let channels = match data.format {
            Format::R8 => 1,
            Format::R8G8 => 2,
            Format::R8G8B8 => 3,
            Format::R8G8B8A8 => 4,
            format => return Err(ResourceError::UnsupportedTextureFormat { index, format }),
        };
        let expected = width as usize * height as usize * channels;
        if data.pixels.len() != expected {
            return Err(ResourceError::TextureSize {
                index,
                expected,
                actual: data.pixels.len(),
            });
        }

        let raw = data.pixels.clone();
        let size_error = || ResourceError::TextureSize {
            index,
            expected,
            actual: data.pixels.len(),
        };
        let pixels = match data.format {
            Format::R8G8B8A8 => raw,
            Format::R8G8B8 => DynamicImage::ImageRgb8(
                RgbImage::from_raw(width, height, raw).ok_or_else(size_error)?,
            )
            .to_rgba8()
            .into_raw(),
            Format::R8G8 => DynamicImage::ImageLumaA8(
                GrayAlphaImage::from_raw(width, height, raw).ok_or_else(size_error)?,
            )
            .to_rgba8()
            .into_raw(),
            _ => DynamicImage::ImageLuma8(
                GrayImage::from_raw(width, height, raw).ok_or_else(size_error)?,
            )
            .to_rgba8()
            .into_raw(),
        };

        Ok(Self {
            width,
            height,
            pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specular_from_roughness() {
        assert_eq!(specular_from_roughness(1.0), 0.0);
        assert_eq!(specular_from_roughness(0.25), 0.75);
        assert_eq!(specular_from_roughness(-1.0), 1.0);
    }

    #[test]
    fn test_rgb_expands_to_rgba() {
        let data = gltf::image::Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let texture = TextureData::from_gltf(0, &data).unwrap();
        assert_eq!(texture.pixels, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn test_gray_expands_to_rgba() {
        let data = gltf::image::Data {
            pixels: vec![7],
            format: gltf::image::Format::R8,
            width: 1,
            height: 1,
        };
        let texture = TextureData::from_gltf(0, &data).unwrap();
        assert_eq!(texture.pixels, vec![7, 7, 7, 255]);
    }

    #[test]
    fn test_rejects_wide_formats_and_bad_sizes() {
        let wide = gltf::image::Data {
            pixels: vec![0; 8],
            format: gltf::image::Format::R16G16B16A16,
            width: 1,
            height: 1,
        };
        assert!(matches!(
            TextureData::from_gltf(3, &wide),
            Err(ResourceError::UnsupportedTextureFormat { index: 3, .. })
        ));

        let short = gltf::image::Data {
            pixels: vec![0; 3],
            format: gltf::image::Format::R8G8B8A8,
            width: 1,
            height: 1,
        };
        assert!(matches!(
            TextureData::from_gltf(0, &short),
            Err(ResourceError::TextureSize { expected: 4, actual: 3, .. })
        ));
    }
}
