//! Snapshot export: G-buffer channels and the final frame as JPEG files.
//!
//! Everything here works on host memory; the GPU readback lives in
//! [`DeferredRenderer::export_snapshot`](crate::deferred::DeferredRenderer::export_snapshot).
//! Float attachments are quantized like a UNORM readback (clamp to [0,1],
//! then `round(255 v)`), and the depth channel is linearized first.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;
use tracing::{debug, info};

use renderer_rhi::RhiError;

use crate::depth::{DepthRange, depth_to_gray};

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("GPU readback failed: {0}")]
    Rhi(#[from] RhiError),

    #[error("JPEG encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("requested {requested:?}, but the G-buffer is {actual:?}")]
    SizeMismatch {
        requested: (u32, u32),
        actual: (u32, u32),
    },

    #[error("{channel}: expected {expected} bytes, got {actual}")]
    BadLength {
        channel: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("nothing has been rendered yet")]
    NoFrame,
}

/// Row order of a readback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOrder {
    TopDown,
    BottomUp,
}

/// Raw attachment bytes as read back from the GPU.
#[derive(Clone, Debug, Default)]
pub struct RawSnapshot {
    pub width: u32,
    pub height: u32,
    pub row_order: Option<RowOrder>,
    /// RGBA16F.
    pub position: Vec<u8>,
    /// RGBA16F.
    pub normal: Vec<u8>,
    /// RGBA8, specular in alpha.
    pub diffuse_specular: Vec<u8>,
    /// D32 float.
    pub depth: Vec<u8>,
    /// RGBA8.
    pub final_color: Vec<u8>,
}

impl RawSnapshot {
    fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn check(&self) -> Result<(), ExportError> {
        let pixels = self.pixel_count();
        let expected = [
            ("position", &self.position, pixels * 8),
            ("normal", &self.normal, pixels * 8),
            ("diffuse_specular", &self.diffuse_specular, pixels * 4),
            ("depth", &self.depth, pixels * 4),
            ("final", &self.final_color, pixels * 4),
        ];
        for (channel, bytes, expected) in expected {
            if bytes.len() != expected {
                return Err(ExportError::BadLength {
                    channel,
                    expected,
                    actual: bytes.len(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
}

/// 8-bit image ready for encoding, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportImage {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub color: ExtendedColorType,
    pub pixels: Vec<u8>,
}

/// Converts a snapshot into the six export images, in file order.
pub fn build_images(snapshot: &RawSnapshot, range: &DepthRange) -> Result<Vec<ExportImage>, ExportError> {
    snapshot.check()?;
    let (width, height) = (snapshot.width, snapshot.height);
    let order = snapshot.row_order.unwrap_or(RowOrder::TopDown);

    let image = |name, color, pixels: Vec<u8>| {
        let channels = if color == ExtendedColorType::L8 { 1 } else { 3 };
        ExportImage {
            name,
            width,
            height,
            color,
            pixels: to_top_down(pixels, width as usize * channels, order),
        }
    };

    let albedo: Vec<u8> = snapshot
        .diffuse_specular
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    let specular: Vec<u8> = snapshot.diffuse_specular.chunks_exact(4).map(|px| px[3]).collect();
    let depth: Vec<u8> = snapshot
        .depth
        .chunks_exact(4)
        .map(|b| depth_to_gray(f32::from_le_bytes([b[0], b[1], b[2], b[3]]), range))
        .collect();
    let final_rgb: Vec<u8> = snapshot
        .final_color
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();

    Ok(vec![
        image("attachment_position", ExtendedColorType::Rgb8, half_rgba_to_rgb8(&snapshot.position)),
        image("attachment_normal", ExtendedColorType::Rgb8, half_rgba_to_rgb8(&snapshot.normal)),
        image("attachment_albedo", ExtendedColorType::Rgb8, albedo),
        image("attachment_specular", ExtendedColorType::L8, specular),
        image("attachment_depth", ExtendedColorType::L8, depth),
        image("attachment_final", ExtendedColorType::Rgb8, final_rgb),
    ])
}

/// Writes every image of `snapshot` into `dir` as `<name>.jpg`.
pub fn write_snapshot(
    snapshot: &RawSnapshot,
    range: &DepthRange,
    dir: &Path,
    quality: u8,
) -> Result<ExportReport, ExportError> {
    let images = build_images(snapshot, range)?;
    fs::create_dir_all(dir)?;

    let mut report = ExportReport::default();
    for image in &images {
        let path = dir.join(format!("{}.jpg", image.name));
        write_jpeg(&path, image, quality)?;
        debug!("Wrote {:?}", path);
        report.files.push(path);
    }
    info!(
        "Exported {} images ({}x{}) to {:?}",
        report.files.len(),
        snapshot.width,
        snapshot.height,
        dir
    );
    Ok(report)
}

fn write_jpeg(path: &Path, image: &ExportImage, quality: u8) -> Result<(), ExportError> {
    let file = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(file, quality.clamp(1, 100)).write_image(
        &image.pixels,
        image.width,
        image.height,
        image.color,
    )?;
    Ok(())
}

/// Reverses row order when the source is bottom-up.
pub fn to_top_down(pixels: Vec<u8>, row_bytes: usize, order: RowOrder) -> Vec<u8> {
    match order {
        RowOrder::TopDown => pixels,
        RowOrder::BottomUp => flip_rows(&pixels, row_bytes),
    }
}

pub fn flip_rows(pixels: &[u8], row_bytes: usize) -> Vec<u8> {
    if row_bytes == 0 {
        return pixels.to_vec();
    }
    pixels
        .chunks_exact(row_bytes)
        .rev()
        .flatten()
        .copied()
        .collect()
}

/// `round(255 v)` after clamping `v` to [0, 1]. NaN maps to 0.
#[inline]
pub fn quantize_unit(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn half_rgba_to_rgb8(bytes: &[u8]) -> Vec<u8> {
    bytes
        .chunks_exact(8)
        .flat_map(|px| {
            let channel = |i: usize| quantize_unit(f16_to_f32(u16::from_le_bytes([px[i], px[i + 1]])));
            [channel(0), channel(2), channel(4)]
        })
        .collect()
}

/// IEEE 754 binary16 to f32.
pub fn f16_to_f32(bits: u16) -> f32 {
    let sign = u32::from(bits >> 15) << 31;
    let exponent = u32::from((bits >> 10) & 0x1f);
    let mantissa = u32::from(bits & 0x3ff);

    let magnitude = match (exponent, mantissa) {
        (0, 0) => 0,
        (0, m) => {
            // Subnormal: renormalize into an f32 normal.
            let shift = m.leading_zeros() - 21;
            let m = (m << shift) & 0x3ff;
            ((127 - 15 + 1 - shift) << 23) | (m << 13)
        }
        (0x1f, m) => 0x7f80_0000 | (m << 13),
        (e, m) => ((e + 127 - 15) << 23) | (m << 13),
    };
    f32::from_bits(sign | magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_px(values: [u16; 4]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn snapshot(width: u32, height: u32) -> RawSnapshot {
        let n = (width * height) as usize;
        RawSnapshot {
            width,
            height,
            row_order: None,
            position: vec![0; n * 8],
            normal: vec![0; n * 8],
            diffuse_specular: vec![0; n * 4],
            depth: 1.0f32.to_le_bytes().repeat(n),
            final_color: vec![0; n * 4],
        }
    }

    #[test]
    fn test_f16_decoding() {
        assert_eq!(f16_to_f32(0x0000), 0.0);
        assert_eq!(f16_to_f32(0x3c00), 1.0);
        assert_eq!(f16_to_f32(0xbc00), -1.0);
        assert_eq!(f16_to_f32(0x3800), 0.5);
        assert_eq!(f16_to_f32(0x4900), 10.0);
        assert_eq!(f16_to_f32(0x7bff), 65504.0);
        assert_eq!(f16_to_f32(0x0001), 2.0f32.powi(-24));
        assert_eq!(f16_to_f32(0x0200), 2.0f32.powi(-15));
        assert!(f16_to_f32(0x7c00).is_infinite());
        assert!(f16_to_f32(0x7e00).is_nan());
    }

    #[test]
    fn test_quantize_clamps_and_rounds() {
        assert_eq!(quantize_unit(-3.0), 0);
        assert_eq!(quantize_unit(0.5), 128);
        assert_eq!(quantize_unit(1.0), 255);
        assert_eq!(quantize_unit(42.0), 255);
        assert_eq!(quantize_unit(f32::NAN), 0);
    }

    #[test]
    fn test_flip_rows() {
        let rows = vec![1, 1, 2, 2, 3, 3];
        assert_eq!(flip_rows(&rows, 2), vec![3, 3, 2, 2, 1, 1]);
        assert_eq!(to_top_down(rows.clone(), 2, RowOrder::TopDown), rows);
    }

    #[test]
    fn test_build_images_channels() {
        let mut snap = snapshot(2, 1);
        snap.diffuse_specular = vec![10, 20, 30, 40, 50, 60, 70, 80];
        snap.normal = [half_px([0x3c00, 0xbc00, 0x3800, 0]), half_px([0, 0, 0, 0])].concat();
        snap.final_color = vec![1, 2, 3, 255, 4, 5, 6, 255];

        let images = build_images(&snap, &DepthRange::default()).unwrap();
        let names: Vec<_> = images.iter().map(|i| i.name).collect();
        assert_eq!(
            names,
            vec![
                "attachment_position",
                "attachment_normal",
                "attachment_albedo",
                "attachment_specular",
                "attachment_depth",
                "attachment_final",
            ]
        );

        assert_eq!(images[1].pixels, vec![255, 0, 128, 0, 0, 0]);
        assert_eq!(images[2].pixels, vec![10, 20, 30, 50, 60, 70]);
        assert_eq!(images[3].pixels, vec![40, 80]);
        assert_eq!(images[3].color, ExtendedColorType::L8);
        assert_eq!(images[4].pixels, vec![255, 255]);
        assert_eq!(images[5].pixels, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_bottom_up_rows_are_flipped() {
        let mut snap = snapshot(1, 2);
        snap.row_order = Some(RowOrder::BottomUp);
        snap.diffuse_specular = vec![1, 1, 1, 9, 2, 2, 2, 8];
        let images = build_images(&snap, &DepthRange::default()).unwrap();
        assert_eq!(images[2].pixels, vec![2, 2, 2, 1, 1, 1]);
        assert_eq!(images[3].pixels, vec![8, 9]);
    }

    #[test]
    fn test_length_mismatch_is_reported() {
        let mut snap = snapshot(2, 2);
        snap.depth.pop();
        assert!(matches!(
            build_images(&snap, &DepthRange::default()),
            Err(ExportError::BadLength { channel: "depth", .. })
        ));
    }

    #[test]
    fn test_write_snapshot_creates_six_jpegs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("shots");
        let report = write_snapshot(&snapshot(16, 8), &DepthRange::default(), &out, 85).unwrap();

        assert_eq!(report.files.len(), 6);
        for path in &report.files {
            let bytes = std::fs::read(path).unwrap();
            // SOI marker.
            assert_eq!(&bytes[..2], &[0xff, 0xd8]);
        }
        assert!(out.join("attachment_final.jpg").exists());
        assert!(out.join("attachment_depth.jpg").exists());
    }

    #[test]
    fn test_write_failure_surfaces_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let result = write_snapshot(&snapshot(2, 2), &DepthRange::default(), &blocker, 85);
        assert!(matches!(result, Err(ExportError::Io(_))));
    }
}
