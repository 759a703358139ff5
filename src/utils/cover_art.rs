//! Front cover preparation for ID3 tags
//!
//! The first album image Spotify lists is normally a 640 px JPEG, and those
//! bytes are embedded as they are. Anything else (another format, a larger
//! picture) is decoded, fitted into the size limit and re-encoded once.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

/// Longest side of an embedded cover
const MAX_COVER_SIZE: u32 = 640;

/// JPEGs up to this size are embedded without re-encoding
const MAX_COVER_BYTES: usize = 500 * 1024;

const JPEG_QUALITY: u8 = 85;

/// JPEG start-of-image marker followed by the first segment marker
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Turn downloaded artwork into JPEG bytes suitable for a front cover
pub fn front_cover_jpeg(data: &[u8]) -> Result<Vec<u8>> {
    if data.starts_with(&JPEG_MAGIC) && data.len() <= MAX_COVER_BYTES {
        debug!("Cover art is already a JPEG ({} bytes)", data.len());
        return Ok(data.to_vec());
    }

    let img = image::load_from_memory(data).context("Failed to decode cover art")?;
    let (width, height) = (img.width(), img.height());

    let img = if width > MAX_COVER_SIZE || height > MAX_COVER_SIZE {
        img.resize(MAX_COVER_SIZE, MAX_COVER_SIZE, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY)
        .encode_image(&rgb)
        .context("Failed to encode cover art as JPEG")?;

    debug!(
        "Re-encoded cover art {}x{} -> {}x{}, {} bytes",
        width,
        height,
        rgb.width(),
        rgb.height(),
        output.len()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn test_small_jpeg_is_embedded_as_is() {
        let jpeg = encode(&DynamicImage::new_rgb8(64, 64), ImageFormat::Jpeg);
        assert_eq!(front_cover_jpeg(&jpeg).unwrap(), jpeg);
    }

    #[test]
    fn test_large_cover_fits_the_limit() {
        let png = encode(&DynamicImage::new_rgb8(1500, 1000), ImageFormat::Png);
        let jpeg = front_cover_jpeg(&png).unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), MAX_COVER_SIZE);
        assert!(decoded.height() < MAX_COVER_SIZE);
    }

    #[test]
    fn test_small_cover_keeps_its_size() {
        let png = encode(&DynamicImage::new_rgb8(300, 300), ImageFormat::Png);
        let decoded = image::load_from_memory(&front_cover_jpeg(&png).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 300));
    }

    #[test]
    fn test_transparent_png_becomes_jpeg() {
        let png = encode(
            &DynamicImage::ImageRgba8(RgbaImage::new(32, 32)),
            ImageFormat::Png,
        );
        let jpeg = front_cover_jpeg(&png).unwrap();
        assert!(jpeg.starts_with(&JPEG_MAGIC[..2]));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(front_cover_jpeg(b"definitely not an image").is_err());
    }
}
