//! Thumbnail encoding: resize, JPEG, base64.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use visionflow_core::{Image, PixelFormat};
use visionflow_imgproc::{resize, to_rgb};

use crate::ServiceError;

/// Default thumbnail width in pixels.
pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 320;

/// JPEG quality for thumbnails.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 70;

/// Downscales to `max_width` (aspect preserved), encodes JPEG at quality
/// 70, and base64-encodes the result.
///
/// Grayscale input is promoted to RGB first; images narrower than
/// `max_width` are encoded at their native size.
///
/// # Errors
/// Returns [`ServiceError::Internal`] when resampling or JPEG encoding
/// fails.
pub fn encode_thumbnail(image: &Image, max_width: u32) -> Result<String, ServiceError> {
    let rgb = to_rgb(image).map_err(|error| ServiceError::Internal(error.to_string()))?;

    let scaled = if rgb.width() > max_width && max_width > 0 {
        let height = ((rgb.height() as u64 * max_width as u64) / rgb.width() as u64).max(1) as u32;
        resize(&rgb, max_width, height).map_err(|error| ServiceError::Internal(error.to_string()))?
    } else {
        rgb
    };

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, THUMBNAIL_JPEG_QUALITY)
        .encode(
            scaled.data(),
            scaled.width(),
            scaled.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|error| ServiceError::Internal(error.to_string()))?;

    Ok(BASE64.encode(encoded))
}

/// Decodes a base64 JPEG thumbnail back into pixels, used by tests and
/// debug tooling.
///
/// # Errors
/// Returns [`ServiceError::Internal`] for malformed base64 or JPEG data.
pub fn decode_thumbnail(thumbnail_base64: &str) -> Result<Image, ServiceError> {
    let bytes = BASE64
        .decode(thumbnail_base64)
        .map_err(|error| ServiceError::Internal(error.to_string()))?;

    let decoded = image::load_from_memory(&bytes)
        .map_err(|error| ServiceError::Internal(error.to_string()))?
        .into_rgb8();

    Image::new(
        decoded.width(),
        decoded.height(),
        PixelFormat::Rgb,
        decoded.into_raw(),
    )
    .map_err(|error| ServiceError::Internal(error.to_string()))
}

#[cfg(test)]
mod tests {
    //! Unit tests for thumbnail encoding.

    use super::*;

    #[test]
    fn wide_image_is_downscaled_to_max_width() {
        let image = Image::solid_rgb(640, 480, [40, 90, 160]).expect("image builds");
        let thumbnail = encode_thumbnail(&image, 320).expect("encode runs");

        let decoded = decode_thumbnail(&thumbnail).expect("decode runs");
        assert_eq!(decoded.width(), 320);
        assert_eq!(decoded.height(), 240);
    }

    #[test]
    fn narrow_image_keeps_native_size() {
        let image = Image::solid_rgb(100, 80, [10, 10, 10]).expect("image builds");
        let thumbnail = encode_thumbnail(&image, 320).expect("encode runs");

        let decoded = decode_thumbnail(&thumbnail).expect("decode runs");
        assert_eq!(decoded.width(), 100);
        assert_eq!(decoded.height(), 80);
    }

    #[test]
    fn gray_input_is_promoted_to_three_channels() {
        let image = Image::filled(400, 200, PixelFormat::Gray, 128).expect("image builds");
        let thumbnail = encode_thumbnail(&image, 320).expect("encode runs");

        let decoded = decode_thumbnail(&thumbnail).expect("decode runs");
        assert_eq!(decoded.format(), PixelFormat::Rgb);
        assert_eq!(decoded.width(), 320);
    }

    #[test]
    fn solid_color_survives_jpeg_round_trip_approximately() {
        let image = Image::solid_rgb(64, 64, [200, 30, 30]).expect("image builds");
        let thumbnail = encode_thumbnail(&image, 320).expect("encode runs");
        let decoded = decode_thumbnail(&thumbnail).expect("decode runs");

        let sample = &decoded.data()[0..3];
        assert!((sample[0] as i32 - 200).abs() < 20);
        assert!((sample[1] as i32 - 30).abs() < 25);
    }
}
