//! Color-space conversion and histogram equalization.

use visionflow_core::{Image, PixelFormat};

use crate::ImgprocError;

/// Converts any supported image to single-channel luminance.
///
/// Uses the BT.601 weights (`0.299 R + 0.587 G + 0.114 B`); a gray input is
/// returned as a copy.
pub fn to_gray(image: &Image) -> Result<Image, ImgprocError> {
    match image.format() {
        PixelFormat::Gray => Ok(image.clone()),
        PixelFormat::Rgb => {
            let mut data = Vec::with_capacity(image.width() as usize * image.height() as usize);
            for pixel in image.data().chunks_exact(3) {
                data.push(luma(pixel[0], pixel[1], pixel[2]));
            }
            Ok(Image::new(image.width(), image.height(), PixelFormat::Gray, data)?)
        }
    }
}

/// Promotes any supported image to 3-channel RGB.
pub fn to_rgb(image: &Image) -> Result<Image, ImgprocError> {
    match image.format() {
        PixelFormat::Rgb => Ok(image.clone()),
        PixelFormat::Gray => {
            let mut data =
                Vec::with_capacity(image.width() as usize * image.height() as usize * 3);
            for &value in image.data() {
                data.extend_from_slice(&[value, value, value]);
            }
            Ok(Image::new(image.width(), image.height(), PixelFormat::Rgb, data)?)
        }
    }
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}

/// Converts one RGB pixel to HSV in OpenCV ranges: H in `[0, 179]`,
/// S and V in `[0, 255]`.
pub fn rgb_to_hsv_pixel(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let rf = r as f32 / 255.0;
    let gf = g as f32 / 255.0;
    let bf = b as f32 / 255.0;

    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let value = max;
    let saturation = if max > 0.0 { delta / max } else { 0.0 };

    let mut hue_deg = if delta <= f32::EPSILON {
        0.0
    } else if (max - rf).abs() <= f32::EPSILON {
        60.0 * ((gf - bf) / delta)
    } else if (max - gf).abs() <= f32::EPSILON {
        60.0 * ((bf - rf) / delta) + 120.0
    } else {
        60.0 * ((rf - gf) / delta) + 240.0
    };
    if hue_deg < 0.0 {
        hue_deg += 360.0;
    }

    // OpenCV 8-bit convention halves hue to fit 0..180.
    let h = (hue_deg / 2.0).round().min(179.0) as u8;
    let s = (saturation * 255.0).round() as u8;
    let v = (value * 255.0).round() as u8;
    (h, s, v)
}

/// Converts an RGB image to parallel H/S/V planes in OpenCV ranges.
///
/// Gray input is treated as zero-saturation pixels whose value channel is
/// the luminance itself.
pub fn split_hsv(image: &Image) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), ImgprocError> {
    let pixels = image.width() as usize * image.height() as usize;
    let mut h = Vec::with_capacity(pixels);
    let mut s = Vec::with_capacity(pixels);
    let mut v = Vec::with_capacity(pixels);

    match image.format() {
        PixelFormat::Rgb => {
            for pixel in image.data().chunks_exact(3) {
                let (ph, ps, pv) = rgb_to_hsv_pixel(pixel[0], pixel[1], pixel[2]);
                h.push(ph);
                s.push(ps);
                v.push(pv);
            }
        }
        PixelFormat::Gray => {
            for &value in image.data() {
                h.push(0);
                s.push(0);
                v.push(value);
            }
        }
    }

    Ok((h, s, v))
}

/// Histogram equalization.
///
/// Gray images are equalized directly. Color images get the gray-plane
/// mapping applied to every channel, which stretches global contrast
/// without per-channel hue drift.
pub fn equalize_hist(image: &Image) -> Result<Image, ImgprocError> {
    let gray = to_gray(image)?;
    let lut = equalization_lut(gray.data());

    let mut data = image.data().to_vec();
    for value in data.iter_mut() {
        *value = lut[*value as usize];
    }

    Ok(Image::new(image.width(), image.height(), image.format(), data)?)
}

fn equalization_lut(gray: &[u8]) -> [u8; 256] {
    let mut histogram = [0_u64; 256];
    for &value in gray {
        histogram[value as usize] += 1;
    }

    let total = gray.len() as u64;
    let mut lut = [0_u8; 256];
    if total == 0 {
        return lut;
    }

    // Standard CDF remap, anchored at the first non-empty bin.
    let cdf_min = histogram
        .iter()
        .scan(0_u64, |acc, &count| {
            *acc += count;
            Some(*acc)
        })
        .find(|&cdf| cdf > 0)
        .unwrap_or(0);

    let mut cdf = 0_u64;
    for (value, &count) in histogram.iter().enumerate() {
        cdf += count;
        if total > cdf_min {
            let scaled = ((cdf - cdf_min) as f64 * 255.0 / (total - cdf_min) as f64).round();
            lut[value] = scaled.clamp(0.0, 255.0) as u8;
        } else {
            lut[value] = value as u8;
        }
    }

    lut
}

#[cfg(test)]
mod tests {
    //! Unit tests for color conversion.

    use super::*;

    #[test]
    fn pure_red_maps_to_hue_zero() {
        let (h, s, v) = rgb_to_hsv_pixel(255, 0, 0);
        assert_eq!(h, 0);
        assert_eq!(s, 255);
        assert_eq!(v, 255);
    }

    #[test]
    fn pure_green_maps_to_opencv_hue_60() {
        let (h, s, v) = rgb_to_hsv_pixel(0, 255, 0);
        assert_eq!(h, 60);
        assert_eq!(s, 255);
        assert_eq!(v, 255);
    }

    #[test]
    fn pure_blue_maps_to_opencv_hue_120() {
        let (h, _, _) = rgb_to_hsv_pixel(0, 0, 255);
        assert_eq!(h, 120);
    }

    #[test]
    fn white_is_unsaturated_and_bright() {
        let (_, s, v) = rgb_to_hsv_pixel(255, 255, 255);
        assert_eq!(s, 0);
        assert_eq!(v, 255);
    }

    #[test]
    fn gray_round_trips_through_to_gray() {
        let image = Image::filled(3, 3, PixelFormat::Gray, 77).expect("image should build");
        let gray = to_gray(&image).expect("conversion should succeed");
        assert_eq!(gray.data(), image.data());
    }

    #[test]
    fn rgb_promotion_triplicates_samples() {
        let image = Image::filled(2, 1, PixelFormat::Gray, 9).expect("image should build");
        let rgb = to_rgb(&image).expect("conversion should succeed");
        assert_eq!(rgb.data(), &[9, 9, 9, 9, 9, 9]);
    }

    #[test]
    fn equalize_stretches_constant_offset_ramp() {
        let data: Vec<u8> = (0..64).map(|v| 96 + v as u8).collect();
        let image = Image::new(8, 8, PixelFormat::Gray, data).expect("image should build");
        let equalized = equalize_hist(&image).expect("equalize should succeed");
        assert_eq!(equalized.data()[0], 0);
        assert_eq!(*equalized.data().last().expect("non-empty"), 255);
    }
}
