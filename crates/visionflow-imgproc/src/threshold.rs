//! Fixed and automatic binarization.

use visionflow_core::{Image, PixelFormat};

use crate::{ImgprocError, convert::to_gray};

/// Binarizes an `f64` response plane into a 0/255 gray image.
///
/// Values strictly greater than `threshold` become 255.
pub fn threshold_binary(
    width: u32,
    height: u32,
    response: &[f64],
    threshold: f64,
) -> Result<Image, ImgprocError> {
    let data = response
        .iter()
        .map(|&v| if v > threshold { 255 } else { 0 })
        .collect();
    Ok(Image::new(width, height, PixelFormat::Gray, data)?)
}

/// Otsu's method: picks the threshold maximizing between-class variance and
/// returns `(threshold, binary_image)` where foreground (> threshold) is 255.
pub fn otsu_threshold(image: &Image) -> Result<(u8, Image), ImgprocError> {
    let gray = to_gray(image)?;

    let mut histogram = [0_u64; 256];
    for &value in gray.data() {
        histogram[value as usize] += 1;
    }

    let total = gray.data().len() as f64;
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut best_threshold = 0_u8;
    let mut best_variance = -1.0;
    let mut background_weight = 0.0;
    let mut background_sum = 0.0;

    for threshold in 0..256 {
        background_weight += histogram[threshold] as f64;
        if background_weight == 0.0 {
            continue;
        }
        let foreground_weight = total - background_weight;
        if foreground_weight == 0.0 {
            break;
        }

        background_sum += threshold as f64 * histogram[threshold] as f64;
        let mean_background = background_sum / background_weight;
        let mean_foreground = (total_sum - background_sum) / foreground_weight;
        let diff = mean_background - mean_foreground;
        let variance = background_weight * foreground_weight * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_threshold = threshold as u8;
        }
    }

    let data = gray
        .data()
        .iter()
        .map(|&v| if v > best_threshold { 255 } else { 0 })
        .collect();
    let binary = Image::new(gray.width(), gray.height(), PixelFormat::Gray, data)?;
    Ok((best_threshold, binary))
}

#[cfg(test)]
mod tests {
    //! Unit tests for binarization.

    use super::*;

    #[test]
    fn binary_threshold_is_strict() {
        let response = vec![10.0, 50.0, 51.0, 200.0];
        let binary = threshold_binary(4, 1, &response, 50.0).expect("threshold runs");
        assert_eq!(binary.data(), &[0, 0, 255, 255]);
    }

    #[test]
    fn otsu_separates_bimodal_histogram() {
        let mut data = vec![20_u8; 50];
        data.extend(vec![220_u8; 50]);
        let image = Image::new(10, 10, PixelFormat::Gray, data).expect("image should build");

        let (threshold, binary) = otsu_threshold(&image).expect("otsu runs");
        assert!(threshold >= 20 && threshold < 220);
        assert_eq!(binary.data().iter().filter(|&&v| v == 255).count(), 50);
    }
}
