//! Image resampling.
//!
//! Downscaling uses area averaging (the quality-relevant case for
//! thumbnails); upscaling uses bilinear interpolation.

use visionflow_core::Image;

use crate::ImgprocError;

/// Resizes an image to exact target dimensions.
///
/// # Errors
/// Returns [`ImgprocError::InvalidParameter`] for zero target dimensions.
pub fn resize(image: &Image, target_width: u32, target_height: u32) -> Result<Image, ImgprocError> {
    if target_width == 0 || target_height == 0 {
        return Err(ImgprocError::InvalidParameter {
            name: "resize_target",
            value: format!("{target_width}x{target_height}"),
        });
    }

    if target_width == image.width() && target_height == image.height() {
        return Ok(image.clone());
    }

    let downscaling = target_width <= image.width() && target_height <= image.height();
    let data = if downscaling {
        area_average(image, target_width, target_height)
    } else {
        bilinear(image, target_width, target_height)
    };

    Ok(Image::new(target_width, target_height, image.format(), data)?)
}

fn area_average(image: &Image, target_width: u32, target_height: u32) -> Vec<u8> {
    let channels = image.channels();
    let src = image.data();
    let src_width = image.width() as f64;
    let src_height = image.height() as f64;
    let scale_x = src_width / target_width as f64;
    let scale_y = src_height / target_height as f64;

    let mut out = Vec::with_capacity(target_width as usize * target_height as usize * channels);

    for ty in 0..target_height {
        let y0 = ty as f64 * scale_y;
        let y1 = (y0 + scale_y).min(src_height);
        for tx in 0..target_width {
            let x0 = tx as f64 * scale_x;
            let x1 = (x0 + scale_x).min(src_width);

            let mut acc = vec![0.0_f64; channels];
            let mut weight_sum = 0.0;

            // Accumulate fractional pixel coverage over the source box.
            let mut sy = y0.floor();
            while sy < y1 {
                let next_y = (sy.floor() + 1.0).min(y1);
                let hy = next_y - sy.max(y0);
                let row = sy as usize;

                let mut sx = x0.floor();
                while sx < x1 {
                    let next_x = (sx.floor() + 1.0).min(x1);
                    let wx = next_x - sx.max(x0);
                    let col = sx as usize;
                    let weight = hy * wx;
                    let base = (row * image.width() as usize + col) * channels;
                    for c in 0..channels {
                        acc[c] += src[base + c] as f64 * weight;
                    }
                    weight_sum += weight;
                    sx = next_x;
                }
                sy = next_y;
            }

            for value in acc {
                out.push((value / weight_sum).round().clamp(0.0, 255.0) as u8);
            }
        }
    }

    out
}

fn bilinear(image: &Image, target_width: u32, target_height: u32) -> Vec<u8> {
    let channels = image.channels();
    let src = image.data();
    let src_width = image.width() as usize;
    let max_x = image.width() as f64 - 1.0;
    let max_y = image.height() as f64 - 1.0;

    let scale_x = image.width() as f64 / target_width as f64;
    let scale_y = image.height() as f64 / target_height as f64;

    let mut out = Vec::with_capacity(target_width as usize * target_height as usize * channels);

    for ty in 0..target_height {
        let sy = ((ty as f64 + 0.5) * scale_y - 0.5).clamp(0.0, max_y);
        let y0 = sy.floor() as usize;
        let y1 = (y0 + 1).min(max_y as usize);
        let fy = sy - y0 as f64;

        for tx in 0..target_width {
            let sx = ((tx as f64 + 0.5) * scale_x - 0.5).clamp(0.0, max_x);
            let x0 = sx.floor() as usize;
            let x1 = (x0 + 1).min(max_x as usize);
            let fx = sx - x0 as f64;

            for c in 0..channels {
                let p00 = src[(y0 * src_width + x0) * channels + c] as f64;
                let p01 = src[(y0 * src_width + x1) * channels + c] as f64;
                let p10 = src[(y1 * src_width + x0) * channels + c] as f64;
                let p11 = src[(y1 * src_width + x1) * channels + c] as f64;

                let top = p00 + (p01 - p00) * fx;
                let bottom = p10 + (p11 - p10) * fx;
                let value = top + (bottom - top) * fy;
                out.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    //! Unit tests for resampling.

    use visionflow_core::PixelFormat;

    use super::*;

    #[test]
    fn downscale_averages_blocks() {
        // 4x4 gray: left half 0, right half 200.
        let mut data = vec![0_u8; 16];
        for y in 0..4 {
            for x in 2..4 {
                data[y * 4 + x] = 200;
            }
        }
        let image = Image::new(4, 4, PixelFormat::Gray, data).expect("image should build");

        let small = resize(&image, 2, 2).expect("resize runs");
        assert_eq!(small.data(), &[0, 200, 0, 200]);
    }

    #[test]
    fn identity_resize_returns_equal_buffer() {
        let image = Image::filled(5, 3, PixelFormat::Rgb, 40).expect("image should build");
        let same = resize(&image, 5, 3).expect("resize runs");
        assert_eq!(same, image);
    }

    #[test]
    fn upscale_preserves_solid_color() {
        let image = Image::solid_rgb(2, 2, [10, 20, 30]).expect("image should build");
        let big = resize(&image, 6, 6).expect("resize runs");
        assert!(big.data().chunks_exact(3).all(|p| p == [10, 20, 30]));
    }

    #[test]
    fn zero_target_is_rejected() {
        let image = Image::filled(2, 2, PixelFormat::Gray, 0).expect("image should build");
        assert!(resize(&image, 0, 2).is_err());
    }

    #[test]
    fn fractional_downscale_conserves_mean() {
        let data: Vec<u8> = (0..90).map(|i| (i % 256) as u8).collect();
        let image = Image::new(9, 10, PixelFormat::Gray, data).expect("image should build");

        let small = resize(&image, 4, 4).expect("resize runs");
        let src_mean: f64 =
            image.data().iter().map(|&v| v as f64).sum::<f64>() / image.data().len() as f64;
        let dst_mean: f64 =
            small.data().iter().map(|&v| v as f64).sum::<f64>() / small.data().len() as f64;
        assert!((src_mean - dst_mean).abs() < 3.0);
    }
}
