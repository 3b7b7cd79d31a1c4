//! Smoothing filters and morphology.

use visionflow_core::Image;

use crate::ImgprocError;

/// Morphological operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    /// Erosion followed by dilation; removes small bright specks.
    Open,
    /// Dilation followed by erosion; closes small dark gaps.
    Close,
    /// Dilation minus erosion; leaves object outlines.
    Gradient,
    /// Plain erosion.
    Erode,
    /// Plain dilation.
    Dilate,
}

/// Gaussian blur with a square kernel.
///
/// `sigma <= 0` derives the sigma from the kernel size the way OpenCV does
/// (`0.3 * ((ksize - 1) * 0.5 - 1) + 0.8`). Borders replicate edge pixels.
///
/// # Errors
/// Returns [`ImgprocError::InvalidKernelSize`] for even or zero sizes.
pub fn gaussian_blur(image: &Image, kernel_size: u32, sigma: f64) -> Result<Image, ImgprocError> {
    check_odd(kernel_size)?;

    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((kernel_size as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let kernel = gaussian_kernel(kernel_size as usize, sigma);

    let horizontal = convolve_separable(image, &kernel, true);
    Ok(convolve_separable(&horizontal, &kernel, false))
}

fn gaussian_kernel(size: usize, sigma: f64) -> Vec<f64> {
    let half = (size / 2) as isize;
    let mut kernel = Vec::with_capacity(size);
    let mut sum = 0.0;
    for i in -half..=half {
        let weight = (-((i * i) as f64) / (2.0 * sigma * sigma)).exp();
        kernel.push(weight);
        sum += weight;
    }
    for weight in kernel.iter_mut() {
        *weight /= sum;
    }
    kernel
}

fn convolve_separable(image: &Image, kernel: &[f64], horizontal: bool) -> Image {
    let width = image.width() as isize;
    let height = image.height() as isize;
    let channels = image.channels() as isize;
    let half = (kernel.len() / 2) as isize;
    let src = image.data();
    let mut out = vec![0_u8; src.len()];

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut acc = 0.0;
                for (k, &weight) in kernel.iter().enumerate() {
                    let offset = k as isize - half;
                    let (sx, sy) = if horizontal {
                        ((x + offset).clamp(0, width - 1), y)
                    } else {
                        (x, (y + offset).clamp(0, height - 1))
                    };
                    let index = ((sy * width + sx) * channels + c) as usize;
                    acc += src[index] as f64 * weight;
                }
                let index = ((y * width + x) * channels + c) as usize;
                out[index] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    // Shape is unchanged, so reconstruction cannot fail.
    Image::new(image.width(), image.height(), image.format(), out)
        .unwrap_or_else(|_| image.clone())
}

/// Edge-preserving bilateral filter.
///
/// `diameter` is the square neighborhood width; `sigma_color` weights
/// sample-value distance and `sigma_space` weights spatial distance.
///
/// # Errors
/// Returns [`ImgprocError::InvalidKernelSize`] for even or zero diameters.
pub fn bilateral_filter(
    image: &Image,
    diameter: u32,
    sigma_color: f64,
    sigma_space: f64,
) -> Result<Image, ImgprocError> {
    check_odd(diameter)?;

    let width = image.width() as isize;
    let height = image.height() as isize;
    let channels = image.channels() as isize;
    let half = (diameter / 2) as isize;
    let src = image.data();
    let mut out = vec![0_u8; src.len()];

    let color_factor = -0.5 / (sigma_color * sigma_color);
    let space_factor = -0.5 / (sigma_space * sigma_space);

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let center_index = ((y * width + x) * channels + c) as usize;
                let center = src[center_index] as f64;
                let mut acc = 0.0;
                let mut norm = 0.0;

                for dy in -half..=half {
                    for dx in -half..=half {
                        let sx = (x + dx).clamp(0, width - 1);
                        let sy = (y + dy).clamp(0, height - 1);
                        let index = ((sy * width + sx) * channels + c) as usize;
                        let sample = src[index] as f64;

                        let spatial = ((dx * dx + dy * dy) as f64) * space_factor;
                        let range = (sample - center) * (sample - center) * color_factor;
                        let weight = (spatial + range).exp();

                        acc += sample * weight;
                        norm += weight;
                    }
                }

                out[center_index] = (acc / norm).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Ok(Image::new(image.width(), image.height(), image.format(), out)?)
}

/// Morphology with a square all-ones structuring element.
///
/// # Errors
/// Returns [`ImgprocError::InvalidKernelSize`] for even or zero sizes.
pub fn morphology(image: &Image, op: MorphOp, kernel_size: u32) -> Result<Image, ImgprocError> {
    check_odd(kernel_size)?;

    match op {
        MorphOp::Erode => Ok(min_max_filter(image, kernel_size, false)),
        MorphOp::Dilate => Ok(min_max_filter(image, kernel_size, true)),
        MorphOp::Open => {
            let eroded = min_max_filter(image, kernel_size, false);
            Ok(min_max_filter(&eroded, kernel_size, true))
        }
        MorphOp::Close => {
            let dilated = min_max_filter(image, kernel_size, true);
            Ok(min_max_filter(&dilated, kernel_size, false))
        }
        MorphOp::Gradient => {
            let dilated = min_max_filter(image, kernel_size, true);
            let eroded = min_max_filter(image, kernel_size, false);
            let data = dilated
                .data()
                .iter()
                .zip(eroded.data())
                .map(|(&d, &e)| d.saturating_sub(e))
                .collect();
            Ok(Image::new(image.width(), image.height(), image.format(), data)?)
        }
    }
}

fn min_max_filter(image: &Image, kernel_size: u32, take_max: bool) -> Image {
    let width = image.width() as isize;
    let height = image.height() as isize;
    let channels = image.channels() as isize;
    let half = (kernel_size / 2) as isize;
    let src = image.data();
    let mut out = vec![0_u8; src.len()];

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut extreme = if take_max { 0_u8 } else { 255_u8 };
                for dy in -half..=half {
                    for dx in -half..=half {
                        let sx = (x + dx).clamp(0, width - 1);
                        let sy = (y + dy).clamp(0, height - 1);
                        let sample = src[((sy * width + sx) * channels + c) as usize];
                        extreme = if take_max {
                            extreme.max(sample)
                        } else {
                            extreme.min(sample)
                        };
                    }
                }
                out[((y * width + x) * channels + c) as usize] = extreme;
            }
        }
    }

    Image::new(image.width(), image.height(), image.format(), out)
        .unwrap_or_else(|_| image.clone())
}

fn check_odd(size: u32) -> Result<(), ImgprocError> {
    if size == 0 || size % 2 == 0 {
        return Err(ImgprocError::InvalidKernelSize(size));
    }
    Ok(())
}
