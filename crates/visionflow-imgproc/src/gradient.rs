//! First- and second-derivative operators on grayscale images.

use visionflow_core::{Image, PixelFormat};

use crate::{ImgprocError, convert::to_gray};

/// First-derivative kernel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientKernel {
    /// 3x3 Sobel.
    Sobel,
    /// 3x3 Scharr (better rotational symmetry).
    Scharr,
    /// 3x3 Prewitt.
    Prewitt,
}

impl GradientKernel {
    fn kernel_x(&self) -> [[f64; 3]; 3] {
        match self {
            GradientKernel::Sobel => [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]],
            GradientKernel::Scharr => [[-3.0, 0.0, 3.0], [-10.0, 0.0, 10.0], [-3.0, 0.0, 3.0]],
            GradientKernel::Prewitt => [[-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0]],
        }
    }

    fn kernel_y(&self) -> [[f64; 3]; 3] {
        let kx = self.kernel_x();
        let mut ky = [[0.0; 3]; 3];
        for (y, row) in ky.iter_mut().enumerate() {
            for (x, value) in row.iter_mut().enumerate() {
                *value = kx[x][y];
            }
        }
        ky
    }
}

/// Gradient magnitude `sqrt(gx^2 + gy^2)` per pixel.
///
/// The input is converted to grayscale first; the output is a row-major
/// `f64` plane matching the image dimensions.
pub fn gradient_magnitude(
    image: &Image,
    kernel: GradientKernel,
) -> Result<Vec<f64>, ImgprocError> {
    let gray = to_gray(image)?;
    let gx = convolve3(&gray, &kernel.kernel_x());
    let gy = convolve3(&gray, &kernel.kernel_y());

    Ok(gx
        .iter()
        .zip(&gy)
        .map(|(&x, &y)| (x * x + y * y).sqrt())
        .collect())
}

/// Absolute Laplacian (3x3, 4-neighbor stencil) per pixel.
pub fn laplacian(image: &Image) -> Result<Vec<f64>, ImgprocError> {
    let gray = to_gray(image)?;
    let kernel = [[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]];
    Ok(convolve3(&gray, &kernel).into_iter().map(f64::abs).collect())
}

/// Raw x/y first derivatives, used by the Canny stage.
pub(crate) fn derivatives(
    gray: &Image,
    kernel: GradientKernel,
) -> (Vec<f64>, Vec<f64>) {
    (
        convolve3(gray, &kernel.kernel_x()),
        convolve3(gray, &kernel.kernel_y()),
    )
}

fn convolve3(gray: &Image, kernel: &[[f64; 3]; 3]) -> Vec<f64> {
    debug_assert_eq!(gray.format(), PixelFormat::Gray);

    let width = gray.width() as isize;
    let height = gray.height() as isize;
    let src = gray.data();
    let mut out = vec![0.0; src.len()];

    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (ky, row) in kernel.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    let sx = (x + kx as isize - 1).clamp(0, width - 1);
                    let sy = (y + ky as isize - 1).clamp(0, height - 1);
                    acc += src[(sy * width + sx) as usize] as f64 * weight;
                }
            }
            out[(y * width + x) as usize] = acc;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    //! Unit tests for gradient operators.

    use super::*;

    fn vertical_step() -> Image {
        let mut data = vec![0_u8; 25];
        for y in 0..5 {
            for x in 3..5 {
                data[y * 5 + x] = 255;
            }
        }
        Image::new(5, 5, PixelFormat::Gray, data).expect("image should build")
    }

    #[test]
    fn sobel_responds_on_vertical_step() {
        let magnitude =
            gradient_magnitude(&vertical_step(), GradientKernel::Sobel).expect("gradient runs");
        // Columns adjacent to the step respond; far columns stay flat.
        assert!(magnitude[2 * 5 + 2] > 500.0);
        assert!(magnitude[2 * 5 + 0] < 1.0);
    }

    #[test]
    fn scharr_outweighs_sobel_on_same_step() {
        let sobel =
            gradient_magnitude(&vertical_step(), GradientKernel::Sobel).expect("gradient runs");
        let scharr =
            gradient_magnitude(&vertical_step(), GradientKernel::Scharr).expect("gradient runs");
        assert!(scharr[2 * 5 + 2] > sobel[2 * 5 + 2]);
    }

    #[test]
    fn laplacian_is_zero_on_flat_field() {
        let flat = Image::filled(4, 4, PixelFormat::Gray, 100).expect("image should build");
        let response = laplacian(&flat).expect("laplacian runs");
        assert!(response.iter().all(|&v| v.abs() < 1e-9));
    }
}
