#![warn(missing_docs)]
//! # visionflow-imgproc
//!
//! ## Purpose
//! Pixel-level primitives backing the `visionflow` detectors: color-space
//! conversion, smoothing and morphology, gradient operators, Canny edges,
//! contour extraction and analysis, geometric fits, and resampling.
//!
//! ## Responsibilities
//! - Keep every operator pure: pixels in, pixels (or measurements) out.
//! - Honor OpenCV numeric conventions where the detector contracts depend
//!   on them (HSV ranges, gradient magnitudes, moment centroids).
//!
//! ## Data flow
//! Detectors compose these primitives; nothing in this crate touches
//! stores, ids, or wall-clock time.
//!
//! ## Ownership and lifetimes
//! Operators take `&Image` and return new owned buffers; callers never see
//! partially-written pixels.
//!
//! ## Error model
//! Parameter validation failures (even kernel sizes, empty inputs) return
//! [`ImgprocError`]; shape bugs surface as the embedded core error rather
//! than panicking.

mod canny;
mod contour;
mod convert;
mod filter;
mod fit;
mod gradient;
mod resize;
mod threshold;

pub use canny::canny;
pub use contour::{
    Contour, ContourStats, approx_poly_dp, contour_stats, fill_polygon_mask, find_external_contours,
};
pub use convert::{equalize_hist, rgb_to_hsv_pixel, split_hsv, to_gray, to_rgb};
pub use filter::{MorphOp, bilateral_filter, gaussian_blur, morphology};
pub use fit::{MinAreaRect, PcaOrientation, ellipse_orientation, min_area_rect, pca_orientation};
pub use gradient::{GradientKernel, gradient_magnitude, laplacian};
pub use resize::resize;
pub use threshold::{otsu_threshold, threshold_binary};

use thiserror::Error;

/// Error type for image-processing primitives.
#[derive(Debug, Error)]
pub enum ImgprocError {
    /// Kernel sizes must be odd and positive.
    #[error("kernel size must be odd and positive, got {0}")]
    InvalidKernelSize(u32),
    /// Operation requires more input points than were supplied.
    #[error("{operation} requires at least {required} points, got {actual}")]
    TooFewPoints {
        /// Operation name.
        operation: &'static str,
        /// Minimum point count.
        required: usize,
        /// Supplied point count.
        actual: usize,
    },
    /// Numeric parameter outside its documented range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value, formatted.
        value: String,
    },
    /// Geometry/shape failure from the core image model.
    #[error(transparent)]
    Shape(#[from] visionflow_core::CoreError),
}
