#![warn(missing_docs)]
//! # visionflow-detect
//!
//! ## Purpose
//! The five detection algorithms behind the inspection pipeline: template
//! matching, edge/contour extraction, dominant-color analysis, square
//! fiducial decoding, and rotation estimation.
//!
//! ## Responsibilities
//! - Expose one typed parameter struct per detector with serde defaults,
//!   so the orchestrator never reaches into untyped maps.
//! - Emit coordinates relative to the input buffer; the orchestrator owns
//!   the remap into full-image space.
//! - Return the buffer overlays should be drawn on (for edge detection
//!   that is the preprocessed image, not the raw input).
//!
//! ## Data flow
//! `Image` in, [`Detection`] out; no store, clock, or id access.
//!
//! ## Error model
//! Out-of-range parameters and degenerate inputs fail with
//! [`DetectError`]; detectors never panic on pixel data.

mod color;
mod edge;
mod fiducial;
mod params;
mod rotation;
mod template;

pub use color::{classify_hsv, color_detect};
pub use edge::edge_detect;
pub use fiducial::{aruco_detect, synthesize_marker};
pub use params::{
    AngleRange, ArucoDictionary, ArucoParams, ColorMethod, ColorName, ColorParams, EdgeMethod,
    EdgeParams, MorphologyOperation, PreprocessParams, RotationMethod, RotationParams,
    TemplateMatchMethod, TemplateMatchParams,
};
pub use rotation::rotation_detect;
pub use template::template_match;

use thiserror::Error;
use visionflow_core::{Image, VisionObject};

/// Uniform detector result: objects relative to the input buffer plus the
/// canvas the overlay renderer should draw on.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Detected objects in input-buffer coordinates.
    pub objects: Vec<VisionObject>,
    /// Buffer for overlay drawing (the preprocessed image where the
    /// detector preprocesses, otherwise a copy of the input).
    pub canvas: Image,
}

/// Error type for detector failures.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Numeric parameter outside its documented range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value, formatted.
        value: String,
    },
    /// Rotation estimation received fewer points than the method needs.
    #[error("{method} requires at least {required} contour points, got {actual}")]
    InsufficientContourPoints {
        /// Method name.
        method: &'static str,
        /// Minimum point count.
        required: usize,
        /// Supplied point count.
        actual: usize,
    },
    /// Template does not fit inside the search image.
    #[error("template {template_width}x{template_height} exceeds search image {image_width}x{image_height}")]
    TemplateTooLarge {
        /// Template width.
        template_width: u32,
        /// Template height.
        template_height: u32,
        /// Search image width.
        image_width: u32,
        /// Search image height.
        image_height: u32,
    },
    /// Underlying pixel-primitive failure.
    #[error(transparent)]
    Imgproc(#[from] visionflow_imgproc::ImgprocError),
    /// Core image model failure.
    #[error(transparent)]
    Shape(#[from] visionflow_core::CoreError),
}
