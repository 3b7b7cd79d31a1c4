#![warn(missing_docs)]
//! # visionflow-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `visionflow` workspace.
//!
//! ## Responsibilities
//! - Represent rectangular regions of interest and points in pixel space.
//! - Represent decoded pixel buffers with checked geometry.
//! - Define the uniform detector output row ([`VisionObject`]).
//! - Generate prefixed opaque identifiers for images, templates, and
//!   inspection records.
//!
//! ## Data flow
//! Capture and ROI extraction produce [`Image`] values; detectors consume
//! them and emit [`VisionObject`] rows; stores key both by ids from
//! [`new_id`].
//!
//! ## Ownership and lifetimes
//! Images own their backing buffers (`Vec<u8>`) so pipeline stages can hand
//! buffers across store boundaries without borrow coupling; a buffer read
//! from the image store stays valid even if the store evicts the entry.
//!
//! ## Error model
//! Geometry/shape validation failures return [`CoreError`] variants with
//! caller-actionable categorization.

mod geometry;
mod image;
mod object;

pub use geometry::{Point, Rect};
pub use image::{Image, PixelFormat};
pub use object::{InspectionOutcome, ObjectKind, VisionObject};

use rand::RngCore;
use thiserror::Error;

/// Generates a prefixed opaque identifier, e.g. `img_9f2c01ab`.
///
/// The 32-bit random suffix gives negligible collision probability at the
/// scale of a bounded in-process store; callers treat the result as opaque.
pub fn new_id(prefix: &str) -> String {
    let mut suffix = [0_u8; 4];
    rand::rng().fill_bytes(&mut suffix);
    format!("{prefix}_{}", hex::encode(suffix))
}

/// Returns the current wall-clock time as Unix epoch milliseconds.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Error type for core domain validation failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Pixel buffer length does not match declared geometry.
    #[error("invalid image shape: expected {expected} bytes, got {actual}")]
    InvalidImageShape {
        /// Expected byte count (`width * height * channels`).
        expected: usize,
        /// Actual byte count supplied.
        actual: usize,
    },
    /// Image dimensions must be strictly positive.
    #[error("image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// Image dimensions overflow addressable byte range.
    #[error("image dimension overflow: {width}x{height}")]
    DimensionOverflow {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// A crop region does not lie within the image.
    #[error("region {region} is outside image bounds {width}x{height}")]
    RegionOutOfBounds {
        /// Offending region, `x,y,widthxheight` formatted.
        region: String,
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },
}
