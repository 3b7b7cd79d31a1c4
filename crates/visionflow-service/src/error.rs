//! Cross-cutting service error kinds and their HTTP mapping.

use thiserror::Error;
use visionflow_core::Rect;
use visionflow_detect::DetectError;
use visionflow_history::HistoryError;
use visionflow_store::StoreError;
use visionflow_templates::TemplateError;

/// Error kinds surfaced to the HTTP layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Image id absent from the image store.
    #[error("image {0} not found")]
    ImageNotFound(String),
    /// Template id absent from the template store.
    #[error("template {0} not found")]
    TemplateNotFound(String),
    /// ROI invalid against the image, or empty after clipping.
    #[error("invalid ROI {roi} for image {image_width}x{image_height}")]
    InvalidRoi {
        /// Offending rectangle.
        roi: Rect,
        /// Image width.
        image_width: u32,
        /// Image height.
        image_height: u32,
    },
    /// Out-of-range numeric parameter or unknown enum value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Rotation estimation received too few contour points.
    #[error("{method} requires at least {required} contour points, got {actual}")]
    InsufficientContourPoints {
        /// Method name.
        method: &'static str,
        /// Minimum point count.
        required: usize,
        /// Supplied point count.
        actual: usize,
    },
    /// One image alone exceeds the store byte budget.
    #[error("image of {byte_cost} bytes exceeds store budget of {max_bytes} bytes")]
    CapacityExceeded {
        /// Byte cost of the rejected image.
        byte_cost: usize,
        /// Configured byte budget.
        max_bytes: usize,
    },
    /// Detector or codec failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Status code the HTTP surface maps this kind to.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::ImageNotFound(_) | ServiceError::TemplateNotFound(_) => 404,
            ServiceError::InvalidRoi { .. }
            | ServiceError::InvalidParameter(_)
            | ServiceError::InsufficientContourPoints { .. } => 400,
            ServiceError::CapacityExceeded { .. } => 413,
            ServiceError::Internal(_) => 500,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => ServiceError::ImageNotFound(id),
            StoreError::CapacityExceeded {
                byte_cost,
                max_bytes,
            } => ServiceError::CapacityExceeded {
                byte_cost,
                max_bytes,
            },
            StoreError::LockPoisoned => ServiceError::Internal(error.to_string()),
        }
    }
}

impl From<TemplateError> for ServiceError {
    fn from(error: TemplateError) -> Self {
        match error {
            TemplateError::NotFound(id) => ServiceError::TemplateNotFound(id),
            TemplateError::InvalidRegion { .. } => ServiceError::InvalidParameter(error.to_string()),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<DetectError> for ServiceError {
    fn from(error: DetectError) -> Self {
        match error {
            DetectError::InvalidParameter { .. } | DetectError::TemplateTooLarge { .. } => {
                ServiceError::InvalidParameter(error.to_string())
            }
            DetectError::InsufficientContourPoints {
                method,
                required,
                actual,
            } => ServiceError::InsufficientContourPoints {
                method,
                required,
                actual,
            },
            DetectError::Imgproc(inner) => ServiceError::Internal(inner.to_string()),
            DetectError::Shape(inner) => ServiceError::Internal(inner.to_string()),
        }
    }
}

impl From<HistoryError> for ServiceError {
    fn from(error: HistoryError) -> Self {
        match error {
            HistoryError::NotFound(id) => ServiceError::ImageNotFound(id),
            HistoryError::InvalidParameter(name) => ServiceError::InvalidParameter(name.to_string()),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<visionflow_core::CoreError> for ServiceError {
    fn from(error: visionflow_core::CoreError) -> Self {
        ServiceError::Internal(error.to_string())
    }
}
