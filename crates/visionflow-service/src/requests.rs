//! Typed request and response shapes for the facade.

use serde::{Deserialize, Serialize};
use visionflow_core::{Rect, VisionObject};
use visionflow_detect::{ArucoParams, ColorParams, EdgeParams, RotationParams, TemplateMatchParams};

/// Request for template matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMatchRequest {
    /// Search image id.
    pub image_id: String,
    /// Optional region limiting the search area.
    #[serde(default)]
    pub roi: Option<Rect>,
    /// Matching parameters (`template_id` is required).
    pub params: TemplateMatchParams,
    /// Whether to append a history record.
    #[serde(default = "default_true")]
    pub record_history: bool,
}

/// Request for edge detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDetectRequest {
    /// Image id to analyze.
    pub image_id: String,
    /// Optional region limiting the analysis.
    #[serde(default)]
    pub roi: Option<Rect>,
    /// Edge parameters.
    #[serde(default)]
    pub params: EdgeParams,
    /// Whether to append a history record.
    #[serde(default = "default_true")]
    pub record_history: bool,
}

/// Request for color detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorDetectRequest {
    /// Image id to analyze.
    pub image_id: String,
    /// Optional region limiting the analysis.
    #[serde(default)]
    pub roi: Option<Rect>,
    /// Optional masking contour in full-image coordinates.
    #[serde(default)]
    pub contour: Option<Vec<[i32; 2]>>,
    /// Color parameters.
    #[serde(default)]
    pub params: ColorParams,
    /// Whether to append a history record.
    #[serde(default = "default_true")]
    pub record_history: bool,
}

/// Request for fiducial marker detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArucoDetectRequest {
    /// Image id to analyze.
    pub image_id: String,
    /// Optional region limiting the search.
    #[serde(default)]
    pub roi: Option<Rect>,
    /// Fiducial parameters.
    #[serde(default)]
    pub params: ArucoParams,
    /// Whether to append a history record.
    #[serde(default = "default_true")]
    pub record_history: bool,
}

/// Request for rotation estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationDetectRequest {
    /// Image id used for the annotated thumbnail.
    pub image_id: String,
    /// Contour points in full-image coordinates.
    pub contour: Vec<[i32; 2]>,
    /// Optional region for visualization context.
    #[serde(default)]
    pub roi: Option<Rect>,
    /// Rotation parameters.
    #[serde(default)]
    pub params: RotationParams,
    /// Whether to append a history record.
    #[serde(default = "default_true")]
    pub record_history: bool,
}

/// Shared response shape of every vision endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionResponse {
    /// Detected objects in full-image coordinates.
    pub objects: Vec<VisionObject>,
    /// Annotated, downscaled JPEG as base64.
    pub thumbnail_base64: String,
    /// Wall time from fetch to encoded thumbnail.
    pub processing_time_ms: u64,
}

/// Response of the ROI extraction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiExtractResponse {
    /// Id of the newly stored cropped image.
    pub image_id: String,
    /// Thumbnail of the cropped pixels.
    pub thumbnail_base64: String,
    /// Clipped rectangle that was extracted.
    pub bounding_box: Rect,
}

/// Response of a camera capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResponse {
    /// Id of the stored frame.
    pub image_id: String,
    /// Thumbnail of the stored frame.
    pub thumbnail_base64: String,
    /// Capture time in Unix epoch milliseconds.
    pub timestamp_ms: u64,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    //! Unit tests for request deserialization defaults.

    use super::*;

    #[test]
    fn template_request_defaults_history_on() {
        let raw = r#"{"image_id":"img_1","params":{"template_id":"tmpl_1"}}"#;
        let request: TemplateMatchRequest = serde_json::from_str(raw).expect("parses");
        assert!(request.record_history);
        assert!(request.roi.is_none());
        assert_eq!(request.params.threshold, 0.8);
    }

    #[test]
    fn edge_request_parses_with_all_defaults() {
        let raw = r#"{"image_id":"img_1"}"#;
        let request: EdgeDetectRequest = serde_json::from_str(raw).expect("parses");
        assert_eq!(request.params.max_contours, 100);
    }
}
