//! Uniform detector output model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Point, Rect};

/// Closed set of object kinds a detector may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Best template-match location.
    TemplateMatch,
    /// One extracted contour from edge detection.
    EdgeContour,
    /// Dominant-color analysis of a region.
    ColorRegion,
    /// Decoded square fiducial marker.
    ArucoMarker,
    /// Orientation estimate for a contour.
    RotationAnalysis,
    /// Raw frame stored from a camera.
    CameraCapture,
}

impl ObjectKind {
    /// Wire tag for this kind, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::TemplateMatch => "template_match",
            ObjectKind::EdgeContour => "edge_contour",
            ObjectKind::ColorRegion => "color_region",
            ObjectKind::ArucoMarker => "aruco_marker",
            ObjectKind::RotationAnalysis => "rotation_analysis",
            ObjectKind::CameraCapture => "camera_capture",
        }
    }
}

/// Uniform row describing one detected object.
///
/// Coordinates are relative to the buffer the detector ran on; the pipeline
/// orchestrator remaps them into full-image space when the detector input
/// was an ROI subview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionObject {
    /// Identifier unique within one response.
    pub object_id: String,
    /// Object kind tag.
    pub object_type: ObjectKind,
    /// Axis-aligned bounding box.
    pub bounding_box: Rect,
    /// Center point.
    pub center: Point,
    /// Confidence in `[0.0, 1.0]`; geometric detections report 1.0.
    pub confidence: f64,
    /// Area in pixels, when meaningful for the kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    /// Perimeter in pixels, when meaningful for the kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perimeter: Option<f64>,
    /// Rotation in degrees, when meaningful for the kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_deg: Option<f64>,
    /// Per-kind payload (template id and raw score, marker corners, color
    /// percentages, ...).
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Ordered contour points, kept for edge and rotation analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contour: Option<Vec<[i32; 2]>>,
}

impl VisionObject {
    /// Constructs an object with the mandatory fields; optional geometry and
    /// payload start empty.
    pub fn new(
        object_id: impl Into<String>,
        object_type: ObjectKind,
        bounding_box: Rect,
        center: Point,
        confidence: f64,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            object_type,
            bounding_box,
            center,
            confidence,
            area: None,
            perimeter: None,
            rotation_deg: None,
            properties: Map::new(),
            contour: None,
        }
    }

    /// Inserts one property into the per-kind payload.
    pub fn set_property(&mut self, key: &str, value: Value) {
        self.properties.insert(key.to_string(), value);
    }

    /// Translates all coordinates (box, center, contour) by an offset.
    ///
    /// A `(0, 0)` offset is a no-op; no other field is touched.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }

        self.bounding_box.x += dx;
        self.bounding_box.y += dy;
        self.center.x += dx as f64;
        self.center.y += dy as f64;

        if let Some(contour) = self.contour.as_mut() {
            for point in contour.iter_mut() {
                point[0] += dx;
                point[1] += dy;
            }
        }
    }
}

/// Inspection outcome recorded in the history ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InspectionOutcome {
    /// At least one check passed (detector-specific derivation).
    Pass,
    /// Detection ran but found nothing acceptable.
    Fail,
    /// Detector or codec raised.
    Error,
}

impl InspectionOutcome {
    /// Wire tag for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionOutcome::Pass => "PASS",
            InspectionOutcome::Fail => "FAIL",
            InspectionOutcome::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for InspectionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for object serialization and coordinate translation.

    use super::*;

    #[test]
    fn object_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ObjectKind::TemplateMatch).expect("kind serializes");
        assert_eq!(json, "\"template_match\"");
    }

    #[test]
    fn translate_moves_box_center_and_contour() {
        let mut object = VisionObject::new(
            "contour_0",
            ObjectKind::EdgeContour,
            Rect::new(10, 10, 5, 5),
            Point::new(12.5, 12.5),
            1.0,
        );
        object.contour = Some(vec![[10, 10], [14, 10], [14, 14]]);

        object.translate(50, 60);

        assert_eq!(object.bounding_box, Rect::new(60, 70, 5, 5));
        assert_eq!(object.center, Point::new(62.5, 72.5));
        assert_eq!(
            object.contour.as_deref(),
            Some(&[[60, 70], [64, 70], [64, 74]][..])
        );
    }

    #[test]
    fn zero_translate_is_identity() {
        let mut object = VisionObject::new(
            "match_0",
            ObjectKind::TemplateMatch,
            Rect::new(1, 2, 3, 4),
            Point::new(2.5, 4.0),
            0.9,
        );
        let before = object.clone();
        object.translate(0, 0);
        assert_eq!(object, before);
    }

    #[test]
    fn outcome_serializes_uppercase() {
        let json = serde_json::to_string(&InspectionOutcome::Pass).expect("outcome serializes");
        assert_eq!(json, "\"PASS\"");
    }
}
