//! Rotation estimation from a contour.

use serde_json::json;
use visionflow_core::{ObjectKind, Point, Rect, VisionObject};
use visionflow_imgproc::{contour_stats, ellipse_orientation, min_area_rect, pca_orientation};

use crate::{AngleRange, DetectError, RotationMethod, RotationParams};

/// Estimates the orientation of a contour's point set.
///
/// Emits exactly one `rotation_analysis` object whose angle is folded into
/// the requested range; the input contour is echoed back for downstream
/// overlay drawing.
///
/// # Errors
/// Returns [`DetectError::InsufficientContourPoints`] when the contour is
/// shorter than the method's minimum (3 for `min_area_rect`/`pca`, 5 for
/// `ellipse_fit`).
pub fn rotation_detect(
    contour: &[[i32; 2]],
    params: &RotationParams,
) -> Result<VisionObject, DetectError> {
    let required = match params.method {
        RotationMethod::EllipseFit => 5,
        RotationMethod::MinAreaRect | RotationMethod::Pca => 3,
    };
    if contour.len() < required {
        return Err(DetectError::InsufficientContourPoints {
            method: params.method.as_str(),
            required,
            actual: contour.len(),
        });
    }

    let (raw_angle, center, confidence) = match params.method {
        RotationMethod::MinAreaRect => {
            let rect = min_area_rect(contour)?;
            let mut angle = rect.angle_deg;
            // Report the orientation of the longer side.
            if rect.size.0 < rect.size.1 {
                angle += 90.0;
            }
            (angle, rect.center, 1.0)
        }
        RotationMethod::EllipseFit => {
            let (angle, center) = ellipse_orientation(contour)?;
            (angle, center, 0.9)
        }
        RotationMethod::Pca => {
            let pca = pca_orientation(contour)?;
            let confidence = if pca.elongation.is_finite() {
                (pca.elongation / 10.0).min(1.0)
            } else {
                1.0
            };
            (pca.angle_deg, pca.center, confidence)
        }
    };

    let angle = params.angle_range.normalize(AngleRange::Deg0To360.normalize(raw_angle));
    let contour_vec: Vec<[i32; 2]> = contour.to_vec();
    let stats = contour_stats(&contour_vec);

    let mut object = VisionObject::new(
        "rotation_analysis",
        ObjectKind::RotationAnalysis,
        bounding_box(contour),
        Point::new(center.0, center.1),
        confidence,
    );
    object.area = Some(stats.area);
    object.perimeter = Some(stats.perimeter);
    object.rotation_deg = Some(angle);
    object.set_property("method", json!(params.method.as_str()));
    object.set_property("angle_range", json!(params.angle_range.as_str()));
    object.set_property("absolute_angle", json!(angle));
    object.contour = Some(contour_vec);

    Ok(object)
}

fn bounding_box(contour: &[[i32; 2]]) -> Rect {
    let min_x = contour.iter().map(|p| p[0]).min().unwrap_or(0);
    let max_x = contour.iter().map(|p| p[0]).max().unwrap_or(0);
    let min_y = contour.iter().map(|p| p[1]).min().unwrap_or(0);
    let max_y = contour.iter().map(|p| p[1]).max().unwrap_or(0);
    Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}

#[cfg(test)]
mod tests {
    //! Unit tests for the three estimation methods.

    use super::*;

    fn diagonal_line(points: usize) -> Vec<[i32; 2]> {
        (0..points as i32).map(|i| [i * 2, i * 2]).collect()
    }

    fn tilted_rectangle() -> Vec<[i32; 2]> {
        // Axis-aligned 40x10 rectangle outline; the long side is horizontal.
        let mut points = Vec::new();
        for x in 0..40 {
            points.push([x, 0]);
            points.push([x, 9]);
        }
        for y in 0..10 {
            points.push([0, y]);
            points.push([39, y]);
        }
        points
    }

    #[test]
    fn pca_on_diagonal_reports_45_with_high_confidence() {
        let contour = diagonal_line(50);
        let params = RotationParams {
            method: RotationMethod::Pca,
            angle_range: AngleRange::Deg0To360,
        };

        let object = rotation_detect(&contour, &params).expect("rotation runs");
        let angle = object.rotation_deg.expect("angle set");
        assert!((angle - 45.0).abs() < 0.1 || (angle - 225.0).abs() < 0.1, "angle {angle}");
        assert!(object.confidence >= 0.99);
        assert_eq!(
            object.properties.get("method").and_then(|v| v.as_str()),
            Some("pca")
        );
    }

    #[test]
    fn min_area_rect_reports_long_side_orientation() {
        let params = RotationParams {
            method: RotationMethod::MinAreaRect,
            angle_range: AngleRange::Deg0To180,
        };
        let object = rotation_detect(&tilted_rectangle(), &params).expect("rotation runs");

        let angle = object.rotation_deg.expect("angle set");
        // Long side is horizontal.
        assert!(angle < 1.0 || (angle - 179.0).abs() < 1.0, "angle {angle}");
        assert_eq!(object.confidence, 1.0);
    }

    #[test]
    fn ellipse_fit_requires_five_points() {
        let params = RotationParams {
            method: RotationMethod::EllipseFit,
            angle_range: AngleRange::Deg0To360,
        };
        let short = diagonal_line(4);
        assert!(matches!(
            rotation_detect(&short, &params),
            Err(DetectError::InsufficientContourPoints {
                required: 5,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn two_points_are_rejected_for_every_method() {
        let short = diagonal_line(2);
        for method in [RotationMethod::MinAreaRect, RotationMethod::Pca] {
            let params = RotationParams {
                method,
                angle_range: AngleRange::Deg0To360,
            };
            assert!(rotation_detect(&short, &params).is_err());
        }
    }

    #[test]
    fn angle_range_folding_applies() {
        let contour = diagonal_line(50);
        let params = RotationParams {
            method: RotationMethod::Pca,
            angle_range: AngleRange::DegNeg180To180,
        };
        let object = rotation_detect(&contour, &params).expect("rotation runs");
        let angle = object.rotation_deg.expect("angle set");
        assert!((-180.0..=180.0).contains(&angle));
    }

    #[test]
    fn contour_is_echoed_back_with_geometry() {
        let contour = tilted_rectangle();
        let params = RotationParams::default();
        let object = rotation_detect(&contour, &params).expect("rotation runs");

        assert_eq!(object.contour.as_deref(), Some(&contour[..]));
        assert_eq!(object.bounding_box, Rect::new(0, 0, 40, 10));
        assert_eq!(object.object_type, ObjectKind::RotationAnalysis);
        assert_eq!(
            object.properties.get("angle_range").and_then(|v| v.as_str()),
            Some("0_360")
        );
    }
}
