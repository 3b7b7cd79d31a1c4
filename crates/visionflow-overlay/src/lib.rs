#![warn(missing_docs)]
//! # visionflow-overlay
//!
//! ## Purpose
//! Stateless overlay renderer: draws detection results (boxes, contours,
//! labels, rotation arrows) onto pixel buffers for thumbnails.
//!
//! ## Responsibilities
//! - Promote grayscale canvases to RGB before drawing.
//! - Keep one routine per detector kind with consistent styling.
//!
//! ## Data flow
//! The pipeline orchestrator hands the detector's canvas plus its objects
//! to [`OverlayRenderer::render`]; the annotated buffer feeds the
//! thumbnail encoder.
//!
//! ## Ownership and lifetimes
//! Rendering consumes nothing: the input canvas is cloned/promoted, drawn
//! on, and returned as a new owned image.
//!
//! ## Error model
//! Drawing clips at buffer edges and cannot fail; the only fallible step
//! is the gray-to-RGB promotion, which surfaces the core shape error.

mod draw;
mod font;

pub use draw::{
    BLUE, CYAN, GREEN, ORANGE, RED, Rgb, WHITE, YELLOW, draw_arrow, draw_circle,
    draw_filled_polygon, draw_line, draw_polyline, draw_rect, draw_text,
};

use visionflow_core::{CoreError, Image, ObjectKind, PixelFormat, VisionObject};

/// Stateless renderer with shared stroke and text settings.
#[derive(Debug, Clone, Copy)]
pub struct OverlayRenderer {
    /// Stroke thickness for boxes and contours.
    pub thickness: i32,
    /// Integer text scale.
    pub text_scale: u32,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self {
            thickness: 2,
            text_scale: 1,
        }
    }
}

impl OverlayRenderer {
    /// Creates a renderer with the default styling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches on the first object's kind and draws the matching
    /// routine; an empty object list yields the promoted canvas with no
    /// annotations beyond the per-kind banner drawn by the caller's
    /// routine.
    ///
    /// # Errors
    /// Returns [`CoreError`] when the canvas cannot be promoted to RGB.
    pub fn render(
        &self,
        canvas: &Image,
        objects: &[VisionObject],
        kind: ObjectKind,
        show_centers: bool,
    ) -> Result<Image, CoreError> {
        match kind {
            ObjectKind::TemplateMatch => self.render_template_matches(canvas, objects),
            ObjectKind::EdgeContour => self.render_edge_contours(canvas, objects, show_centers),
            ObjectKind::ColorRegion => match objects.first() {
                Some(object) => self.render_color_detection(canvas, object),
                None => promote(canvas),
            },
            ObjectKind::ArucoMarker => self.render_aruco_markers(canvas, objects),
            ObjectKind::RotationAnalysis => match objects.first() {
                Some(object) => self.render_rotation_analysis(canvas, object),
                None => promote(canvas),
            },
            ObjectKind::CameraCapture => promote(canvas),
        }
    }

    /// Bounding box plus confidence text for each template match.
    ///
    /// # Errors
    /// Returns [`CoreError`] when the canvas cannot be promoted to RGB.
    pub fn render_template_matches(
        &self,
        canvas: &Image,
        objects: &[VisionObject],
    ) -> Result<Image, CoreError> {
        let mut result = promote(canvas)?;
        for object in objects {
            let bbox = object.bounding_box;
            draw_rect(
                &mut result,
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height,
                GREEN,
                self.thickness,
            );
            draw_text(
                &mut result,
                &format!("{:.2}", object.confidence),
                bbox.x,
                bbox.y - 10,
                GREEN,
                self.text_scale,
                None,
            );
        }
        Ok(result)
    }

    /// Contours (green for the largest, yellow for the rest), boxes,
    /// optional centers, and the contour-count banner.
    ///
    /// # Errors
    /// Returns [`CoreError`] when the canvas cannot be promoted to RGB.
    pub fn render_edge_contours(
        &self,
        canvas: &Image,
        objects: &[VisionObject],
        show_centers: bool,
    ) -> Result<Image, CoreError> {
        let mut result = promote(canvas)?;

        for (index, object) in objects.iter().enumerate() {
            if let Some(contour) = object.contour.as_deref() {
                let color = if index == 0 { GREEN } else { YELLOW };
                draw_polyline(&mut result, contour, true, color, self.thickness);
            }

            let bbox = object.bounding_box;
            draw_rect(&mut result, bbox.x, bbox.y, bbox.width, bbox.height, BLUE, 1);

            if show_centers {
                draw_circle(
                    &mut result,
                    object.center.x as i32,
                    object.center.y as i32,
                    3,
                    RED,
                );
            }
        }

        draw_text(
            &mut result,
            &format!("Contours: {}", objects.len()),
            10,
            30,
            WHITE,
            self.text_scale,
            None,
        );
        Ok(result)
    }

    /// Match-status colored box, dominant-color label, optional MATCH/FAIL
    /// badge, and the masking contour when one was used.
    ///
    /// # Errors
    /// Returns [`CoreError`] when the canvas cannot be promoted to RGB.
    pub fn render_color_detection(
        &self,
        canvas: &Image,
        object: &VisionObject,
    ) -> Result<Image, CoreError> {
        let mut result = promote(canvas)?;

        let expected_given = object
            .properties
            .get("expected_color")
            .is_some_and(|v| !v.is_null());
        let matched = object
            .properties
            .get("match")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let color = if matched || !expected_given { GREEN } else { RED };

        if let Some(contour) = object.contour.as_deref() {
            draw_polyline(&mut result, contour, true, CYAN, self.thickness);
        }

        let bbox = object.bounding_box;
        draw_rect(
            &mut result,
            bbox.x,
            bbox.y,
            bbox.width,
            bbox.height,
            color,
            self.thickness,
        );

        let dominant = object
            .properties
            .get("dominant_color")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        draw_text(
            &mut result,
            &format!("{dominant} ({:.1}%)", object.confidence * 100.0),
            bbox.x,
            bbox.y - 10,
            color,
            self.text_scale,
            None,
        );

        if expected_given {
            let badge = if matched { "MATCH" } else { "FAIL" };
            draw_text(
                &mut result,
                badge,
                bbox.x,
                bbox.y + bbox.height + 15,
                color,
                self.text_scale,
                None,
            );
        }

        Ok(result)
    }

    /// Corner polylines, boxes, id labels, center dots, rotation arrows,
    /// and the marker-count banner.
    ///
    /// # Errors
    /// Returns [`CoreError`] when the canvas cannot be promoted to RGB.
    pub fn render_aruco_markers(
        &self,
        canvas: &Image,
        objects: &[VisionObject],
    ) -> Result<Image, CoreError> {
        let mut result = promote(canvas)?;

        for object in objects {
            if let Some(corners) = object.properties.get("corners").and_then(|v| v.as_array()) {
                let points: Vec<[i32; 2]> = corners
                    .iter()
                    .filter_map(|corner| {
                        let pair = corner.as_array()?;
                        Some([pair.first()?.as_f64()? as i32, pair.get(1)?.as_f64()? as i32])
                    })
                    .collect();
                draw_polyline(&mut result, &points, true, GREEN, self.thickness);

                // Arrow from center toward the top-right corner shows the
                // decoded orientation.
                if let Some(top_right) = points.get(1) {
                    draw_arrow(
                        &mut result,
                        object.center.x as i32,
                        object.center.y as i32,
                        top_right[0],
                        top_right[1],
                        ORANGE,
                        self.thickness,
                        0.3,
                    );
                }
            }

            let bbox = object.bounding_box;
            draw_rect(
                &mut result,
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height,
                GREEN,
                self.thickness,
            );

            let marker_id = object
                .properties
                .get("marker_id")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            draw_text(
                &mut result,
                &format!("ID:{marker_id}"),
                bbox.x,
                bbox.y - 10,
                GREEN,
                self.text_scale,
                None,
            );
            draw_circle(
                &mut result,
                object.center.x as i32,
                object.center.y as i32,
                5,
                CYAN,
            );
        }

        draw_text(
            &mut result,
            &format!("Markers: {}", objects.len()),
            10,
            30,
            WHITE,
            self.text_scale,
            None,
        );
        Ok(result)
    }

    /// Contour, center dot, fixed-length angle arrow, and the rotation
    /// banner.
    ///
    /// # Errors
    /// Returns [`CoreError`] when the canvas cannot be promoted to RGB.
    pub fn render_rotation_analysis(
        &self,
        canvas: &Image,
        object: &VisionObject,
    ) -> Result<Image, CoreError> {
        let mut result = promote(canvas)?;

        if let Some(contour) = object.contour.as_deref() {
            draw_polyline(&mut result, contour, true, GREEN, self.thickness);
        }

        let bbox = object.bounding_box;
        draw_rect(
            &mut result,
            bbox.x,
            bbox.y,
            bbox.width,
            bbox.height,
            CYAN,
            self.thickness,
        );

        let cx = object.center.x as i32;
        let cy = object.center.y as i32;
        draw_circle(&mut result, cx, cy, 5, RED);

        let angle = object.rotation_deg.unwrap_or(0.0);
        let radians = angle.to_radians();
        let length = 50.0;
        draw_arrow(
            &mut result,
            cx,
            cy,
            cx + (length * radians.cos()) as i32,
            cy + (length * radians.sin()) as i32,
            ORANGE,
            self.thickness,
            0.3,
        );

        let method = object
            .properties
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        draw_text(
            &mut result,
            &format!("Rotation: {angle:.1}deg ({method})"),
            10,
            30,
            WHITE,
            self.text_scale,
            None,
        );
        Ok(result)
    }
}

fn promote(canvas: &Image) -> Result<Image, CoreError> {
    match canvas.format() {
        PixelFormat::Rgb => Ok(canvas.clone()),
        PixelFormat::Gray => {
            let mut data = Vec::with_capacity(canvas.byte_cost() * 3);
            for &value in canvas.data() {
                data.extend_from_slice(&[value, value, value]);
            }
            Image::new(canvas.width(), canvas.height(), PixelFormat::Rgb, data)
        }
    }
}
