#![warn(missing_docs)]
//! # visionflow-service
//!
//! ## Purpose
//! The pipeline orchestrator and service facade: the single
//! acquire-image, extract-ROI, run-detector, remap-coordinates,
//! render-overlay, encode-thumbnail sequence shared by every detector,
//! plus outcome derivation and history recording.
//!
//! ## Responsibilities
//! - Resolve image ids against the image store (the authoritative
//!   existence check; the facade pre-check only improves error messages).
//! - Clip and extract ROI subviews, and remap detected coordinates back
//!   into full-image space.
//! - Derive PASS/FAIL/ERROR outcomes and append history records,
//!   including ERROR rows with empty detections.
//! - Map store/detector errors onto the HTTP status table.
//!
//! ## Data flow
//! Typed request in, `(objects, thumbnail_base64, processing_time_ms)`
//! out; elapsed time is captured after thumbnail encoding, before the
//! history write.
//!
//! ## Ownership and lifetimes
//! The orchestrator owns a copy of the decoded buffer for the duration of
//! a call, so store eviction mid-request never invalidates it. Stores are
//! shared behind `Arc`; detection itself holds no locks.
//!
//! ## Error model
//! Every failure is a [`ServiceError`] kind with a documented HTTP
//! mapping; nothing is retried.

mod error;
mod requests;
mod thumbnail;

pub use error::ServiceError;
pub use requests::{
    ArucoDetectRequest, CaptureResponse, ColorDetectRequest, EdgeDetectRequest,
    RoiExtractResponse, RotationDetectRequest, TemplateMatchRequest, VisionResponse,
};
pub use thumbnail::{DEFAULT_THUMBNAIL_WIDTH, decode_thumbnail, encode_thumbnail};

use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use serde_json::{Map, Value, json};
use visionflow_camera::{CameraError, CameraId, CaptureBackend};
use visionflow_core::{Image, InspectionOutcome, ObjectKind, Rect, VisionObject, now_ms};
use visionflow_detect::{
    Detection, aruco_detect, color_detect, edge_detect, rotation_detect, template_match,
};
use visionflow_history::HistoryRing;
use visionflow_overlay::OverlayRenderer;
use visionflow_store::ImageStore;
use visionflow_templates::{TemplateInfo, TemplateStore};

/// Vision processing facade over the stores and detectors.
pub struct VisionService {
    images: Arc<ImageStore>,
    templates: Arc<TemplateStore>,
    history: Arc<HistoryRing>,
    renderer: OverlayRenderer,
    thumbnail_width: u32,
}

impl VisionService {
    /// Creates a service over shared store handles.
    pub fn new(
        images: Arc<ImageStore>,
        templates: Arc<TemplateStore>,
        history: Arc<HistoryRing>,
        thumbnail_width: u32,
    ) -> Self {
        Self {
            images,
            templates,
            history,
            renderer: OverlayRenderer::new(),
            thumbnail_width,
        }
    }

    /// Shared image store handle.
    pub fn images(&self) -> &Arc<ImageStore> {
        &self.images
    }

    /// Shared template store handle.
    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    /// Shared history ring handle.
    pub fn history(&self) -> &Arc<HistoryRing> {
        &self.history
    }

    /// Template matching against a stored template.
    ///
    /// # Errors
    /// `ImageNotFound`, `TemplateNotFound`, `InvalidRoi`, or an internal
    /// detector failure.
    pub fn template_match(
        &self,
        request: &TemplateMatchRequest,
    ) -> Result<VisionResponse, ServiceError> {
        self.ensure_image(&request.image_id)?;
        let template = self.templates.get(&request.params.template_id)?;

        let result = self.orchestrate(
            &request.image_id,
            request.roi.as_ref(),
            ObjectKind::TemplateMatch,
            true,
            |sub, _| template_match(sub, &template, &request.params).map_err(Into::into),
        );

        let (objects, thumbnail_base64, processing_time_ms) =
            self.guard(result, request.record_history, &request.image_id)?;

        let outcome = if objects.is_empty() {
            InspectionOutcome::Fail
        } else {
            InspectionOutcome::Pass
        };
        if request.record_history {
            let mut row = Map::new();
            row.insert("type".into(), json!("template_match"));
            row.insert("name".into(), json!("template_match"));
            row.insert("template_id".into(), json!(request.params.template_id));
            row.insert("found".into(), json!(!objects.is_empty()));
            row.insert(
                "confidence".into(),
                json!(objects.first().map(|o| o.confidence).unwrap_or(0.0)),
            );
            row.insert("count".into(), json!(objects.len()));
            self.record(
                &request.image_id,
                outcome,
                vec![row],
                processing_time_ms,
                Some(thumbnail_base64.clone()),
            );
        }

        Ok(VisionResponse {
            objects,
            thumbnail_base64,
            processing_time_ms,
        })
    }

    /// Edge detection over the image or an ROI.
    ///
    /// # Errors
    /// `ImageNotFound`, `InvalidRoi`, or an internal detector failure.
    pub fn edge_detect(&self, request: &EdgeDetectRequest) -> Result<VisionResponse, ServiceError> {
        self.ensure_image(&request.image_id)?;

        let result = self.orchestrate(
            &request.image_id,
            request.roi.as_ref(),
            ObjectKind::EdgeContour,
            request.params.show_centers,
            |sub, _| edge_detect(sub, &request.params).map_err(Into::into),
        );

        let (objects, thumbnail_base64, processing_time_ms) =
            self.guard(result, request.record_history, &request.image_id)?;

        let outcome = if objects.is_empty() {
            InspectionOutcome::Fail
        } else {
            InspectionOutcome::Pass
        };
        if request.record_history {
            let mut row = Map::new();
            row.insert("type".into(), json!("edge_detection"));
            row.insert("name".into(), json!("edge_detection"));
            row.insert("method".into(), json!(request.params.method.as_str()));
            row.insert("found".into(), json!(!objects.is_empty()));
            row.insert("contour_count".into(), json!(objects.len()));
            self.record(
                &request.image_id,
                outcome,
                vec![row],
                processing_time_ms,
                Some(thumbnail_base64.clone()),
            );
        }

        Ok(VisionResponse {
            objects,
            thumbnail_base64,
            processing_time_ms,
        })
    }

    /// Dominant-color analysis over the image or an ROI.
    ///
    /// With an expected color, a non-matching dominant color empties the
    /// returned object list and the record is FAIL; without one the
    /// detection itself is the PASS.
    ///
    /// # Errors
    /// `ImageNotFound`, `InvalidRoi`, or an internal detector failure.
    pub fn color_detect(
        &self,
        request: &ColorDetectRequest,
    ) -> Result<VisionResponse, ServiceError> {
        self.ensure_image(&request.image_id)?;

        let contour = request.contour.clone();
        let params = request.params.clone();
        let result = self.orchestrate(
            &request.image_id,
            request.roi.as_ref(),
            ObjectKind::ColorRegion,
            true,
            move |sub, offset| {
                // The request contour is in full-image coordinates; the
                // detector masks in region-local space.
                let local: Option<Vec<[i32; 2]>> = contour.as_ref().map(|points| {
                    points
                        .iter()
                        .map(|p| [p[0] - offset.0, p[1] - offset.1])
                        .collect()
                });
                color_detect(sub, local.as_deref(), &params).map_err(Into::into)
            },
        );

        let (objects, thumbnail_base64, processing_time_ms) =
            self.guard(result, request.record_history, &request.image_id)?;

        let detected = objects.first().cloned();
        let matched = detected
            .as_ref()
            .and_then(|o| o.properties.get("match"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let expected_given = request.params.expected_color.is_some();
        let passed = matched || !expected_given;

        if request.record_history {
            let mut row = Map::new();
            row.insert("type".into(), json!("color_detection"));
            row.insert("name".into(), json!("color_detection"));
            row.insert(
                "dominant_color".into(),
                detected
                    .as_ref()
                    .and_then(|o| o.properties.get("dominant_color").cloned())
                    .unwrap_or(Value::Null),
            );
            row.insert(
                "expected_color".into(),
                match request.params.expected_color {
                    Some(expected) => json!(expected.as_str()),
                    None => Value::Null,
                },
            );
            row.insert("match".into(), json!(matched));
            row.insert("found".into(), json!(passed));
            row.insert(
                "confidence".into(),
                json!(detected.as_ref().map(|o| o.confidence).unwrap_or(0.0)),
            );
            self.record(
                &request.image_id,
                if passed {
                    InspectionOutcome::Pass
                } else {
                    InspectionOutcome::Fail
                },
                vec![row],
                processing_time_ms,
                Some(thumbnail_base64.clone()),
            );
        }

        // A failed expectation filters the object out of the response.
        let objects = if expected_given && !matched {
            Vec::new()
        } else {
            objects
        };

        Ok(VisionResponse {
            objects,
            thumbnail_base64,
            processing_time_ms,
        })
    }

    /// Fiducial marker detection over the image or an ROI.
    ///
    /// # Errors
    /// `ImageNotFound`, `InvalidRoi`, or an internal detector failure.
    pub fn aruco_detect(
        &self,
        request: &ArucoDetectRequest,
    ) -> Result<VisionResponse, ServiceError> {
        self.ensure_image(&request.image_id)?;

        let result = self.orchestrate(
            &request.image_id,
            request.roi.as_ref(),
            ObjectKind::ArucoMarker,
            true,
            |sub, _| aruco_detect(sub, &request.params).map_err(Into::into),
        );

        let (objects, thumbnail_base64, processing_time_ms) =
            self.guard(result, request.record_history, &request.image_id)?;

        let outcome = if objects.is_empty() {
            InspectionOutcome::Fail
        } else {
            InspectionOutcome::Pass
        };
        if request.record_history {
            let mut row = Map::new();
            row.insert("type".into(), json!("aruco_detection"));
            row.insert("name".into(), json!("aruco_detection"));
            row.insert(
                "dictionary".into(),
                json!(request.params.dictionary.as_str()),
            );
            row.insert("found".into(), json!(!objects.is_empty()));
            row.insert("marker_count".into(), json!(objects.len()));
            self.record(
                &request.image_id,
                outcome,
                vec![row],
                processing_time_ms,
                Some(thumbnail_base64.clone()),
            );
        }

        Ok(VisionResponse {
            objects,
            thumbnail_base64,
            processing_time_ms,
        })
    }

    /// Rotation estimation for a caller-provided contour.
    ///
    /// A valid contour always PASSES; only parameter errors fail.
    ///
    /// # Errors
    /// `ImageNotFound`, `InvalidRoi`, `InsufficientContourPoints`.
    pub fn rotation_detect(
        &self,
        request: &RotationDetectRequest,
    ) -> Result<VisionResponse, ServiceError> {
        self.ensure_image(&request.image_id)?;

        let contour = request.contour.clone();
        let params = request.params;
        let result = self.orchestrate(
            &request.image_id,
            request.roi.as_ref(),
            ObjectKind::RotationAnalysis,
            true,
            move |sub, offset| {
                let local: Vec<[i32; 2]> = contour
                    .iter()
                    .map(|p| [p[0] - offset.0, p[1] - offset.1])
                    .collect();
                let object = rotation_detect(&local, &params)?;
                Ok(Detection {
                    objects: vec![object],
                    canvas: sub.clone(),
                })
            },
        );

        let (objects, thumbnail_base64, processing_time_ms) =
            self.guard(result, request.record_history, &request.image_id)?;

        if request.record_history {
            let mut row = Map::new();
            row.insert("type".into(), json!("rotation_detection"));
            row.insert("name".into(), json!("rotation_detection"));
            row.insert("method".into(), json!(request.params.method.as_str()));
            row.insert("found".into(), json!(true));
            row.insert(
                "angle".into(),
                json!(objects.first().and_then(|o| o.rotation_deg).unwrap_or(0.0)),
            );
            self.record(
                &request.image_id,
                InspectionOutcome::Pass,
                vec![row],
                processing_time_ms,
                Some(thumbnail_base64.clone()),
            );
        }

        Ok(VisionResponse {
            objects,
            thumbnail_base64,
            processing_time_ms,
        })
    }

    /// Extracts a clipped ROI into a new stored image.
    ///
    /// The new entry's metadata records the source image id and the
    /// clipped rectangle.
    ///
    /// # Errors
    /// `ImageNotFound`, `InvalidRoi`, `CapacityExceeded`.
    pub fn extract_roi(
        &self,
        image_id: &str,
        roi: &Rect,
    ) -> Result<RoiExtractResponse, ServiceError> {
        let full = self.images.get(image_id)?;
        let clipped = roi.clip(full.width(), full.height());
        if clipped.is_empty() {
            return Err(ServiceError::InvalidRoi {
                roi: *roi,
                image_width: full.width(),
                image_height: full.height(),
            });
        }

        let cropped = full.crop(&clipped)?;
        let thumbnail_base64 = encode_thumbnail(&cropped, self.thumbnail_width)?;

        let mut metadata = Map::new();
        metadata.insert("source_image_id".into(), json!(image_id));
        metadata.insert("source_roi".into(), json!(clipped));
        let new_id = self.images.put(cropped, metadata)?;

        debug!("extracted {clipped} of {image_id} into {new_id}");
        Ok(RoiExtractResponse {
            image_id: new_id,
            thumbnail_base64,
            bounding_box: clipped,
        })
    }

    /// Captures one frame from a camera backend and stores it.
    ///
    /// # Errors
    /// `InvalidParameter` for cameras the backend does not serve,
    /// `InvalidRoi`, `CapacityExceeded`, or backend failures.
    pub fn capture_image(
        &self,
        backend: &dyn CaptureBackend,
        camera_id: &str,
        roi: Option<&Rect>,
    ) -> Result<CaptureResponse, ServiceError> {
        let camera = CameraId::parse(camera_id);
        let frame = backend.capture_frame(&camera).map_err(|error| match error {
            CameraError::UnknownCamera(id) => {
                ServiceError::InvalidParameter(format!("unknown camera {id}"))
            }
            CameraError::Backend(message) => ServiceError::Internal(message),
        })?;

        let stored = match roi {
            Some(roi) => {
                let clipped = roi.clip(frame.width(), frame.height());
                if clipped.is_empty() {
                    return Err(ServiceError::InvalidRoi {
                        roi: *roi,
                        image_width: frame.width(),
                        image_height: frame.height(),
                    });
                }
                frame.crop(&clipped)?
            }
            None => frame,
        };

        let timestamp_ms = now_ms();
        let thumbnail_base64 = encode_thumbnail(&stored, self.thumbnail_width)?;
        let mut metadata = Map::new();
        metadata.insert("camera_id".into(), json!(camera.as_string()));
        metadata.insert("captured_at_ms".into(), json!(timestamp_ms));
        let image_id = self.images.put(stored, metadata)?;

        Ok(CaptureResponse {
            image_id,
            thumbnail_base64,
            timestamp_ms,
        })
    }

    /// Stores an uploaded template.
    ///
    /// # Errors
    /// Template storage failures.
    pub fn template_upload(
        &self,
        name: &str,
        pixels: &Image,
        description: Option<&str>,
    ) -> Result<TemplateInfo, ServiceError> {
        Ok(self.templates.upload(name, pixels, description)?)
    }

    /// Learns a template from a stored image's ROI.
    ///
    /// # Errors
    /// `ImageNotFound`, `InvalidRoi`, template storage failures.
    pub fn template_learn(
        &self,
        image_id: &str,
        roi: &Rect,
        name: &str,
        description: Option<&str>,
    ) -> Result<TemplateInfo, ServiceError> {
        let source = self.images.get(image_id)?;
        if !roi.is_valid(Some((source.width(), source.height()))) {
            return Err(ServiceError::InvalidRoi {
                roi: *roi,
                image_width: source.width(),
                image_height: source.height(),
            });
        }
        Ok(self.templates.learn_from_roi(&source, roi, name, description)?)
    }

    /// Renders a template's thumbnail.
    ///
    /// # Errors
    /// `TemplateNotFound`, codec failures.
    pub fn template_thumbnail(&self, id: &str, max_width: u32) -> Result<String, ServiceError> {
        let pixels = self.templates.get(id)?;
        encode_thumbnail(&pixels, max_width)
    }

    fn ensure_image(&self, image_id: &str) -> Result<(), ServiceError> {
        // Courtesy existence check; the orchestrator's own fetch remains
        // the authoritative one.
        if !self.images.contains(image_id) {
            return Err(ServiceError::ImageNotFound(image_id.to_string()));
        }
        Ok(())
    }

    fn orchestrate<F>(
        &self,
        image_id: &str,
        roi: Option<&Rect>,
        kind: ObjectKind,
        show_centers: bool,
        detector: F,
    ) -> Result<(Vec<VisionObject>, String, u64), ServiceError>
    where
        F: FnOnce(&Image, (i32, i32)) -> Result<Detection, ServiceError>,
    {
        let start = Instant::now();

        let full = self.images.get(image_id)?;
        let (sub, offset) = match roi {
            Some(roi) => {
                let clipped = roi.clip(full.width(), full.height());
                if clipped.is_empty() {
                    return Err(ServiceError::InvalidRoi {
                        roi: *roi,
                        image_width: full.width(),
                        image_height: full.height(),
                    });
                }
                let offset = (clipped.x, clipped.y);
                (full.crop(&clipped)?, offset)
            }
            None => (full, (0, 0)),
        };

        let detection = detector(&sub, offset)?;

        // Overlays are drawn while coordinates are still region-local, so
        // annotations land on the pixels they describe; the response then
        // carries full-image coordinates.
        let annotated =
            self.renderer
                .render(&detection.canvas, &detection.objects, kind, show_centers)?;

        let mut objects = detection.objects;
        for object in &mut objects {
            object.translate(offset.0, offset.1);
        }

        let thumbnail = encode_thumbnail(&annotated, self.thumbnail_width)?;
        let elapsed = start.elapsed().as_millis() as u64;

        debug!(
            "{} on {image_id}: {} objects in {elapsed}ms",
            kind.as_str(),
            objects.len()
        );
        Ok((objects, thumbnail, elapsed))
    }

    // Propagates orchestration failures after appending the ERROR record.
    fn guard(
        &self,
        result: Result<(Vec<VisionObject>, String, u64), ServiceError>,
        record_history: bool,
        image_id: &str,
    ) -> Result<(Vec<VisionObject>, String, u64), ServiceError> {
        match result {
            Ok(value) => Ok(value),
            Err(error) => {
                if record_history {
                    let mut metadata = Map::new();
                    metadata.insert("error".into(), json!(error.to_string()));
                    if let Err(history_error) = self.history.add(
                        image_id,
                        InspectionOutcome::Error,
                        Vec::new(),
                        0,
                        None,
                        Some(metadata),
                    ) {
                        warn!("failed to record ERROR outcome: {history_error}");
                    }
                }
                Err(error)
            }
        }
    }

    fn record(
        &self,
        image_id: &str,
        outcome: InspectionOutcome,
        detections: Vec<Map<String, Value>>,
        processing_time_ms: u64,
        thumbnail_base64: Option<String>,
    ) {
        if let Err(error) = self.history.add(
            image_id,
            outcome,
            detections,
            processing_time_ms,
            thumbnail_base64,
            None,
        ) {
            warn!("failed to record inspection for {image_id}: {error}");
        }
    }
}
