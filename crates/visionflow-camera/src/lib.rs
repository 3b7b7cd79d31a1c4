#![warn(missing_docs)]
//! # visionflow-camera
//!
//! ## Purpose
//! Camera-facing collaborator edge: identifier parsing, a backend-agnostic
//! capture trait, a deterministic synthetic frame source, and the
//! single-active-stream registry.
//!
//! ## Responsibilities
//! - Normalize camera id strings (`test`, `usb_<n>`, `ip_<addr>`; unknown
//!   shapes fall back to `usb_0` with a warning).
//! - Generate synthetic inspection frames for CI and bring-up.
//! - Enforce the one-active-MJPEG-stream-per-process policy.
//!
//! ## Data flow
//! The app wires a [`CaptureBackend`]; captured frames enter the image
//! store and flow through the detection pipeline like any other image.
//!
//! ## Ownership and lifetimes
//! Captured frames are owned buffers; no backend memory escapes the trait
//! boundary.
//!
//! ## Error model
//! Unknown cameras and backend failures are reported as [`CameraError`].
//!
//! Real USB/IP capture is a deployment concern wired behind
//! [`CaptureBackend`]; this crate ships only the synthetic source.

use std::collections::HashMap;
use std::sync::Mutex;

use log::warn;
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;
use visionflow_core::Image;

/// Default synthetic frame width.
pub const TEST_FRAME_WIDTH: u32 = 1920;
/// Default synthetic frame height.
pub const TEST_FRAME_HEIGHT: u32 = 1080;

/// Parsed camera identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraId {
    /// Synthetic frame generator.
    Test,
    /// USB capture device at an index.
    Usb(u32),
    /// Networked stream at an address.
    Ip(String),
}

impl CameraId {
    /// Parses a raw identifier, normalizing unknown shapes to `usb_0`.
    pub fn parse(raw: &str) -> CameraId {
        if raw == "test" {
            return CameraId::Test;
        }

        if let Some(index) = raw.strip_prefix("usb_") {
            match index.parse::<u32>() {
                Ok(index) => return CameraId::Usb(index),
                Err(_) => {
                    warn!("invalid usb camera id '{raw}', defaulting to usb_0");
                    return CameraId::Usb(0);
                }
            }
        }

        if let Some(address) = raw.strip_prefix("ip_") {
            if !address.is_empty() {
                return CameraId::Ip(address.to_string());
            }
            warn!("empty ip camera address in '{raw}', defaulting to usb_0");
            return CameraId::Usb(0);
        }

        if raw.is_empty() {
            warn!("empty camera id, defaulting to usb_0");
        } else {
            warn!("unknown camera id shape '{raw}', defaulting to usb_0");
        }
        CameraId::Usb(0)
    }

    /// Canonical string form (`test`, `usb_<n>`, `ip_<addr>`).
    pub fn as_string(&self) -> String {
        match self {
            CameraId::Test => "test".to_string(),
            CameraId::Usb(index) => format!("usb_{index}"),
            CameraId::Ip(address) => format!("ip_{address}"),
        }
    }
}

/// Metadata describing one available camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Canonical camera id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Native frame width.
    pub width: u32,
    /// Native frame height.
    pub height: u32,
    /// Whether the backend currently reaches the device.
    pub connected: bool,
}

/// Trait implemented by concrete capture providers.
pub trait CaptureBackend: Send + Sync {
    /// Enumerates available cameras.
    fn list_cameras(&self) -> Vec<CameraInfo>;

    /// Captures one frame from the selected camera.
    ///
    /// # Errors
    /// Returns [`CameraError::UnknownCamera`] when the id is not served by
    /// this backend, [`CameraError::Backend`] for device failures.
    fn capture_frame(&self, camera: &CameraId) -> Result<Image, CameraError>;
}

/// Synthetic frame patterns cycled by the test camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPattern {
    /// 64-pixel checkerboard.
    Checkerboard,
    /// Horizontal brightness ramp.
    Gradient,
    /// Seeded uniform noise.
    Noise,
    /// Mid-gray solid frame.
    Solid,
}

const PATTERN_CYCLE: [TestPattern; 4] = [
    TestPattern::Checkerboard,
    TestPattern::Gradient,
    TestPattern::Noise,
    TestPattern::Solid,
];

/// Deterministic synthetic backend serving the `test` camera.
pub struct SyntheticCaptureBackend {
    width: u32,
    height: u32,
    sequence: Mutex<u64>,
}

impl SyntheticCaptureBackend {
    /// Creates a backend emitting default-resolution frames.
    pub fn new() -> Self {
        Self::with_resolution(TEST_FRAME_WIDTH, TEST_FRAME_HEIGHT)
    }

    /// Creates a backend with caller-chosen frame geometry.
    pub fn with_resolution(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            sequence: Mutex::new(0),
        }
    }

    /// Renders one pattern frame directly, outside the capture cycle.
    ///
    /// # Errors
    /// Returns [`CameraError::Backend`] when frame geometry is rejected.
    pub fn render_pattern(&self, pattern: TestPattern, seed: u64) -> Result<Image, CameraError> {
        let width = self.width;
        let height = self.height;
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);

        match pattern {
            TestPattern::Checkerboard => {
                for y in 0..height {
                    for x in 0..width {
                        let value = if ((x / 64) + (y / 64)) % 2 == 0 { 230 } else { 25 };
                        data.extend_from_slice(&[value, value, value]);
                    }
                }
            }
            TestPattern::Gradient => {
                for _y in 0..height {
                    for x in 0..width {
                        let value = (x as f64 / width.max(1) as f64 * 255.0) as u8;
                        data.extend_from_slice(&[value, value, value]);
                    }
                }
            }
            TestPattern::Noise => {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..(width as usize * height as usize) {
                    let value: u8 = rng.random();
                    data.extend_from_slice(&[value, value, value]);
                }
            }
            TestPattern::Solid => {
                data.resize(width as usize * height as usize * 3, 128);
            }
        }

        Image::new(width, height, visionflow_core::PixelFormat::Rgb, data)
            .map_err(|error| CameraError::Backend(error.to_string()))
    }
}

impl Default for SyntheticCaptureBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for SyntheticCaptureBackend {
    fn list_cameras(&self) -> Vec<CameraInfo> {
        vec![CameraInfo {
            id: "test".to_string(),
            name: "Synthetic Test Camera".to_string(),
            width: self.width,
            height: self.height,
            connected: true,
        }]
    }

    fn capture_frame(&self, camera: &CameraId) -> Result<Image, CameraError> {
        if *camera != CameraId::Test {
            return Err(CameraError::UnknownCamera(camera.as_string()));
        }

        let mut sequence = self
            .sequence
            .lock()
            .map_err(|_| CameraError::Backend("synthetic sequence lock poisoned".to_string()))?;
        *sequence += 1;
        let tick = *sequence;
        drop(sequence);

        let pattern = PATTERN_CYCLE[(tick as usize - 1) % PATTERN_CYCLE.len()];
        self.render_pattern(pattern, tick)
    }
}

/// Per-process registry enforcing a single active MJPEG stream.
///
/// Starting a stream marks every other camera's stream inactive; pump
/// loops poll [`StreamRegistry::is_active`] each frame and terminate when
/// their flag drops.
#[derive(Default)]
pub struct StreamRegistry {
    states: Mutex<HashMap<String, bool>>,
}

impl StreamRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates a stream for `camera_id`, deactivating all others.
    ///
    /// # Errors
    /// Returns [`CameraError::Backend`] when the registry lock is poisoned.
    pub fn start_stream(&self, camera_id: &str) -> Result<(), CameraError> {
        let mut states = self.lock()?;
        for (other, active) in states.iter_mut() {
            if *active && other != camera_id {
                warn!("marking stream for {other} inactive; {camera_id} takes over");
            }
            *active = false;
        }
        states.insert(camera_id.to_string(), true);
        Ok(())
    }

    /// Returns whether the camera's stream is still the active one.
    pub fn is_active(&self, camera_id: &str) -> bool {
        self.lock()
            .map(|states| states.get(camera_id).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    /// Deactivates the camera's stream flag.
    ///
    /// # Errors
    /// Returns [`CameraError::Backend`] when the registry lock is poisoned.
    pub fn stop_stream(&self, camera_id: &str) -> Result<(), CameraError> {
        let mut states = self.lock()?;
        states.insert(camera_id.to_string(), false);
        Ok(())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, bool>>, CameraError> {
        self.states
            .lock()
            .map_err(|_| CameraError::Backend("stream registry lock poisoned".to_string()))
    }
}

/// Camera layer error type.
#[derive(Debug, Error)]
pub enum CameraError {
    /// Requested camera is unknown to the backend.
    #[error("unknown camera: {0}")]
    UnknownCamera(String),
    /// Backend runtime failure.
    #[error("capture backend failure: {0}")]
    Backend(String),
}
