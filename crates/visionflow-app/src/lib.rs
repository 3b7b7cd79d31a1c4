#![warn(missing_docs)]
//! # visionflow-app
//!
//! ## Purpose
//! Process wiring for the inspection server: configuration, logging,
//! store construction, and system status projection. The HTTP router
//! mounts on top of [`AppState`]; it is a deployment concern outside this
//! workspace.
//!
//! ## Responsibilities
//! - Load configuration from compiled defaults with `VISIONFLOW_*`
//!   environment overrides.
//! - Construct each store once and share handles behind `Arc`; there are
//!   no globals.
//! - Project store and history state into system status and performance
//!   metrics.
//!
//! ## Data flow
//! `Config::from_env` -> [`AppState::initialize`] -> request handlers hold
//! clones of the service/store handles.
//!
//! ## Error model
//! Malformed environment values fall back to defaults with a warning;
//! only template storage failures abort startup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use log::warn;
use serde::Serialize;
use thiserror::Error;
use visionflow_camera::{CaptureBackend, StreamRegistry, SyntheticCaptureBackend};
use visionflow_history::{HistoryRing, HistoryStatistics};
use visionflow_service::{DEFAULT_THUMBNAIL_WIDTH, VisionService};
use visionflow_store::{ImageStore, ImageStoreConfig, StoreStats};
use visionflow_templates::{TemplateError, TemplateStore};

/// Application version from the crate manifest.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide configuration consumed at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Image store entry budget.
    pub max_images: usize,
    /// Image store byte budget.
    pub max_memory_mb: usize,
    /// Thumbnail width for every vision response.
    pub thumbnail_width: u32,
    /// History ring capacity.
    pub history_size: usize,
    /// Template storage directory.
    pub template_dir: PathBuf,
    /// Allowed CORS origins for the HTTP surface.
    pub cors_origins: Vec<String>,
    /// Extra diagnostics toggles.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_images: 100,
            max_memory_mb: 1_000,
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            history_size: 1_000,
            template_dir: PathBuf::from("templates"),
            cors_origins: vec!["*".to_string()],
            debug: false,
        }
    }
}

impl Config {
    /// Builds the configuration from defaults plus `VISIONFLOW_*`
    /// environment overrides.
    ///
    /// Unparseable values keep the default and log a warning.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Some(value) = parsed_env("VISIONFLOW_MAX_IMAGES") {
            config.max_images = value;
        }
        if let Some(value) = parsed_env("VISIONFLOW_MAX_MEMORY_MB") {
            config.max_memory_mb = value;
        }
        if let Some(value) = parsed_env("VISIONFLOW_THUMBNAIL_WIDTH") {
            config.thumbnail_width = value;
        }
        if let Some(value) = parsed_env("VISIONFLOW_HISTORY_SIZE") {
            config.history_size = value;
        }
        if let Ok(value) = std::env::var("VISIONFLOW_TEMPLATE_DIR") {
            if !value.trim().is_empty() {
                config.template_dir = PathBuf::from(value);
            }
        }
        if let Ok(value) = std::env::var("VISIONFLOW_CORS_ORIGINS") {
            let origins: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
            if !origins.is_empty() {
                config.cors_origins = origins;
            }
        }
        if let Ok(value) = std::env::var("VISIONFLOW_DEBUG") {
            config.debug = matches!(value.trim(), "1" | "true" | "yes");
        }

        config
    }
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring unparseable {name}={raw}");
            None
        }
    }
}

/// Shared process state handed to request handlers.
pub struct AppState {
    /// Effective configuration.
    pub config: Config,
    /// Vision facade over the stores.
    pub service: VisionService,
    /// Capture backend serving the `test` camera.
    pub camera: Arc<dyn CaptureBackend>,
    /// Single-active-stream registry.
    pub streams: StreamRegistry,
    started_at: Instant,
}

impl AppState {
    /// Constructs every store once and wires the service facade.
    ///
    /// # Errors
    /// Returns [`AppError::Templates`] when the template directory cannot
    /// be opened.
    pub fn initialize(config: Config) -> Result<Self, AppError> {
        let images = Arc::new(ImageStore::new(ImageStoreConfig {
            max_images: config.max_images,
            max_bytes: config.max_memory_mb * 1024 * 1024,
        }));
        let templates = Arc::new(TemplateStore::open(&config.template_dir)?);
        let history = Arc::new(HistoryRing::new(config.history_size));

        let service = VisionService::new(images, templates, history, config.thumbnail_width);

        Ok(Self {
            config,
            service,
            camera: Arc::new(SyntheticCaptureBackend::new()),
            streams: StreamRegistry::new(),
            started_at: Instant::now(),
        })
    }

    /// Projects the current system status.
    ///
    /// # Errors
    /// Returns [`AppError::Projection`] when a store lock is poisoned.
    pub fn system_status(&self) -> Result<SystemStatus, AppError> {
        let images = self
            .service
            .images()
            .stats()
            .map_err(|error| AppError::Projection(error.to_string()))?;
        let history = self
            .service
            .history()
            .statistics()
            .map_err(|error| AppError::Projection(error.to_string()))?;

        Ok(SystemStatus {
            status: "ok".to_string(),
            version: APP_VERSION.to_string(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            image_store: images,
            history,
            active_cameras: self.camera.list_cameras().len(),
        })
    }

    /// Projects throughput metrics from the history counters.
    ///
    /// # Errors
    /// Returns [`AppError::Projection`] when the history lock is poisoned.
    pub fn performance_metrics(&self) -> Result<PerformanceMetrics, AppError> {
        let history = self
            .service
            .history()
            .statistics()
            .map_err(|error| AppError::Projection(error.to_string()))?;

        let uptime_mins = self.started_at.elapsed().as_secs_f64() / 60.0;
        let operations_per_minute = if uptime_mins > 0.0 {
            history.total as f64 / uptime_mins
        } else {
            0.0
        };

        Ok(PerformanceMetrics {
            avg_processing_time_ms: history.avg_time_ms,
            total_inspections: history.total,
            success_rate: history.success_rate,
            operations_per_minute,
        })
    }
}

/// System status projection for the `/system/status` surface.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    /// Liveness flag.
    pub status: String,
    /// Application version.
    pub version: String,
    /// Seconds since state construction.
    pub uptime_secs: u64,
    /// Image store usage snapshot.
    pub image_store: StoreStats,
    /// History ring counters.
    pub history: HistoryStatistics,
    /// Cameras the backend currently enumerates.
    pub active_cameras: usize,
}

/// Throughput metrics projection for the `/system/performance` surface.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    /// Mean processing time over lifetime inspections.
    pub avg_processing_time_ms: f64,
    /// Lifetime inspection count.
    pub total_inspections: u64,
    /// Lifetime pass percentage.
    pub success_rate: f64,
    /// Lifetime inspections per uptime minute.
    pub operations_per_minute: f64,
}

/// Installs the global tracing subscriber, honoring `RUST_LOG`.
///
/// Call once at process start; repeated initialization is ignored so
/// tests can race it safely.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// Application wiring errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Template storage could not be opened at startup.
    #[error("template store initialization failed: {0}")]
    Templates(#[from] TemplateError),
    /// A status projection could not read a store.
    #[error("status projection failed: {0}")]
    Projection(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for configuration parsing defaults.

    use super::*;

    #[test]
    fn default_config_matches_documented_limits() {
        let config = Config::default();
        assert_eq!(config.max_images, 100);
        assert_eq!(config.max_memory_mb, 1_000);
        assert_eq!(config.thumbnail_width, 320);
        assert_eq!(config.history_size, 1_000);
        assert!(!config.debug);
    }
}
