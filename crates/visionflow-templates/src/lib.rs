#![warn(missing_docs)]
//! # visionflow-templates
//!
//! ## Purpose
//! Persistent named templates for matching: pixel buffers stored as PNG
//! files on disk, indexed in memory by id.
//!
//! ## Responsibilities
//! - Persist each template as `<id>.png` plus a `<id>.json` sidecar
//!   carrying name, description, and creation time.
//! - Re-populate the index from the storage directory at startup.
//! - Validate and crop learn-from-ROI requests against the source image.
//!
//! ## Data flow
//! Uploads and learned regions flow in as [`visionflow_core::Image`];
//! matching reads pixels back out by id. Only templates survive process
//! restart; the index is rebuilt from disk.
//!
//! ## Ownership and lifetimes
//! The in-memory index holds metadata only; pixel data is read from disk on
//! every `get`, so a deleted file surfaces as `NotFound` rather than a
//! stale cache hit.
//!
//! ## Error model
//! Unknown ids and missing pixel files fail with
//! [`TemplateError::NotFound`]; disk and codec failures carry the
//! underlying error.

use std::collections::HashMap;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use visionflow_core::{Image, PixelFormat, Rect, new_id, now_ms};

/// Metadata describing one stored template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Opaque template id (also the on-disk file stem).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template width in pixels.
    pub width: u32,
    /// Template height in pixels.
    pub height: u32,
    /// Creation time in Unix epoch milliseconds.
    pub created_at_ms: u64,
}

/// Persistent template store backed by a storage directory.
pub struct TemplateStore {
    storage_dir: PathBuf,
    index: Mutex<HashMap<String, TemplateInfo>>,
}

impl TemplateStore {
    /// Opens (creating if needed) a store over `storage_dir` and rebuilds
    /// the index from the PNG files found there.
    ///
    /// Unreadable files are skipped with a warning; a missing sidecar
    /// falls back to the id as the template name.
    ///
    /// # Errors
    /// Returns [`TemplateError::Io`] when the directory cannot be created
    /// or listed.
    pub fn open(storage_dir: impl Into<PathBuf>) -> Result<Self, TemplateError> {
        let storage_dir = storage_dir.into();
        fs::create_dir_all(&storage_dir)?;

        let mut index = HashMap::new();
        for entry in fs::read_dir(&storage_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("png") {
                continue;
            }

            match load_info(&path) {
                Ok(info) => {
                    index.insert(info.id.clone(), info);
                }
                Err(error) => {
                    warn!("skipping unreadable template {}: {error}", path.display());
                }
            }
        }

        info!(
            "template store opened at {} with {} templates",
            storage_dir.display(),
            index.len()
        );

        Ok(Self {
            storage_dir,
            index: Mutex::new(index),
        })
    }

    /// Stores a template and returns its metadata.
    ///
    /// # Errors
    /// Returns [`TemplateError::Io`] / [`TemplateError::Codec`] when the
    /// PNG or sidecar cannot be written.
    pub fn upload(
        &self,
        name: &str,
        pixels: &Image,
        description: Option<&str>,
    ) -> Result<TemplateInfo, TemplateError> {
        let id = new_id("tmpl");
        let info = TemplateInfo {
            id: id.clone(),
            name: name.to_string(),
            description: description.map(str::to_string),
            width: pixels.width(),
            height: pixels.height(),
            created_at_ms: now_ms(),
        };

        write_png(&self.pixel_path(&id), pixels)?;
        let sidecar = serde_json::to_vec_pretty(&info)?;
        fs::write(self.sidecar_path(&id), sidecar)?;

        self.lock()?.insert(id.clone(), info.clone());
        info!("template {} ({name}) stored", info.id);
        Ok(info)
    }

    /// Crops `roi` out of `source` and stores it as a new template.
    ///
    /// # Errors
    /// Returns [`TemplateError::InvalidRegion`] when the ROI does not lie
    /// within the source image, plus any [`TemplateStore::upload`] error.
    pub fn learn_from_roi(
        &self,
        source: &Image,
        roi: &Rect,
        name: &str,
        description: Option<&str>,
    ) -> Result<TemplateInfo, TemplateError> {
        if !roi.is_valid(Some((source.width(), source.height()))) {
            return Err(TemplateError::InvalidRegion {
                region: roi.to_string(),
                width: source.width(),
                height: source.height(),
            });
        }

        let pixels = source
            .crop(roi)
            .map_err(|error| TemplateError::Codec(error.to_string()))?;
        self.upload(name, &pixels, description)
    }

    /// Lists all templates ordered by creation time.
    ///
    /// # Errors
    /// Returns [`TemplateError::LockPoisoned`] when a writer panicked.
    pub fn list(&self) -> Result<Vec<TemplateInfo>, TemplateError> {
        let index = self.lock()?;
        let mut templates: Vec<TemplateInfo> = index.values().cloned().collect();
        templates.sort_by_key(|info| (info.created_at_ms, info.id.clone()));
        Ok(templates)
    }

    /// Returns the metadata for one template.
    ///
    /// # Errors
    /// Returns [`TemplateError::NotFound`] for unknown ids.
    pub fn info(&self, id: &str) -> Result<TemplateInfo, TemplateError> {
        self.lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// Loads a template's pixels from disk.
    ///
    /// # Errors
    /// Returns [`TemplateError::NotFound`] for unknown ids or when the
    /// pixel file disappeared from disk.
    pub fn get(&self, id: &str) -> Result<Image, TemplateError> {
        if !self.lock()?.contains_key(id) {
            return Err(TemplateError::NotFound(id.to_string()));
        }

        let path = self.pixel_path(id);
        if !path.exists() {
            warn!("template {id} index entry has no pixel file");
            return Err(TemplateError::NotFound(id.to_string()));
        }

        read_png(&path)
    }

    /// Deletes a template from the index and from disk.
    ///
    /// Returns `false` when the id was unknown.
    ///
    /// # Errors
    /// Returns [`TemplateError::Io`] when a file removal fails for a reason
    /// other than the file already being gone.
    pub fn delete(&self, id: &str) -> Result<bool, TemplateError> {
        let removed = self.lock()?.remove(id).is_some();
        if !removed {
            return Ok(false);
        }

        for path in [self.pixel_path(id), self.sidecar_path(id)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(TemplateError::Io(error)),
            }
        }

        info!("template {id} deleted");
        Ok(true)
    }

    fn pixel_path(&self, id: &str) -> PathBuf {
        self.storage_dir.join(format!("{id}.png"))
    }

    fn sidecar_path(&self, id: &str) -> PathBuf {
        self.storage_dir.join(format!("{id}.json"))
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, TemplateInfo>>, TemplateError> {
        self.index.lock().map_err(|_| TemplateError::LockPoisoned)
    }
}

fn load_info(pixel_path: &Path) -> Result<TemplateInfo, TemplateError> {
    let id = pixel_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| TemplateError::Codec("non-utf8 template file name".to_string()))?
        .to_string();

    let sidecar_path = pixel_path.with_extension("json");
    if sidecar_path.exists() {
        let raw = fs::read(&sidecar_path)?;
        let mut info: TemplateInfo = serde_json::from_slice(&raw)?;
        info.id = id;
        return Ok(info);
    }

    // Sidecar lost; recover what the pixel file itself can tell us.
    let pixels = read_png(pixel_path)?;
    Ok(TemplateInfo {
        name: id.clone(),
        id,
        description: None,
        width: pixels.width(),
        height: pixels.height(),
        created_at_ms: 0,
    })
}

fn write_png(path: &Path, pixels: &Image) -> Result<(), TemplateError> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    let dynamic = match pixels.format() {
        PixelFormat::Gray => {
            let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                ImageBuffer::from_raw(pixels.width(), pixels.height(), pixels.data().to_vec())
                    .ok_or_else(|| TemplateError::Codec("gray buffer shape".to_string()))?;
            DynamicImage::ImageLuma8(buffer)
        }
        PixelFormat::Rgb => {
            let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                ImageBuffer::from_raw(pixels.width(), pixels.height(), pixels.data().to_vec())
                    .ok_or_else(|| TemplateError::Codec("rgb buffer shape".to_string()))?;
            DynamicImage::ImageRgb8(buffer)
        }
    };

    dynamic
        .write_to(&mut writer, ImageFormat::Png)
        .map_err(|error| TemplateError::Codec(error.to_string()))
}

fn read_png(path: &Path) -> Result<Image, TemplateError> {
    let decoded = image::ImageReader::open(path)?
        .decode()
        .map_err(|error| TemplateError::Codec(error.to_string()))?;

    let result = match decoded {
        DynamicImage::ImageLuma8(buffer) => Image::new(
            buffer.width(),
            buffer.height(),
            PixelFormat::Gray,
            buffer.into_raw(),
        ),
        other => {
            let buffer = other.into_rgb8();
            Image::new(
                buffer.width(),
                buffer.height(),
                PixelFormat::Rgb,
                buffer.into_raw(),
            )
        }
    };

    result.map_err(|error| TemplateError::Codec(error.to_string()))
}

/// Error type for template store operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template id is not indexed, or its pixel file is gone.
    #[error("template {0} not found")]
    NotFound(String),
    /// Learn-from-ROI region does not lie within the source image.
    #[error("region {region} is outside source image {width}x{height}")]
    InvalidRegion {
        /// Offending region, formatted.
        region: String,
        /// Source image width.
        width: u32,
        /// Source image height.
        height: u32,
    },
    /// Filesystem failure.
    #[error("template storage io failure: {0}")]
    Io(#[from] std::io::Error),
    /// PNG encode/decode or buffer shape failure.
    #[error("template codec failure: {0}")]
    Codec(String),
    /// Sidecar serialization failure.
    #[error("template sidecar failure: {0}")]
    Sidecar(#[from] serde_json::Error),
    /// A writer panicked while holding the index lock.
    #[error("template index lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    //! Unit tests for persistence and ROI learning.

    use super::*;

    fn checker(width: u32, height: u32) -> Image {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(if (x + y) % 2 == 0 { 255 } else { 0 });
            }
        }
        Image::new(width, height, PixelFormat::Gray, data).expect("image should build")
    }

    #[test]
    fn upload_then_get_round_trips_pixels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TemplateStore::open(dir.path()).expect("store opens");

        let pixels = checker(8, 6);
        let info = store
            .upload("fiducial-a", &pixels, Some("corner mark"))
            .expect("upload succeeds");

        let fetched = store.get(&info.id).expect("get succeeds");
        assert_eq!(fetched, pixels);
        assert_eq!(info.width, 8);
        assert_eq!(info.height, 6);
    }

    #[test]
    fn index_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = {
            let store = TemplateStore::open(dir.path()).expect("store opens");
            store
                .upload("persisted", &checker(4, 4), None)
                .expect("upload succeeds")
                .id
        };

        let reopened = TemplateStore::open(dir.path()).expect("store reopens");
        let listed = reopened.list().expect("list succeeds");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].name, "persisted");
        assert_eq!(reopened.get(&id).expect("get succeeds"), checker(4, 4));
    }

    #[test]
    fn learn_from_roi_crops_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TemplateStore::open(dir.path()).expect("store opens");

        let source = checker(16, 16);
        let info = store
            .learn_from_roi(&source, &Rect::new(2, 2, 5, 4), "learned", None)
            .expect("learn succeeds");

        let pixels = store.get(&info.id).expect("get succeeds");
        assert_eq!(pixels.width(), 5);
        assert_eq!(pixels.height(), 4);
        assert_eq!(pixels, source.crop(&Rect::new(2, 2, 5, 4)).expect("crop"));
    }

    #[test]
    fn learn_from_roi_rejects_out_of_bounds_region() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TemplateStore::open(dir.path()).expect("store opens");

        let result = store.learn_from_roi(&checker(8, 8), &Rect::new(4, 4, 10, 10), "bad", None);
        assert!(matches!(result, Err(TemplateError::InvalidRegion { .. })));
    }

    #[test]
    fn delete_removes_entry_and_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TemplateStore::open(dir.path()).expect("store opens");
        let info = store.upload("gone", &checker(4, 4), None).expect("upload");

        assert!(store.delete(&info.id).expect("delete succeeds"));
        assert!(matches!(
            store.get(&info.id),
            Err(TemplateError::NotFound(_))
        ));
        assert!(!dir.path().join(format!("{}.png", info.id)).exists());
        assert!(!store.delete(&info.id).expect("second delete is a no-op"));
    }

    #[test]
    fn missing_pixel_file_surfaces_as_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TemplateStore::open(dir.path()).expect("store opens");
        let info = store.upload("orphan", &checker(4, 4), None).expect("upload");

        fs::remove_file(dir.path().join(format!("{}.png", info.id))).expect("remove file");
        assert!(matches!(
            store.get(&info.id),
            Err(TemplateError::NotFound(_))
        ));
    }

    #[test]
    fn rgb_template_preserves_channels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TemplateStore::open(dir.path()).expect("store opens");

        let pixels = Image::solid_rgb(3, 3, [200, 64, 12]).expect("image should build");
        let info = store.upload("colored", &pixels, None).expect("upload");

        let fetched = store.get(&info.id).expect("get succeeds");
        assert_eq!(fetched.format(), PixelFormat::Rgb);
        assert_eq!(fetched, pixels);
    }
}
