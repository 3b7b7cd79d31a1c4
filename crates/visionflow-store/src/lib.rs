#![warn(missing_docs)]
//! # visionflow-store
//!
//! ## Purpose
//! Bounded in-memory image cache: decoded pixel buffers keyed by opaque
//! ids, with byte-accounted least-recently-used eviction.
//!
//! ## Responsibilities
//! - Enforce both a byte budget and an entry-count budget at all times
//!   visible outside the critical section.
//! - Track per-entry insertion time, last-access time, byte cost, and a
//!   free-form metadata map.
//! - Evict in small batches so a burst of inserts amortizes locking.
//!
//! ## Data flow
//! Capture and ROI extraction `put` images; the pipeline orchestrator
//! `get`s them by id and owns the returned copy for the rest of the call,
//! so eviction mid-request never invalidates an in-flight buffer.
//!
//! ## Ownership and lifetimes
//! One mutex guards the map, the LRU order, and the byte/count accounting.
//! `get` returns an owned clone; no lock is held while callers process
//! pixels.
//!
//! ## Error model
//! Unknown ids fail with [`StoreError::NotFound`]; an entry whose cost
//! alone exceeds the byte budget fails with
//! [`StoreError::CapacityExceeded`]. A store full of valid entries always
//! accepts a new one by evicting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use log::{debug, info};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use visionflow_core::{Image, new_id, now_ms};

/// Number of entries removed per eviction round.
const EVICTION_BATCH_SIZE: usize = 5;

/// Usage fraction above which [`ImageStore::cleanup`] starts evicting.
const CLEANUP_THRESHOLD: f64 = 0.9;

/// Window for the `touched_recent` statistic, in seconds.
const RECENT_TOUCH_WINDOW_SECS: u64 = 60;

/// Construction-time bounds for the image store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageStoreConfig {
    /// Maximum number of cached images.
    pub max_images: usize,
    /// Maximum total byte cost of cached pixel buffers.
    pub max_bytes: usize,
}

impl Default for ImageStoreConfig {
    fn default() -> Self {
        Self {
            max_images: 100,
            max_bytes: 1_000 * 1024 * 1024,
        }
    }
}

/// Usage snapshot returned by [`ImageStore::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    /// Cached image count.
    pub count: usize,
    /// Total byte cost of cached buffers.
    pub bytes: usize,
    /// Configured byte budget.
    pub max_bytes: usize,
    /// Configured entry budget.
    pub max_images: usize,
    /// Byte usage as a percentage of the budget.
    pub percent: f64,
    /// Entries accessed within the last minute.
    pub touched_recent: usize,
}

struct Entry {
    image: Image,
    metadata: Map<String, Value>,
    inserted_at_ms: u64,
    last_access_tick: u64,
    last_access_at: Instant,
    byte_cost: usize,
}

struct StoreInner {
    entries: HashMap<String, Entry>,
    bytes: usize,
    access_tick: u64,
}

/// Bounded content cache for decoded images.
pub struct ImageStore {
    config: ImageStoreConfig,
    inner: Mutex<StoreInner>,
}

impl ImageStore {
    /// Creates an empty store with the given bounds.
    pub fn new(config: ImageStoreConfig) -> Self {
        info!(
            "image store initialized: max_images={} max_bytes={}",
            config.max_images, config.max_bytes
        );
        Self {
            config,
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                bytes: 0,
                access_tick: 0,
            }),
        }
    }

    /// Inserts an image and returns its freshly generated id.
    ///
    /// Eviction runs immediately after insertion until both budgets hold,
    /// removing least-recently-accessed entries in batches.
    ///
    /// # Errors
    /// Returns [`StoreError::CapacityExceeded`] only when this single
    /// entry's byte cost exceeds the byte budget. An entry costing exactly
    /// the budget is accepted and evicts everything else.
    pub fn put(
        &self,
        image: Image,
        metadata: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let byte_cost = image.byte_cost();
        if byte_cost > self.config.max_bytes {
            return Err(StoreError::CapacityExceeded {
                byte_cost,
                max_bytes: self.config.max_bytes,
            });
        }

        let mut inner = self.lock()?;
        inner.access_tick += 1;
        let tick = inner.access_tick;
        let id = new_id("img");

        inner.entries.insert(
            id.clone(),
            Entry {
                image,
                metadata,
                inserted_at_ms: now_ms(),
                last_access_tick: tick,
                last_access_at: Instant::now(),
                byte_cost,
            },
        );
        inner.bytes += byte_cost;

        let evicted = evict_until_within(&mut inner, self.config.max_images, self.config.max_bytes);
        if evicted > 0 {
            debug!("evicted {evicted} images after put of {id}");
        }

        Ok(id)
    }

    /// Returns a copy of the image, touching its access time.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn get(&self, id: &str) -> Result<Image, StoreError> {
        let mut inner = self.lock()?;
        inner.access_tick += 1;
        let tick = inner.access_tick;

        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.last_access_tick = tick;
        entry.last_access_at = Instant::now();
        Ok(entry.image.clone())
    }

    /// Returns a copy of the entry's metadata map without touching access
    /// time.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub fn get_metadata(&self, id: &str) -> Result<Map<String, Value>, StoreError> {
        let inner = self.lock()?;
        inner
            .entries
            .get(id)
            .map(|entry| {
                let mut metadata = entry.metadata.clone();
                metadata.insert("inserted_at_ms".to_string(), entry.inserted_at_ms.into());
                metadata
            })
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Returns `true` when the id is currently cached.
    ///
    /// This is a courtesy check for cleaner error messages upstream; the
    /// authoritative check is the `get` in the pipeline itself.
    pub fn contains(&self, id: &str) -> bool {
        self.lock()
            .map(|inner| inner.entries.contains_key(id))
            .unwrap_or(false)
    }

    /// Usage snapshot.
    ///
    /// # Errors
    /// Returns [`StoreError::LockPoisoned`] when a writer panicked.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let inner = self.lock()?;
        let touched_recent = inner
            .entries
            .values()
            .filter(|entry| entry.last_access_at.elapsed().as_secs() < RECENT_TOUCH_WINDOW_SECS)
            .count();

        Ok(StoreStats {
            count: inner.entries.len(),
            bytes: inner.bytes,
            max_bytes: self.config.max_bytes,
            max_images: self.config.max_images,
            percent: if self.config.max_bytes > 0 {
                (inner.bytes as f64 / self.config.max_bytes as f64) * 100.0
            } else {
                0.0
            },
            touched_recent,
        })
    }

    /// Opportunistic eviction invoked on memory pressure.
    ///
    /// Evicts LRU batches while usage exceeds 90% of either budget, even
    /// though both budgets still hold. Returns the number of evicted
    /// entries.
    ///
    /// # Errors
    /// Returns [`StoreError::LockPoisoned`] when a writer panicked.
    pub fn cleanup(&self) -> Result<usize, StoreError> {
        let mut inner = self.lock()?;
        let mut evicted = 0;

        while over_threshold(&inner, self.config.max_images, self.config.max_bytes) {
            let removed = evict_batch(&mut inner);
            if removed == 0 {
                break;
            }
            evicted += removed;
        }

        if evicted > 0 {
            info!("cleanup evicted {evicted} images");
        }
        Ok(evicted)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn over_threshold(inner: &StoreInner, max_images: usize, max_bytes: usize) -> bool {
    inner.entries.len() as f64 > max_images as f64 * CLEANUP_THRESHOLD
        || inner.bytes as f64 > max_bytes as f64 * CLEANUP_THRESHOLD
}

fn evict_until_within(inner: &mut StoreInner, max_images: usize, max_bytes: usize) -> usize {
    let mut evicted = 0;
    while inner.entries.len() > max_images || inner.bytes > max_bytes {
        // One sorted batch per round bounds the work done under the lock;
        // removal stops as soon as both budgets hold again.
        let batch = lru_batch(inner);
        if batch.is_empty() {
            break;
        }
        for id in batch {
            if inner.entries.len() <= max_images && inner.bytes <= max_bytes {
                break;
            }
            if let Some(entry) = inner.entries.remove(&id) {
                inner.bytes -= entry.byte_cost;
                evicted += 1;
            }
        }
    }
    evicted
}

fn evict_batch(inner: &mut StoreInner) -> usize {
    let mut removed = 0;
    for id in lru_batch(inner) {
        if let Some(entry) = inner.entries.remove(&id) {
            inner.bytes -= entry.byte_cost;
            removed += 1;
        }
    }
    removed
}

// Up to EVICTION_BATCH_SIZE least-recently-accessed ids, never including
// the most recently touched entry (the one a caller just inserted).
fn lru_batch(inner: &StoreInner) -> Vec<String> {
    if inner.entries.len() <= 1 {
        return Vec::new();
    }

    let mut by_age: Vec<(String, u64)> = inner
        .entries
        .iter()
        .map(|(id, entry)| (id.clone(), entry.last_access_tick))
        .collect();
    by_age.sort_by_key(|(_, tick)| *tick);
    by_age.truncate(by_age.len() - 1);
    by_age.truncate(EVICTION_BATCH_SIZE);
    by_age.into_iter().map(|(id, _)| id).collect()
}

/// Error type for image store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Image id is not cached.
    #[error("image {0} not found")]
    NotFound(String),
    /// Single entry larger than the whole byte budget.
    #[error("image of {byte_cost} bytes exceeds store budget of {max_bytes} bytes")]
    CapacityExceeded {
        /// Byte cost of the rejected image.
        byte_cost: usize,
        /// Configured byte budget.
        max_bytes: usize,
    },
    /// A writer panicked while holding the store lock.
    #[error("image store lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    //! Unit tests for accounting, eviction, and round trips.

    use visionflow_core::PixelFormat;

    use super::*;

    fn gray_image(width: u32, height: u32, value: u8) -> Image {
        Image::filled(width, height, PixelFormat::Gray, value).expect("image should build")
    }

    fn store(max_images: usize, max_bytes: usize) -> ImageStore {
        ImageStore::new(ImageStoreConfig {
            max_images,
            max_bytes,
        })
    }

    fn assert_invariants(store: &ImageStore) {
        let stats = store.stats().expect("stats should be readable");
        assert!(stats.bytes <= stats.max_bytes);
        assert!(stats.count <= stats.max_images);
    }

    #[test]
    fn put_then_get_round_trips_bytes() {
        let store = store(10, 10_000);
        let image = gray_image(10, 10, 42);
        let id = store.put(image.clone(), Map::new()).expect("put succeeds");

        let fetched = store.get(&id).expect("get succeeds");
        assert_eq!(fetched.data(), image.data());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = store(10, 10_000);
        assert!(matches!(
            store.get("img_missing"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn oversized_entry_is_rejected_without_insertion() {
        let store = store(10, 50);
        let result = store.put(gray_image(10, 10, 0), Map::new());
        assert!(matches!(result, Err(StoreError::CapacityExceeded { .. })));
        assert_eq!(store.stats().expect("stats").count, 0);
    }

    #[test]
    fn exact_budget_entry_is_accepted_and_evicts_the_rest() {
        let store = store(10, 100);
        for _ in 0..3 {
            store.put(gray_image(5, 5, 0), Map::new()).expect("put");
        }

        let id = store
            .put(gray_image(10, 10, 7), Map::new())
            .expect("exact-fit entry should be accepted");
        assert_invariants(&store);
        assert!(store.contains(&id));
        assert_eq!(store.stats().expect("stats").count, 1);
    }

    #[test]
    fn count_budget_triggers_lru_eviction() {
        let store = store(6, 1_000_000);
        let first = store.put(gray_image(4, 4, 1), Map::new()).expect("put");
        let mut last = String::new();
        for _ in 0..8 {
            last = store.put(gray_image(4, 4, 2), Map::new()).expect("put");
        }

        assert_invariants(&store);
        assert!(!store.contains(&first), "oldest entry should be evicted");
        assert!(store.contains(&last), "newest entry must survive");
    }

    #[test]
    fn get_refreshes_lru_position() {
        let store = store(100, 16 * 6);
        let protected = store.put(gray_image(4, 4, 1), Map::new()).expect("put");
        let mut others = Vec::new();
        for _ in 0..4 {
            others.push(store.put(gray_image(4, 4, 2), Map::new()).expect("put"));
        }

        // Touch the oldest entry, then overflow the byte budget.
        store.get(&protected).expect("get succeeds");
        store.put(gray_image(4, 4, 3), Map::new()).expect("put");
        store.put(gray_image(4, 4, 3), Map::new()).expect("put");

        assert_invariants(&store);
        assert!(
            store.contains(&protected),
            "recently touched entry should outlive older ones"
        );
    }

    #[test]
    fn invariants_hold_after_every_operation() {
        let store = store(5, 400);
        for i in 0..20 {
            let side = 4 + (i % 3) as u32;
            store
                .put(gray_image(side, side, i as u8), Map::new())
                .expect("put should always succeed by evicting");
            assert_invariants(&store);
        }
    }

    #[test]
    fn metadata_round_trips_and_carries_insert_time() {
        let store = store(10, 10_000);
        let mut metadata = Map::new();
        metadata.insert("camera_id".to_string(), "test".into());

        let id = store.put(gray_image(2, 2, 0), metadata).expect("put");
        let fetched = store.get_metadata(&id).expect("metadata exists");
        assert_eq!(fetched.get("camera_id"), Some(&Value::from("test")));
        assert!(fetched.contains_key("inserted_at_ms"));
    }

    #[test]
    fn cleanup_below_threshold_is_a_no_op() {
        let store = store(100, 1_000_000);
        store.put(gray_image(4, 4, 0), Map::new()).expect("put");
        assert_eq!(store.cleanup().expect("cleanup"), 0);
    }

    #[test]
    fn cleanup_over_threshold_evicts_batches() {
        let store = store(10, 1_000_000);
        for _ in 0..10 {
            store.put(gray_image(4, 4, 0), Map::new()).expect("put");
        }

        let evicted = store.cleanup().expect("cleanup");
        assert!(evicted >= EVICTION_BATCH_SIZE);
        assert_invariants(&store);
    }
}
