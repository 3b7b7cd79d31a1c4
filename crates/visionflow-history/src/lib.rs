#![warn(missing_docs)]
//! # visionflow-history
//!
//! ## Purpose
//! Fixed-capacity circular ledger of inspection outcomes with live
//! statistics, time-bucket aggregation, and failure analysis.
//!
//! ## Responsibilities
//! - Append inspection records in O(1), dropping the oldest at capacity.
//! - Keep lifetime counters that are never decremented by ring eviction.
//! - Derive summaries at append time so records stay immutable.
//! - Export and re-import the ring as a JSON blob.
//!
//! ## Data flow
//! The service facade appends one record per detection request; dashboards
//! read `recent`, `statistics`, `time_series`, and `failure_analysis`.
//!
//! ## Ownership and lifetimes
//! One mutex guards the ring and every counter; all reads copy records out
//! so callers never hold the lock while formatting responses.
//!
//! ## Error model
//! Unknown record ids fail with [`HistoryError::NotFound`]; zero bucket
//! sizes fail with [`HistoryError::InvalidParameter`].

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use visionflow_core::{InspectionOutcome, new_id, now_ms};

/// One immutable row in the inspection ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRecord {
    /// Generated record id.
    pub id: String,
    /// Append time in Unix epoch milliseconds.
    pub timestamp_ms: u64,
    /// Source image id.
    pub image_id: String,
    /// Inspection outcome.
    pub outcome: InspectionOutcome,
    /// Derived summary, `"P/T checks passed"`.
    pub summary: String,
    /// Optional annotated thumbnail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_base64: Option<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
    /// Per-check payload rows (`found`, `name`, detector specifics).
    pub detections: Vec<Map<String, Value>>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Live counters returned by [`HistoryRing::statistics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStatistics {
    /// Lifetime record count (ring eviction does not decrement).
    pub total: u64,
    /// Lifetime PASS count.
    pub passed: u64,
    /// Lifetime FAIL count.
    pub failed: u64,
    /// Lifetime ERROR count.
    pub errors: u64,
    /// Pass percentage over lifetime records, rounded to 2 decimals.
    pub success_rate: f64,
    /// Mean processing time over lifetime records, rounded to 2 decimals.
    pub avg_time_ms: f64,
    /// Records currently held in the ring.
    pub buffer_usage: usize,
    /// Ring capacity.
    pub buffer_max: usize,
    /// Derived slice over ring records from the last hour.
    pub recent_hour: RecentHourStats,
}

/// Last-hour slice of the ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentHourStats {
    /// Records appended within the last hour.
    pub total: usize,
    /// PASS records within the last hour.
    pub passed: usize,
    /// FAIL records within the last hour.
    pub failed: usize,
}

/// One aggregation bucket from [`HistoryRing::time_series`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    /// Bucket start as an RFC3339 timestamp.
    pub timestamp: String,
    /// Records in the bucket.
    pub total: usize,
    /// PASS records in the bucket.
    pub passed: usize,
    /// FAIL records in the bucket.
    pub failed: usize,
}

/// Failure-pattern summary from [`HistoryRing::failure_analysis`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureAnalysis {
    /// FAIL records currently in the ring.
    pub total_failures: usize,
    /// Top five failing detection names with counts.
    pub common_failures: Vec<FailureCount>,
    /// FAIL share of the ring, in percent.
    pub failure_rate: f64,
}

/// One named failure tally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureCount {
    /// Detection name.
    pub name: String,
    /// Times this detection reported `found = false` in FAIL records.
    pub count: u64,
}

/// Serialized ring contents for export and import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryExport {
    /// Records oldest-first.
    pub inspections: Vec<InspectionRecord>,
    /// Statistics snapshot at export time (informational; import rebuilds
    /// counters from the records themselves).
    pub statistics: HistoryStatistics,
}

struct RingInner {
    buffer: VecDeque<InspectionRecord>,
    total_ever: u64,
    pass_ever: u64,
    fail_ever: u64,
    error_ever: u64,
    elapsed_ever_ms: u64,
}

/// Fixed-capacity circular inspection ledger.
pub struct HistoryRing {
    capacity: usize,
    inner: Mutex<RingInner>,
}

impl HistoryRing {
    /// Creates an empty ring holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        info!("history ring initialized with capacity {capacity}");
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(RingInner {
                buffer: VecDeque::with_capacity(capacity.max(1)),
                total_ever: 0,
                pass_ever: 0,
                fail_ever: 0,
                error_ever: 0,
                elapsed_ever_ms: 0,
            }),
        }
    }

    /// Appends one inspection record and returns its generated id.
    ///
    /// The summary is derived here (count of detections with a truthy
    /// `found` over the total) and stored, never recomputed.
    ///
    /// # Errors
    /// Returns [`HistoryError::LockPoisoned`] when a writer panicked.
    pub fn add(
        &self,
        image_id: &str,
        outcome: InspectionOutcome,
        detections: Vec<Map<String, Value>>,
        processing_time_ms: u64,
        thumbnail_base64: Option<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String, HistoryError> {
        let passed = detections
            .iter()
            .filter(|d| d.get("found").is_some_and(is_truthy))
            .count();
        let summary = format!("{passed}/{} checks passed", detections.len());

        let record = InspectionRecord {
            id: new_id("hist"),
            timestamp_ms: now_ms(),
            image_id: image_id.to_string(),
            outcome,
            summary,
            thumbnail_base64,
            processing_time_ms,
            detections,
            metadata: metadata.unwrap_or_default(),
        };

        let mut inner = self.lock()?;
        let id = record.id.clone();
        debug!("inspection {id}: {} - {}", record.outcome, record.summary);

        push_record(&mut inner, record, self.capacity);
        Ok(id)
    }

    /// Fetches one record still present in the ring.
    ///
    /// # Errors
    /// Returns [`HistoryError::NotFound`] when the id was never added or
    /// has been evicted.
    pub fn get(&self, id: &str) -> Result<InspectionRecord, HistoryError> {
        let inner = self.lock()?;
        inner
            .buffer
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or_else(|| HistoryError::NotFound(id.to_string()))
    }

    /// Returns up to `limit` records newest-first, optionally filtered by
    /// outcome.
    ///
    /// # Errors
    /// Returns [`HistoryError::LockPoisoned`] when a writer panicked.
    pub fn recent(
        &self,
        limit: usize,
        outcome_filter: Option<InspectionOutcome>,
    ) -> Result<Vec<InspectionRecord>, HistoryError> {
        let inner = self.lock()?;
        Ok(inner
            .buffer
            .iter()
            .rev()
            .filter(|record| outcome_filter.is_none_or(|wanted| record.outcome == wanted))
            .take(limit)
            .cloned()
            .collect())
    }

    /// Lifetime counters plus the derived last-hour slice.
    ///
    /// # Errors
    /// Returns [`HistoryError::LockPoisoned`] when a writer panicked.
    pub fn statistics(&self) -> Result<HistoryStatistics, HistoryError> {
        let inner = self.lock()?;
        Ok(compute_statistics(&inner, self.capacity))
    }

    /// Scans the ring into `floor(duration_hours * 60 / bucket_minutes)`
    /// buckets spanning `[now - duration_hours, now)`.
    ///
    /// # Errors
    /// Returns [`HistoryError::InvalidParameter`] for zero bucket size or
    /// duration.
    pub fn time_series(
        &self,
        bucket_minutes: u32,
        duration_hours: u32,
    ) -> Result<Vec<TimeBucket>, HistoryError> {
        if bucket_minutes == 0 {
            return Err(HistoryError::InvalidParameter("bucket_minutes"));
        }
        if duration_hours == 0 {
            return Err(HistoryError::InvalidParameter("duration_hours"));
        }

        let bucket_count = (duration_hours as u64 * 60 / bucket_minutes as u64) as usize;
        let bucket_ms = bucket_minutes as u64 * 60_000;
        let now = now_ms();
        let start = now.saturating_sub(duration_hours as u64 * 3_600_000);

        let inner = self.lock()?;
        let mut buckets = Vec::with_capacity(bucket_count);

        for index in 0..bucket_count {
            let bucket_start = start + index as u64 * bucket_ms;
            let bucket_end = bucket_start + bucket_ms;

            let mut total = 0;
            let mut passed = 0;
            let mut failed = 0;
            for record in &inner.buffer {
                if record.timestamp_ms >= bucket_start && record.timestamp_ms < bucket_end {
                    total += 1;
                    match record.outcome {
                        InspectionOutcome::Pass => passed += 1,
                        InspectionOutcome::Fail => failed += 1,
                        InspectionOutcome::Error => {}
                    }
                }
            }

            buckets.push(TimeBucket {
                timestamp: rfc3339(bucket_start),
                total,
                passed,
                failed,
            });
        }

        Ok(buckets)
    }

    /// Tallies which detection names fail most often across FAIL records.
    ///
    /// # Errors
    /// Returns [`HistoryError::LockPoisoned`] when a writer panicked.
    pub fn failure_analysis(&self) -> Result<FailureAnalysis, HistoryError> {
        let inner = self.lock()?;
        let failures: Vec<&InspectionRecord> = inner
            .buffer
            .iter()
            .filter(|record| record.outcome == InspectionOutcome::Fail)
            .collect();

        if failures.is_empty() {
            return Ok(FailureAnalysis {
                total_failures: 0,
                common_failures: Vec::new(),
                failure_rate: 0.0,
            });
        }

        let mut counts: HashMap<String, u64> = HashMap::new();
        for record in &failures {
            for detection in &record.detections {
                let found = detection.get("found").is_some_and(is_truthy);
                if !found {
                    let name = detection
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown")
                        .to_string();
                    *counts.entry(name).or_insert(0) += 1;
                }
            }
        }

        let mut common: Vec<FailureCount> = counts
            .into_iter()
            .map(|(name, count)| FailureCount { name, count })
            .collect();
        common.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        common.truncate(5);

        Ok(FailureAnalysis {
            total_failures: failures.len(),
            common_failures: common,
            failure_rate: failures.len() as f64 / inner.buffer.len() as f64 * 100.0,
        })
    }

    /// Wipes the ring and resets every counter.
    ///
    /// # Errors
    /// Returns [`HistoryError::LockPoisoned`] when a writer panicked.
    pub fn clear(&self) -> Result<(), HistoryError> {
        let mut inner = self.lock()?;
        inner.buffer.clear();
        inner.total_ever = 0;
        inner.pass_ever = 0;
        inner.fail_ever = 0;
        inner.error_ever = 0;
        inner.elapsed_ever_ms = 0;
        info!("history ring cleared");
        Ok(())
    }

    /// Serializes the ring contents and a statistics snapshot to JSON.
    ///
    /// # Errors
    /// Returns [`HistoryError::Codec`] when serialization fails.
    pub fn export_json(&self) -> Result<Vec<u8>, HistoryError> {
        let inner = self.lock()?;
        let export = HistoryExport {
            inspections: inner.buffer.iter().cloned().collect(),
            statistics: compute_statistics(&inner, self.capacity),
        };
        drop(inner);
        Ok(serde_json::to_vec(&export)?)
    }

    /// Replaces the ring contents with an exported blob.
    ///
    /// Counters are rebuilt from the imported rows; when the blob holds
    /// more rows than the capacity, only the newest rows stay in the ring
    /// but every row is counted.
    ///
    /// # Errors
    /// Returns [`HistoryError::Codec`] for malformed blobs.
    pub fn import_json(&self, blob: &[u8]) -> Result<usize, HistoryError> {
        let export: HistoryExport = serde_json::from_slice(blob)?;

        let mut inner = self.lock()?;
        inner.buffer.clear();
        inner.total_ever = 0;
        inner.pass_ever = 0;
        inner.fail_ever = 0;
        inner.error_ever = 0;
        inner.elapsed_ever_ms = 0;

        let imported = export.inspections.len();
        for record in export.inspections {
            push_record(&mut inner, record, self.capacity);
        }

        info!("imported {imported} inspection records");
        Ok(imported)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RingInner>, HistoryError> {
        self.inner.lock().map_err(|_| HistoryError::LockPoisoned)
    }
}

fn push_record(inner: &mut RingInner, record: InspectionRecord, capacity: usize) {
    if inner.buffer.len() == capacity {
        inner.buffer.pop_front();
    }

    inner.total_ever += 1;
    inner.elapsed_ever_ms += record.processing_time_ms;
    match record.outcome {
        InspectionOutcome::Pass => inner.pass_ever += 1,
        InspectionOutcome::Fail => inner.fail_ever += 1,
        InspectionOutcome::Error => inner.error_ever += 1,
    }

    inner.buffer.push_back(record);
}

fn compute_statistics(inner: &RingInner, capacity: usize) -> HistoryStatistics {
    let hour_ago = now_ms().saturating_sub(3_600_000);
    let recent: Vec<&InspectionRecord> = inner
        .buffer
        .iter()
        .filter(|record| record.timestamp_ms >= hour_ago)
        .collect();

    let (success_rate, avg_time_ms) = if inner.total_ever > 0 {
        (
            round2(inner.pass_ever as f64 / inner.total_ever as f64 * 100.0),
            round2(inner.elapsed_ever_ms as f64 / inner.total_ever as f64),
        )
    } else {
        (0.0, 0.0)
    };

    HistoryStatistics {
        total: inner.total_ever,
        passed: inner.pass_ever,
        failed: inner.fail_ever,
        errors: inner.error_ever,
        success_rate,
        avg_time_ms,
        buffer_usage: inner.buffer.len(),
        buffer_max: capacity,
        recent_hour: RecentHourStats {
            total: recent.len(),
            passed: recent
                .iter()
                .filter(|r| r.outcome == InspectionOutcome::Pass)
                .count(),
            failed: recent
                .iter()
                .filter(|r| r.outcome == InspectionOutcome::Fail)
                .count(),
        },
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|v| v != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn rfc3339(timestamp_ms: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(timestamp_ms as i128 * 1_000_000)
        .ok()
        .and_then(|moment| moment.format(&Rfc3339).ok())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Error type for history ring operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Record id absent from the ring.
    #[error("inspection {0} not found")]
    NotFound(String),
    /// Zero-sized bucket or duration.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// Export/import serialization failure.
    #[error("history codec failure: {0}")]
    Codec(#[from] serde_json::Error),
    /// A writer panicked while holding the ring lock.
    #[error("history ring lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
mod tests {
    //! Unit tests for ring behavior, counters, and export/import.

    use super::*;

    fn detection(name: &str, found: bool) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("name".to_string(), name.into());
        map.insert("found".to_string(), found.into());
        map
    }

    fn add_outcome(ring: &HistoryRing, outcome: InspectionOutcome, found: bool) -> String {
        ring.add(
            "img_0001",
            outcome,
            vec![detection("check", found)],
            12,
            None,
            None,
        )
        .expect("add succeeds")
    }

    #[test]
    fn summary_counts_truthy_found_entries() {
        let ring = HistoryRing::new(10);
        let id = ring
            .add(
                "img_0001",
                InspectionOutcome::Pass,
                vec![
                    detection("a", true),
                    detection("b", false),
                    detection("c", true),
                ],
                5,
                None,
                None,
            )
            .expect("add succeeds");

        let record = ring.get(&id).expect("record present");
        assert_eq!(record.summary, "2/3 checks passed");
    }

    #[test]
    fn ring_wraps_and_counters_keep_lifetime_totals() {
        let ring = HistoryRing::new(3);
        let first = add_outcome(&ring, InspectionOutcome::Pass, true);
        for _ in 0..4 {
            add_outcome(&ring, InspectionOutcome::Pass, true);
        }

        // First record is evicted but still counted.
        assert!(matches!(ring.get(&first), Err(HistoryError::NotFound(_))));
        let stats = ring.statistics().expect("stats");
        assert_eq!(stats.total, 5);
        assert_eq!(stats.buffer_usage, 3);
        assert_eq!(stats.buffer_max, 3);
    }

    #[test]
    fn counters_partition_by_outcome() {
        let ring = HistoryRing::new(10);
        add_outcome(&ring, InspectionOutcome::Pass, true);
        add_outcome(&ring, InspectionOutcome::Pass, true);
        add_outcome(&ring, InspectionOutcome::Fail, false);
        add_outcome(&ring, InspectionOutcome::Error, false);

        let stats = ring.statistics().expect("stats");
        assert_eq!(stats.passed + stats.failed + stats.errors, stats.total);
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.success_rate, 50.0);
    }

    #[test]
    fn recent_returns_newest_first_with_filter() {
        let ring = HistoryRing::new(10);
        add_outcome(&ring, InspectionOutcome::Pass, true);
        let fail_id = add_outcome(&ring, InspectionOutcome::Fail, false);
        let newest = add_outcome(&ring, InspectionOutcome::Pass, true);

        let all = ring.recent(10, None).expect("recent");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, newest);

        let failures = ring
            .recent(10, Some(InspectionOutcome::Fail))
            .expect("recent");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, fail_id);
    }

    #[test]
    fn recent_hour_slice_sees_fresh_records() {
        let ring = HistoryRing::new(10);
        add_outcome(&ring, InspectionOutcome::Pass, true);
        add_outcome(&ring, InspectionOutcome::Fail, false);

        let stats = ring.statistics().expect("stats");
        assert_eq!(stats.recent_hour.total, 2);
        assert_eq!(stats.recent_hour.passed, 1);
        assert_eq!(stats.recent_hour.failed, 1);
    }

    #[test]
    fn time_series_allocates_requested_buckets() {
        let ring = HistoryRing::new(10);
        add_outcome(&ring, InspectionOutcome::Pass, true);

        let buckets = ring.time_series(5, 1).expect("time series");
        assert_eq!(buckets.len(), 12);
        let counted: usize = buckets.iter().map(|b| b.total).sum();
        assert_eq!(counted, 1);
        // Fresh records land in the newest bucket.
        assert_eq!(buckets.last().expect("non-empty").total, 1);
    }

    #[test]
    fn time_series_rejects_zero_bucket() {
        let ring = HistoryRing::new(10);
        assert!(matches!(
            ring.time_series(0, 1),
            Err(HistoryError::InvalidParameter("bucket_minutes"))
        ));
    }

    #[test]
    fn failure_analysis_ranks_names() {
        let ring = HistoryRing::new(10);
        for _ in 0..3 {
            ring.add(
                "img_0001",
                InspectionOutcome::Fail,
                vec![detection("edge-check", false), detection("color-check", true)],
                4,
                None,
                None,
            )
            .expect("add succeeds");
        }
        ring.add(
            "img_0001",
            InspectionOutcome::Fail,
            vec![detection("color-check", false)],
            4,
            None,
            None,
        )
        .expect("add succeeds");
        add_outcome(&ring, InspectionOutcome::Pass, true);

        let analysis = ring.failure_analysis().expect("analysis");
        assert_eq!(analysis.total_failures, 4);
        assert_eq!(analysis.common_failures[0].name, "edge-check");
        assert_eq!(analysis.common_failures[0].count, 3);
        assert_eq!(analysis.common_failures[1].name, "color-check");
        assert!((analysis.failure_rate - 80.0).abs() < 1e-9);
    }

    #[test]
    fn clear_resets_counters() {
        let ring = HistoryRing::new(10);
        add_outcome(&ring, InspectionOutcome::Pass, true);
        ring.clear().expect("clear");

        let stats = ring.statistics().expect("stats");
        assert_eq!(stats.total, 0);
        assert_eq!(stats.buffer_usage, 0);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn export_import_round_trip_preserves_records_and_statistics() {
        let ring = HistoryRing::new(10);
        add_outcome(&ring, InspectionOutcome::Pass, true);
        add_outcome(&ring, InspectionOutcome::Fail, false);
        add_outcome(&ring, InspectionOutcome::Error, false);

        let blob = ring.export_json().expect("export");
        let fresh = HistoryRing::new(10);
        let imported = fresh.import_json(&blob).expect("import");
        assert_eq!(imported, 3);

        assert_eq!(
            fresh.recent(10, None).expect("recent"),
            ring.recent(10, None).expect("recent")
        );
        assert_eq!(
            fresh.statistics().expect("stats"),
            ring.statistics().expect("stats")
        );
    }

    #[test]
    fn import_larger_than_capacity_counts_everything() {
        let small = HistoryRing::new(2);
        let source = HistoryRing::new(10);
        for _ in 0..5 {
            add_outcome(&source, InspectionOutcome::Pass, true);
        }

        let blob = source.export_json().expect("export");
        small.import_json(&blob).expect("import");

        let stats = small.statistics().expect("stats");
        assert_eq!(stats.total, 5);
        assert_eq!(stats.buffer_usage, 2);
    }
}
