//! Opt-in timing/profiling hooks for the shape engine.
//!
//! Timing is only collected when the `shape_engine_metrics` feature is enabled
//! and the target is not WASM (`std::time::Instant` is unavailable there).
//! Otherwise every call compiles down to running the closure.
//!
//! # Usage
//!
//! ```ignore
//! use shape_engine::geom::{ShapeMetrics, TimingBucket};
//!
//! let mut metrics = ShapeMetrics::default();
//! metrics.begin();
//! let deltas = metrics.time(TimingBucket::DeltaGeneration, || generate_frame_deltas(&base, &target, 100.0, mask));
//! if let Some(report) = metrics.end() {
//!     println!("deltas: {} ns", report.delta_generation_ns);
//! }
//! ```

/// Categories for timing the phases of a shape operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Input validation at operation boundaries.
    Validation,
    /// Copying existing frames forward.
    Preservation,
    /// Per-vertex delta generation for authored frames.
    DeltaGeneration,
    /// Spatial grid construction and partner candidate search.
    MirrorSearch,
    /// Greedy pairing of mirror candidates.
    MirrorPairing,
}

/// Timing report with nanosecond precision for each bucket.
///
/// All fields are cumulative.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShapeTimingReport {
    pub validation_ns: u64,
    pub preservation_ns: u64,
    pub delta_generation_ns: u64,
    pub mirror_search_ns: u64,
    pub mirror_pairing_ns: u64,
}

impl ShapeTimingReport {
    /// Returns the total time across all buckets in nanoseconds.
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.validation_ns
            .saturating_add(self.preservation_ns)
            .saturating_add(self.delta_generation_ns)
            .saturating_add(self.mirror_search_ns)
            .saturating_add(self.mirror_pairing_ns)
    }

    /// Returns the total time in milliseconds (for display purposes).
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }
}

/// Accumulator for timing shape operations.
///
/// When the `shape_engine_metrics` feature is disabled (or on WASM), all methods
/// are no-ops and [`end`](Self::end) returns `None`.
#[derive(Debug, Default)]
pub struct ShapeMetrics {
    #[cfg(all(feature = "shape_engine_metrics", not(target_arch = "wasm32")))]
    report: ShapeTimingReport,
}

impl ShapeMetrics {
    /// Resets all timing counters to zero.
    pub fn begin(&mut self) {
        #[cfg(all(feature = "shape_engine_metrics", not(target_arch = "wasm32")))]
        {
            self.report = ShapeTimingReport::default();
        }
    }

    /// Returns the accumulated timing report, or `None` if metrics are disabled.
    #[must_use]
    pub fn end(&self) -> Option<ShapeTimingReport> {
        #[cfg(all(feature = "shape_engine_metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "shape_engine_metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Times the execution of `f` and accumulates the elapsed time in `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "shape_engine_metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let elapsed = start.elapsed();
            // Cap at u64::MAX to prevent overflow
            let nanos_u64 = elapsed.as_nanos().min(u128::from(u64::MAX)) as u64;
            self.add_to_bucket(bucket, nanos_u64);
            result
        }

        #[cfg(not(all(feature = "shape_engine_metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }

    #[cfg(all(feature = "shape_engine_metrics", not(target_arch = "wasm32")))]
    fn add_to_bucket(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = match bucket {
            TimingBucket::Validation => &mut self.report.validation_ns,
            TimingBucket::Preservation => &mut self.report.preservation_ns,
            TimingBucket::DeltaGeneration => &mut self.report.delta_generation_ns,
            TimingBucket::MirrorSearch => &mut self.report.mirror_search_ns,
            TimingBucket::MirrorPairing => &mut self.report.mirror_pairing_ns,
        };
        *slot = slot.saturating_add(nanos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_report_total() {
        let report = ShapeTimingReport {
            delta_generation_ns: 1000,
            mirror_search_ns: 2000,
            validation_ns: 3000,
            ..Default::default()
        };
        assert_eq!(report.total_ns(), 6000);
        assert!((report.total_ms() - 0.006).abs() < 1e-9);
    }

    #[test]
    fn test_time_returns_closure_result() {
        let mut metrics = ShapeMetrics::default();
        metrics.begin();
        let result = metrics.time(TimingBucket::MirrorPairing, || 42);
        assert_eq!(result, 42);
        let report = metrics.end();
        if cfg!(all(feature = "shape_engine_metrics", not(target_arch = "wasm32"))) {
            assert!(report.is_some());
        } else {
            assert!(report.is_none());
        }
    }
}
