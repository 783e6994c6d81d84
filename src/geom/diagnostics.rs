//! Diagnostics for blend shape composition and mirror relation builds.
//!
//! Composition treats a malformed frame as a recoverable problem: the frame is
//! skipped and recorded here while the rest of the batch goes through. Mirror
//! builds either succeed completely or fail, so [`MirrorDiagnostics`] only
//! describes how a successful relation was put together.
//!
//! # Example
//!
//! ```ignore
//! use shape_engine::geom::{compose_blend_shapes, ComposeConfig};
//!
//! let (frames, diagnostics) = compose_blend_shapes(&base, &existing, &shapes, ComposeConfig::default())?;
//!
//! if !diagnostics.is_clean() {
//!     for skipped in &diagnostics.skipped_frames {
//!         eprintln!("skipped: {skipped}");
//!     }
//! }
//! ```

use std::fmt;

use super::blend_shape::FrameError;

/// One frame that composition refused, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDiagnostic {
    /// Name of the authored shape the frame belongs to.
    pub shape_name: String,
    /// Index of the frame within its shape.
    pub frame_index: usize,
    pub error: FrameError,
}

impl fmt::Display for FrameDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.shape_name, self.frame_index, self.error)
    }
}

/// Summary of a [`compose_blend_shapes`](super::compose_blend_shapes) call.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ComposeDiagnostics {
    /// Vertex count of the base mesh.
    pub vertex_count: usize,

    /// Existing frames copied forward verbatim.
    pub preserved_frame_count: usize,

    /// Existing frames discarded, either because their shape was replaced or
    /// because preservation was off.
    pub dropped_frame_count: usize,

    /// Existing blend shape names that were replaced by an authored shape of the
    /// same name, in existing order.
    pub replaced_shape_names: Vec<String>,

    /// Newly generated frames.
    pub composed_frame_count: usize,

    /// Frames skipped because their target was missing or mismatched.
    pub skipped_frames: Vec<FrameDiagnostic>,

    /// Authored shapes that produced no frame at all.
    pub empty_shape_names: Vec<String>,

    /// Optional timing breakdown, populated with the `shape_engine_metrics` feature.
    pub timing: Option<super::metrics::ShapeTimingReport>,

    /// Human-readable warnings.
    pub warnings: Vec<String>,
}

impl ComposeDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of frames in the output.
    #[must_use]
    pub fn output_frame_count(&self) -> usize {
        self.preserved_frame_count + self.composed_frame_count
    }

    /// Returns `true` if no frame was skipped and nothing was warned about.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped_frames.is_empty() && self.empty_shape_names.is_empty() && self.warnings.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub(crate) fn record_skipped(&mut self, shape_name: &str, frame_index: usize, error: FrameError) {
        self.add_warning(format!("frame skipped: {shape_name} [{frame_index}]: {error}"));
        self.skipped_frames.push(FrameDiagnostic {
            shape_name: shape_name.to_owned(),
            frame_index,
            error,
        });
    }

    /// Returns a short summary string suitable for logging.
    ///
    /// Format: `"V:{vertices} kept:{preserved} new:{composed} [issues...]"`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "V:{} kept:{} new:{}",
            self.vertex_count, self.preserved_frame_count, self.composed_frame_count
        )];
        if self.dropped_frame_count > 0 {
            parts.push(format!("dropped:{}", self.dropped_frame_count));
        }
        if !self.skipped_frames.is_empty() {
            parts.push(format!("skipped:{}", self.skipped_frames.len()));
        }
        if !self.empty_shape_names.is_empty() {
            parts.push(format!("empty-shapes:{}", self.empty_shape_names.len()));
        }
        parts.join(" ")
    }
}

impl fmt::Display for ComposeDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compose Diagnostics:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Preserved frames: {}", self.preserved_frame_count)?;
        writeln!(f, "  Composed frames: {}", self.composed_frame_count)?;
        if self.dropped_frame_count > 0 {
            writeln!(f, "  Dropped frames: {}", self.dropped_frame_count)?;
        }
        if !self.replaced_shape_names.is_empty() {
            writeln!(f, "  Replaced shapes: {}", self.replaced_shape_names.join(", "))?;
        }
        if !self.skipped_frames.is_empty() {
            writeln!(f, "  Skipped frames:")?;
            for skipped in &self.skipped_frames {
                writeln!(f, "    - {skipped}")?;
            }
        }
        if !self.empty_shape_names.is_empty() {
            writeln!(f, "  Empty shapes: {}", self.empty_shape_names.join(", "))?;
        }
        if let Some(ref timing) = self.timing {
            writeln!(f, "  Timing: {} ms total", timing.total_ms())?;
        }
        let status = if self.is_clean() { "CLEAN" } else { "PARTIAL" };
        writeln!(f, "  Status: {status}")?;
        Ok(())
    }
}

/// Summary of a successful mirror relation build.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MirrorDiagnostics {
    pub vertex_count: usize,
    /// Vertices lying on the mirror plane (mapped to themselves).
    pub self_mapped_count: usize,
    /// Number of distinct vertex pairs.
    pub pair_count: usize,
    /// Vertices that had more than one partner candidate within tolerance.
    pub ambiguous_count: usize,
    /// Pairs accepted even though the reflected reference normals disagreed.
    pub normal_mismatch_count: usize,
    /// Optional timing breakdown, populated with the `shape_engine_metrics` feature.
    pub timing: Option<super::metrics::ShapeTimingReport>,
}

impl MirrorDiagnostics {
    /// Short summary string suitable for logging.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "V:{} pairs:{} on-plane:{}",
            self.vertex_count, self.pair_count, self.self_mapped_count
        )];
        if self.ambiguous_count > 0 {
            parts.push(format!("ambiguous:{}", self.ambiguous_count));
        }
        if self.normal_mismatch_count > 0 {
            parts.push(format!("normal-mismatch:{}", self.normal_mismatch_count));
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_clean() {
        let diag = ComposeDiagnostics::default();
        assert!(diag.is_clean());
        assert!(!diag.has_warnings());
        assert_eq!(diag.output_frame_count(), 0);
    }

    #[test]
    fn test_record_skipped_marks_partial() {
        let mut diag = ComposeDiagnostics::default();
        diag.record_skipped(
            "Brow",
            2,
            FrameError::VertexCountMismatch {
                expected: 8,
                found: 7,
            },
        );
        assert!(!diag.is_clean());
        assert_eq!(diag.skipped_frames.len(), 1);
        assert_eq!(diag.skipped_frames[0].frame_index, 2);
        assert!(diag.warnings[0].contains("Brow [2]"));
    }

    #[test]
    fn test_summary_and_display() {
        let mut diag = ComposeDiagnostics {
            vertex_count: 100,
            preserved_frame_count: 3,
            composed_frame_count: 2,
            dropped_frame_count: 1,
            replaced_shape_names: vec!["Brow".to_string()],
            ..Default::default()
        };
        diag.record_skipped("Jaw", 0, FrameError::MissingTarget);

        let summary = diag.summary();
        assert!(summary.contains("V:100"));
        assert!(summary.contains("kept:3"));
        assert!(summary.contains("new:2"));
        assert!(summary.contains("skipped:1"));

        let output = format!("{diag}");
        assert!(output.contains("Replaced shapes: Brow"));
        assert!(output.contains("Jaw [0]"));
        assert!(output.contains("PARTIAL"));
    }

    #[test]
    fn test_mirror_summary() {
        let diag = MirrorDiagnostics {
            vertex_count: 4,
            self_mapped_count: 2,
            pair_count: 1,
            normal_mismatch_count: 1,
            ..Default::default()
        };
        let summary = diag.summary();
        assert!(summary.contains("pairs:1"));
        assert!(summary.contains("normal-mismatch:1"));
        assert!(!summary.contains("ambiguous"));
    }
}
