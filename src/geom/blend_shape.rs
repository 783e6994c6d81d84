//! Delta-encoded blend shape composition.
//!
//! Authored shapes reference absolute target meshes; a mesh stores blend shape
//! frames as per-vertex offsets from its base. This module converts between the
//! two and merges freshly authored shapes with the blend shapes a mesh already
//! carries:
//!
//! - **Compose**: existing frames (optionally preserved) followed by one delta
//!   frame per valid authored frame.
//! - **Extract**: rebuild absolute meshes from stored deltas (`base + delta`).
//! - **Convert**: turn installed blend shapes back into authored shapes.
//! - **Evaluate**: sample a shape at an arbitrary weight.
//!
//! # Example
//!
//! ```ignore
//! use shape_engine::geom::{compose_blend_shapes, ComposeConfig, Shape, ShapeFrame};
//!
//! let shapes = vec![Shape::new("Smile").with_frame(ShapeFrame::new(100.0, smile_mesh))];
//! let (frames, diag) = compose_blend_shapes(&base, &base_shapes, &shapes, ComposeConfig::default())?;
//! assert_eq!(frames.len(), diag.output_frame_count());
//! ```

use std::collections::HashSet;

use super::diagnostics::ComposeDiagnostics;
use super::mesh::{AttributeMesh, MeshValidationError};
use super::metrics::{ShapeMetrics, TimingBucket};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ============================================================================
// Error types
// ============================================================================

/// Whole-call failures of [`compose_blend_shapes`]. No partial output is produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComposeError {
    /// The base mesh is missing, empty or holds non-finite positions.
    #[error("base mesh is invalid: {0}")]
    InvalidBaseMesh(MeshValidationError),

    /// Two buffers that must share the vertex count disagree.
    #[error("{buffer} has {found} entries, expected {expected}")]
    DimensionMismatch {
        buffer: String,
        expected: usize,
        found: usize,
    },
}

/// Why a single authored frame could not be turned into a delta frame.
///
/// These are recoverable: composition records them and moves on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("frame has no target mesh")]
    MissingTarget,

    #[error("target mesh has {found} vertices, base has {expected}")]
    VertexCountMismatch { expected: usize, found: usize },

    #[error("target mesh is unreadable: {0}")]
    MalformedTarget(MeshValidationError),
}

/// Failures when rebuilding absolute meshes from stored deltas.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("frame index {index} is out of range ({frame_count} frames)")]
    InvalidFrameIndex { index: usize, frame_count: usize },

    #[error("{buffer} has {found} entries, expected {expected}")]
    DimensionMismatch {
        buffer: String,
        expected: usize,
        found: usize,
    },
}

// ============================================================================
// Authoring data
// ============================================================================

/// Which attribute streams a frame contributes deltas for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMask {
    pub position: bool,
    pub normal: bool,
    pub tangent: bool,
}

impl ChannelMask {
    pub const ALL: Self = Self {
        position: true,
        normal: true,
        tangent: true,
    };

    pub const NONE: Self = Self {
        position: false,
        normal: false,
        tangent: false,
    };

    #[must_use]
    pub const fn position(mut self, enabled: bool) -> Self {
        self.position = enabled;
        self
    }

    #[must_use]
    pub const fn normal(mut self, enabled: bool) -> Self {
        self.normal = enabled;
        self
    }

    #[must_use]
    pub const fn tangent(mut self, enabled: bool) -> Self {
        self.tangent = enabled;
        self
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// One authored frame: a weight and an absolute target mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFrame {
    pub weight: f64,
    /// `None` when the target could not be resolved; such frames are skipped.
    pub target: Option<AttributeMesh>,
    pub channels: ChannelMask,
}

impl ShapeFrame {
    #[must_use]
    pub fn new(weight: f64, target: AttributeMesh) -> Self {
        Self {
            weight,
            target: Some(target),
            channels: ChannelMask::ALL,
        }
    }

    /// A frame whose target is unknown.
    #[must_use]
    pub fn unresolved(weight: f64) -> Self {
        Self {
            weight,
            target: None,
            channels: ChannelMask::ALL,
        }
    }

    #[must_use]
    pub fn with_channels(mut self, channels: ChannelMask) -> Self {
        self.channels = channels;
        self
    }
}

/// A named, ordered family of authored frames.
///
/// The name is the merge key against a mesh's existing blend shapes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Shape {
    pub name: String,
    pub frames: Vec<ShapeFrame>,
}

impl Shape {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_frame(mut self, frame: ShapeFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Drop frames that have no target mesh.
    pub fn clear_invalid_frames(&mut self) {
        self.frames.retain(|frame| frame.target.is_some());
    }

    pub fn normalize_weights(&mut self) {
        normalize_weights(&mut self.frames);
    }

    pub fn sort_frames_by_weight(&mut self) {
        sort_frames_by_weight(&mut self.frames);
    }
}

/// Options for [`compose_blend_shapes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeConfig {
    /// Keep existing blend shapes whose names are not re-authored.
    /// When `false`, every existing blend shape is discarded.
    pub preserve_existing: bool,
}

impl ComposeConfig {
    #[must_use]
    pub const fn new(preserve_existing: bool) -> Self {
        Self { preserve_existing }
    }

    #[must_use]
    pub const fn preserve_existing(mut self, preserve: bool) -> Self {
        self.preserve_existing = preserve;
        self
    }
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            preserve_existing: true,
        }
    }
}

// ============================================================================
// Stored (delta) data
// ============================================================================

/// One stored frame: per-vertex offsets from the base mesh.
///
/// Tangent deltas carry xyz only; the handedness sign stays with the base.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlendShapeFrame {
    pub weight: f64,
    pub delta_positions: Vec<[f64; 3]>,
    pub delta_normals: Vec<[f64; 3]>,
    pub delta_tangents: Vec<[f64; 3]>,
}

impl BlendShapeFrame {
    /// A frame with all-zero deltas for `vertex_count` vertices.
    #[must_use]
    pub fn zeroed(weight: f64, vertex_count: usize) -> Self {
        Self {
            weight,
            delta_positions: vec![[0.0; 3]; vertex_count],
            delta_normals: vec![[0.0; 3]; vertex_count],
            delta_tangents: vec![[0.0; 3]; vertex_count],
        }
    }

    fn check_len(&self, expected: usize) -> Result<(), (&'static str, usize)> {
        for (stream, len) in [
            ("position", self.delta_positions.len()),
            ("normal", self.delta_normals.len()),
            ("tangent", self.delta_tangents.len()),
        ] {
            if len != expected {
                return Err((stream, len));
            }
        }
        Ok(())
    }
}

/// A named blend shape as stored on a mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlendShape {
    pub name: String,
    pub frames: Vec<BlendShapeFrame>,
}

impl BlendShape {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_frame(mut self, frame: BlendShapeFrame) -> Self {
        self.frames.push(frame);
        self
    }
}

/// Where an output frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    /// Copied verbatim from the mesh's existing blend shapes.
    Preserved,
    /// Generated from an authored target mesh.
    Composed,
}

/// One frame of the composition output, tagged with its owning shape name.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedFrame {
    pub shape_name: String,
    pub frame: BlendShapeFrame,
    pub origin: FrameOrigin,
}

// ============================================================================
// Weight helpers
// ============================================================================

/// Anything carrying a blend weight.
pub trait Weighted {
    fn weight(&self) -> f64;
    fn set_weight(&mut self, weight: f64);
}

impl Weighted for ShapeFrame {
    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
}

impl Weighted for BlendShapeFrame {
    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
}

/// Space weights evenly: frame `i` of `k` gets `100 * (i + 1) / k`.
///
/// No-op for an empty slice.
pub fn normalize_weights<F: Weighted>(frames: &mut [F]) {
    let count = frames.len();
    if count == 0 {
        return;
    }
    for (i, frame) in frames.iter_mut().enumerate() {
        frame.set_weight(100.0 * (i + 1) as f64 / count as f64);
    }
}

/// Stable ascending sort by weight.
pub fn sort_frames_by_weight<F: Weighted>(frames: &mut [F]) {
    frames.sort_by(|a, b| a.weight().total_cmp(&b.weight()));
}

// ============================================================================
// Delta generation
// ============================================================================

/// Generate one stored frame from an absolute target.
///
/// Each disabled channel yields an all-zero delta buffer of the base's length.
///
/// # Errors
/// Returns a [`FrameError`] if the target's vertex count differs from the base
/// or its attribute buffers are inconsistent.
pub fn generate_frame_deltas(
    base: &AttributeMesh,
    target: &AttributeMesh,
    weight: f64,
    channels: ChannelMask,
) -> Result<BlendShapeFrame, FrameError> {
    let n = base.vertex_count();
    if target.vertex_count() != n {
        return Err(FrameError::VertexCountMismatch {
            expected: n,
            found: target.vertex_count(),
        });
    }
    target
        .check_attribute_lengths()
        .map_err(FrameError::MalformedTarget)?;

    let delta_positions = if channels.position {
        subtract_streams(&base.positions, &target.positions, sub3)
    } else {
        vec![[0.0; 3]; n]
    };
    let delta_normals = if channels.normal {
        subtract_streams(&base.normals, &target.normals, sub3)
    } else {
        vec![[0.0; 3]; n]
    };
    let delta_tangents = if channels.tangent {
        subtract_streams(&base.tangents, &target.tangents, sub_xyz)
    } else {
        vec![[0.0; 3]; n]
    };

    Ok(BlendShapeFrame {
        weight,
        delta_positions,
        delta_normals,
        delta_tangents,
    })
}

fn sub3(from: &[f64; 3], to: &[f64; 3]) -> [f64; 3] {
    [to[0] - from[0], to[1] - from[1], to[2] - from[2]]
}

fn sub_xyz(from: &[f64; 4], to: &[f64; 4]) -> [f64; 3] {
    [to[0] - from[0], to[1] - from[1], to[2] - from[2]]
}

#[cfg(feature = "parallel")]
fn subtract_streams<A, F>(from: &[A], to: &[A], delta: F) -> Vec<[f64; 3]>
where
    A: Sync,
    F: Fn(&A, &A) -> [f64; 3] + Sync + Send,
{
    from.par_iter()
        .zip(to.par_iter())
        .map(|(a, b)| delta(a, b))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn subtract_streams<A, F>(from: &[A], to: &[A], delta: F) -> Vec<[f64; 3]>
where
    F: Fn(&A, &A) -> [f64; 3],
{
    from.iter().zip(to).map(|(a, b)| delta(a, b)).collect()
}

// ============================================================================
// Compose
// ============================================================================

/// Merge authored shapes into a mesh's blend shape set.
///
/// Output order is: preserved existing frames in their original order, then one
/// frame per valid authored frame in shape order and frame order. With
/// `preserve_existing`, existing shapes whose name matches an authored shape are
/// dropped; without it, all existing shapes are dropped.
///
/// # Errors
/// Returns [`ComposeError::InvalidBaseMesh`] for an empty or non-finite base and
/// [`ComposeError::DimensionMismatch`] when base attributes or the delta buffers
/// of a preserved existing frame disagree with the vertex count.
pub fn compose_blend_shapes(
    base: &AttributeMesh,
    existing: &[BlendShape],
    shapes: &[Shape],
    config: ComposeConfig,
) -> Result<(Vec<ComposedFrame>, ComposeDiagnostics), ComposeError> {
    let mut metrics = ShapeMetrics::default();
    metrics.begin();

    let authored: HashSet<&str> = shapes.iter().map(|shape| shape.name.as_str()).collect();

    let n = metrics.time(TimingBucket::Validation, || {
        validate_base(base)?;
        if config.preserve_existing {
            let kept = existing
                .iter()
                .filter(|shape| !authored.contains(shape.name.as_str()));
            validate_existing(kept, base.vertex_count())?;
        }
        Ok::<_, ComposeError>(base.vertex_count())
    })?;

    let mut diag = ComposeDiagnostics {
        vertex_count: n,
        ..Default::default()
    };

    let mut output = metrics.time(TimingBucket::Preservation, || {
        preserve_existing_frames(existing, &authored, config, &mut diag)
    });

    metrics.time(TimingBucket::DeltaGeneration, || {
        for shape in shapes {
            let before = output.len();
            for (frame_index, frame) in shape.frames.iter().enumerate() {
                let generated = match frame.target.as_ref() {
                    Some(target) => generate_frame_deltas(base, target, frame.weight, frame.channels),
                    None => Err(FrameError::MissingTarget),
                };
                match generated {
                    Ok(delta_frame) => output.push(ComposedFrame {
                        shape_name: shape.name.clone(),
                        frame: delta_frame,
                        origin: FrameOrigin::Composed,
                    }),
                    Err(error) => {
                        log::warn!("skipping frame {frame_index} of shape `{}`: {error}", shape.name);
                        diag.record_skipped(&shape.name, frame_index, error);
                    }
                }
            }
            let produced = output.len() - before;
            diag.composed_frame_count += produced;
            if produced == 0 {
                diag.empty_shape_names.push(shape.name.clone());
            }
        }
    });

    diag.timing = metrics.end();
    log::debug!("compose_blend_shapes: {}", diag.summary());
    Ok((output, diag))
}

fn preserve_existing_frames(
    existing: &[BlendShape],
    authored: &HashSet<&str>,
    config: ComposeConfig,
    diag: &mut ComposeDiagnostics,
) -> Vec<ComposedFrame> {
    let mut output = Vec::new();
    for shape in existing {
        if !config.preserve_existing {
            diag.dropped_frame_count += shape.frames.len();
            continue;
        }
        if authored.contains(shape.name.as_str()) {
            diag.dropped_frame_count += shape.frames.len();
            if !diag.replaced_shape_names.contains(&shape.name) {
                diag.replaced_shape_names.push(shape.name.clone());
            }
            continue;
        }
        for frame in &shape.frames {
            output.push(ComposedFrame {
                shape_name: shape.name.clone(),
                frame: frame.clone(),
                origin: FrameOrigin::Preserved,
            });
        }
        diag.preserved_frame_count += shape.frames.len();
    }
    output
}

fn validate_base(base: &AttributeMesh) -> Result<(), ComposeError> {
    if base.is_empty() {
        return Err(ComposeError::InvalidBaseMesh(MeshValidationError::Empty));
    }
    if let Err(MeshValidationError::AttributeLength {
        stream,
        expected,
        found,
    }) = base.check_attribute_lengths()
    {
        return Err(ComposeError::DimensionMismatch {
            buffer: format!("base {stream} buffer"),
            expected,
            found,
        });
    }
    if base.has_invalid_vertices() {
        return Err(ComposeError::InvalidBaseMesh(
            MeshValidationError::NonFinitePositions,
        ));
    }
    Ok(())
}

/// Only frames that end up in the output are checked; dropped ones may be malformed.
fn validate_existing<'a>(
    existing: impl IntoIterator<Item = &'a BlendShape>,
    vertex_count: usize,
) -> Result<(), ComposeError> {
    for shape in existing {
        for (frame_index, frame) in shape.frames.iter().enumerate() {
            if let Err((stream, found)) = frame.check_len(vertex_count) {
                return Err(ComposeError::DimensionMismatch {
                    buffer: format!(
                        "existing blend shape `{}` frame {frame_index} {stream} deltas",
                        shape.name
                    ),
                    expected: vertex_count,
                    found,
                });
            }
        }
    }
    Ok(())
}

// ============================================================================
// Extraction
// ============================================================================

/// Rebuild an absolute mesh from a base and one stored frame: `base + delta`.
///
/// Tangent `w` is taken from the base.
///
/// # Errors
/// Returns [`ExtractError::DimensionMismatch`] if the frame's buffers or the
/// base's own attribute buffers do not match the base vertex count.
pub fn apply_frame_deltas(
    base: &AttributeMesh,
    frame: &BlendShapeFrame,
) -> Result<AttributeMesh, ExtractError> {
    let n = base.vertex_count();
    if let Err(MeshValidationError::AttributeLength {
        stream,
        expected,
        found,
    }) = base.check_attribute_lengths()
    {
        return Err(ExtractError::DimensionMismatch {
            buffer: format!("base {stream} buffer"),
            expected,
            found,
        });
    }
    if let Err((stream, found)) = frame.check_len(n) {
        return Err(ExtractError::DimensionMismatch {
            buffer: format!("{stream} deltas"),
            expected: n,
            found,
        });
    }

    let positions = base
        .positions
        .iter()
        .zip(&frame.delta_positions)
        .map(|(p, d)| [p[0] + d[0], p[1] + d[1], p[2] + d[2]])
        .collect();
    let normals = base
        .normals
        .iter()
        .zip(&frame.delta_normals)
        .map(|(v, d)| [v[0] + d[0], v[1] + d[1], v[2] + d[2]])
        .collect();
    let tangents = base
        .tangents
        .iter()
        .zip(&frame.delta_tangents)
        .map(|(t, d)| [t[0] + d[0], t[1] + d[1], t[2] + d[2], t[3]])
        .collect();

    Ok(AttributeMesh::new(positions, normals, tangents))
}

/// Rebuild the absolute mesh for frame `frame_index` of `shape`.
///
/// # Errors
/// Returns [`ExtractError::InvalidFrameIndex`] for an out-of-range index, or a
/// dimension error from [`apply_frame_deltas`].
pub fn extract_frame_as_mesh(
    base: &AttributeMesh,
    shape: &BlendShape,
    frame_index: usize,
) -> Result<AttributeMesh, ExtractError> {
    let frame = shape
        .frames
        .get(frame_index)
        .ok_or(ExtractError::InvalidFrameIndex {
            index: frame_index,
            frame_count: shape.frames.len(),
        })?;
    apply_frame_deltas(base, frame)
}

/// Rebuild one absolute mesh per frame of `shape`, in frame order.
pub fn extract_blend_shape_frames(
    base: &AttributeMesh,
    shape: &BlendShape,
) -> Result<Vec<AttributeMesh>, ExtractError> {
    shape
        .frames
        .iter()
        .map(|frame| apply_frame_deltas(base, frame))
        .collect()
}

/// Turn stored blend shapes back into authored shapes.
///
/// Every frame becomes an absolute target with all channels enabled; weights are
/// re-spaced evenly over `(0, 100]`.
pub fn shapes_from_existing(
    base: &AttributeMesh,
    existing: &[BlendShape],
) -> Result<Vec<Shape>, ExtractError> {
    let mut shapes = Vec::with_capacity(existing.len());
    for blend_shape in existing {
        let targets = extract_blend_shape_frames(base, blend_shape)?;
        let mut shape = Shape::new(blend_shape.name.clone());
        shape.frames = targets
            .into_iter()
            .map(|target| ShapeFrame::new(0.0, target))
            .collect();
        shape.normalize_weights();
        shapes.push(shape);
    }
    log::debug!("converted {} blend shapes to authored shapes", shapes.len());
    Ok(shapes)
}

// ============================================================================
// Evaluation
// ============================================================================

/// Sample `shape` at `weight` and return the deformed mesh.
///
/// Between two frames the deltas are interpolated linearly. Below the first
/// frame's weight the first delta ramps up from zero; above the last frame the
/// last delta is held. Non-positive weights return the base unchanged.
///
/// # Errors
/// Returns [`ExtractError::DimensionMismatch`] if any frame disagrees with the base.
pub fn evaluate_blend_shape(
    base: &AttributeMesh,
    shape: &BlendShape,
    weight: f64,
) -> Result<AttributeMesh, ExtractError> {
    let n = base.vertex_count();
    if shape.frames.is_empty() || weight.is_nan() || weight <= 0.0 {
        return apply_frame_deltas(base, &BlendShapeFrame::zeroed(weight, n));
    }

    let mut order: Vec<&BlendShapeFrame> = shape.frames.iter().collect();
    order.sort_by(|a, b| a.weight.total_cmp(&b.weight));

    let upper = order.iter().position(|frame| frame.weight >= weight);
    let blended = match upper {
        None => order[order.len() - 1].clone(),
        Some(0) => {
            let first = order[0];
            let t = if first.weight > 0.0 { weight / first.weight } else { 1.0 };
            lerp_frames(&BlendShapeFrame::zeroed(0.0, n), first, t)?
        }
        Some(k) => {
            let lo = order[k - 1];
            let hi = order[k];
            let span = hi.weight - lo.weight;
            let t = if span > 0.0 { (weight - lo.weight) / span } else { 1.0 };
            lerp_frames(lo, hi, t)?
        }
    };
    apply_frame_deltas(base, &blended)
}

fn lerp_frames(
    a: &BlendShapeFrame,
    b: &BlendShapeFrame,
    t: f64,
) -> Result<BlendShapeFrame, ExtractError> {
    let n = a.delta_positions.len();
    if let Err((stream, found)) = b.check_len(n) {
        return Err(ExtractError::DimensionMismatch {
            buffer: format!("{stream} deltas"),
            expected: n,
            found,
        });
    }
    let lerp = |x: &[[f64; 3]], y: &[[f64; 3]]| -> Vec<[f64; 3]> {
        x.iter()
            .zip(y)
            .map(|(p, q)| {
                [
                    p[0] + (q[0] - p[0]) * t,
                    p[1] + (q[1] - p[1]) * t,
                    p[2] + (q[2] - p[2]) * t,
                ]
            })
            .collect()
    };
    Ok(BlendShapeFrame {
        weight: a.weight + (b.weight - a.weight) * t,
        delta_positions: lerp(&a.delta_positions, &b.delta_positions),
        delta_normals: lerp(&a.delta_normals, &b.delta_normals),
        delta_tangents: lerp(&a.delta_tangents, &b.delta_tangents),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AttributeMesh {
        AttributeMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            vec![[0.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
            vec![[1.0, 0.0, 0.0, -1.0], [1.0, 0.0, 0.0, -1.0]],
        )
    }

    fn raised(by: f64) -> AttributeMesh {
        let mut mesh = base();
        for p in &mut mesh.positions {
            p[1] += by;
        }
        mesh
    }

    #[test]
    fn test_generate_deltas_per_channel() {
        let mut target = raised(2.0);
        target.normals[1] = [0.0, 1.0, 0.0];
        target.tangents[0] = [0.0, 1.0, 0.0, 1.0];

        let frame = generate_frame_deltas(&base(), &target, 50.0, ChannelMask::ALL).unwrap();
        assert_eq!(frame.weight, 50.0);
        assert_eq!(frame.delta_positions, vec![[0.0, 2.0, 0.0], [0.0, 2.0, 0.0]]);
        assert_eq!(frame.delta_normals[1], [0.0, 1.0, -1.0]);
        // w is not diffed.
        assert_eq!(frame.delta_tangents[0], [-1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_disabled_channel_is_zero() {
        let frame = generate_frame_deltas(
            &base(),
            &raised(3.0),
            100.0,
            ChannelMask::ALL.position(false),
        )
        .unwrap();
        assert_eq!(frame.delta_positions, vec![[0.0; 3]; 2]);
    }

    #[test]
    fn test_generate_rejects_mismatched_target() {
        let target = AttributeMesh::from_positions(vec![[0.0; 3]]);
        assert_eq!(
            generate_frame_deltas(&base(), &target, 100.0, ChannelMask::ALL),
            Err(FrameError::VertexCountMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_normalize_weights() {
        let mut frames = vec![
            ShapeFrame::unresolved(7.0),
            ShapeFrame::unresolved(3.0),
            ShapeFrame::unresolved(1.0),
            ShapeFrame::unresolved(9.0),
        ];
        normalize_weights(&mut frames);
        let weights: Vec<f64> = frames.iter().map(|f| f.weight).collect();
        assert_eq!(weights, vec![25.0, 50.0, 75.0, 100.0]);

        let mut seven: Vec<ShapeFrame> = (0..7).map(|_| ShapeFrame::unresolved(1.0)).collect();
        normalize_weights(&mut seven);
        for (i, frame) in seven.iter().enumerate() {
            assert_eq!(frame.weight, 100.0 * (i + 1) as f64 / 7.0);
        }
        assert_eq!(seven[6].weight, 100.0);

        let mut empty: Vec<ShapeFrame> = Vec::new();
        normalize_weights(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_sort_is_stable() {
        let mut frames = vec![
            BlendShapeFrame::zeroed(50.0, 1),
            BlendShapeFrame::zeroed(10.0, 2),
            BlendShapeFrame::zeroed(50.0, 3),
        ];
        sort_frames_by_weight(&mut frames);
        assert_eq!(frames[0].weight, 10.0);
        assert_eq!(frames[1].delta_positions.len(), 1);
        assert_eq!(frames[2].delta_positions.len(), 3);
    }

    #[test]
    fn test_clear_invalid_frames() {
        let mut shape = Shape::new("Blink")
            .with_frame(ShapeFrame::unresolved(50.0))
            .with_frame(ShapeFrame::new(100.0, raised(1.0)));
        shape.clear_invalid_frames();
        assert_eq!(shape.frames.len(), 1);
        assert_eq!(shape.frames[0].weight, 100.0);
    }

    #[test]
    fn test_apply_keeps_tangent_handedness() {
        let frame = BlendShapeFrame {
            weight: 100.0,
            delta_positions: vec![[0.0; 3]; 2],
            delta_normals: vec![[0.0; 3]; 2],
            delta_tangents: vec![[0.5, 0.5, 0.5]; 2],
        };
        let mesh = apply_frame_deltas(&base(), &frame).unwrap();
        assert_eq!(mesh.tangents[0], [1.5, 0.5, 0.5, -1.0]);
    }

    #[test]
    fn test_extract_invalid_index() {
        let shape = BlendShape::new("Brow").with_frame(BlendShapeFrame::zeroed(100.0, 2));
        assert_eq!(
            extract_frame_as_mesh(&base(), &shape, 3),
            Err(ExtractError::InvalidFrameIndex {
                index: 3,
                frame_count: 1
            })
        );
    }

    #[test]
    fn test_evaluate_interpolates_between_frames() {
        let b = base();
        let f50 = generate_frame_deltas(&b, &raised(1.0), 50.0, ChannelMask::ALL).unwrap();
        let f100 = generate_frame_deltas(&b, &raised(3.0), 100.0, ChannelMask::ALL).unwrap();
        let shape = BlendShape::new("Smile").with_frame(f100).with_frame(f50);

        let at = |w: f64| evaluate_blend_shape(&b, &shape, w).unwrap().positions[0][1];
        assert!((at(0.0) - 0.0).abs() < 1e-12);
        assert!((at(25.0) - 0.5).abs() < 1e-12);
        assert!((at(50.0) - 1.0).abs() < 1e-12);
        assert!((at(75.0) - 2.0).abs() < 1e-12);
        assert!((at(150.0) - 3.0).abs() < 1e-12);
    }
}
