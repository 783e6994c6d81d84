mod blend_shape;
mod cache;
mod core;
mod diagnostics;
mod grid;
mod host;
mod mesh;
mod metrics;
mod mirror;

pub use blend_shape::{
    BlendShape, BlendShapeFrame, ChannelMask, ComposeConfig, ComposeError, ComposedFrame,
    ExtractError, FrameError, FrameOrigin, Shape, ShapeFrame, Weighted,
    apply_frame_deltas, compose_blend_shapes, evaluate_blend_shape, extract_blend_shape_frames,
    extract_frame_as_mesh, generate_frame_deltas, normalize_weights, shapes_from_existing,
    sort_frames_by_weight,
};
pub use cache::{MirrorCacheStats, MirrorRelationCache};
pub use core::{Point3, Tolerance, Vec3};
pub use diagnostics::{ComposeDiagnostics, FrameDiagnostic, MirrorDiagnostics};
pub use grid::PointGrid;
pub use host::{
    BlendShapeSink, BlendShapeSource, ShapedMesh, compose_into_host, install_composed_frames,
};
pub use mesh::{AttributeMesh, MeshValidationError, unflatten_vec3, unflatten_vec4};
pub use metrics::{ShapeMetrics, ShapeTimingReport, TimingBucket};
pub use mirror::{
    MirrorError, MirrorMode, MirrorOptions, MirrorRelation, UnknownMirrorMode, apply_mirror,
    apply_mirror_from_source_side, build_mirror_relation, normalize_plane,
};

#[cfg(test)]
mod tests;
