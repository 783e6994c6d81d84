//! Host mesh contract: reading existing blend shapes and writing composed ones back.

use super::blend_shape::{
    BlendShape, BlendShapeFrame, ComposeConfig, ComposeError, ComposedFrame, Shape,
    compose_blend_shapes,
};
use super::diagnostics::ComposeDiagnostics;
use super::mesh::AttributeMesh;

/// Read side of a host mesh.
pub trait BlendShapeSource {
    /// The mesh the stored deltas are relative to.
    fn base_mesh(&self) -> &AttributeMesh;

    fn blend_shape_count(&self) -> usize;

    fn blend_shape_name(&self, shape: usize) -> Option<&str>;

    fn frame_count(&self, shape: usize) -> usize;

    fn frame(&self, shape: usize, frame: usize) -> Option<&BlendShapeFrame>;

    fn frame_weight(&self, shape: usize, frame: usize) -> Option<f64> {
        self.frame(shape, frame).map(|f| f.weight)
    }

    /// Snapshot every stored blend shape in host order.
    fn existing_blend_shapes(&self) -> Vec<BlendShape> {
        (0..self.blend_shape_count())
            .filter_map(|shape| {
                let name = self.blend_shape_name(shape)?;
                let frames = (0..self.frame_count(shape))
                    .filter_map(|frame| self.frame(shape, frame).cloned())
                    .collect();
                Some(BlendShape {
                    name: name.to_owned(),
                    frames,
                })
            })
            .collect()
    }
}

/// Write side of a host mesh.
pub trait BlendShapeSink {
    fn clear_blend_shapes(&mut self);

    /// Append a frame to the shape called `name`, creating the shape if needed.
    fn add_blend_shape_frame(&mut self, name: &str, frame: BlendShapeFrame);
}

/// An [`AttributeMesh`] together with its stored blend shapes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapedMesh {
    pub mesh: AttributeMesh,
    pub blend_shapes: Vec<BlendShape>,
}

impl ShapedMesh {
    #[must_use]
    pub fn new(mesh: AttributeMesh) -> Self {
        Self {
            mesh,
            blend_shapes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_blend_shape(mut self, shape: BlendShape) -> Self {
        self.blend_shapes.push(shape);
        self
    }

    #[must_use]
    pub fn blend_shape(&self, name: &str) -> Option<&BlendShape> {
        self.blend_shapes.iter().find(|shape| shape.name == name)
    }

    /// Total number of stored frames across all shapes.
    #[must_use]
    pub fn total_frame_count(&self) -> usize {
        self.blend_shapes.iter().map(|shape| shape.frames.len()).sum()
    }
}

impl BlendShapeSource for ShapedMesh {
    fn base_mesh(&self) -> &AttributeMesh {
        &self.mesh
    }

    fn blend_shape_count(&self) -> usize {
        self.blend_shapes.len()
    }

    fn blend_shape_name(&self, shape: usize) -> Option<&str> {
        self.blend_shapes.get(shape).map(|s| s.name.as_str())
    }

    fn frame_count(&self, shape: usize) -> usize {
        self.blend_shapes.get(shape).map_or(0, |s| s.frames.len())
    }

    fn frame(&self, shape: usize, frame: usize) -> Option<&BlendShapeFrame> {
        self.blend_shapes.get(shape)?.frames.get(frame)
    }

    fn existing_blend_shapes(&self) -> Vec<BlendShape> {
        self.blend_shapes.clone()
    }
}

impl BlendShapeSink for ShapedMesh {
    fn clear_blend_shapes(&mut self) {
        self.blend_shapes.clear();
    }

    fn add_blend_shape_frame(&mut self, name: &str, frame: BlendShapeFrame) {
        match self.blend_shapes.iter_mut().find(|shape| shape.name == name) {
            Some(shape) => shape.frames.push(frame),
            None => self.blend_shapes.push(BlendShape {
                name: name.to_owned(),
                frames: vec![frame],
            }),
        }
    }
}

/// Replace everything stored on `sink` with `frames`, in order.
pub fn install_composed_frames<S: BlendShapeSink + ?Sized>(sink: &mut S, frames: Vec<ComposedFrame>) {
    sink.clear_blend_shapes();
    for composed in frames {
        sink.add_blend_shape_frame(&composed.shape_name, composed.frame);
    }
}

/// Compose `shapes` against the host's own blend shapes and install the result.
///
/// On error the host is left untouched.
pub fn compose_into_host<H>(
    host: &mut H,
    shapes: &[Shape],
    config: ComposeConfig,
) -> Result<ComposeDiagnostics, ComposeError>
where
    H: BlendShapeSource + BlendShapeSink + ?Sized,
{
    let existing = host.existing_blend_shapes();
    let (frames, diagnostics) = compose_blend_shapes(host.base_mesh(), &existing, shapes, config)?;
    install_composed_frames(host, frames);
    Ok(diagnostics)
}
