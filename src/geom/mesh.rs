//! Per-vertex attribute buffers shared by the blend shape and mirror passes.

/// A mesh reduced to the vertex streams the shape tools operate on.
///
/// All three buffers share one length (the vertex count). Tangents carry a
/// handedness sign in `w` that is never subject to delta math.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeMesh {
    pub positions: Vec<[f64; 3]>,
    pub normals: Vec<[f64; 3]>,
    /// Tangent vectors `[x, y, z, w]`, `w` being the bitangent sign (+1/-1).
    pub tangents: Vec<[f64; 4]>,
}

/// Validation failures for [`AttributeMesh::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshValidationError {
    #[error("mesh has no vertices")]
    Empty,

    #[error("{stream} buffer has {found} entries, expected {expected}")]
    AttributeLength {
        stream: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("mesh has invalid vertex coordinates (NaN/Inf)")]
    NonFinitePositions,
}

impl AttributeMesh {
    /// Create a mesh from its three vertex streams.
    ///
    /// No validation happens here; call [`validate`](Self::validate) at operation boundaries.
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, normals: Vec<[f64; 3]>, tangents: Vec<[f64; 4]>) -> Self {
        Self {
            positions,
            normals,
            tangents,
        }
    }

    /// Create a mesh with positions only; normals are zeroed and tangents point
    /// along +X with positive handedness.
    #[must_use]
    pub fn from_positions(positions: Vec<[f64; 3]>) -> Self {
        let n = positions.len();
        Self {
            positions,
            normals: vec![[0.0; 3]; n],
            tangents: vec![[1.0, 0.0, 0.0, 1.0]; n],
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns true if any vertex position contains NaN or Inf values.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions
            .iter()
            .any(|p| !p[0].is_finite() || !p[1].is_finite() || !p[2].is_finite())
    }

    /// Check the attribute-length invariant.
    ///
    /// An empty mesh passes the length check; callers that need vertices test
    /// [`is_empty`](Self::is_empty) themselves.
    pub fn check_attribute_lengths(&self) -> Result<(), MeshValidationError> {
        let expected = self.positions.len();
        if self.normals.len() != expected {
            return Err(MeshValidationError::AttributeLength {
                stream: "normal",
                expected,
                found: self.normals.len(),
            });
        }
        if self.tangents.len() != expected {
            return Err(MeshValidationError::AttributeLength {
                stream: "tangent",
                expected,
                found: self.tangents.len(),
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), MeshValidationError> {
        if self.is_empty() {
            return Err(MeshValidationError::Empty);
        }
        self.check_attribute_lengths()?;
        if self.has_invalid_vertices() {
            return Err(MeshValidationError::NonFinitePositions);
        }
        Ok(())
    }

    /// Returns the position buffer as a flat slice: `[x0, y0, z0, x1, y1, z1, ...]`.
    ///
    /// This is a zero-copy view over `positions`, useful for wasm/JS adapters that
    /// expect packed numeric buffers.
    #[must_use]
    pub fn positions_flat(&self) -> &[f64] {
        flatten_f64_array_slice::<3>(&self.positions)
    }

    /// Returns the normal buffer as a flat slice: `[nx0, ny0, nz0, nx1, ny1, nz1, ...]`.
    #[must_use]
    pub fn normals_flat(&self) -> &[f64] {
        flatten_f64_array_slice::<3>(&self.normals)
    }

    /// Returns the tangent buffer as a flat slice: `[tx0, ty0, tz0, tw0, ...]`.
    #[must_use]
    pub fn tangents_flat(&self) -> &[f64] {
        flatten_f64_array_slice::<4>(&self.tangents)
    }
}

fn flatten_f64_array_slice<const N: usize>(data: &[[f64; N]]) -> &[f64] {
    let count = data.len().checked_mul(N).unwrap_or(0);
    let ptr = data.as_ptr().cast::<f64>();
    // SAFETY: `[[f64; N]]` is stored contiguously, and we compute the element count as `len * N`.
    unsafe { std::slice::from_raw_parts(ptr, count) }
}

/// Pack a flat `[x0, y0, z0, ...]` buffer into triples.
///
/// Returns `None` when the length is not a multiple of 3.
#[must_use]
pub fn unflatten_vec3(flat: &[f64]) -> Option<Vec<[f64; 3]>> {
    if flat.len() % 3 != 0 {
        return None;
    }
    Some(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

/// Pack a flat `[x0, y0, z0, w0, ...]` buffer into quadruples.
///
/// Returns `None` when the length is not a multiple of 4.
#[must_use]
pub fn unflatten_vec4(flat: &[f64]) -> Option<Vec<[f64; 4]>> {
    if flat.len() % 4 != 0 {
        return None;
    }
    Some(
        flat.chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> AttributeMesh {
        AttributeMesh::from_positions(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ])
    }

    #[test]
    fn test_validate_accepts_consistent_mesh() {
        let mesh = quad();
        assert_eq!(mesh.vertex_count(), 4);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_and_mismatched() {
        assert_eq!(
            AttributeMesh::default().validate(),
            Err(MeshValidationError::Empty)
        );

        let mut mesh = quad();
        mesh.tangents.pop();
        assert_eq!(
            mesh.validate(),
            Err(MeshValidationError::AttributeLength {
                stream: "tangent",
                expected: 4,
                found: 3,
            })
        );
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let mut mesh = quad();
        mesh.positions[2][1] = f64::NAN;
        assert_eq!(mesh.validate(), Err(MeshValidationError::NonFinitePositions));
    }

    #[test]
    fn test_flat_views_round_trip() {
        let mesh = quad();
        let flat = mesh.positions_flat();
        assert_eq!(flat.len(), 12);
        assert_eq!(unflatten_vec3(flat).as_deref(), Some(mesh.positions.as_slice()));

        let tangents = mesh.tangents_flat();
        assert_eq!(tangents.len(), 16);
        assert_eq!(unflatten_vec4(tangents).as_deref(), Some(mesh.tangents.as_slice()));

        assert!(unflatten_vec3(&[1.0, 2.0]).is_none());
    }
}
