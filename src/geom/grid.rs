//! Uniform hash grid for fixed-radius point queries.

use std::collections::HashMap;

use super::core::{Point3, Tolerance};

type CellKey = (i64, i64, i64);

/// Quantize a coordinate to a grid cell index.
/// Returns `None` for NaN/Inf so such points never match anything.
fn quantize(value: f64, inv: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let q = (value * inv).floor();
    Some(q.clamp(i64::MIN as f64, i64::MAX as f64) as i64)
}

/// Point indices bucketed by cells of edge length `eps`.
///
/// Any point within `eps` of a query lies in the query's cell or one of its 26
/// neighbours, so [`within`](Self::within) only scans 27 buckets.
#[derive(Debug)]
pub struct PointGrid<'a> {
    points: &'a [[f64; 3]],
    inv: f64,
    tol: Tolerance,
    buckets: HashMap<CellKey, Vec<usize>>,
}

impl<'a> PointGrid<'a> {
    /// Bucket every finite point. `tol` must satisfy [`Tolerance::is_valid`].
    #[must_use]
    pub fn build(points: &'a [[f64; 3]], tol: Tolerance) -> Self {
        let inv = 1.0 / tol.eps;
        let mut buckets: HashMap<CellKey, Vec<usize>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            if let Some(key) = Self::key_for(*p, inv) {
                buckets.entry(key).or_default().push(i);
            }
        }
        Self {
            points,
            inv,
            tol,
            buckets,
        }
    }

    fn key_for(p: [f64; 3], inv: f64) -> Option<CellKey> {
        match (quantize(p[0], inv), quantize(p[1], inv), quantize(p[2], inv)) {
            (Some(kx), Some(ky), Some(kz)) => Some((kx, ky, kz)),
            _ => None,
        }
    }

    /// Indices of all points within `eps` of `query`, ascending.
    #[must_use]
    pub fn within(&self, query: Point3) -> Vec<usize> {
        let Some(key) = Self::key_for(query.to_array(), self.inv) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for dx in -1i64..=1 {
            for dy in -1i64..=1 {
                for dz in -1i64..=1 {
                    let lookup = (
                        key.0.saturating_add(dx),
                        key.1.saturating_add(dy),
                        key.2.saturating_add(dz),
                    );
                    let Some(candidates) = self.buckets.get(&lookup) else {
                        continue;
                    };
                    for &cand in candidates {
                        if self
                            .tol
                            .approx_eq_point3(Point3::from_array(self.points[cand]), query)
                        {
                            found.push(cand);
                        }
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
