//! Caller-side cache for mirror relations.
//!
//! A relation only depends on the vertex count, the plane and the build
//! options, so repeated edits to the same topology can reuse it. Any change to
//! those keys triggers a rebuild.
//!
//! # Example
//! ```ignore
//! let mut cache = MirrorRelationCache::default();
//! let relation = cache.get_or_build(&points, &normals, MirrorMode::RightToLeft.plane_normal(), MirrorOptions::default())?;
//! apply_mirror(&relation, &mut normals)?;
//! println!("hits: {}", cache.stats().hits);
//! ```

use std::sync::Arc;

use super::core::Vec3;
use super::diagnostics::MirrorDiagnostics;
use super::mirror::{MirrorError, MirrorOptions, MirrorRelation, build_mirror_relation, normalize_plane};

/// Cache key for a built relation. Floats are compared bitwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RelationKey {
    vertex_count: usize,
    plane: [u64; 3],
    epsilon: u64,
    normal_threshold: Option<u64>,
}

impl RelationKey {
    fn new(vertex_count: usize, plane: Vec3, options: MirrorOptions) -> Self {
        Self {
            vertex_count,
            plane: [plane.x.to_bits(), plane.y.to_bits(), plane.z.to_bits()],
            epsilon: options.epsilon.to_bits(),
            normal_threshold: options.normal_threshold.map(f64::to_bits),
        }
    }
}

#[derive(Debug)]
struct CachedRelation {
    key: RelationKey,
    relation: Arc<MirrorRelation>,
    diagnostics: MirrorDiagnostics,
}

/// Single-slot mirror relation cache.
#[derive(Debug, Default)]
pub struct MirrorRelationCache {
    entry: Option<CachedRelation>,
    hits: usize,
    misses: usize,
    failures: usize,
}

/// Cache statistics for diagnostics and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorCacheStats {
    /// Whether a relation is currently cached.
    pub cached: bool,
    /// Vertex count of the cached relation (0 when empty).
    pub vertex_count: usize,
    pub hits: usize,
    /// Builds triggered by an empty cache or a key change.
    pub misses: usize,
    /// Builds that failed and cleared the cache.
    pub failures: usize,
    /// Estimated memory usage in bytes.
    pub estimated_memory_bytes: usize,
}

impl MirrorCacheStats {
    /// Returns the hit rate as a value between 0.0 and 1.0.
    /// Returns 0.0 if no lookups have been made.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl MirrorRelationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached relation for these inputs, building it on a key change.
    ///
    /// A failed build leaves the cache empty; the caller should stop mirroring
    /// until the mesh or plane changes.
    pub fn get_or_build(
        &mut self,
        points: &[[f64; 3]],
        reference_normals: &[[f64; 3]],
        plane_normal: Vec3,
        options: MirrorOptions,
    ) -> Result<Arc<MirrorRelation>, MirrorError> {
        let plane = match normalize_plane(plane_normal) {
            Ok(plane) => plane,
            Err(err) => {
                self.fail();
                return Err(err);
            }
        };
        let key = RelationKey::new(points.len(), plane, options);

        if let Some(cached) = self.entry.as_ref().filter(|cached| cached.key == key) {
            self.hits += 1;
            return Ok(Arc::clone(&cached.relation));
        }

        self.misses += 1;
        match build_mirror_relation(points, reference_normals, plane, options) {
            Ok((relation, diagnostics)) => {
                let relation = Arc::new(relation);
                self.entry = Some(CachedRelation {
                    key,
                    relation: Arc::clone(&relation),
                    diagnostics,
                });
                Ok(relation)
            }
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    fn fail(&mut self) {
        self.entry = None;
        self.failures += 1;
    }

    /// The cached relation, if any.
    #[must_use]
    pub fn relation(&self) -> Option<&MirrorRelation> {
        self.entry.as_ref().map(|cached| cached.relation.as_ref())
    }

    /// Diagnostics from the build that produced the cached relation.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&MirrorDiagnostics> {
        self.entry.as_ref().map(|cached| &cached.diagnostics)
    }

    /// Drop the cached relation, keeping the counters.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Drop the cached relation and reset all counters.
    pub fn clear(&mut self) {
        self.entry = None;
        self.reset_counters();
    }

    pub fn reset_counters(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.failures = 0;
    }

    #[must_use]
    pub fn stats(&self) -> MirrorCacheStats {
        MirrorCacheStats {
            cached: self.entry.is_some(),
            vertex_count: self.relation().map_or(0, MirrorRelation::len),
            hits: self.hits,
            misses: self.misses,
            failures: self.failures,
            estimated_memory_bytes: self.estimate_memory_usage(),
        }
    }

    #[must_use]
    pub fn estimate_memory_usage(&self) -> usize {
        self.relation().map_or(0, |relation| {
            relation.len() * std::mem::size_of::<usize>() + std::mem::size_of::<CachedRelation>()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symmetric_pair() -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
        (
            vec![[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]],
            vec![[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0]],
        )
    }

    #[test]
    fn cache_hit_on_same_key() {
        let (points, normals) = symmetric_pair();
        let mut cache = MirrorRelationCache::new();
        let first = cache
            .get_or_build(&points, &normals, Vec3::X, MirrorOptions::default())
            .unwrap();
        let second = cache
            .get_or_build(&points, &normals, Vec3::new(2.0, 0.0, 0.0), MirrorOptions::default())
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(stats.cached);
        assert_eq!(stats.vertex_count, 2);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn cache_failure_clears_entry() {
        let (points, normals) = symmetric_pair();
        let mut cache = MirrorRelationCache::new();
        cache
            .get_or_build(&points, &normals, Vec3::X, MirrorOptions::default())
            .unwrap();

        // A vertex-count change forces a rebuild, which fails on the lopsided set.
        let lopsided = vec![[1.0, 0.0, 0.0], [-1.5, 0.0, 0.0], [0.0, 0.0, 0.0]];
        let lopsided_normals = vec![[0.0, 0.0, 1.0]; 3];
        let err = cache
            .get_or_build(&lopsided, &lopsided_normals, Vec3::X, MirrorOptions::default())
            .unwrap_err();
        assert_eq!(err, MirrorError::NotSymmetric { vertex: 0 });
        assert!(cache.relation().is_none());
        assert_eq!(cache.stats().failures, 1);

        cache.clear();
        assert_eq!(cache.stats(), MirrorCacheStats::default());
    }
}
