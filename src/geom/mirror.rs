//! Plane-symmetry vertex correspondence and normal mirroring.
//!
//! [`build_mirror_relation`] pairs every vertex with the vertex nearest to its
//! reflection across a plane through the origin. [`apply_mirror`] then copies
//! normals across those pairs, reflecting them on the way.
//!
//! # Partner selection
//!
//! Candidates for vertex `i` are all `j` with `|p_j - reflect(p_i)| <= eps`,
//! ranked by:
//!
//! 1. normal compatibility (`dot(n_i, reflect(n_j)) >= normal_threshold`)
//! 2. distance to the reflected point
//! 3. `j == i` before other indices at equal distance
//! 4. lowest index
//!
//! Vertices are paired greedily in ascending index order, each taking its best
//! candidate that is still unpaired. A vertex whose candidates are all taken
//! reroutes earlier picks along augmenting paths over the candidate lists, so
//! the build only fails when no pairing of all vertices exists. A built
//! relation is always an involution. Pairs whose normals disagree are accepted
//! and counted in [`MirrorDiagnostics::normal_mismatch_count`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use super::core::{Point3, Tolerance, Vec3};
use super::diagnostics::MirrorDiagnostics;
use super::grid::PointGrid;
use super::metrics::{ShapeMetrics, TimingBucket};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Errors raised by the mirror operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MirrorError {
    #[error("vertex {vertex} has no mirror partner within tolerance")]
    NotSymmetric { vertex: usize },

    #[error("{buffer} buffer has {found} entries, expected {expected}")]
    DimensionMismatch {
        buffer: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("mirror plane normal must be finite and non-zero")]
    InvalidPlane,

    #[error("mirror tolerance must be finite and positive, got {eps}")]
    InvalidTolerance { eps: f64 },
}

/// Which half of the mesh is the source, named after the direction edits flow.
///
/// The associated plane normal points towards the destination half, so the
/// source half is where [`Point3::plane_distance`] is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorMode {
    RightToLeft,
    LeftToRight,
    ForwardToBack,
    BackToForward,
    UpToDown,
    DownToUp,
}

impl MirrorMode {
    pub const ALL: [Self; 6] = [
        Self::RightToLeft,
        Self::LeftToRight,
        Self::ForwardToBack,
        Self::BackToForward,
        Self::UpToDown,
        Self::DownToUp,
    ];

    #[must_use]
    pub const fn plane_normal(self) -> Vec3 {
        match self {
            Self::RightToLeft => Vec3::new(-1.0, 0.0, 0.0),
            Self::LeftToRight => Vec3::new(1.0, 0.0, 0.0),
            Self::ForwardToBack => Vec3::new(0.0, 0.0, -1.0),
            Self::BackToForward => Vec3::new(0.0, 0.0, 1.0),
            Self::UpToDown => Vec3::new(0.0, -1.0, 0.0),
            Self::DownToUp => Vec3::new(0.0, 1.0, 0.0),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RightToLeft => "RightToLeft",
            Self::LeftToRight => "LeftToRight",
            Self::ForwardToBack => "ForwardToBack",
            Self::BackToForward => "BackToForward",
            Self::UpToDown => "UpToDown",
            Self::DownToUp => "DownToUp",
        }
    }
}

impl fmt::Display for MirrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mirror mode `{0}`")]
pub struct UnknownMirrorMode(pub String);

impl FromStr for MirrorMode {
    type Err = UnknownMirrorMode;

    /// Accepts `RightToLeft`, `right_to_left`, `right-to-left` and so on.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().to_ascii_lowercase() == key)
            .ok_or_else(|| UnknownMirrorMode(s.to_owned()))
    }
}

/// Options for [`build_mirror_relation`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorOptions {
    /// Maximum distance between a reflected vertex and its partner.
    pub epsilon: f64,
    /// Minimum `dot(n_i, reflect(n_j))` for a pair to count as normal-compatible.
    /// `None` skips the normal check.
    pub normal_threshold: Option<f64>,
}

impl MirrorOptions {
    #[must_use]
    pub const fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            normal_threshold: Some(0.99),
        }
    }

    #[must_use]
    pub const fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    #[must_use]
    pub const fn normal_threshold(mut self, threshold: Option<f64>) -> Self {
        self.normal_threshold = threshold;
        self
    }
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self::new(Tolerance::MIRROR.eps)
    }
}

/// Vertex-to-partner map for one point set and plane.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorRelation {
    partners: Vec<usize>,
    plane_normal: Vec3,
}

impl MirrorRelation {
    #[must_use]
    pub fn partners(&self) -> &[usize] {
        &self.partners
    }

    #[must_use]
    pub fn partner(&self, index: usize) -> Option<usize> {
        self.partners.get(index).copied()
    }

    /// The unit plane normal the relation was built for.
    #[must_use]
    pub fn plane_normal(&self) -> Vec3 {
        self.plane_normal
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.partners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    /// `relation[relation[i]] == i` for every `i`.
    #[must_use]
    pub fn is_involution(&self) -> bool {
        self.partners
            .iter()
            .enumerate()
            .all(|(i, &j)| self.partners.get(j) == Some(&i))
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    dist_sq: f64,
    compatible: bool,
}

/// Normalise a plane normal, rejecting zero and non-finite input.
pub fn normalize_plane(plane_normal: Vec3) -> Result<Vec3, MirrorError> {
    if !plane_normal.is_finite() {
        return Err(MirrorError::InvalidPlane);
    }
    plane_normal.normalized().ok_or(MirrorError::InvalidPlane)
}

/// Pair every vertex with its mirror image across the plane through the origin.
///
/// `reference_normals` is only used to rank candidates; it must have one entry
/// per point.
///
/// # Errors
/// - [`MirrorError::InvalidPlane`] / [`MirrorError::InvalidTolerance`] for bad options
/// - [`MirrorError::DimensionMismatch`] when `reference_normals` has the wrong length
/// - [`MirrorError::NotSymmetric`] naming the first vertex left without a partner
pub fn build_mirror_relation(
    points: &[[f64; 3]],
    reference_normals: &[[f64; 3]],
    plane_normal: Vec3,
    options: MirrorOptions,
) -> Result<(MirrorRelation, MirrorDiagnostics), MirrorError> {
    let plane = normalize_plane(plane_normal)?;
    let tol = Tolerance::new(options.epsilon);
    if !tol.is_valid() {
        return Err(MirrorError::InvalidTolerance {
            eps: options.epsilon,
        });
    }
    let n = points.len();
    if reference_normals.len() != n {
        return Err(MirrorError::DimensionMismatch {
            buffer: "reference normal",
            expected: n,
            found: reference_normals.len(),
        });
    }

    let mut metrics = ShapeMetrics::default();
    metrics.begin();

    let ranked = metrics.time(TimingBucket::MirrorSearch, || {
        let grid = PointGrid::build(points, tol);
        rank_all_candidates(&grid, points, reference_normals, plane, options.normal_threshold)
    });

    let mut diag = MirrorDiagnostics {
        vertex_count: n,
        ambiguous_count: ranked.iter().filter(|c| c.len() > 1).count(),
        ..Default::default()
    };

    let partners = metrics.time(TimingBucket::MirrorPairing, || {
        pair_vertices(&ranked)
    });
    let partners = match partners {
        Ok(partners) => partners,
        Err(err) => {
            log::warn!("mirror relation failed: {err}");
            return Err(err);
        }
    };

    tally_pairs(&partners, &ranked, &mut diag);
    diag.timing = metrics.end();
    log::debug!("build_mirror_relation: {}", diag.summary());
    Ok((
        MirrorRelation {
            partners,
            plane_normal: plane,
        },
        diag,
    ))
}

#[cfg(feature = "parallel")]
fn rank_all_candidates(
    grid: &PointGrid<'_>,
    points: &[[f64; 3]],
    normals: &[[f64; 3]],
    plane: Vec3,
    threshold: Option<f64>,
) -> Vec<Vec<Candidate>> {
    (0..points.len())
        .into_par_iter()
        .map(|i| rank_candidates(grid, points, normals, plane, threshold, i))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn rank_all_candidates(
    grid: &PointGrid<'_>,
    points: &[[f64; 3]],
    normals: &[[f64; 3]],
    plane: Vec3,
    threshold: Option<f64>,
) -> Vec<Vec<Candidate>> {
    (0..points.len())
        .map(|i| rank_candidates(grid, points, normals, plane, threshold, i))
        .collect()
}

fn rank_candidates(
    grid: &PointGrid<'_>,
    points: &[[f64; 3]],
    normals: &[[f64; 3]],
    plane: Vec3,
    threshold: Option<f64>,
    i: usize,
) -> Vec<Candidate> {
    let reflected = Point3::from_array(points[i]).mirror_across(plane);
    let normal_i = Vec3::from_array(normals[i]);

    let mut candidates: Vec<Candidate> = grid
        .within(reflected)
        .into_iter()
        .map(|j| {
            let compatible = threshold.is_none_or(|min| {
                normal_i.dot(Vec3::from_array(normals[j]).reflect_across(plane)) >= min
            });
            Candidate {
                index: j,
                dist_sq: Point3::from_array(points[j]).distance_squared_to(reflected),
                compatible,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.compatible
            .cmp(&a.compatible)
            .then(a.dist_sq.total_cmp(&b.dist_sq))
            .then((a.index != i).cmp(&(b.index != i)))
            .then(a.index.cmp(&b.index))
    });
    candidates
}

fn pair_vertices(ranked: &[Vec<Candidate>]) -> Result<Vec<usize>, MirrorError> {
    if let Some(vertex) = ranked.iter().position(Vec::is_empty) {
        return Err(MirrorError::NotSymmetric { vertex });
    }
    let (partners, stuck) = pair_greedily(ranked);
    if stuck.is_empty() {
        return Ok(partners.into_iter().enumerate().map(|(i, p)| p.unwrap_or(i)).collect());
    }
    log::debug!("mirror pairing: {} vertices need augmenting paths", stuck.len());

    // Vertex `i` maps onto `image[i]`; `preimage` is the inverse.
    let mut image = partners;
    let mut preimage = image.clone();
    for vertex in stuck {
        if !augment(ranked, vertex, &mut image, &mut preimage) {
            return Err(MirrorError::NotSymmetric { vertex });
        }
    }
    let image: Vec<usize> = image
        .into_iter()
        .enumerate()
        .map(|(i, j)| j.ok_or(MirrorError::NotSymmetric { vertex: i }))
        .collect::<Result<_, _>>()?;
    involution_from_permutation(&image, ranked)
}

/// Greedy first pass. Returns the partial pairing and the vertices whose
/// candidates were all taken.
fn pair_greedily(ranked: &[Vec<Candidate>]) -> (Vec<Option<usize>>, Vec<usize>) {
    let mut partners: Vec<Option<usize>> = vec![None; ranked.len()];
    let mut stuck = Vec::new();
    for (i, candidates) in ranked.iter().enumerate() {
        if partners[i].is_some() {
            continue;
        }
        match candidates.iter().find(|c| partners[c.index].is_none()) {
            Some(chosen) => {
                partners[i] = Some(chosen.index);
                partners[chosen.index] = Some(i);
            }
            None => stuck.push(i),
        }
    }
    (partners, stuck)
}

/// Breadth-first search for an augmenting path from the unmatched vertex
/// `start`, treating the candidate lists as a bipartite graph between each
/// vertex and its image. Flips the path in place when one is found.
fn augment(
    ranked: &[Vec<Candidate>],
    start: usize,
    image: &mut [Option<usize>],
    preimage: &mut [Option<usize>],
) -> bool {
    let mut reached_from: HashMap<usize, usize> = HashMap::new();
    let mut queued: HashSet<usize> = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(i) = queue.pop_front() {
        for candidate in &ranked[i] {
            let j = candidate.index;
            if reached_from.contains_key(&j) {
                continue;
            }
            reached_from.insert(j, i);
            match preimage[j] {
                Some(k) => {
                    if queued.insert(k) {
                        queue.push_back(k);
                    }
                }
                None => {
                    flip_path(j, start, &reached_from, image, preimage);
                    return true;
                }
            }
        }
    }
    false
}

fn flip_path(
    free: usize,
    start: usize,
    reached_from: &HashMap<usize, usize>,
    image: &mut [Option<usize>],
    preimage: &mut [Option<usize>],
) {
    let mut j = free;
    while let Some(&i) = reached_from.get(&j) {
        let previous = image[i];
        image[i] = Some(j);
        preimage[j] = Some(i);
        match previous {
            Some(p) if i != start => j = p,
            _ => break,
        }
    }
}

/// Split a candidate permutation into pairs. Even cycles pair off along the
/// cycle; an odd cycle needs one vertex that may map onto itself.
fn involution_from_permutation(
    image: &[usize],
    ranked: &[Vec<Candidate>],
) -> Result<Vec<usize>, MirrorError> {
    let n = image.len();
    let mut partners: Vec<usize> = (0..n).collect();
    let mut visited = vec![false; n];

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut cycle = vec![start];
        visited[start] = true;
        let mut k = image[start];
        while k != start {
            visited[k] = true;
            cycle.push(k);
            k = image[k];
        }

        let paired = if cycle.len() % 2 == 1 {
            let fixed = cycle
                .iter()
                .position(|&v| ranked[v].iter().any(|c| c.index == v))
                .ok_or(MirrorError::NotSymmetric { vertex: start })?;
            cycle.rotate_left(fixed);
            &cycle[1..]
        } else {
            &cycle[..]
        };
        for pair in paired.chunks_exact(2) {
            partners[pair[0]] = pair[1];
            partners[pair[1]] = pair[0];
        }
    }
    Ok(partners)
}

fn tally_pairs(partners: &[usize], ranked: &[Vec<Candidate>], diag: &mut MirrorDiagnostics) {
    for (i, &j) in partners.iter().enumerate() {
        if j < i {
            continue;
        }
        if j == i {
            diag.self_mapped_count += 1;
        } else {
            diag.pair_count += 1;
        }
        let compatible = ranked[i]
            .iter()
            .find(|c| c.index == j)
            .or_else(|| ranked[j].iter().find(|c| c.index == i))
            .is_some_and(|c| c.compatible);
        if !compatible {
            diag.normal_mismatch_count += 1;
        }
    }
}

/// Copy normals across the relation: for each `i` with `relation[i] != i`,
/// `normals[relation[i]] = reflect(normals[i])`, in ascending `i`.
///
/// On an involution the lower index of each pair ends up as the source.
pub fn apply_mirror(relation: &MirrorRelation, normals: &mut [[f64; 3]]) -> Result<(), MirrorError> {
    check_len("normal", relation.len(), normals.len())?;
    let plane = relation.plane_normal;
    for (i, &target) in relation.partners.iter().enumerate() {
        if target != i {
            normals[target] = Vec3::from_array(normals[i]).reflect_across(plane).to_array();
        }
    }
    Ok(())
}

/// Like [`apply_mirror`], but only vertices strictly on the negative side of the
/// plane write into their partners. With a [`MirrorMode`] plane this copies the
/// named source half onto the other half.
pub fn apply_mirror_from_source_side(
    relation: &MirrorRelation,
    points: &[[f64; 3]],
    normals: &mut [[f64; 3]],
) -> Result<(), MirrorError> {
    check_len("point", relation.len(), points.len())?;
    check_len("normal", relation.len(), normals.len())?;
    let plane = relation.plane_normal;
    for (i, &target) in relation.partners.iter().enumerate() {
        if target != i && Point3::from_array(points[i]).plane_distance(plane) < 0.0 {
            normals[target] = Vec3::from_array(normals[i]).reflect_across(plane).to_array();
        }
    }
    Ok(())
}

fn check_len(buffer: &'static str, expected: usize, found: usize) -> Result<(), MirrorError> {
    if expected != found {
        return Err(MirrorError::DimensionMismatch {
            buffer,
            expected,
            found,
        });
    }
    Ok(())
}
