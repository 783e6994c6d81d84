use std::ops::Sub;

// ─────────────────────────────────────────────────────────────────────────────
// Vec3
// ─────────────────────────────────────────────────────────────────────────────

/// Direction in mesh local space: normals, plane normals, deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Normal of the YZ plane.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn from_array(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[must_use]
    pub const fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Unit vector in the same direction, or `None` for zero and non-finite input.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length_squared().sqrt();
        if len.is_finite() && len > 0.0 {
            Some(Self::new(self.x / len, self.y / len, self.z / len))
        } else {
            None
        }
    }

    /// Reflect a direction across the plane through the origin with unit normal `plane_normal`.
    ///
    /// `v - 2 * dot(v, n) * n`. The caller is responsible for `plane_normal` being unit length.
    #[must_use]
    pub const fn reflect_across(self, plane_normal: Self) -> Self {
        let d = 2.0 * self.dot(plane_normal);
        Self::new(
            self.x - plane_normal.x * d,
            self.y - plane_normal.y * d,
            self.z - plane_normal.z * d,
        )
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(arr: [f64; 3]) -> Self {
        Self::from_array(arr)
    }
}

impl From<Vec3> for [f64; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Point3
// ─────────────────────────────────────────────────────────────────────────────

/// Vertex position in mesh local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub const fn from_array(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Signed distance to the plane through the origin with unit normal `plane_normal`.
    #[must_use]
    pub const fn plane_distance(self, plane_normal: Vec3) -> f64 {
        self.x * plane_normal.x + self.y * plane_normal.y + self.z * plane_normal.z
    }

    /// Mirror the point across the plane through the origin with unit normal `plane_normal`.
    #[must_use]
    pub const fn mirror_across(self, plane_normal: Vec3) -> Self {
        let d = 2.0 * self.plane_distance(plane_normal);
        Self::new(
            self.x - plane_normal.x * d,
            self.y - plane_normal.y * d,
            self.z - plane_normal.z * d,
        )
    }

    #[must_use]
    pub fn distance_squared_to(self, other: Self) -> f64 {
        (self - other).length_squared()
    }
}

impl Sub for Point3 {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Search radius for mirror partners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    /// Distance within which a reflected vertex counts as its partner (1e-3).
    pub const MIRROR: Self = Self { eps: 1e-3 };

    #[must_use]
    pub const fn new(eps: f64) -> Self {
        Self { eps }
    }

    #[must_use]
    pub const fn eps_squared(self) -> f64 {
        self.eps * self.eps
    }

    /// Returns `true` if `eps` is usable as a search radius (finite and positive).
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.eps.is_finite() && self.eps > 0.0
    }

    #[must_use]
    pub fn approx_eq_point3(self, a: Point3, b: Point3) -> bool {
        a.distance_squared_to(b) <= self.eps_squared()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
