//! Three-component `f32` vector used by every backend
//!
//! One public type, two lane strategies picked at compile time:
//!
//! - **scalar**: three packed floats (default, every target)
//! - **sse**: one 128-bit register with a padding lane (`--features simd` on x86_64)
//!
//! The operation set and the floating-point evaluation order are the same
//! for both, so switching strategies never changes results.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
mod sse;
#[cfg(all(feature = "simd", target_arch = "x86_64"))]
use sse as lanes;

#[cfg(not(all(feature = "simd", target_arch = "x86_64")))]
mod scalar;
#[cfg(not(all(feature = "simd", target_arch = "x86_64")))]
use scalar as lanes;

pub use lanes::Vector3;

/// Name of the lane strategy compiled in ("scalar" or "sse")
pub const LANE_STRATEGY: &str = lanes::NAME;

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// All three components set to `v`
    #[inline]
    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        lanes::dot(self, other)
    }

    /// Euclidean norm
    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction. A zero vector yields NaNs.
    #[inline]
    pub fn normalize(self) -> Self {
        self / self.length()
    }

    /// Euclidean distance between two points
    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Componentwise minimum
    #[inline]
    pub fn min(self, other: Self) -> Self {
        lanes::min(self, other)
    }

    /// Componentwise maximum
    #[inline]
    pub fn max(self, other: Self) -> Self {
        lanes::max(self, other)
    }

    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Default for Vector3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl Add for Vector3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        lanes::add(self, rhs)
    }
}

impl Sub for Vector3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        lanes::sub(self, rhs)
    }
}

impl Mul for Vector3 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        lanes::mul(self, rhs)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        lanes::scale(self, rhs)
    }
}

impl Div for Vector3 {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        lanes::div(self, rhs)
    }
}

impl Div<f32> for Vector3 {
    type Output = Self;
    #[inline]
    fn div(self, rhs: f32) -> Self {
        lanes::div_scalar(self, rhs)
    }
}

impl Neg for Vector3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        lanes::scale(self, -1.0)
    }
}

impl AddAssign for Vector3 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vector3 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

/// Interleave vectors into `[x0, y0, z0, x1, ...]`
pub fn flatten(vectors: &[Vector3]) -> Vec<f32> {
    let mut flat = Vec::with_capacity(vectors.len() * 3);
    for v in vectors {
        flat.extend_from_slice(&v.to_array());
    }
    flat
}

/// Inverse of [`flatten`]; a trailing partial triple is ignored
pub fn unflatten(flat: &[f32]) -> Vec<Vector3> {
    flat.chunks_exact(3)
        .map(|c| Vector3::new(c[0], c[1], c[2]))
        .collect()
}
