//! Plain three-lane arithmetic

pub(super) const NAME: &str = "scalar";

/// Three packed `f32` components
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    /// Create a vector from its components
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[inline]
pub(super) fn add(a: Vector3, b: Vector3) -> Vector3 {
    Vector3::new(a.x + b.x, a.y + b.y, a.z + b.z)
}

#[inline]
pub(super) fn sub(a: Vector3, b: Vector3) -> Vector3 {
    Vector3::new(a.x - b.x, a.y - b.y, a.z - b.z)
}

#[inline]
pub(super) fn mul(a: Vector3, b: Vector3) -> Vector3 {
    Vector3::new(a.x * b.x, a.y * b.y, a.z * b.z)
}

#[inline]
pub(super) fn div(a: Vector3, b: Vector3) -> Vector3 {
    Vector3::new(a.x / b.x, a.y / b.y, a.z / b.z)
}

#[inline]
pub(super) fn scale(a: Vector3, s: f32) -> Vector3 {
    Vector3::new(a.x * s, a.y * s, a.z * s)
}

#[inline]
pub(super) fn div_scalar(a: Vector3, s: f32) -> Vector3 {
    Vector3::new(a.x / s, a.y / s, a.z / s)
}

#[inline]
pub(super) fn min(a: Vector3, b: Vector3) -> Vector3 {
    Vector3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z))
}

#[inline]
pub(super) fn max(a: Vector3, b: Vector3) -> Vector3 {
    Vector3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z))
}

#[inline]
pub(super) fn dot(a: Vector3, b: Vector3) -> f32 {
    a.x * b.x + a.y * b.y + a.z * b.z
}
