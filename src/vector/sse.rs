//! SSE lanes for x86_64
//!
//! The vector occupies one 128-bit register. Lanes 0..3 line up with the
//! scalar layout; lane 3 is padding and is reset after every operation so
//! it never drifts into inf/NaN.

// Arithmetic intrinsics are safe to call on newer toolchains; loads and
// stores through raw pointers are not.
#![allow(unused_unsafe)]

use std::arch::x86_64::{
    __m128, _mm_add_ps, _mm_div_ps, _mm_load_ps, _mm_max_ps, _mm_min_ps, _mm_mul_ps, _mm_set1_ps,
    _mm_store_ps, _mm_sub_ps,
};
use std::fmt;

pub(super) const NAME: &str = "sse";

const PAD: f32 = 1.0;

/// Three `f32` components plus one padding lane, register aligned
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    w: f32,
}

impl Vector3 {
    /// Create a vector from its components
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, w: PAD }
    }
}

impl PartialEq for Vector3 {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }
}

impl fmt::Debug for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vector3")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("z", &self.z)
            .finish()
    }
}

#[inline(always)]
fn load(v: &Vector3) -> __m128 {
    // SAFETY: Vector3 is 16-byte aligned and exactly four f32 wide.
    unsafe { _mm_load_ps((v as *const Vector3).cast::<f32>()) }
}

#[inline(always)]
fn store(lanes: __m128) -> Vector3 {
    let mut out = Vector3::new(0.0, 0.0, 0.0);
    // SAFETY: same layout argument as `load`.
    unsafe { _mm_store_ps((&mut out as *mut Vector3).cast::<f32>(), lanes) };
    out.w = PAD;
    out
}

#[inline]
pub(super) fn add(a: Vector3, b: Vector3) -> Vector3 {
    store(unsafe { _mm_add_ps(load(&a), load(&b)) })
}

#[inline]
pub(super) fn sub(a: Vector3, b: Vector3) -> Vector3 {
    store(unsafe { _mm_sub_ps(load(&a), load(&b)) })
}

#[inline]
pub(super) fn mul(a: Vector3, b: Vector3) -> Vector3 {
    store(unsafe { _mm_mul_ps(load(&a), load(&b)) })
}

#[inline]
pub(super) fn div(a: Vector3, b: Vector3) -> Vector3 {
    store(unsafe { _mm_div_ps(load(&a), load(&b)) })
}

#[inline]
pub(super) fn scale(a: Vector3, s: f32) -> Vector3 {
    store(unsafe { _mm_mul_ps(load(&a), _mm_set1_ps(s)) })
}

#[inline]
pub(super) fn div_scalar(a: Vector3, s: f32) -> Vector3 {
    store(unsafe { _mm_div_ps(load(&a), _mm_set1_ps(s)) })
}

#[inline]
pub(super) fn min(a: Vector3, b: Vector3) -> Vector3 {
    store(unsafe { _mm_min_ps(load(&a), load(&b)) })
}

#[inline]
pub(super) fn max(a: Vector3, b: Vector3) -> Vector3 {
    store(unsafe { _mm_max_ps(load(&a), load(&b)) })
}

#[inline]
pub(super) fn dot(a: Vector3, b: Vector3) -> f32 {
    // Horizontal sum in x, y, z order so results match the scalar lanes bit for bit.
    let p = mul(a, b);
    p.x + p.y + p.z
}
