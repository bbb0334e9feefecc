//! Frame buffer shared with a presentation layer
//!
//! The presentation side only ever sees a flat `[x0, y0, z0, x1, ...]`
//! position array. Writers take an exclusive [`FrameGuard`]; while it is
//! held no reader can observe the buffer, and dropping it publishes the
//! contents. This makes acquire/release a real ordering fence rather than a
//! convention.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Clonable handle to one shared position buffer
#[derive(Debug, Clone, Default)]
pub struct FrameBuffer {
    inner: Arc<Mutex<Vec<f32>>>,
}

/// Exclusive write access to a [`FrameBuffer`]; released on drop
pub struct FrameGuard<'a> {
    data: MutexGuard<'a, Vec<f32>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer pre-filled with `positions`
    pub fn with_contents(positions: Vec<f32>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(positions)),
        }
    }

    /// Take exclusive access, blocking until the current holder releases
    pub fn acquire(&self) -> FrameGuard<'_> {
        // A panicked writer leaves a stale frame, not a corrupt one.
        let data = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        FrameGuard { data }
    }

    /// Acquire, replace the contents, release
    pub fn publish(&self, positions: &[f32]) {
        self.acquire().write(positions);
    }

    /// Copy of the current frame, as the presentation side would read it
    pub fn snapshot(&self) -> Vec<f32> {
        self.acquire().to_vec()
    }

    /// Number of floats in the current frame
    pub fn len(&self) -> usize {
        self.acquire().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameGuard<'_> {
    /// Replace the frame contents, resizing as needed
    pub fn write(&mut self, positions: &[f32]) {
        self.data.clear();
        self.data.extend_from_slice(positions);
    }

    /// Explicit release; same as dropping the guard
    pub fn release(self) {}
}

impl Deref for FrameGuard<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.data
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}
