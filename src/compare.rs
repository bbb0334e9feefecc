//! Cross-backend comparator
//!
//! Reports how far two position snapshots of the same logical step are
//! apart. It only measures; deciding what counts as too much drift is up to
//! the caller.

use crate::error::{SimError, SimResult};
use crate::vector::Vector3;

/// Divergence between a reference and a candidate snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Comparison {
    /// Mean distance between corresponding bodies, meters
    pub mean_error: f64,
    /// Mean distance of the reference bodies from the origin, meters
    pub mean_magnitude: f64,
    /// `mean_error / mean_magnitude`
    pub relative_error: f64,
}

impl Comparison {
    /// Compare `candidate` against `reference`, body by body
    ///
    /// Sums are accumulated in `f64`. An empty pair of snapshots compares as
    /// all zeros.
    pub fn between(reference: &[Vector3], candidate: &[Vector3]) -> SimResult<Self> {
        if reference.len() != candidate.len() {
            return Err(SimError::LengthMismatch {
                reference: reference.len(),
                candidate: candidate.len(),
            });
        }
        if reference.is_empty() {
            return Ok(Self::default());
        }

        let (error_sum, magnitude_sum) = reference.iter().zip(candidate).fold(
            (0.0f64, 0.0f64),
            |(err, mag), (&r, &c)| {
                (
                    err + f64::from(r.distance(c)),
                    mag + f64::from(r.length()),
                )
            },
        );
        let n = reference.len() as f64;
        let mean_error = error_sum / n;
        let mean_magnitude = magnitude_sum / n;
        let relative_error = if mean_magnitude > 0.0 {
            mean_error / mean_magnitude
        } else {
            0.0
        };

        Ok(Self {
            mean_error,
            mean_magnitude,
            relative_error,
        })
    }

    /// Same as [`between`](Self::between) for flattened `[x0, y0, z0, ...]` candidates
    pub fn against_flat(reference: &[Vector3], candidate: &[f32]) -> SimResult<Self> {
        if candidate.len() != reference.len() * 3 {
            return Err(SimError::LengthMismatch {
                reference: reference.len(),
                candidate: candidate.len() / 3,
            });
        }
        Self::between(reference, &crate::vector::unflatten(candidate))
    }
}
