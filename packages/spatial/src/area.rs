//! Rooftop area from a footprint ring.
//!
//! The ring is projected into a local metric plane centred on its own
//! vertices and measured with the shoelace formula. The absolute value is
//! taken, so winding order and starting vertex do not matter.

use rooftop_rain_models::{Coordinate, Footprint, RooftopArea};

use crate::SpatialError;
use crate::projection::LocalProjection;

/// Share of the footprint that actually collects rain once vents,
/// parapets and plant are excluded.
pub const DEFAULT_EFFECTIVE_COLLECTION: f64 = 0.85;

/// Areas below this are rounding noise from collinear rings.
const MIN_AREA_M2: f64 = 1e-6;

/// Signed shoelace area of a planar ring (positive when
/// counter-clockwise). The ring is treated as implicitly closed.
#[must_use]
pub fn shoelace(points: &[(f64, f64)]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let (x1, y1) = points[i];
            let (x2, y2) = points[(i + 1) % n];
            x1.mul_add(y2, -(x2 * y1))
        })
        .sum();
    twice / 2.0
}

/// Returns the ring without a duplicated closing vertex.
#[must_use]
pub fn open_ring(ring: &[Coordinate]) -> &[Coordinate] {
    match ring {
        [first, .., last] if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

/// Unsigned planar area of a WGS84 ring in square meters, without
/// validation. Rings with fewer than three vertices measure zero.
#[must_use]
pub fn ring_area_m2(ring: &[Coordinate]) -> f64 {
    let ring = open_ring(ring);
    let Some(projection) = LocalProjection::centred_on(ring) else {
        return 0.0;
    };
    let projected: Vec<(f64, f64)> = ring.iter().map(|c| projection.project(c)).collect();
    shoelace(&projected).abs()
}

/// Converts located footprints into collectible rooftop area.
#[derive(Debug, Clone, Copy)]
pub struct AreaEstimator {
    effective_collection: f64,
}

impl Default for AreaEstimator {
    fn default() -> Self {
        Self {
            effective_collection: DEFAULT_EFFECTIVE_COLLECTION,
        }
    }
}

impl AreaEstimator {
    /// Creates an estimator with the given effective-collection
    /// coefficient.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidParameter`] unless the coefficient
    /// is in `(0, 1]`.
    pub fn new(effective_collection: f64) -> Result<Self, SpatialError> {
        if !(effective_collection > 0.0 && effective_collection <= 1.0) {
            return Err(SpatialError::InvalidParameter {
                message: format!(
                    "effective-collection coefficient must be in (0, 1], got {effective_collection}"
                ),
            });
        }
        Ok(Self {
            effective_collection,
        })
    }

    /// The configured effective-collection coefficient.
    #[must_use]
    pub const fn effective_collection(&self) -> f64 {
        self.effective_collection
    }

    /// Computes the raw and effective rooftop area of a footprint.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::DegenerateGeometry`] if the ring has fewer
    /// than three distinct vertices or encloses no area.
    pub fn estimate(&self, footprint: &Footprint) -> Result<RooftopArea, SpatialError> {
        let ring = open_ring(&footprint.ring);
        if ring.len() < 3 {
            return Err(SpatialError::DegenerateGeometry {
                id: footprint.id.clone(),
                message: format!("{} vertices, need at least 3", ring.len()),
            });
        }
        if ring.iter().any(|c| !c.is_valid()) {
            return Err(SpatialError::DegenerateGeometry {
                id: footprint.id.clone(),
                message: "ring contains an invalid coordinate".to_string(),
            });
        }

        let raw_m2 = ring_area_m2(ring);
        if !raw_m2.is_finite() || raw_m2 < MIN_AREA_M2 {
            return Err(SpatialError::DegenerateGeometry {
                id: footprint.id.clone(),
                message: "ring encloses zero area".to_string(),
            });
        }

        log::debug!(
            "footprint {}: raw {raw_m2:.2} m², effective {:.2} m²",
            footprint.id,
            raw_m2 * self.effective_collection
        );

        Ok(RooftopArea {
            raw_m2,
            effective_m2: raw_m2 * self.effective_collection,
        })
    }
}
