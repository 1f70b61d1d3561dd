//! Local tangent-plane projection for metric work on small extents.
//!
//! Latitude/longitude degrees are not a planar unit: a degree of
//! longitude shrinks with `cos(latitude)`. Everything that measures
//! meters (areas, tolerance radii, centroid distances) first projects
//! onto an equirectangular plane centred near the geometry, which is
//! accurate to well under a percent across a single building or a few
//! hundred meters of street.

use rooftop_rain_models::Coordinate;

/// Mean Earth radius (IUGG), meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Equirectangular projection around a fixed origin.
#[derive(Debug, Clone, Copy)]
pub struct LocalProjection {
    origin: Coordinate,
    cos_lat: f64,
}

impl LocalProjection {
    /// Creates a projection centred on `origin`.
    #[must_use]
    pub fn new(origin: Coordinate) -> Self {
        Self {
            origin,
            cos_lat: origin.latitude.to_radians().cos(),
        }
    }

    /// Creates a projection centred on the vertex mean of `points`.
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    pub fn centred_on(points: &[Coordinate]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = points.len() as f64;
        let (lat_sum, lon_sum) = points.iter().fold((0.0, 0.0), |(lat, lon), c| {
            (lat + c.latitude, lon + c.longitude)
        });
        Some(Self::new(Coordinate::new(lat_sum / n, lon_sum / n)))
    }

    /// Projects a coordinate to `(x, y)` meters east/north of the origin.
    #[must_use]
    pub fn project(&self, c: &Coordinate) -> (f64, f64) {
        let x = EARTH_RADIUS_M * (c.longitude - self.origin.longitude).to_radians() * self.cos_lat;
        let y = EARTH_RADIUS_M * (c.latitude - self.origin.latitude).to_radians();
        (x, y)
    }

    /// Converts a radius in meters into `(latitude, longitude)` degree
    /// spans at the origin.
    #[must_use]
    pub fn degree_span(&self, meters: f64) -> (f64, f64) {
        let dlat = (meters / EARTH_RADIUS_M).to_degrees();
        // Near the poles cos → 0; cap the span at the full longitude range.
        let dlon = if self.cos_lat.abs() < 1e-9 {
            180.0
        } else {
            (dlat / self.cos_lat.abs()).min(180.0)
        };
        (dlat, dlon)
    }
}

/// Euclidean distance between two projected points.
#[must_use]
pub fn planar_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Distance from point `p` to the segment from `a` to `b`, all projected.
#[must_use]
pub fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx.mul_add(dx, dy * dy);
    if len_sq == 0.0 {
        return planar_distance(p, a);
    }
    let t = ((p.0 - a.0).mul_add(dx, (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0);
    planar_distance(p, (t.mul_add(dx, a.0), t.mul_add(dy, a.1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_projects_to_zero() {
        let proj = LocalProjection::new(Coordinate::new(51.5, -0.12));
        let (x, y) = proj.project(&Coordinate::new(51.5, -0.12));
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
    }

    #[test]
    fn one_millidegree_of_latitude_is_about_111_meters() {
        let proj = LocalProjection::new(Coordinate::new(51.5, 0.0));
        let (_, y) = proj.project(&Coordinate::new(51.501, 0.0));
        assert!((y - 111.195).abs() < 0.01, "got {y}");
    }

    #[test]
    fn longitude_shrinks_with_latitude() {
        let equator = LocalProjection::new(Coordinate::new(0.0, 0.0));
        let london = LocalProjection::new(Coordinate::new(51.5, 0.0));
        let (x_eq, _) = equator.project(&Coordinate::new(0.0, 0.001));
        let (x_ldn, _) = london.project(&Coordinate::new(51.5, 0.001));
        assert!((x_ldn / x_eq - 51.5_f64.to_radians().cos()).abs() < 1e-9);
    }

    #[test]
    fn degree_span_round_trips_through_projection() {
        let proj = LocalProjection::new(Coordinate::new(51.5, -0.1));
        let (dlat, dlon) = proj.degree_span(25.0);
        let (x, y) = proj.project(&Coordinate::new(51.5 + dlat, -0.1 + dlon));
        assert!((x - 25.0).abs() < 1e-6);
        assert!((y - 25.0).abs() < 1e-6);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        assert!((segment_distance((0.0, 1.0), (0.0, 0.0), (2.0, 0.0)) - 1.0).abs() < 1e-12);
        assert!((segment_distance((3.0, 0.0), (0.0, 0.0), (2.0, 0.0)) - 1.0).abs() < 1e-12);
        assert!((segment_distance((1.0, 1.0), (0.0, 0.0), (0.0, 0.0)) - 2f64.sqrt()).abs() < 1e-12);
    }
}
