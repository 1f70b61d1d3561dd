//! R-tree index over building footprints.
//!
//! Footprints are bulk-loaded once and never mutated, so the index can be
//! shared across concurrent queries behind an `Arc`.

use std::path::Path;

use geo::{Centroid, Contains};
use geojson::{Feature, GeoJson, JsonValue};
use rooftop_rain_models::{BoundingBox, Coordinate, Footprint};
use rstar::{AABB, RTree, RTreeObject};

use crate::area::{open_ring, ring_area_m2};
use crate::projection::{LocalProjection, planar_distance, segment_distance};
use crate::{LoadError, SpatialError};

/// Default search radius around a geocoded point, meters.
pub const DEFAULT_TOLERANCE_M: f64 = 25.0;

/// Centroid distances closer than this are treated as a tie.
const CENTROID_TIE_M: f64 = 1e-6;

/// A footprint stored in the R-tree with precomputed geometry.
struct FootprintEntry {
    footprint: Footprint,
    polygon: geo::Polygon<f64>,
    centroid: Coordinate,
    area_m2: f64,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for FootprintEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl FootprintEntry {
    /// Builds an entry from a WGS84 polygon (x = longitude, y = latitude).
    /// Interior rings (courtyards) are ignored; only the outer roof
    /// outline matters for lookup.
    fn new(id: String, polygon: &geo::Polygon<f64>) -> Option<Self> {
        let ring: Vec<Coordinate> = polygon
            .exterior()
            .coords()
            .map(|c| Coordinate::new(c.y, c.x))
            .collect();
        let ring = open_ring(&ring).to_vec();
        if ring.is_empty() {
            return None;
        }

        let envelope = ring_envelope(&ring);
        let centroid = polygon.centroid().map_or_else(
            || vertex_mean(&ring),
            |p| Coordinate::new(p.y(), p.x()),
        );
        let area_m2 = ring_area_m2(&ring);
        let outline = geo::Polygon::new(polygon.exterior().clone(), Vec::new());

        Some(Self {
            footprint: Footprint { id, ring },
            polygon: outline,
            centroid,
            area_m2,
            envelope,
        })
    }

    /// Distance in meters from the projection origin to this footprint:
    /// zero inside, otherwise the distance to the nearest edge.
    fn distance_m(&self, point: &geo::Point<f64>, projection: &LocalProjection) -> f64 {
        if self.polygon.contains(point) {
            return 0.0;
        }
        let ring: Vec<(f64, f64)> = self
            .footprint
            .ring
            .iter()
            .map(|c| projection.project(c))
            .collect();
        let n = ring.len();
        (0..n)
            .map(|i| segment_distance((0.0, 0.0), ring[i], ring[(i + 1) % n]))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Summary of the loaded footprint dataset.
#[derive(Debug, Clone, Copy)]
pub struct FootprintStats {
    /// Number of indexed footprints.
    pub count: usize,
    /// Extent of all footprints.
    pub bounds: Option<BoundingBox>,
    /// Mean planar footprint area, square meters.
    pub mean_area_m2: f64,
    /// Largest planar footprint area, square meters.
    pub max_area_m2: f64,
}

/// Pre-built spatial index of rooftop footprints.
///
/// Constructed once and shared across all requests.
pub struct FootprintIndex {
    tree: RTree<FootprintEntry>,
}

impl FootprintIndex {
    /// Builds an index from already-parsed footprints.
    ///
    /// Footprints with an empty ring are skipped.
    #[must_use]
    pub fn from_footprints(footprints: Vec<Footprint>) -> Self {
        let entries = footprints
            .into_iter()
            .filter_map(|fp| {
                let outline: Vec<(f64, f64)> =
                    fp.ring.iter().map(|c| (c.longitude, c.latitude)).collect();
                let polygon = geo::Polygon::new(geo::LineString::from(outline), Vec::new());
                FootprintEntry::new(fp.id, &polygon)
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Loads footprints from a `GeoJSON` file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the file cannot be read or parsed.
    pub fn load_geojson(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        let index = Self::from_geojson_str(&text)?;
        log::info!(
            "Loaded {} footprints from {} into spatial index",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Parses a `GeoJSON` document (`FeatureCollection`, `Feature` or bare
    /// geometry) into an index.
    ///
    /// Every polygon of a `MultiPolygon` becomes its own footprint with id
    /// `"<id>#<n>"`. Non-polygonal features are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::GeoJson`] if the document is not valid
    /// `GeoJSON`.
    pub fn from_geojson_str(text: &str) -> Result<Self, LoadError> {
        let geojson: GeoJson = text.parse()?;

        let features: Vec<Feature> = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(geometry) => vec![Feature::from(geometry)],
        };

        let mut entries = Vec::with_capacity(features.len());
        for (idx, feature) in features.into_iter().enumerate() {
            let id = feature_id(&feature).unwrap_or_else(|| format!("feature-{idx}"));
            let Some(geometry) = feature.geometry else {
                log::warn!("Footprint {id} has no geometry, skipping");
                continue;
            };
            let Some(polygons) = geometry_to_polygons(geometry) else {
                log::warn!("Footprint {id} is not a polygon, skipping");
                continue;
            };
            push_polygons(&mut entries, &id, &polygons);
        }

        Ok(Self {
            tree: RTree::bulk_load(entries),
        })
    }

    /// Loads footprints from a `DuckDB` table
    /// `footprints(id VARCHAR, geojson VARCHAR)`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::DuckDb`] if the query fails.
    pub fn load_duckdb(conn: &duckdb::Connection) -> Result<Self, LoadError> {
        let mut stmt =
            conn.prepare("SELECT id, geojson FROM footprints WHERE geojson IS NOT NULL")?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let geojson_str: String = row.get(1)?;

            if id.is_empty() || geojson_str.is_empty() {
                continue;
            }

            let Some(polygons) = parse_geojson_geometry(&geojson_str).and_then(geometry_to_polygons)
            else {
                log::warn!("Failed to parse GeoJSON for footprint {id}");
                continue;
            };

            push_polygons(&mut entries, &id, &polygons);
        }

        let index = Self {
            tree: RTree::bulk_load(entries),
        };
        log::info!("Loaded {} footprints from DuckDB into spatial index", index.len());
        Ok(index)
    }

    /// Number of indexed footprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no footprints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Summarises the indexed dataset.
    #[must_use]
    pub fn stats(&self) -> FootprintStats {
        let count = self.len();
        let bounds = (count > 0).then(|| {
            let env = self.tree.root().envelope();
            BoundingBox::new(env.lower()[0], env.lower()[1], env.upper()[0], env.upper()[1])
        });
        let (total, max) = self
            .tree
            .iter()
            .fold((0.0, 0.0_f64), |(total, max), e| (total + e.area_m2, max.max(e.area_m2)));
        #[allow(clippy::cast_precision_loss)]
        let mean_area_m2 = if count > 0 { total / count as f64 } else { 0.0 };

        FootprintStats {
            count,
            bounds,
            mean_area_m2,
            max_area_m2: max,
        }
    }

    /// Finds the footprint at (or within `tolerance_m` meters of) a
    /// coordinate.
    ///
    /// Among qualifying footprints the one whose centroid is closest to
    /// the coordinate wins; on a centroid tie the larger footprint wins,
    /// then the lexicographically smaller id for determinism.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::NoFootprintFound`] when nothing qualifies
    /// and [`SpatialError::InvalidParameter`] for a negative or
    /// non-finite tolerance.
    pub fn locate(&self, at: &Coordinate, tolerance_m: f64) -> Result<&Footprint, SpatialError> {
        if !(tolerance_m.is_finite() && tolerance_m >= 0.0) {
            return Err(SpatialError::InvalidParameter {
                message: format!("tolerance must be a non-negative distance, got {tolerance_m}"),
            });
        }

        let projection = LocalProjection::new(*at);
        let (dlat, dlon) = projection.degree_span(tolerance_m);
        let query_env = AABB::from_corners(
            [at.longitude - dlon, at.latitude - dlat],
            [at.longitude + dlon, at.latitude + dlat],
        );
        let point = geo::Point::new(at.longitude, at.latitude);

        let mut best: Option<(&FootprintEntry, f64)> = None;

        for entry in self.tree.locate_in_envelope_intersecting(&query_env) {
            if entry.distance_m(&point, &projection) > tolerance_m {
                continue;
            }
            let centroid_m = planar_distance(projection.project(&entry.centroid), (0.0, 0.0));

            best = match best {
                Some((current, current_m)) if !outranks(entry, centroid_m, current, current_m) => {
                    Some((current, current_m))
                }
                _ => Some((entry, centroid_m)),
            };
        }

        best.map(|(entry, _)| &entry.footprint)
            .ok_or(SpatialError::NoFootprintFound {
                latitude: at.latitude,
                longitude: at.longitude,
                tolerance_m,
            })
    }
}

/// Whether `candidate` should replace `current` as the best match.
fn outranks(
    candidate: &FootprintEntry,
    candidate_m: f64,
    current: &FootprintEntry,
    current_m: f64,
) -> bool {
    if (candidate_m - current_m).abs() > CENTROID_TIE_M {
        return candidate_m < current_m;
    }
    if (candidate.area_m2 - current.area_m2).abs() > f64::EPSILON {
        return candidate.area_m2 > current.area_m2;
    }
    candidate.footprint.id < current.footprint.id
}

fn push_polygons(entries: &mut Vec<FootprintEntry>, id: &str, polygons: &[geo::Polygon<f64>]) {
    for (part, polygon) in polygons.iter().enumerate() {
        let part_id = if polygons.len() > 1 {
            format!("{id}#{part}")
        } else {
            id.to_string()
        };
        if let Some(entry) = FootprintEntry::new(part_id, polygon) {
            entries.push(entry);
        }
    }
}

/// Reads a feature's id from the top-level `id` member or an `id`
/// property.
fn feature_id(feature: &Feature) -> Option<String> {
    let from_member = feature.id.as_ref().map(|id| match id {
        geojson::feature::Id::String(s) => s.clone(),
        geojson::feature::Id::Number(n) => n.to_string(),
    });
    from_member.or_else(|| match feature.property("id")? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Parses a `GeoJSON` string holding a bare geometry.
fn parse_geojson_geometry(text: &str) -> Option<geojson::Geometry> {
    match text.parse::<GeoJson>().ok()? {
        GeoJson::Geometry(geometry) => Some(geometry),
        _ => None,
    }
}

/// Converts a `GeoJSON` geometry into its polygons.
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn geometry_to_polygons(geometry: geojson::Geometry) -> Option<Vec<geo::Polygon<f64>>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::Polygon(p) => Some(vec![p]),
        geo::Geometry::MultiPolygon(mp) => Some(mp.0),
        _ => None,
    }
}

fn ring_envelope(ring: &[Coordinate]) -> AABB<[f64; 2]> {
    let (mut min, mut max) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
    for c in ring {
        min = [min[0].min(c.longitude), min[1].min(c.latitude)];
        max = [max[0].max(c.longitude), max[1].max(c.latitude)];
    }
    AABB::from_corners(min, max)
}

fn vertex_mean(ring: &[Coordinate]) -> Coordinate {
    #[allow(clippy::cast_precision_loss)]
    let n = ring.len() as f64;
    let (lat, lon) = ring
        .iter()
        .fold((0.0, 0.0), |(lat, lon), c| (lat + c.latitude, lon + c.longitude));
    Coordinate::new(lat / n, lon / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::EARTH_RADIUS_M;

    const ORIGIN: Coordinate = Coordinate::new(51.5, -0.12);

    /// A square of side `side` meters whose centre is `east`/`north`
    /// meters from [`ORIGIN`].
    fn square(id: &str, east: f64, north: f64, side: f64) -> Footprint {
        let m_lat = EARTH_RADIUS_M.recip().to_degrees();
        let m_lon = m_lat / ORIGIN.latitude.to_radians().cos();
        let (lat, lon) = (
            north.mul_add(m_lat, ORIGIN.latitude),
            east.mul_add(m_lon, ORIGIN.longitude),
        );
        let (h_lat, h_lon) = (side / 2.0 * m_lat, side / 2.0 * m_lon);
        Footprint {
            id: id.to_string(),
            ring: vec![
                Coordinate::new(lat - h_lat, lon - h_lon),
                Coordinate::new(lat - h_lat, lon + h_lon),
                Coordinate::new(lat + h_lat, lon + h_lon),
                Coordinate::new(lat + h_lat, lon - h_lon),
            ],
        }
    }

    #[test]
    fn finds_containing_footprint() {
        let index = FootprintIndex::from_footprints(vec![
            square("home", 0.0, 0.0, 12.0),
            square("neighbour", 40.0, 0.0, 12.0),
        ]);
        let found = index.locate(&ORIGIN, DEFAULT_TOLERANCE_M).unwrap();
        assert_eq!(found.id, "home");
    }

    #[test]
    fn finds_footprint_within_tolerance() {
        // Edge is 14 m away, centroid 20 m.
        let index = FootprintIndex::from_footprints(vec![square("near", 20.0, 0.0, 12.0)]);
        assert_eq!(index.locate(&ORIGIN, 25.0).unwrap().id, "near");
    }

    #[test]
    fn nothing_within_tolerance_is_an_error() {
        let index = FootprintIndex::from_footprints(vec![square("far", 60.0, 0.0, 12.0)]);
        let err = index.locate(&ORIGIN, 25.0).unwrap_err();
        assert!(matches!(err, SpatialError::NoFootprintFound { .. }));
    }

    #[test]
    fn prefers_nearest_centroid() {
        let index = FootprintIndex::from_footprints(vec![
            square("closer", 10.0, 0.0, 8.0),
            square("further", 0.0, -18.0, 8.0),
        ]);
        assert_eq!(index.locate(&ORIGIN, 25.0).unwrap().id, "closer");
    }

    #[test]
    fn equidistant_candidates_pick_the_larger() {
        let index = FootprintIndex::from_footprints(vec![
            square("small", 15.0, 0.0, 10.0),
            square("large", -15.0, 0.0, 20.0),
        ]);
        assert_eq!(index.locate(&ORIGIN, 25.0).unwrap().id, "large");

        // Insertion order must not matter.
        let index = FootprintIndex::from_footprints(vec![
            square("large", -15.0, 0.0, 20.0),
            square("small", 15.0, 0.0, 10.0),
        ]);
        assert_eq!(index.locate(&ORIGIN, 25.0).unwrap().id, "large");
    }

    #[test]
    fn negative_tolerance_is_invalid() {
        let index = FootprintIndex::from_footprints(vec![square("home", 0.0, 0.0, 12.0)]);
        assert!(matches!(
            index.locate(&ORIGIN, -1.0),
            Err(SpatialError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn loads_feature_collection() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": "osm-1",
                    "properties": {},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-0.1201, 51.4999], [-0.1199, 51.4999],
                                         [-0.1199, 51.5001], [-0.1201, 51.5001],
                                         [-0.1201, 51.4999]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "id": 42 },
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [
                            [[[-0.1100, 51.5], [-0.1099, 51.5], [-0.1099, 51.5001], [-0.1100, 51.5]]],
                            [[[-0.1000, 51.5], [-0.0999, 51.5], [-0.0999, 51.5001], [-0.1000, 51.5]]]
                        ]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "id": "lamp" },
                    "geometry": { "type": "Point", "coordinates": [-0.12, 51.5] }
                }
            ]
        }"#;
        let index = FootprintIndex::from_geojson_str(text).unwrap();
        assert_eq!(index.len(), 3);

        let found = index.locate(&ORIGIN, 5.0).unwrap();
        assert_eq!(found.id, "osm-1");
        assert_eq!(found.ring.len(), 4, "closing vertex should be dropped");

        let second = index
            .locate(&Coordinate::new(51.500_03, -0.099_93), 5.0)
            .unwrap();
        assert_eq!(second.id, "42#1");
    }

    #[test]
    fn loads_duckdb_table() {
        let conn = duckdb::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE footprints (id VARCHAR, geojson VARCHAR);
            INSERT INTO footprints VALUES
                ('way/1', '{"type":"Polygon","coordinates":[[[-0.1201,51.4999],[-0.1199,51.4999],[-0.1199,51.5001],[-0.1201,51.5001],[-0.1201,51.4999]]]}'),
                ('way/2', '{"type":"MultiPolygon","coordinates":[[[[-0.1100,51.5],[-0.1099,51.5],[-0.1099,51.5001],[-0.1100,51.5]]],[[[-0.1000,51.5],[-0.0999,51.5],[-0.0999,51.5001],[-0.1000,51.5]]]]}'),
                ('way/3', '{"type":"Polygon","coordinates":'),
                ('way/4', NULL),
                ('', '{"type":"Polygon","coordinates":[[[-0.2,51.5],[-0.19,51.5],[-0.19,51.51],[-0.2,51.5]]]}');
            "#,
        )
        .unwrap();

        let index = FootprintIndex::load_duckdb(&conn).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.locate(&ORIGIN, 5.0).unwrap().id, "way/1");
        let part = index
            .locate(&Coordinate::new(51.500_03, -0.109_93), 5.0)
            .unwrap();
        assert_eq!(part.id, "way/2#0");
    }

    #[test]
    fn missing_duckdb_table_is_a_load_error() {
        let conn = duckdb::Connection::open_in_memory().unwrap();
        assert!(FootprintIndex::load_duckdb(&conn).is_err());
    }

    #[test]
    fn invalid_geojson_is_a_load_error() {
        assert!(matches!(
            FootprintIndex::from_geojson_str("not json"),
            Err(LoadError::GeoJson(_))
        ));
    }

    #[test]
    fn stats_cover_all_footprints() {
        let index = FootprintIndex::from_footprints(vec![
            square("a", 0.0, 0.0, 10.0),
            square("b", 100.0, 0.0, 20.0),
        ]);
        let stats = index.stats();
        assert_eq!(stats.count, 2);
        assert!((stats.mean_area_m2 - 250.0).abs() < 2.5);
        assert!((stats.max_area_m2 - 400.0).abs() < 4.0);
        let bounds = stats.bounds.unwrap();
        assert!(bounds.west < ORIGIN.longitude && bounds.east > ORIGIN.longitude);
    }

    #[test]
    fn empty_index_finds_nothing() {
        let index = FootprintIndex::from_footprints(Vec::new());
        assert!(index.is_empty());
        assert!(index.stats().bounds.is_none());
        assert!(index.locate(&ORIGIN, 25.0).is_err());
    }
}
