use geo::Coord;

pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_000.0;
const Y_TO_LATITUDE_SCALE: f64 = 360.0 / EARTH_CIRCUMFERENCE_M;

/// Max perpendicular distance, in projected units, for a stop to be anchored to a shape segment.
pub const STOP_ANCHOR_TOLERANCE: f64 = 20.0;

/// Segments shorter than this are skipped when looking for anchors or crossings.
pub const MIN_SEGMENT_LENGTH: f64 = 1.0;

//Downtown Crossing, stop id place-dwnxg
pub const DEFAULT_REFERENCE_LATITUDE: f64 = 42.355518000000004;
pub const DEFAULT_REFERENCE_LONGITUDE: f64 = -71.060225;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Equirectangular projection around a fixed reference point.
///
/// The transit network covers a few tens of kilometres, so distances in the
/// projected plane are treated as metres without correcting for curvature.
#[derive(Debug, Clone, Copy)]
pub struct PlanarProjection {
    reference: LatLng,
    x_to_longitude_scale: f64,
}

impl PlanarProjection {
    pub fn new(reference_latitude: f64, reference_longitude: f64) -> Self {
        Self {
            reference: LatLng::new(reference_latitude, reference_longitude),
            x_to_longitude_scale: Y_TO_LATITUDE_SCALE / reference_latitude.to_radians().cos(),
        }
    }

    pub fn reference(&self) -> LatLng {
        self.reference
    }

    pub fn project(&self, position: LatLng) -> Coord<f64> {
        Coord {
            x: (position.longitude - self.reference.longitude) / self.x_to_longitude_scale,
            y: (position.latitude - self.reference.latitude) / Y_TO_LATITUDE_SCALE,
        }
    }

    pub fn unproject(&self, point: Coord<f64>) -> LatLng {
        LatLng {
            latitude: point.y * Y_TO_LATITUDE_SCALE + self.reference.latitude,
            longitude: point.x * self.x_to_longitude_scale + self.reference.longitude,
        }
    }
}

impl Default for PlanarProjection {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_LATITUDE, DEFAULT_REFERENCE_LONGITUDE)
    }
}

/// Decodes a precision 5 encoded polyline into latitude/longitude vertices.
pub fn decode_polyline(encoded: &str) -> Result<Vec<LatLng>, String> {
    let line = polyline::decode_polyline(encoded, 5).map_err(|e| e.to_string())?;

    Ok(line
        .coords()
        .map(|coord| LatLng::new(coord.y, coord.x))
        .collect())
}

pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

pub fn segment_lengths(points: &[Coord<f64>]) -> Vec<f64> {
    points.windows(2).map(|w| distance(w[0], w[1])).collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Position of the foot point along the segment, clamped to [0, 1].
    pub fraction: f64,
    /// Distance from the projected point to the foot point.
    pub distance: f64,
}

pub fn project_onto_segment(
    point: Coord<f64>,
    start: Coord<f64>,
    end: Coord<f64>,
) -> SegmentProjection {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_squared = dx * dx + dy * dy;

    if length_squared <= f64::EPSILON {
        return SegmentProjection {
            fraction: 0.0,
            distance: distance(point, start),
        };
    }

    let fraction =
        (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_squared).clamp(0.0, 1.0);
    let foot = interpolate(start, end, fraction);

    SegmentProjection {
        fraction,
        distance: distance(point, foot),
    }
}

pub fn interpolate(start: Coord<f64>, end: Coord<f64>, fraction: f64) -> Coord<f64> {
    start + (end - start) * fraction
}

/// Places a marker outline given in metres (x right, y forward) at a position,
/// rotated clockwise by a compass bearing.
pub fn outline_at(position: LatLng, bearing_deg: f64, outline: &[(f64, f64)]) -> Vec<LatLng> {
    let bearing_rad = (90.0 - bearing_deg).to_radians();
    let cos_b = bearing_rad.cos();
    let sin_b = bearing_rad.sin();
    let longitude_scale = Y_TO_LATITUDE_SCALE / position.latitude.to_radians().cos();

    outline
        .iter()
        .map(|&(x, y)| LatLng {
            latitude: position.latitude + (y * sin_b - x * cos_b) * Y_TO_LATITUDE_SCALE,
            longitude: position.longitude + (y * cos_b + x * sin_b) * longitude_scale,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_roundtrip() {
        let projection = PlanarProjection::default();
        let harvard = LatLng::new(42.373362, -71.118956);
        let projected = projection.project(harvard);
        let back = projection.unproject(projected);
        assert!((back.latitude - harvard.latitude).abs() < 1e-9);
        assert!((back.longitude - harvard.longitude).abs() < 1e-9);
    }

    #[test]
    fn test_projection_is_metric_near_reference() {
        let projection = PlanarProjection::default();
        let origin = projection.reference();
        // one thousandth of a degree of latitude is roughly 111 m
        let north = LatLng::new(origin.latitude + 0.001, origin.longitude);
        let p = projection.project(north);
        assert!(p.x.abs() < 1e-9);
        assert!((p.y - 111.3).abs() < 0.5);
    }

    #[test]
    fn test_project_onto_segment() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 100.0, y: 0.0 };

        let mid = project_onto_segment(Coord { x: 25.0, y: 10.0 }, a, b);
        assert!((mid.fraction - 0.25).abs() < 1e-12);
        assert!((mid.distance - 10.0).abs() < 1e-12);

        let before = project_onto_segment(Coord { x: -30.0, y: 40.0 }, a, b);
        assert_eq!(before.fraction, 0.0);
        assert!((before.distance - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_segment_does_not_divide() {
        let a = Coord { x: 5.0, y: 5.0 };
        let projection = project_onto_segment(Coord { x: 8.0, y: 9.0 }, a, a);
        assert_eq!(projection.fraction, 0.0);
        assert!((projection.distance - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_decode_polyline() {
        // example from the polyline algorithm documentation
        let vertices = decode_polyline("_p~iF~ps|U_ulLnnqC_mqNvxq`@").unwrap();
        assert_eq!(vertices.len(), 3);
        assert!((vertices[0].latitude - 38.5).abs() < 1e-9);
        assert!((vertices[0].longitude + 120.2).abs() < 1e-9);
        assert!((vertices[2].latitude - 43.252).abs() < 1e-9);
    }

    #[test]
    fn test_outline_points_north_with_zero_bearing() {
        let position = LatLng::new(42.0, -71.0);
        let outline = outline_at(position, 0.0, &[(0.0, 0.0), (0.0, -100.0)]);
        assert_eq!(outline[0], position);
        // the tail of the marker trails south of the nose
        assert!(outline[1].latitude < position.latitude);
        assert!((outline[1].longitude - position.longitude).abs() < 1e-9);
    }
}
