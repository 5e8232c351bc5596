//! Geographic to planar reprojection
//!
//! Fixed pair: WGS 84 (EPSG:4326) longitude/latitude in degrees to
//! WGS 84 / Pseudo-Mercator (EPSG:3857) easting/northing in metres.

use crate::domain::error::CoordError;
use crate::domain::types::{Event, ReprojectedPoint};
use std::f64::consts::PI;

/// Semi-major axis used by EPSG:3857 (metres)
pub const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Latitude where the Mercator square ends
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Pre-initialized transform context. Build once per run and pass it in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reprojector {
    radius: f64,
    max_lat: f64,
    deg_to_rad: f64,
}

impl Default for Reprojector {
    fn default() -> Self {
        Self::web_mercator()
    }
}

impl Reprojector {
    pub fn web_mercator() -> Self {
        Self { radius: WEB_MERCATOR_RADIUS, max_lat: MAX_MERCATOR_LAT, deg_to_rad: PI / 180.0 }
    }

    /// Transform (lon, lat) in degrees to (easting, northing) in metres
    #[inline]
    pub fn reproject(&self, lon: f64, lat: f64) -> Result<(f64, f64), CoordError> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(CoordError::InvalidCoordinate { lon, lat });
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordError::Projection {
                lon,
                lat,
                reason: "longitude outside [-180, 180]",
            });
        }
        if !(-self.max_lat..=self.max_lat).contains(&lat) {
            return Err(CoordError::Projection {
                lon,
                lat,
                reason: "latitude outside the Mercator domain",
            });
        }

        let easting = self.radius * lon * self.deg_to_rad;
        let northing = self.radius * (PI / 4.0 + lat * self.deg_to_rad / 2.0).tan().ln();
        Ok((easting, northing))
    }

    /// Reproject one event
    pub fn reproject_event(&self, event: &Event) -> Result<ReprojectedPoint, CoordError> {
        let (easting, northing) = self.reproject(event.longitude, event.latitude)?;
        Ok(ReprojectedPoint { event_id: event.event_id.clone(), easting, northing })
    }

    /// Reproject every event, stopping at the first projection error
    pub fn reproject_all(&self, events: &[Event]) -> Result<Vec<ReprojectedPoint>, CoordError> {
        events.iter().map(|event| self.reproject_event(event)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_origin_maps_to_origin() {
        let (x, y) = Reprojector::web_mercator().reproject(0.0, 0.0).unwrap();
        assert!(x.abs() < 1e-9);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_known_point() {
        // Naples, EPSG:3857 reference values
        let (x, y) = Reprojector::web_mercator().reproject(14.2681, 40.8518).unwrap();
        assert!((x - 1_588_303.0).abs() < 5.0, "easting {x}");
        assert!((y - 4_991_064.0).abs() < 5.0, "northing {y}");
    }

    #[test]
    fn test_antimeridian_and_domain_edge() {
        let projector = Reprojector::web_mercator();
        let (x, _) = projector.reproject(180.0, 0.0).unwrap();
        assert!((x - PI * WEB_MERCATOR_RADIUS).abs() < 1e-6);

        let (_, y) = projector.reproject(0.0, MAX_MERCATOR_LAT).unwrap();
        assert!((y - PI * WEB_MERCATOR_RADIUS).abs() < 1.0);
    }

    #[test]
    fn test_reprojection_is_bit_identical() {
        let projector = Reprojector::web_mercator();
        let a = projector.reproject(-3.70379, 40.41678).unwrap();
        let b = projector.reproject(-3.70379, 40.41678).unwrap();
        assert_eq!(a.0.to_bits(), b.0.to_bits());
        assert_eq!(a.1.to_bits(), b.1.to_bits());

        let copy = projector;
        let c = copy.reproject(-3.70379, 40.41678).unwrap();
        assert_eq!(a.0.to_bits(), c.0.to_bits());
        assert_eq!(a.1.to_bits(), c.1.to_bits());
    }

    #[test]
    fn test_non_finite_is_invalid_coordinate() {
        let projector = Reprojector::web_mercator();
        assert!(matches!(
            projector.reproject(f64::NAN, 10.0),
            Err(CoordError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            projector.reproject(10.0, f64::INFINITY),
            Err(CoordError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_out_of_domain_is_projection_error() {
        let projector = Reprojector::web_mercator();
        assert!(matches!(projector.reproject(0.0, 89.0), Err(CoordError::Projection { .. })));
        assert!(matches!(projector.reproject(181.0, 0.0), Err(CoordError::Projection { .. })));
    }

    #[test]
    fn test_reproject_all_keeps_event_ids_in_order() {
        let now = Utc::now();
        let events = vec![
            Event::new("a", "bat-1", now, 14.0, 40.0),
            Event::new("b", "bat-1", now, 14.1, 40.1),
        ];
        let points = Reprojector::web_mercator().reproject_all(&events).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].event_id.0, "a");
        assert_eq!(points[1].event_id.0, "b");
        assert!(points[1].easting > points[0].easting);
    }

    #[test]
    fn test_reproject_all_propagates_projection_error() {
        let now = Utc::now();
        let events = vec![
            Event::new("a", "bat-1", now, 14.0, 40.0),
            Event::new("b", "bat-1", now, 14.0, 88.0),
        ];
        let err = Reprojector::web_mercator().reproject_all(&events).unwrap_err();
        assert!(matches!(err, CoordError::Projection { .. }));
    }
}
