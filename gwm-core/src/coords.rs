//! Coordinate normalization.
//!
//! Source tables mix two encodings without an explicit tag: projected
//! meters in the legacy ED50 / UTM zone 32N grid, and geographic degrees.
//! The frame is inferred from magnitude: anything beyond 1000 on either
//! axis cannot be degrees and is projected; otherwise a pair inside the
//! geographic bounds is taken as `(lon, lat)` already.
//!
//! Known limitation: a legacy-grid pair below 1000 m on both axes would be
//! read as degrees. Real grid coordinates never fall in that range.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Magnitude above which a value is treated as projected meters.
pub const GEOGRAPHIC_BOUND: f64 = 1000.0;

/// A point in WGS84 geographic degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Reference ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis in meters
    pub a: f64,
    /// Flattening
    pub f: f64,
}

impl Ellipsoid {
    pub const INTERNATIONAL_1924: Ellipsoid = Ellipsoid {
        a: 6_378_388.0,
        f: 1.0 / 297.0,
    };

    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };

    fn e2(&self) -> f64 {
        self.f * (2.0 - self.f)
    }
}

/// Transverse Mercator grid plus the datum shift needed to reach WGS84.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyGrid {
    pub ellipsoid: Ellipsoid,
    /// Central meridian in degrees
    pub central_meridian: f64,
    pub scale_factor: f64,
    pub false_easting: f64,
    pub false_northing: f64,
    /// Geocentric translation to WGS84 in meters (dx, dy, dz)
    pub to_wgs84: (f64, f64, f64),
}

impl LegacyGrid {
    /// ED50 / UTM zone 32N (EPSG:23032).
    pub const ED50_UTM32N: LegacyGrid = LegacyGrid {
        ellipsoid: Ellipsoid::INTERNATIONAL_1924,
        central_meridian: 9.0,
        scale_factor: 0.9996,
        false_easting: 500_000.0,
        false_northing: 0.0,
        to_wgs84: (-87.0, -98.0, -121.0),
    };

    /// Inverse Transverse Mercator (Snyder, USGS PP 1395, eq. 8-18 to 8-25).
    /// Returns `(lat, lon)` in radians on the grid's own datum.
    fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let ep2 = e2 / (1.0 - e2);
        let k0 = self.scale_factor;

        let x = easting - self.false_easting;
        let m = (northing - self.false_northing) / k0;

        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));
        let sqrt_1_e2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let sin_phi1 = phi1.sin();
        let cos_phi1 = phi1.cos();
        let tan_phi1 = phi1.tan();
        let c1 = ep2 * cos_phi1.powi(2);
        let t1 = tan_phi1.powi(2);
        let w = 1.0 - e2 * sin_phi1.powi(2);
        let n1 = a / w.sqrt();
        let r1 = a * (1.0 - e2) / w.powf(1.5);
        let d = x / (n1 * k0);

        let lat = phi1
            - (n1 * tan_phi1 / r1)
                * (d.powi(2) / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2)
                        - 252.0 * ep2
                        - 3.0 * c1.powi(2))
                        * d.powi(6)
                        / 720.0);

        let lon = self.central_meridian.to_radians()
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                    * d.powi(5)
                    / 120.0)
                / cos_phi1;

        (lat, lon)
    }

    /// Abridged Molodensky shift from the grid datum to WGS84.
    fn shift_to_wgs84(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (dx, dy, dz) = self.to_wgs84;
        let source = self.ellipsoid;
        let a = source.a;
        let f = source.f;
        let e2 = source.e2();
        let da = Ellipsoid::WGS84.a - source.a;
        let df = Ellipsoid::WGS84.f - source.f;

        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        let w = 1.0 - e2 * sin_lat.powi(2);
        let rn = a / w.sqrt();
        let rm = a * (1.0 - e2) / w.powf(1.5);

        let d_lat = (-dx * sin_lat * cos_lon - dy * sin_lat * sin_lon
            + dz * cos_lat
            + (a * df + f * da) * (2.0 * lat).sin())
            / rm;
        let d_lon = (-dx * sin_lon + dy * cos_lon) / (rn * cos_lat);

        (lat + d_lat, lon + d_lon)
    }

    /// Project grid meters to WGS84 degrees. `None` when the result is not
    /// a finite point on the globe.
    pub fn to_geographic(&self, easting: f64, northing: f64) -> Option<GeoPoint> {
        if !easting.is_finite() || !northing.is_finite() {
            return None;
        }
        let (lat, lon) = self.inverse(easting, northing);
        if !lat.is_finite() || !lon.is_finite() || lat.abs() > PI / 2.0 {
            return None;
        }
        let (lat, lon) = self.shift_to_wgs84(lat, lon);
        let point = GeoPoint {
            lat: lat.to_degrees(),
            lon: lon.to_degrees(),
        };
        is_geographic(point.lon, point.lat).then_some(point)
    }
}

fn is_geographic(lon: f64, lat: f64) -> bool {
    lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0
}

/// Normalize an `(x, y)` pair using the default legacy grid.
///
/// `x` is easting or longitude, `y` northing or latitude.
pub fn normalize(x: Option<f64>, y: Option<f64>) -> Option<GeoPoint> {
    normalize_with(&LegacyGrid::ED50_UTM32N, x, y)
}

/// Normalize an `(x, y)` pair, projecting through `grid` when the
/// magnitudes say the pair is in meters.
pub fn normalize_with(grid: &LegacyGrid, x: Option<f64>, y: Option<f64>) -> Option<GeoPoint> {
    let (x, y) = (x?, y?);
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    if x.abs() > GEOGRAPHIC_BOUND || y.abs() > GEOGRAPHIC_BOUND {
        return grid.to_geographic(x, y);
    }
    is_geographic(x, y).then_some(GeoPoint { lat: y, lon: x })
}
