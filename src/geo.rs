//! Conversion of British National Grid coordinates to WGS84 latitude/longitude and
//! great-circle distances between them.
//!
//! The grid is an inverse Transverse Mercator projection of the OSGB36 datum (Airy 1830
//! ellipsoid). Positions are shifted to WGS84 with the standard seven-parameter Helmert
//! transformation, which is accurate to a few metres across Great Britain.

use serde::{Deserialize, Serialize};

/// Mean earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.009;

// Airy 1830
const AIRY_A: f64 = 6_377_563.396;
const AIRY_B: f64 = 6_356_256.909;
// WGS84 / GRS80
const WGS84_A: f64 = 6_378_137.0;
const WGS84_B: f64 = 6_356_752.314_2;

// National Grid true origin
const F0: f64 = 0.999_601_271_7;
const LAT0_DEG: f64 = 49.0;
const LON0_DEG: f64 = -2.0;
const E0: f64 = 400_000.0;
const N0: f64 = -100_000.0;

// OSGB36 -> WGS84 Helmert parameters (metres, ppm, arc seconds)
const TX: f64 = 446.448;
const TY: f64 = -125.157;
const TZ: f64 = 542.060;
const SCALE_PPM: f64 = -20.4894;
const RX_SEC: f64 = 0.1502;
const RY_SEC: f64 = 0.2470;
const RZ_SEC: f64 = 0.8421;

/// A position on the British National Grid, in metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridRef {
    pub easting: f64,
    pub northing: f64,
}

/// Latitude and longitude in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl GridRef {
    pub fn new(easting: f64, northing: f64) -> GridRef {
        GridRef { easting, northing }
    }

    /// The position on the OSGB36 datum
    pub fn to_osgb36(self) -> LatLon {
        let (a, b) = (AIRY_A, AIRY_B);
        let e2 = 1.0 - (b * b) / (a * a);
        let n = (a - b) / (a + b);
        let lat0 = LAT0_DEG.to_radians();
        let lon0 = LON0_DEG.to_radians();

        // meridional arc from the true origin up to latitude `lat`
        let arc = |lat: f64| {
            let (d, s) = (lat - lat0, lat + lat0);
            b * F0
                * ((1.0 + n + 1.25 * n.powi(2) + 1.25 * n.powi(3)) * d
                    - (3.0 * n + 3.0 * n.powi(2) + 21.0 / 8.0 * n.powi(3)) * d.sin() * s.cos()
                    + (15.0 / 8.0 * n.powi(2) + 15.0 / 8.0 * n.powi(3)) * (2.0 * d).sin() * (2.0 * s).cos()
                    - 35.0 / 24.0 * n.powi(3) * (3.0 * d).sin() * (3.0 * s).cos())
        };

        let mut lat = lat0;
        let mut m = 0.0;
        for _ in 0..100 {
            lat += (self.northing - N0 - m) / (a * F0);
            m = arc(lat);
            if (self.northing - N0 - m).abs() < 1e-5 {
                break;
            }
        }

        let (sin, cos, tan) = (lat.sin(), lat.cos(), lat.tan());
        let nu = a * F0 / (1.0 - e2 * sin * sin).sqrt();
        let rho = a * F0 * (1.0 - e2) / (1.0 - e2 * sin * sin).powf(1.5);
        let eta2 = nu / rho - 1.0;
        let (tan2, tan4, tan6) = (tan.powi(2), tan.powi(4), tan.powi(6));
        let sec = 1.0 / cos;

        let vii = tan / (2.0 * rho * nu);
        let viii = tan / (24.0 * rho * nu.powi(3)) * (5.0 + 3.0 * tan2 + eta2 - 9.0 * tan2 * eta2);
        let ix = tan / (720.0 * rho * nu.powi(5)) * (61.0 + 90.0 * tan2 + 45.0 * tan4);
        let x = sec / nu;
        let xi = sec / (6.0 * nu.powi(3)) * (nu / rho + 2.0 * tan2);
        let xii = sec / (120.0 * nu.powi(5)) * (5.0 + 28.0 * tan2 + 24.0 * tan4);
        let xiia = sec / (5040.0 * nu.powi(7)) * (61.0 + 662.0 * tan2 + 1320.0 * tan4 + 720.0 * tan6);

        let de = self.easting - E0;
        let lat = lat - vii * de.powi(2) + viii * de.powi(4) - ix * de.powi(6);
        let lon = lon0 + x * de - xi * de.powi(3) + xii * de.powi(5) - xiia * de.powi(7);

        LatLon {
            lat: lat.to_degrees(),
            lon: lon.to_degrees(),
        }
    }

    /// The position on the WGS84 datum
    pub fn to_wgs84(self) -> LatLon {
        helmert_osgb36_to_wgs84(self.to_osgb36())
    }
}

fn helmert_osgb36_to_wgs84(p: LatLon) -> LatLon {
    let (lat, lon) = (p.lat.to_radians(), p.lon.to_radians());

    // geodetic -> cartesian on Airy 1830, at zero height
    let e2 = 1.0 - (AIRY_B * AIRY_B) / (AIRY_A * AIRY_A);
    let nu = AIRY_A / (1.0 - e2 * lat.sin().powi(2)).sqrt();
    let x1 = nu * lat.cos() * lon.cos();
    let y1 = nu * lat.cos() * lon.sin();
    let z1 = (1.0 - e2) * nu * lat.sin();

    let s = SCALE_PPM * 1e-6;
    let rad = |sec: f64| (sec / 3600.0).to_radians();
    let (rx, ry, rz) = (rad(RX_SEC), rad(RY_SEC), rad(RZ_SEC));
    let x2 = TX + (1.0 + s) * x1 - rz * y1 + ry * z1;
    let y2 = TY + rz * x1 + (1.0 + s) * y1 - rx * z1;
    let z2 = TZ - ry * x1 + rx * y1 + (1.0 + s) * z1;

    // cartesian -> geodetic on WGS84
    let e2 = 1.0 - (WGS84_B * WGS84_B) / (WGS84_A * WGS84_A);
    let p = (x2 * x2 + y2 * y2).sqrt();
    let mut lat = z2.atan2(p * (1.0 - e2));
    for _ in 0..100 {
        let nu = WGS84_A / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        let next = (z2 + e2 * nu * lat.sin()).atan2(p);
        let done = (next - lat).abs() < 1e-12;
        lat = next;
        if done {
            break;
        }
    }

    LatLon {
        lat: lat.to_degrees(),
        lon: y2.atan2(x2).to_degrees(),
    }
}

/// Haversine distance in kilometres
pub fn great_circle(a: LatLon, b: LatLon) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// The arithmetic mean of a set of positions, or `None` if there are none
pub fn centroid<I: IntoIterator<Item = LatLon>>(points: I) -> Option<LatLon> {
    let (mut lat, mut lon, mut n) = (0.0, 0.0, 0usize);
    for p in points {
        lat += p.lat;
        lon += p.lon;
        n += 1;
    }
    match n {
        0 => None,
        _ => Some(LatLon {
            lat: lat / n as f64,
            lon: lon / n as f64,
        }),
    }
}
