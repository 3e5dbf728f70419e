//! Projection UTM (Universal Transverse Mercator), zones WGS84
//!
//! Séries classiques de Snyder, précises au millimètre à l'intérieur
//! d'une zone. La zone et l'hémisphère viennent du code EPSG
//! (326xx nord, 327xx sud).

use super::ellipsoid::WGS84;
use super::{Geographic, TransformError};

/// Facteur d'échelle au méridien central
const K0: f64 = 0.9996;

/// False easting
const X0: f64 = 500_000.0;

/// False northing des zones sud
const Y0_SOUTH: f64 = 10_000_000.0;

/// Longitude centrale d'une zone (radians)
fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Convertit UTM vers coordonnées géographiques WGS84
pub fn utm_to_geographic(
    x: f64,
    y: f64,
    zone: u32,
    south: bool,
) -> Result<Geographic, TransformError> {
    let a = WGS84::A;
    let e2 = WGS84::E2;
    let ep2 = WGS84::EP2;

    let lon0 = central_meridian(zone);

    let x = x - X0;
    let y = if south { y - Y0_SOUTH } else { y };

    // Latitude au pied du méridien
    let m = y / K0;
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let n1 = a / (1.0 - e2 * sin_phi1.powi(2)).sqrt();
    let t1 = tan_phi1.powi(2);
    let c1 = ep2 * cos_phi1.powi(2);
    let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1.powi(2)).powf(1.5);
    let d = x / (n1 * K0);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2)
                    - 252.0 * ep2
                    - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lon = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    if !lat.is_finite() || !lon.is_finite() {
        return Err(TransformError::Failed(format!(
            "non-finite UTM input ({}, {}) zone {}",
            x + X0,
            y,
            zone
        )));
    }

    Ok(Geographic::new(lon, lat))
}

/// Convertit coordonnées géographiques WGS84 vers UTM
pub fn geographic_to_utm(
    geo: Geographic,
    zone: u32,
    south: bool,
) -> Result<(f64, f64), TransformError> {
    let a = WGS84::A;
    let e2 = WGS84::E2;
    let ep2 = WGS84::EP2;

    let lat = geo.lat;
    let lon0 = central_meridian(zone);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = a / (1.0 - e2 * sin_lat.powi(2)).sqrt();
    let t = tan_lat.powi(2);
    let c = ep2 * cos_lat.powi(2);
    let big_a = (geo.lon - lon0) * cos_lat;

    // Arc méridien depuis l'équateur
    let m = a
        * ((1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0) * lat
            - (3.0 * e2 / 8.0 + 3.0 * e2.powi(2) / 32.0 + 45.0 * e2.powi(3) / 1024.0)
                * (2.0 * lat).sin()
            + (15.0 * e2.powi(2) / 256.0 + 45.0 * e2.powi(3) / 1024.0) * (4.0 * lat).sin()
            - (35.0 * e2.powi(3) / 3072.0) * (6.0 * lat).sin());

    let x = K0
        * n
        * (big_a
            + (1.0 - t + c) * big_a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t.powi(2) + 72.0 * c - 58.0 * ep2) * big_a.powi(5) / 120.0)
        + X0;

    let y = K0
        * (m + n
            * tan_lat
            * (big_a.powi(2) / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c.powi(2)) * big_a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t.powi(2) + 600.0 * c - 330.0 * ep2) * big_a.powi(6)
                    / 720.0));

    let y = if south { y + Y0_SOUTH } else { y };

    if !x.is_finite() || !y.is_finite() {
        return Err(TransformError::Failed(format!(
            "non-finite geographic input for UTM zone {}",
            zone
        )));
    }

    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_martinique_inverse() {
        // Fort-de-France, UTM zone 20N: 708000, 1615000
        let geo = utm_to_geographic(708000.0, 1615000.0, 20, false).unwrap();
        let (lon, lat) = geo.to_degrees();

        // Fort-de-France: -61.07°E, 14.60°N
        assert!((lon - (-61.07)).abs() < 0.2, "lon={}", lon);
        assert!((lat - 14.60).abs() < 0.2, "lat={}", lat);
    }

    #[test]
    fn test_martinique_forward() {
        let geo = Geographic::from_degrees(-61.07, 14.60);
        let (x, y) = geographic_to_utm(geo, 20, false).unwrap();

        assert!((x - 708000.0).abs() < 2000.0, "x={}", x);
        assert!((y - 1615000.0).abs() < 2000.0, "y={}", y);
    }

    #[test]
    fn test_southern_hemisphere_roundtrip() {
        // Saint-Denis de la Réunion, zone 40S
        let geo = Geographic::from_degrees(55.45, -20.88);
        let (x, y) = geographic_to_utm(geo, 40, true).unwrap();
        assert!(y > 7_000_000.0, "southern false northing expected, y={}", y);

        let back = utm_to_geographic(x, y, 40, true).unwrap();
        let (lon, lat) = back.to_degrees();
        assert!((lon - 55.45).abs() < 1e-6, "lon={}", lon);
        assert!((lat - (-20.88)).abs() < 1e-6, "lat={}", lat);
    }

    #[test]
    fn test_northern_roundtrip() {
        // Bangalore, zone 43N
        let geo = Geographic::from_degrees(77.59, 12.97);
        let (x, y) = geographic_to_utm(geo, 43, false).unwrap();
        let back = utm_to_geographic(x, y, 43, false).unwrap();
        let (lon, lat) = back.to_degrees();
        assert!((lon - 77.59).abs() < 1e-6, "lon={}", lon);
        assert!((lat - 12.97).abs() < 1e-6, "lat={}", lat);
    }
}
