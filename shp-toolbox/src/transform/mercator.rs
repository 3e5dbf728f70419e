//! Projection Web Mercator (EPSG:3857)
//!
//! Modèle sphérique sur le rayon équatorial, utilisé par les fonds de
//! carte web (Google Maps, OpenStreetMap).

use super::ellipsoid::WGS84;
use super::{Geographic, TransformError};

/// Latitude limite de la projection (± ~85.05°)
const MAX_LAT_RAD: f64 = 1.4844222297453324; // atan(sinh(pi))

/// Convertit coordonnées géographiques vers Web Mercator
pub fn geographic_to_web_mercator(geo: Geographic) -> Result<(f64, f64), TransformError> {
    let r = WGS84::A;

    // Limiter la latitude pour éviter l'infini aux pôles
    let lat = geo.lat.clamp(-MAX_LAT_RAD, MAX_LAT_RAD);

    let x = r * geo.lon;
    let y = r * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

    Ok((x, y))
}

/// Convertit Web Mercator vers coordonnées géographiques
pub fn web_mercator_to_geographic(x: f64, y: f64) -> Result<Geographic, TransformError> {
    let r = WGS84::A;

    let lon = x / r;
    let lat = 2.0 * (y / r).exp().atan() - std::f64::consts::FRAC_PI_2;

    if !lon.is_finite() || !lat.is_finite() {
        return Err(TransformError::Failed(format!(
            "non-finite web mercator input ({}, {})",
            x, y
        )));
    }

    Ok(Geographic::new(lon, lat))
}
