//! Transformation de coordonnées entre systèmes EPSG
//!
//! Deux backends : PROJ (feature `reproject`, activée par défaut) pour
//! n'importe quelle paire de codes reconnus, et un backend Rust pur
//! couvrant les cas web courants (WGS84, Web Mercator, zones UTM WGS84).
//! La validation du CRS cible se fait à la construction du transformateur,
//! avant de toucher la moindre géométrie.

pub mod ellipsoid;
pub mod lite;
pub mod mercator;
#[cfg(feature = "reproject")]
pub mod proj;
pub mod smart;
pub mod utm;

pub use lite::LiteTransform;
pub use smart::SmartTransform;

use thiserror::Error;

/// Erreurs de transformation de coordonnées
#[derive(Debug, Error)]
pub enum TransformError {
    /// Le backend a refusé la paire de CRS (code inconnu ou non transformable)
    #[error("transformation EPSG:{source_epsg} → EPSG:{target} rejected: {reason}")]
    Rejected {
        source_epsg: u32,
        target: u32,
        reason: String,
    },

    /// Paire hors du champ du backend Rust pur
    #[error(
        "transformation EPSG:{source_epsg} → EPSG:{target} is not supported by the built-in \
         backend (WGS84, Web Mercator and WGS84 UTM zones only); build with the \
         'reproject' feature for full PROJ support"
    )]
    Unsupported { source_epsg: u32, target: u32 },

    /// Échec de conversion d'une coordonnée
    #[error("coordinate transformation failed: {0}")]
    Failed(String),
}

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}
