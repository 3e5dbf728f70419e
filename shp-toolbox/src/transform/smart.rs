//! Sélection du backend de transformation
//!
//! Backend Rust pur en priorité quand la paire est couverte, PROJ en
//! repli si le feature `reproject` est compilé.

use geo::Geometry;

use super::{LiteTransform, TransformError};

/// Transformation avec sélection automatique du backend
pub enum SmartTransform {
    /// Pas de reprojection (source == cible)
    Identity,
    /// Backend Rust pur
    Lite(LiteTransform),
    /// Backend PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj(super::proj::ProjTransform),
}

impl SmartTransform {
    /// Crée une transformation entre deux EPSG
    ///
    /// La construction vaut validation : elle échoue avant toute lecture
    /// de géométrie si la paire n'est pas transformable.
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, TransformError> {
        if source_epsg == target_epsg {
            return Ok(Self::Identity);
        }

        if LiteTransform::supports(source_epsg, target_epsg) {
            return Ok(Self::Lite(LiteTransform::new(source_epsg, target_epsg)?));
        }

        #[cfg(feature = "reproject")]
        {
            let proj = super::proj::ProjTransform::new(source_epsg, target_epsg)?;
            return Ok(Self::Proj(proj));
        }

        #[cfg(not(feature = "reproject"))]
        Err(TransformError::Unsupported {
            source_epsg,
            target: target_epsg,
        })
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, TransformError> {
        match self {
            Self::Identity => Ok(geom.clone()),
            Self::Lite(lite) => lite.transform_geometry(geom),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_geometry(geom),
        }
    }

    /// Description du backend retenu
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "identity (no reprojection)",
            Self::Lite(_) => "built-in (pure Rust)",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj (PROJ library)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn test_identity() {
        let t = SmartTransform::new(4326, 4326).unwrap();
        assert!(matches!(t, SmartTransform::Identity));
    }

    #[test]
    fn test_lite_preferred_for_web_pairs() {
        let t = SmartTransform::new(4326, 3857).unwrap();
        assert!(matches!(t, SmartTransform::Lite(_)));
    }

    #[test]
    fn test_identity_preserves_coordinates_exactly() {
        let t = SmartTransform::new(3857, 3857).unwrap();
        let p = Geometry::Point(Point::new(261600.123456, 6250000.654321));
        match t.transform_geometry(&p).unwrap() {
            Geometry::Point(q) => {
                assert_eq!(q.x(), 261600.123456);
                assert_eq!(q.y(), 6250000.654321);
            }
            other => panic!("Expected point, got {:?}", other),
        }
    }

    #[cfg(feature = "reproject")]
    #[test]
    fn test_proj_fallback_for_uncovered_pair() {
        let t = SmartTransform::new(2154, 4326).unwrap();
        assert!(matches!(t, SmartTransform::Proj(_)));
    }
}
