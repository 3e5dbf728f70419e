//! Backend de transformation PROJ
//!
//! Disponible uniquement avec le feature `reproject` (activé par défaut).
//! La construction valide la paire de codes auprès de PROJ : un code
//! inconnu est rejeté avant toute lecture de géométrie.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use proj::Proj;

use super::TransformError;

/// Transformation PROJ entre deux codes EPSG
pub struct ProjTransform {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl ProjTransform {
    /// Crée une transformation entre deux EPSG
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, TransformError> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj =
            Proj::new_known_crs(&source, &target, None).map_err(|e| TransformError::Rejected {
                source_epsg,
                target: target_epsg,
                reason: e.to_string(),
            })?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, TransformError> {
        if self.source_epsg == self.target_epsg {
            return Ok(geom.clone());
        }

        match geom {
            Geometry::Point(p) => {
                let (x, y) = self.transform_coord(p.0)?;
                Ok(Geometry::Point(Point::new(x, y)))
            }
            Geometry::LineString(ls) => {
                Ok(Geometry::LineString(self.transform_linestring(ls)?))
            }
            Geometry::Polygon(p) => Ok(Geometry::Polygon(self.transform_polygon(p)?)),
            Geometry::MultiPoint(mp) => {
                let points: Result<Vec<Point>, TransformError> =
                    mp.0.iter()
                        .map(|p| {
                            let (x, y) = self.transform_coord(p.0)?;
                            Ok(Point::new(x, y))
                        })
                        .collect();
                Ok(Geometry::MultiPoint(MultiPoint::new(points?)))
            }
            Geometry::MultiLineString(mls) => {
                let lines: Result<Vec<LineString>, TransformError> = mls
                    .0
                    .iter()
                    .map(|ls| self.transform_linestring(ls))
                    .collect();
                Ok(Geometry::MultiLineString(MultiLineString::new(lines?)))
            }
            Geometry::MultiPolygon(mp) => {
                let polys: Result<Vec<Polygon>, TransformError> =
                    mp.0.iter().map(|p| self.transform_polygon(p)).collect();
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
            }
            _ => Err(TransformError::Failed(
                "unsupported geometry type".to_string(),
            )),
        }
    }

    /// Transforme une coordonnée unique
    fn transform_coord(&self, coord: Coord) -> Result<(f64, f64), TransformError> {
        self.proj
            .convert((coord.x, coord.y))
            .map_err(|e| TransformError::Failed(e.to_string()))
    }

    /// Transforme une LineString (conversion batch, bien plus rapide
    /// que point par point)
    fn transform_linestring(&self, ls: &LineString) -> Result<LineString, TransformError> {
        let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();

        self.proj
            .convert_array(&mut coords)
            .map_err(|e| TransformError::Failed(e.to_string()))?;

        let result: Vec<Coord> = coords.into_iter().map(|(x, y)| Coord { x, y }).collect();
        Ok(LineString::new(result))
    }

    fn transform_polygon(&self, p: &Polygon) -> Result<Polygon, TransformError> {
        let exterior = self.transform_linestring(p.exterior())?;
        let interiors: Result<Vec<LineString>, TransformError> = p
            .interiors()
            .iter()
            .map(|ls| self.transform_linestring(ls))
            .collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lambert93_to_wgs84() {
        // Paris en Lambert-93: X=652381, Y=6862047
        let t = ProjTransform::new(2154, 4326).unwrap();

        let paris = Geometry::Point(Point::new(652381.0, 6862047.0));
        match t.transform_geometry(&paris).unwrap() {
            Geometry::Point(p) => {
                assert!(p.x() > 2.0 && p.x() < 3.0, "lon={}", p.x());
                assert!(p.y() > 48.0 && p.y() < 49.0, "lat={}", p.y());
            }
            other => panic!("Expected point, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_epsg_rejected_at_construction() {
        assert!(matches!(
            ProjTransform::new(99999, 4326),
            Err(TransformError::Rejected { .. })
        ));
    }

    #[test]
    fn test_polygon_transform() {
        let t = ProjTransform::new(2154, 4326).unwrap();

        let poly = Geometry::Polygon(Polygon::new(
            LineString::from(vec![
                (652381.0, 6862047.0),
                (652481.0, 6862047.0),
                (652481.0, 6862147.0),
                (652381.0, 6862147.0),
                (652381.0, 6862047.0),
            ]),
            vec![],
        ));

        match t.transform_geometry(&poly).unwrap() {
            Geometry::Polygon(p) => {
                assert_eq!(p.exterior().0.len(), 5);
                let first = &p.exterior().0[0];
                assert!(first.x > 2.0 && first.x < 3.0);
                assert!(first.y > 48.0 && first.y < 49.0);
            }
            other => panic!("Expected polygon, got {:?}", other),
        }
    }
}
