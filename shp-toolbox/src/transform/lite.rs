//! Backend de transformation Rust pur
//!
//! Couvre les paires courantes du web mapping, via un pivot géographique :
//! - WGS84 (EPSG:4326)
//! - Web Mercator (EPSG:3857)
//! - Zones UTM WGS84 (EPSG:32601-32660 et 32701-32760)

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

use super::{mercator, utm, Geographic, TransformError};

/// Système reconnu par le backend pur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrsKind {
    /// EPSG:4326, degrés
    Geographic,
    /// EPSG:3857
    WebMercator,
    /// Zone UTM WGS84
    Utm { zone: u32, south: bool },
}

fn kind_for(epsg: u32) -> Option<CrsKind> {
    match epsg {
        4326 => Some(CrsKind::Geographic),
        3857 => Some(CrsKind::WebMercator),
        _ => shpio::crs::utm_zone_for_epsg(epsg).map(|(zone, south)| CrsKind::Utm { zone, south }),
    }
}

/// Transformation entre deux systèmes du champ couvert
pub struct LiteTransform {
    source: CrsKind,
    target: CrsKind,
    source_epsg: u32,
    target_epsg: u32,
}

impl LiteTransform {
    /// Crée une transformation, ou `Unsupported` hors du champ couvert
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, TransformError> {
        let unsupported = || TransformError::Unsupported {
            source_epsg,
            target: target_epsg,
        };
        let source = kind_for(source_epsg).ok_or_else(unsupported)?;
        let target = kind_for(target_epsg).ok_or_else(unsupported)?;

        Ok(Self {
            source,
            target,
            source_epsg,
            target_epsg,
        })
    }

    /// La paire est-elle couverte par ce backend
    pub fn supports(source_epsg: u32, target_epsg: u32) -> bool {
        kind_for(source_epsg).is_some() && kind_for(target_epsg).is_some()
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme un point (x, y) de la source vers la cible
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64), TransformError> {
        let geo = match self.source {
            CrsKind::Geographic => Geographic::from_degrees(x, y),
            CrsKind::WebMercator => mercator::web_mercator_to_geographic(x, y)?,
            CrsKind::Utm { zone, south } => utm::utm_to_geographic(x, y, zone, south)?,
        };

        match self.target {
            CrsKind::Geographic => Ok(geo.to_degrees()),
            CrsKind::WebMercator => mercator::geographic_to_web_mercator(geo),
            CrsKind::Utm { zone, south } => utm::geographic_to_utm(geo, zone, south),
        }
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry) -> Result<Geometry, TransformError> {
        match geom {
            Geometry::Point(p) => {
                let (x, y) = self.transform_point(p.x(), p.y())?;
                Ok(Geometry::Point(Point::new(x, y)))
            }
            Geometry::LineString(ls) => Ok(Geometry::LineString(self.transform_linestring(ls)?)),
            Geometry::Polygon(poly) => Ok(Geometry::Polygon(self.transform_polygon(poly)?)),
            Geometry::MultiPoint(mp) => {
                let points: Result<Vec<Point>, TransformError> = mp
                    .iter()
                    .map(|p| {
                        let (x, y) = self.transform_point(p.x(), p.y())?;
                        Ok(Point::new(x, y))
                    })
                    .collect();
                Ok(Geometry::MultiPoint(MultiPoint::new(points?)))
            }
            Geometry::MultiLineString(mls) => {
                let lines: Result<Vec<LineString>, TransformError> = mls
                    .iter()
                    .map(|ls| self.transform_linestring(ls))
                    .collect();
                Ok(Geometry::MultiLineString(MultiLineString::new(lines?)))
            }
            Geometry::MultiPolygon(mp) => {
                let polys: Result<Vec<Polygon>, TransformError> =
                    mp.iter().map(|p| self.transform_polygon(p)).collect();
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
            }
            _ => Err(TransformError::Failed(
                "unsupported geometry type".to_string(),
            )),
        }
    }

    fn transform_linestring(&self, ls: &LineString) -> Result<LineString, TransformError> {
        let coords: Result<Vec<Coord>, TransformError> = ls
            .coords()
            .map(|c| {
                let (x, y) = self.transform_point(c.x, c.y)?;
                Ok(Coord { x, y })
            })
            .collect();
        Ok(LineString::new(coords?))
    }

    fn transform_polygon(&self, poly: &Polygon) -> Result<Polygon, TransformError> {
        let exterior = self.transform_linestring(poly.exterior())?;
        let interiors: Result<Vec<LineString>, TransformError> = poly
            .interiors()
            .iter()
            .map(|ring| self.transform_linestring(ring))
            .collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}
