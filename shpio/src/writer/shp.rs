//! Écriture des fichiers .shp et .shx
//!
//! Un fichier ne porte qu'un seul type de forme : la classe du dataset
//! décide du code (1/8, 3, 5), les variantes Z/M sources sont écrites en
//! 2D. Les anneaux de polygones sont réorientés à la convention ESRI
//! (extérieur horaire, trous anti-horaires) et refermés si besoin.

use geo::{Coord, Geometry, LineString, Polygon};

use crate::parser::shp::{signed_area, FILE_CODE, HEADER_LEN};
use crate::types::{Dataset, GeomClass};
use crate::ShpError;

/// Sérialise les géométries d'un dataset en paire (.shp, .shx)
pub fn write(dataset: &Dataset) -> Result<(Vec<u8>, Vec<u8>), ShpError> {
    let shape_code = file_shape_code(dataset);

    let mut records: Vec<Vec<u8>> = Vec::with_capacity(dataset.features.len());
    let mut bbox = BboxAcc::new();

    for (i, feature) in dataset.features.iter().enumerate() {
        let content = record_content(&feature.geometry, shape_code, i + 1)?;
        accumulate_bbox(&feature.geometry, &mut bbox);
        records.push(content);
    }

    // .shp
    let content_total: usize = records.iter().map(|r| 8 + r.len()).sum();
    let mut shp = file_header(shape_code, (HEADER_LEN + content_total) / 2, &bbox);
    // .shx
    let mut shx = file_header(
        shape_code,
        (HEADER_LEN + records.len() * 8) / 2,
        &bbox,
    );

    let mut offset_words = HEADER_LEN / 2;
    for (i, content) in records.iter().enumerate() {
        let words = content.len() / 2;
        shp.extend_from_slice(&(i as i32 + 1).to_be_bytes());
        shp.extend_from_slice(&(words as i32).to_be_bytes());
        shp.extend_from_slice(content);

        shx.extend_from_slice(&(offset_words as i32).to_be_bytes());
        shx.extend_from_slice(&(words as i32).to_be_bytes());
        offset_words += 4 + words;
    }

    Ok((shp, shx))
}

/// Code de forme du fichier pour la classe du dataset
fn file_shape_code(dataset: &Dataset) -> i32 {
    match dataset.geom_class() {
        GeomClass::Point => {
            // Un seul type par fichier : multipoint dès qu'une feature l'exige
            if dataset
                .features
                .iter()
                .any(|f| matches!(f.geometry, Geometry::MultiPoint(_)))
            {
                8
            } else {
                1
            }
        }
        GeomClass::Line => 3,
        GeomClass::Polygon => 5,
    }
}

/// En-tête de fichier .shp/.shx (100 octets)
fn file_header(shape_code: i32, length_words: usize, bbox: &BboxAcc) -> Vec<u8> {
    let mut h = vec![0u8; HEADER_LEN];
    h[0..4].copy_from_slice(&FILE_CODE.to_be_bytes());
    h[24..28].copy_from_slice(&(length_words as i32).to_be_bytes());
    h[28..32].copy_from_slice(&1000i32.to_le_bytes());
    h[32..36].copy_from_slice(&shape_code.to_le_bytes());
    let (xmin, ymin, xmax, ymax) = bbox.finish();
    h[36..44].copy_from_slice(&xmin.to_le_bytes());
    h[44..52].copy_from_slice(&ymin.to_le_bytes());
    h[52..60].copy_from_slice(&xmax.to_le_bytes());
    h[60..68].copy_from_slice(&ymax.to_le_bytes());
    h
}

/// Contenu d'un enregistrement pour une géométrie
fn record_content(geom: &Geometry, shape_code: i32, record: usize) -> Result<Vec<u8>, ShpError> {
    match (shape_code, geom) {
        (1, Geometry::Point(p)) => {
            let mut c = Vec::with_capacity(20);
            c.extend_from_slice(&1i32.to_le_bytes());
            c.extend_from_slice(&p.x().to_le_bytes());
            c.extend_from_slice(&p.y().to_le_bytes());
            Ok(c)
        }
        (8, Geometry::Point(p)) => Ok(multipoint_content(&[p.0])),
        (8, Geometry::MultiPoint(mp)) => {
            let coords: Vec<Coord> = mp.0.iter().map(|p| p.0).collect();
            Ok(multipoint_content(&coords))
        }
        (3, Geometry::LineString(ls)) => Ok(parts_content(3, &[ls.0.clone()])),
        (3, Geometry::MultiLineString(mls)) => {
            let parts: Vec<Vec<Coord>> = mls.0.iter().map(|ls| ls.0.clone()).collect();
            Ok(parts_content(3, &parts))
        }
        (5, Geometry::Polygon(p)) => Ok(parts_content(5, &polygon_rings(p))),
        (5, Geometry::MultiPolygon(mp)) => {
            let mut rings = Vec::new();
            for p in &mp.0 {
                rings.extend(polygon_rings(p));
            }
            Ok(parts_content(5, &rings))
        }
        _ => Err(ShpError::invalid_geometry(
            record,
            format!(
                "geometry does not fit declared shape type code {}",
                shape_code
            ),
        )),
    }
}

/// Contenu multipoint : bbox, nombre de points, points
fn multipoint_content(coords: &[Coord]) -> Vec<u8> {
    let mut c = Vec::new();
    c.extend_from_slice(&8i32.to_le_bytes());
    push_bbox(&mut c, coords.iter().copied());
    c.extend_from_slice(&(coords.len() as i32).to_le_bytes());
    for coord in coords {
        c.extend_from_slice(&coord.x.to_le_bytes());
        c.extend_from_slice(&coord.y.to_le_bytes());
    }
    c
}

/// Contenu polyline/polygon : bbox, parts, points
fn parts_content(code: i32, parts: &[Vec<Coord>]) -> Vec<u8> {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    let mut c = Vec::new();
    c.extend_from_slice(&code.to_le_bytes());
    push_bbox(&mut c, parts.iter().flat_map(|p| p.iter().copied()));
    c.extend_from_slice(&(parts.len() as i32).to_le_bytes());
    c.extend_from_slice(&(total as i32).to_le_bytes());
    let mut start = 0i32;
    for part in parts {
        c.extend_from_slice(&start.to_le_bytes());
        start += part.len() as i32;
    }
    for part in parts {
        for coord in part {
            c.extend_from_slice(&coord.x.to_le_bytes());
            c.extend_from_slice(&coord.y.to_le_bytes());
        }
    }
    c
}

/// Anneaux d'un polygone, refermés et orientés à la convention ESRI
fn polygon_rings(polygon: &Polygon) -> Vec<Vec<Coord>> {
    let mut rings = Vec::with_capacity(1 + polygon.interiors().len());
    rings.push(oriented_ring(polygon.exterior(), true));
    for hole in polygon.interiors() {
        rings.push(oriented_ring(hole, false));
    }
    rings
}

/// Referme un anneau et l'oriente (extérieur horaire, trou anti-horaire)
fn oriented_ring(ring: &LineString, exterior: bool) -> Vec<Coord> {
    let mut coords = ring.0.clone();
    if coords.first() != coords.last() {
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
    }
    let area = signed_area(ring);
    let clockwise = area < 0.0;
    if clockwise != exterior {
        coords.reverse();
    }
    coords
}

fn push_bbox(c: &mut Vec<u8>, coords: impl Iterator<Item = Coord>) {
    let mut acc = BboxAcc::new();
    for coord in coords {
        acc.push(coord);
    }
    let (xmin, ymin, xmax, ymax) = acc.finish();
    c.extend_from_slice(&xmin.to_le_bytes());
    c.extend_from_slice(&ymin.to_le_bytes());
    c.extend_from_slice(&xmax.to_le_bytes());
    c.extend_from_slice(&ymax.to_le_bytes());
}

fn accumulate_bbox(geom: &Geometry, acc: &mut BboxAcc) {
    match geom {
        Geometry::Point(p) => acc.push(p.0),
        Geometry::MultiPoint(mp) => mp.0.iter().for_each(|p| acc.push(p.0)),
        Geometry::LineString(ls) => ls.0.iter().for_each(|c| acc.push(*c)),
        Geometry::MultiLineString(mls) => {
            mls.0.iter().flat_map(|ls| ls.0.iter()).for_each(|c| acc.push(*c))
        }
        Geometry::Polygon(p) => polygon_coords(p, acc),
        Geometry::MultiPolygon(mp) => mp.0.iter().for_each(|p| polygon_coords(p, acc)),
        _ => {}
    }
}

fn polygon_coords(p: &Polygon, acc: &mut BboxAcc) {
    p.exterior().0.iter().for_each(|c| acc.push(*c));
    for hole in p.interiors() {
        hole.0.iter().for_each(|c| acc.push(*c));
    }
}

/// Accumulateur d'emprise
struct BboxAcc {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    any: bool,
}

impl BboxAcc {
    fn new() -> Self {
        Self {
            xmin: f64::INFINITY,
            ymin: f64::INFINITY,
            xmax: f64::NEG_INFINITY,
            ymax: f64::NEG_INFINITY,
            any: false,
        }
    }

    fn push(&mut self, c: Coord) {
        self.any = true;
        self.xmin = self.xmin.min(c.x);
        self.ymin = self.ymin.min(c.y);
        self.xmax = self.xmax.max(c.x);
        self.ymax = self.ymax.max(c.y);
    }

    fn finish(&self) -> (f64, f64, f64, f64) {
        if self.any {
            (self.xmin, self.ymin, self.xmax, self.ymax)
        } else {
            (0.0, 0.0, 0.0, 0.0)
        }
    }
}
