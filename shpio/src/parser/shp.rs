//! Parser pour les fichiers .shp (géométries)
//!
//! Le format alterne des en-têtes d'enregistrement big-endian et des
//! contenus little-endian. Les anneaux de polygones sont classés par
//! aire signée (extérieurs horaires, trous anti-horaires) puis les trous
//! sont rattachés à l'extérieur qui les contient.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};

use crate::types::ShapeType;
use crate::ShpError;

/// Code magique en tête de fichier .shp/.shx
pub const FILE_CODE: i32 = 9994;

/// Taille de l'en-tête de fichier
pub const HEADER_LEN: usize = 100;

/// Résultat du parsing d'un fichier .shp
#[derive(Debug)]
pub struct ShpFile {
    /// Type de forme déclaré par l'en-tête
    pub shape_type: ShapeType,

    /// Emprise déclarée (xmin, ymin, xmax, ymax)
    pub bbox: [f64; 4],

    /// Géométries dans l'ordre des enregistrements
    /// (`None` pour les shapes null ou les enregistrements invalides)
    pub geometries: Vec<Option<Geometry>>,
}

/// Parse un fichier .shp complet
///
/// Les enregistrements illisibles sont remplacés par `None` et signalés
/// dans la liste d'erreurs non fatales ; seul un en-tête invalide est fatal.
pub fn parse(data: &[u8]) -> Result<(ShpFile, Vec<ShpError>), ShpError> {
    if data.len() < HEADER_LEN {
        return Err(ShpError::parse_error(".shp", "file shorter than header"));
    }

    let file_code = read_i32_be(data, 0)?;
    if file_code != FILE_CODE {
        return Err(ShpError::parse_error(
            ".shp",
            format!("bad file code {} (expected {})", file_code, FILE_CODE),
        ));
    }

    let shape_type = ShapeType::from_code(read_i32_le(data, 32)?)?;
    let bbox = [
        read_f64_le(data, 36)?,
        read_f64_le(data, 44)?,
        read_f64_le(data, 52)?,
        read_f64_le(data, 60)?,
    ];

    let mut geometries = Vec::new();
    let mut errors = Vec::new();
    let mut pos = HEADER_LEN;

    while pos + 8 <= data.len() {
        let record = read_i32_be(data, pos)? as usize;
        let content_words = read_i32_be(data, pos + 4)?;
        if content_words < 0 {
            errors.push(ShpError::parse_error(
                ".shp",
                format!("record {}: negative content length", record),
            ));
            break;
        }
        let content_len = content_words as usize * 2;
        let start = pos + 8;
        let end = start + content_len;
        if end > data.len() {
            errors.push(ShpError::parse_error(
                ".shp",
                format!("record {}: truncated content", record),
            ));
            break;
        }

        match parse_record(&data[start..end], record) {
            Ok(geom) => geometries.push(geom),
            Err(e) => {
                errors.push(e);
                geometries.push(None);
            }
        }

        pos = end;
    }

    Ok((
        ShpFile {
            shape_type,
            bbox,
            geometries,
        },
        errors,
    ))
}

/// Nombre d'enregistrements annoncé par un fichier .shx
pub fn shx_record_count(shx: &[u8]) -> Option<usize> {
    if shx.len() < HEADER_LEN {
        return None;
    }
    Some((shx.len() - HEADER_LEN) / 8)
}

/// Parse le contenu d'un enregistrement (`None` = shape null)
fn parse_record(content: &[u8], record: usize) -> Result<Option<Geometry>, ShpError> {
    let code = read_i32_le(content, 0)
        .map_err(|_| ShpError::invalid_geometry(record, "empty record content"))?;

    if code == 0 {
        return Ok(None);
    }

    let shape_type = ShapeType::from_code(code)?;

    let geom = match shape_type {
        ShapeType::Point | ShapeType::PointZ | ShapeType::PointM => {
            let x = read_f64_le(content, 4)?;
            let y = read_f64_le(content, 12)?;
            Geometry::Point(Point::new(x, y))
        }
        ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM => {
            // bbox (32 octets) puis numPoints puis les points
            let n = read_i32_le(content, 36)? as usize;
            let mut points = Vec::with_capacity(n);
            for i in 0..n {
                let off = 40 + i * 16;
                points.push(Point::new(
                    read_f64_le(content, off)?,
                    read_f64_le(content, off + 8)?,
                ));
            }
            Geometry::MultiPoint(MultiPoint::new(points))
        }
        ShapeType::PolyLine | ShapeType::PolyLineZ | ShapeType::PolyLineM => {
            let parts = read_parts(content, record)?;
            let mut lines: Vec<LineString> =
                parts.into_iter().map(LineString::new).collect();
            if lines.len() == 1 {
                Geometry::LineString(lines.remove(0))
            } else {
                Geometry::MultiLineString(MultiLineString::new(lines))
            }
        }
        ShapeType::Polygon | ShapeType::PolygonZ | ShapeType::PolygonM => {
            let rings = read_parts(content, record)?;
            build_polygon(rings, record)?
        }
        ShapeType::NullShape => return Ok(None),
    };

    Ok(Some(geom))
}

/// Lit la structure commune polyline/polygon : parts puis points
fn read_parts(content: &[u8], record: usize) -> Result<Vec<Vec<Coord>>, ShpError> {
    // bbox (32 octets) à partir de l'offset 4
    let num_parts = read_i32_le(content, 36)? as usize;
    let num_points = read_i32_le(content, 40)? as usize;

    let parts_off = 44;
    let points_off = parts_off + num_parts * 4;

    let mut starts = Vec::with_capacity(num_parts);
    for i in 0..num_parts {
        let s = read_i32_le(content, parts_off + i * 4)? as usize;
        if s > num_points {
            return Err(ShpError::invalid_geometry(
                record,
                format!("part start {} beyond point count {}", s, num_points),
            ));
        }
        starts.push(s);
    }

    let mut parts = Vec::with_capacity(num_parts);
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(num_points);
        if end < start {
            return Err(ShpError::invalid_geometry(record, "unordered part offsets"));
        }
        let mut coords = Vec::with_capacity(end - start);
        for p in start..end {
            let off = points_off + p * 16;
            coords.push(Coord {
                x: read_f64_le(content, off)?,
                y: read_f64_le(content, off + 8)?,
            });
        }
        parts.push(coords);
    }

    Ok(parts)
}

/// Assemble les anneaux d'un enregistrement polygon en Polygon/MultiPolygon
fn build_polygon(rings: Vec<Vec<Coord>>, record: usize) -> Result<Geometry, ShpError> {
    let mut outers: Vec<LineString> = Vec::new();
    let mut holes: Vec<LineString> = Vec::new();

    for ring in rings {
        if ring.len() < 4 {
            // Anneau dégénéré (un ring fermé a au moins 4 points)
            continue;
        }
        let ls = LineString::new(ring);
        // Convention shapefile : extérieur horaire = aire signée négative
        if signed_area(&ls) < 0.0 {
            outers.push(ls);
        } else {
            holes.push(ls);
        }
    }

    if outers.is_empty() {
        if holes.is_empty() {
            return Err(ShpError::invalid_geometry(record, "no usable ring"));
        }
        // Producteurs à l'orientation inversée : tout traiter en extérieur
        outers = std::mem::take(&mut holes);
    }

    let mut polygons: Vec<(LineString, Vec<LineString>)> =
        outers.into_iter().map(|o| (o, Vec::new())).collect();

    'hole: for hole in holes {
        let probe = hole.0[0];
        for (outer, inner) in polygons.iter_mut() {
            if point_in_ring(probe, &outer.0) {
                inner.push(hole);
                continue 'hole;
            }
        }
        // Trou orphelin : rattaché au premier extérieur
        polygons[0].1.push(hole);
    }

    if polygons.len() == 1 {
        let (outer, inner) = polygons.remove(0);
        Ok(Geometry::Polygon(Polygon::new(outer, inner)))
    } else {
        Ok(Geometry::MultiPolygon(MultiPolygon::new(
            polygons
                .into_iter()
                .map(|(outer, inner)| Polygon::new(outer, inner))
                .collect(),
        )))
    }
}

/// Aire signée (shoelace) : positive pour un anneau anti-horaire
pub fn signed_area(ring: &LineString) -> f64 {
    let coords = &ring.0;
    if coords.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for w in coords.windows(2) {
        sum += w[0].x * w[1].y - w[1].x * w[0].y;
    }
    // Fermer l'anneau s'il ne l'est pas
    let (first, last) = (coords[0], coords[coords.len() - 1]);
    if first != last {
        sum += last.x * first.y - first.x * last.y;
    }
    sum / 2.0
}

/// Test point-dans-anneau par lancer de rayon
fn point_in_ring(pt: Coord, ring: &[Coord]) -> bool {
    let mut inside = false;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (ring[i], ring[j]);
        if (pi.y > pt.y) != (pj.y > pt.y)
            && pt.x < (pj.x - pi.x) * (pt.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

pub(crate) fn read_i32_be(data: &[u8], offset: usize) -> Result<i32, ShpError> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or_else(|| ShpError::parse_error(".shp", format!("read past end at {}", offset)))?;
    Ok(i32::from_be_bytes(bytes.try_into().unwrap()))
}

pub(crate) fn read_i32_le(data: &[u8], offset: usize) -> Result<i32, ShpError> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or_else(|| ShpError::parse_error(".shp", format!("read past end at {}", offset)))?;
    Ok(i32::from_le_bytes(bytes.try_into().unwrap()))
}

pub(crate) fn read_f64_le(data: &[u8], offset: usize) -> Result<f64, ShpError> {
    let bytes = data
        .get(offset..offset + 8)
        .ok_or_else(|| ShpError::parse_error(".shp", format!("read past end at {}", offset)))?;
    Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
}
