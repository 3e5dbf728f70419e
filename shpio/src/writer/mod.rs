//! Écriture des shapefiles : composants et archive ZIP
//!
//! La sortie est le miroir de l'extraction : les composants sont produits
//! en mémoire puis empaquetés dans un ZIP (.shp + .shx + .dbf + .prj si le
//! CRS porte un WKT, + .cpg déclarant l'UTF-8).

pub mod dbf;
pub mod shp;

use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;

use crate::types::Dataset;
use crate::ShpError;

/// Composants d'un shapefile sérialisé
#[derive(Debug)]
pub struct Components {
    pub shp: Vec<u8>,
    pub shx: Vec<u8>,
    pub dbf: Vec<u8>,
    /// Absent quand le CRS du dataset n'a ni WKT ni code connu du registre
    pub prj: Option<Vec<u8>>,
    pub cpg: Vec<u8>,
}

/// Sérialise un dataset en composants shapefile
pub fn to_components(dataset: &Dataset) -> Result<Components, ShpError> {
    let (shp, shx) = shp::write(dataset)?;
    let dbf = dbf::write(dataset)?;

    let prj = dataset
        .crs
        .wkt
        .clone()
        .or_else(|| dataset.crs.epsg.and_then(crate::crs::prj_for_epsg))
        .map(String::into_bytes);

    Ok(Components {
        shp,
        shx,
        dbf,
        prj,
        cpg: b"UTF-8".to_vec(),
    })
}

/// Sérialise un dataset en archive ZIP (bytes)
pub fn to_zip_bytes(dataset: &Dataset) -> Result<Vec<u8>, ShpError> {
    let components = to_components(dataset)?;
    let base = &dataset.name;

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default();

        let mut add = |name: String, content: &[u8]| -> Result<(), ShpError> {
            zip.start_file(name, options)
                .map_err(|e| ShpError::write_error(".zip", e.to_string()))?;
            zip.write_all(content)?;
            Ok(())
        };

        add(format!("{}.shp", base), &components.shp)?;
        add(format!("{}.shx", base), &components.shx)?;
        add(format!("{}.dbf", base), &components.dbf)?;
        if let Some(ref prj) = components.prj {
            add(format!("{}.prj", base), prj)?;
        }
        add(format!("{}.cpg", base), &components.cpg)?;

        zip.finish()
            .map_err(|e| ShpError::write_error(".zip", e.to_string()))?;
    }

    Ok(buf)
}

/// Écrit un dataset en archive ZIP sur disque
pub fn write_zip(dataset: &Dataset, path: &Path) -> Result<(), ShpError> {
    let bytes = to_zip_bytes(dataset)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::types::{Feature, Field, FieldType, Schema, ShapeType, Value};
    use geo::{Geometry, Point};

    fn point_dataset(crs: Crs) -> Dataset {
        Dataset {
            name: "villes".to_string(),
            shape_type: ShapeType::Point,
            crs,
            schema: Schema::new(vec![Field::new("name", FieldType::Text)]),
            features: vec![Feature {
                geometry: Geometry::Point(Point::new(2.35, 48.85)),
                row: vec![Value::Text("Paris".to_string())],
            }],
        }
    }

    #[test]
    fn test_zip_contains_components() {
        let bytes = to_zip_bytes(&point_dataset(Crs::from_epsg(4326))).unwrap();
        let archive = crate::archive::extract_from_bytes(&bytes).unwrap();
        assert_eq!(archive.base_name, "villes");
        assert!(archive.prj.is_some());
        assert_eq!(archive.cpg.as_deref(), Some(b"UTF-8".as_ref()));
    }

    #[test]
    fn test_unknown_crs_writes_no_prj() {
        let bytes = to_zip_bytes(&point_dataset(Crs::unknown())).unwrap();
        let archive = crate::archive::extract_from_bytes(&bytes).unwrap();
        assert!(archive.prj.is_none());
    }

    #[test]
    fn test_unregistered_epsg_keeps_source_wkt() {
        // Un CRS inconnu du registre mais porteur du WKT du .prj source
        let crs = Crs {
            epsg: Some(5699),
            name: None,
            wkt: Some("PROJCS[\"Custom\"]".to_string()),
        };
        let components = to_components(&point_dataset(crs)).unwrap();
        assert_eq!(components.prj.as_deref(), Some(b"PROJCS[\"Custom\"]".as_ref()));
    }
}
