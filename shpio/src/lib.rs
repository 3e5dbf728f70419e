//! # shpio
//!
//! Parser et writer pour le format ESRI Shapefile (shp/shx/dbf/prj/cpg),
//! empaqueté en archive ZIP.
//!
//! ## Features
//!
//! - Parsing binaire .shp et .dbf entièrement en mémoire
//! - Types `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//! - Attributs typés {text, integer, real, boolean, date} résolus au parsing
//! - Détection du CRS depuis le .prj (AUTHORITY ou nom connu), jamais de
//!   défaut silencieux quand il est absent
//! - Écriture symétrique : dataset → composants → ZIP
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::path::Path;
//!
//! let result = shpio::parse(Path::new("communes.zip"))?;
//! println!("CRS: {}", result.dataset.crs);
//! println!("{} features", result.dataset.feature_count());
//! ```

pub mod archive;
pub mod crs;
pub mod error;
pub mod parser;
pub mod types;
pub mod writer;

pub use crs::Crs;
pub use error::ShpError;
pub use types::{
    Dataset, Feature, Field, FieldType, GeomClass, ParseResult, Schema, ShapeType, Value,
};

use std::path::Path;

use tracing::debug;

/// Parse une archive shapefile (.zip) et construit le dataset.
///
/// # Arguments
///
/// * `path` - Chemin vers l'archive .zip
///
/// # Returns
///
/// Un `ParseResult` contenant le dataset (features appariées géométrie +
/// ligne attributaire, schéma, CRS) et les erreurs non fatales rencontrées.
///
/// # Errors
///
/// Retourne `ShpError` si l'archive est illisible, si un composant
/// obligatoire manque, ou si le nombre de géométries ne correspond pas au
/// nombre de lignes attributaires.
pub fn parse(path: &Path) -> Result<ParseResult, ShpError> {
    let archive_data = archive::extract(path)?;
    build_dataset(archive_data)
}

/// Parse une archive shapefile depuis des bytes en mémoire
pub fn parse_bytes(bytes: &[u8]) -> Result<ParseResult, ShpError> {
    let archive_data = archive::extract_from_bytes(bytes)?;
    build_dataset(archive_data)
}

/// Construit le dataset depuis les composants extraits
fn build_dataset(archive_data: archive::ShapefileArchive) -> Result<ParseResult, ShpError> {
    // 1. Géométries
    let (shp_file, mut errors) = parser::shp::parse(&archive_data.shp)?;

    // 2. Table attributaire, avec l'encodage du .cpg s'il existe
    let encoding = archive_data
        .cpg
        .as_deref()
        .and_then(parser::cpg::encoding_from_cpg);
    let (dbf_file, dbf_errors) = parser::dbf::parse(&archive_data.dbf, encoding)?;
    errors.extend(dbf_errors);

    // 3. Cohérence avec l'index .shx (non bloquant, l'index est redondant)
    if let Some(count) = parser::shp::shx_record_count(&archive_data.shx) {
        if count != shp_file.geometries.len() {
            errors.push(ShpError::parse_error(
                ".shx",
                format!(
                    "index announces {} records, .shp holds {}",
                    count,
                    shp_file.geometries.len()
                ),
            ));
        }
    }

    // 4. Appariement strict géométries / lignes
    if shp_file.geometries.len() != dbf_file.records.len() {
        return Err(ShpError::parse_error(
            ".dbf",
            format!(
                "{} attribute rows for {} geometry records",
                dbf_file.records.len(),
                shp_file.geometries.len()
            ),
        ));
    }

    // 5. CRS depuis le .prj, sinon explicitement inconnu
    let crs = match archive_data.prj.as_deref() {
        Some(prj) => {
            let content = String::from_utf8_lossy(prj);
            crs::parse_prj(&content)
        }
        None => Crs::unknown(),
    };

    let mut features = Vec::with_capacity(dbf_file.records.len());
    for (i, (geometry, row)) in shp_file
        .geometries
        .into_iter()
        .zip(dbf_file.records)
        .enumerate()
    {
        match geometry {
            Some(geometry) => features.push(Feature { geometry, row }),
            None => {
                // Shape null ou enregistrement invalide : la ligne
                // attributaire appariée tombe avec lui
                errors.push(ShpError::invalid_geometry(i + 1, "null shape skipped"));
            }
        }
    }

    debug!(
        name = %archive_data.base_name,
        features = features.len(),
        crs = %crs,
        "shapefile parsed"
    );

    Ok(ParseResult {
        dataset: Dataset {
            name: archive_data.base_name,
            shape_type: shp_file.shape_type,
            crs,
            schema: Schema::new(dbf_file.fields),
            features,
        },
        errors,
    })
}
