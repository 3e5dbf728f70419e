//! Extraction des archives shapefile (.zip)

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use crate::ShpError;

/// Contenu extrait d'une archive shapefile
#[derive(Debug)]
pub struct ShapefileArchive {
    /// Nom de base du shapefile (stem de l'entrée .shp)
    pub base_name: String,

    /// Contenu du fichier .shp (géométries)
    pub shp: Vec<u8>,

    /// Contenu du fichier .shx (index des enregistrements)
    pub shx: Vec<u8>,

    /// Contenu du fichier .dbf (table attributaire)
    pub dbf: Vec<u8>,

    /// Contenu du fichier .prj (projection), optionnel
    pub prj: Option<Vec<u8>>,

    /// Contenu du fichier .cpg (encodage), optionnel
    pub cpg: Option<Vec<u8>>,
}

/// Extrait une archive shapefile en mémoire
///
/// # Arguments
///
/// * `path` - Chemin vers l'archive .zip
///
/// # Returns
///
/// Les contenus des fichiers .shp, .shx, .dbf, et .prj/.cpg s'ils existent
pub fn extract(path: &Path) -> Result<ShapefileArchive, ShpError> {
    let file = std::fs::File::open(path)?;
    extract_from_reader(file)
}

/// Extrait une archive shapefile depuis des bytes en mémoire
pub fn extract_from_bytes(bytes: &[u8]) -> Result<ShapefileArchive, ShpError> {
    extract_from_reader(Cursor::new(bytes))
}

/// Extrait une archive shapefile depuis un reader
pub fn extract_from_reader<R: Read + Seek>(reader: R) -> Result<ShapefileArchive, ShpError> {
    let mut archive =
        ZipArchive::new(reader).map_err(|e| ShpError::InvalidArchive(e.to_string()))?;

    let mut files: HashMap<String, Vec<u8>> = HashMap::new();
    let mut base_name = None;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ShpError::InvalidArchive(e.to_string()))?;

        if !entry.is_file() {
            continue;
        }

        let name = entry.name().to_string();

        // Ignorer les métadonnées macOS glissées dans les ZIP d'upload
        if name.starts_with("__MACOSX") {
            continue;
        }

        let extension = name.rsplit('.').next().unwrap_or("").to_ascii_uppercase();

        match extension.as_str() {
            "SHP" | "SHX" | "DBF" | "PRJ" | "CPG" => {
                if extension == "SHP" {
                    if base_name.is_some() {
                        return Err(ShpError::InvalidArchive(
                            "multiple .shp files in archive, expected exactly one".to_string(),
                        ));
                    }
                    base_name = Some(stem_of(&name));
                }

                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                files.insert(extension, content);
            }
            _ => {
                // Ignorer les autres fichiers (.sbn, .sbx, .shp.xml, etc.)
            }
        }
    }

    // Composants obligatoires (mêmes exigences que la validation d'upload)
    let shp = files
        .remove("SHP")
        .ok_or_else(|| ShpError::MissingFile(".shp".into()))?;

    let shx = files
        .remove("SHX")
        .ok_or_else(|| ShpError::MissingFile(".shx".into()))?;

    let dbf = files
        .remove("DBF")
        .ok_or_else(|| ShpError::MissingFile(".dbf".into()))?;

    Ok(ShapefileArchive {
        base_name: base_name.unwrap_or_else(|| "shapefile".to_string()),
        shp,
        shx,
        dbf,
        prj: files.remove("PRJ"),
        cpg: files.remove("CPG"),
    })
}

/// Stem d'une entrée d'archive ("data/communes.shp" -> "communes")
fn stem_of(entry_name: &str) -> String {
    let file_name = entry_name.rsplit('/').next().unwrap_or(entry_name);
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
        .to_string()
}
