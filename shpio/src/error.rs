//! Types d'erreurs pour le crate shpio

use thiserror::Error;

/// Erreurs pouvant survenir lors du parsing ou de l'écriture d'un shapefile
#[derive(Debug, Error)]
pub enum ShpError {
    /// Erreur d'I/O lors de la lecture de l'archive
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive corrompue ou format invalide
    #[error("Invalid archive format: {0}")]
    InvalidArchive(String),

    /// Fichier composant manquant dans l'archive
    #[error("Missing required file: {0}")]
    MissingFile(String),

    /// Erreur de parsing d'un fichier composant
    #[error("Parse error in {file}: {reason}")]
    ParseError { file: String, reason: String },

    /// Géométrie invalide dans un enregistrement .shp
    #[error("Invalid geometry in record {record}: {reason}")]
    InvalidGeometry { record: usize, reason: String },

    /// Type de forme non supporté
    #[error("Unsupported shape type code: {0}")]
    UnsupportedShapeType(i32),

    /// Encodage non supporté
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Erreur lors de l'écriture d'un fichier composant
    #[error("Write error for {file}: {reason}")]
    WriteError { file: String, reason: String },
}

impl ShpError {
    /// Crée une erreur de parsing avec contexte
    pub fn parse_error(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseError {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(record: usize, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            record,
            reason: reason.into(),
        }
    }

    /// Crée une erreur d'écriture avec contexte
    pub fn write_error(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteError {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
