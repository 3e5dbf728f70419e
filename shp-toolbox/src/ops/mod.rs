//! Opérations sur les datasets vectoriels
//!
//! Chaque opération est une fonction pure de ses entrées : pas d'état
//! entre appels, pas de retry (un échec est déterministe et se reproduit
//! à l'identique). Les erreurs fatales interrompent l'opération sans
//! produire de résultat partiel ; les dégradations s'accumulent dans les
//! entrées de rapport.

pub mod align;
pub mod append;
pub mod dedup;
pub mod export_csv;
pub mod merge;
pub mod reconcile;
pub mod reproject;

pub use align::align;
pub use append::append;
pub use dedup::{dedup, DedupKeep};
pub use export_csv::{export_csv, Delimiter, ExportOptions};
pub use merge::{merge, MergeOptions, TargetCrs};
pub use reconcile::reconcile;
pub use reproject::reproject;

use thiserror::Error;

use crate::transform::TransformError;

/// Erreurs fatales des opérations
///
/// Chaque variante est détectable et testable indépendamment ; aucune
/// n'est produite avec un résultat partiel.
#[derive(Debug, Error)]
pub enum OpError {
    /// Un dataset sans CRS connu entre dans une opération qui en exige un.
    /// Jamais de CRS par défaut : source classique de résultats faux.
    #[error("dataset '{dataset}' has no known CRS; refusing to assume one")]
    MissingCrs { dataset: String },

    /// Identifiant de CRS cible invalide ou rejeté par le backend,
    /// détecté avant toute lecture de géométrie
    #[error("invalid CRS identifier EPSG:{code}: {reason}")]
    InvalidCrs { code: u32, reason: String },

    /// Délimiteur d'export qui n'est pas exactement un caractère ASCII
    #[error("delimiter must be exactly one ASCII character, got {got:?}")]
    InvalidDelimiter { got: String },

    /// Zéro élément fourni à une opération qui en attend au moins un
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// Colonne demandée absente du schéma
    #[error("column '{column}' does not exist in dataset '{dataset}'")]
    UnknownColumn { column: String, dataset: String },

    /// Classes géométriques hétérogènes entre datasets à combiner
    #[error(
        "cannot combine {left} geometries from '{left_name}' with {right} geometries \
         from '{right_name}'"
    )]
    GeometryClassMismatch {
        left: &'static str,
        left_name: String,
        right: &'static str,
        right_name: String,
    },

    /// Schémas non identiques alors que l'alignement est désactivé
    #[error(
        "datasets '{left}' and '{right}' have different schemas and alignment is disabled"
    )]
    SchemaMismatch { left: String, right: String },

    /// Index du dataset de référence hors bornes
    #[error("reference index {index} out of bounds for {count} datasets")]
    ReferenceOutOfBounds { index: usize, count: usize },

    /// Échec d'encodage de la sortie (CSV, WKT)
    #[error("failed to encode output: {0}")]
    Encode(String),

    /// Échec du backend de transformation en cours de route
    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl OpError {
    /// Convertit une erreur de construction de transformation en
    /// `InvalidCrs` (la validation du CRS cible a échoué)
    pub(crate) fn invalid_crs(code: u32, err: TransformError) -> Self {
        match err {
            TransformError::Rejected { reason, .. } => Self::InvalidCrs { code, reason },
            other => Self::Transform(other),
        }
    }
}
