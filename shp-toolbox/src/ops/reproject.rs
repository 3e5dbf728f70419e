//! Reprojection d'un dataset vers un CRS cible
//!
//! La validation du code cible précède toute lecture de géométrie, et
//! reprojeter vers le CRS courant est une identité stricte : aucun
//! transform n'est invoqué, donc aucune erreur d'arrondi flottant.

use shpio::{Crs, Dataset, Feature};
use tracing::info;

use crate::ops::OpError;
use crate::report::ReportEntry;
use crate::transform::SmartTransform;

/// Reprojette un dataset vers `target_epsg`
///
/// Les lignes attributaires et l'ordre des features sont intacts ; seul
/// le CRS et les coordonnées changent.
pub fn reproject(
    dataset: Dataset,
    target_epsg: u32,
) -> Result<(Dataset, Vec<ReportEntry>), OpError> {
    if dataset.is_empty() {
        return Err(OpError::EmptyInput(format!(
            "dataset '{}' has no features",
            dataset.name
        )));
    }

    // Validation syntaxique du code avant tout le reste
    if target_epsg == 0 {
        return Err(OpError::InvalidCrs {
            code: target_epsg,
            reason: "EPSG code 0 is not a valid identifier".to_string(),
        });
    }

    let source_epsg = dataset.crs.epsg.ok_or_else(|| OpError::MissingCrs {
        dataset: dataset.name.clone(),
    })?;

    // Identité : ne pas invoquer le transform du tout
    if source_epsg == target_epsg {
        let entry = ReportEntry::info(format!(
            "already in EPSG:{}, no transform applied",
            target_epsg
        ))
        .with_source(&dataset.name);
        return Ok((dataset, vec![entry]));
    }

    // Validation sémantique par le backend, avant de toucher aux géométries
    let transform = SmartTransform::new(source_epsg, target_epsg)
        .map_err(|e| OpError::invalid_crs(target_epsg, e))?;

    info!(
        dataset = %dataset.name,
        from = source_epsg,
        to = target_epsg,
        backend = transform.description(),
        "reprojecting"
    );

    let mut dataset = dataset;
    let features = std::mem::take(&mut dataset.features);
    dataset.features = transform_features(features, &transform)?;

    let count = dataset.feature_count();
    let entry = ReportEntry::info(format!(
        "reprojected {} features from EPSG:{} to EPSG:{}",
        count, source_epsg, target_epsg
    ))
    .with_source(&dataset.name);

    dataset.crs = Crs::from_epsg(target_epsg);
    Ok((dataset, vec![entry]))
}

/// Applique une transformation aux géométries, attributs intacts
pub(crate) fn transform_features(
    features: Vec<Feature>,
    transform: &SmartTransform,
) -> Result<Vec<Feature>, OpError> {
    features
        .into_iter()
        .map(|feature| {
            let geometry = transform.transform_geometry(&feature.geometry)?;
            Ok(Feature {
                geometry,
                row: feature.row,
            })
        })
        .collect()
}
