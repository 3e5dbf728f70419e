//! Réconciliation des CRS avant combinaison
//!
//! Le dataset de référence impose son CRS : les autres sont reprojetés
//! vers lui, ceux déjà compatibles passent inchangés. Un dataset sans
//! CRS connu fait échouer l'opération, jamais de défaut supposé.

use shpio::Dataset;
use tracing::{debug, info};

use crate::ops::reproject::transform_features;
use crate::ops::OpError;
use crate::report::ReportEntry;
use crate::transform::SmartTransform;

/// Aligne tous les datasets sur le CRS du dataset de référence
///
/// Postcondition : tous les datasets retournés portent le même code EPSG.
/// L'ordre et le contenu attributaire sont préservés.
pub fn reconcile(
    datasets: Vec<Dataset>,
    reference_index: usize,
) -> Result<(Vec<Dataset>, Vec<ReportEntry>), OpError> {
    if datasets.is_empty() {
        return Err(OpError::EmptyInput(
            "reconcile requires at least one dataset".to_string(),
        ));
    }
    if reference_index >= datasets.len() {
        return Err(OpError::ReferenceOutOfBounds {
            index: reference_index,
            count: datasets.len(),
        });
    }
    for dataset in &datasets {
        if dataset.is_empty() {
            return Err(OpError::EmptyInput(format!(
                "dataset '{}' has no features",
                dataset.name
            )));
        }
    }

    let target_epsg = datasets[reference_index]
        .crs
        .epsg
        .ok_or_else(|| OpError::MissingCrs {
            dataset: datasets[reference_index].name.clone(),
        })?;
    let target_crs = datasets[reference_index].crs.clone();

    let mut entries = Vec::with_capacity(datasets.len());
    let mut reconciled = Vec::with_capacity(datasets.len());

    for (i, dataset) in datasets.into_iter().enumerate() {
        if i == reference_index {
            debug!(dataset = %dataset.name, "reference dataset, CRS kept");
            reconciled.push(dataset);
            continue;
        }

        let source_epsg = dataset.crs.epsg.ok_or_else(|| OpError::MissingCrs {
            dataset: dataset.name.clone(),
        })?;

        if source_epsg == target_epsg {
            entries.push(
                ReportEntry::info(format!("already compatible with EPSG:{}", target_epsg))
                    .with_source(&dataset.name),
            );
            reconciled.push(dataset);
            continue;
        }

        // La construction échoue avant de toucher aux géométries
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
        entries.push(
            ReportEntry::info(format!(
                "reprojected from EPSG:{} to EPSG:{}",
                source_epsg, target_epsg
            ))
            .with_source(&dataset.name),
        );
        dataset.crs = target_crs.clone();
        reconciled.push(dataset);
    }

    Ok((reconciled, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};
    use shpio::{Crs, Feature, Field, FieldType, Schema, ShapeType, Value};

    fn dataset(name: &str, crs: Crs, x: f64, y: f64) -> Dataset {
        Dataset {
            name: name.to_string(),
            shape_type: ShapeType::Point,
            crs,
            schema: Schema::new(vec![Field::new("id", FieldType::Integer)]),
            features: vec![Feature {
                geometry: Geometry::Point(Point::new(x, y)),
                row: vec![Value::Integer(1)],
            }],
        }
    }

    #[test]
    fn test_equal_crs_pass_through_unchanged() {
        let a = dataset("a", Crs::from_epsg(4326), 2.35, 48.85);
        let b = dataset("b", Crs::from_epsg(4326), 5.37, 43.30);

        let (out, entries) = reconcile(vec![a, b], 0).unwrap();
        assert_eq!(out.len(), 2);
        // Coordonnées intactes : aucun transform invoqué
        match &out[1].features[0].geometry {
            Geometry::Point(p) => {
                assert_eq!(p.x(), 5.37);
                assert_eq!(p.y(), 43.30);
            }
            other => panic!("Expected point, got {:?}", other),
        }
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("already compatible"));
        assert_eq!(entries[0].source.as_deref(), Some("b"));
    }

    #[test]
    fn test_differing_crs_reprojected_to_reference() {
        let a = dataset("a", Crs::from_epsg(4326), 2.35, 48.85);
        let b = dataset("b", Crs::from_epsg(3857), 261600.0, 6250000.0);

        let (out, entries) = reconcile(vec![a, b], 0).unwrap();
        assert_eq!(out[1].crs.epsg, Some(4326));
        match &out[1].features[0].geometry {
            Geometry::Point(p) => {
                assert!((p.x() - 2.35).abs() < 0.01, "lon={}", p.x());
                assert!((p.y() - 48.85).abs() < 0.1, "lat={}", p.y());
            }
            other => panic!("Expected point, got {:?}", other),
        }
        assert!(entries[0]
            .message
            .contains("reprojected from EPSG:3857 to EPSG:4326"));
    }

    #[test]
    fn test_reference_index_selects_target() {
        let a = dataset("a", Crs::from_epsg(4326), 2.35, 48.85);
        let b = dataset("b", Crs::from_epsg(3857), 261600.0, 6250000.0);

        let (out, _) = reconcile(vec![a, b], 1).unwrap();
        assert_eq!(out[0].crs.epsg, Some(3857));
        assert_eq!(out[1].crs.epsg, Some(3857));
    }

    #[test]
    fn test_unknown_crs_is_fatal() {
        let a = dataset("no-crs", Crs::unknown(), 1.0, 2.0);
        let b = dataset("b", Crs::from_epsg(4326), 2.0, 3.0);

        match reconcile(vec![a, b], 0) {
            Err(OpError::MissingCrs { dataset }) => assert_eq!(dataset, "no-crs"),
            other => panic!("Expected MissingCrs, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_crs_on_non_reference_is_fatal_too() {
        let a = dataset("a", Crs::from_epsg(4326), 1.0, 2.0);
        let b = dataset("no-crs", Crs::unknown(), 2.0, 3.0);

        assert!(matches!(
            reconcile(vec![a, b], 0),
            Err(OpError::MissingCrs { .. })
        ));
    }

    #[test]
    fn test_empty_list_rejected() {
        assert!(matches!(
            reconcile(vec![], 0),
            Err(OpError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_reference_out_of_bounds() {
        let a = dataset("a", Crs::from_epsg(4326), 1.0, 2.0);
        assert!(matches!(
            reconcile(vec![a], 3),
            Err(OpError::ReferenceOutOfBounds { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_single_dataset_is_valid() {
        let a = dataset("a", Crs::from_epsg(4326), 1.0, 2.0);
        let (out, entries) = reconcile(vec![a], 0).unwrap();
        assert_eq!(out.len(), 1);
        assert!(entries.is_empty());
    }
}
