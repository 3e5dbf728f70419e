//! Fusion de plusieurs datasets en un seul
//!
//! Enchaîne réconciliation des CRS, alignement des schémas puis
//! concaténation des features dans l'ordre des entrées. Les classes
//! géométriques doivent être homogènes : fusionner des points avec des
//! polygones est une erreur fatale, pas une sémantique devinée.

use std::time::Instant;

use shpio::{Dataset, GeomClass, ShapeType};
use tracing::info;

use crate::ops::{align, reconcile, reproject, OpError};
use crate::report::OperationReport;

/// Choix du CRS cible d'une combinaison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetCrs {
    /// CRS du premier dataset
    First,
    /// CRS du dernier dataset
    Last,
    /// Code EPSG explicite
    Epsg(u32),
}

impl TargetCrs {
    /// Interprète l'argument CLI ("first", "last" ou un code EPSG)
    pub fn from_arg(arg: &str) -> Result<Self, String> {
        match arg.to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => other
                .parse::<u32>()
                .map(Self::Epsg)
                .map_err(|_| format!("expected 'first', 'last' or an EPSG code, got {:?}", arg)),
        }
    }
}

/// Options de fusion
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// CRS cible
    pub target: TargetCrs,

    /// Aligner les schémas ; désactivé, des schémas non identiques
    /// font échouer l'opération
    pub align: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            target: TargetCrs::First,
            align: true,
        }
    }
}

/// Fusionne au moins deux datasets en un seul
pub fn merge(
    datasets: Vec<Dataset>,
    options: &MergeOptions,
    output_name: &str,
) -> Result<(Dataset, OperationReport), OpError> {
    combine(datasets, options, output_name, "merge")
}

/// Cœur commun de merge et append
pub(crate) fn combine(
    datasets: Vec<Dataset>,
    options: &MergeOptions,
    output_name: &str,
    operation: &str,
) -> Result<(Dataset, OperationReport), OpError> {
    if datasets.len() < 2 {
        return Err(OpError::EmptyInput(format!(
            "{} requires at least 2 datasets, got {}",
            operation,
            datasets.len()
        )));
    }

    // Classes géométriques homogènes, sinon erreur fatale
    let first_class = datasets[0].geom_class();
    for dataset in datasets.iter().skip(1) {
        if dataset.geom_class() != first_class {
            return Err(OpError::GeometryClassMismatch {
                left: first_class.label(),
                left_name: datasets[0].name.clone(),
                right: dataset.geom_class().label(),
                right_name: dataset.name.clone(),
            });
        }
    }

    let started = Instant::now();
    let mut report = OperationReport::new(operation);
    for dataset in &datasets {
        report.record_source(&dataset.name, dataset.feature_count(), dataset.feature_count());
    }

    // 1. CRS commun
    let datasets = match options.target {
        TargetCrs::First => {
            let (datasets, entries) = reconcile(datasets, 0)?;
            report.record_all(entries);
            datasets
        }
        TargetCrs::Last => {
            let index = datasets.len() - 1;
            let (datasets, entries) = reconcile(datasets, index)?;
            report.record_all(entries);
            datasets
        }
        TargetCrs::Epsg(code) => {
            let mut reprojected = Vec::with_capacity(datasets.len());
            for dataset in datasets {
                let (dataset, entries) = reproject(dataset, code)?;
                report.record_all(entries);
                reprojected.push(dataset);
            }
            reprojected
        }
    };

    // 2. Schémas
    let datasets = if options.align {
        let (_, datasets, entries) = align(datasets)?;
        report.record_all(entries);
        datasets
    } else {
        for pair in datasets.windows(2) {
            if !schemas_identical(&pair[0], &pair[1]) {
                return Err(OpError::SchemaMismatch {
                    left: pair[0].name.clone(),
                    right: pair[1].name.clone(),
                });
            }
        }
        datasets
    };

    // 3. Concaténation dans l'ordre des entrées
    let shape_type = merged_shape_type(first_class, &datasets);
    let crs = datasets[0].crs.clone();
    let schema = datasets[0].schema.clone();

    let mut features = Vec::with_capacity(datasets.iter().map(Dataset::feature_count).sum());
    for dataset in datasets {
        features.extend(dataset.features);
    }

    let merged = Dataset {
        name: output_name.to_string(),
        shape_type,
        crs,
        schema,
        features,
    };

    info!(
        operation = operation,
        features = merged.feature_count(),
        crs = %merged.crs,
        "datasets combined"
    );

    report.features_out = merged.feature_count();
    report.output_crs = Some(merged.crs.describe());
    report.set_duration(started.elapsed());
    report.finalize();

    Ok((merged, report))
}

/// Schémas identiques : mêmes noms et types, dans le même ordre
fn schemas_identical(a: &Dataset, b: &Dataset) -> bool {
    a.schema.len() == b.schema.len()
        && a.schema
            .fields()
            .iter()
            .zip(b.schema.fields())
            .all(|(x, y)| x.name == y.name && x.ftype == y.ftype)
}

/// Type de forme du résultat : le type 2D de la classe commune,
/// promu en multipoint si une source l'exige
fn merged_shape_type(class: GeomClass, datasets: &[Dataset]) -> ShapeType {
    match class {
        GeomClass::Point => {
            if datasets.iter().any(|d| {
                matches!(
                    d.shape_type,
                    ShapeType::MultiPoint | ShapeType::MultiPointZ | ShapeType::MultiPointM
                )
            }) {
                ShapeType::MultiPoint
            } else {
                ShapeType::Point
            }
        }
        GeomClass::Line => ShapeType::PolyLine,
        GeomClass::Polygon => ShapeType::Polygon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{EntryLevel, OperationStatus};
    use geo::{Geometry, Point};
    use shpio::{Crs, Feature, Field, FieldType, Schema, Value};

    fn dataset(name: &str, crs: Crs, fields: Vec<Field>, rows: Vec<Vec<Value>>) -> Dataset {
        Dataset {
            name: name.to_string(),
            shape_type: ShapeType::Point,
            crs,
            schema: Schema::new(fields),
            features: rows
                .into_iter()
                .enumerate()
                .map(|(i, row)| Feature {
                    geometry: Geometry::Point(Point::new(i as f64, i as f64)),
                    row,
                })
                .collect(),
        }
    }

    fn simple(name: &str, n: usize) -> Dataset {
        dataset(
            name,
            Crs::from_epsg(4326),
            vec![Field::new("id", FieldType::Integer)],
            (0..n).map(|i| vec![Value::Integer(i as i64)]).collect(),
        )
    }

    #[test]
    fn test_merge_concatenates_in_input_order() {
        let (merged, report) = merge(
            vec![simple("a", 2), simple("b", 3)],
            &MergeOptions::default(),
            "merged",
        )
        .unwrap();

        assert_eq!(merged.feature_count(), 5);
        assert_eq!(merged.name, "merged");
        assert_eq!(report.features_in(), 5);
        assert_eq!(report.features_out, 5);
        assert_eq!(report.status, OperationStatus::Success);

        // Les 2 features de a d'abord, puis les 3 de b
        assert_eq!(merged.features[0].row[0], Value::Integer(0));
        assert_eq!(merged.features[2].row[0], Value::Integer(0));
    }

    #[test]
    fn test_merge_single_dataset_rejected() {
        assert!(matches!(
            merge(vec![simple("a", 2)], &MergeOptions::default(), "out"),
            Err(OpError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_merge_extra_column_null_filled() {
        // Scénario : le dataset 2 a une colonne "area" absente des
        // datasets 1 et 3
        let a = simple("a", 1);
        let b = dataset(
            "b",
            Crs::from_epsg(4326),
            vec![
                Field::new("id", FieldType::Integer),
                Field::new("area", FieldType::Real),
            ],
            vec![vec![Value::Integer(0), Value::Real(12.5)]],
        );
        let c = simple("c", 1);

        let (merged, report) = merge(
            vec![a, b, c],
            &MergeOptions::default(),
            "merged",
        )
        .unwrap();

        assert_eq!(merged.schema.names(), vec!["id", "area"]);
        // area renseignée uniquement pour la ligne venant de b
        assert_eq!(merged.features[0].row[1], Value::Null);
        assert_eq!(merged.features[1].row[1], Value::Real(12.5));
        assert_eq!(merged.features[2].row[1], Value::Null);

        // La colonne ajoutée est tracée dans le rapport
        assert!(report
            .entries
            .iter()
            .any(|e| e.level == EntryLevel::Info
                && e.field.as_deref() == Some("area")
                && e.message.contains("added during alignment")));
    }

    #[test]
    fn test_merge_mixed_geometry_classes_fatal() {
        let mut polys = simple("polys", 1);
        polys.shape_type = ShapeType::Polygon;
        let points = simple("points", 1);

        match merge(vec![points, polys], &MergeOptions::default(), "out") {
            Err(OpError::GeometryClassMismatch {
                left,
                right,
                ..
            }) => {
                assert_eq!(left, "point");
                assert_eq!(right, "polygon");
            }
            other => panic!("Expected GeometryClassMismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_merge_no_align_requires_identical_schemas() {
        let a = simple("a", 1);
        let b = dataset(
            "b",
            Crs::from_epsg(4326),
            vec![Field::new("other", FieldType::Text)],
            vec![vec![Value::Text("x".into())]],
        );
        let options = MergeOptions {
            align: false,
            ..Default::default()
        };
        assert!(matches!(
            merge(vec![a, b], &options, "out"),
            Err(OpError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_merge_to_explicit_epsg() {
        let a = simple("a", 1);
        let b = dataset(
            "b",
            Crs::from_epsg(3857),
            vec![Field::new("id", FieldType::Integer)],
            vec![vec![Value::Integer(0)]],
        );
        let options = MergeOptions {
            target: TargetCrs::Epsg(3857),
            align: true,
        };
        let (merged, _) = merge(vec![a, b], &options, "out").unwrap();
        assert_eq!(merged.crs.epsg, Some(3857));
    }

    #[test]
    fn test_merge_target_last() {
        let a = simple("a", 1);
        let b = dataset(
            "b",
            Crs::from_epsg(3857),
            vec![Field::new("id", FieldType::Integer)],
            vec![vec![Value::Integer(0)]],
        );
        let options = MergeOptions {
            target: TargetCrs::Last,
            align: true,
        };
        let (merged, _) = merge(vec![a, b], &options, "out").unwrap();
        assert_eq!(merged.crs.epsg, Some(3857));
    }

    #[test]
    fn test_target_crs_from_arg() {
        assert_eq!(TargetCrs::from_arg("first"), Ok(TargetCrs::First));
        assert_eq!(TargetCrs::from_arg("LAST"), Ok(TargetCrs::Last));
        assert_eq!(TargetCrs::from_arg("4326"), Ok(TargetCrs::Epsg(4326)));
        assert!(TargetCrs::from_arg("nope").is_err());
    }
}
