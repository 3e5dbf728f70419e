//! Ajout des features d'un dataset à la suite d'un autre
//!
//! Cas à deux entrées de la combinaison : le premier dataset est la
//! référence (sauf cible explicite), le second est reprojeté et aligné
//! sur lui, puis ses features sont ajoutées après les siennes.

use shpio::Dataset;

use crate::ops::merge::{combine, MergeOptions, TargetCrs};
use crate::ops::OpError;
use crate::report::OperationReport;

/// Ajoute les features de `other` à la suite de celles de `first`
pub fn append(
    first: Dataset,
    other: Dataset,
    target: TargetCrs,
    output_name: &str,
) -> Result<(Dataset, OperationReport), OpError> {
    let options = MergeOptions {
        target,
        align: true,
    };
    combine(vec![first, other], &options, output_name, "append")
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};
    use shpio::{Crs, Feature, Field, FieldType, Schema, ShapeType, Value};

    fn dataset(name: &str, crs: Crs, values: &[i64]) -> Dataset {
        Dataset {
            name: name.to_string(),
            shape_type: ShapeType::Point,
            crs,
            schema: Schema::new(vec![Field::new("id", FieldType::Integer)]),
            features: values
                .iter()
                .map(|&v| Feature {
                    geometry: Geometry::Point(Point::new(v as f64, v as f64)),
                    row: vec![Value::Integer(v)],
                })
                .collect(),
        }
    }

    #[test]
    fn test_append_preserves_order_first_then_other() {
        let a = dataset("a", Crs::from_epsg(4326), &[1, 2]);
        let b = dataset("b", Crs::from_epsg(4326), &[10]);

        let (out, report) = append(a, b, TargetCrs::First, "combined").unwrap();
        assert_eq!(out.feature_count(), 3);
        assert_eq!(out.features[0].row[0], Value::Integer(1));
        assert_eq!(out.features[2].row[0], Value::Integer(10));
        assert_eq!(report.operation, "append");
        assert_eq!(report.sources.len(), 2);
    }

    #[test]
    fn test_append_reprojects_other_to_first() {
        let a = dataset("a", Crs::from_epsg(4326), &[1]);
        let mut b = dataset("b", Crs::from_epsg(3857), &[2]);
        b.features[0].geometry = Geometry::Point(Point::new(261600.0, 6250000.0));

        let (out, _) = append(a, b, TargetCrs::First, "combined").unwrap();
        assert_eq!(out.crs.epsg, Some(4326));
        match &out.features[1].geometry {
            Geometry::Point(p) => assert!((p.x() - 2.35).abs() < 0.01, "x={}", p.x()),
            other => panic!("Expected point, got {:?}", other),
        }
    }

    #[test]
    fn test_append_missing_crs_fatal() {
        let a = dataset("a", Crs::from_epsg(4326), &[1]);
        let b = dataset("b", Crs::unknown(), &[2]);
        assert!(matches!(
            append(a, b, TargetCrs::First, "combined"),
            Err(OpError::MissingCrs { .. })
        ));
    }
}
