//! Alignement de schémas attributaires avant concaténation
//!
//! Le schéma aligné est l'union des colonnes : celles du premier dataset
//! dans leur ordre d'origine, puis les colonnes nouvelles dans l'ordre de
//! première rencontre. Une colonne garde le type de son premier
//! définisseur ; les valeurs ultérieures y sont coercées quand c'est
//! représentable, nullifiées et signalées sinon. Aucune ligne n'est
//! perdue ni fusionnée.

use std::collections::HashMap;

use shpio::{Dataset, Feature, Schema, Value};
use tracing::debug;

use crate::ops::OpError;
use crate::report::ReportEntry;

/// Aligne les schémas de plusieurs datasets
///
/// Déterministe : mêmes entrées dans le même ordre, même schéma aligné
/// et mêmes tables en sortie. Idempotent sur des datasets déjà alignés.
pub fn align(
    datasets: Vec<Dataset>,
) -> Result<(Schema, Vec<Dataset>, Vec<ReportEntry>), OpError> {
    if datasets.is_empty() {
        return Err(OpError::EmptyInput(
            "align requires at least one dataset".to_string(),
        ));
    }

    let mut entries = Vec::new();

    // 1. Schéma union
    let mut aligned_fields = datasets[0].schema.0.clone();
    let mut index_by_name: HashMap<String, usize> = aligned_fields
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.clone(), i))
        .collect();

    for dataset in datasets.iter().skip(1) {
        for field in dataset.schema.fields() {
            match index_by_name.get(&field.name) {
                Some(&i) => {
                    let first = &aligned_fields[i];
                    if first.ftype != field.ftype {
                        entries.push(
                            ReportEntry::warning(format!(
                                "type {} conflicts with first-seen type {}; coercing",
                                field.ftype.label(),
                                first.ftype.label(),
                            ))
                            .with_source(&dataset.name)
                            .with_field(&field.name),
                        );
                    }
                }
                None => {
                    entries.push(
                        ReportEntry::info(format!(
                            "column added during alignment ({})",
                            field.ftype.label()
                        ))
                        .with_source(&dataset.name)
                        .with_field(&field.name),
                    );
                    index_by_name.insert(field.name.clone(), aligned_fields.len());
                    aligned_fields.push(field.clone());
                }
            }
        }
    }

    let aligned = Schema::new(aligned_fields);
    debug!(columns = aligned.len(), "aligned schema computed");

    // 2. Projection de chaque dataset sur le schéma aligné
    let mut projected = Vec::with_capacity(datasets.len());

    for dataset in datasets {
        // Position de chaque colonne alignée dans le schéma source
        let source_indices: Vec<Option<usize>> = aligned
            .fields()
            .iter()
            .map(|f| dataset.schema.index_of(&f.name))
            .collect();

        let mut coercion_failures: HashMap<String, usize> = HashMap::new();

        let features: Vec<Feature> = dataset
            .features
            .into_iter()
            .map(|feature| {
                let row = aligned
                    .fields()
                    .iter()
                    .zip(&source_indices)
                    .map(|(field, src)| match src {
                        Some(i) => match feature.row[*i].coerce(field.ftype) {
                            Some(value) => value,
                            None => {
                                *coercion_failures.entry(field.name.clone()).or_default() += 1;
                                Value::Null
                            }
                        },
                        None => Value::Null,
                    })
                    .collect();
                Feature {
                    geometry: feature.geometry,
                    row,
                }
            })
            .collect();

        let mut failed_columns: Vec<_> = coercion_failures.into_iter().collect();
        failed_columns.sort();
        for (column, count) in failed_columns {
            entries.push(
                ReportEntry::warning(format!(
                    "{} values not representable in the aligned type, replaced with null",
                    count
                ))
                .with_source(&dataset.name)
                .with_field(column),
            );
        }

        projected.push(Dataset {
            name: dataset.name,
            shape_type: dataset.shape_type,
            crs: dataset.crs,
            schema: aligned.clone(),
            features,
        });
    }

    Ok((aligned, projected, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Geometry, Point};
    use shpio::{Crs, Field, FieldType, ShapeType};

    fn dataset(name: &str, fields: Vec<Field>, rows: Vec<Vec<Value>>) -> Dataset {
        Dataset {
            name: name.to_string(),
            shape_type: ShapeType::Point,
            crs: Crs::from_epsg(4326),
            schema: Schema::new(fields),
            features: rows
                .into_iter()
                .map(|row| Feature {
                    geometry: Geometry::Point(Point::new(0.0, 0.0)),
                    row,
                })
                .collect(),
        }
    }

    #[test]
    fn test_union_order_first_then_first_encountered() {
        let a = dataset(
            "a",
            vec![
                Field::new("name", FieldType::Text),
                Field::new("pop", FieldType::Integer),
            ],
            vec![vec![Value::Text("x".into()), Value::Integer(1)]],
        );
        let b = dataset(
            "b",
            vec![
                Field::new("area", FieldType::Real),
                Field::new("name", FieldType::Text),
            ],
            vec![vec![Value::Real(2.5), Value::Text("y".into())]],
        );

        let (schema, out, _) = align(vec![a, b]).unwrap();
        assert_eq!(schema.names(), vec!["name", "pop", "area"]);

        // Chaque ligne a exactement le nombre de colonnes du schéma aligné
        for ds in &out {
            for f in &ds.features {
                assert_eq!(f.row.len(), 3);
            }
        }

        // a: area absente -> Null ; b: pop absente -> Null
        assert_eq!(out[0].features[0].row[2], Value::Null);
        assert_eq!(out[1].features[0].row[1], Value::Null);
        assert_eq!(out[1].features[0].row[2], Value::Real(2.5));
    }

    #[test]
    fn test_column_count_is_distinct_union() {
        let a = dataset(
            "a",
            vec![
                Field::new("x", FieldType::Text),
                Field::new("y", FieldType::Text),
            ],
            vec![vec![Value::Null, Value::Null]],
        );
        let b = dataset(
            "b",
            vec![
                Field::new("y", FieldType::Text),
                Field::new("z", FieldType::Text),
            ],
            vec![vec![Value::Null, Value::Null]],
        );
        let (schema, _, _) = align(vec![a, b]).unwrap();
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_type_conflict_first_seen_wins_with_coercion() {
        let a = dataset(
            "a",
            vec![Field::new("code", FieldType::Integer)],
            vec![vec![Value::Integer(7)]],
        );
        let b = dataset(
            "b",
            vec![Field::new("code", FieldType::Text)],
            vec![
                vec![Value::Text("12".into())],
                vec![Value::Text("abc".into())],
            ],
        );

        let (schema, out, entries) = align(vec![a, b]).unwrap();
        assert_eq!(schema.fields()[0].ftype, FieldType::Integer);

        // "12" se coerce, "abc" devient Null
        assert_eq!(out[1].features[0].row[0], Value::Integer(12));
        assert_eq!(out[1].features[1].row[0], Value::Null);

        // Conflit signalé et nullification signalée, jamais silencieux
        assert!(entries
            .iter()
            .any(|e| e.message.contains("conflicts with first-seen type")));
        assert!(entries
            .iter()
            .any(|e| e.message.contains("replaced with null")));
    }

    #[test]
    fn test_row_order_and_count_preserved() {
        let a = dataset(
            "a",
            vec![Field::new("n", FieldType::Integer)],
            vec![
                vec![Value::Integer(1)],
                vec![Value::Integer(2)],
                vec![Value::Integer(3)],
            ],
        );
        let b = dataset(
            "b",
            vec![Field::new("m", FieldType::Integer)],
            vec![vec![Value::Integer(9)]],
        );

        let (_, out, _) = align(vec![a, b]).unwrap();
        assert_eq!(out[0].feature_count(), 3);
        assert_eq!(out[1].feature_count(), 1);
        let values: Vec<_> = out[0].features.iter().map(|f| f.row[0].clone()).collect();
        assert_eq!(
            values,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn test_idempotent_on_aligned_tables() {
        let a = dataset(
            "a",
            vec![Field::new("name", FieldType::Text)],
            vec![vec![Value::Text("x".into())]],
        );
        let b = dataset(
            "b",
            vec![Field::new("area", FieldType::Real)],
            vec![vec![Value::Real(1.0)]],
        );

        let (schema1, out1, _) = align(vec![a, b]).unwrap();
        let rows1: Vec<Vec<Value>> = out1
            .iter()
            .flat_map(|d| d.features.iter().map(|f| f.row.clone()))
            .collect();

        let (schema2, out2, entries2) = align(out1).unwrap();
        let rows2: Vec<Vec<Value>> = out2
            .iter()
            .flat_map(|d| d.features.iter().map(|f| f.row.clone()))
            .collect();

        assert_eq!(schema1, schema2);
        assert_eq!(rows1, rows2);
        assert!(entries2.is_empty());
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(align(vec![]), Err(OpError::EmptyInput(_))));
    }

    #[test]
    fn test_single_dataset_unchanged() {
        let a = dataset(
            "a",
            vec![Field::new("n", FieldType::Integer)],
            vec![vec![Value::Integer(4)]],
        );
        let (schema, out, entries) = align(vec![a]).unwrap();
        assert_eq!(schema.names(), vec!["n"]);
        assert_eq!(out[0].features[0].row[0], Value::Integer(4));
        assert!(entries.is_empty());
    }
}
