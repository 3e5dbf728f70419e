//! Export GeoJSON avec geozero (streaming, zero-copy)
//!
//! Sortie en un seul fichier, propriétés typées (les nombres restent des
//! nombres JSON). Le membre `crs` hérité est émis quand le code EPSG est
//! connu et n'est pas WGS84, pour que la provenance ne se perde pas.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use shpio::{Dataset, Feature, Schema, Value};

/// Exporte un dataset en GeoJSON (streaming avec geozero)
pub fn export_to_geojson(dataset: &Dataset, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_feature_collection(&mut writer, dataset)?;
    writer.flush()?;
    Ok(())
}

/// Écrit une FeatureCollection complète
pub fn write_feature_collection<W: Write>(writer: &mut W, dataset: &Dataset) -> Result<()> {
    write!(writer, r#"{{"type":"FeatureCollection""#)?;

    // Membre crs hérité : utile dès qu'on n'est pas en WGS84
    if let Some(epsg) = dataset.crs.epsg {
        if epsg != 4326 {
            write!(
                writer,
                r#","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}}"#,
                epsg
            )?;
        }
    }

    write!(writer, r#","features":["#)?;

    for (i, feature) in dataset.features.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, &dataset.schema, feature)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

/// Écrit une feature
fn write_feature<W: Write>(writer: &mut W, schema: &Schema, feature: &Feature) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","geometry":"#)?;

    // Géométrie via geozero (efficace, zero-copy)
    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    feature.geometry.process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    write!(writer, r#","properties":{{"#)?;
    for (i, (field, value)) in schema.fields().iter().zip(&feature.row).enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write!(writer, r#""{}":"#, escape_json(&field.name))?;
        write_value(writer, value)?;
    }
    write!(writer, "}}}}")?;

    Ok(())
}

/// Écrit une valeur attributaire en JSON typé
fn write_value<W: Write>(writer: &mut W, value: &Value) -> Result<()> {
    match value {
        Value::Text(s) => write!(writer, r#""{}""#, escape_json(s))?,
        Value::Date(d) => write!(writer, r#""{}""#, escape_json(d))?,
        Value::Integer(i) => write!(writer, "{}", i)?,
        Value::Real(r) if r.is_finite() => write!(writer, "{}", r)?,
        Value::Real(_) => write!(writer, "null")?,
        Value::Boolean(b) => write!(writer, "{}", b)?,
        Value::Null => write!(writer, "null")?,
    }
    Ok(())
}

/// Échappe une chaîne pour JSON
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}
