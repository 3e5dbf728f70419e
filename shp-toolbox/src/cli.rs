//! Définition et implémentation des commandes CLI
//!
//! Commandes :
//! - `to-csv` : attributs → texte délimité (géométrie WKT en option)
//! - `merge` : N shapefiles → un seul (CRS réconciliés, schémas alignés)
//! - `append` : les features du second à la suite du premier
//! - `reproject` : reprojection vers un code EPSG
//! - `dedup` : suppression des géométries exactement dupliquées
//! - `info` : CRS, schéma et comptages

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::geojson::export_to_geojson;
use crate::ops::{
    append, dedup, export_csv, merge, reproject, DedupKeep, Delimiter, ExportOptions,
    MergeOptions, TargetCrs,
};
use crate::report::OperationReport;
use shpio::Dataset;

#[derive(Subcommand)]
pub enum Commands {
    /// Export shapefile attributes to delimited text
    ToCsv {
        /// Path to the shapefile archive (.zip)
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Delimiter: comma, semicolon, pipe, tab, or a single character
        #[arg(long, default_value = "comma")]
        delimiter: String,

        /// Ordered subset of columns to export (défaut : toutes)
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Include the geometry as WKT in a trailing column
        #[arg(long)]
        geometry: bool,

        /// Save the operation report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Merge several shapefiles into one
    Merge {
        /// Shapefile archives to merge (at least 2)
        #[arg(short, long, num_args = 2.., required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (.zip shapefile ou .geojson)
        #[arg(short, long)]
        output: PathBuf,

        /// Target CRS: first, last, or an EPSG code
        #[arg(long, default_value = "first")]
        target_crs: String,

        /// Fail on differing schemas instead of aligning them
        #[arg(long)]
        no_align: bool,

        /// Output format override: shapefile ou geojson (défaut : extension)
        #[arg(long)]
        format: Option<String>,

        /// Save the operation report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Append the second shapefile's features to the first
    Append {
        /// Reference shapefile archive
        #[arg(long)]
        first: PathBuf,

        /// Shapefile archive to append
        #[arg(long)]
        second: PathBuf,

        /// Output file (.zip shapefile ou .geojson)
        #[arg(short, long)]
        output: PathBuf,

        /// Target CRS: first, last, or an EPSG code
        #[arg(long, default_value = "first")]
        target_crs: String,

        /// Output format override: shapefile ou geojson
        #[arg(long)]
        format: Option<String>,

        /// Save the operation report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Reproject a shapefile to a target CRS
    Reproject {
        /// Path to the shapefile archive (.zip)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (.zip shapefile ou .geojson)
        #[arg(short, long)]
        output: PathBuf,

        /// Target EPSG code (e.g. 4326 for WGS84, 3857 for Web Mercator)
        #[arg(long)]
        epsg: u32,

        /// Output format override: shapefile ou geojson
        #[arg(long)]
        format: Option<String>,

        /// Save the operation report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Remove exactly duplicated geometries
    Dedup {
        /// Path to the shapefile archive (.zip)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (.zip shapefile ou .geojson)
        #[arg(short, long)]
        output: PathBuf,

        /// Which occurrence keeps its attributes: first ou last
        #[arg(long, default_value = "first")]
        keep: String,

        /// Output format override: shapefile ou geojson
        #[arg(long)]
        format: Option<String>,

        /// Save the operation report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print CRS, schema and feature counts of shapefiles
    Info {
        /// Shapefile archives to inspect
        #[arg(short, long, num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,
    },
}

/// Format de sortie d'un dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    /// Shapefile empaqueté en ZIP
    Shapefile,
    /// GeoJSON en un seul fichier
    GeoJson,
}

impl OutputFormat {
    /// Résout le format depuis l'option --format, sinon l'extension
    fn resolve(option: Option<&str>, output: &Path) -> Result<Self> {
        if let Some(name) = option {
            return match name.to_ascii_lowercase().as_str() {
                "shapefile" | "shp" | "zip" => Ok(Self::Shapefile),
                "geojson" | "json" => Ok(Self::GeoJson),
                other => bail!("Unknown output format: {} (expected shapefile or geojson)", other),
            };
        }
        match output
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("zip") => Ok(Self::Shapefile),
            Some("geojson") | Some("json") => Ok(Self::GeoJson),
            _ => bail!(
                "Cannot infer output format from {}; pass --format shapefile|geojson",
                output.display()
            ),
        }
    }
}

/// Exécute la commande to-csv
pub fn cmd_to_csv(
    input: &Path,
    output: &Path,
    delimiter: &str,
    columns: Option<Vec<String>>,
    geometry: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let started = Instant::now();
    let dataset = load_dataset(input)?;

    let options = ExportOptions {
        delimiter: Delimiter::from_arg(delimiter),
        columns,
        include_geometry: geometry,
    };

    let mut report = OperationReport::new("to-csv");
    report.record_source(&dataset.name, dataset.feature_count(), dataset.feature_count());

    let (text, entries) = export_csv(&dataset, &options)?;
    report.record_all(entries);
    report.features_out = dataset.feature_count();

    // La sortie n'est écrite qu'une fois l'opération entièrement réussie
    std::fs::write(output, text)
        .context(format!("Failed to write {}", output.display()))?;

    report.set_duration(started.elapsed());
    report.finalize();
    finish(&report, report_path)?;

    println!("Wrote {}", output.display());
    Ok(())
}

/// Exécute la commande merge
pub fn cmd_merge(
    inputs: &[PathBuf],
    output: &Path,
    target_crs: &str,
    no_align: bool,
    format: Option<&str>,
    report_path: Option<&Path>,
) -> Result<()> {
    let format = OutputFormat::resolve(format, output)?;
    let target = TargetCrs::from_arg(target_crs).map_err(anyhow::Error::msg)?;
    let datasets = load_datasets(inputs)?;

    let options = MergeOptions {
        target,
        align: !no_align,
    };
    let name = output_stem(output);
    let (merged, report) = merge(datasets, &options, &name)?;

    write_output(&merged, output, format)?;
    finish(&report, report_path)?;

    println!("Wrote {} ({} features)", output.display(), merged.feature_count());
    Ok(())
}

/// Exécute la commande append
pub fn cmd_append(
    first: &Path,
    second: &Path,
    output: &Path,
    target_crs: &str,
    format: Option<&str>,
    report_path: Option<&Path>,
) -> Result<()> {
    let format = OutputFormat::resolve(format, output)?;
    let target = TargetCrs::from_arg(target_crs).map_err(anyhow::Error::msg)?;

    let mut datasets = load_datasets(&[first.to_path_buf(), second.to_path_buf()])?;
    let second_ds = datasets.pop().expect("two datasets loaded");
    let first_ds = datasets.pop().expect("two datasets loaded");

    let name = output_stem(output);
    let (combined, report) = append(first_ds, second_ds, target, &name)?;

    write_output(&combined, output, format)?;
    finish(&report, report_path)?;

    println!(
        "Wrote {} ({} features)",
        output.display(),
        combined.feature_count()
    );
    Ok(())
}

/// Exécute la commande reproject
pub fn cmd_reproject(
    input: &Path,
    output: &Path,
    epsg: u32,
    format: Option<&str>,
    report_path: Option<&Path>,
) -> Result<()> {
    let format = OutputFormat::resolve(format, output)?;
    let started = Instant::now();
    let dataset = load_dataset(input)?;

    let mut report = OperationReport::new("reproject");
    report.record_source(&dataset.name, dataset.feature_count(), dataset.feature_count());

    let (mut reprojected, entries) = reproject(dataset, epsg)?;
    reprojected.name = output_stem(output);
    report.record_all(entries);
    report.features_out = reprojected.feature_count();
    report.output_crs = Some(reprojected.crs.describe());

    write_output(&reprojected, output, format)?;

    report.set_duration(started.elapsed());
    report.finalize();
    finish(&report, report_path)?;

    println!("Wrote {} ({})", output.display(), reprojected.crs);
    Ok(())
}

/// Exécute la commande dedup
pub fn cmd_dedup(
    input: &Path,
    output: &Path,
    keep: &str,
    format: Option<&str>,
    report_path: Option<&Path>,
) -> Result<()> {
    let format = OutputFormat::resolve(format, output)?;
    let keep = DedupKeep::from_arg(keep).map_err(anyhow::Error::msg)?;

    let mut dataset = load_dataset(input)?;
    dataset.name = output_stem(output);

    let (deduped, report) = dedup(dataset, keep)?;

    write_output(&deduped, output, format)?;
    finish(&report, report_path)?;

    println!(
        "Wrote {} ({} features kept)",
        output.display(),
        deduped.feature_count()
    );
    Ok(())
}

/// Exécute la commande info
pub fn cmd_info(inputs: &[PathBuf]) -> Result<()> {
    let datasets = load_datasets(inputs)?;

    for dataset in &datasets {
        println!("\n=== {} ===", dataset.name);
        println!("CRS: {}", dataset.crs);
        println!(
            "Geometry: {} ({} features)",
            dataset.geom_class().label(),
            dataset.feature_count()
        );
        println!("Columns:");
        for field in dataset.schema.fields() {
            println!("  {} ({})", field.name, field.ftype.label());
        }
    }
    println!();
    Ok(())
}

/// Charge un dataset et remonte les erreurs non fatales en warnings
fn load_dataset(path: &Path) -> Result<Dataset> {
    let result =
        shpio::parse(path).context(format!("Failed to read shapefile {}", path.display()))?;

    for error in &result.errors {
        warn!(archive = %path.display(), "{}", error);
    }

    info!(
        archive = %path.display(),
        features = result.dataset.feature_count(),
        crs = %result.dataset.crs,
        "shapefile loaded"
    );

    Ok(result.dataset)
}

/// Charge plusieurs archives en parallèle, dans l'ordre des entrées
fn load_datasets(paths: &[PathBuf]) -> Result<Vec<Dataset>> {
    paths.par_iter().map(|path| load_dataset(path)).collect()
}

/// Écrit un dataset au format demandé
///
/// Rien n'est écrit tant que la sérialisation n'a pas entièrement réussi.
fn write_output(dataset: &Dataset, output: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Shapefile => {
            if dataset.crs.wkt.is_none() && dataset.crs.epsg.is_some() {
                warn!(
                    epsg = dataset.crs.epsg,
                    "EPSG code not in the well-known registry; the archive is written without .prj"
                );
            }
            shpio::writer::write_zip(dataset, output)
                .context(format!("Failed to write {}", output.display()))?;
        }
        OutputFormat::GeoJson => {
            export_to_geojson(dataset, output)?;
        }
    }
    Ok(())
}

/// Affiche le rapport et le sauvegarde si demandé
fn finish(report: &OperationReport, report_path: Option<&Path>) -> Result<()> {
    report.display();
    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .context(format!("Failed to save report to {}", path.display()))?;
        println!("Report saved to {}", path.display());
    }
    Ok(())
}

/// Stem du fichier de sortie, nom du dataset produit
fn output_stem(output: &Path) -> String {
    output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_extension() {
        assert_eq!(
            OutputFormat::resolve(None, Path::new("out.zip")).unwrap(),
            OutputFormat::Shapefile
        );
        assert_eq!(
            OutputFormat::resolve(None, Path::new("out.geojson")).unwrap(),
            OutputFormat::GeoJson
        );
        assert!(OutputFormat::resolve(None, Path::new("out.xyz")).is_err());
    }

    #[test]
    fn test_output_format_override_wins() {
        assert_eq!(
            OutputFormat::resolve(Some("geojson"), Path::new("out.zip")).unwrap(),
            OutputFormat::GeoJson
        );
        assert!(OutputFormat::resolve(Some("gpkg"), Path::new("out.zip")).is_err());
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem(Path::new("dir/merged.zip")), "merged");
        assert_eq!(output_stem(Path::new("")), "output");
    }
}
