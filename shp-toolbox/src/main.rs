//! Point d'entrée CLI pour shp-toolbox

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod geojson;
mod ops;
mod report;
mod transform;

use cli::Commands;

/// Outils shapefile : export CSV, fusion, ajout, reprojection, déduplication
#[derive(Parser)]
#[command(name = "shp-toolbox")]
#[command(author, version)]
#[command(about = "Outils shapefile : export CSV, fusion, ajout, reprojection, déduplication")]
#[command(
    long_about = "Boîte à outils pour shapefiles empaquetés en ZIP.\n\n\
    Chaque commande lit une ou plusieurs archives (.shp + .shx + .dbf,\n\
    .prj/.cpg optionnels), applique une opération et écrit le résultat en\n\
    shapefile ZIP, GeoJSON ou CSV."
)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::ToCsv {
            input,
            output,
            delimiter,
            columns,
            geometry,
            report,
        } => cli::cmd_to_csv(
            &input,
            &output,
            &delimiter,
            columns,
            geometry,
            report.as_deref(),
        )?,
        Commands::Merge {
            inputs,
            output,
            target_crs,
            no_align,
            format,
            report,
        } => cli::cmd_merge(
            &inputs,
            &output,
            &target_crs,
            no_align,
            format.as_deref(),
            report.as_deref(),
        )?,
        Commands::Append {
            first,
            second,
            output,
            target_crs,
            format,
            report,
        } => cli::cmd_append(
            &first,
            &second,
            &output,
            &target_crs,
            format.as_deref(),
            report.as_deref(),
        )?,
        Commands::Reproject {
            input,
            output,
            epsg,
            format,
            report,
        } => cli::cmd_reproject(&input, &output, epsg, format.as_deref(), report.as_deref())?,
        Commands::Dedup {
            input,
            output,
            keep,
            format,
            report,
        } => cli::cmd_dedup(&input, &output, &keep, format.as_deref(), report.as_deref())?,
        Commands::Info { inputs } => cli::cmd_info(&inputs)?,
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
