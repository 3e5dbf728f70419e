//! Export de la table attributaire en texte délimité
//!
//! En-tête puis une ligne par feature dans l'ordre d'origine. La colonne
//! géométrie optionnelle est encodée en WKT via geozero.

use csv::WriterBuilder;
use geozero::wkt::WktWriter;
use geozero::GeozeroGeometry;
use shpio::Dataset;
use tracing::debug;

use crate::ops::OpError;
use crate::report::ReportEntry;

/// Nom de la colonne géométrie ajoutée en fin de ligne
const GEOMETRY_COLUMN: &str = "geometry";

/// Délimiteur de sortie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Semicolon,
    Pipe,
    Tab,
    /// Délimiteur libre : exactement un caractère ASCII
    Custom(String),
}

impl Delimiter {
    /// Interprète l'argument CLI ("comma", ";", "tab", ...)
    pub fn from_arg(arg: &str) -> Self {
        match arg.to_ascii_lowercase().as_str() {
            "comma" | "," => Self::Comma,
            "semicolon" | ";" => Self::Semicolon,
            "pipe" | "|" => Self::Pipe,
            "tab" | "\t" | "\\t" => Self::Tab,
            _ => Self::Custom(arg.to_string()),
        }
    }

    /// Octet du délimiteur ; un Custom multi-caractères ou non ASCII
    /// est rejeté
    pub fn as_byte(&self) -> Result<u8, OpError> {
        match self {
            Self::Comma => Ok(b','),
            Self::Semicolon => Ok(b';'),
            Self::Pipe => Ok(b'|'),
            Self::Tab => Ok(b'\t'),
            Self::Custom(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii() => Ok(c as u8),
                    _ => Err(OpError::InvalidDelimiter { got: s.clone() }),
                }
            }
        }
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::Comma
    }
}

/// Options d'export
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Délimiteur de colonnes
    pub delimiter: Delimiter,

    /// Sous-ensemble ordonné de colonnes (`None` = toutes)
    pub columns: Option<Vec<String>>,

    /// Ajouter la géométrie en WKT en dernière colonne
    pub include_geometry: bool,
}

/// Exporte la table attributaire d'un dataset en texte délimité
pub fn export_csv(
    dataset: &Dataset,
    options: &ExportOptions,
) -> Result<(String, Vec<ReportEntry>), OpError> {
    // Le délimiteur se valide avant tout le reste
    let delimiter = options.delimiter.as_byte()?;

    // Colonnes sélectionnées, dans l'ordre demandé
    let selected: Vec<usize> = match &options.columns {
        None => (0..dataset.schema.len()).collect(),
        Some(names) => names
            .iter()
            .map(|name| {
                dataset
                    .schema
                    .index_of(name)
                    .ok_or_else(|| OpError::UnknownColumn {
                        column: name.clone(),
                        dataset: dataset.name.clone(),
                    })
            })
            .collect::<Result<_, _>>()?,
    };

    let mut entries = Vec::new();

    if selected.is_empty() && !options.include_geometry {
        // Cas limite toléré : rien à exporter, corps vide
        entries.push(ReportEntry::warning(
            "no columns selected and geometry disabled; output body is empty",
        ));
        return Ok((String::new(), entries));
    }

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    let mut header: Vec<&str> = selected
        .iter()
        .map(|&i| dataset.schema.fields()[i].name.as_str())
        .collect();
    if options.include_geometry {
        header.push(GEOMETRY_COLUMN);
    }
    writer
        .write_record(&header)
        .map_err(|e| OpError::Encode(e.to_string()))?;

    let mut wkt_buf: Vec<u8> = Vec::with_capacity(1024);
    for feature in &dataset.features {
        let mut record: Vec<String> = selected
            .iter()
            .map(|&i| feature.row[i].to_text())
            .collect();

        if options.include_geometry {
            wkt_buf.clear();
            {
                let mut wkt = WktWriter::new(&mut wkt_buf);
                feature
                    .geometry
                    .process_geom(&mut wkt)
                    .map_err(|e| OpError::Encode(e.to_string()))?;
            }
            record.push(
                String::from_utf8(wkt_buf.clone()).map_err(|e| OpError::Encode(e.to_string()))?,
            );
        }

        writer
            .write_record(&record)
            .map_err(|e| OpError::Encode(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| OpError::Encode(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| OpError::Encode(e.to_string()))?;

    debug!(
        rows = dataset.feature_count(),
        columns = selected.len(),
        geometry = options.include_geometry,
        "attribute table exported"
    );

    Ok((text, entries))
}
