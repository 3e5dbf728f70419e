//! Écriture des fichiers .dbf (dBase III)
//!
//! Les attributs sont écrits en UTF-8 ; l'encodage est déclaré par le
//! fichier .cpg joint (language driver à 0x00), comme le font les
//! écrivains GDAL récents.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{Dataset, Field, FieldType, Value};
use crate::ShpError;

/// Largeur maximale d'un champ texte DBF
const MAX_TEXT_WIDTH: usize = 254;

/// Largeur maximale d'un champ numérique
const MAX_NUMERIC_WIDTH: usize = 20;

/// Sérialise la table attributaire d'un dataset en .dbf
pub fn write(dataset: &Dataset) -> Result<Vec<u8>, ShpError> {
    let fields = &dataset.schema.0;
    if fields.is_empty() {
        return Err(ShpError::write_error(".dbf", "schema has no fields"));
    }

    // Pré-passe : élargir les champs dont une valeur dépasse la largeur déclarée
    let mut widths: Vec<usize> = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        let mut width = effective_base_width(field);
        for feature in &dataset.features {
            width = width.max(formatted(&feature.row[i], field).len());
        }
        let cap = match field.ftype {
            FieldType::Text | FieldType::Unknown => MAX_TEXT_WIDTH,
            FieldType::Integer | FieldType::Real => MAX_NUMERIC_WIDTH,
            FieldType::Boolean => 1,
            FieldType::Date => 8,
        };
        widths.push(width.min(cap));
    }

    let record_size: usize = 1 + widths.iter().sum::<usize>();
    let header_size = 32 + fields.len() * 32 + 1;
    let record_count = dataset.features.len();

    let mut data = Vec::with_capacity(header_size + record_count * record_size + 1);

    // En-tête
    data.push(0x03); // dBase III sans mémo
    let (y, m, d) = today();
    data.push(y.saturating_sub(1900).min(255) as u8);
    data.push(m);
    data.push(d);
    data.extend_from_slice(&(record_count as u32).to_le_bytes());
    data.extend_from_slice(&(header_size as u16).to_le_bytes());
    data.extend_from_slice(&(record_size as u16).to_le_bytes());
    data.extend_from_slice(&[0u8; 20]); // réservé, language driver 0x00

    // Descripteurs de champs
    for (field, &width) in fields.iter().zip(&widths) {
        let mut desc = [0u8; 32];
        let name = sanitize_name(&field.name);
        desc[..name.len()].copy_from_slice(name.as_bytes());
        desc[11] = type_code(field.ftype);
        desc[16] = width as u8;
        desc[17] = if field.ftype == FieldType::Real {
            field.decimals
        } else {
            0
        };
        data.extend_from_slice(&desc);
    }
    data.push(0x0d);

    // Enregistrements
    for feature in &dataset.features {
        data.push(0x20); // actif
        for ((value, field), &width) in feature.row.iter().zip(fields.iter()).zip(&widths) {
            push_cell(&mut data, value, field, width);
        }
    }

    data.push(0x1a); // EOF
    Ok(data)
}

/// Largeur de départ d'un champ (déclarée, sinon défaut du type)
fn effective_base_width(field: &Field) -> usize {
    if field.length > 0 {
        field.length as usize
    } else {
        Field::new("", field.ftype).length as usize
    }
}

/// Code de type DBF pour un tag sémantique
fn type_code(ftype: FieldType) -> u8 {
    match ftype {
        FieldType::Text | FieldType::Unknown => b'C',
        FieldType::Integer | FieldType::Real => b'N',
        FieldType::Boolean => b'L',
        FieldType::Date => b'D',
    }
}

/// Nom de champ DBF : ASCII, 10 octets max
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_graphic() { c } else { '_' })
        .take(10)
        .collect()
}

/// Forme textuelle d'une valeur pour un champ donné
fn formatted(value: &Value, field: &Field) -> String {
    match value {
        Value::Null => String::new(),
        Value::Real(r) if field.ftype == FieldType::Real => {
            format!("{:.*}", field.decimals as usize, r)
        }
        Value::Date(d) => d.chars().filter(|c| *c != '-').collect(),
        Value::Boolean(b) => if *b { "T" } else { "F" }.to_string(),
        other => other.to_text(),
    }
}

/// Écrit une cellule à largeur fixe
fn push_cell(data: &mut Vec<u8>, value: &Value, field: &Field, width: usize) {
    let text = formatted(value, field);
    let bytes = truncate_on_char_boundary(&text, width);

    match field.ftype {
        // Numériques cadrés à droite
        FieldType::Integer | FieldType::Real => {
            if bytes.len() > width {
                // Dépassement malgré la pré-passe (largeur plafonnée) : '*'
                data.extend(std::iter::repeat(b'*').take(width));
            } else {
                data.extend(std::iter::repeat(b' ').take(width - bytes.len()));
                data.extend_from_slice(bytes);
            }
        }
        FieldType::Boolean => {
            data.push(if bytes.is_empty() { b'?' } else { bytes[0] });
        }
        // Texte et dates cadrés à gauche
        _ => {
            data.extend_from_slice(bytes);
            data.extend(std::iter::repeat(b' ').take(width.saturating_sub(bytes.len())));
        }
    }
}

/// Tronque une chaîne à `width` octets sans couper un caractère UTF-8
fn truncate_on_char_boundary(text: &str, width: usize) -> &[u8] {
    if text.len() <= width {
        return text.as_bytes();
    }
    let mut end = width;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text.as_bytes()[..end]
}

/// Date du jour (algorithme civil-from-days, sans dépendance calendrier)
fn today() -> (u16, u8, u8) {
    let days = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / 86400)
        .unwrap_or(0) as i64;

    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { (mp + 3) as u8 } else { (mp - 9) as u8 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as u16, m, d)
}
