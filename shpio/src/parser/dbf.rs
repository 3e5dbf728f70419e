//! Parser pour les fichiers .dbf (table attributaire, dBase III)
//!
//! Les types DBF sont résolus une seule fois en tag sémantique
//! {text, integer, real, boolean, date, unknown} ; les valeurs sont
//! décodées champ par champ, les indécodables deviennent Null avec une
//! erreur non fatale.

use encoding_rs::Encoding;

use crate::parser::cpg::encoding_from_ldid;
use crate::types::{Field, FieldType, Value};
use crate::ShpError;

/// Marqueur de fin de la zone des descripteurs de champs
const FIELD_TERMINATOR: u8 = 0x0d;

/// Résultat du parsing d'un fichier .dbf
#[derive(Debug)]
pub struct DbfFile {
    /// Champs, dans l'ordre du fichier
    pub fields: Vec<Field>,

    /// Lignes attributaires, une par enregistrement
    pub records: Vec<Vec<Value>>,

    /// Octet "language driver" de l'en-tête
    pub language_driver: u8,
}

/// Parse un fichier .dbf complet
///
/// `encoding_override` vient du fichier .cpg s'il existe ; sinon l'octet
/// language driver de l'en-tête décide.
pub fn parse(
    data: &[u8],
    encoding_override: Option<&'static Encoding>,
) -> Result<(DbfFile, Vec<ShpError>), ShpError> {
    if data.len() < 32 {
        return Err(ShpError::parse_error(".dbf", "file shorter than header"));
    }

    let record_count = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;
    let header_size = u16::from_le_bytes(data[8..10].try_into().unwrap()) as usize;
    let record_size = u16::from_le_bytes(data[10..12].try_into().unwrap()) as usize;
    let language_driver = data[29];

    if header_size < 33 || header_size > data.len() {
        return Err(ShpError::parse_error(
            ".dbf",
            format!("invalid header size {}", header_size),
        ));
    }
    if record_size == 0 {
        return Err(ShpError::parse_error(".dbf", "zero record size"));
    }

    let encoding = encoding_override.unwrap_or_else(|| encoding_from_ldid(language_driver));

    // Descripteurs de champs : 32 octets chacun jusqu'au terminateur 0x0D
    let mut fields = Vec::new();
    let mut pos = 32;
    while pos < header_size && data[pos] != FIELD_TERMINATOR {
        if pos + 32 > data.len() {
            return Err(ShpError::parse_error(".dbf", "truncated field descriptor"));
        }
        let desc = &data[pos..pos + 32];

        let name_end = desc[..11].iter().position(|&b| b == 0).unwrap_or(11);
        let (name, _, _) = encoding.decode(&desc[..name_end]);
        let type_code = desc[11];
        let length = desc[16];
        let decimals = desc[17];

        fields.push(Field {
            name: name.into_owned(),
            ftype: resolve_type(type_code, length, decimals),
            length,
            decimals,
        });

        pos += 32;
    }

    if fields.is_empty() {
        return Err(ShpError::parse_error(".dbf", "no field descriptors"));
    }

    let widths_sum: usize = 1 + fields.iter().map(|f| f.length as usize).sum::<usize>();
    let mut errors = Vec::new();
    if widths_sum != record_size {
        // La taille d'enregistrement de l'en-tête fait foi pour avancer
        errors.push(ShpError::parse_error(
            ".dbf",
            format!(
                "field widths sum to {} but record size is {}",
                widths_sum, record_size
            ),
        ));
    }

    let mut records = Vec::with_capacity(record_count);
    let mut pos = header_size;

    for record in 0..record_count {
        if pos + record_size > data.len() {
            errors.push(ShpError::parse_error(
                ".dbf",
                format!("truncated at record {} of {}", record, record_count),
            ));
            break;
        }

        // L'octet de flag (0x2A = supprimé) est ignoré : les lignes d'un
        // shapefile restent appariées aux géométries par leur rang.
        let mut row = Vec::with_capacity(fields.len());
        let mut offset = pos + 1;

        for field in &fields {
            let end = (offset + field.length as usize).min(pos + record_size);
            let raw = &data[offset..end];
            match decode_value(raw, field, encoding) {
                Ok(value) => row.push(value),
                Err(reason) => {
                    errors.push(ShpError::parse_error(
                        ".dbf",
                        format!("record {}, field {}: {}", record + 1, field.name, reason),
                    ));
                    row.push(Value::Null);
                }
            }
            offset = end;
        }

        records.push(row);
        pos += record_size;
    }

    Ok((
        DbfFile {
            fields,
            records,
            language_driver,
        },
        errors,
    ))
}

/// Résout le tag sémantique d'un code de type DBF
fn resolve_type(code: u8, length: u8, decimals: u8) -> FieldType {
    match code {
        b'C' => FieldType::Text,
        // N sans décimales tient dans i64 jusqu'à 18 chiffres
        b'N' if decimals == 0 && length <= 18 => FieldType::Integer,
        b'N' | b'F' => FieldType::Real,
        b'L' => FieldType::Boolean,
        b'D' => FieldType::Date,
        _ => FieldType::Unknown,
    }
}

/// Décode la valeur d'un champ d'enregistrement
fn decode_value(
    raw: &[u8],
    field: &Field,
    encoding: &'static Encoding,
) -> Result<Value, String> {
    let text = decode_text(raw, encoding);

    match field.ftype {
        FieldType::Text | FieldType::Unknown => {
            let trimmed = text.trim_end();
            if trimmed.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Text(trimmed.to_string()))
            }
        }
        FieldType::Integer => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.chars().all(|c| c == '*') {
                return Ok(Value::Null);
            }
            trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| format!("not an integer: {:?}", trimmed))
        }
        FieldType::Real => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.chars().all(|c| c == '*') {
                return Ok(Value::Null);
            }
            fast_float::parse(trimmed)
                .map(Value::Real)
                .map_err(|_| format!("not a number: {:?}", trimmed))
        }
        FieldType::Boolean => match text.trim().as_bytes().first() {
            Some(b'T') | Some(b't') | Some(b'Y') | Some(b'y') => Ok(Value::Boolean(true)),
            Some(b'F') | Some(b'f') | Some(b'N') | Some(b'n') => Ok(Value::Boolean(false)),
            Some(b'?') | None => Ok(Value::Null),
            Some(other) => Err(format!("bad logical byte {:#x}", other)),
        },
        FieldType::Date => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(Value::Null);
            }
            if trimmed.len() == 8 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                Ok(Value::Date(format!(
                    "{}-{}-{}",
                    &trimmed[0..4],
                    &trimmed[4..6],
                    &trimmed[6..8]
                )))
            } else {
                Err(format!("bad date: {:?}", trimmed))
            }
        }
    }
}

/// Décode des octets en texte : UTF-8 validé SIMD d'abord, codepage sinon
fn decode_text(raw: &[u8], encoding: &'static Encoding) -> String {
    if let Ok(s) = simdutf8::basic::from_utf8(raw) {
        return s.to_string();
    }
    let (decoded, _, _) = encoding.decode(raw);
    decoded.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Construit un .dbf en mémoire
    fn dbf_bytes(fields: &[(&str, u8, u8, u8)], rows: &[&[&str]]) -> Vec<u8> {
        let record_size: usize = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();
        let header_size = 32 + fields.len() * 32 + 1;

        let mut data = vec![0u8; 32];
        data[0] = 0x03;
        data[4..8].copy_from_slice(&(rows.len() as u32).to_le_bytes());
        data[8..10].copy_from_slice(&(header_size as u16).to_le_bytes());
        data[10..12].copy_from_slice(&(record_size as u16).to_le_bytes());

        for &(name, ftype, length, decimals) in fields {
            let mut desc = [0u8; 32];
            desc[..name.len().min(11)].copy_from_slice(&name.as_bytes()[..name.len().min(11)]);
            desc[11] = ftype;
            desc[16] = length;
            desc[17] = decimals;
            data.extend_from_slice(&desc);
        }
        data.push(FIELD_TERMINATOR);

        for row in rows {
            data.push(0x20);
            for (value, &(_, _, length, _)) in row.iter().zip(fields) {
                let mut cell = vec![0x20u8; length as usize];
                let bytes = value.as_bytes();
                cell[..bytes.len().min(length as usize)]
                    .copy_from_slice(&bytes[..bytes.len().min(length as usize)]);
                data.extend_from_slice(&cell);
            }
        }
        data.push(0x1a);
        data
    }

    #[test]
    fn test_parse_typed_fields() {
        let data = dbf_bytes(
            &[
                ("NAME", b'C', 10, 0),
                ("POP", b'N', 8, 0),
                ("AREA", b'N', 10, 2),
                ("ACTIVE", b'L', 1, 0),
                ("SEEN", b'D', 8, 0),
            ],
            &[&["Lyon", "522250", "47.87", "T", "20240115"]],
        );

        let (dbf, errors) = parse(&data, None).unwrap();
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(dbf.fields.len(), 5);
        assert_eq!(dbf.fields[0].ftype, FieldType::Text);
        assert_eq!(dbf.fields[1].ftype, FieldType::Integer);
        assert_eq!(dbf.fields[2].ftype, FieldType::Real);
        assert_eq!(dbf.fields[3].ftype, FieldType::Boolean);
        assert_eq!(dbf.fields[4].ftype, FieldType::Date);

        let row = &dbf.records[0];
        assert_eq!(row[0], Value::Text("Lyon".to_string()));
        assert_eq!(row[1], Value::Integer(522250));
        assert_eq!(row[2], Value::Real(47.87));
        assert_eq!(row[3], Value::Boolean(true));
        assert_eq!(row[4], Value::Date("2024-01-15".to_string()));
    }

    #[test]
    fn test_parse_empty_cells_are_null() {
        let data = dbf_bytes(
            &[("NAME", b'C', 10, 0), ("POP", b'N', 8, 0)],
            &[&["", ""]],
        );
        let (dbf, errors) = parse(&data, None).unwrap();
        assert!(errors.is_empty());
        assert_eq!(dbf.records[0][0], Value::Null);
        assert_eq!(dbf.records[0][1], Value::Null);
    }

    #[test]
    fn test_parse_bad_number_is_null_with_error() {
        let data = dbf_bytes(&[("POP", b'N', 8, 0)], &[&["abc"]]);
        let (dbf, errors) = parse(&data, None).unwrap();
        assert_eq!(dbf.records[0][0], Value::Null);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_parse_codepage_text() {
        // "Orléans" en windows-1252 : é = 0xE9
        let mut data = dbf_bytes(&[("NAME", b'C', 10, 0)], &[&["Orleans"]]);
        // Remplacer "Orleans   " par "Orl\xE9ans  " dans l'enregistrement
        let cell_start = data.len() - 1 - 10;
        data[cell_start..cell_start + 10].copy_from_slice(b"Orl\xE9ans   ");
        let (dbf, _) = parse(&data, None).unwrap();
        assert_eq!(dbf.records[0][0], Value::Text("Orléans".to_string()));
    }

    #[test]
    fn test_parse_too_short() {
        assert!(parse(&[0u8; 10], None).is_err());
    }

    #[test]
    fn test_resolve_type_wide_n_is_real() {
        assert_eq!(resolve_type(b'N', 19, 0), FieldType::Real);
        assert_eq!(resolve_type(b'N', 10, 0), FieldType::Integer);
        assert_eq!(resolve_type(b'X', 10, 0), FieldType::Unknown);
    }
}
