//! Résolution de l'encodage des attributs DBF
//!
//! L'encodage vient du fichier .cpg quand il existe, sinon de l'octet
//! "language driver" de l'en-tête DBF. Défaut : windows-1252, le plus
//! répandu pour les shapefiles hérités.

use encoding_rs::Encoding;

/// Interprète le contenu d'un fichier .cpg ("UTF-8", "ISO-8859-1", ...)
pub fn encoding_from_cpg(data: &[u8]) -> Option<&'static Encoding> {
    let token = std::str::from_utf8(data).ok()?.trim().to_ascii_uppercase();

    match token.as_str() {
        "UTF-8" | "UTF8" | "65001" => Some(encoding_rs::UTF_8),
        // encoding_rs n'a pas de Latin-1 pur : windows-1252 en est le sur-ensemble
        "ISO-8859-1" | "8859-1" | "LATIN1" | "ISO 8859-1" => Some(encoding_rs::WINDOWS_1252),
        "ISO-8859-15" | "8859-15" | "LATIN9" => Some(encoding_rs::ISO_8859_15),
        "CP1252" | "WINDOWS-1252" | "ANSI 1252" | "1252" => Some(encoding_rs::WINDOWS_1252),
        "CP1251" | "WINDOWS-1251" | "1251" => Some(encoding_rs::WINDOWS_1251),
        "CP932" | "SHIFT_JIS" | "SJIS" | "SHIFT-JIS" => Some(encoding_rs::SHIFT_JIS),
        "CP936" | "GBK" | "GB2312" => Some(encoding_rs::GBK),
        "CP950" | "BIG5" => Some(encoding_rs::BIG5),
        _ => None,
    }
}

/// Mappe l'octet "language driver" DBF vers un encodage
pub fn encoding_from_ldid(ldid: u8) -> &'static Encoding {
    match ldid {
        0x57 | 0x03 => encoding_rs::WINDOWS_1252, // ANSI
        0xc8 => encoding_rs::WINDOWS_1250,        // Europe centrale
        0xc9 => encoding_rs::WINDOWS_1251,        // Cyrillique
        0x13 | 0x7b => encoding_rs::SHIFT_JIS,    // Japonais
        0x7a => encoding_rs::GBK,                 // Chinois simplifié
        0x78 => encoding_rs::BIG5,                // Chinois traditionnel
        _ => encoding_rs::WINDOWS_1252,           // Défaut hérité
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpg_utf8() {
        assert_eq!(
            encoding_from_cpg(b"UTF-8\r\n").unwrap().name(),
            "UTF-8"
        );
    }

    #[test]
    fn test_cpg_latin1_maps_to_windows_1252() {
        assert_eq!(
            encoding_from_cpg(b"ISO-8859-1").unwrap().name(),
            "windows-1252"
        );
    }

    #[test]
    fn test_cpg_unknown_falls_through() {
        assert!(encoding_from_cpg(b"KLINGON-7").is_none());
    }

    #[test]
    fn test_ldid_default() {
        assert_eq!(encoding_from_ldid(0x00).name(), "windows-1252");
        assert_eq!(encoding_from_ldid(0x13).name(), "Shift_JIS");
    }
}
