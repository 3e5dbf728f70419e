//! Systèmes de coordonnées : descripteur, registre EPSG, fichiers .prj
//!
//! Un `.prj` ESRI ne porte pas toujours de nœud AUTHORITY ; la détection
//! passe alors par le nom du PROJCS/GEOGCS, comparé à un registre de
//! systèmes connus (plus l'arithmétique des zones UTM WGS84). Quand rien
//! ne matche, le CRS est explicitement inconnu, jamais un défaut.

use memchr::memmem;

/// Descripteur de système de coordonnées
///
/// Deux descripteurs sont compatibles uniquement si leurs codes EPSG sont
/// tous deux connus et égaux ; un code absent rend la comparaison indéfinie.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Crs {
    /// Code EPSG, si identifié
    pub epsg: Option<u32>,

    /// Nom lisible (du registre ou du .prj source)
    pub name: Option<String>,

    /// WKT de projection (du registre ou texte .prj d'origine)
    pub wkt: Option<String>,
}

impl Crs {
    /// CRS explicitement inconnu
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Construit un descripteur depuis un code EPSG
    ///
    /// Le nom et le WKT sont remplis si le code est dans le registre
    /// (ou est une zone UTM WGS84) ; sinon seuls le code est porté.
    pub fn from_epsg(epsg: u32) -> Self {
        if let Some((name, wkt)) = registry_lookup(epsg) {
            Self {
                epsg: Some(epsg),
                name: Some(name),
                wkt: Some(wkt),
            }
        } else {
            Self {
                epsg: Some(epsg),
                name: None,
                wkt: None,
            }
        }
    }

    pub fn is_known(&self) -> bool {
        self.epsg.is_some()
    }

    /// Compatibilité : `None` si l'un des deux codes est inconnu
    pub fn matches(&self, other: &Crs) -> Option<bool> {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => Some(a == b),
            _ => None,
        }
    }

    /// Description courte pour les rapports ("EPSG:4326 - WGS 84")
    pub fn describe(&self) -> String {
        match (self.epsg, self.name.as_deref()) {
            (Some(code), Some(name)) => format!("EPSG:{} - {}", code, name),
            (Some(code), None) => format!("EPSG:{}", code),
            (None, Some(name)) => format!("unknown CRS ({})", name),
            (None, None) => "unknown CRS".to_string(),
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Registre des systèmes courants : (EPSG, nom, alias normalisés, WKT ESRI)
///
/// Les alias couvrent les formes ESRI ("GCS_WGS_1984") et OGC ("WGS 84").
const WELL_KNOWN: &[(u32, &str, &[&str], &str)] = &[
    (
        4326,
        "WGS 84",
        &["GCSWGS1984", "WGS84", "WGS1984"],
        r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#,
    ),
    (
        3857,
        "WGS 84 / Pseudo-Mercator",
        &[
            "WGS1984WEBMERCATORAUXILIARYSPHERE",
            "WGS84PSEUDOMERCATOR",
            "WEBMERCATOR",
        ],
        r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Mercator_Auxiliary_Sphere"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],PARAMETER["Standard_Parallel_1",0.0],PARAMETER["Auxiliary_Sphere_Type",0.0],UNIT["Meter",1.0]]"#,
    ),
    (
        4269,
        "NAD83",
        &["GCSNORTHAMERICAN1983", "NAD83"],
        r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#,
    ),
    (
        27700,
        "OSGB36 / British National Grid",
        &["BRITISHNATIONALGRID", "OSGB1936BRITISHNATIONALGRID"],
        r#"PROJCS["British_National_Grid",GEOGCS["GCS_OSGB_1936",DATUM["D_OSGB_1936",SPHEROID["Airy_1830",6377563.396,299.3249646]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",400000.0],PARAMETER["False_Northing",-100000.0],PARAMETER["Central_Meridian",-2.0],PARAMETER["Scale_Factor",0.9996012717],PARAMETER["Latitude_Of_Origin",49.0],UNIT["Meter",1.0]]"#,
    ),
    (
        2154,
        "RGF93 / Lambert-93",
        &["RGF1993LAMBERT93", "RGF93LAMBERT93", "LAMBERT93"],
        r#"PROJCS["RGF_1993_Lambert_93",GEOGCS["GCS_RGF_1993",DATUM["D_RGF_1993",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Lambert_Conformal_Conic"],PARAMETER["False_Easting",700000.0],PARAMETER["False_Northing",6600000.0],PARAMETER["Central_Meridian",3.0],PARAMETER["Standard_Parallel_1",44.0],PARAMETER["Standard_Parallel_2",49.0],PARAMETER["Latitude_Of_Origin",46.5],UNIT["Meter",1.0]]"#,
    ),
    (
        25832,
        "ETRS89 / UTM zone 32N",
        &["ETRS1989UTMZONE32N", "ETRS89UTMZONE32N"],
        r#"PROJCS["ETRS_1989_UTM_Zone_32N",GEOGCS["GCS_ETRS_1989",DATUM["D_ETRS_1989",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",9.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#,
    ),
    (
        3035,
        "ETRS89-extended / LAEA Europe",
        &["ETRS1989LAEA", "ETRS89LAEAEUROPE"],
        r#"PROJCS["ETRS_1989_LAEA",GEOGCS["GCS_ETRS_1989",DATUM["D_ETRS_1989",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Lambert_Azimuthal_Equal_Area"],PARAMETER["False_Easting",4321000.0],PARAMETER["False_Northing",3210000.0],PARAMETER["Central_Meridian",10.0],PARAMETER["Latitude_Of_Origin",52.0],UNIT["Meter",1.0]]"#,
    ),
    (
        3395,
        "WGS 84 / World Mercator",
        &["WORLDMERCATOR", "WGS1984WORLDMERCATOR"],
        r#"PROJCS["World_Mercator",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Mercator"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],PARAMETER["Standard_Parallel_1",0.0],UNIT["Meter",1.0]]"#,
    ),
];

/// Nom et WKT pour un code EPSG connu (registre ou zone UTM WGS84)
pub fn registry_lookup(epsg: u32) -> Option<(String, String)> {
    for &(code, name, _, wkt) in WELL_KNOWN {
        if code == epsg {
            return Some((name.to_string(), wkt.to_string()));
        }
    }
    if let Some((zone, south)) = utm_zone_for_epsg(epsg) {
        return Some((utm_name(zone, south), utm_wkt(zone, south)));
    }
    None
}

/// Décompose un code de zone UTM WGS84 (32601-32660 nord, 32701-32760 sud)
pub fn utm_zone_for_epsg(epsg: u32) -> Option<(u32, bool)> {
    match epsg {
        32601..=32660 => Some((epsg - 32600, false)),
        32701..=32760 => Some((epsg - 32700, true)),
        _ => None,
    }
}

/// Code EPSG d'une zone UTM WGS84
pub fn utm_epsg(zone: u32, south: bool) -> u32 {
    if south {
        32700 + zone
    } else {
        32600 + zone
    }
}

fn utm_name(zone: u32, south: bool) -> String {
    format!(
        "WGS 84 / UTM zone {}{}",
        zone,
        if south { "S" } else { "N" }
    )
}

fn utm_wkt(zone: u32, south: bool) -> String {
    let central_meridian = zone as f64 * 6.0 - 183.0;
    let false_northing = if south { 10000000.0 } else { 0.0 };
    format!(
        r#"PROJCS["WGS_1984_UTM_Zone_{z}{h}",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",{fnorth:.1}],PARAMETER["Central_Meridian",{cm:.1}],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#,
        z = zone,
        h = if south { "S" } else { "N" },
        fnorth = false_northing,
        cm = central_meridian,
    )
}

/// Interprète le contenu d'un fichier .prj
///
/// Ordre de résolution : nœud AUTHORITY (le plus externe, donc le dernier
/// du texte), puis nom du PROJCS/GEOGCS contre le registre, puis zone UTM
/// WGS84 dans le nom. À défaut, CRS inconnu portant le texte d'origine.
pub fn parse_prj(content: &str) -> Crs {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Crs::unknown();
    }

    if let Some(epsg) = authority_epsg(trimmed.as_bytes()) {
        let mut crs = Crs::from_epsg(epsg);
        if crs.name.is_none() {
            crs.name = extract_crs_name(trimmed);
        }
        if crs.wkt.is_none() {
            crs.wkt = Some(trimmed.to_string());
        }
        return crs;
    }

    let name = extract_crs_name(trimmed);

    if let Some(ref n) = name {
        let normalized = normalize_name(n);

        for &(code, canonical, aliases, _) in WELL_KNOWN {
            if aliases.iter().any(|a| *a == normalized) {
                let mut crs = Crs::from_epsg(code);
                crs.name = Some(canonical.to_string());
                // Garder le texte source, fidèle au fichier d'entrée
                crs.wkt = Some(trimmed.to_string());
                return crs;
            }
        }

        // Zones UTM WGS84 ("WGS_1984_UTM_Zone_43N")
        if normalized.contains("WGS84") || normalized.contains("WGS1984") {
            if let Some((zone, south)) = parse_utm_zone_name(&normalized) {
                let mut crs = Crs::from_epsg(utm_epsg(zone, south));
                crs.wkt = Some(trimmed.to_string());
                return crs;
            }
        }
    }

    Crs {
        epsg: None,
        name,
        wkt: Some(trimmed.to_string()),
    }
}

/// Code EPSG du dernier nœud AUTHORITY["EPSG","NNNN"] du WKT
fn authority_epsg(data: &[u8]) -> Option<u32> {
    let finder = memmem::Finder::new(b"AUTHORITY[");
    let mut last = None;

    for pos in finder.find_iter(data) {
        let rest = &data[pos..];
        let text = std::str::from_utf8(rest).ok()?;
        // AUTHORITY["EPSG","4326"]
        let inner = text.split(']').next()?;
        let mut quoted = inner.split('"').skip(1).step_by(2);
        let agency = quoted.next()?;
        let code = quoted.next()?;
        if agency.eq_ignore_ascii_case("EPSG") {
            if let Ok(code) = code.parse::<u32>() {
                last = Some(code);
            }
        }
    }

    last
}

/// Premier nom entre guillemets après PROJCS[ ou GEOGCS[
fn extract_crs_name(content: &str) -> Option<String> {
    let start = content
        .find("PROJCS[")
        .or_else(|| content.find("GEOGCS["))?;
    let rest = &content[start..];
    let open = rest.find('"')? + 1;
    let close = rest[open..].find('"')? + open;
    Some(rest[open..close].to_string())
}

/// Normalise un nom de CRS : majuscules, alphanumérique uniquement
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Extrait "UTMZONE43N" d'un nom normalisé
fn parse_utm_zone_name(normalized: &str) -> Option<(u32, bool)> {
    let pos = normalized.find("UTMZONE")?;
    let rest = &normalized[pos + 7..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let zone: u32 = digits.parse().ok()?;
    if !(1..=60).contains(&zone) {
        return None;
    }
    match rest[digits.len()..].chars().next() {
        Some('N') => Some((zone, false)),
        Some('S') => Some((zone, true)),
        _ => None,
    }
}

/// Contenu .prj pour un code EPSG, si le registre le connaît
pub fn prj_for_epsg(epsg: u32) -> Option<String> {
    registry_lookup(epsg).map(|(_, wkt)| wkt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prj_esri_wgs84() {
        let wkt = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
        let crs = parse_prj(wkt);
        assert_eq!(crs.epsg, Some(4326));
        assert_eq!(crs.name.as_deref(), Some("WGS 84"));
    }

    #[test]
    fn test_parse_prj_with_authority() {
        // WKT OGC avec AUTHORITY : le nœud le plus externe est le dernier
        let wkt = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]"#;
        let crs = parse_prj(wkt);
        assert_eq!(crs.epsg, Some(4326));
    }

    #[test]
    fn test_parse_prj_utm_zone_name() {
        let wkt = r#"PROJCS["WGS_1984_UTM_Zone_43N",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["Central_Meridian",75.0],UNIT["Meter",1.0]]"#;
        let crs = parse_prj(wkt);
        assert_eq!(crs.epsg, Some(32643));
    }

    #[test]
    fn test_parse_prj_unknown_keeps_name_and_text() {
        let wkt = r#"PROJCS["Some_Local_Grid",GEOGCS["GCS_Unknown",DATUM["D_Unknown",SPHEROID["Sphere",6370997.0,0.0]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Sinusoidal"],UNIT["Meter",1.0]]"#;
        let crs = parse_prj(wkt);
        assert_eq!(crs.epsg, None);
        assert_eq!(crs.name.as_deref(), Some("Some_Local_Grid"));
        assert!(crs.wkt.is_some());
        assert!(!crs.is_known());
    }

    #[test]
    fn test_parse_prj_empty() {
        assert_eq!(parse_prj("  \r\n"), Crs::unknown());
    }

    #[test]
    fn test_utm_epsg_roundtrip() {
        assert_eq!(utm_zone_for_epsg(32643), Some((43, false)));
        assert_eq!(utm_zone_for_epsg(32733), Some((33, true)));
        assert_eq!(utm_zone_for_epsg(4326), None);
        assert_eq!(utm_epsg(43, false), 32643);
    }

    #[test]
    fn test_registry_utm_wkt() {
        let (name, wkt) = registry_lookup(32643).unwrap();
        assert_eq!(name, "WGS 84 / UTM zone 43N");
        assert!(wkt.contains(r#"PARAMETER["Central_Meridian",75.0]"#));
        assert!(wkt.contains("WGS_1984_UTM_Zone_43N"));
    }

    #[test]
    fn test_matches_requires_both_codes() {
        let a = Crs::from_epsg(4326);
        let b = Crs::from_epsg(4326);
        let c = Crs::from_epsg(3857);
        let u = Crs::unknown();
        assert_eq!(a.matches(&b), Some(true));
        assert_eq!(a.matches(&c), Some(false));
        assert_eq!(a.matches(&u), None);
        assert_eq!(u.matches(&u), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(Crs::from_epsg(4326).describe(), "EPSG:4326 - WGS 84");
        assert_eq!(Crs::unknown().describe(), "unknown CRS");
    }
}
