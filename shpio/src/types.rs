//! Types de données pour le crate shpio

use geo::Geometry;

use crate::crs::Crs;
use crate::ShpError;

/// Type de forme d'un fichier .shp (codes du format ESRI)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    NullShape,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
}

impl ShapeType {
    /// Décode le code numérique du header .shp
    pub fn from_code(code: i32) -> Result<Self, ShpError> {
        Ok(match code {
            0 => Self::NullShape,
            1 => Self::Point,
            3 => Self::PolyLine,
            5 => Self::Polygon,
            8 => Self::MultiPoint,
            11 => Self::PointZ,
            13 => Self::PolyLineZ,
            15 => Self::PolygonZ,
            18 => Self::MultiPointZ,
            21 => Self::PointM,
            23 => Self::PolyLineM,
            25 => Self::PolygonM,
            28 => Self::MultiPointM,
            other => return Err(ShpError::UnsupportedShapeType(other)),
        })
    }

    /// Code numérique du format ESRI
    pub fn code(self) -> i32 {
        match self {
            Self::NullShape => 0,
            Self::Point => 1,
            Self::PolyLine => 3,
            Self::Polygon => 5,
            Self::MultiPoint => 8,
            Self::PointZ => 11,
            Self::PolyLineZ => 13,
            Self::PolygonZ => 15,
            Self::MultiPointZ => 18,
            Self::PointM => 21,
            Self::PolyLineM => 23,
            Self::PolygonM => 25,
            Self::MultiPointM => 28,
        }
    }

    /// Classe géométrique (les variantes Z/M se rangent avec leur type de base)
    pub fn class(self) -> GeomClass {
        match self {
            Self::Point
            | Self::MultiPoint
            | Self::PointZ
            | Self::MultiPointZ
            | Self::PointM
            | Self::MultiPointM => GeomClass::Point,
            Self::PolyLine | Self::PolyLineZ | Self::PolyLineM => GeomClass::Line,
            Self::Polygon | Self::PolygonZ | Self::PolygonM => GeomClass::Polygon,
            Self::NullShape => GeomClass::Point,
        }
    }

    /// Le type porte-t-il des coordonnées Z (ignorées au parsing, données 2D)
    pub fn has_z(self) -> bool {
        matches!(
            self,
            Self::PointZ | Self::PolyLineZ | Self::PolygonZ | Self::MultiPointZ
        )
    }
}

/// Classe géométrique d'un dataset, utilisée pour la compatibilité fusion/ajout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomClass {
    Point,
    Line,
    Polygon,
}

impl GeomClass {
    pub fn label(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Polygon => "polygon",
        }
    }
}

/// Type sémantique d'une colonne attributaire
///
/// Tag fermé résolu une seule fois à la construction du dataset,
/// depuis le descripteur de champ DBF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Real,
    Boolean,
    Date,
    Unknown,
}

impl FieldType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Unknown => "unknown",
        }
    }
}

/// Colonne d'un schéma attributaire
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Nom de la colonne (10 caractères max dans un DBF)
    pub name: String,

    /// Type sémantique
    pub ftype: FieldType,

    /// Largeur DBF en octets
    pub length: u8,

    /// Nombre de décimales (champs numériques)
    pub decimals: u8,
}

impl Field {
    /// Crée un champ avec des largeurs DBF par défaut pour son type
    pub fn new(name: impl Into<String>, ftype: FieldType) -> Self {
        let (length, decimals) = match ftype {
            FieldType::Text | FieldType::Unknown => (80, 0),
            FieldType::Integer => (18, 0),
            FieldType::Real => (18, 6),
            FieldType::Boolean => (1, 0),
            FieldType::Date => (8, 0),
        };
        Self {
            name: name.into(),
            ftype,
            length,
            decimals,
        }
    }
}

/// Schéma attributaire ordonné d'un dataset
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema(pub Vec<Field>);

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Noms de colonnes, dans l'ordre du schéma
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|f| f.name.as_str()).collect()
    }

    /// Index d'une colonne par nom (sensible à la casse, comme le DBF)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|f| f.name == name)
    }
}

/// Valeur attributaire typée
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    /// Date ISO "YYYY-MM-DD"
    Date(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Représentation textuelle pour l'export délimité
    ///
    /// Null devient une chaîne vide, les réels gardent la forme la plus
    /// courte de f64 (pas de zéros de remplissage).
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Real(r) => r.to_string(),
            Self::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            Self::Date(d) => d.clone(),
            Self::Null => String::new(),
        }
    }

    /// Coercition vers un type cible, si la valeur y est représentable
    ///
    /// Retourne `None` quand la conversion perdrait de l'information
    /// (réel non entier vers integer, texte non numérique vers real, etc.).
    pub fn coerce(&self, target: FieldType) -> Option<Value> {
        match (self, target) {
            (Self::Null, _) => Some(Self::Null),
            (Self::Text(_), FieldType::Text) | (Self::Text(_), FieldType::Unknown) => {
                Some(self.clone())
            }
            (Self::Integer(_), FieldType::Integer) => Some(self.clone()),
            (Self::Real(_), FieldType::Real) => Some(self.clone()),
            (Self::Boolean(_), FieldType::Boolean) => Some(self.clone()),
            (Self::Date(_), FieldType::Date) => Some(self.clone()),

            // Élargissements sans perte
            (Self::Integer(i), FieldType::Real) => Some(Self::Real(*i as f64)),
            (Self::Real(r), FieldType::Integer) => {
                if r.fract() == 0.0 && r.abs() < i64::MAX as f64 {
                    Some(Self::Integer(*r as i64))
                } else {
                    None
                }
            }

            // Tout se représente en texte
            (_, FieldType::Text) | (_, FieldType::Unknown) => Some(Self::Text(self.to_text())),

            // Texte vers types stricts : parse
            (Self::Text(s), FieldType::Integer) => s.trim().parse().ok().map(Self::Integer),
            (Self::Text(s), FieldType::Real) => {
                fast_float::parse(s.trim()).ok().map(Self::Real)
            }
            (Self::Text(s), FieldType::Boolean) => match s.trim() {
                "true" | "True" | "T" | "1" => Some(Self::Boolean(true)),
                "false" | "False" | "F" | "0" => Some(Self::Boolean(false)),
                _ => None,
            },
            (Self::Text(s), FieldType::Date) => {
                let t = s.trim();
                if t.len() == 10 && t.as_bytes()[4] == b'-' && t.as_bytes()[7] == b'-' {
                    Some(Self::Date(t.to_string()))
                } else {
                    None
                }
            }

            _ => None,
        }
    }
}

/// Une feature : une géométrie et sa ligne attributaire
///
/// Invariant : `row.len()` égale la taille du schéma du dataset porteur.
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Geometry,
    pub row: Vec<Value>,
}

/// Un dataset vectoriel : features ordonnées, schéma partagé, CRS
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Nom (stem de l'archive source ou nom de sortie)
    pub name: String,

    /// Type de forme déclaré par le .shp source
    pub shape_type: ShapeType,

    /// Système de coordonnées
    pub crs: Crs,

    /// Schéma attributaire
    pub schema: Schema,

    /// Features, dans l'ordre du fichier source
    pub features: Vec<Feature>,
}

impl Dataset {
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Classe géométrique du dataset
    pub fn geom_class(&self) -> GeomClass {
        self.shape_type.class()
    }
}

/// Résultat du parsing d'une archive shapefile
#[derive(Debug)]
pub struct ParseResult {
    /// Dataset construit
    pub dataset: Dataset,

    /// Erreurs non fatales rencontrées pendant le parsing
    /// (shapes null, valeurs indécodables, index .shx incohérent)
    pub errors: Vec<ShpError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_type_codes() {
        assert_eq!(ShapeType::from_code(5).unwrap(), ShapeType::Polygon);
        assert_eq!(ShapeType::Polygon.code(), 5);
        assert_eq!(ShapeType::from_code(15).unwrap(), ShapeType::PolygonZ);
        assert!(ShapeType::from_code(99).is_err());
    }

    #[test]
    fn test_shape_type_class() {
        assert_eq!(ShapeType::MultiPoint.class(), GeomClass::Point);
        assert_eq!(ShapeType::PolyLineZ.class(), GeomClass::Line);
        assert_eq!(ShapeType::PolygonM.class(), GeomClass::Polygon);
    }

    #[test]
    fn test_value_coerce_widening() {
        assert_eq!(
            Value::Integer(7).coerce(FieldType::Real),
            Some(Value::Real(7.0))
        );
        assert_eq!(
            Value::Real(10.0).coerce(FieldType::Integer),
            Some(Value::Integer(10))
        );
        assert_eq!(Value::Real(10.5).coerce(FieldType::Integer), None);
    }

    #[test]
    fn test_value_coerce_text() {
        assert_eq!(
            Value::Integer(42).coerce(FieldType::Text),
            Some(Value::Text("42".to_string()))
        );
        assert_eq!(
            Value::Text("3.5".to_string()).coerce(FieldType::Real),
            Some(Value::Real(3.5))
        );
        assert_eq!(Value::Text("abc".to_string()).coerce(FieldType::Real), None);
    }

    #[test]
    fn test_value_coerce_null_is_universal() {
        for t in [
            FieldType::Text,
            FieldType::Integer,
            FieldType::Real,
            FieldType::Boolean,
            FieldType::Date,
        ] {
            assert_eq!(Value::Null.coerce(t), Some(Value::Null));
        }
    }

    #[test]
    fn test_schema_index_of() {
        let schema = Schema::new(vec![
            Field::new("name", FieldType::Text),
            Field::new("pop", FieldType::Integer),
        ]);
        assert_eq!(schema.index_of("pop"), Some(1));
        assert_eq!(schema.index_of("POP"), None);
        assert_eq!(schema.names(), vec!["name", "pop"]);
    }
}
