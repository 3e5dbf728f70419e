//! Parsers des fichiers composants d'un shapefile

pub mod cpg;
pub mod dbf;
pub mod shp;
