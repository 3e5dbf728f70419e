//! Suppression des géométries exactement dupliquées
//!
//! L'identité est un hash blake3 des coordonnées, normalisé pour que les
//! anneaux de polygones démarrant à un vertex différent donnent le même
//! hash. Pas de tolérance spatiale : deux géométries sont dupliquées si
//! leurs coordonnées coïncident exactement.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use blake3::Hasher;
use geo::{Coord, Geometry, LineString};
use shpio::Dataset;
use tracing::debug;

use crate::ops::OpError;
use crate::report::{OperationReport, ReportEntry};

/// Occurrence conservée pour chaque groupe de doublons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupKeep {
    /// Garder la première occurrence (et ses attributs)
    First,
    /// Garder la dernière occurrence
    Last,
}

impl DedupKeep {
    /// Interprète l'argument CLI
    pub fn from_arg(arg: &str) -> Result<Self, String> {
        match arg.to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Err(format!("expected 'first' or 'last', got {:?}", other)),
        }
    }
}

/// Supprime les features dont la géométrie est un doublon exact
pub fn dedup(
    dataset: Dataset,
    keep: DedupKeep,
) -> Result<(Dataset, OperationReport), OpError> {
    if dataset.is_empty() {
        return Err(OpError::EmptyInput(format!(
            "dataset '{}' has no features",
            dataset.name
        )));
    }

    let started = Instant::now();
    let total = dataset.feature_count();

    let hashes: Vec<[u8; 32]> = dataset
        .features
        .iter()
        .map(|f| geometry_hash(&f.geometry))
        .collect();

    // Indices retenus, dans l'ordre d'origine
    let retained: HashSet<usize> = match keep {
        DedupKeep::First => {
            let mut seen = HashSet::new();
            hashes
                .iter()
                .enumerate()
                .filter(|(_, h)| seen.insert(**h))
                .map(|(i, _)| i)
                .collect()
        }
        DedupKeep::Last => {
            let mut last_index: HashMap<[u8; 32], usize> = HashMap::new();
            for (i, h) in hashes.iter().enumerate() {
                last_index.insert(*h, i);
            }
            last_index.into_values().collect()
        }
    };

    let mut dataset = dataset;
    let mut index = 0;
    dataset.features.retain(|_| {
        let kept = retained.contains(&index);
        if !kept {
            debug!(record = index + 1, "duplicate geometry removed");
        }
        index += 1;
        kept
    });

    let remaining = dataset.feature_count();
    let removed = total - remaining;

    let mut report = OperationReport::new("dedup");
    report.record_source(&dataset.name, total, remaining);
    report.features_out = remaining;
    report.output_crs = Some(dataset.crs.describe());
    report.record(ReportEntry::info(format!(
        "{} exact duplicate features removed, {} remaining",
        removed, remaining
    )));
    report.set_duration(started.elapsed());
    report.finalize();

    Ok((dataset, report))
}

/// Calcule un hash stable d'une géométrie
///
/// Les anneaux de polygones sont normalisés pour commencer au vertex
/// lexicographiquement le plus petit (min x, puis min y).
pub fn geometry_hash(geom: &Geometry) -> [u8; 32] {
    let mut hasher = Hasher::new();

    match geom {
        Geometry::Point(p) => {
            hasher.update(b"POINT");
            hash_coord(&mut hasher, p.0);
        }
        Geometry::MultiPoint(mp) => {
            hasher.update(b"MULTIPOINT");
            for point in mp.0.iter() {
                hash_coord(&mut hasher, point.0);
            }
        }
        Geometry::LineString(ls) => {
            hasher.update(b"LINESTRING");
            for coord in ls.0.iter() {
                hash_coord(&mut hasher, *coord);
            }
        }
        Geometry::MultiLineString(mls) => {
            hasher.update(b"MULTILINESTRING");
            for ls in mls.0.iter() {
                hasher.update(b"LS");
                for coord in ls.0.iter() {
                    hash_coord(&mut hasher, *coord);
                }
            }
        }
        Geometry::Polygon(p) => {
            hasher.update(b"POLYGON");
            hash_polygon(&mut hasher, p);
        }
        Geometry::MultiPolygon(mp) => {
            hasher.update(b"MULTIPOLYGON");
            for poly in mp.0.iter() {
                hasher.update(b"POLY");
                hash_polygon(&mut hasher, poly);
            }
        }
        _ => {
            hasher.update(format!("{:?}", geom).as_bytes());
        }
    }

    *hasher.finalize().as_bytes()
}

fn hash_polygon(hasher: &mut Hasher, polygon: &geo::Polygon) {
    hasher.update(b"EXT");
    hash_ring_normalized(hasher, polygon.exterior());
    for interior in polygon.interiors() {
        hasher.update(b"INT");
        hash_ring_normalized(hasher, interior);
    }
}

/// Hash un anneau en le faisant démarrer au vertex lexicographiquement
/// le plus petit (le dernier point d'un anneau fermé est ignoré)
fn hash_ring_normalized(hasher: &mut Hasher, ring: &LineString) {
    let coords = &ring.0;
    if coords.is_empty() {
        return;
    }

    let len = if coords.len() > 1 && coords.first() == coords.last() {
        coords.len() - 1
    } else {
        coords.len()
    };
    if len == 0 {
        return;
    }

    let min_idx = (0..len)
        .min_by(|&a, &b| {
            (coords[a].x, coords[a].y)
                .partial_cmp(&(coords[b].x, coords[b].y))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);

    for i in 0..len {
        hash_coord(hasher, coords[(min_idx + i) % len]);
    }
}

fn hash_coord(hasher: &mut Hasher, coord: Coord) {
    hasher.update(&coord.x.to_le_bytes());
    hasher.update(&coord.y.to_le_bytes());
}
