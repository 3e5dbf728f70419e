//! Rapport d'opération
//!
//! Chaque opération produit soit un rapport complet, soit une erreur :
//! jamais de rapport partiel. Les conditions non fatales (coercitions de
//! schéma, CRS déjà compatible) s'accumulent en entrées plutôt que
//! d'interrompre le traitement.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Statut global d'une opération
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationStatus {
    /// Opération réussie sans dégradation
    Success,
    /// Opération réussie avec des dégradations signalées
    PartialSuccess,
    /// Opération échouée
    Failed,
}

/// Niveau d'une entrée de rapport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryLevel {
    /// Information (ajustement normal : reprojection, colonne ajoutée)
    Info,
    /// Dégradation non fatale (coercition impossible, valeur nullifiée)
    Warning,
    /// Erreur par élément (feature écartée)
    Error,
}

/// Entrée de rapport avec contexte
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// Niveau
    pub level: EntryLevel,
    /// Dataset source concerné (optionnel)
    pub source: Option<String>,
    /// Colonne concernée (optionnel)
    pub field: Option<String>,
    /// Message
    pub message: String,
}

impl ReportEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: EntryLevel::Info,
            source: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: EntryLevel::Warning,
            source: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: EntryLevel::Error,
            source: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Comptages d'une source
#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    /// Nom du dataset source
    pub name: String,
    /// Features en entrée
    pub features_in: usize,
    /// Features retenues en sortie
    pub features_out: usize,
}

/// Rapport complet d'une opération
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    /// Nom de l'opération ("merge", "reproject", ...)
    pub operation: String,
    /// Durée
    pub duration_secs: f64,
    /// Statut global
    pub status: OperationStatus,

    /// Comptages par source
    pub sources: Vec<SourceStats>,
    /// Features en sortie
    pub features_out: usize,
    /// CRS de sortie, si l'opération en produit un
    pub output_crs: Option<String>,

    /// Ajustements, dégradations et erreurs par élément
    pub entries: Vec<ReportEntry>,
}

impl OperationReport {
    /// Crée un nouveau rapport pour une opération
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            duration_secs: 0.0,
            status: OperationStatus::Success,
            sources: Vec::new(),
            features_out: 0,
            output_crs: None,
            entries: Vec::new(),
        }
    }

    /// Enregistre les comptages d'une source
    pub fn record_source(&mut self, name: &str, features_in: usize, features_out: usize) {
        self.sources.push(SourceStats {
            name: name.to_string(),
            features_in,
            features_out,
        });
    }

    /// Ajoute une entrée
    pub fn record(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    /// Ajoute plusieurs entrées
    pub fn record_all(&mut self, entries: impl IntoIterator<Item = ReportEntry>) {
        self.entries.extend(entries);
    }

    /// Définit la durée
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final depuis les entrées
    pub fn finalize(&mut self) {
        let has_errors = self.entries.iter().any(|e| e.level == EntryLevel::Error);
        let has_warnings = self.entries.iter().any(|e| e.level == EntryLevel::Warning);

        self.status = if has_errors && self.features_out == 0 {
            OperationStatus::Failed
        } else if has_errors || has_warnings {
            OperationStatus::PartialSuccess
        } else {
            OperationStatus::Success
        };
    }

    /// Nombre total de features en entrée
    pub fn features_in(&self) -> usize {
        self.sources.iter().map(|s| s.features_in).sum()
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("REPORT - {}", self.operation);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        for s in &self.sources {
            println!("  {}: {} in, {} out", s.name, s.features_in, s.features_out);
        }
        println!("Output features: {}", self.features_out);
        if let Some(ref crs) = self.output_crs {
            println!("Output CRS: {}", crs);
        }

        let warnings: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.level != EntryLevel::Info)
            .collect();
        let infos: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.level == EntryLevel::Info)
            .collect();

        if !infos.is_empty() {
            println!("\n--- ADJUSTMENTS ({}) ---", infos.len());
            for e in infos.iter().take(20) {
                println!("  {}{}", location_of(e), e.message);
            }
            if infos.len() > 20 {
                println!("  ... and {} more", infos.len() - 20);
            }
        }

        if !warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", warnings.len());
            for e in warnings.iter().take(20) {
                println!("  {:?} {}{}", e.level, location_of(e), e.message);
            }
            if warnings.len() > 20 {
                println!("  ... and {} more", warnings.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Résumé compact sur une ligne
    pub fn summary(&self) -> String {
        format!(
            "{}: {} features in, {} out, {} adjustments, {} warnings",
            self.operation,
            self.features_in(),
            self.features_out,
            self.entries
                .iter()
                .filter(|e| e.level == EntryLevel::Info)
                .count(),
            self.entries
                .iter()
                .filter(|e| e.level != EntryLevel::Info)
                .count(),
        )
    }
}

fn location_of(entry: &ReportEntry) -> String {
    match (&entry.source, &entry.field) {
        (Some(s), Some(f)) => format!("[{}:{}] ", s, f),
        (Some(s), None) => format!("[{}] ", s),
        (None, Some(f)) => format!("[{}] ", f),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_success() {
        let report = OperationReport::new("merge");
        assert_eq!(report.status, OperationStatus::Success);
        assert_eq!(report.features_in(), 0);
    }

    #[test]
    fn test_finalize_with_warnings_is_partial() {
        let mut report = OperationReport::new("merge");
        report.features_out = 10;
        report.record(ReportEntry::warning("type conflict").with_field("area"));
        report.finalize();
        assert_eq!(report.status, OperationStatus::PartialSuccess);
    }

    #[test]
    fn test_finalize_errors_without_output_is_failed() {
        let mut report = OperationReport::new("dedup");
        report.record(ReportEntry::error("all features dropped"));
        report.finalize();
        assert_eq!(report.status, OperationStatus::Failed);
    }

    #[test]
    fn test_finalize_infos_only_is_success() {
        let mut report = OperationReport::new("reconcile");
        report.features_out = 5;
        report.record(ReportEntry::info("already compatible").with_source("a"));
        report.finalize();
        assert_eq!(report.status, OperationStatus::Success);
    }

    #[test]
    fn test_features_in_sums_sources() {
        let mut report = OperationReport::new("merge");
        report.record_source("a", 10, 10);
        report.record_source("b", 7, 7);
        assert_eq!(report.features_in(), 17);
    }

    #[test]
    fn test_summary() {
        let mut report = OperationReport::new("merge");
        report.record_source("a", 3, 3);
        report.features_out = 3;
        report.record(ReportEntry::info("reprojected"));
        let s = report.summary();
        assert!(s.contains("merge"));
        assert!(s.contains("3 features in"));
        assert!(s.contains("1 adjustments"));
    }
}
