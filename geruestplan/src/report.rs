//! Berechnungsbericht mit Warnsammlung
//!
//! Der Bericht sammelt Resultate, Warnungen und Fehler einer Berechnung
//! und entscheidet am Schluss über den Gesamtstatus. Warnungen sind
//! kategorisiert, damit Plausibilitätsprobleme von SUVA-Befunden
//! unterscheidbar bleiben.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use npk114::material::MaterialLine;
use npk114::{Complexity, ContextSource, WidthClass, ZoneType};
use serde::Serialize;

/// Gesamtstatus einer Berechnung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Berechnung ohne Befunde
    Success,
    /// Berechnung abgeschlossen, aber mit Warnungen
    SuccessWithWarnings,
    /// Berechnung abgebrochen
    Failed,
}

/// Kategorie einer Warnung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCategory {
    /// Unplausible oder verworfene Höhenwerte
    HeightPlausibility,
    /// Traufhöhe aus der Gesamthöhe abgeleitet, Nachführung nötig
    HeightRefresh,
    /// SUVA-Zugangsregeln nicht einhaltbar
    SuvaAccess,
    /// Befunde aus der Zonenzerlegung
    Zones,
    /// Eingabedaten (GWR, Polygone, Konfiguration)
    Input,
}

impl WarningCategory {
    fn label(self) -> &'static str {
        match self {
            WarningCategory::HeightPlausibility => "Hoehenplausibilitaet",
            WarningCategory::HeightRefresh => "Hoehennachfuehrung",
            WarningCategory::SuvaAccess => "SUVA-Zugaenge",
            WarningCategory::Zones => "Zonen",
            WarningCategory::Input => "Eingabedaten",
        }
    }
}

/// Warnung mit Kategorie
#[derive(Debug, Clone, Serialize)]
pub struct ReportWarning {
    pub category: WarningCategory,
    pub message: String,
}

/// Ausmasszeile einer Zone
#[derive(Debug, Clone, Serialize)]
pub struct ZoneRow {
    pub zone_id: String,
    pub name: String,
    pub zone_type: ZoneType,
    /// True wenn die Zone eingerüstet wird
    pub scaffolded: bool,
    pub facade_area_m2: f64,
    pub total_area_m2: f64,
}

/// Vollständiger Berechnungsbericht eines Gebäudes
#[derive(Debug, Clone, Serialize)]
pub struct ScaffoldReport {
    /// Eidgenössischer Gebäudeidentifikator
    pub egid: String,
    /// Gebäudeadresse, falls bekannt
    pub address: Option<String>,
    /// Dauer der Berechnung
    pub duration_secs: f64,
    /// Gesamtstatus
    pub status: ReportStatus,

    /// Strukturelle Komplexität des Gebäudes
    pub complexity: Option<Complexity>,
    /// Herkunft des Gebäudekontexts
    pub context_source: Option<ContextSource>,
    /// Verwendete Breitenklasse
    pub width_class: Option<WidthClass>,
    /// Massgebende Höhe und ihre Herkunft
    pub active_height_m: Option<f64>,
    pub active_height_source: Option<String>,

    /// Kantonskürzel aus dem GWR
    pub gdekt: Option<String>,
    /// Gebäudekategorie aus dem GWR (GKAT)
    pub gkat: Option<u16>,
    /// Gebäudeklasse aus dem GWR (GKLAS)
    pub gklas: Option<u16>,
    /// Baujahr aus dem GWR (GBAUJ)
    pub gbauj: Option<u16>,

    /// Ausmass pro Zone
    pub zones: Vec<ZoneRow>,
    /// Fassadenfläche über alle eingerüsteten Zonen, in m²
    pub facade_area_m2: f64,
    /// Eckzuschlag, in m²
    pub corner_surcharge_m2: f64,
    /// Gesamtausmass, in m²
    pub total_area_m2: f64,

    /// Anzahl geplanter Gerüstzugänge
    pub access_points: usize,
    /// True wenn die Zugangsplanung die SUVA-Regeln einhält
    pub suva_compliant: Option<bool>,

    /// Materialbedarf, falls gerechnet
    pub material: Vec<MaterialLine>,
    /// Gesamtgewicht des Materials, in kg
    pub material_weight_kg: Option<f64>,

    /// Warnungen nach Kategorie
    pub warnings: Vec<ReportWarning>,
    /// Fehler, die die Berechnung abgebrochen haben
    pub errors: Vec<String>,
}

impl ScaffoldReport {
    pub fn new(egid: impl Into<String>) -> Self {
        Self {
            egid: egid.into(),
            address: None,
            duration_secs: 0.0,
            status: ReportStatus::Success,
            complexity: None,
            context_source: None,
            width_class: None,
            active_height_m: None,
            active_height_source: None,
            gdekt: None,
            gkat: None,
            gklas: None,
            gbauj: None,
            zones: Vec::new(),
            facade_area_m2: 0.0,
            corner_surcharge_m2: 0.0,
            total_area_m2: 0.0,
            access_points: 0,
            suva_compliant: None,
            material: Vec::new(),
            material_weight_kg: None,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn record_warning(&mut self, category: WarningCategory, message: impl Into<String>) {
        self.warnings.push(ReportWarning {
            category,
            message: message.into(),
        });
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn record_zone(&mut self, row: ZoneRow) {
        self.zones.push(row);
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Anzahl Warnungen einer Kategorie
    pub fn warning_count(&self, category: WarningCategory) -> usize {
        self.warnings.iter().filter(|w| w.category == category).count()
    }

    /// Bestimmt den Gesamtstatus aus Fehlern und Warnungen
    pub fn finalize(&mut self) {
        self.status = if !self.errors.is_empty() {
            ReportStatus::Failed
        } else if !self.warnings.is_empty() {
            ReportStatus::SuccessWithWarnings
        } else {
            ReportStatus::Success
        };
    }

    /// Gibt den Bericht auf der Konsole aus
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("GERUEST-AUSMASS - EGID {}", self.egid);
        if let Some(address) = &self.address {
            println!("{address}");
        }
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        if let Some(complexity) = self.complexity {
            println!("Complexity: {complexity}");
        }
        if let Some(source) = self.context_source {
            println!("Context: {source}");
        }
        if let (Some(height), Some(source)) = (self.active_height_m, &self.active_height_source) {
            println!("Height: {height:.2} m ({source})");
        }
        let mut gwr = Vec::new();
        if let Some(gkat) = self.gkat {
            gwr.push(format!("GKAT {gkat}"));
        }
        if let Some(gklas) = self.gklas {
            gwr.push(format!("GKLAS {gklas}"));
        }
        if let Some(gbauj) = self.gbauj {
            gwr.push(format!("built {gbauj}"));
        }
        if let Some(gdekt) = &self.gdekt {
            gwr.push(gdekt.clone());
        }
        if !gwr.is_empty() {
            println!("GWR: {}", gwr.join(", "));
        }

        println!("\n--- AUSMASS ---");
        if let Some(width_class) = self.width_class {
            println!("Width class: {width_class}");
        }
        for zone in &self.zones {
            let marker = if zone.scaffolded { "" } else { " (not scaffolded)" };
            println!(
                "  {} [{}]: {:.2} m2 facade, {:.2} m2 total{}",
                zone.name, zone.zone_type, zone.facade_area_m2, zone.total_area_m2, marker
            );
        }
        println!("Facade area: {:.2} m2", self.facade_area_m2);
        println!("Corner surcharge: {:.2} m2", self.corner_surcharge_m2);
        println!("Total: {:.2} m2", self.total_area_m2);

        println!("\n--- ACCESS ---");
        println!("Access points: {}", self.access_points);
        match self.suva_compliant {
            Some(true) => println!("SUVA: compliant"),
            Some(false) => println!("SUVA: NOT compliant"),
            None => println!("SUVA: not planned"),
        }

        if !self.material.is_empty() {
            println!("\n--- MATERIAL ---");
            for line in &self.material {
                match line.weight_kg {
                    Some(weight) => println!(
                        "  {:4} x {} ({:.0} kg)",
                        line.quantity, line.article, weight
                    ),
                    None => println!("  {:4} x {}", line.quantity, line.article),
                }
            }
            if let Some(weight) = self.material_weight_kg {
                println!("Total weight: {weight:.0} kg");
            }
        }

        if !self.warnings.is_empty() {
            println!("\n--- WARNINGS ({}) ---", self.warnings.len());
            for w in self.warnings.iter().take(10) {
                println!("  [{}] {}", w.category.label(), w.message);
            }
            if self.warnings.len() > 10 {
                println!("  ... and {} more", self.warnings.len() - 10);
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in &self.errors {
                println!("  {e}");
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Speichert den Bericht als JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Einzeiler für Stapelläufe
    pub fn summary(&self) -> String {
        format!(
            "EGID {}: {:.2} m2, {} zones, {} access points, {} warnings",
            self.egid,
            self.total_area_m2,
            self.zones.len(),
            self.access_points,
            self.warnings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_success() {
        let report = ScaffoldReport::new("190325798");
        assert_eq!(report.status, ReportStatus::Success);
        assert!(report.zones.is_empty());
    }

    #[test]
    fn test_finalize_with_warnings() {
        let mut report = ScaffoldReport::new("42");
        report.record_warning(WarningCategory::SuvaAccess, "largest gap exceeds 100 m");
        report.finalize();
        assert_eq!(report.status, ReportStatus::SuccessWithWarnings);
    }

    #[test]
    fn test_finalize_with_errors() {
        let mut report = ScaffoldReport::new("42");
        report.record_warning(WarningCategory::Zones, "zone without facades");
        report.record_error("no footprint for EGID 42");
        report.finalize();
        assert_eq!(report.status, ReportStatus::Failed);
    }

    #[test]
    fn test_warning_count_by_category() {
        let mut report = ScaffoldReport::new("42");
        report.record_warning(WarningCategory::HeightPlausibility, "a");
        report.record_warning(WarningCategory::HeightPlausibility, "b");
        report.record_warning(WarningCategory::Zones, "c");
        assert_eq!(report.warning_count(WarningCategory::HeightPlausibility), 2);
        assert_eq!(report.warning_count(WarningCategory::SuvaAccess), 0);
    }

    #[test]
    fn test_summary() {
        let mut report = ScaffoldReport::new("190325798");
        report.total_area_m2 = 622.5;
        report.access_points = 2;
        let summary = report.summary();
        assert!(summary.contains("190325798"));
        assert!(summary.contains("622.50 m2"));
        assert!(summary.contains("2 access points"));
    }

    #[test]
    fn test_save_to_file() {
        let mut report = ScaffoldReport::new("42");
        report.record_zone(ZoneRow {
            zone_id: "hauptgebaeude".to_string(),
            name: "Hauptgebäude".to_string(),
            zone_type: ZoneType::Hauptgebaeude,
            scaffolded: true,
            facade_area_m2: 589.0,
            total_area_m2: 622.5,
        });
        report.finalize();

        let path = std::env::temp_dir().join("test_geruest_bericht.json");
        report.save_to_file(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"egid\": \"42\""));
        assert!(content.contains("hauptgebaeude"));
        std::fs::remove_file(path).ok();
    }
}
