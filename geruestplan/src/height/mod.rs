//! Auflösung der Gebäudehöhen über eine feste Prioritätskette
//!
//! Für das Ausmass braucht jede Fassade eine Höhe. Die Kette liefert
//! immer einen Wert:
//!
//! 1. Manuelle Gesamthöhe (wenn > 0)
//! 2. Manuelle First- bzw. Traufhöhe
//! 3. Gemessene Höhe aus der Höhendatenbank (detailliert, dann Altbestand)
//! 4. Schätzung aus Geschosszahl und Gebäudekategorie
//! 5. Standardhöhe pro Kategorie, zuletzt die globale Standardhöhe
//!
//! Gemessene Werte passieren Plausibilitätsprüfungen; unplausible Werte
//! bleiben im Resultat sichtbar, zählen aber nicht für die aktive Höhe.

mod sources;

pub use sources::{DetailedHeights, HeightDatabase, MemoryHeights};

use crate::config::HeightHeuristics;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Herkunft eines Höhenwerts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightOrigin {
    /// Vom Benutzer vorgegeben
    Manual,
    /// Aus einer Höhendatenbank gelesen
    Database { provider: String },
    /// Aus Geschosszahl und Geschosshöhe gerechnet
    CalculatedFromFloors,
    /// Standardhöhe der Gebäudekategorie
    DefaultByCategory,
    /// Globale Standardhöhe
    DefaultStandard,
}

impl HeightOrigin {
    fn database(provider: &str) -> Self {
        Self::Database {
            provider: provider.to_string(),
        }
    }
}

impl fmt::Display for HeightOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Database { provider } => write!(f, "database:{provider}"),
            Self::CalculatedFromFloors => write!(f, "calculated_from_floors"),
            Self::DefaultByCategory => write!(f, "default_by_category"),
            Self::DefaultStandard => write!(f, "default_standard"),
        }
    }
}

/// Eingaben für die Höhenauflösung eines Gebäudes
#[derive(Debug, Clone, Default)]
pub struct HeightQuery {
    pub egid: u64,
    /// Manuelle Gesamthöhe, gewinnt gegen alle anderen Quellen
    pub manual_height_m: Option<f64>,
    pub manual_traufhoehe_m: Option<f64>,
    pub manual_firsthoehe_m: Option<f64>,
    /// Anzahl Geschosse (GASTW aus dem GWR)
    pub floors: Option<u16>,
    /// Gebäudeklasse (GKLAS aus dem GWR)
    pub gklas: Option<u16>,
}

/// Vollständig aufgelöste Höheninformation
///
/// `active_height_m` ist nie null; der schlechteste Fall ist die
/// globale Standardhöhe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightInfo {
    /// Schätzung aus Geschossen oder Kategoriestandard, immer vorhanden
    pub estimated_height_m: f64,
    pub estimated_source: HeightOrigin,

    /// Bester gemessener Wert, auch wenn er unplausibel ist
    pub measured_height_m: Option<f64>,
    pub measured_source: Option<HeightOrigin>,

    /// Aufgelöste Einzelhöhen nach allen Prüfungen und Übersteuerungen
    pub traufhoehe_m: Option<f64>,
    pub firsthoehe_m: Option<f64>,
    pub gebaeudehoehe_m: Option<f64>,

    /// Für die Berechnung massgebende Höhe
    pub active_height_m: f64,
    pub active_source: HeightOrigin,

    /// True wenn eine manuelle Vorgabe die aktive Höhe bestimmt
    pub manual_override: bool,
    /// True wenn die Traufhöhe aus der Gesamthöhe abgeleitet wurde
    pub needs_height_refresh: bool,
    /// True wenn eine Messung an einer Plausibilitätsprüfung scheiterte
    pub height_data_implausible: bool,

    /// Begründungen für Verwerfungen, für den Bericht
    pub warnings: Vec<String>,
}

/// Löst Gebäudehöhen gegen eine Datenbank und die Heuristiktabellen auf
#[derive(Debug)]
pub struct HeightResolver {
    db: HeightDatabase,
    heuristics: HeightHeuristics,
}

impl HeightResolver {
    pub fn new(db: HeightDatabase, heuristics: HeightHeuristics) -> Self {
        Self { db, heuristics }
    }

    /// Resolver ohne Datenbank, nur Heuristiken
    pub fn offline(heuristics: HeightHeuristics) -> Self {
        Self::new(HeightDatabase::None, heuristics)
    }

    /// Löst die Höhen für ein Gebäude auf. Schlägt nie fehl.
    pub fn resolve(&self, query: &HeightQuery) -> HeightInfo {
        let mut warnings = Vec::new();

        let (estimated_height_m, estimated_source) = self.estimate(query);

        // Datenbank: detaillierte Höhen, sonst Altbestand. Verbindungs-
        // fehler externer Quellen degradieren zur Schätzung.
        let mut traufhoehe_m = None;
        let mut firsthoehe_m = None;
        let mut gebaeudehoehe_m = None;
        let mut needs_height_refresh = false;
        let mut measured: Option<(f64, HeightOrigin)> = None;

        match self.db.detailed(query.egid) {
            Ok(Some(detail)) => {
                traufhoehe_m = detail.traufhoehe_m;
                firsthoehe_m = detail.firsthoehe_m;
                gebaeudehoehe_m = detail.gebaeudehoehe_m;
                if traufhoehe_m.is_none() && firsthoehe_m.is_none() {
                    if let Some(total) = gebaeudehoehe_m {
                        traufhoehe_m = Some(total * self.heuristics.trauf_estimate_factor);
                        firsthoehe_m = Some(total);
                        needs_height_refresh = true;
                        debug!(
                            egid = query.egid,
                            total,
                            "Only total height on record, Traufhoehe derived"
                        );
                    }
                }
                if let Some(value) = gebaeudehoehe_m.or(firsthoehe_m) {
                    measured = Some((value, HeightOrigin::database(self.db.provider())));
                }
            }
            Ok(None) => match self.db.legacy(query.egid) {
                Ok(Some(value)) => {
                    measured = Some((value, HeightOrigin::database(self.db.provider())));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(egid = query.egid, error = %err, "Legacy height lookup failed");
                    warnings.push(format!("height database unavailable: {err}"));
                }
            },
            Err(err) => {
                warn!(egid = query.egid, error = %err, "Detailed height lookup failed");
                warnings.push(format!("height database unavailable: {err}"));
            }
        }

        let mut height_data_implausible = false;

        // Traufhöhen unter dem Minimum oder unter 2 m pro Geschoss sind
        // Datenfehler. Trauf und First werden zusammen verworfen, die
        // Gesamthöhe bleibt und durchläuft die eigene Prüfung.
        if let Some(trauf) = traufhoehe_m {
            let floors = query.floors.unwrap_or(0);
            let per_floor_min = f64::from(floors) * self.heuristics.trauf_min_per_floor_m;
            let too_low_absolute = trauf < self.heuristics.trauf_min_m;
            let too_low_for_floors = floors >= 2 && trauf < per_floor_min;
            if too_low_absolute || too_low_for_floors {
                warnings.push(format!(
                    "Traufhoehe {trauf:.1} m rejected as implausible ({} floors)",
                    floors
                ));
                warn!(egid = query.egid, trauf, floors, "Traufhoehe rejected");
                traufhoehe_m = None;
                firsthoehe_m = None;
                needs_height_refresh = false;
                height_data_implausible = true;
                if gebaeudehoehe_m.is_none() {
                    measured = None;
                }
            }
        }

        // Messwert gegen die Schätzung: Werte deutlich darunter stammen
        // fast immer aus fehlerhaften Erhebungen. Der Wert bleibt im
        // Resultat sichtbar, zählt aber nicht als aktive Höhe.
        let mut measured_usable = true;
        if let Some((value, _)) = &measured {
            if estimated_height_m > 0.0
                && value / estimated_height_m < self.heuristics.plausibility_min_ratio
            {
                warnings.push(format!(
                    "measured height {value:.1} m implausible against estimate {estimated_height_m:.1} m"
                ));
                warn!(
                    egid = query.egid,
                    measured = value,
                    estimated = estimated_height_m,
                    "Measured height implausible"
                );
                height_data_implausible = true;
                measured_usable = false;
            }
        }

        // Manuelle Vorgaben sind immer plausibel und übersteuern die
        // Datenbankwerte.
        let manual_total = query.manual_height_m.filter(|h| {
            if *h <= 0.0 {
                warnings.push(format!("manual height {h:.1} m ignored, must be positive"));
                false
            } else {
                true
            }
        });
        if let Some(trauf) = query.manual_traufhoehe_m {
            traufhoehe_m = Some(trauf);
        }
        if let Some(first) = query.manual_firsthoehe_m {
            firsthoehe_m = Some(first);
        }
        if let Some(total) = manual_total {
            gebaeudehoehe_m = Some(total);
        }

        let manual_override = manual_total.is_some()
            || query.manual_traufhoehe_m.is_some()
            || query.manual_firsthoehe_m.is_some();

        let (active_height_m, active_source) = if let Some(total) = manual_total {
            (total, HeightOrigin::Manual)
        } else if let Some(first) = query.manual_firsthoehe_m {
            (first, HeightOrigin::Manual)
        } else if let Some(trauf) = query.manual_traufhoehe_m {
            (trauf, HeightOrigin::Manual)
        } else if let Some((value, source)) = measured.clone().filter(|_| measured_usable) {
            (value, source)
        } else {
            (estimated_height_m, estimated_source.clone())
        };

        debug!(
            egid = query.egid,
            active = active_height_m,
            source = %active_source,
            "Height resolved"
        );

        let (measured_height_m, measured_source) = match measured {
            Some((value, source)) => (Some(value), Some(source)),
            None => (None, None),
        };

        HeightInfo {
            estimated_height_m,
            estimated_source,
            measured_height_m,
            measured_source,
            traufhoehe_m,
            firsthoehe_m,
            gebaeudehoehe_m,
            active_height_m,
            active_source,
            manual_override,
            needs_height_refresh,
            height_data_implausible,
            warnings,
        }
    }

    /// Schätzung aus Geschosszahl, Kategoriestandard oder Standardhöhe
    fn estimate(&self, query: &HeightQuery) -> (f64, HeightOrigin) {
        if let Some(floors) = query.floors.filter(|f| *f > 0) {
            let floor_height = self.heuristics.floor_height_m(query.gklas);
            let roof = self.heuristics.roof_allowance_m(query.gklas);
            return (
                f64::from(floors) * floor_height + roof,
                HeightOrigin::CalculatedFromFloors,
            );
        }
        if let Some(height) = self.heuristics.default_height_by_gklas(query.gklas) {
            return (height, HeightOrigin::DefaultByCategory);
        }
        (self.heuristics.default_height_m, HeightOrigin::DefaultStandard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with(db: HeightDatabase) -> HeightResolver {
        HeightResolver::new(db, HeightHeuristics::default())
    }

    fn detailed(trauf: Option<f64>, first: Option<f64>, total: Option<f64>) -> DetailedHeights {
        DetailedHeights {
            traufhoehe_m: trauf,
            firsthoehe_m: first,
            gebaeudehoehe_m: total,
        }
    }

    #[test]
    fn test_no_data_falls_to_standard_default() {
        let resolver = resolver_with(HeightDatabase::None);
        let info = resolver.resolve(&HeightQuery {
            egid: 1,
            ..Default::default()
        });
        assert_eq!(info.active_height_m, 10.0);
        assert_eq!(info.active_source, HeightOrigin::DefaultStandard);
        assert!(!info.manual_override);
        assert!(info.measured_height_m.is_none());
    }

    #[test]
    fn test_floors_estimate_with_roof_allowance() {
        let resolver = resolver_with(HeightDatabase::None);
        // Wohnbaute: 3 Geschosse à 3 m plus 3 m Dachaufbau
        let info = resolver.resolve(&HeightQuery {
            egid: 1,
            floors: Some(3),
            gklas: Some(1121),
            ..Default::default()
        });
        assert_eq!(info.active_height_m, 12.0);
        assert_eq!(info.active_source, HeightOrigin::CalculatedFromFloors);
        assert_eq!(info.active_source.to_string(), "calculated_from_floors");
    }

    #[test]
    fn test_industrial_roof_allowance() {
        let resolver = resolver_with(HeightDatabase::None);
        let info = resolver.resolve(&HeightQuery {
            egid: 1,
            floors: Some(2),
            gklas: Some(1251),
            ..Default::default()
        });
        assert_eq!(info.active_height_m, 6.5);
    }

    #[test]
    fn test_category_default_without_floors() {
        let mut heuristics = HeightHeuristics::default();
        heuristics.default_heights_by_gklas.insert(1110, 8.0);
        let resolver = HeightResolver::offline(heuristics);
        let info = resolver.resolve(&HeightQuery {
            egid: 1,
            gklas: Some(1110),
            ..Default::default()
        });
        assert_eq!(info.active_height_m, 8.0);
        assert_eq!(info.active_source, HeightOrigin::DefaultByCategory);
    }

    #[test]
    fn test_detailed_heights_win_over_estimate() {
        let mut store = MemoryHeights::default();
        store.insert_detailed(42, detailed(Some(6.5), Some(10.0), Some(10.5)));
        let resolver = resolver_with(HeightDatabase::Memory(store));
        let info = resolver.resolve(&HeightQuery {
            egid: 42,
            floors: Some(2),
            ..Default::default()
        });
        assert_eq!(info.active_height_m, 10.5);
        assert_eq!(info.active_source.to_string(), "database:memory");
        assert_eq!(info.traufhoehe_m, Some(6.5));
        assert!(!info.needs_height_refresh);
        assert!(!info.height_data_implausible);
    }

    #[test]
    fn test_total_only_derives_traufhoehe() {
        let mut store = MemoryHeights::default();
        store.insert_detailed(42, detailed(None, None, Some(10.0)));
        let resolver = resolver_with(HeightDatabase::Memory(store));
        let info = resolver.resolve(&HeightQuery {
            egid: 42,
            ..Default::default()
        });
        assert_eq!(info.traufhoehe_m, Some(8.5));
        assert_eq!(info.firsthoehe_m, Some(10.0));
        assert!(info.needs_height_refresh);
        assert_eq!(info.active_height_m, 10.0);
    }

    #[test]
    fn test_legacy_height_used_when_no_detail() {
        let mut store = MemoryHeights::default();
        store.insert_legacy(42, 9.0);
        let resolver = resolver_with(HeightDatabase::Memory(store));
        let info = resolver.resolve(&HeightQuery {
            egid: 42,
            ..Default::default()
        });
        assert_eq!(info.measured_height_m, Some(9.0));
        assert_eq!(info.active_height_m, 9.0);
        assert!(info.traufhoehe_m.is_none());
    }

    #[test]
    fn test_implausible_measurement_falls_to_estimate() {
        let mut store = MemoryHeights::default();
        store.insert_legacy(42, 5.0);
        let resolver = resolver_with(HeightDatabase::Memory(store));
        // Schätzung: 4 Geschosse à 3 m plus 2 m = 14 m; 5/14 < 0.4
        let info = resolver.resolve(&HeightQuery {
            egid: 42,
            floors: Some(4),
            ..Default::default()
        });
        assert!(info.height_data_implausible);
        assert_eq!(info.active_height_m, 14.0);
        assert_eq!(info.active_source, HeightOrigin::CalculatedFromFloors);
        assert_eq!(info.measured_height_m, Some(5.0), "value stays visible");
        assert!(!info.warnings.is_empty());
    }

    #[test]
    fn test_traufhoehe_below_absolute_minimum_rejected() {
        let mut store = MemoryHeights::default();
        store.insert_detailed(42, detailed(Some(3.0), Some(5.5), None));
        let resolver = resolver_with(HeightDatabase::Memory(store));
        let info = resolver.resolve(&HeightQuery {
            egid: 42,
            ..Default::default()
        });
        assert!(info.traufhoehe_m.is_none());
        assert!(info.firsthoehe_m.is_none());
        assert!(info.height_data_implausible);
        assert_eq!(info.active_height_m, 10.0, "falls back to estimate");
    }

    #[test]
    fn test_traufhoehe_below_per_floor_minimum_rejected() {
        let mut store = MemoryHeights::default();
        store.insert_detailed(42, detailed(Some(6.0), None, None));
        let resolver = resolver_with(HeightDatabase::Memory(store));
        // 6 m ist absolut plausibel, aber zu wenig für 4 Geschosse
        let info = resolver.resolve(&HeightQuery {
            egid: 42,
            floors: Some(4),
            ..Default::default()
        });
        assert!(info.traufhoehe_m.is_none());
        assert!(info.height_data_implausible);
    }

    #[test]
    fn test_rejected_traufhoehe_keeps_total_height() {
        let mut store = MemoryHeights::default();
        store.insert_detailed(42, detailed(Some(2.0), None, Some(12.0)));
        let resolver = resolver_with(HeightDatabase::Memory(store));
        let info = resolver.resolve(&HeightQuery {
            egid: 42,
            ..Default::default()
        });
        assert!(info.traufhoehe_m.is_none());
        assert_eq!(info.gebaeudehoehe_m, Some(12.0));
        assert_eq!(info.active_height_m, 12.0);
        assert!(info.height_data_implausible);
    }

    #[test]
    fn test_manual_total_wins_over_everything() {
        let mut store = MemoryHeights::default();
        store.insert_detailed(42, detailed(Some(6.5), Some(10.0), Some(10.5)));
        let resolver = resolver_with(HeightDatabase::Memory(store));
        let info = resolver.resolve(&HeightQuery {
            egid: 42,
            manual_height_m: Some(12.0),
            floors: Some(3),
            ..Default::default()
        });
        assert_eq!(info.active_height_m, 12.0);
        assert_eq!(info.active_source, HeightOrigin::Manual);
        assert!(info.manual_override);
        assert_eq!(info.gebaeudehoehe_m, Some(12.0));
    }

    #[test]
    fn test_manual_first_preferred_over_manual_trauf() {
        let resolver = resolver_with(HeightDatabase::None);
        let info = resolver.resolve(&HeightQuery {
            egid: 1,
            manual_traufhoehe_m: Some(6.0),
            manual_firsthoehe_m: Some(9.5),
            ..Default::default()
        });
        assert_eq!(info.active_height_m, 9.5);
        assert_eq!(info.active_source, HeightOrigin::Manual);
        assert_eq!(info.traufhoehe_m, Some(6.0));
    }

    #[test]
    fn test_manual_trauf_bypasses_plausibility() {
        let resolver = resolver_with(HeightDatabase::None);
        // 3 m wäre aus der Datenbank unplausibel, manuell zählt sie
        let info = resolver.resolve(&HeightQuery {
            egid: 1,
            manual_traufhoehe_m: Some(3.0),
            ..Default::default()
        });
        assert_eq!(info.active_height_m, 3.0);
        assert!(!info.height_data_implausible);
        assert!(info.manual_override);
    }

    #[test]
    fn test_negative_manual_height_ignored() {
        let resolver = resolver_with(HeightDatabase::None);
        let info = resolver.resolve(&HeightQuery {
            egid: 1,
            manual_height_m: Some(-2.0),
            ..Default::default()
        });
        assert_eq!(info.active_height_m, 10.0);
        assert_eq!(info.active_source, HeightOrigin::DefaultStandard);
        assert!(info.warnings.iter().any(|w| w.contains("must be positive")));
    }

    #[test]
    fn test_origin_display_tags() {
        assert_eq!(HeightOrigin::Manual.to_string(), "manual");
        assert_eq!(HeightOrigin::database("file").to_string(), "database:file");
        assert_eq!(HeightOrigin::DefaultByCategory.to_string(), "default_by_category");
        assert_eq!(HeightOrigin::DefaultStandard.to_string(), "default_standard");
    }
}
