//! Höhenquellen: Speicher- und Dateibestand hinter einer gemeinsamen Fassade

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Detaillierte Höhen eines Gebäudes aus einer externen Quelle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedHeights {
    /// Traufhöhe über Terrain, in Metern
    #[serde(default)]
    pub traufhoehe_m: Option<f64>,

    /// Firsthöhe über Terrain, in Metern
    #[serde(default)]
    pub firsthoehe_m: Option<f64>,

    /// Gesamthöhe des Gebäudes, in Metern
    #[serde(default)]
    pub gebaeudehoehe_m: Option<f64>,
}

impl DetailedHeights {
    /// True wenn keiner der drei Werte belegt ist
    pub fn is_empty(&self) -> bool {
        self.traufhoehe_m.is_none() && self.firsthoehe_m.is_none() && self.gebaeudehoehe_m.is_none()
    }
}

/// Bestand im Speicher, nach EGID indexiert
#[derive(Debug, Clone, Default)]
pub struct MemoryHeights {
    detailed: HashMap<u64, DetailedHeights>,
    legacy: HashMap<u64, f64>,
}

impl MemoryHeights {
    pub fn insert_detailed(&mut self, egid: u64, heights: DetailedHeights) {
        self.detailed.insert(egid, heights);
    }

    pub fn insert_legacy(&mut self, egid: u64, height_m: f64) {
        self.legacy.insert(egid, height_m);
    }

    pub fn len(&self) -> usize {
        self.detailed.len() + self.legacy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detailed.is_empty() && self.legacy.is_empty()
    }
}

/// Dateiformat für Höhenbestände
#[derive(Debug, Default, Serialize, Deserialize)]
struct HeightsFile {
    /// Detaillierte Höhen pro EGID
    #[serde(default)]
    detailed: HashMap<u64, DetailedHeights>,

    /// Altbestand: ein einzelner Höhenwert pro EGID
    #[serde(default)]
    legacy: HashMap<u64, f64>,
}

/// Höhendatenbank mit austauschbarer Quelle
///
/// Die Varianten teilen sich die Zugriffsmethoden; welche Quelle
/// angeschlossen ist, entscheidet die Konfiguration beim Aufbau der
/// Pipeline.
#[derive(Debug, Default)]
pub enum HeightDatabase {
    /// Keine Quelle angeschlossen, jede Anfrage ist ein Fehlschlag
    #[default]
    None,
    /// Bestand im Speicher (Tests, kleine Projekte)
    Memory(MemoryHeights),
    /// Aus einer JSON-Datei geladener Bestand
    File(MemoryHeights),
}

impl HeightDatabase {
    /// Lädt eine Höhendatei (JSON mit `detailed` und `legacy` Abschnitten)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading heights file {}", path.display()))?;
        let file: HeightsFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing heights file {}", path.display()))?;
        let store = MemoryHeights {
            detailed: file.detailed,
            legacy: file.legacy,
        };
        debug!(entries = store.len(), file = %path.display(), "Heights file loaded");
        Ok(Self::File(store))
    }

    /// Detaillierte Höhen für eine EGID
    ///
    /// `Ok(None)` heisst "kein Eintrag"; Fehler sind Verbindungsfehlern
    /// externer Quellen vorbehalten und werden vom Aufrufer abgefangen.
    pub fn detailed(&self, egid: u64) -> Result<Option<DetailedHeights>> {
        match self {
            Self::None => Ok(None),
            Self::Memory(store) | Self::File(store) => {
                Ok(store.detailed.get(&egid).copied().filter(|h| !h.is_empty()))
            }
        }
    }

    /// Einzelner Höhenwert aus dem Altbestand
    pub fn legacy(&self, egid: u64) -> Result<Option<f64>> {
        match self {
            Self::None => Ok(None),
            Self::Memory(store) | Self::File(store) => Ok(store.legacy.get(&egid).copied()),
        }
    }

    /// Kennung der Quelle für Herkunftsangaben
    pub fn provider(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_source() {
        let db = HeightDatabase::None;
        assert!(db.detailed(1).unwrap().is_none());
        assert!(db.legacy(1).unwrap().is_none());
        assert_eq!(db.provider(), "none");
    }

    #[test]
    fn test_memory_source() {
        let mut store = MemoryHeights::default();
        store.insert_detailed(
            42,
            DetailedHeights {
                traufhoehe_m: Some(6.5),
                firsthoehe_m: Some(10.0),
                gebaeudehoehe_m: None,
            },
        );
        store.insert_legacy(43, 9.0);
        let db = HeightDatabase::Memory(store);
        assert_eq!(db.detailed(42).unwrap().unwrap().traufhoehe_m, Some(6.5));
        assert!(db.detailed(43).unwrap().is_none());
        assert_eq!(db.legacy(43).unwrap(), Some(9.0));
    }

    #[test]
    fn test_empty_detailed_filtered() {
        let mut store = MemoryHeights::default();
        store.insert_detailed(7, DetailedHeights::default());
        let db = HeightDatabase::Memory(store);
        assert!(db.detailed(7).unwrap().is_none(), "empty record counts as miss");
    }

    #[test]
    fn test_file_format_parses() {
        let json = r#"{
            "detailed": {"190325798": {"traufhoehe_m": 6.5, "firsthoehe_m": 10.0}},
            "legacy": {"200000001": 9.0}
        }"#;
        let file: HeightsFile = serde_json::from_str(json).expect("valid format");
        assert_eq!(file.detailed.len(), 1);
        assert_eq!(file.legacy.get(&200000001), Some(&9.0));
    }
}
