//! Konfiguration: Höhenheuristik, Zugangsregeln, Materialkatalog, Orakel
//!
//! Die Konfiguration kommt aus einer JSON-Datei oder aus einem der
//! eingebetteten Presets. Fachliche Tabellen (GKLAS-Listen, Geschosshöhen,
//! Referenzverhältnisse) sind Daten, kein Code.

use anyhow::{bail, Context, Result};
use npk114::access::AccessRules;
use npk114::material::ReferenceRatio;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Höhenheuristik für die Auflösungskette
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightHeuristics {
    /// Letzte Rückfallebene, in Metern
    pub default_height_m: f64,

    /// Geschosshöhe ohne klassenspezifischen Eintrag, in Metern
    pub default_floor_height_m: f64,

    /// Geschosshöhen pro GKLAS, in Metern
    #[serde(default)]
    pub floor_heights_by_gklas: HashMap<u16, f64>,

    /// Standardhöhen pro GKLAS, in Metern
    #[serde(default)]
    pub default_heights_by_gklas: HashMap<u16, f64>,

    /// GKLAS-Codes mit Wohnnutzung (Dachzuschlag Wohnen)
    #[serde(default)]
    pub residential_gklas: Vec<u16>,

    /// GKLAS-Codes für Industrie- und Lagerbauten (flacher Dachzuschlag)
    #[serde(default)]
    pub industrial_gklas: Vec<u16>,

    /// Dachzuschlag für Wohnbauten, in Metern
    pub roof_allowance_residential_m: f64,

    /// Dachzuschlag für Industrie- und Lagerbauten, in Metern
    pub roof_allowance_industrial_m: f64,

    /// Dachzuschlag für alle übrigen Bauten, in Metern
    pub roof_allowance_default_m: f64,

    /// Faktor Traufhöhe aus Gesamthöhe, wenn nur diese bekannt ist
    pub trauf_estimate_factor: f64,

    /// Unter diesem Verhältnis Messwert/Schätzwert gilt die Messung als
    /// unplausibel
    pub plausibility_min_ratio: f64,

    /// Absolute Untergrenze einer plausiblen Traufhöhe, in Metern
    pub trauf_min_m: f64,

    /// Untergrenze der Traufhöhe pro Geschoss (ab 2 Geschossen), in Metern
    pub trauf_min_per_floor_m: f64,
}

impl Default for HeightHeuristics {
    fn default() -> Self {
        Self {
            default_height_m: 10.0,
            default_floor_height_m: 3.0,
            floor_heights_by_gklas: HashMap::new(),
            default_heights_by_gklas: HashMap::new(),
            residential_gklas: vec![1110, 1121, 1122, 1130],
            industrial_gklas: vec![1251, 1252],
            roof_allowance_residential_m: 3.0,
            roof_allowance_industrial_m: 0.5,
            roof_allowance_default_m: 2.0,
            trauf_estimate_factor: 0.85,
            plausibility_min_ratio: 0.4,
            trauf_min_m: 5.0,
            trauf_min_per_floor_m: 2.0,
        }
    }
}

impl HeightHeuristics {
    /// Geschosshöhe für eine Gebäudeklasse
    pub fn floor_height_m(&self, gklas: Option<u16>) -> f64 {
        gklas
            .and_then(|k| self.floor_heights_by_gklas.get(&k).copied())
            .unwrap_or(self.default_floor_height_m)
    }

    /// Dachzuschlag für eine Gebäudeklasse
    pub fn roof_allowance_m(&self, gklas: Option<u16>) -> f64 {
        match gklas {
            Some(k) if self.residential_gklas.contains(&k) => self.roof_allowance_residential_m,
            Some(k) if self.industrial_gklas.contains(&k) => self.roof_allowance_industrial_m,
            _ => self.roof_allowance_default_m,
        }
    }

    /// Standardhöhe für eine Gebäudeklasse, falls hinterlegt
    pub fn default_height_by_gklas(&self, gklas: Option<u16>) -> Option<f64> {
        gklas.and_then(|k| self.default_heights_by_gklas.get(&k).copied())
    }
}

/// Ein Gerüstsystem mit seinen Referenzverhältnissen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldSystem {
    /// Anzeigename des Systems
    pub name: String,

    /// Referenzverhältnisse pro 100 m² Gerüstfläche
    pub ratios: Vec<ReferenceRatio>,
}

/// Materialkatalog über alle Gerüstsysteme
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialCatalog {
    /// Verfügbare Feldlängen, absteigend, in Metern
    #[serde(default)]
    pub field_lengths_m: Vec<f64>,

    /// Gerüstsysteme nach Kennung (z.B. "sl70")
    #[serde(default)]
    pub systems: HashMap<String, ScaffoldSystem>,
}

impl MaterialCatalog {
    /// Referenzverhältnisse eines Systems
    pub fn system(&self, id: &str) -> Option<&ScaffoldSystem> {
        self.systems.get(id)
    }
}

/// Orakel-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Zeitlimit pro Orakelaufruf, in Sekunden
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self { timeout_secs: 90 }
    }
}

/// Gesamtkonfiguration der Gerüstplanung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Höhenheuristik
    #[serde(default)]
    pub heights: HeightHeuristics,

    /// GKLAS-Codes, die strukturell als komplex gelten
    #[serde(default)]
    pub complex_gklas: Vec<u16>,

    /// Zugangsregeln nach SUVA
    #[serde(default)]
    pub access: AccessRules,

    /// Materialkatalog
    #[serde(default)]
    pub material: MaterialCatalog,

    /// Orakel-Einstellungen
    #[serde(default)]
    pub oracle: OracleConfig,
}

impl Default for Config {
    fn default() -> Self {
        // Das Standard-Preset ist Teil des Binaries und immer gültig
        Self::from_preset("standard").unwrap_or(Self {
            heights: HeightHeuristics::default(),
            complex_gklas: Vec::new(),
            access: AccessRules::default(),
            material: MaterialCatalog::default(),
            oracle: OracleConfig::default(),
        })
    }
}

impl Config {
    /// Lädt eine Konfiguration aus einer JSON-Datei
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Lädt ein eingebettetes Preset
    ///
    /// # Errors
    ///
    /// Fehler bei unbekanntem Preset-Namen; bekannt sind `standard` und
    /// `minimal`.
    pub fn from_preset(name: &str) -> Result<Self> {
        let content = match name {
            "standard" => include_str!("presets/standard.json"),
            "minimal" => include_str!("presets/minimal.json"),
            other => bail!("unknown config preset: {other} (available: standard, minimal)"),
        };
        serde_json::from_str(content).with_context(|| format!("parsing embedded preset {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_preset_loads() {
        let config = Config::from_preset("standard").expect("embedded preset is valid");
        assert_eq!(config.heights.default_height_m, 10.0);
        assert!(config.complex_gklas.contains(&1272), "churches are complex");
        assert!(config.material.system("sl70").is_some());
        assert!(!config.material.field_lengths_m.is_empty());
        assert_eq!(config.oracle.timeout_secs, 90);
    }

    #[test]
    fn test_minimal_preset_loads() {
        let config = Config::from_preset("minimal").expect("embedded preset is valid");
        assert!(!config.material.systems.is_empty());
    }

    #[test]
    fn test_unknown_preset() {
        assert!(Config::from_preset("gibtsnicht").is_err());
    }

    #[test]
    fn test_floor_height_lookup() {
        let config = Config::from_preset("standard").unwrap();
        // Industriebauten haben höhere Geschosse als der Standard
        assert!(config.heights.floor_height_m(Some(1251)) > config.heights.default_floor_height_m);
        assert_eq!(config.heights.floor_height_m(None), config.heights.default_floor_height_m);
    }

    #[test]
    fn test_roof_allowance() {
        let h = HeightHeuristics::default();
        assert_eq!(h.roof_allowance_m(Some(1110)), 3.0);
        assert_eq!(h.roof_allowance_m(Some(1251)), 0.5);
        assert_eq!(h.roof_allowance_m(Some(1220)), 2.0);
        assert_eq!(h.roof_allowance_m(None), 2.0);
    }
}
