//! Zonenmodell: Gebäudekontext, Zonen und automatische Ein-Zonen-Synthese
//!
//! Der Gebäudekontext beschreibt, wie ein Gebäude für die Gerüstplanung in
//! Zonen zerlegt ist. Die automatische Synthese erzeugt genau eine Zone
//! über den ganzen Grundriss und plant die Zugänge sofort mit.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::access::{AccessPlan, AccessPlanner};
use crate::complexity::Complexity;
use crate::error::NpkError;
use crate::types::{BuildingGeometry, Direction};

/// Geschlossene Menge der Zonentypen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneType {
    Hauptgebaeude,
    Anbau,
    Turm,
    Kuppel,
    Arkade,
    Vordach,
    Treppenhaus,
    Garage,
    Unknown,
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ZoneType::Hauptgebaeude => "hauptgebaeude",
            ZoneType::Anbau => "anbau",
            ZoneType::Turm => "turm",
            ZoneType::Kuppel => "kuppel",
            ZoneType::Arkade => "arkade",
            ZoneType::Vordach => "vordach",
            ZoneType::Treppenhaus => "treppenhaus",
            ZoneType::Garage => "garage",
            ZoneType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ZoneType {
    type Err = NpkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hauptgebaeude" | "hauptgebäude" => Ok(ZoneType::Hauptgebaeude),
            "anbau" => Ok(ZoneType::Anbau),
            "turm" => Ok(ZoneType::Turm),
            "kuppel" => Ok(ZoneType::Kuppel),
            "arkade" => Ok(ZoneType::Arkade),
            "vordach" => Ok(ZoneType::Vordach),
            "treppenhaus" => Ok(ZoneType::Treppenhaus),
            "garage" => Ok(ZoneType::Garage),
            "unknown" => Ok(ZoneType::Unknown),
            other => Err(NpkError::UnknownZoneType(other.to_string())),
        }
    }
}

/// Herkunft eines Gebäudekontexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextSource {
    Auto,
    Oracle,
    Manual,
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextSource::Auto => write!(f, "auto"),
            ContextSource::Oracle => write!(f, "oracle"),
            ContextSource::Manual => write!(f, "manual"),
        }
    }
}

/// Strukturmerkmale eines Gebäudes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralFlags {
    #[serde(default)]
    pub has_towers: bool,

    #[serde(default)]
    pub has_setbacks: bool,

    #[serde(default)]
    pub has_concave_sections: bool,

    #[serde(default)]
    pub has_annexes: bool,
}

/// Geländeinformation am Gebäudestandort
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TerrainInfo {
    /// Hangneigung in Prozent, falls bekannt
    #[serde(default)]
    pub slope_percent: Option<f64>,

    /// Gefällsrichtung, falls bekannt
    #[serde(default)]
    pub slope_direction: Option<Direction>,
}

/// Eine Gerüstzone eines Gebäudes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingZone {
    /// Eindeutige Kennung innerhalb des Kontexts
    pub id: String,

    /// Anzeigename (z.B. "Hauptgebäude", "Anbau West")
    pub name: String,

    /// Zonentyp aus der geschlossenen Menge
    pub zone_type: ZoneType,

    /// Indizes der Grundrisspunkte, falls die Zone ein Teilpolygon belegt
    #[serde(default)]
    pub polygon_point_indices: Option<Vec<usize>>,

    /// Eigenes Teilpolygon der Zone als Koordinatenpaare
    #[serde(default)]
    pub sub_polygon: Option<Vec<[f64; 2]>>,

    /// Traufhöhe der Zone, in Metern
    #[serde(default)]
    pub traufhoehe_m: Option<f64>,

    /// Firsthöhe der Zone, in Metern
    #[serde(default)]
    pub firsthoehe_m: Option<f64>,

    /// Massgebende Gebäudehöhe der Zone, in Metern
    pub gebaeudehoehe_m: f64,

    /// Fassaden der Zone als Himmelsrichtungen
    #[serde(default)]
    pub fassaden_ids: Vec<Direction>,

    /// True wenn die Zone eingerüstet wird
    pub beruesten: bool,

    /// True bei Sonderkonstruktionen (Auskragungen, Netze, Aufzüge)
    #[serde(default)]
    pub sonderkonstruktion: bool,

    /// Vertrauenswert der Zonenzuweisung, in [0, 1]
    pub confidence: f64,
}

impl BuildingZone {
    /// Erstellt eine Zone mit Standardwerten (eingerüstet, Vertrauen 1.0)
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        zone_type: ZoneType,
        gebaeudehoehe_m: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            zone_type,
            polygon_point_indices: None,
            sub_polygon: None,
            traufhoehe_m: None,
            firsthoehe_m: None,
            gebaeudehoehe_m,
            fassaden_ids: Vec::new(),
            beruesten: true,
            sonderkonstruktion: false,
            confidence: 1.0,
        }
    }
}

/// Vollständiger Gebäudekontext für die Gerüstplanung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingContext {
    /// Eidgenössischer Gebäudeidentifikator
    pub egid: String,

    /// Gebäudeadresse, falls bekannt
    #[serde(default)]
    pub address: Option<String>,

    /// Zonen des Gebäudes
    pub zones: Vec<BuildingZone>,

    /// Nachbarschaft der Zonen (Zonen-Id -> angrenzende Zonen-Ids)
    #[serde(default)]
    pub zone_adjacency: HashMap<String, Vec<String>>,

    /// Strukturelle Komplexität
    pub complexity: Complexity,

    /// Strukturmerkmale
    #[serde(default)]
    pub flags: StructuralFlags,

    /// Geländeinformation
    #[serde(default)]
    pub terrain: TerrainInfo,

    /// Herkunft des Kontexts
    pub source: ContextSource,

    /// Gesamtvertrauen in die Zerlegung, in [0, 1]
    pub confidence: f64,

    /// True wenn der Kontext fachlich geprüft wurde
    #[serde(default)]
    pub validated: bool,

    /// Begründung der Zerlegung (vom Orakel übernommen)
    #[serde(default)]
    pub reasoning: Option<String>,

    /// Geplante Gerüstzugänge
    #[serde(default)]
    pub access: Option<AccessPlan>,

    /// Erstellzeitpunkt, Unix-Epoche in Sekunden
    pub created_at_epoch: u64,

    /// Letzter Änderungszeitpunkt, Unix-Epoche in Sekunden
    pub updated_at_epoch: u64,
}

/// Aktuelle Unix-Epoche in Sekunden
pub fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Erzeugt den automatischen Ein-Zonen-Kontext
///
/// Genau eine Zone vom Typ Hauptgebäude über alle Fassaden, Vertrauen 1.0,
/// Quelle `auto`; die Zugänge werden sofort über alle Fassaden geplant.
pub fn single_zone_context(
    egid: impl Into<String>,
    address: Option<String>,
    geometry: &BuildingGeometry,
    traufhoehe_m: Option<f64>,
    firsthoehe_m: Option<f64>,
    gebaeudehoehe_m: f64,
    complexity: Complexity,
    planner: &AccessPlanner,
) -> BuildingContext {
    let mut fassaden_ids: Vec<Direction> = Vec::new();
    for f in &geometry.facades {
        if !fassaden_ids.contains(&f.direction) {
            fassaden_ids.push(f.direction);
        }
    }

    let zone = BuildingZone {
        traufhoehe_m,
        firsthoehe_m,
        fassaden_ids,
        ..BuildingZone::new("hauptgebaeude", "Hauptgebäude", ZoneType::Hauptgebaeude, gebaeudehoehe_m)
    };

    let now = now_epoch();
    BuildingContext {
        egid: egid.into(),
        address,
        zones: vec![zone],
        zone_adjacency: HashMap::new(),
        complexity,
        flags: StructuralFlags {
            has_concave_sections: !geometry.convex,
            ..StructuralFlags::default()
        },
        terrain: TerrainInfo::default(),
        source: ContextSource::Auto,
        confidence: 1.0,
        validated: false,
        reasoning: None,
        access: Some(planner.plan(&geometry.facades)),
        created_at_epoch: now,
        updated_at_epoch: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Footprint;

    fn rect_geometry() -> BuildingGeometry {
        let fp =
            Footprint::from_pairs(&[[0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]).unwrap();
        BuildingGeometry::from_footprint(fp)
    }

    #[test]
    fn test_zone_type_round_trip() {
        for s in [
            "hauptgebaeude",
            "anbau",
            "turm",
            "kuppel",
            "arkade",
            "vordach",
            "treppenhaus",
            "garage",
            "unknown",
        ] {
            let t: ZoneType = s.parse().expect("known zone type");
            assert_eq!(t.to_string(), s);
        }
        assert!("wintergarten".parse::<ZoneType>().is_err());
    }

    #[test]
    fn test_zone_type_umlaut_alias() {
        assert_eq!("Hauptgebäude".parse::<ZoneType>().unwrap(), ZoneType::Hauptgebaeude);
    }

    #[test]
    fn test_single_zone_context() {
        let geometry = rect_geometry();
        let ctx = single_zone_context(
            "190325798",
            Some("Musterweg 3, 3012 Bern".to_string()),
            &geometry,
            Some(6.5),
            Some(10.0),
            10.0,
            Complexity::Simple,
            &AccessPlanner::default(),
        );
        assert_eq!(ctx.zones.len(), 1);
        assert_eq!(ctx.zones[0].zone_type, ZoneType::Hauptgebaeude);
        assert_eq!(ctx.zones[0].fassaden_ids.len(), 4);
        assert!(ctx.zones[0].beruesten);
        assert_eq!(ctx.source, ContextSource::Auto);
        assert_eq!(ctx.confidence, 1.0);
        let access = ctx.access.expect("access planned immediately");
        assert!(access.access_points.len() >= 2);
        assert!(access.suva_compliant);
    }

    #[test]
    fn test_context_serde_round_trip() {
        let geometry = rect_geometry();
        let ctx = single_zone_context(
            "190325798",
            None,
            &geometry,
            None,
            None,
            10.0,
            Complexity::Simple,
            &AccessPlanner::default(),
        );
        let json = serde_json::to_string(&ctx).expect("serializable");
        let back: BuildingContext = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(back.egid, ctx.egid);
        assert_eq!(back.zones.len(), 1);
        assert_eq!(back.zones[0].zone_type, ZoneType::Hauptgebaeude);
        assert_eq!(back.source, ContextSource::Auto);
    }
}
