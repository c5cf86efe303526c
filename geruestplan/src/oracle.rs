//! Schnittstelle zum Analyse-Orakel für die Zonenzerlegung
//!
//! Das Orakel erhält eine kompakte Gebäudebeschreibung und antwortet mit
//! JSON, oft in Markdown-Zäune verpackt. Dieses Modul definiert die
//! Schnittstelle, das Antwortschema und die tolerante Extraktion des
//! JSON-Blocks aus der Rohantwort.

use anyhow::{bail, Context, Result};
use memchr::{memchr, memrchr, memmem};
use npk114::{BoundingBox, BuildingGeometry, StructuralFlags, TerrainInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;

use crate::crs::{in_lv95_range, Koordinate};

/// Gebäudebeschreibung, wie sie an das Orakel geht
#[derive(Debug, Clone, Serialize)]
pub struct BuildingDescription {
    pub egid: u64,
    pub address: Option<String>,
    pub vertex_count: usize,
    pub area_m2: f64,
    pub perimeter_m: f64,
    /// Begrenzungsrechteck in Landeskoordinaten
    pub bbox: BoundingBox,
    /// Fassaden als Richtung und Länge, der Reihe nach
    pub facades: Vec<FacadeSummary>,
    pub gebaeudehoehe_m: f64,
    pub traufhoehe_m: Option<f64>,
    pub firsthoehe_m: Option<f64>,
    /// Gebäudeklasse aus dem GWR, wenn bekannt
    pub gklas: Option<u16>,
    pub concave: bool,
    /// Grundriss als geschlossener Ring in Landeskoordinaten
    pub footprint: Vec<[f64; 2]>,
    /// Standort als WGS84-Länge/Breite, falls der Grundriss in LV95 vorliegt
    pub position_wgs84: Option<[f64; 2]>,
}

/// Eine Fassade in der Orakelanfrage
#[derive(Debug, Clone, Serialize)]
pub struct FacadeSummary {
    pub index: usize,
    pub direction: String,
    pub length_m: f64,
}

impl BuildingDescription {
    pub fn from_geometry(
        egid: u64,
        address: Option<String>,
        geometry: &BuildingGeometry,
        gebaeudehoehe_m: f64,
        traufhoehe_m: Option<f64>,
        firsthoehe_m: Option<f64>,
        gklas: Option<u16>,
    ) -> Self {
        let facades = geometry
            .facades
            .iter()
            .map(|f| FacadeSummary {
                index: f.index,
                direction: f.direction.to_string(),
                length_m: f.length_m,
            })
            .collect();
        let centre_e = (geometry.bbox.min_x + geometry.bbox.max_x) / 2.0;
        let centre_n = (geometry.bbox.min_y + geometry.bbox.max_y) / 2.0;
        let position_wgs84 = in_lv95_range(centre_e, centre_n).then(|| {
            let geo = Koordinate::lv95(centre_e, centre_n).to_wgs84();
            [geo.lon_deg, geo.lat_deg]
        });
        Self {
            egid,
            address,
            vertex_count: geometry.footprint.vertex_count(),
            area_m2: geometry.area_m2,
            perimeter_m: geometry.perimeter_m,
            bbox: geometry.bbox,
            facades,
            gebaeudehoehe_m,
            traufhoehe_m,
            firsthoehe_m,
            gklas,
            concave: !geometry.convex,
            footprint: geometry.footprint.to_pairs(),
            position_wgs84,
        }
    }
}

/// Zone wie vom Orakel geliefert, vor jeder Validierung
#[derive(Debug, Clone, Deserialize)]
pub struct OracleZone {
    pub name: String,
    /// Zonentyp als Text, wird gegen die bekannten Typen geprüft
    pub zone_type: String,
    #[serde(default)]
    pub polygon_point_indices: Option<Vec<usize>>,
    #[serde(default)]
    pub traufhoehe_m: Option<f64>,
    #[serde(default)]
    pub firsthoehe_m: Option<f64>,
    #[serde(default)]
    pub gebaeudehoehe_m: Option<f64>,
    /// Fassadenrichtungen, die diese Zone beansprucht
    #[serde(default)]
    pub fassaden_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub beruesten: bool,
    #[serde(default)]
    pub sonderkonstruktion: bool,
    #[serde(default)]
    pub confidence: Option<f64>,
}

fn default_true() -> bool {
    true
}

/// Antwortschema des Orakels
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OracleAnalysis {
    #[serde(default)]
    pub zones: Vec<OracleZone>,
    #[serde(default)]
    pub zone_adjacency: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub flags: StructuralFlags,
    #[serde(default)]
    pub terrain: Option<TerrainInfo>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Asynchrones Analyse-Orakel
///
/// Implementierungen liefern die Rohantwort als Text; Extraktion und
/// Validierung übernimmt der Aufrufer.
pub trait ZoneAnalysisOracle: Send + Sync {
    fn analyze(
        &self,
        description: &BuildingDescription,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Orakel-Platzhalter ohne angeschlossenen Dienst
///
/// Jede Anfrage schlägt fehl, die Zerlegung fällt damit kontrolliert auf
/// den automatischen Einzonen-Kontext zurück.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOracle;

impl ZoneAnalysisOracle for NullOracle {
    async fn analyze(&self, _description: &BuildingDescription) -> Result<String> {
        bail!("no analysis oracle configured")
    }
}

/// Extrahiert den JSON-Block aus einer Orakelantwort
///
/// Reihenfolge: ein json-markierter Codezaun, dann ein nackter Zaun,
/// zuletzt das erste `{` bis zum letzten `}`.
pub fn extract_json(response: &str) -> Result<&str> {
    let bytes = response.as_bytes();

    for marker in [&b"```json"[..], &b"```"[..]] {
        let finder = memmem::Finder::new(marker);
        if let Some(pos) = finder.find(bytes) {
            let start = pos + marker.len();
            // Zauninhalt beginnt nach dem Zeilenumbruch der Zaunzeile
            let start = match memchr(b'\n', &bytes[start..]) {
                Some(nl) => start + nl + 1,
                None => start,
            };
            if let Some(end) = memmem::find(&bytes[start..], b"```") {
                return Ok(response[start..start + end].trim());
            }
            // Offener Zaun: Rest der Antwort nehmen
            return Ok(response[start..].trim());
        }
    }

    let open = memchr(b'{', bytes);
    let close = memrchr(b'}', bytes);
    match (open, close) {
        (Some(start), Some(end)) if start < end => Ok(&response[start..=end]),
        _ => bail!("no JSON object in oracle response"),
    }
}

/// Extrahiert und parst die Orakelantwort gegen das Schema
pub fn parse_analysis(response: &str) -> Result<OracleAnalysis> {
    let json = extract_json(response)?;
    serde_json::from_str(json).context("oracle response does not match the analysis schema")
}
