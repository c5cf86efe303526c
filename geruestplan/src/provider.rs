//! Grundrissquellen: Gebäudepolygone aus GeoJSON oder dem Speicher
//!
//! Amtliche Vermessungsdaten kommen als FeatureCollection in LV95 oder
//! LV03, Exporte aus Webwerkzeugen nach RFC 7946 als WGS84. Beim Laden
//! wird jedes Polygon nach LV95 normalisiert; Features ohne brauchbares
//! Polygon werden gezählt und übersprungen.

use anyhow::{bail, Context, Result};
use geo::{Contains, EuclideanDistance, Point};
use geojson::{Feature, FeatureCollection, GeoJson};
use npk114::geometry::polygon_area;
use npk114::Footprint;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::crs::{detect_system, in_wgs84_ch_range, wgs84_to_lv95, CoordSystem, Koordinate};

/// Suchtoleranz für Punktabfragen, in Metern
pub const DEFAULT_POINT_TOLERANCE_M: f64 = 25.0;

/// Gefundenes Gebäude einer Polygonquelle
#[derive(Debug, Clone)]
pub struct BuildingPolygon {
    /// EGID, falls die Quelle eine führt
    pub egid: Option<u64>,
    /// Grundriss in LV95
    pub footprint: Footprint,
}

/// Polygonquelle mit austauschbarem Bestand
#[derive(Debug)]
pub enum PolygonProvider {
    /// Aus einer GeoJSON-Datei geladener Bestand
    GeoJson(GeoJsonStore),
    /// Bestand im Speicher (Tests, Einzelberechnungen)
    Memory(MemoryStore),
}

impl PolygonProvider {
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::GeoJson(GeoJsonStore::load(path)?))
    }

    /// Grundriss zu einer EGID, `Ok(None)` wenn unbekannt
    pub fn by_egid(&self, egid: u64) -> Result<Option<BuildingPolygon>> {
        match self {
            Self::GeoJson(store) => Ok(store.by_egid(egid)),
            Self::Memory(store) => Ok(store.by_egid(egid)),
        }
    }

    /// Gebäude an einem Punkt, sonst das nächste innerhalb der Toleranz
    pub fn by_point(&self, at: Koordinate, tolerance_m: f64) -> Result<Option<BuildingPolygon>> {
        let at = at.to_lv95();
        let point = Point::new(at.e, at.n);
        match self {
            Self::GeoJson(store) => Ok(store.by_point(point, tolerance_m)),
            Self::Memory(store) => Ok(store.by_point(point, tolerance_m)),
        }
    }

    /// Das einzige Gebäude des Bestands, `None` bei mehreren
    pub fn single(&self) -> Option<BuildingPolygon> {
        let buildings = match self {
            Self::GeoJson(store) => &store.buildings,
            Self::Memory(store) => &store.buildings,
        };
        match buildings.as_slice() {
            [building] => Some(building.clone()),
            _ => None,
        }
    }

    /// EGIDs aller erfassten Gebäude, aufsteigend
    pub fn egids(&self) -> Vec<u64> {
        let mut egids: Vec<u64> = match self {
            Self::GeoJson(store) => store.by_egid.keys().copied().collect(),
            Self::Memory(store) => store.by_egid.keys().copied().collect(),
        };
        egids.sort_unstable();
        egids
    }

    pub fn len(&self) -> usize {
        match self {
            Self::GeoJson(store) => store.buildings.len(),
            Self::Memory(store) => store.buildings.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// GeoJSON-Bestand, nach EGID indexiert
#[derive(Debug, Default)]
pub struct GeoJsonStore {
    buildings: Vec<BuildingPolygon>,
    by_egid: HashMap<u64, usize>,
    /// Features ohne brauchbares Polygon
    pub skipped: usize,
}

impl GeoJsonStore {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading polygon file {}", path.display()))?;
        let store = Self::parse(&content)
            .with_context(|| format!("parsing polygon file {}", path.display()))?;
        if store.buildings.is_empty() {
            bail!("no usable building polygons in {}", path.display());
        }
        debug!(
            buildings = store.buildings.len(),
            skipped = store.skipped,
            file = %path.display(),
            "Polygon file loaded"
        );
        Ok(store)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let geojson: GeoJson = content.parse().context("invalid GeoJSON")?;
        let collection =
            FeatureCollection::try_from(geojson).context("not a FeatureCollection")?;

        // Die Grundrissaufbereitung ist reine Rechenarbeit und läuft
        // parallel; eingefügt wird sequenziell in Feature-Reihenfolge.
        let converted: Vec<(Option<u64>, Result<Footprint>)> = collection
            .features
            .into_par_iter()
            .map(|feature| (feature_egid(&feature), feature_footprint(feature)))
            .collect();

        let mut store = Self::default();
        for (egid, result) in converted {
            match result {
                Ok(footprint) => store.insert(BuildingPolygon { egid, footprint }),
                Err(err) => {
                    warn!(?egid, error = %err, "Feature skipped");
                    store.skipped += 1;
                }
            }
        }
        Ok(store)
    }

    fn insert(&mut self, building: BuildingPolygon) {
        if let Some(egid) = building.egid {
            self.by_egid.insert(egid, self.buildings.len());
        }
        self.buildings.push(building);
    }

    fn by_egid(&self, egid: u64) -> Option<BuildingPolygon> {
        self.by_egid.get(&egid).map(|i| self.buildings[*i].clone())
    }

    fn by_point(&self, point: Point<f64>, tolerance_m: f64) -> Option<BuildingPolygon> {
        nearest(&self.buildings, point, tolerance_m)
    }
}

/// Bestand im Speicher
#[derive(Debug, Default)]
pub struct MemoryStore {
    buildings: Vec<BuildingPolygon>,
    by_egid: HashMap<u64, usize>,
}

impl MemoryStore {
    pub fn insert(&mut self, egid: u64, footprint: Footprint) {
        self.by_egid.insert(egid, self.buildings.len());
        self.buildings.push(BuildingPolygon {
            egid: Some(egid),
            footprint,
        });
    }

    fn by_egid(&self, egid: u64) -> Option<BuildingPolygon> {
        self.by_egid.get(&egid).map(|i| self.buildings[*i].clone())
    }

    fn by_point(&self, point: Point<f64>, tolerance_m: f64) -> Option<BuildingPolygon> {
        nearest(&self.buildings, point, tolerance_m)
    }
}

/// Treffer im Polygon, sonst das nächste Gebäude innerhalb der Toleranz
fn nearest(
    buildings: &[BuildingPolygon],
    point: Point<f64>,
    tolerance_m: f64,
) -> Option<BuildingPolygon> {
    let mut best: Option<(f64, &BuildingPolygon)> = None;
    for building in buildings {
        let polygon = building.footprint.to_polygon();
        if polygon.contains(&point) {
            return Some(building.clone());
        }
        let distance = point.euclidean_distance(&polygon);
        if distance <= tolerance_m && best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, building));
        }
    }
    best.map(|(distance, building)| {
        debug!(?distance, egid = ?building.egid, "Nearest building within tolerance");
        building.clone()
    })
}

/// EGID aus den Feature-Properties ("EGID" oder "egid")
fn feature_egid(feature: &Feature) -> Option<u64> {
    feature
        .properties
        .as_ref()
        .and_then(|p| p.get("EGID").or_else(|| p.get("egid")))
        .and_then(parse_egid)
}

/// Grundriss aus der Feature-Geometrie, normalisiert nach LV95
fn feature_footprint(feature: Feature) -> Result<Footprint> {
    let geometry = feature.geometry.context("feature has no geometry")?;
    let ring = ring_from_value(&geometry.value)?;
    normalized_footprint(&ring)
}

/// EGID aus einer GeoJSON-Property (Zahl oder Text)
fn parse_egid(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Aussenring eines Polygon- oder MultiPolygon-Werts
///
/// Bei MultiPolygonen zählt das flächengrösste Teilpolygon.
fn ring_from_value(value: &geojson::Value) -> Result<Vec<[f64; 2]>> {
    match value {
        geojson::Value::Polygon(rings) => outer_ring(rings),
        geojson::Value::MultiPolygon(polygons) => {
            let mut best: Option<(f64, Vec<[f64; 2]>)> = None;
            for rings in polygons {
                let ring = outer_ring(rings)?;
                let coords: Vec<geo::Coord<f64>> =
                    ring.iter().map(|p| geo::Coord { x: p[0], y: p[1] }).collect();
                let area = polygon_area(&coords);
                if best.as_ref().map_or(true, |(a, _)| area > *a) {
                    best = Some((area, ring));
                }
            }
            match best {
                Some((_, ring)) => Ok(ring),
                None => bail!("MultiPolygon without polygons"),
            }
        }
        other => bail!("unsupported geometry type {}", other.type_name()),
    }
}

fn outer_ring(rings: &[Vec<Vec<f64>>]) -> Result<Vec<[f64; 2]>> {
    let Some(ring) = rings.first() else {
        bail!("polygon without rings");
    };
    let mut out = Vec::with_capacity(ring.len());
    for position in ring {
        if position.len() < 2 {
            bail!("ring position with fewer than two ordinates");
        }
        out.push([position[0], position[1]]);
    }
    Ok(out)
}

/// Normalisiert einen Ring nach LV95 und baut den Grundriss
///
/// GeoJSON führt Koordinaten nach RFC 7946 als WGS84-Längen und
/// -Breiten; Vermessungsexporte liefern in der Praxis LV95 oder LV03.
/// Das Bezugssystem wird am Wertebereich des ersten Punkts erkannt.
fn normalized_footprint(ring: &[[f64; 2]]) -> Result<Footprint> {
    let Some(first) = ring.first() else {
        bail!("empty ring");
    };
    if in_wgs84_ch_range(first[0], first[1]) {
        let pairs: Vec<[f64; 2]> = ring
            .iter()
            .map(|p| {
                let k = wgs84_to_lv95(p[0], p[1]);
                [k.e, k.n]
            })
            .collect();
        return Ok(Footprint::from_pairs(&pairs)?);
    }
    let system = detect_system(first[0], first[1])?;
    let pairs: Vec<[f64; 2]> = match system {
        CoordSystem::Lv95 => ring.to_vec(),
        CoordSystem::Lv03 => ring
            .iter()
            .map(|p| {
                let k = Koordinate::lv03(p[0], p[1]).to_lv95();
                [k.e, k.n]
            })
            .collect(),
    };
    Ok(Footprint::from_pairs(&pairs)?)
}
