//! Komplexitätsklassifizierung von Gebäuden
//!
//! Zwei getrennte Klassifizierer mit unabhängigen Schwellwerten: der
//! strukturelle steuert die Zonenzerlegung (Orakel ja/nein), der
//! Darstellungs-Klassifizierer die Wahl der Visualisierungsvorlage.
//! Die beiden werden bewusst nicht zusammengelegt.

use geo::Coord;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry;
use crate::zone::{BuildingZone, ZoneType};

/// Komplexitätsstufe eines Gebäudes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Moderate => write!(f, "moderate"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

/// Obergrenze Eckpunkte für "einfach"
const SIMPLE_MAX_VERTICES: usize = 6;
/// Obergrenze Grundfläche für "einfach", in m²
const SIMPLE_MAX_AREA_M2: f64 = 300.0;
/// Zulässiges Seitenverhältnis für "einfach" (exklusiv)
const SIMPLE_ASPECT_MIN: f64 = 0.3;
const SIMPLE_ASPECT_MAX: f64 = 3.0;
/// Ab so vielen Eckpunkten gilt "komplex"
const COMPLEX_MIN_VERTICES: usize = 12;
/// Ab dieser Grundfläche gilt "komplex", in m²
const COMPLEX_MIN_AREA_M2: f64 = 1000.0;

/// Struktureller Klassifizierer für die Zonenzerlegung
///
/// Einfach: höchstens 6 Ecken, unter 300 m², Seitenverhältnis zwischen
/// 0.3 und 3.0, keine komplexe Gebäudeklasse, konvex. Komplex: über 12
/// Ecken, über 1000 m², komplexe Gebäudeklasse oder konkave Abschnitte.
/// Alles dazwischen: moderat.
pub fn classify_structure(
    points: &[Coord<f64>],
    area_m2: Option<f64>,
    category: Option<u16>,
    complex_categories: &[u16],
) -> Complexity {
    let vertices = points.len();
    let area = area_m2.unwrap_or_else(|| geometry::polygon_area(points));
    let complex_category = category.is_some_and(|c| complex_categories.contains(&c));
    let concave = geometry::has_concave_sections(points);

    if vertices > COMPLEX_MIN_VERTICES
        || area > COMPLEX_MIN_AREA_M2
        || complex_category
        || concave
    {
        return Complexity::Complex;
    }

    let aspect = geometry::aspect_ratio(points);
    if vertices <= SIMPLE_MAX_VERTICES
        && area < SIMPLE_MAX_AREA_M2
        && aspect > SIMPLE_ASPECT_MIN
        && aspect < SIMPLE_ASPECT_MAX
    {
        return Complexity::Simple;
    }

    Complexity::Moderate
}

/// Ab dieser Grundfläche eskaliert die Darstellung, in m²
const RENDER_MIN_AREA_M2: f64 = 500.0;
/// Ab dieser Höhendifferenz zwischen Zonen eskaliert die Darstellung
const RENDER_HEIGHT_SPREAD_M: f64 = 5.0;
/// Ab so vielen Eckpunkten eskaliert die Darstellung
const RENDER_MIN_VERTICES: usize = 12;

/// Darstellungs-Klassifizierer für die Wahl der Visualisierungsvorlage
///
/// Eskaliert auf komplex bei Sonderzonen (Kuppel, Turm, Arkade,
/// Treppenhaus), bei mehreren Zonen mit über 5 m Höhendifferenz, bei über
/// 12 Eckpunkten oder über 500 m² Grundfläche.
pub fn classify_rendering(zones: &[BuildingZone], vertex_count: usize, area_m2: f64) -> Complexity {
    let special_zone = zones.iter().any(|z| {
        matches!(
            z.zone_type,
            ZoneType::Kuppel | ZoneType::Turm | ZoneType::Arkade | ZoneType::Treppenhaus
        )
    });
    let height_spread = if zones.len() > 1 {
        let max = zones.iter().map(|z| z.gebaeudehoehe_m).fold(f64::MIN, f64::max);
        let min = zones.iter().map(|z| z.gebaeudehoehe_m).fold(f64::MAX, f64::min);
        max - min
    } else {
        0.0
    };

    if special_zone
        || height_spread > RENDER_HEIGHT_SPREAD_M
        || vertex_count > RENDER_MIN_VERTICES
        || area_m2 > RENDER_MIN_AREA_M2
    {
        return Complexity::Complex;
    }
    if zones.len() > 1 || vertex_count > SIMPLE_MAX_VERTICES {
        return Complexity::Moderate;
    }
    Complexity::Simple
}
