//! Gemeinsame Datentypen für das Crate npk114

use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::NpkError;

/// Toleranz für identische Punkte (Meter)
pub const POINT_EPSILON: f64 = 1e-9;

/// Gebäudegrundriss als offene Punktfolge (letzter Punkt != erster Punkt)
///
/// Die Normalisierung erfolgt an der Systemgrenze: doppelte Folgepunkte und
/// ein allfälliger Schlusspunkt (identisch mit dem Startpunkt) werden beim
/// Konstruieren entfernt.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    points: Vec<Coord<f64>>,
}

impl Footprint {
    /// Erstellt einen Grundriss aus einer Punktfolge
    ///
    /// # Errors
    ///
    /// `NpkError::DegenerateFootprint` wenn nach der Normalisierung weniger
    /// als 3 Punkte übrig bleiben oder die Fläche null ist.
    pub fn new(points: Vec<Coord<f64>>) -> Result<Self, NpkError> {
        let points = normalize_ring(points);
        if points.len() < 3 {
            return Err(NpkError::degenerate(format!(
                "footprint has {} distinct points, need at least 3",
                points.len()
            )));
        }
        if crate::geometry::polygon_area(&points) < POINT_EPSILON {
            return Err(NpkError::degenerate("footprint area is zero"));
        }
        Ok(Self { points })
    }

    /// Punkte des Grundrisses (offener Ring)
    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    /// Anzahl Eckpunkte
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// Grundriss aus Koordinatenpaaren `[e, n]`
    pub fn from_pairs(pairs: &[[f64; 2]]) -> Result<Self, NpkError> {
        let coords = pairs.iter().map(|p| Coord { x: p[0], y: p[1] }).collect();
        Self::new(coords)
    }

    /// Koordinatenpaare `[e, n]` für Serialisierung
    pub fn to_pairs(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|c| [c.x, c.y]).collect()
    }

    /// Grundriss aus dem Aussenring eines `geo::Polygon`
    ///
    /// Der von `geo` geführte Schlusspunkt wird entfernt.
    pub fn from_polygon(polygon: &Polygon<f64>) -> Result<Self, NpkError> {
        Self::new(polygon.exterior().coords().copied().collect())
    }

    /// Konvertiert in ein `geo::Polygon` (Aussenring, keine Löcher)
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(LineString::from(self.points.clone()), vec![])
    }
}

/// Entfernt Folgeduplikate und den Schlusspunkt eines Rings
fn normalize_ring(points: Vec<Coord<f64>>) -> Vec<Coord<f64>> {
    let mut out: Vec<Coord<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if let Some(last) = out.last() {
            if coords_equal(*last, p) {
                continue;
            }
        }
        out.push(p);
    }
    while out.len() > 1 && coords_equal(out[0], *out.last().unwrap_or(&out[0])) {
        out.pop();
    }
    out
}

/// Vergleicht zwei Punkte mit Toleranz
#[inline]
pub fn coords_equal(a: Coord<f64>, b: Coord<f64>) -> bool {
    (a.x - b.x).abs() < POINT_EPSILON && (a.y - b.y).abs() < POINT_EPSILON
}

/// Gerüst-Breitenklasse nach NPK 114
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthClass {
    /// Belagbreite 0.60 m
    W06,
    /// Belagbreite 0.90 m (Standard für Fassadenarbeiten)
    W09,
    /// Belagbreite 1.20 m
    W12,
}

impl WidthClass {
    /// Gerüstgangbreite LG in Metern
    pub fn gangway_width_m(self) -> f64 {
        match self {
            WidthClass::W06 => 0.60,
            WidthClass::W09 => 0.70,
            WidthClass::W12 => 1.00,
        }
    }
}

impl fmt::Display for WidthClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidthClass::W06 => write!(f, "W06"),
            WidthClass::W09 => write!(f, "W09"),
            WidthClass::W12 => write!(f, "W12"),
        }
    }
}

impl FromStr for WidthClass {
    type Err = NpkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "w06" | "06" | "60" => Ok(WidthClass::W06),
            "w09" | "09" | "90" => Ok(WidthClass::W09),
            "w12" | "12" | "120" => Ok(WidthClass::W12),
            other => Err(NpkError::UnknownWidthClass(other.to_string())),
        }
    }
}

/// Dachform für die Ausmass-Voreinstellungen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoofForm {
    /// Flachdach: alle Fassaden auf Traufhöhe
    Flach,
    /// Satteldach: Giebelfassaden mit gemittelter Höhe
    Sattel,
    /// Walmdach: reduzierte Mittelhöhe auf allen Fassaden
    Walm,
}

impl fmt::Display for RoofForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoofForm::Flach => write!(f, "flach"),
            RoofForm::Sattel => write!(f, "sattel"),
            RoofForm::Walm => write!(f, "walm"),
        }
    }
}

impl FromStr for RoofForm {
    type Err = NpkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flach" | "flachdach" => Ok(RoofForm::Flach),
            "sattel" | "satteldach" | "giebel" => Ok(RoofForm::Sattel),
            "walm" | "walmdach" => Ok(RoofForm::Walm),
            other => Err(NpkError::UnknownRoofForm(other.to_string())),
        }
    }
}

/// Himmelsrichtung einer Fassade (8 Sektoren, deutsche Beschriftung)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    N,
    NO,
    O,
    SO,
    S,
    SW,
    W,
    NW,
}

impl Direction {
    /// Alle Richtungen im Uhrzeigersinn ab Norden
    pub const ALL: [Direction; 8] = [
        Direction::N,
        Direction::NO,
        Direction::O,
        Direction::SO,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
    ];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::N => "N",
            Direction::NO => "NO",
            Direction::O => "O",
            Direction::SO => "SO",
            Direction::S => "S",
            Direction::SW => "SW",
            Direction::W => "W",
            Direction::NW => "NW",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Direction {
    type Err = NpkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "N" => Ok(Direction::N),
            "NO" | "NE" => Ok(Direction::NO),
            "O" | "E" => Ok(Direction::O),
            "SO" | "SE" => Ok(Direction::SO),
            "S" => Ok(Direction::S),
            "SW" => Ok(Direction::SW),
            "W" => Ok(Direction::W),
            "NW" => Ok(Direction::NW),
            other => Err(NpkError::invalid_input("direction", other)),
        }
    }
}

/// Achsenparalleles Begrenzungsrechteck
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,

    pub min_y: f64,

    pub max_x: f64,

    pub max_y: f64,
}

impl BoundingBox {
    /// Ausdehnung in Ost-West-Richtung
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Ausdehnung in Nord-Süd-Richtung
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Eine Gebäudefassade als gerichtete Kante des Grundrisses
#[derive(Debug, Clone, PartialEq)]
pub struct FacadeSegment {
    /// Index der Fassade (Reihenfolge der Grundrisskanten)
    pub index: usize,

    /// Startpunkt der Kante
    pub start: Coord<f64>,

    /// Endpunkt der Kante
    pub end: Coord<f64>,

    /// Fassadenlänge in Metern
    pub length_m: f64,

    /// Richtungswinkel via atan2(dy, dx), in Grad, Bereich (-180, 180]
    pub angle_deg: f64,

    /// Himmelsrichtung (8 Sektoren)
    pub direction: Direction,

    /// Fassadenspezifische Traufhöhe, falls abweichend von der Zone
    pub traufhoehe_m: Option<f64>,
}

/// Abgeleitete Geometrie eines Gebäudes
#[derive(Debug, Clone)]
pub struct BuildingGeometry {
    /// Normalisierter Grundriss
    pub footprint: Footprint,

    /// Grundfläche in m² (Shoelace)
    pub area_m2: f64,

    /// Umfang in Metern
    pub perimeter_m: f64,

    /// Begrenzungsrechteck
    pub bbox: BoundingBox,

    /// Geschätzte Gebäudelänge (lange Seite des Begrenzungsrechtecks)
    pub length_m: f64,

    /// Geschätzte Gebäudebreite (kurze Seite des Begrenzungsrechtecks)
    pub width_m: f64,

    /// Fassadensegmente in Kantenreihenfolge
    pub facades: Vec<FacadeSegment>,

    /// True wenn der Grundriss konvex ist
    pub convex: bool,
}

impl BuildingGeometry {
    /// Leitet die vollständige Geometrie aus einem Grundriss ab
    pub fn from_footprint(footprint: Footprint) -> Self {
        let points = footprint.points();
        let area_m2 = crate::geometry::polygon_area(points);
        let perimeter_m = crate::geometry::polygon_perimeter(points);
        let bbox = crate::geometry::bounding_box(points);
        let convex = crate::geometry::is_convex(points);
        let facades = crate::facade::facade_segments(points);
        let (length_m, width_m) = if bbox.width() >= bbox.height() {
            (bbox.width(), bbox.height())
        } else {
            (bbox.height(), bbox.width())
        };
        Self {
            footprint,
            area_m2,
            perimeter_m,
            bbox,
            length_m,
            width_m,
            facades,
            convex,
        }
    }
}
