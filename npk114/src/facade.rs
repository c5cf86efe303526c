//! Ableitung der Fassadensegmente aus dem Grundriss
//!
//! Jede Grundrisskante wird zu einer Fassade mit Länge, Richtungswinkel und
//! Himmelsrichtung. Die Richtung bezeichnet den Verlauf der Kante (nicht die
//! Aussennormale); bei einem gegen den Uhrzeigersinn orientierten Ring zeigt
//! die Blickrichtung entlang der Kante nach links zum Gebäude.

use geo::Coord;

use crate::geometry::distance;
use crate::types::{coords_equal, Direction, FacadeSegment};

/// Sektorenfolge ab Ost, gegen den Uhrzeigersinn (mathematisch positiv)
const SECTORS: [Direction; 8] = [
    Direction::O,
    Direction::NO,
    Direction::N,
    Direction::NW,
    Direction::W,
    Direction::SW,
    Direction::S,
    Direction::SO,
];

/// Ordnet einen Winkel (Grad, atan2-Konvention) einem der 8 Sektoren zu
///
/// Jeder Sektor ist das halboffene Fenster `[Mitte - 22.5°, Mitte + 22.5°)`;
/// Ost besitzt damit genau `[-22.5°, 22.5°)`, und Winkel auf einer
/// Sektorgrenze gehören zum nächsten Sektor gegen den Uhrzeigersinn.
pub fn direction_for_angle(angle_deg: f64) -> Direction {
    let norm = ((angle_deg % 360.0) + 360.0) % 360.0;
    let idx = ((norm + 22.5) / 45.0).floor() as usize % 8;
    SECTORS[idx]
}

/// Leitet die Fassadensegmente aus einer offenen Punktfolge ab
///
/// Kanten der Länge null werden übersprungen; damit bleibt die Summe der
/// Fassadenlängen gleich dem Polygonumfang. Weniger als 3 Punkte ergeben
/// eine leere Liste.
pub fn facade_segments(points: &[Coord<f64>]) -> Vec<FacadeSegment> {
    if points.len() < 3 {
        return Vec::new();
    }
    let mut segments = Vec::with_capacity(points.len());
    let mut index = 0;
    for i in 0..points.len() {
        let start = points[i];
        let end = points[(i + 1) % points.len()];
        if coords_equal(start, end) {
            continue;
        }
        let length_m = distance(start, end);
        let angle_deg = (end.y - start.y).atan2(end.x - start.x).to_degrees();
        segments.push(FacadeSegment {
            index,
            start,
            end,
            length_m,
            angle_deg,
            direction: direction_for_angle(angle_deg),
            traufhoehe_m: None,
        });
        index += 1;
    }
    segments
}
