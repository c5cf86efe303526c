//! Planung der Gerüstzugänge nach SUVA-Vorgaben
//!
//! Zugänge (Treppentürme, Durchstiege) liegen auf dem Gebäudeumfang; die
//! Fluchtweglänge wird dem Gerüst entlang gemessen, nicht in Luftlinie.
//! Bei n sortierten Zugängen ist der ungünstigste Fluchtweg die halbe
//! grösste Lücke zwischen benachbarten Zugängen auf dem Ring.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::types::FacadeSegment;

/// Regelwerk für die Zugangsplanung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRules {
    /// Maximale Fluchtweglänge entlang des Gerüsts, in Metern
    pub max_egress_m: f64,

    /// Minimale Anzahl Zugänge pro Gerüst
    pub min_access_points: usize,

    /// Freihaltedistanz um bekannte Gebäudeeingänge, in Metern
    pub entrance_clearance_m: f64,
}

impl Default for AccessRules {
    fn default() -> Self {
        Self {
            max_egress_m: 50.0,
            min_access_points: 2,
            entrance_clearance_m: 2.0,
        }
    }
}

/// Begründung für die Platzierung eines Zugangs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    /// An einer Giebelseite (kürzeste Fassaden)
    GableEnd,
    /// An einer Gebäudeecke
    Corner,
    /// Gleichmässige Verteilung entlang langer Fassaden
    Distribution,
}

impl fmt::Display for AccessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessReason::GableEnd => write!(f, "Giebelseite"),
            AccessReason::Corner => write!(f, "Gebäudeecke"),
            AccessReason::Distribution => write!(f, "Verteilung"),
        }
    }
}

/// Ein geplanter Gerüstzugang
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPoint {
    /// Laufende Kennung ("zugang-1", in Umfangrichtung nummeriert)
    pub id: String,

    /// Index der Fassade, auf der der Zugang liegt
    pub facade_index: usize,

    /// Position entlang der Fassade, 0.0 = Startecke, 1.0 = Endecke
    pub position_percent: f64,

    /// Position auf dem abgewickelten Umfang, in Metern
    pub arc_position_m: f64,

    /// Platzierungsgrund
    pub reason: AccessReason,
}

/// Ergebnis der Zugangsplanung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPlan {
    /// Geplante Zugänge, in Umfangrichtung sortiert
    pub access_points: Vec<AccessPoint>,

    /// True wenn jeder Punkt des Umfangs innerhalb der maximalen
    /// Fluchtweglänge eines Zugangs liegt
    pub suva_compliant: bool,

    /// Ungünstigster Fluchtweg entlang des Gerüsts, in Metern
    pub max_egress_m: f64,

    /// Gebäudeumfang, in Metern
    pub perimeter_m: f64,

    /// Geforderte Mindestanzahl Zugänge
    pub required_count: usize,
}

/// Plant Gerüstzugänge auf dem Gebäudeumfang
#[derive(Debug, Clone, Default)]
pub struct AccessPlanner {
    rules: AccessRules,
}

impl AccessPlanner {
    pub fn new(rules: AccessRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &AccessRules {
        &self.rules
    }

    /// Plant Zugänge ohne bekannte Gebäudeeingänge
    pub fn plan(&self, facades: &[FacadeSegment]) -> AccessPlan {
        self.plan_with_entrances(facades, &[])
    }

    /// Plant Zugänge; `entrances_arc_m` sind bekannte Eingänge als Position
    /// auf dem abgewickelten Umfang
    ///
    /// Mindestanzahl: max(Regelminimum, ceil(Umfang / maximale
    /// Fluchtweglänge)). Platzierung bevorzugt die Ecken der kürzesten
    /// Fassaden (Giebelseiten), dann weitere Ecken, dann Lückenmitten.
    /// Kann die Fluchtwegregel mit dieser Anzahl nicht eingehalten werden,
    /// wird der Plan als nicht konform markiert, nicht abgebrochen.
    pub fn plan_with_entrances(&self, facades: &[FacadeSegment], entrances_arc_m: &[f64]) -> AccessPlan {
        let perimeter_m: f64 = facades.iter().map(|f| f.length_m).sum();
        if facades.is_empty() || perimeter_m <= 0.0 {
            warn!("Access planning without facades, marking plan as non-compliant");
            return AccessPlan {
                access_points: Vec::new(),
                suva_compliant: false,
                max_egress_m: 0.0,
                perimeter_m: 0.0,
                required_count: self.rules.min_access_points,
            };
        }

        let required_count = self
            .rules
            .min_access_points
            .max((perimeter_m / self.rules.max_egress_m).ceil() as usize);

        // Abgewickelte Startpositionen aller Fassaden (= Eckpunkte)
        let mut corner_arcs = Vec::with_capacity(facades.len());
        let mut arc = 0.0;
        for f in facades {
            corner_arcs.push(arc);
            arc += f.length_m;
        }

        // Ecken der beiden kürzesten Fassaden gelten als Giebelseiten
        let mut by_length: Vec<usize> = (0..facades.len()).collect();
        by_length.sort_by(|&a, &b| {
            facades[a]
                .length_m
                .partial_cmp(&facades[b].length_m)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let gable_corners: Vec<f64> = by_length.iter().take(2).map(|&i| corner_arcs[i]).collect();

        let mut selected: Vec<(f64, AccessReason)> = Vec::with_capacity(required_count);
        selected.push((gable_corners[0], AccessReason::GableEnd));

        while selected.len() < required_count {
            let (gap_start, gap_len) = largest_gap(&selected, perimeter_m);
            let target = (gap_start + gap_len / 2.0) % perimeter_m;

            // Beste freie Ecke in der Lücke, sonst Lückenmitte
            let mut best: Option<(f64, f64)> = None;
            for &corner in &corner_arcs {
                let offset = ring_offset(gap_start, corner, perimeter_m);
                if offset <= 0.0 || offset >= gap_len {
                    continue;
                }
                let dist = ring_distance(corner, target, perimeter_m);
                if best.map_or(true, |(_, d)| dist < d) {
                    best = Some((corner, dist));
                }
            }
            match best {
                Some((corner, dist)) if dist <= gap_len / 4.0 => {
                    let reason = if gable_corners.iter().any(|&g| (g - corner).abs() < 1e-9) {
                        AccessReason::GableEnd
                    } else {
                        AccessReason::Corner
                    };
                    selected.push((corner, reason));
                }
                _ => selected.push((target, AccessReason::Distribution)),
            }
            selected.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        // Zugänge aus der Freihaltezone bekannter Eingänge schieben
        if !entrances_arc_m.is_empty() {
            for point in &mut selected {
                point.0 = clear_of_entrances(
                    point.0,
                    entrances_arc_m,
                    self.rules.entrance_clearance_m,
                    perimeter_m,
                );
            }
            selected.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        let (_, largest) = largest_gap(&selected, perimeter_m);
        let max_egress_m = largest / 2.0;
        let suva_compliant = max_egress_m <= self.rules.max_egress_m + 1e-9;
        if !suva_compliant {
            warn!(
                max_egress_m = format!("{max_egress_m:.1}"),
                limit_m = self.rules.max_egress_m,
                "Egress distance exceeds SUVA limit"
            );
        }

        let access_points = selected
            .into_iter()
            .enumerate()
            .map(|(i, (arc_pos, reason))| {
                let (facade_index, position_percent) = locate(arc_pos, &corner_arcs, facades);
                AccessPoint {
                    id: format!("zugang-{}", i + 1),
                    facade_index,
                    position_percent,
                    arc_position_m: arc_pos,
                    reason,
                }
            })
            .collect();

        AccessPlan {
            access_points,
            suva_compliant,
            max_egress_m,
            perimeter_m,
            required_count,
        }
    }
}

/// Grösste Lücke zwischen benachbarten Positionen auf dem Ring
///
/// Erwartet aufsteigend sortierte Positionen und liefert (Startposition,
/// Lückenlänge). Bei einem einzigen Punkt ist die Lücke der ganze Umfang.
fn largest_gap(selected: &[(f64, AccessReason)], perimeter: f64) -> (f64, f64) {
    if selected.len() == 1 {
        return (selected[0].0, perimeter);
    }
    let mut best = (selected[0].0, 0.0);
    for i in 0..selected.len() {
        let a = selected[i].0;
        let next = (i + 1) % selected.len();
        let gap = if next == 0 {
            selected[next].0 + perimeter - a
        } else {
            selected[next].0 - a
        };
        if gap > best.1 {
            best = (a, gap);
        }
    }
    best
}

/// Schiebt eine Ringposition vorwärts aus allen Freihaltezonen
///
/// Jeder Schritt springt an das vordere Ende der verletzten Zone und
/// prüft danach alle Eingänge erneut; eine verschobene Position kann in
/// der nächsten Zone landen. Decken die Zonen den ganzen Ring ab, bleibt
/// nach einem vollen Umlauf die ursprüngliche Position stehen.
fn clear_of_entrances(start: f64, entrances: &[f64], clearance: f64, perimeter: f64) -> f64 {
    let mut pos = start;
    let mut travelled = 0.0;
    loop {
        let blocking = entrances
            .iter()
            .find(|&&e| ring_distance(pos, e, perimeter) < clearance);
        let Some(&entrance) = blocking else {
            return pos;
        };
        let step = ring_offset(pos, (entrance + clearance) % perimeter, perimeter);
        travelled += step;
        if travelled >= perimeter {
            warn!(
                position_m = format!("{start:.1}"),
                "Entrance clearance zones cover the whole perimeter, keeping position"
            );
            return start;
        }
        pos = (pos + step) % perimeter;
    }
}

/// Vorwärts-Abstand von a nach b auf dem Ring, in [0, Umfang)
#[inline]
fn ring_offset(a: f64, b: f64, perimeter: f64) -> f64 {
    (b - a).rem_euclid(perimeter)
}

/// Kürzester Abstand zweier Ringpositionen (beide Richtungen)
#[inline]
fn ring_distance(a: f64, b: f64, perimeter: f64) -> f64 {
    let d = ring_offset(a, b, perimeter);
    d.min(perimeter - d)
}

/// Ordnet eine Umfangsposition der Fassade und der relativen Position zu
fn locate(arc_pos: f64, corner_arcs: &[f64], facades: &[FacadeSegment]) -> (usize, f64) {
    for i in (0..corner_arcs.len()).rev() {
        if arc_pos >= corner_arcs[i] - 1e-9 {
            let percent = ((arc_pos - corner_arcs[i]) / facades[i].length_m).clamp(0.0, 1.0);
            return (facades[i].index, percent);
        }
    }
    (facades[0].index, 0.0)
}
