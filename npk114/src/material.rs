//! Materialbedarfsschätzung aus Referenzverhältnissen
//!
//! Die Stückzahlen werden linear aus Verhältniszahlen pro 100 m²
//! Gerüstfläche hochgerechnet und abgeschnitten (nicht gerundet). Die
//! Verhältnistabellen stammen aus dem konfigurierten Materialkatalog.

use serde::{Deserialize, Serialize};

/// Referenzverhältnis eines Artikels pro 100 m² Gerüstfläche
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRatio {
    /// Artikelbezeichnung (z.B. "Vertikalrahmen 2.00 m")
    pub article: String,

    /// Materialgruppe (z.B. "Rahmen", "Belag", "Sicherheit")
    pub category: String,

    /// Untere Bandbreite, Stück pro 100 m²
    pub ratio_min: f64,

    /// Typischer Wert, Stück pro 100 m²
    pub ratio_typical: f64,

    /// Obere Bandbreite, Stück pro 100 m²
    pub ratio_max: f64,

    /// Stückgewicht in kg, falls bekannt
    #[serde(default)]
    pub weight_kg: Option<f64>,
}

/// Eine geschätzte Materialposition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialLine {
    /// Artikelbezeichnung
    pub article: String,

    /// Materialgruppe
    pub category: String,

    /// Geschätzte Stückzahl (abgeschnitten)
    pub quantity: u32,

    /// Gesamtgewicht der Position in kg, falls Stückgewicht bekannt
    pub weight_kg: Option<f64>,
}

/// Schätzt den Materialbedarf für eine Gerüstfläche
///
/// Stückzahl = trunc(ratio_typical x Fläche / 100). Positionen mit
/// Stückzahl null bleiben in der Liste; der Aufrufer entscheidet über die
/// Darstellung.
pub fn estimate(area_m2: f64, ratios: &[ReferenceRatio]) -> Vec<MaterialLine> {
    let factor = (area_m2 / 100.0).max(0.0);
    ratios
        .iter()
        .map(|r| {
            let quantity = (r.ratio_typical * factor).trunc() as u32;
            MaterialLine {
                article: r.article.clone(),
                category: r.category.clone(),
                quantity,
                weight_kg: r.weight_kg.map(|w| w * quantity as f64),
            }
        })
        .collect()
}

/// Summiert das Gesamtgewicht aller Positionen mit bekanntem Stückgewicht
pub fn total_weight_kg(lines: &[MaterialLine]) -> f64 {
    lines.iter().filter_map(|l| l.weight_kg).sum()
}

/// Marktübliche Feldlängen für Fassadengerüste, absteigend, in Metern
pub const STANDARD_FIELD_LENGTHS_M: [f64; 6] = [3.07, 2.57, 2.07, 1.57, 1.09, 0.73];

/// Unterhalb dieses Rests wird kein Feld mehr gestellt, in Metern
pub const MIN_REMAINDER_M: f64 = 0.5;

/// Feldeinteilung einer Gerüstlänge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldLayout {
    /// Gewählte Feldlängen in Stellreihenfolge
    pub fields: Vec<f64>,

    /// Abgedeckte Länge in Metern
    pub covered_m: f64,

    /// Verbleibende Lücke in Metern
    pub remainder_m: f64,
}

/// Greedy-Feldeinteilung mit den Standard-Feldlängen
pub fn tile_fields(length_m: f64) -> FieldLayout {
    tile_fields_with(length_m, &STANDARD_FIELD_LENGTHS_M)
}

/// Greedy-Feldeinteilung: grösstes passendes Feld zuerst
///
/// Bricht ab, sobald der Rest unter 0.5 m fällt oder kein Feld mehr passt;
/// der Rest wird ausgewiesen. `lengths` muss absteigend sortiert sein.
pub fn tile_fields_with(length_m: f64, lengths: &[f64]) -> FieldLayout {
    let mut fields = Vec::new();
    let mut remaining = length_m.max(0.0);
    while remaining >= MIN_REMAINDER_M {
        match lengths.iter().find(|&&l| l <= remaining + 1e-9) {
            Some(&l) => {
                fields.push(l);
                remaining -= l;
            }
            None => break,
        }
    }
    FieldLayout {
        covered_m: length_m.max(0.0) - remaining,
        remainder_m: remaining,
        fields,
    }
}
