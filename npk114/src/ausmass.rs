//! Ausmassberechnung für Fassadengerüste nach NPK 114
//!
//! Das Ausmass vergütet die gerüstete Fläche, nicht die Fassadenfläche:
//! seitlich kommt pro Gerüstende der Zuschlag LS = LF + LG dazu, in der
//! Höhe der Zuschlag von einem Meter über der Arbeitshöhe. Für beide Masse
//! gelten Normminima.

use serde::{Deserialize, Serialize};

use crate::error::NpkError;
use crate::types::{Direction, FacadeSegment, RoofForm, WidthClass};

/// Fassadenabstand LF: Abstand der Belagkante zur Fassade, in Metern
pub const FACADE_CLEARANCE_M: f64 = 0.30;

/// Höhenzuschlag über der Fassadenhöhe, in Metern
pub const HEIGHT_SURCHARGE_M: f64 = 1.00;

/// Minimale verrechenbare Gerüstlänge, in Metern
pub const MIN_AUSMASS_LENGTH_M: f64 = 2.5;

/// Minimale verrechenbare Gerüsthöhe, in Metern
pub const MIN_AUSMASS_HEIGHT_M: f64 = 4.0;

/// Höhenanteil des Giebels über der Traufe beim Satteldach
const GABLE_MEAN_FACTOR: f64 = 0.5;

/// Höhenanteil des Firsts über der Traufe beim Walmdach
const HIP_MEAN_FACTOR: f64 = 0.25;

/// Seitlicher Zuschlag LS = LF + LG pro Gerüstende, in Metern
pub fn side_surcharge_m(class: WidthClass) -> f64 {
    FACADE_CLEARANCE_M + class.gangway_width_m()
}

/// Kaufmännisches Runden auf 2 Dezimalstellen (5 rundet auf)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Gemittelte Fassadenhöhe einer Giebelfassade (Satteldach)
///
/// Der Giebel wird über die halbe Höhendifferenz zwischen Traufe und First
/// abgegolten. Ein First unterhalb der Traufe wird auf die Traufe begrenzt.
pub fn gable_mean_height(traufhoehe_m: f64, firsthoehe_m: f64) -> f64 {
    let first = firsthoehe_m.max(traufhoehe_m);
    traufhoehe_m + (first - traufhoehe_m) * GABLE_MEAN_FACTOR
}

/// Gemittelte Fassadenhöhe beim Walmdach (auf allen Fassaden)
pub fn hip_mean_height(traufhoehe_m: f64, firsthoehe_m: f64) -> f64 {
    let first = firsthoehe_m.max(traufhoehe_m);
    traufhoehe_m + (first - traufhoehe_m) * HIP_MEAN_FACTOR
}

/// Ausmass einer einzelnen Fassade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacadeMeasurement {
    /// Bezeichnung der Position (z.B. "Traufseite 1")
    pub name: String,

    /// Himmelsrichtung, falls aus dem Grundriss abgeleitet
    pub direction: Option<Direction>,

    /// Fassadenlänge vor Zuschlägen, in Metern
    pub input_length_m: f64,

    /// Fassadenhöhe vor Zuschlägen (bei Giebeln die gemittelte Höhe)
    pub input_height_m: f64,

    /// Angewendeter seitlicher Zuschlag LS pro Gerüstende
    pub clearance_surcharge_m: f64,

    /// Verrechenbare Gerüstlänge LS + L + LS, mindestens 2.5 m
    pub ausmass_length_m: f64,

    /// Verrechenbare Gerüsthöhe H + 1.0 m, mindestens 4.0 m
    pub ausmass_height_m: f64,

    /// Verrechenbare Fläche, kaufmännisch auf 2 Dezimalstellen gerundet
    pub area_m2: f64,
}

/// Berechnet das Ausmass einer Fassade nach NPK 114
///
/// 1. Länge: LS + L + LS, mindestens 2.5 m
/// 2. Höhe: H + 1.0 m, mindestens 4.0 m
/// 3. Fläche: Länge x Höhe, kaufmännisch gerundet
pub fn measure_facade(
    name: impl Into<String>,
    direction: Option<Direction>,
    length_m: f64,
    height_m: f64,
    class: WidthClass,
) -> FacadeMeasurement {
    let ls = side_surcharge_m(class);
    let ausmass_length_m = (ls + length_m + ls).max(MIN_AUSMASS_LENGTH_M);
    let ausmass_height_m = (height_m + HEIGHT_SURCHARGE_M).max(MIN_AUSMASS_HEIGHT_M);
    FacadeMeasurement {
        name: name.into(),
        direction,
        input_length_m: length_m,
        input_height_m: height_m,
        clearance_surcharge_m: ls,
        ausmass_length_m,
        ausmass_height_m,
        area_m2: round2(ausmass_length_m * ausmass_height_m),
    }
}

/// Gesamtausmass eines Gebäudes oder einer Zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeruestAusmass {
    /// Verwendete Breitenklasse
    pub width_class: WidthClass,

    /// Ausmass pro Fassade
    pub facades: Vec<FacadeMeasurement>,

    /// Summe der Fassadenflächen, in m²
    pub facade_area_m2: f64,

    /// Anzahl verrechneter Gebäudeecken
    pub corner_count: usize,

    /// Eckzuschlag: Ecken x LS x mittlere Gerüsthöhe, in m²
    pub corner_surcharge_m2: f64,

    /// Gesamtausmass inkl. Eckzuschlag, in m²
    pub total_area_m2: f64,
}

/// Aggregiert Fassadenausmasse mit dem Eckzuschlag
///
/// Die mittlere Gerüsthöhe ist das arithmetische Mittel der verrechenbaren
/// Fassadenhöhen; ohne Fassaden entfällt der Eckzuschlag.
pub fn aggregate(
    facades: Vec<FacadeMeasurement>,
    corner_count: usize,
    class: WidthClass,
) -> GeruestAusmass {
    let facade_area_m2 = round2(facades.iter().map(|f| f.area_m2).sum());
    let mean_height = if facades.is_empty() {
        0.0
    } else {
        facades.iter().map(|f| f.ausmass_height_m).sum::<f64>() / facades.len() as f64
    };
    let corner_surcharge_m2 = round2(corner_count as f64 * side_surcharge_m(class) * mean_height);
    GeruestAusmass {
        width_class: class,
        facade_area_m2,
        corner_count,
        corner_surcharge_m2,
        total_area_m2: round2(facade_area_m2 + corner_surcharge_m2),
        facades,
    }
}

/// Ausmass über das Rechteckmodell (Länge x Breite) mit Dachform-Voreinstellung
///
/// Beim Satteldach liegen die Traufseiten auf den Längsfassaden und die
/// Giebelseiten auf den Querfassaden; beim Walmdach gilt die reduzierte
/// Mittelhöhe auf allen vier Fassaden. Der Eckzuschlag rechnet mit 4 Ecken.
///
/// # Errors
///
/// `NpkError::InvalidInput` bei nicht positiven Massen oder fehlender
/// Firsthöhe für Sattel- und Walmdach.
pub fn ausmass_rechteck(
    roof: RoofForm,
    length_m: f64,
    width_m: f64,
    traufhoehe_m: f64,
    firsthoehe_m: Option<f64>,
    class: WidthClass,
) -> Result<GeruestAusmass, NpkError> {
    if length_m <= 0.0 || width_m <= 0.0 {
        return Err(NpkError::invalid_input(
            "length/width",
            format!("non-positive dimensions {length_m} x {width_m}"),
        ));
    }
    if traufhoehe_m <= 0.0 {
        return Err(NpkError::invalid_input(
            "traufhoehe_m",
            format!("non-positive height {traufhoehe_m}"),
        ));
    }

    let facades = match roof {
        RoofForm::Flach => vec![
            measure_facade("Längsfassade 1", None, length_m, traufhoehe_m, class),
            measure_facade("Längsfassade 2", None, length_m, traufhoehe_m, class),
            measure_facade("Querfassade 1", None, width_m, traufhoehe_m, class),
            measure_facade("Querfassade 2", None, width_m, traufhoehe_m, class),
        ],
        RoofForm::Sattel => {
            let first = firsthoehe_m.ok_or_else(|| {
                NpkError::invalid_input("firsthoehe_m", "required for roof form sattel")
            })?;
            let giebel = gable_mean_height(traufhoehe_m, first);
            vec![
                measure_facade("Traufseite 1", None, length_m, traufhoehe_m, class),
                measure_facade("Traufseite 2", None, length_m, traufhoehe_m, class),
                measure_facade("Giebelseite 1", None, width_m, giebel, class),
                measure_facade("Giebelseite 2", None, width_m, giebel, class),
            ]
        }
        RoofForm::Walm => {
            let first = firsthoehe_m.ok_or_else(|| {
                NpkError::invalid_input("firsthoehe_m", "required for roof form walm")
            })?;
            let mean = hip_mean_height(traufhoehe_m, first);
            vec![
                measure_facade("Längsfassade 1", None, length_m, mean, class),
                measure_facade("Längsfassade 2", None, length_m, mean, class),
                measure_facade("Querfassade 1", None, width_m, mean, class),
                measure_facade("Querfassade 2", None, width_m, mean, class),
            ]
        }
    };
    Ok(aggregate(facades, 4, class))
}

/// Ausmass über die einzeln vermessenen Fassaden eines Grundrisses
///
/// Jede Fassade wird mit ihrer eigenen Traufhöhe verrechnet, ersatzweise
/// mit `default_height_m`. Der Eckzuschlag rechnet mit einer Ecke pro
/// Fassade (beliebige Polygone).
pub fn ausmass_grundriss(
    facades: &[FacadeSegment],
    default_height_m: f64,
    class: WidthClass,
) -> GeruestAusmass {
    let measured: Vec<FacadeMeasurement> = facades
        .iter()
        .map(|f| {
            measure_facade(
                format!("Fassade {} ({})", f.index + 1, f.direction),
                Some(f.direction),
                f.length_m,
                f.traufhoehe_m.unwrap_or(default_height_m),
                class,
            )
        })
        .collect();
    aggregate(measured, facades.len(), class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Footprint;

    #[test]
    fn test_side_surcharge() {
        assert!((side_surcharge_m(WidthClass::W06) - 0.90).abs() < 1e-9);
        assert!((side_surcharge_m(WidthClass::W09) - 1.00).abs() < 1e-9);
        assert!((side_surcharge_m(WidthClass::W12) - 1.30).abs() < 1e-9);
    }

    #[test]
    fn test_round2_half_up() {
        // 0.125 ist binär exakt darstellbar: 12.5 rundet auf 13
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(1.0 / 3.0), 0.33);
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(129.5), 129.5);
    }

    #[test]
    fn test_measure_facade_minimums() {
        // 0.9 + 0.4 + 0.9 = 2.2 -> Minimum 2.5
        let m = measure_facade("kurz", None, 0.4, 2.0, WidthClass::W06);
        assert!((m.ausmass_length_m - MIN_AUSMASS_LENGTH_M).abs() < 1e-9);
        // 2.0 + 1.0 = 3.0 -> Minimum 4.0
        assert!((m.ausmass_height_m - MIN_AUSMASS_HEIGHT_M).abs() < 1e-9);
        assert_eq!(m.area_m2, 10.0);
    }

    #[test]
    fn test_gable_mean() {
        assert!((gable_mean_height(6.5, 10.0) - 8.25).abs() < 1e-9);
        // First unter Traufe wird begrenzt
        assert!((gable_mean_height(8.0, 6.0) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_hip_mean() {
        assert!((hip_mean_height(6.5, 10.0) - 7.375).abs() < 1e-9);
    }

    /// Referenzszenario: 20 x 12 m, Traufe 6.5 m, First 10.0 m, Satteldach, W09
    #[test]
    fn test_rechteck_satteldach_referenz() {
        let ausmass =
            ausmass_rechteck(RoofForm::Sattel, 20.0, 12.0, 6.5, Some(10.0), WidthClass::W09)
                .expect("valid inputs");

        let trauf = &ausmass.facades[0];
        assert!((trauf.ausmass_length_m - 22.0).abs() < 1e-9, "1.0 + 20 + 1.0");
        assert!((trauf.ausmass_height_m - 7.5).abs() < 1e-9, "6.5 + 1.0");
        assert_eq!(trauf.area_m2, 165.0);

        let giebel = &ausmass.facades[2];
        assert!((giebel.input_height_m - 8.25).abs() < 1e-9);
        assert!((giebel.ausmass_length_m - 14.0).abs() < 1e-9);
        assert!((giebel.ausmass_height_m - 9.25).abs() < 1e-9);
        assert_eq!(giebel.area_m2, 129.5);

        assert_eq!(ausmass.facade_area_m2, 589.0);
        assert_eq!(ausmass.corner_count, 4);
        // 4 x 1.0 x (7.5 + 7.5 + 9.25 + 9.25) / 4 = 33.5
        assert_eq!(ausmass.corner_surcharge_m2, 33.5);
        assert_eq!(ausmass.total_area_m2, 622.5);
    }

    #[test]
    fn test_rechteck_requires_first_for_sattel() {
        let err = ausmass_rechteck(RoofForm::Sattel, 20.0, 12.0, 6.5, None, WidthClass::W09)
            .unwrap_err();
        assert!(err.to_string().contains("firsthoehe_m"));
    }

    #[test]
    fn test_rechteck_rejects_bad_dimensions() {
        assert!(ausmass_rechteck(RoofForm::Flach, 0.0, 12.0, 6.5, None, WidthClass::W09).is_err());
        assert!(ausmass_rechteck(RoofForm::Flach, 20.0, 12.0, -1.0, None, WidthClass::W09).is_err());
    }

    #[test]
    fn test_grundriss_matches_flat_rechteck() {
        let fp = Footprint::from_pairs(&[[0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]).unwrap();
        let segments = crate::facade::facade_segments(fp.points());
        let vom_grundriss = ausmass_grundriss(&segments, 6.5, WidthClass::W09);
        let vom_rechteck =
            ausmass_rechteck(RoofForm::Flach, 20.0, 12.0, 6.5, None, WidthClass::W09).unwrap();
        assert_eq!(vom_grundriss.total_area_m2, vom_rechteck.total_area_m2);
        assert_eq!(vom_grundriss.corner_count, 4);
    }

    #[test]
    fn test_grundriss_respects_facade_heights() {
        let fp = Footprint::from_pairs(&[[0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]).unwrap();
        let mut segments = crate::facade::facade_segments(fp.points());
        segments[1].traufhoehe_m = Some(12.0);
        let ausmass = ausmass_grundriss(&segments, 6.5, WidthClass::W09);
        assert!((ausmass.facades[1].ausmass_height_m - 13.0).abs() < 1e-9);
        assert!((ausmass.facades[0].ausmass_height_m - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_empty() {
        let ausmass = aggregate(Vec::new(), 0, WidthClass::W09);
        assert_eq!(ausmass.total_area_m2, 0.0);
        assert_eq!(ausmass.corner_surcharge_m2, 0.0);
    }
}
