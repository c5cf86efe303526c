//! Durchgerechnete Normszenarien über die öffentliche API

use npk114::access::AccessPlanner;
use npk114::ausmass::{ausmass_grundriss, ausmass_rechteck};
use npk114::complexity::{classify_structure, Complexity};
use npk114::facade::facade_segments;
use npk114::material::{estimate, tile_fields, ReferenceRatio};
use npk114::types::{BuildingGeometry, Footprint, RoofForm, WidthClass};

/// Mehrfamilienhaus 20 x 12 m, Traufe 6.5 m, First 10.0 m, Satteldach, W09
///
/// Traufseiten: 22.0 x 7.5 = 165.0 m², Giebelseiten: 14.0 x 9.25 = 129.5 m²,
/// Eckzuschlag 4 x 1.0 x 8.375 = 33.5 m², Total 622.5 m².
#[test]
fn test_mfh_satteldach_komplett() {
    let grundriss =
        Footprint::from_pairs(&[[0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]).unwrap();
    let geometry = BuildingGeometry::from_footprint(grundriss);
    assert_eq!(geometry.area_m2, 240.0);
    assert_eq!(geometry.perimeter_m, 64.0);
    assert_eq!(classify_structure(geometry.footprint.points(), Some(geometry.area_m2), None, &[]), Complexity::Simple);

    let ausmass = ausmass_rechteck(
        RoofForm::Sattel,
        geometry.length_m,
        geometry.width_m,
        6.5,
        Some(10.0),
        WidthClass::W09,
    )
    .expect("valid inputs");
    assert_eq!(ausmass.facade_area_m2, 589.0);
    assert_eq!(ausmass.corner_surcharge_m2, 33.5);
    assert_eq!(ausmass.total_area_m2, 622.5);
}

/// Einfamilienhaus 10 x 8 m, Flachdach 7.0 m, W09
#[test]
fn test_efh_flachdach() {
    let ausmass = ausmass_rechteck(RoofForm::Flach, 10.0, 8.0, 7.0, None, WidthClass::W09)
        .expect("valid inputs");
    // 2 x (12 x 8) + 2 x (10 x 8) = 352, Ecken 4 x 1.0 x 8 = 32
    assert_eq!(ausmass.facade_area_m2, 352.0);
    assert_eq!(ausmass.total_area_m2, 384.0);
}

/// L-förmiges Gebäude: einzeln vermessene Fassaden, eine Ecke pro Fassade
#[test]
fn test_l_form_einzelfassaden() {
    let grundriss = Footprint::from_pairs(&[
        [0.0, 0.0],
        [20.0, 0.0],
        [20.0, 6.0],
        [10.0, 6.0],
        [10.0, 12.0],
        [0.0, 12.0],
    ])
    .unwrap();
    let segments = facade_segments(grundriss.points());
    assert_eq!(segments.len(), 6);

    let total_length: f64 = segments.iter().map(|s| s.length_m).sum();
    assert!((total_length - 64.0).abs() < 1e-9, "perimeter invariant");

    let ausmass = ausmass_grundriss(&segments, 6.5, WidthClass::W09);
    assert_eq!(ausmass.corner_count, 6);
    // Längen + 2.0: 22, 8, 12, 8, 12, 14 -> x 7.5
    assert_eq!(ausmass.facade_area_m2, 570.0);
    // + 6 x 1.0 x 7.5 = 45
    assert_eq!(ausmass.total_area_m2, 615.0);

    // Konkav: strukturell komplex
    assert_eq!(
        classify_structure(grundriss.points(), None, None, &[]),
        Complexity::Complex
    );
}

/// Kleiner Anbau: beide Normminima greifen
#[test]
fn test_minima_anbau() {
    let ausmass = ausmass_rechteck(RoofForm::Flach, 2.0, 1.5, 2.5, None, WidthClass::W06)
        .expect("valid inputs");
    for f in &ausmass.facades {
        assert!(f.ausmass_height_m >= 4.0);
        assert!(f.ausmass_length_m >= 2.5);
    }
    assert_eq!(ausmass.facade_area_m2, 56.8);
    assert_eq!(ausmass.total_area_m2, 71.2);
}

/// Ausmass, Material und Feldeinteilung im Zusammenspiel
#[test]
fn test_material_aus_ausmass() {
    let ausmass = ausmass_rechteck(RoofForm::Sattel, 20.0, 12.0, 6.5, Some(10.0), WidthClass::W09)
        .expect("valid inputs");
    let ratios = vec![ReferenceRatio {
        article: "Vertikalrahmen 2.00 m".into(),
        category: "Rahmen".into(),
        ratio_min: 24.0,
        ratio_typical: 28.0,
        ratio_max: 32.0,
        weight_kg: Some(19.2),
    }];
    let lines = estimate(ausmass.total_area_m2, &ratios);
    assert_eq!(lines[0].quantity, 174, "28 x 6.225 abgeschnitten");

    // Feldeinteilung der längsten Fassade
    let layout = tile_fields(ausmass.facades[0].ausmass_length_m);
    assert!(!layout.fields.is_empty());
    assert!(layout.remainder_m < 3.07);
    let sum: f64 = layout.fields.iter().sum();
    assert!((sum + layout.remainder_m - 22.0).abs() < 1e-6);
}

/// Zugangsplanung für ein Gewerbegebäude mit 220 m Umfang
#[test]
fn test_zugangsplanung_gewerbe() {
    let grundriss =
        Footprint::from_pairs(&[[0.0, 0.0], [80.0, 0.0], [80.0, 30.0], [0.0, 30.0]]).unwrap();
    let geometry = BuildingGeometry::from_footprint(grundriss);
    let plan = AccessPlanner::default().plan(&geometry.facades);
    assert_eq!(plan.required_count, 5);
    assert_eq!(plan.access_points.len(), 5);
    assert!(plan.suva_compliant, "max egress {}", plan.max_egress_m);
    assert!(plan.max_egress_m <= 50.0);
}
