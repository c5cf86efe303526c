//! Geometrie-Kern: Fläche, Umfang, Begrenzungsrechteck, Konvexität
//!
//! Alle Funktionen arbeiten auf einer offenen Punktfolge (Ring ohne
//! Schlusspunkt) und sind gegenüber dem Umlaufsinn invariant.

use geo::Coord;

use crate::types::BoundingBox;

/// Fläche nach der Shoelace-Formel, in m²
///
/// Weniger als 3 Punkte ergeben die Fläche 0 (kein Fehler).
pub fn polygon_area(points: &[Coord<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum.abs() / 2.0
}

/// Umfang in Metern (schliessende Kante eingerechnet)
///
/// Weniger als 3 Punkte ergeben den Umfang 0.
pub fn polygon_perimeter(points: &[Coord<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        sum += distance(a, b);
    }
    sum
}

/// Euklidischer Abstand zweier Punkte
#[inline]
pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// Achsenparalleles Begrenzungsrechteck
pub fn bounding_box(points: &[Coord<f64>]) -> BoundingBox {
    let mut bbox = BoundingBox {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };
    if points.is_empty() {
        return BoundingBox::default();
    }
    for p in points {
        bbox.min_x = bbox.min_x.min(p.x);
        bbox.min_y = bbox.min_y.min(p.y);
        bbox.max_x = bbox.max_x.max(p.x);
        bbox.max_y = bbox.max_y.max(p.y);
    }
    bbox
}

/// Prüft Konvexität über die Vorzeichen der Kreuzprodukte
///
/// Kreuzprodukte von null (kollineare Folgepunkte) gelten als
/// konvexitätserhaltend. Weniger als 4 Punkte sind immer konvex.
pub fn is_convex(points: &[Coord<f64>]) -> bool {
    if points.len() < 4 {
        return true;
    }
    let mut sign = 0.0f64;
    for i in 0..points.len() {
        let cross = cross_at(points, i);
        if cross.abs() < f64::EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// True wenn der Ring sowohl positive als auch negative Kreuzprodukte hat
pub fn has_concave_sections(points: &[Coord<f64>]) -> bool {
    points.len() >= 4 && !is_convex(points)
}

/// Kreuzprodukt der Kanten um den Punkt i
#[inline]
fn cross_at(points: &[Coord<f64>], i: usize) -> f64 {
    let n = points.len();
    let p0 = points[i];
    let p1 = points[(i + 1) % n];
    let p2 = points[(i + 2) % n];
    let d1 = Coord {
        x: p1.x - p0.x,
        y: p1.y - p0.y,
    };
    let d2 = Coord {
        x: p2.x - p1.x,
        y: p2.y - p1.y,
    };
    d1.x * d2.y - d1.y * d2.x
}

/// Seitenverhältnis des Begrenzungsrechtecks (Breite / Höhe)
///
/// Eine Ausdehnung von null ergibt 0 statt einer Division durch null.
pub fn aspect_ratio(points: &[Coord<f64>]) -> f64 {
    let bbox = bounding_box(points);
    if bbox.height() < f64::EPSILON {
        return 0.0;
    }
    bbox.width() / bbox.height()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(pairs: &[[f64; 2]]) -> Vec<Coord<f64>> {
        pairs.iter().map(|p| Coord { x: p[0], y: p[1] }).collect()
    }

    #[test]
    fn test_area_rectangle() {
        let pts = coords(&[[0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]);
        assert!((polygon_area(&pts) - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_area_orientation_invariant() {
        let cw = coords(&[[0.0, 0.0], [0.0, 12.0], [20.0, 12.0], [20.0, 0.0]]);
        assert!((polygon_area(&cw) - 240.0).abs() < 1e-9, "clockwise ring must give the same area");
    }

    #[test]
    fn test_area_triangle() {
        let pts = coords(&[[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]]);
        assert!((polygon_area(&pts) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_area_degenerate_inputs() {
        assert_eq!(polygon_area(&[]), 0.0);
        assert_eq!(polygon_area(&coords(&[[1.0, 1.0]])), 0.0);
        assert_eq!(polygon_area(&coords(&[[0.0, 0.0], [5.0, 5.0]])), 0.0);
    }

    #[test]
    fn test_perimeter_rectangle() {
        let pts = coords(&[[0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]);
        assert!((polygon_perimeter(&pts) - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_perimeter_degenerate() {
        assert_eq!(polygon_perimeter(&coords(&[[0.0, 0.0], [5.0, 0.0]])), 0.0);
    }

    #[test]
    fn test_bounding_box() {
        let pts = coords(&[[2.0, 1.0], [8.0, 3.0], [5.0, 9.0]]);
        let bbox = bounding_box(&pts);
        assert_eq!(bbox.min_x, 2.0);
        assert_eq!(bbox.max_x, 8.0);
        assert_eq!(bbox.min_y, 1.0);
        assert_eq!(bbox.max_y, 9.0);
        assert_eq!(bbox.width(), 6.0);
        assert_eq!(bbox.height(), 8.0);
    }

    #[test]
    fn test_convex_rectangle() {
        let pts = coords(&[[0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]);
        assert!(is_convex(&pts));
        assert!(!has_concave_sections(&pts));
    }

    #[test]
    fn test_concave_l_shape() {
        let pts = coords(&[
            [0.0, 0.0],
            [20.0, 0.0],
            [20.0, 6.0],
            [10.0, 6.0],
            [10.0, 12.0],
            [0.0, 12.0],
        ]);
        assert!(!is_convex(&pts));
        assert!(has_concave_sections(&pts));
    }

    #[test]
    fn test_convex_with_collinear_point() {
        // Kollinearer Zwischenpunkt auf der Südkante
        let pts = coords(&[[0.0, 0.0], [10.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]);
        assert!(is_convex(&pts), "zero cross products must not break convexity");
    }

    #[test]
    fn test_aspect_ratio() {
        let pts = coords(&[[0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]);
        assert!((aspect_ratio(&pts) - 20.0 / 12.0).abs() < 1e-9);
    }
}
