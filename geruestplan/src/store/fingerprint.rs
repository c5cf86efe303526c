//! Fingerabdruck eines Gebäudezustands
//!
//! Der Fingerabdruck deckt Grundriss und Höhen ab. Gespeicherte Kontexte
//! tragen ihn mit; weicht der aktuelle Abdruck ab, hat sich das Gebäude
//! geändert und der Kontext wird neu gerechnet. Der Ring wird auf den
//! lexikographisch kleinsten Startpunkt gedreht, damit identische
//! Polygone mit verschiedenem Startvertex denselben Abdruck ergeben.

use blake3::Hasher;
use geo::Coord;
use npk114::Footprint;

/// Koordinatenquantisierung auf Millimeter
const COORD_SCALE: f64 = 1_000.0;
/// Höhenquantisierung auf Zentimeter
const HEIGHT_SCALE: f64 = 100.0;

/// Berechnet den Fingerabdruck aus Grundriss und Höhen
pub fn context_fingerprint(
    footprint: &Footprint,
    traufhoehe_m: Option<f64>,
    firsthoehe_m: Option<f64>,
    gebaeudehoehe_m: Option<f64>,
) -> [u8; 32] {
    let mut hasher = Hasher::new();

    hasher.update(b"RING");
    hash_ring_normalized(&mut hasher, footprint.points());

    hasher.update(b"HEIGHTS");
    hash_height(&mut hasher, traufhoehe_m);
    hash_height(&mut hasher, firsthoehe_m);
    hash_height(&mut hasher, gebaeudehoehe_m);

    *hasher.finalize().as_bytes()
}

/// Hasht einen offenen Ring ab dem lexikographisch kleinsten Vertex
fn hash_ring_normalized(hasher: &mut Hasher, ring: &[Coord<f64>]) {
    if ring.is_empty() {
        return;
    }

    let min_idx = (0..ring.len())
        .min_by(|&a, &b| {
            let ca = &ring[a];
            let cb = &ring[b];
            ca.x.partial_cmp(&cb.x)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| ca.y.partial_cmp(&cb.y).unwrap_or(std::cmp::Ordering::Equal))
        })
        .unwrap_or(0);

    for i in 0..ring.len() {
        let coord = ring[(min_idx + i) % ring.len()];
        let x = (coord.x * COORD_SCALE).round() as i64;
        let y = (coord.y * COORD_SCALE).round() as i64;
        hasher.update(&x.to_le_bytes());
        hasher.update(&y.to_le_bytes());
    }
}

fn hash_height(hasher: &mut Hasher, height_m: Option<f64>) {
    match height_m {
        Some(h) => {
            hasher.update(&[1]);
            hasher.update(&((h * HEIGHT_SCALE).round() as i64).to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

/// Fingerabdruck in Hexadezimaldarstellung
pub fn fingerprint_hex(fingerprint: &[u8; 32]) -> String {
    hex::encode(fingerprint)
}
