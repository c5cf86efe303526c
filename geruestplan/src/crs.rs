//! Schweizer Koordinatensysteme LV03 (EPSG:21781) und LV95 (EPSG:2056)
//!
//! Koordinaten tragen ihr Bezugssystem explizit; Umrechnungen sind immer
//! ausdrückliche Aufrufe. Die WGS84-Umrechnung verwendet die
//! Näherungsformeln von swisstopo (Genauigkeit im Dezimeterbereich), der
//! Wechsel LV03/LV95 den konstanten Versatz von +2'000'000 m / +1'000'000 m
//! (Abweichung gegenüber der strengen Transformation unter 1.6 m).

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Bezugssystem einer Landeskoordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordSystem {
    /// Landesvermessung 1903 (Bern-Offset 600'000 / 200'000)
    Lv03,
    /// Landesvermessung 1995 (Bern-Offset 2'600'000 / 1'200'000)
    Lv95,
}

impl fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordSystem::Lv03 => write!(f, "LV03"),
            CoordSystem::Lv95 => write!(f, "LV95"),
        }
    }
}

impl CoordSystem {
    /// EPSG-Code des Bezugssystems
    pub fn epsg(self) -> u32 {
        match self {
            CoordSystem::Lv03 => 21781,
            CoordSystem::Lv95 => 2056,
        }
    }
}

/// Versatz LV03 -> LV95 in Ost-Richtung, Meter
const LV95_E_OFFSET: f64 = 2_000_000.0;
/// Versatz LV03 -> LV95 in Nord-Richtung, Meter
const LV95_N_OFFSET: f64 = 1_000_000.0;

/// Eine Landeskoordinate mit explizitem Bezugssystem
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Koordinate {
    pub system: CoordSystem,

    /// Ostwert in Metern
    pub e: f64,

    /// Nordwert in Metern
    pub n: f64,
}

impl Koordinate {
    pub fn lv95(e: f64, n: f64) -> Self {
        Self {
            system: CoordSystem::Lv95,
            e,
            n,
        }
    }

    pub fn lv03(e: f64, n: f64) -> Self {
        Self {
            system: CoordSystem::Lv03,
            e,
            n,
        }
    }

    /// Rechnet in LV95 um (Identität falls bereits LV95)
    pub fn to_lv95(self) -> Koordinate {
        match self.system {
            CoordSystem::Lv95 => self,
            CoordSystem::Lv03 => Koordinate::lv95(self.e + LV95_E_OFFSET, self.n + LV95_N_OFFSET),
        }
    }

    /// Rechnet in LV03 um (Identität falls bereits LV03)
    pub fn to_lv03(self) -> Koordinate {
        match self.system {
            CoordSystem::Lv03 => self,
            CoordSystem::Lv95 => Koordinate::lv03(self.e - LV95_E_OFFSET, self.n - LV95_N_OFFSET),
        }
    }

    /// Rechnet in geographische WGS84-Koordinaten um (Grad)
    pub fn to_wgs84(self) -> Wgs84 {
        let lv95 = self.to_lv95();
        lv95_to_wgs84(lv95.e, lv95.n)
    }
}

impl fmt::Display for Koordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2} / {:.2}", self.system, self.e, self.n)
    }
}

/// Geographische Koordinate in Grad
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wgs84 {
    pub lon_deg: f64,

    pub lat_deg: f64,
}

/// LV95 -> WGS84 nach den swisstopo-Näherungsformeln
///
/// 1. Hilfsgrössen relativ zum Ursprung Bern
/// 2. Polynome für Länge und Breite in 10000"-Einheiten
/// 3. Umrechnung in Grad
fn lv95_to_wgs84(e: f64, n: f64) -> Wgs84 {
    let y = (e - 2_600_000.0) / 1_000_000.0;
    let x = (n - 1_200_000.0) / 1_000_000.0;

    let lon = 2.6779094 + 4.728982 * y + 0.791484 * y * x + 0.1306 * y * x * x
        - 0.0436 * y * y * y;
    let lat = 16.9023892 + 3.238272 * x
        - 0.270978 * y * y
        - 0.002528 * x * x
        - 0.0447 * y * y * x
        - 0.0140 * x * x * x;

    Wgs84 {
        lon_deg: lon * 100.0 / 36.0,
        lat_deg: lat * 100.0 / 36.0,
    }
}

/// WGS84 -> LV95 nach den swisstopo-Näherungsformeln
pub fn wgs84_to_lv95(lon_deg: f64, lat_deg: f64) -> Koordinate {
    let lat_aux = (lat_deg * 3600.0 - 169_028.66) / 10_000.0;
    let lon_aux = (lon_deg * 3600.0 - 26_782.5) / 10_000.0;

    let e = 2_600_072.37 + 211_455.93 * lon_aux
        - 10_938.51 * lon_aux * lat_aux
        - 0.36 * lon_aux * lat_aux * lat_aux
        - 44.54 * lon_aux.powi(3);
    let n = 1_200_147.07 + 308_807.95 * lat_aux + 3_745.25 * lon_aux * lon_aux
        + 76.63 * lat_aux * lat_aux
        - 194.56 * lon_aux * lon_aux * lat_aux
        + 119.79 * lat_aux.powi(3);

    Koordinate::lv95(e, n)
}

/// True wenn die Werte im Schweizer LV95-Bereich liegen
pub fn in_lv95_range(e: f64, n: f64) -> bool {
    (2_450_000.0..=2_850_000.0).contains(&e) && (1_050_000.0..=1_300_000.0).contains(&n)
}

/// True wenn die Werte im Schweizer LV03-Bereich liegen
pub fn in_lv03_range(e: f64, n: f64) -> bool {
    (450_000.0..=850_000.0).contains(&e) && (50_000.0..=300_000.0).contains(&n)
}

/// True wenn die Werte als WGS84-Länge/Breite in der Schweiz liegen
pub fn in_wgs84_ch_range(lon_deg: f64, lat_deg: f64) -> bool {
    (5.0..=11.0).contains(&lon_deg) && (45.0..=48.0).contains(&lat_deg)
}

/// Errät das Bezugssystem aus der Grössenordnung der Werte
///
/// Nur für Altdaten ohne CRS-Angabe an der Systemgrenze gedacht; jede
/// Verwendung wird geloggt. Werte ausserhalb der Schweizer Wertebereiche
/// sind ein Fehler.
pub fn detect_system(e: f64, n: f64) -> Result<CoordSystem> {
    let system = if in_lv95_range(e, n) {
        CoordSystem::Lv95
    } else if in_lv03_range(e, n) {
        CoordSystem::Lv03
    } else {
        bail!("coordinates {e:.1} / {n:.1} are outside both LV03 and LV95 ranges");
    };
    warn!(e, n, system = %system, "Coordinate system guessed from magnitude, payload carried no CRS");
    Ok(system)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bern_reference_point() {
        // Alte Sternwarte Bern: Ursprung der Landesvermessung
        let geo = Koordinate::lv95(2_600_000.0, 1_200_000.0).to_wgs84();
        assert!((geo.lon_deg - 7.438632).abs() < 1e-4, "lon={}", geo.lon_deg);
        assert!((geo.lat_deg - 46.951083).abs() < 1e-4, "lat={}", geo.lat_deg);
    }

    #[test]
    fn test_zuerich_hb() {
        // Zürich Hauptbahnhof, ungefähr
        let geo = Koordinate::lv95(2_683_000.0, 1_248_000.0).to_wgs84();
        assert!((geo.lon_deg - 8.537).abs() < 0.01, "lon={}", geo.lon_deg);
        assert!((geo.lat_deg - 47.379).abs() < 0.01, "lat={}", geo.lat_deg);
    }

    #[test]
    fn test_wgs84_round_trip() {
        let start = Koordinate::lv95(2_600_000.0, 1_199_750.0);
        let geo = start.to_wgs84();
        let back = wgs84_to_lv95(geo.lon_deg, geo.lat_deg);
        assert!((back.e - start.e).abs() < 1.0, "e={}", back.e);
        assert!((back.n - start.n).abs() < 1.0, "n={}", back.n);
    }

    #[test]
    fn test_lv03_lv95_offset() {
        let lv03 = Koordinate::lv03(600_000.0, 200_000.0);
        let lv95 = lv03.to_lv95();
        assert_eq!(lv95.system, CoordSystem::Lv95);
        assert_eq!(lv95.e, 2_600_000.0);
        assert_eq!(lv95.n, 1_200_000.0);
        assert_eq!(lv95.to_lv03(), lv03);
    }

    #[test]
    fn test_to_lv95_identity() {
        let k = Koordinate::lv95(2_683_000.0, 1_248_000.0);
        assert_eq!(k.to_lv95(), k);
    }

    #[test]
    fn test_detect_system() {
        assert_eq!(detect_system(2_600_000.0, 1_200_000.0).unwrap(), CoordSystem::Lv95);
        assert_eq!(detect_system(600_000.0, 200_000.0).unwrap(), CoordSystem::Lv03);
        assert!(detect_system(8.5, 47.4).is_err(), "WGS84 degrees must be rejected");
    }

    #[test]
    fn test_range_helpers() {
        assert!(in_lv95_range(2_600_000.0, 1_200_000.0));
        assert!(!in_lv95_range(600_000.0, 200_000.0));
        assert!(in_lv03_range(600_000.0, 200_000.0));
        assert!(in_wgs84_ch_range(7.44, 46.95));
        assert!(!in_wgs84_ch_range(2.35, 48.86), "Paris lies outside the Swiss window");
    }

    #[test]
    fn test_epsg_codes() {
        assert_eq!(CoordSystem::Lv03.epsg(), 21781);
        assert_eq!(CoordSystem::Lv95.epsg(), 2056);
    }
}
