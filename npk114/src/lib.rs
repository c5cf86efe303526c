//! # npk114
//!
//! Gerüstbau-Ausmass nach NPK 114 (Schweizer Normpositionen-Katalog, Kapitel
//! Gerüste) für Fassadengerüste.
//!
//! ## Funktionsumfang
//!
//! - Geometrie-Kern: Fläche, Umfang, Konvexität, Fassadenableitung mit
//!   8-Sektoren-Himmelsrichtungen
//! - Ausmassberechnung mit Norm-Zuschlägen (LF, LG, Höhenzuschlag) und
//!   Minima, Dachform-Voreinstellungen und Eckzuschlag
//! - Komplexitätsklassifizierung (strukturell und für die Darstellung)
//! - Zugangsplanung nach SUVA-Fluchtwegregeln
//! - Materialbedarfsschätzung aus Referenzverhältnissen
//!
//! ## Verwendung
//!
//! ```rust,ignore
//! use npk114::{geruest_ausmass, Footprint, WidthClass};
//!
//! let grundriss = Footprint::from_pairs(&[
//!     [0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0],
//! ])?;
//! let ausmass = geruest_ausmass(&grundriss, 6.5, WidthClass::W09);
//! println!("Total: {} m2", ausmass.total_area_m2);
//! ```

pub mod access;
pub mod ausmass;
pub mod complexity;
pub mod error;
pub mod facade;
pub mod geometry;
pub mod material;
pub mod types;
pub mod zone;

pub use ausmass::{FacadeMeasurement, GeruestAusmass};
pub use complexity::Complexity;
pub use error::NpkError;
pub use types::{
    BuildingGeometry, BoundingBox, Direction, FacadeSegment, Footprint, RoofForm, WidthClass,
};
pub use zone::{BuildingContext, BuildingZone, ContextSource, StructuralFlags, TerrainInfo, ZoneType};

/// Berechnet das Gerüstausmass direkt aus einem Grundriss.
///
/// # Arguments
///
/// * `footprint` - Normalisierter Gebäudegrundriss
/// * `traufhoehe_m` - Fassadenhöhe für alle Fassaden, in Metern
/// * `class` - Gerüst-Breitenklasse
///
/// # Returns
///
/// Das aggregierte `GeruestAusmass` mit einer Position pro Fassade und dem
/// Eckzuschlag über eine Ecke pro Fassade.
pub fn geruest_ausmass(
    footprint: &Footprint,
    traufhoehe_m: f64,
    class: WidthClass,
) -> GeruestAusmass {
    // 1. Fassaden aus dem Grundriss ableiten
    let facades = facade::facade_segments(footprint.points());

    // 2. Jede Fassade einzeln vermessen und aggregieren
    ausmass::ausmass_grundriss(&facades, traufhoehe_m, class)
}
