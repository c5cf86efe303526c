//! Fehlertypen für das Crate npk114

use thiserror::Error;

/// Fehler bei der Geometrie- und Ausmassberechnung
#[derive(Debug, Error)]
pub enum NpkError {
    /// Grundriss mit zu wenigen oder entarteten Punkten
    #[error("Degenerate footprint: {reason}")]
    DegenerateFootprint { reason: String },

    /// Ungültiger Eingabewert (Masse, Höhen, Toleranzen)
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Unbekannte Breitenklasse
    #[error("Unknown width class: {0} (expected w06, w09 or w12)")]
    UnknownWidthClass(String),

    /// Unbekannte Dachform
    #[error("Unknown roof form: {0} (expected flach, sattel or walm)")]
    UnknownRoofForm(String),

    /// Zonentyp ausserhalb der geschlossenen Menge
    #[error("Unknown zone type: {0}")]
    UnknownZoneType(String),
}

impl NpkError {
    /// Erstellt einen Fehler für einen entarteten Grundriss
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateFootprint {
            reason: reason.into(),
        }
    }

    /// Erstellt einen Eingabefehler mit Feldname und Begründung
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
