//! # geruestplan
//!
//! Gerüstausmass nach NPK 114 aus Gebäudegrundrissen der amtlichen Vermessung.
//!
//! ## Features
//!
//! - Ausmass nach NPK 114 mit Giebelmittelung und Höhenzuschlag
//! - Zonenzerlegung mit Feldeinteilung und SUVA-Zugangsprüfung
//! - Höhenauflösung aus PostgreSQL, JSON-Datei oder GWR-Schätzung
//! - Wiederverwendbare Gebäudekontexte in PostgreSQL
//!
//! ## Usage CLI
//!
//! ```bash
//! # Ausmass ohne Datenbank
//! geruestplan berechnen --length 20 --width 12 --traufhoehe 6.5
//! geruestplan berechnen --path ./gebaeude.geojson --traufhoehe 6.5
//!
//! # Volle Analyse mit GWR-Daten und Bericht pro Gebäude
//! geruestplan analysieren --path ./gebaeude.geojson --gwr ./gebaeude.tsv --egid 190325798
//! ```

pub mod cli;
pub mod config;
pub mod crs;
pub mod gwr;
pub mod height;
pub mod oracle;
pub mod pipeline;
pub mod provider;
pub mod report;
pub mod store;
pub mod zonen;

pub use config::Config;
pub use report::{ReportStatus, ScaffoldReport};
pub use store::pool::{create_pool, DatabaseConfig};
