//! Leser für den GWR-Gebäudeexport (Eidg. Gebäude- und Wohnungsregister)
//!
//! Erwartet die tabulatorgetrennte Gebäudedatei mit Kopfzeile; die Spalten
//! werden über ihre Namen adressiert, nicht über feste Positionen. Die
//! Datei ist je nach Bezugsquelle UTF-8 oder Latin-1 codiert.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::crs::Koordinate;

/// Ein Gebäudedatensatz aus dem GWR
#[derive(Debug, Clone, Default)]
pub struct GwrRecord {
    /// Eidgenössischer Gebäudeidentifikator
    pub egid: u64,

    /// Kantonskürzel
    pub gdekt: Option<String>,

    /// Gebäudekategorie (GKAT, z.B. 1020 = reines Wohngebäude)
    pub gkat: Option<u16>,

    /// Gebäudeklasse (GKLAS, z.B. 1110 = Gebäude mit einer Wohnung)
    pub gklas: Option<u16>,

    /// Anzahl Geschosse (GASTW)
    pub gastw: Option<u16>,

    /// Gebäudefläche in m² (GAREA)
    pub garea: Option<f64>,

    /// Baujahr (GBAUJ)
    pub gbauj: Option<u16>,

    /// Gebäudekoordinate in LV95 (GKODE/GKODN)
    pub koordinate: Option<Koordinate>,
}

/// Über die EGID indexierter GWR-Bestand
#[derive(Debug, Default)]
pub struct GwrIndex {
    records: HashMap<u64, GwrRecord>,

    /// Anzahl übersprungener Zeilen (fehlende oder unlesbare EGID)
    pub skipped: usize,
}

impl GwrIndex {
    /// Lädt eine GWR-Gebäudedatei
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading GWR file {}", path.display()))?;
        let index = Self::from_bytes(&bytes)
            .with_context(|| format!("parsing GWR file {}", path.display()))?;
        debug!(
            records = index.len(),
            skipped = index.skipped,
            file = %path.display(),
            "GWR file loaded"
        );
        Ok(index)
    }

    /// Parst GWR-Daten aus Bytes (UTF-8, sonst Latin-1)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match simdutf8::basic::from_utf8(bytes) {
            Ok(text) => Self::from_text(text),
            Err(_) => {
                let (decoded, _, _) = encoding_rs::ISO_8859_15.decode(bytes);
                Self::from_text(&decoded)
            }
        }
    }

    /// Parst GWR-Daten aus bereits decodiertem Text
    pub fn from_text(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        let mut line_start = 0usize;
        let mut header: Option<Columns> = None;
        let mut records = HashMap::new();
        let mut skipped = 0usize;

        for nl in memchr::memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len())) {
            let line = text[line_start..nl].trim_end_matches('\r');
            line_start = nl + 1;
            if line.is_empty() {
                continue;
            }
            match &header {
                None => header = Some(Columns::from_header(line)?),
                Some(cols) => match parse_record(line, cols) {
                    Some(record) => {
                        records.insert(record.egid, record);
                    }
                    None => skipped += 1,
                },
            }
        }

        if header.is_none() {
            bail!("GWR file is empty, no header line");
        }
        if skipped > 0 {
            warn!(skipped, "GWR rows without readable EGID skipped");
        }
        Ok(Self { records, skipped })
    }

    pub fn get(&self, egid: u64) -> Option<&GwrRecord> {
        self.records.get(&egid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Alle EGIDs des Bestands
    pub fn egids(&self) -> impl Iterator<Item = u64> + '_ {
        self.records.keys().copied()
    }
}

/// Spaltenindizes der benötigten GWR-Merkmale
struct Columns {
    egid: usize,
    gdekt: Option<usize>,
    gkat: Option<usize>,
    gklas: Option<usize>,
    gastw: Option<usize>,
    garea: Option<usize>,
    gbauj: Option<usize>,
    gkode: Option<usize>,
    gkodn: Option<usize>,
}

impl Columns {
    fn from_header(line: &str) -> Result<Self> {
        let mut by_name: HashMap<&str, usize> = HashMap::new();
        for (i, name) in line.split('\t').enumerate() {
            by_name.insert(name.trim(), i);
        }
        let egid = match by_name.get("EGID") {
            Some(&i) => i,
            None => bail!("GWR header has no EGID column: {line}"),
        };
        Ok(Self {
            egid,
            gdekt: by_name.get("GDEKT").copied(),
            gkat: by_name.get("GKAT").copied(),
            gklas: by_name.get("GKLAS").copied(),
            gastw: by_name.get("GASTW").copied(),
            garea: by_name.get("GAREA").copied(),
            gbauj: by_name.get("GBAUJ").copied(),
            gkode: by_name.get("GKODE").copied(),
            gkodn: by_name.get("GKODN").copied(),
        })
    }
}

/// Parst eine Datenzeile; None bei fehlender oder unlesbarer EGID
fn parse_record(line: &str, cols: &Columns) -> Option<GwrRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    let egid: u64 = field(&fields, Some(cols.egid))?.parse().ok()?;

    let gkode = field(&fields, cols.gkode).and_then(fast_parse_f64);
    let gkodn = field(&fields, cols.gkodn).and_then(fast_parse_f64);
    let koordinate = match (gkode, gkodn) {
        (Some(e), Some(n)) => Some(Koordinate::lv95(e, n)),
        _ => None,
    };

    Some(GwrRecord {
        egid,
        gdekt: field(&fields, cols.gdekt).map(str::to_string),
        gkat: field(&fields, cols.gkat).and_then(|s| s.parse().ok()),
        gklas: field(&fields, cols.gklas).and_then(|s| s.parse().ok()),
        gastw: field(&fields, cols.gastw).and_then(|s| s.parse().ok()),
        garea: field(&fields, cols.garea).and_then(fast_parse_f64),
        gbauj: field(&fields, cols.gbauj).and_then(|s| s.parse().ok()),
        koordinate,
    })
}

/// Liefert ein nicht leeres Feld an der gegebenen Spalte
#[inline]
fn field<'a>(fields: &[&'a str], idx: Option<usize>) -> Option<&'a str> {
    let value = fields.get(idx?)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Schnelles f64-Parsing für Koordinaten und Flächen
#[inline]
fn fast_parse_f64(s: &str) -> Option<f64> {
    fast_float::parse(s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CoordSystem;

    const SAMPLE: &str = "EGID\tGDEKT\tGKAT\tGKLAS\tGASTW\tGAREA\tGBAUJ\tGKODE\tGKODN\n\
        190325798\tBE\t1020\t1110\t2\t96\t1982\t2600050.125\t1199830.5\n\
        245000001\tZH\t1060\t1251\t\t1450\t\t2683000\t1248000\n\
        9\tVD\t\t\t\t\t\t\t\n";

    #[test]
    fn test_parse_sample() {
        let index = GwrIndex::from_text(SAMPLE).expect("valid sample");
        assert_eq!(index.len(), 3);
        assert_eq!(index.skipped, 0);

        let efh = index.get(190325798).expect("EGID present");
        assert_eq!(efh.gdekt.as_deref(), Some("BE"));
        assert_eq!(efh.gkat, Some(1020));
        assert_eq!(efh.gklas, Some(1110));
        assert_eq!(efh.gastw, Some(2));
        assert_eq!(efh.garea, Some(96.0));
        let k = efh.koordinate.expect("coordinates present");
        assert_eq!(k.system, CoordSystem::Lv95);
        assert!((k.e - 2600050.125).abs() < 1e-9);
    }

    #[test]
    fn test_empty_fields_are_none() {
        let index = GwrIndex::from_text(SAMPLE).unwrap();
        let halle = index.get(245000001).unwrap();
        assert_eq!(halle.gastw, None);
        assert_eq!(halle.gbauj, None);
        let leer = index.get(9).unwrap();
        assert!(leer.koordinate.is_none());
        assert!(leer.gklas.is_none());
    }

    #[test]
    fn test_column_order_independent() {
        let shuffled = "GKODN\tEGID\tGKODE\n1199830.5\t42\t2600050.0\n";
        let index = GwrIndex::from_text(shuffled).unwrap();
        let r = index.get(42).unwrap();
        let k = r.koordinate.unwrap();
        assert!((k.e - 2600050.0).abs() < 1e-9);
        assert!((k.n - 1199830.5).abs() < 1e-9);
    }

    #[test]
    fn test_bad_egid_skipped() {
        let data = "EGID\tGKAT\nabc\t1020\n77\t1030\n";
        let index = GwrIndex::from_text(data).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.skipped, 1);
        assert!(index.get(77).is_some());
    }

    #[test]
    fn test_missing_egid_column() {
        assert!(GwrIndex::from_text("GKAT\tGKLAS\n1020\t1110\n").is_err());
    }

    #[test]
    fn test_empty_file() {
        assert!(GwrIndex::from_text("").is_err());
    }

    #[test]
    fn test_latin1_fallback() {
        // GDEKT-Spalte mit Latin-1-Umlaut (0xFC = ü), ungültiges UTF-8
        let mut bytes = b"EGID\tGDEKT\n55\tZ\xFCrich\n".to_vec();
        let index = GwrIndex::from_bytes(&bytes).expect("latin-1 fallback");
        assert_eq!(index.get(55).unwrap().gdekt.as_deref(), Some("Z\u{fc}rich"));
        // UTF-8-Variante liefert dasselbe
        bytes = "EGID\tGDEKT\n55\tZürich\n".as_bytes().to_vec();
        let utf8 = GwrIndex::from_bytes(&bytes).unwrap();
        assert_eq!(utf8.get(55).unwrap().gdekt.as_deref(), Some("Zürich"));
    }

    #[test]
    fn test_crlf_lines() {
        let data = "EGID\tGKAT\r\n77\t1030\r\n";
        let index = GwrIndex::from_text(data).unwrap();
        assert_eq!(index.get(77).unwrap().gkat, Some(1030));
    }
}
