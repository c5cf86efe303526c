//! Kontextablage in PostgreSQL/PostGIS
//!
//! Pro Gebäude eine Zeile: Kontext als JSONB, Grundriss als Geometrie in
//! LV95 (EPSG:2056) für GIS-Abfragen, Fingerabdruck für die
//! Änderungserkennung. Schreiben ist ein Upsert über die EGID.

use anyhow::{bail, Context, Result};
use deadpool_postgres::Pool;
use npk114::{BuildingContext, Footprint};
use tracing::{info, warn};
use wkb::geom_to_wkb;

use super::StoredContext;

/// SRID der Geometriespalte (LV95)
const SRID_LV95: u32 = 2056;

pub struct PgContextStore {
    pool: Pool,
    schema: String,
}

impl PgContextStore {
    pub fn new(pool: Pool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// Legt Schema, Extension und Tabelle an, falls sie fehlen
    pub async fn init(&self) -> Result<()> {
        let client = self.pool.get().await?;

        client
            .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema), &[])
            .await
            .context("Failed to create schema")?;

        // PostGIS braucht unter Umständen Superuser-Rechte. Existiert die
        // Extension schon, reicht das.
        match client
            .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
            .await
        {
            Ok(_) => {}
            Err(e) => {
                warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
                let exists = client
                    .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                    .await
                    .context("Failed to check pg_extension")?
                    .is_some();
                if !exists {
                    bail!("PostGIS extension is not installed and could not be created: {e}");
                }
            }
        }

        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.gebaeude_kontexte (
                egid TEXT PRIMARY KEY,
                kontext JSONB NOT NULL,
                grundriss geometry(Polygon, {srid}),
                fingerprint BYTEA,
                created_at TIMESTAMPTZ DEFAULT NOW(),
                updated_at TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
            schema = self.schema,
            srid = SRID_LV95
        );
        client
            .execute(&sql, &[])
            .await
            .context("Failed to create gebaeude_kontexte table")?;

        client
            .execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_gebaeude_kontexte_grundriss \
                     ON {}.gebaeude_kontexte USING GIST (grundriss)",
                    self.schema
                ),
                &[],
            )
            .await
            .context("Failed to create geometry index")?;

        info!("Context store ready in schema {}", self.schema);
        Ok(())
    }

    pub async fn get(&self, egid: &str) -> Result<Option<StoredContext>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT kontext::text, fingerprint FROM {}.gebaeude_kontexte WHERE egid = $1",
                    self.schema
                ),
                &[&egid],
            )
            .await
            .context("Failed to load context")?;

        match row {
            Some(row) => {
                let json: String = row.get(0);
                let fingerprint: Option<Vec<u8>> = row.get(1);
                let context: BuildingContext =
                    serde_json::from_str(&json).context("stored context does not parse")?;
                Ok(Some(StoredContext {
                    context,
                    fingerprint,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn save(
        &self,
        context: &BuildingContext,
        footprint: Option<&Footprint>,
        fingerprint: Option<[u8; 32]>,
    ) -> Result<()> {
        let json = serde_json::to_string(context).context("context does not serialize")?;

        // Eine nicht konvertierbare Geometrie kostet nur die GIS-Spalte,
        // nicht den Kontext.
        let grundriss: Option<Vec<u8>> = match footprint {
            Some(fp) => match ewkb_lv95(fp) {
                Ok(ewkb) => Some(ewkb),
                Err(e) => {
                    warn!(egid = %context.egid, "Footprint not storable as geometry: {e}");
                    None
                }
            },
            None => None,
        };
        let fingerprint: Option<Vec<u8>> = fingerprint.map(|f| f.to_vec());

        let client = self.pool.get().await?;
        client
            .execute(
                &format!(
                    r#"
                    INSERT INTO {}.gebaeude_kontexte (egid, kontext, grundriss, fingerprint)
                    VALUES ($1, $2::jsonb, ST_GeomFromEWKB($3), $4)
                    ON CONFLICT (egid) DO UPDATE SET
                        kontext = EXCLUDED.kontext,
                        grundriss = EXCLUDED.grundriss,
                        fingerprint = EXCLUDED.fingerprint,
                        updated_at = NOW()
                    "#,
                    self.schema
                ),
                &[&context.egid, &json, &grundriss, &fingerprint],
            )
            .await
            .context("Failed to save context")?;
        Ok(())
    }

    pub async fn delete(&self, egid: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute(
                &format!("DELETE FROM {}.gebaeude_kontexte WHERE egid = $1", self.schema),
                &[&egid],
            )
            .await
            .context("Failed to delete context")?;
        Ok(deleted > 0)
    }
}

/// Grundriss als EWKB mit SRID 2056
fn ewkb_lv95(footprint: &Footprint) -> Result<Vec<u8>> {
    let geometry = geo::Geometry::Polygon(footprint.to_polygon());
    let wkb = geom_to_wkb(&geometry)
        .map_err(|e| anyhow::anyhow!("WKB conversion failed: {e:?}"))?;
    if wkb.len() < 5 {
        bail!("WKB too short");
    }

    // SRID-Flag (0x20000000) in das Typwort einsetzen, SRID danach
    let mut ewkb = Vec::with_capacity(wkb.len() + 4);
    ewkb.push(wkb[0]);
    let type_bytes = [wkb[1], wkb[2], wkb[3], wkb[4]];
    if wkb[0] == 1 {
        let geom_type = u32::from_le_bytes(type_bytes) | 0x2000_0000;
        ewkb.extend_from_slice(&geom_type.to_le_bytes());
        ewkb.extend_from_slice(&SRID_LV95.to_le_bytes());
    } else {
        let geom_type = u32::from_be_bytes(type_bytes) | 0x2000_0000;
        ewkb.extend_from_slice(&geom_type.to_be_bytes());
        ewkb.extend_from_slice(&SRID_LV95.to_be_bytes());
    }
    ewkb.extend_from_slice(&wkb[5..]);

    Ok(ewkb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ewkb_carries_srid_flag() {
        let footprint =
            Footprint::from_pairs(&[[0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]).unwrap();
        let ewkb = ewkb_lv95(&footprint).expect("convertible");

        // Little-Endian-WKB: Typwort trägt das SRID-Flag, danach die SRID
        assert_eq!(ewkb[0], 1);
        let geom_type = u32::from_le_bytes([ewkb[1], ewkb[2], ewkb[3], ewkb[4]]);
        assert_eq!(geom_type & 0x2000_0000, 0x2000_0000);
        assert_eq!(geom_type & 0xff, 3, "polygon type");
        let srid = u32::from_le_bytes([ewkb[5], ewkb[6], ewkb[7], ewkb[8]]);
        assert_eq!(srid, 2056);
    }

    #[test]
    fn test_ewkb_longer_than_wkb_by_srid() {
        let footprint =
            Footprint::from_pairs(&[[0.0, 0.0], [20.0, 0.0], [20.0, 12.0], [0.0, 12.0]]).unwrap();
        let geometry = geo::Geometry::Polygon(footprint.to_polygon());
        let wkb = geom_to_wkb(&geometry).unwrap();
        let ewkb = ewkb_lv95(&footprint).unwrap();
        assert_eq!(ewkb.len(), wkb.len() + 4);
    }
}
