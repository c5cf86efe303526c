//! Integrationstests gegen PostgreSQL/PostGIS
//!
//! Diese Tests brauchen eine laufende Datenbank mit PostGIS und sind
//! deshalb mit `--ignored` geschaltet. Die Verbindung kommt aus den
//! üblichen PG-Umgebungsvariablen:
//!
//! - PGHOST (Standard: localhost)
//! - PGPORT (Standard: 5432)
//! - PGDATABASE (Standard: geruest)
//! - PGUSER (Standard: postgres)
//! - PGPASSWORD
//!
//! ```bash
//! docker run -d --name geruest-pg -p 5432:5432 \
//!     -e POSTGRES_PASSWORD=postgres -e POSTGRES_DB=geruest \
//!     postgis/postgis:16-3.4
//!
//! PGPASSWORD=postgres cargo test -p geruestplan --test postgres_integration -- --ignored
//! ```
//!
//! Jeder Test arbeitet in einem eigenen Schema, damit parallele Läufe
//! sich nicht in die Quere kommen.

use deadpool_postgres::Pool;
use geruestplan::store::{
    context_fingerprint, create_pool, test_connection, DatabaseConfig, PgContextStore,
};
use npk114::access::AccessPlanner;
use npk114::zone::single_zone_context;
use npk114::{BuildingContext, BuildingGeometry, Complexity, Footprint};

async fn test_pool() -> Pool {
    let config = DatabaseConfig::from_env();
    create_pool(&config).await.expect("Failed to create pool")
}

/// Frisch initialisierter Store in einem leeren Schema
async fn fresh_store(pool: &Pool, schema: &str) -> PgContextStore {
    let client = pool.get().await.expect("Failed to get connection");
    client
        .execute(&format!("DROP SCHEMA IF EXISTS {schema} CASCADE"), &[])
        .await
        .expect("Failed to drop test schema");
    drop(client);

    let store = PgContextStore::new(pool.clone(), schema);
    store.init().await.expect("Failed to initialize store");
    store
}

fn sample_footprint() -> Footprint {
    Footprint::from_pairs(&[
        [2_600_000.0, 1_200_000.0],
        [2_600_020.0, 1_200_000.0],
        [2_600_020.0, 1_200_012.0],
        [2_600_000.0, 1_200_012.0],
    ])
    .expect("valid footprint")
}

fn sample_context(egid: &str) -> BuildingContext {
    let geometry = BuildingGeometry::from_footprint(sample_footprint());
    single_zone_context(
        egid,
        None,
        &geometry,
        Some(6.5),
        Some(10.0),
        10.0,
        Complexity::Simple,
        &AccessPlanner::default(),
    )
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_database_connection() {
    let pool = test_pool().await;
    test_connection(&pool).await.expect("Connection test failed");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_init_creates_table() {
    let pool = test_pool().await;
    let _store = fresh_store(&pool, "geruest_test_init").await;

    let client = pool.get().await.expect("Failed to get connection");
    let row = client
        .query_one(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = 'geruest_test_init' AND table_name = 'gebaeude_kontexte'",
            &[],
        )
        .await
        .expect("Failed to query information_schema");
    let count: i64 = row.get(0);
    assert_eq!(count, 1, "gebaeude_kontexte missing after init");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_save_get_delete_round_trip() {
    let pool = test_pool().await;
    let store = fresh_store(&pool, "geruest_test_roundtrip").await;

    let footprint = sample_footprint();
    let context = sample_context("190325798");
    let fingerprint = context_fingerprint(&footprint, Some(6.5), None, Some(10.0));

    store
        .save(&context, Some(&footprint), Some(fingerprint))
        .await
        .expect("Failed to save context");

    let stored = store
        .get("190325798")
        .await
        .expect("Failed to load context")
        .expect("context not found after save");
    assert_eq!(stored.context.egid, "190325798");
    assert_eq!(stored.context.zones.len(), context.zones.len());
    assert_eq!(stored.fingerprint.as_deref(), Some(fingerprint.as_slice()));

    // Der Grundriss muss als LV95-Polygon in der Geometriespalte liegen
    let client = pool.get().await.expect("Failed to get connection");
    let row = client
        .query_one(
            "SELECT ST_SRID(grundriss), ST_NPoints(grundriss) \
             FROM geruest_test_roundtrip.gebaeude_kontexte WHERE egid = $1",
            &[&"190325798"],
        )
        .await
        .expect("Failed to query geometry");
    let srid: i32 = row.get(0);
    let npoints: i32 = row.get(1);
    assert_eq!(srid, 2056);
    assert_eq!(npoints, 5, "closed ring");

    assert!(store.delete("190325798").await.expect("Failed to delete"));
    assert!(store
        .get("190325798")
        .await
        .expect("Failed to load context")
        .is_none());
    assert!(!store.delete("190325798").await.expect("Failed to delete"));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_save_twice_upserts() {
    let pool = test_pool().await;
    let store = fresh_store(&pool, "geruest_test_upsert").await;

    let footprint = sample_footprint();
    let mut context = sample_context("42");
    let first = context_fingerprint(&footprint, Some(6.5), None, Some(10.0));
    store
        .save(&context, Some(&footprint), Some(first))
        .await
        .expect("Failed to save context");

    context.validated = true;
    let updated = context_fingerprint(&footprint, Some(6.5), None, Some(12.0));
    store
        .save(&context, Some(&footprint), Some(updated))
        .await
        .expect("Failed to save context again");

    let stored = store
        .get("42")
        .await
        .expect("Failed to load context")
        .expect("context not found after save");
    assert!(stored.context.validated);
    assert_eq!(stored.fingerprint.as_deref(), Some(updated.as_slice()));

    let client = pool.get().await.expect("Failed to get connection");
    let row = client
        .query_one(
            "SELECT COUNT(*) FROM geruest_test_upsert.gebaeude_kontexte",
            &[],
        )
        .await
        .expect("Failed to count rows");
    let count: i64 = row.get(0);
    assert_eq!(count, 1, "upsert must not duplicate the EGID row");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_save_without_footprint() {
    let pool = test_pool().await;
    let store = fresh_store(&pool, "geruest_test_nogeom").await;

    let context = sample_context("7");
    store
        .save(&context, None, None)
        .await
        .expect("Failed to save context");

    let stored = store
        .get("7")
        .await
        .expect("Failed to load context")
        .expect("context not found after save");
    assert_eq!(stored.context.egid, "7");
    assert!(stored.fingerprint.is_none());

    let client = pool.get().await.expect("Failed to get connection");
    let row = client
        .query_one(
            "SELECT grundriss IS NULL FROM geruest_test_nogeom.gebaeude_kontexte \
             WHERE egid = $1",
            &[&"7"],
        )
        .await
        .expect("Failed to query geometry");
    let geom_is_null: bool = row.get(0);
    assert!(geom_is_null, "no footprint means no geometry");
}
