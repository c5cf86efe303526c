//! Definition und Ausführung der CLI-Kommandos
//!
//! Drei Kommandos:
//! - `berechnen`: Ausmass nach NPK 114 ohne Datenbank (Rechteckmodell oder GeoJSON)
//! - `analysieren`: volle Pipeline mit GWR, Höhen, Zonen und optionaler Persistenz
//! - `kontext`: gespeicherte Gebäudekontexte anzeigen oder löschen

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use npk114::ausmass::{ausmass_rechteck, GeruestAusmass};
use npk114::material::{estimate, tile_fields, tile_fields_with, total_weight_kg};
use npk114::{geruest_ausmass, RoofForm, WidthClass};
use tracing::{info, warn};

use crate::config::Config;
use crate::crs::{detect_system, CoordSystem, Koordinate};
use crate::gwr::GwrIndex;
use crate::height::{HeightDatabase, HeightResolver};
use crate::oracle::NullOracle;
use crate::pipeline::{ScaffoldPipeline, ScaffoldRequest};
use crate::provider::PolygonProvider;
use crate::report::ReportStatus;
use crate::store::{
    create_pool, fingerprint_hex, test_connection, ContextRepository, DatabaseConfig,
    PgContextStore,
};

#[derive(Subcommand)]
pub enum Commands {
    /// Compute an NPK 114 scaffold ausmass (no database required)
    Berechnen {
        /// Path to a GeoJSON file with building footprints (LV95, LV03 or WGS84)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// EGID to pick when the GeoJSON file contains several buildings
        #[arg(long)]
        egid: Option<u64>,

        /// Building length in metres (rectangle model)
        #[arg(short, long)]
        length: Option<f64>,

        /// Building width in metres (rectangle model)
        #[arg(short, long)]
        width: Option<f64>,

        /// Eaves height in metres (Traufhöhe)
        #[arg(short, long)]
        traufhoehe: f64,

        /// Ridge height in metres, required for sattel/walm (Firsthöhe)
        #[arg(short, long)]
        firsthoehe: Option<f64>,

        /// Roof form: flach, sattel, walm (rectangle model only)
        #[arg(short, long, default_value = "flach")]
        roof: String,

        /// Scaffold width class: w06, w09, w12
        #[arg(long, default_value = "w09")]
        width_class: String,

        /// Scaffold system from the material catalog (e.g. sl70)
        #[arg(short, long)]
        system: Option<String>,

        /// Config preset name (standard/minimal) or path to a JSON config
        #[arg(long, default_value = "standard")]
        config: String,

        /// Write the ausmass as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyse buildings end to end: footprint, GWR, heights, zones, material
    Analysieren {
        /// Path to a GeoJSON file with building footprints (LV95, LV03 or WGS84)
        #[arg(short, long)]
        path: PathBuf,

        /// EGID to analyse (repeatable)
        #[arg(short, long)]
        egid: Vec<u64>,

        /// Coordinate "E,N" locating one building (LV95 or LV03)
        #[arg(long)]
        at: Option<String>,

        /// Analyse every building in the file
        #[arg(short, long)]
        all: bool,

        /// Address label for the report (single building only)
        #[arg(long)]
        address: Option<String>,

        /// Path to the GWR building export (tab separated)
        #[arg(long)]
        gwr: Option<PathBuf>,

        /// Path to a JSON file with measured building heights
        #[arg(long)]
        heights: Option<PathBuf>,

        /// Scaffold width class: w06, w09, w12
        #[arg(long, default_value = "w09")]
        width_class: String,

        /// Building height override in metres (Gebäudehöhe)
        #[arg(long)]
        height: Option<f64>,

        /// Eaves height override in metres (Traufhöhe)
        #[arg(long)]
        traufhoehe: Option<f64>,

        /// Ridge height override in metres (Firsthöhe)
        #[arg(long)]
        firsthoehe: Option<f64>,

        /// Scaffold system for the material estimate (e.g. sl70)
        #[arg(short, long)]
        system: Option<String>,

        /// Config preset name (standard/minimal) or path to a JSON config
        #[arg(long, default_value = "standard")]
        config: String,

        /// Ignore stored contexts and re-run the zone decomposition
        #[arg(long)]
        refresh: bool,

        /// Maximum number of buildings processed concurrently
        #[arg(long, alias = "threads")]
        jobs: Option<usize>,

        /// Persist building contexts to PostgreSQL
        #[arg(long)]
        store: bool,

        /// Target PostgreSQL schema
        #[arg(long, default_value = "geruest")]
        schema: String,

        /// Output directory for one JSON report per building
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// PostgreSQL host (default: env PGHOST / localhost)
        #[arg(long)]
        host: Option<String>,

        /// PostgreSQL database name (default: env PGDATABASE / geruest)
        #[arg(long)]
        database: Option<String>,

        /// PostgreSQL user (default: env PGUSER / postgres)
        #[arg(long)]
        user: Option<String>,

        /// PostgreSQL password (default: env PGPASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// PostgreSQL port (default: env PGPORT / 5432)
        #[arg(long)]
        port: Option<u16>,

        /// SSL mode: disable, prefer, require (default: env PGSSLMODE / disable)
        #[arg(long)]
        ssl: Option<String>,
    },

    /// Show or delete a stored building context
    Kontext {
        /// EGID of the stored context
        #[arg(short, long)]
        egid: u64,

        /// Delete the context instead of showing it
        #[arg(long)]
        delete: bool,

        /// Target PostgreSQL schema
        #[arg(long, default_value = "geruest")]
        schema: String,

        /// PostgreSQL host (default: env PGHOST / localhost)
        #[arg(long)]
        host: Option<String>,

        /// PostgreSQL database name (default: env PGDATABASE / geruest)
        #[arg(long)]
        database: Option<String>,

        /// PostgreSQL user (default: env PGUSER / postgres)
        #[arg(long)]
        user: Option<String>,

        /// PostgreSQL password (default: env PGPASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// PostgreSQL port (default: env PGPORT / 5432)
        #[arg(long)]
        port: Option<u16>,

        /// SSL mode: disable, prefer, require (default: env PGSSLMODE / disable)
        #[arg(long)]
        ssl: Option<String>,
    },
}

/// Führt das Kommando berechnen aus
pub fn cmd_berechnen(
    path: Option<&Path>,
    egid: Option<u64>,
    length: Option<f64>,
    width: Option<f64>,
    traufhoehe: f64,
    firsthoehe: Option<f64>,
    roof: &str,
    width_class: &str,
    system: Option<&str>,
    config_spec: &str,
    output: Option<&Path>,
) -> Result<()> {
    let class: WidthClass = width_class.parse()?;
    let roof: RoofForm = roof.parse()?;

    let config = load_config(config_spec)?;
    if let Some(id) = system {
        if config.material.system(id).is_none() {
            bail!("Unknown scaffold system '{}' in material catalog", id);
        }
    }

    let ausmass = match path {
        Some(path) => {
            if roof != RoofForm::Flach {
                warn!("Roof form '{}' only applies to the rectangle model", roof);
            }
            let provider = PolygonProvider::from_file(path)?;
            let building = match egid {
                Some(egid) => provider
                    .by_egid(egid)?
                    .with_context(|| format!("EGID {} not found in {}", egid, path.display()))?,
                None => provider.single().with_context(|| {
                    format!(
                        "{} contains {} buildings, pick one with --egid",
                        path.display(),
                        provider.len()
                    )
                })?,
            };
            geruest_ausmass(&building.footprint, traufhoehe, class)
        }
        None => {
            let length = length.context("--length is required without --path")?;
            let width = width.context("--width is required without --path")?;
            ausmass_rechteck(roof, length, width, traufhoehe, firsthoehe, class)?
        }
    };

    print_ausmass(&ausmass);
    print_field_layout(&ausmass, &config.material.field_lengths_m);

    if let Some(id) = system {
        if let Some(scaffold_system) = config.material.system(id) {
            let lines = estimate(ausmass.total_area_m2, &scaffold_system.ratios);
            println!("\nMaterial ({}):", scaffold_system.name);
            for line in &lines {
                println!("  {:4} x {}", line.quantity, line.article);
            }
            println!("Total weight: {:.0} kg", total_weight_kg(&lines));
        }
    }

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(&ausmass)?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("\nAusmass: {}", output.display());
    }

    Ok(())
}

/// Führt das Kommando analysieren aus
pub async fn cmd_analysieren(
    path: &Path,
    egids: &[u64],
    at: Option<String>,
    all: bool,
    address: Option<String>,
    gwr_path: Option<&Path>,
    heights_path: Option<&Path>,
    width_class: &str,
    height: Option<f64>,
    traufhoehe: Option<f64>,
    firsthoehe: Option<f64>,
    system: Option<String>,
    config_spec: &str,
    refresh: bool,
    jobs: Option<usize>,
    store: bool,
    schema: &str,
    output: Option<&Path>,
    host: Option<String>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
    port: Option<u16>,
    ssl: Option<String>,
) -> Result<()> {
    // Breitenklasse und Koordinate vor jeder teuren Arbeit prüfen
    let class: WidthClass = width_class.parse()?;
    let at = at.as_deref().map(parse_koordinate).transpose()?;

    let started_at = Instant::now();

    info!(
        path = %path.display(),
        width_class = %class,
        refresh = refresh,
        store = store,
        "Starting analysis"
    );

    let config = load_config(config_spec)?;
    if let Some(id) = &system {
        if config.material.system(id).is_none() {
            bail!("Unknown scaffold system '{}' in material catalog", id);
        }
    }

    let provider = PolygonProvider::from_file(path)?;
    if provider.is_empty() {
        bail!("No building footprints found in {}", path.display());
    }

    let jobs = jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });

    // Zielliste: explizite EGIDs, dann die Koordinate, dann der ganze Bestand
    let mut seen: HashSet<u64> = HashSet::new();
    let mut requests: Vec<ScaffoldRequest> = Vec::new();
    for &egid in egids {
        if seen.insert(egid) {
            requests.push(ScaffoldRequest::for_egid(egid));
        }
    }
    if let Some(at) = at {
        requests.push(ScaffoldRequest::for_point(at));
    }
    if all {
        for egid in provider.egids() {
            if seen.insert(egid) {
                requests.push(ScaffoldRequest::for_egid(egid));
            }
        }
    }
    if requests.is_empty() {
        bail!("No building selected: use --egid, --at or --all");
    }
    if address.is_some() && requests.len() > 1 {
        bail!("--address applies to a single building");
    }

    for request in &mut requests {
        request.width_class = class;
        request.manual_height_m = height;
        request.manual_traufhoehe_m = traufhoehe;
        request.manual_firsthoehe_m = firsthoehe;
        request.scaffold_system = system.clone();
        request.address = address.clone();
        request.refresh = refresh;
        // Ohne Orakel läuft jede Zerlegung über die Heuristik
        request.use_oracle = false;
    }

    println!("=== Analyse ===");
    println!("Polygons: {} ({} buildings)", path.display(), provider.len());
    println!("Targets: {}", requests.len());
    println!("Width class: {}", class);
    println!("Config: {}", config_spec);
    println!("Jobs: {}", jobs);
    println!("Refresh: {}", refresh);

    let gwr = match gwr_path {
        Some(gwr_path) => {
            let index = GwrIndex::load(gwr_path)?;
            println!("GWR: {} buildings", index.len());
            Some(index)
        }
        None => None,
    };

    let heights = match heights_path {
        Some(heights_path) => HeightDatabase::from_file(heights_path)?,
        None => HeightDatabase::None,
    };
    println!("Heights: {}", heights.provider());
    let resolver = HeightResolver::new(heights, config.heights.clone());

    let repository = if store {
        let mut db_config = DatabaseConfig::from_env();
        apply_database_overrides(&mut db_config, host, database, user, password, port, ssl);
        println!(
            "Database: {}@{}:{}/{} (SSL: {:?})",
            db_config.user, db_config.host, db_config.port, db_config.dbname, db_config.ssl_mode
        );

        let pool = create_pool(&db_config).await?;
        test_connection(&pool).await?;
        let contexts = PgContextStore::new(pool, schema);
        contexts.init().await?;
        println!("Connected to PostgreSQL (schema {})", schema);
        ContextRepository::Postgres(contexts)
    } else {
        ContextRepository::memory()
    };

    let pipeline = ScaffoldPipeline::new(config, provider, gwr, resolver, NullOracle, repository);
    let reports = pipeline.run_batch(&requests, jobs).await;

    if let [report] = reports.as_slice() {
        report.display();
    } else {
        println!();
        for report in &reports {
            println!("{}", report.summary());
        }
    }

    let succeeded = reports
        .iter()
        .filter(|r| r.status == ReportStatus::Success)
        .count();
    let warned = reports
        .iter()
        .filter(|r| r.status == ReportStatus::SuccessWithWarnings)
        .count();
    let failed = reports
        .iter()
        .filter(|r| r.status == ReportStatus::Failed)
        .count();
    let total_area: f64 = reports.iter().map(|r| r.total_area_m2).sum();

    println!("\n\n=== Summary ===");
    println!("Buildings: {}", reports.len());
    println!("Succeeded: {}", succeeded);
    if warned > 0 {
        println!("With warnings: {}", warned);
    }
    if failed > 0 {
        println!("Failed: {}", failed);
    }
    println!("Total scaffold area: {:.2} m2", total_area);
    println!("Duration: {:.2?}", started_at.elapsed());

    if let Some(output) = output {
        std::fs::create_dir_all(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        for report in &reports {
            let file = output.join(format!("bericht_{}.json", report.egid));
            report
                .save_to_file(&file)
                .with_context(|| format!("Failed to write {}", file.display()))?;
        }
        println!("Reports: {}", output.display());
    }

    info!(
        "Analysis complete: {} buildings, {} failed",
        reports.len(),
        failed
    );

    Ok(())
}

/// Führt das Kommando kontext aus
pub async fn cmd_kontext(
    egid: u64,
    delete: bool,
    schema: &str,
    host: Option<String>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
    port: Option<u16>,
    ssl: Option<String>,
) -> Result<()> {
    let mut db_config = DatabaseConfig::from_env();
    apply_database_overrides(&mut db_config, host, database, user, password, port, ssl);
    println!(
        "Database: {}@{}:{}/{} (SSL: {:?})",
        db_config.user, db_config.host, db_config.port, db_config.dbname, db_config.ssl_mode
    );

    let pool = create_pool(&db_config).await?;
    test_connection(&pool).await?;
    let contexts = PgContextStore::new(pool, schema);
    contexts.init().await?;
    println!("Connected to PostgreSQL (schema {})", schema);

    let key = egid.to_string();
    if delete {
        if contexts.delete(&key).await? {
            println!("Deleted context for EGID {}", egid);
        } else {
            println!("No stored context for EGID {}", egid);
        }
        return Ok(());
    }

    let Some(stored) = contexts.get(&key).await? else {
        println!("No stored context for EGID {}", egid);
        return Ok(());
    };
    let context = &stored.context;

    println!("\n=== Context EGID {} ===", egid);
    if let Some(address) = &context.address {
        println!("Address: {}", address);
    }
    println!("Source: {}", context.source);
    println!("Complexity: {}", context.complexity);
    println!("Confidence: {:.2}", context.confidence);
    println!("Validated: {}", context.validated);
    println!("Updated: {}", context.updated_at_epoch);
    if let Some(reasoning) = &context.reasoning {
        println!("Reasoning: {}", reasoning);
    }
    if let Some(fingerprint) = stored
        .fingerprint
        .as_deref()
        .and_then(|raw| <&[u8; 32]>::try_from(raw).ok())
    {
        println!("Fingerprint: {}", fingerprint_hex(fingerprint));
    }

    println!("\nZones: {}", context.zones.len());
    for zone in &context.zones {
        let marker = if zone.beruesten { "" } else { " (not scaffolded)" };
        println!(
            "- {} [{}]: {:.1} m{}",
            zone.name, zone.zone_type, zone.gebaeudehoehe_m, marker
        );
        if let Some(trauf) = zone.traufhoehe_m {
            match zone.firsthoehe_m {
                Some(first) => println!("  Traufe {:.1} m, First {:.1} m", trauf, first),
                None => println!("  Traufe {:.1} m", trauf),
            }
        }
    }

    if let Some(access) = &context.access {
        let verdict = if access.suva_compliant {
            "compliant"
        } else {
            "NOT compliant"
        };
        println!(
            "\nAccess: {} points on {:.1} m perimeter, SUVA {}",
            access.access_points.len(),
            access.perimeter_m,
            verdict
        );
    }

    Ok(())
}

/// Druckt das Ausmass als Positionstabelle
fn print_ausmass(ausmass: &GeruestAusmass) {
    println!("=== Geruestausmass NPK 114 ({}) ===", ausmass.width_class);
    for facade in &ausmass.facades {
        println!(
            "  {:<10} {:>7.2} m x {:>5.2} m = {:>8.2} m2",
            facade.name, facade.ausmass_length_m, facade.ausmass_height_m, facade.area_m2
        );
    }
    println!("Facade area: {:.2} m2", ausmass.facade_area_m2);
    println!(
        "Corner surcharge: {:.2} m2 ({} corners)",
        ausmass.corner_surcharge_m2, ausmass.corner_count
    );
    println!("Total: {:.2} m2", ausmass.total_area_m2);
}

/// Feldeinteilung der längsten Fassade mit den verfügbaren Feldlängen
fn print_field_layout(ausmass: &GeruestAusmass, field_lengths_m: &[f64]) {
    let Some(longest) = ausmass
        .facades
        .iter()
        .max_by(|a, b| a.ausmass_length_m.total_cmp(&b.ausmass_length_m))
    else {
        return;
    };

    let layout = if field_lengths_m.is_empty() {
        tile_fields(longest.ausmass_length_m)
    } else {
        tile_fields_with(longest.ausmass_length_m, field_lengths_m)
    };
    println!(
        "\nField layout {} ({:.2} m): {} fields, {:.2} m covered, {:.2} m rest",
        longest.name,
        longest.ausmass_length_m,
        layout.fields.len(),
        layout.covered_m,
        layout.remainder_m
    );
}

/// Lädt ein Preset oder eine JSON-Konfigurationsdatei
fn load_config(spec: &str) -> Result<Config> {
    match spec {
        "standard" | "minimal" => Config::from_preset(spec),
        _ => Config::load(Path::new(spec)),
    }
}

/// Parst "E,N" und erkennt das Bezugssystem am Wertebereich
fn parse_koordinate(raw: &str) -> Result<Koordinate> {
    let (e, n) = raw
        .split_once(',')
        .with_context(|| format!("Expected a coordinate as E,N but got '{}'", raw))?;
    let e: f64 = e
        .trim()
        .parse()
        .with_context(|| format!("Invalid easting '{}'", e.trim()))?;
    let n: f64 = n
        .trim()
        .parse()
        .with_context(|| format!("Invalid northing '{}'", n.trim()))?;

    match detect_system(e, n)? {
        CoordSystem::Lv95 => Ok(Koordinate::lv95(e, n)),
        CoordSystem::Lv03 => Ok(Koordinate::lv03(e, n)),
    }
}

fn apply_database_overrides(
    config: &mut DatabaseConfig,
    host: Option<String>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
    port: Option<u16>,
    ssl: Option<String>,
) {
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(database) = database {
        config.dbname = database;
    }
    if let Some(user) = user {
        config.user = user;
    }
    if let Some(password) = password {
        config.password = Some(password);
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(ssl) = ssl {
        if let Ok(mode) = ssl.parse() {
            config.ssl_mode = mode;
        }
    }
}
