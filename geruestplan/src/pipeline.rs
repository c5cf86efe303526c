//! Berechnungsablauf vom Auftrag bis zum Bericht
//!
//! Jeder Auftrag durchläuft dieselben Schritte: Grundriss auflösen,
//! GWR-Attribute nachschlagen, Höhen bestimmen, Gebäudekontext aus der
//! Ablage holen oder neu zerlegen, Ausmass pro Zone rechnen, Zugänge
//! und Material anhängen. Ausfälle externer Quellen werden als
//! Warnungen verbucht; nur ungültige Eingaben und fehlende Grundrisse
//! brechen die Berechnung ab. Zerlegung und Speicherung laufen pro
//! EGID serialisiert, damit sich gleichzeitige Aufträge nicht
//! gegenseitig den Kontext überschreiben (der letzte Schreiber
//! gewinnt).

use anyhow::{anyhow, bail, Result};
use futures::stream;
use futures::StreamExt;
use npk114::ausmass::{ausmass_grundriss, round2};
use npk114::complexity::classify_structure;
use npk114::material::{estimate, total_weight_kg};
use npk114::{BuildingContext, BuildingGeometry, BuildingZone, FacadeSegment, WidthClass};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::crs::Koordinate;
use crate::gwr::{GwrIndex, GwrRecord};
use crate::height::{HeightQuery, HeightResolver};
use crate::oracle::ZoneAnalysisOracle;
use crate::provider::{BuildingPolygon, PolygonProvider, DEFAULT_POINT_TOLERANCE_M};
use crate::report::{ScaffoldReport, WarningCategory, ZoneRow};
use crate::store::{context_fingerprint, ContextRepository};
use crate::zonen::{DecompositionRequest, ZoneDecomposer};

/// Auftrag für eine Ausmassberechnung
///
/// Das Gebäude wird über die EGID oder eine Landeskoordinate
/// angesprochen; ist beides gesetzt, gewinnt die EGID.
#[derive(Debug, Clone)]
pub struct ScaffoldRequest {
    pub egid: Option<u64>,
    pub at: Option<Koordinate>,
    /// Adresse für Bericht und Orakel, wird nicht aufgelöst
    pub address: Option<String>,
    pub width_class: WidthClass,
    /// Manuelle Gesamthöhe, gewinnt gegen alle anderen Quellen
    pub manual_height_m: Option<f64>,
    pub manual_traufhoehe_m: Option<f64>,
    pub manual_firsthoehe_m: Option<f64>,
    /// False erzwingt den automatischen Ein-Zonen-Kontext
    pub use_oracle: bool,
    /// Gerüstsystem für die Materialschätzung
    pub scaffold_system: Option<String>,
    /// Gespeicherten Kontext verwerfen und neu zerlegen
    pub refresh: bool,
}

impl Default for ScaffoldRequest {
    fn default() -> Self {
        Self {
            egid: None,
            at: None,
            address: None,
            width_class: WidthClass::W09,
            manual_height_m: None,
            manual_traufhoehe_m: None,
            manual_firsthoehe_m: None,
            use_oracle: true,
            scaffold_system: None,
            refresh: false,
        }
    }
}

impl ScaffoldRequest {
    /// Auftrag über die EGID
    pub fn for_egid(egid: u64) -> Self {
        Self {
            egid: Some(egid),
            ..Self::default()
        }
    }

    /// Auftrag über eine Landeskoordinate
    pub fn for_point(at: Koordinate) -> Self {
        Self {
            at: Some(at),
            ..Self::default()
        }
    }
}

/// Führt Ausmassberechnungen über alle Komponenten aus
pub struct ScaffoldPipeline<O> {
    config: Config,
    provider: PolygonProvider,
    gwr: Option<GwrIndex>,
    heights: HeightResolver,
    decomposer: ZoneDecomposer<O>,
    repository: ContextRepository,
    /// Serialisiert Zerlegung und Speicherung pro EGID
    locks: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl<O: ZoneAnalysisOracle> ScaffoldPipeline<O> {
    pub fn new(
        config: Config,
        provider: PolygonProvider,
        gwr: Option<GwrIndex>,
        heights: HeightResolver,
        oracle: O,
        repository: ContextRepository,
    ) -> Self {
        let decomposer = ZoneDecomposer::new(oracle, config.oracle.clone(), config.access.clone());
        Self {
            config,
            provider,
            gwr,
            heights,
            decomposer,
            repository,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Berechnet einen Auftrag
    ///
    /// Schlägt nie fehl; Abbrüche stehen als Fehler im Bericht und
    /// setzen den Status auf `failed`.
    pub async fn run(&self, request: &ScaffoldRequest) -> ScaffoldReport {
        let started = Instant::now();
        let label = match request.egid {
            Some(egid) => egid.to_string(),
            None => "unbekannt".to_string(),
        };
        let mut report = ScaffoldReport::new(label);
        report.address = request.address.clone();
        report.width_class = Some(request.width_class);

        if let Err(err) = self.compute(request, &mut report).await {
            report.record_error(format!("{err:#}"));
        }

        report.set_duration(started.elapsed());
        report.finalize();
        report
    }

    /// Berechnet mehrere Aufträge nebenläufig
    ///
    /// Die Berichte behalten die Reihenfolge der Aufträge.
    pub async fn run_batch(
        &self,
        requests: &[ScaffoldRequest],
        jobs: usize,
    ) -> Vec<ScaffoldReport> {
        stream::iter(requests)
            .map(|request| self.run(request))
            .buffered(jobs.max(1))
            .collect::<Vec<ScaffoldReport>>()
            .await
    }

    async fn compute(
        &self,
        request: &ScaffoldRequest,
        report: &mut ScaffoldReport,
    ) -> Result<()> {
        // Ungültige Eingaben scheitern, bevor gerechnet wird
        let system = match request.scaffold_system.as_deref() {
            Some(id) => Some(
                self.config
                    .material
                    .system(id)
                    .ok_or_else(|| anyhow!("unknown scaffold system '{id}'"))?,
            ),
            None => None,
        };

        let polygon = self.lookup_polygon(request)?;
        let egid = polygon.egid;
        if let Some(egid) = egid {
            report.egid = egid.to_string();
        }

        let geometry = BuildingGeometry::from_footprint(polygon.footprint);
        debug!(
            egid = ?egid,
            area_m2 = geometry.area_m2,
            facades = geometry.facades.len(),
            "Building geometry derived"
        );

        let record = match (egid, &self.gwr) {
            (Some(egid), Some(index)) => index.get(egid),
            _ => None,
        };
        let floors = record.and_then(|r| r.gastw);
        let gklas = record.and_then(|r| r.gklas);
        if let Some(record) = record {
            report.gdekt = record.gdekt.clone();
            report.gkat = record.gkat;
            report.gklas = record.gklas;
            report.gbauj = record.gbauj;
            check_gwr_consistency(record, &geometry, report);
        }

        let heights = self.heights.resolve(&HeightQuery {
            egid: egid.unwrap_or(0),
            manual_height_m: request.manual_height_m,
            manual_traufhoehe_m: request.manual_traufhoehe_m,
            manual_firsthoehe_m: request.manual_firsthoehe_m,
            floors,
            gklas,
        });
        for warning in &heights.warnings {
            report.record_warning(WarningCategory::HeightPlausibility, warning.clone());
        }
        if heights.needs_height_refresh {
            report.record_warning(
                WarningCategory::HeightRefresh,
                "Traufhoehe derived from total height, height record should be re-measured",
            );
        }
        report.active_height_m = Some(heights.active_height_m);
        report.active_height_source = Some(heights.active_source.to_string());

        let complexity = classify_structure(
            geometry.footprint.points(),
            Some(geometry.area_m2),
            gklas,
            &self.config.complex_gklas,
        );

        let fingerprint = context_fingerprint(
            &geometry.footprint,
            heights.traufhoehe_m,
            heights.firsthoehe_m,
            heights.gebaeudehoehe_m,
        );

        let decomposition = DecompositionRequest {
            egid: egid.unwrap_or(0),
            address: request.address.clone(),
            geometry: &geometry,
            heights: &heights,
            gklas,
            complexity,
            use_oracle: request.use_oracle,
        };

        let context = match egid {
            Some(egid) => {
                let slot = self.lock_slot(egid).await;
                let _guard = slot.lock().await;
                self.stored_or_fresh(egid, fingerprint, request.refresh, &decomposition, report)
                    .await
            }
            None => {
                debug!("Building has no EGID, context is not persisted");
                self.fresh_context(&decomposition, report).await
            }
        };

        report.complexity = Some(context.complexity);
        report.context_source = Some(context.source);
        if let Some(plan) = &context.access {
            report.access_points = plan.access_points.len();
            report.suva_compliant = Some(plan.suva_compliant);
            if !plan.suva_compliant {
                report.record_warning(
                    WarningCategory::SuvaAccess,
                    format!(
                        "escape route reaches {:.1} m with {} access points, allowed are {:.0} m",
                        plan.max_egress_m,
                        plan.access_points.len(),
                        self.config.access.max_egress_m
                    ),
                );
            }
        }

        self.measure_zones(&context, &geometry, request.width_class, report);

        if let Some(system) = system {
            let lines = estimate(report.total_area_m2, &system.ratios);
            report.material_weight_kg = Some(round2(total_weight_kg(&lines)));
            report.material = lines;
        }

        info!(
            egid = report.egid.as_str(),
            zones = report.zones.len(),
            total_m2 = report.total_area_m2,
            "Calculation complete"
        );
        Ok(())
    }

    /// Löst den Grundriss über die EGID oder eine Koordinate auf
    fn lookup_polygon(&self, request: &ScaffoldRequest) -> Result<BuildingPolygon> {
        if let Some(egid) = request.egid {
            return match self.provider.by_egid(egid)? {
                Some(polygon) => Ok(polygon),
                None => bail!("building {egid} not found"),
            };
        }
        if let Some(at) = request.at {
            return match self.provider.by_point(at, DEFAULT_POINT_TOLERANCE_M)? {
                Some(polygon) => Ok(polygon),
                None => bail!(
                    "no building within {DEFAULT_POINT_TOLERANCE_M} m of {at}"
                ),
            };
        }
        bail!("request needs an EGID or a coordinate")
    }

    /// Kontext aus der Ablage, falls der Fingerabdruck noch stimmt,
    /// sonst neue Zerlegung mit anschliessender Speicherung
    ///
    /// Ablagefehler degradieren zu Warnungen; das Resultat ist immer
    /// ein brauchbarer Kontext.
    async fn stored_or_fresh(
        &self,
        egid: u64,
        fingerprint: [u8; 32],
        refresh: bool,
        decomposition: &DecompositionRequest<'_>,
        report: &mut ScaffoldReport,
    ) -> BuildingContext {
        let key = egid.to_string();

        if refresh {
            debug!(egid, "Refresh requested, stored context ignored");
        } else {
            match self.repository.get(&key).await {
                Ok(Some(stored))
                    if stored.fingerprint.as_deref() == Some(fingerprint.as_slice()) =>
                {
                    debug!(egid, "Stored context is current, reusing");
                    return stored.context;
                }
                Ok(Some(_)) => {
                    debug!(egid, "Stored context is stale, re-analyzing");
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(egid, error = format!("{err:#}"), "Context lookup failed");
                    report.record_warning(
                        WarningCategory::Input,
                        format!("context lookup failed: {err:#}"),
                    );
                }
            }
        }

        let context = self.fresh_context(decomposition, report).await;
        if let Err(err) = self
            .repository
            .save(
                &context,
                Some(&decomposition.geometry.footprint),
                Some(fingerprint),
            )
            .await
        {
            warn!(egid, error = format!("{err:#}"), "Context save failed");
            report.record_warning(
                WarningCategory::Input,
                format!("context save failed: {err:#}"),
            );
        }
        context
    }

    /// Zerlegt neu und übernimmt aufgelöste Fassadenkonflikte als
    /// Warnung in den Bericht
    async fn fresh_context(
        &self,
        decomposition: &DecompositionRequest<'_>,
        report: &mut ScaffoldReport,
    ) -> BuildingContext {
        let fresh = self.decomposer.decompose(decomposition).await;
        for conflict in fresh.facade_conflicts {
            report.record_warning(WarningCategory::Zones, conflict);
        }
        fresh.context
    }

    /// Rechnet das Ausmass pro Zone und summiert in den Bericht
    fn measure_zones(
        &self,
        context: &BuildingContext,
        geometry: &BuildingGeometry,
        class: WidthClass,
        report: &mut ScaffoldReport,
    ) {
        let mut facade_area = 0.0;
        let mut corner_surcharge = 0.0;
        let mut total = 0.0;

        for zone in &context.zones {
            if !zone.beruesten {
                debug!(zone = zone.id.as_str(), "Zone is not scaffolded, skipped");
                report.record_zone(skipped_row(zone));
                continue;
            }

            let facades = zone_facades(geometry, zone);
            if facades.is_empty() {
                report.record_warning(
                    WarningCategory::Zones,
                    format!("zone '{}' matches no facade, skipped", zone.name),
                );
                report.record_zone(skipped_row(zone));
                continue;
            }

            let default_height = zone.traufhoehe_m.unwrap_or(zone.gebaeudehoehe_m);
            let ausmass = ausmass_grundriss(&facades, default_height, class);
            facade_area += ausmass.facade_area_m2;
            corner_surcharge += ausmass.corner_surcharge_m2;
            total += ausmass.total_area_m2;

            report.record_zone(ZoneRow {
                zone_id: zone.id.clone(),
                name: zone.name.clone(),
                zone_type: zone.zone_type,
                scaffolded: true,
                facade_area_m2: ausmass.facade_area_m2,
                total_area_m2: ausmass.total_area_m2,
            });
        }

        if report.zones.iter().all(|row| !row.scaffolded) {
            report.record_warning(
                WarningCategory::Zones,
                "no zone is scaffolded, total ausmass is zero",
            );
        }

        report.facade_area_m2 = round2(facade_area);
        report.corner_surcharge_m2 = round2(corner_surcharge);
        report.total_area_m2 = round2(total);
    }

    /// Liefert das Serialisierungs-Mutex einer EGID
    async fn lock_slot(&self, egid: u64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(egid).or_default())
    }
}

/// Tolerierte Spanne des Verhältnisses Grundrissfläche zu GWR-Gebäudefläche
const GWR_AREA_RATIO_MIN: f64 = 0.5;
const GWR_AREA_RATIO_MAX: f64 = 2.0;

/// Maximaler Abstand der GWR-Gebäudekoordinate zum Grundriss, in Metern
const GWR_COORD_TOLERANCE_M: f64 = 50.0;

/// Prüft GWR-Attribute gegen den aufgelösten Grundriss
///
/// Grobe Widersprüche deuten auf eine falsche EGID-Zuordnung oder einen
/// veralteten Polygonbestand hin. Sie werden als Warnung verbucht, die
/// Berechnung läuft mit dem Grundriss weiter.
fn check_gwr_consistency(
    record: &GwrRecord,
    geometry: &BuildingGeometry,
    report: &mut ScaffoldReport,
) {
    if let Some(garea) = record.garea {
        if garea > 0.0 {
            let ratio = geometry.area_m2 / garea;
            if !(GWR_AREA_RATIO_MIN..=GWR_AREA_RATIO_MAX).contains(&ratio) {
                report.record_warning(
                    WarningCategory::Input,
                    format!(
                        "footprint area {:.0} m2 contradicts GWR GAREA {garea:.0} m2",
                        geometry.area_m2
                    ),
                );
            }
        }
    }
    if let Some(koordinate) = record.koordinate {
        let at = koordinate.to_lv95();
        let bbox = &geometry.bbox;
        let dx = at.e - at.e.clamp(bbox.min_x, bbox.max_x);
        let dy = at.n - at.n.clamp(bbox.min_y, bbox.max_y);
        let distance_m = dx.hypot(dy);
        if distance_m > GWR_COORD_TOLERANCE_M {
            report.record_warning(
                WarningCategory::Input,
                format!("GWR coordinate is {distance_m:.0} m away from the footprint"),
            );
        }
    }
}

/// Erzeugt die Berichtszeile einer übersprungenen Zone
fn skipped_row(zone: &BuildingZone) -> ZoneRow {
    ZoneRow {
        zone_id: zone.id.clone(),
        name: zone.name.clone(),
        zone_type: zone.zone_type,
        scaffolded: false,
        facade_area_m2: 0.0,
        total_area_m2: 0.0,
    }
}

/// Fassaden des Grundrisses, die eine Zone über ihre Himmelsrichtungen belegt
///
/// Ohne Richtungsangaben gehört der ganze Grundriss zur Zone.
fn zone_facades(geometry: &BuildingGeometry, zone: &BuildingZone) -> Vec<FacadeSegment> {
    if zone.fassaden_ids.is_empty() {
        return geometry.facades.clone();
    }
    geometry
        .facades
        .iter()
        .filter(|f| zone.fassaden_ids.contains(&f.direction))
        .cloned()
        .collect()
}
