//! Zonenzerlegung: automatischer Kontext oder Orakelanalyse mit Rückfall
//!
//! Einfache Gebäude bekommen direkt den Ein-Zonen-Kontext. Für alles
//! andere wird das Orakel befragt, mit Zeitlimit und strenger Prüfung
//! der Antwort. Jeder Fehlschlag fällt auf den automatischen Kontext
//! zurück; die Zerlegung liefert immer ein Resultat.

use anyhow::{bail, Context, Result};
use npk114::access::{AccessPlanner, AccessRules};
use npk114::zone::{now_epoch, single_zone_context};
use npk114::{
    BuildingContext, BuildingGeometry, BuildingZone, Complexity, ContextSource, Direction,
    ZoneType,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::OracleConfig;
use crate::height::HeightInfo;
use crate::oracle::{parse_analysis, BuildingDescription, OracleAnalysis, ZoneAnalysisOracle};

/// Vertrauenswert für Orakelzonen ohne eigene Angabe
const DEFAULT_ORACLE_CONFIDENCE: f64 = 0.8;

/// Eingaben für die Zerlegung eines Gebäudes
#[derive(Debug)]
pub struct DecompositionRequest<'a> {
    pub egid: u64,
    pub address: Option<String>,
    pub geometry: &'a BuildingGeometry,
    pub heights: &'a HeightInfo,
    pub gklas: Option<u16>,
    pub complexity: Complexity,
    /// False erzwingt den automatischen Kontext
    pub use_oracle: bool,
}

/// Ergebnis einer Zerlegung
///
/// Fassadenkonflikte sind im Kontext bereits aufgelöst (die spätere
/// Zone gewinnt); die Beschreibungen gehen als Warnung in den Bericht.
#[derive(Debug)]
pub struct Decomposition {
    pub context: BuildingContext,
    pub facade_conflicts: Vec<String>,
}

/// Zerlegt Gebäude in Gerüstzonen
pub struct ZoneDecomposer<O> {
    oracle: O,
    config: OracleConfig,
    planner: AccessPlanner,
}

impl<O: ZoneAnalysisOracle> ZoneDecomposer<O> {
    pub fn new(oracle: O, config: OracleConfig, access_rules: AccessRules) -> Self {
        Self {
            oracle,
            config,
            planner: AccessPlanner::new(access_rules),
        }
    }

    /// Zerlegt ein Gebäude. Schlägt nie fehl.
    pub async fn decompose(&self, request: &DecompositionRequest<'_>) -> Decomposition {
        if !request.use_oracle || request.complexity == Complexity::Simple {
            debug!(
                egid = request.egid,
                complexity = %request.complexity,
                "Automatic single zone context"
            );
            return self.auto_context(request);
        }

        match self.consult_oracle(request).await {
            Ok(decomposition) => decomposition,
            Err(err) => {
                warn!(
                    egid = request.egid,
                    error = format!("{err:#}"),
                    "Oracle analysis failed, falling back to automatic context"
                );
                self.auto_context(request)
            }
        }
    }

    /// Ein-Zonen-Kontext über den ganzen Grundriss
    fn auto_context(&self, request: &DecompositionRequest<'_>) -> Decomposition {
        Decomposition {
            context: single_zone_context(
                request.egid.to_string(),
                request.address.clone(),
                request.geometry,
                request.heights.traufhoehe_m,
                request.heights.firsthoehe_m,
                request.heights.active_height_m,
                request.complexity,
                &self.planner,
            ),
            facade_conflicts: Vec::new(),
        }
    }

    async fn consult_oracle(&self, request: &DecompositionRequest<'_>) -> Result<Decomposition> {
        let description = BuildingDescription::from_geometry(
            request.egid,
            request.address.clone(),
            request.geometry,
            request.heights.active_height_m,
            request.heights.traufhoehe_m,
            request.heights.firsthoehe_m,
            request.gklas,
        );

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let response = tokio::time::timeout(timeout, self.oracle.analyze(&description))
            .await
            .context("oracle analysis timed out")??;

        let analysis = parse_analysis(&response)?;
        self.build_context(request, analysis)
    }

    /// Baut aus der geprüften Orakelantwort den Gebäudekontext
    fn build_context(
        &self,
        request: &DecompositionRequest<'_>,
        analysis: OracleAnalysis,
    ) -> Result<Decomposition> {
        if analysis.zones.is_empty() {
            bail!("oracle returned no zones");
        }

        let vertex_count = request.geometry.footprint.vertex_count();
        let mut zones: Vec<BuildingZone> = Vec::with_capacity(analysis.zones.len());
        let mut name_to_id: HashMap<String, String> = HashMap::new();
        // Fassadenrichtung -> Index der Zone, die sie zuletzt beansprucht hat
        let mut claimed: HashMap<Direction, usize> = HashMap::new();
        let mut facade_conflicts: Vec<String> = Vec::new();

        for (i, raw) in analysis.zones.into_iter().enumerate() {
            let zone_type: ZoneType = raw
                .zone_type
                .parse()
                .with_context(|| format!("zone '{}'", raw.name))?;

            if let Some(indices) = &raw.polygon_point_indices {
                if let Some(out) = indices.iter().find(|idx| **idx >= vertex_count) {
                    bail!(
                        "zone '{}' references point index {} outside the footprint ({} points)",
                        raw.name,
                        out,
                        vertex_count
                    );
                }
            }

            let mut fassaden_ids = Vec::with_capacity(raw.fassaden_ids.len());
            for label in &raw.fassaden_ids {
                let direction: Direction = label
                    .parse()
                    .with_context(|| format!("zone '{}'", raw.name))?;
                if !fassaden_ids.contains(&direction) {
                    fassaden_ids.push(direction);
                }
            }

            // Doppelt beanspruchte Fassaden: die spätere Zone gewinnt
            for direction in &fassaden_ids {
                if let Some(previous) = claimed.insert(*direction, i) {
                    warn!(
                        egid = request.egid,
                        direction = %direction,
                        loser = %zones[previous].name,
                        winner = %raw.name,
                        "Facade claimed twice, later zone wins"
                    );
                    facade_conflicts.push(format!(
                        "facade {} claimed by '{}' and '{}', later zone wins",
                        direction, zones[previous].name, raw.name
                    ));
                    let loser: &mut BuildingZone = &mut zones[previous];
                    loser.fassaden_ids.retain(|d| d != direction);
                }
            }

            let gebaeudehoehe_m = raw
                .gebaeudehoehe_m
                .or(raw.firsthoehe_m)
                .or(raw.traufhoehe_m)
                .unwrap_or(request.heights.active_height_m);

            let id = format!("zone-{}", i + 1);
            name_to_id.insert(raw.name.clone(), id.clone());
            zones.push(BuildingZone {
                id,
                name: raw.name,
                zone_type,
                polygon_point_indices: raw.polygon_point_indices,
                sub_polygon: None,
                traufhoehe_m: raw.traufhoehe_m,
                firsthoehe_m: raw.firsthoehe_m,
                gebaeudehoehe_m,
                fassaden_ids,
                beruesten: raw.beruesten,
                sonderkonstruktion: raw.sonderkonstruktion,
                confidence: raw
                    .confidence
                    .unwrap_or(DEFAULT_ORACLE_CONFIDENCE)
                    .clamp(0.0, 1.0),
            });
        }

        // Nachbarschaft von Orakelnamen auf Zonen-Ids umschlüsseln
        let mut zone_adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for (name, neighbours) in analysis.zone_adjacency {
            let Some(id) = name_to_id.get(&name) else {
                warn!(egid = request.egid, zone = %name, "Adjacency references unknown zone");
                continue;
            };
            let mapped: Vec<String> = neighbours
                .iter()
                .filter_map(|n| {
                    let id = name_to_id.get(n);
                    if id.is_none() {
                        warn!(egid = request.egid, zone = %n, "Adjacency references unknown zone");
                    }
                    id.cloned()
                })
                .collect();
            if !mapped.is_empty() {
                zone_adjacency.insert(id.clone(), mapped);
            }
        }

        let confidence = match analysis.confidence {
            Some(c) => c.clamp(0.0, 1.0),
            None => {
                let sum: f64 = zones.iter().map(|z| z.confidence).sum();
                sum / zones.len() as f64
            }
        };

        let now = now_epoch();
        Ok(Decomposition {
            context: BuildingContext {
                egid: request.egid.to_string(),
                address: request.address.clone(),
                zones,
                zone_adjacency,
                complexity: request.complexity,
                flags: analysis.flags,
                terrain: analysis.terrain.unwrap_or_default(),
                source: ContextSource::Oracle,
                confidence,
                validated: false,
                reasoning: analysis.reasoning,
                access: Some(self.planner.plan(&request.geometry.facades)),
                created_at_epoch: now,
                updated_at_epoch: now,
            },
            facade_conflicts,
        })
    }
}
