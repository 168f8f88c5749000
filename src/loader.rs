//! Dataset loading with source fallback.
//!
//! Sources are tried in priority order: the script API, the published CSV
//! mirror, then the dataset compiled into the binary. Loading never fails;
//! every skipped source leaves a reason on the result.

use serde::Serialize;

use crate::graph::FamilyGraph;
use crate::ingest::{parse_genealogy_csv, process_raw_records};
use crate::remote::{CsvMirror, RemoteStore};
use crate::types::DataSource;

/// Built-in dataset used when no remote source yields members.
pub const BUNDLED_DATASET_CSV: &str = "Name,SpouseName,Father,Mother,Generation,CourtesyName,Notes,gender,birthDate,deathDate,location,Phone,SpousePhone,Email
曹德秀,,,,11,元,,MALE,,,,,,
曹來秀,,,,11,元,,MALE,,,,,,
";

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataset {
    pub graph: FamilyGraph,
    /// Version token; only the script API issues one.
    pub version: Option<String>,
    pub source: DataSource,
    pub fallback_reasons: Vec<String>,
}

impl LoadedDataset {
    /// True when the data did not come from the primary source.
    pub fn is_fallback(&self) -> bool {
        self.source.is_fallback()
    }

    pub fn summary(&self) -> LoadSummary {
        LoadSummary::new(
            self.source,
            &self.graph,
            self.version.as_deref(),
            &self.fallback_reasons,
        )
    }
}

/// Serializable load report for display layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub source: DataSource,
    pub member_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_reasons: Vec<String>,
}

impl LoadSummary {
    pub fn new(
        source: DataSource,
        graph: &FamilyGraph,
        version: Option<&str>,
        fallback_reasons: &[String],
    ) -> Self {
        Self {
            source,
            member_count: graph.member_count(),
            version: version.map(str::to_string),
            fallback: source.is_fallback(),
            fallback_reasons: fallback_reasons.to_vec(),
        }
    }
}

/// A script read that yielded no members. `version` is kept when the read
/// itself succeeded against an empty sheet.
struct ScriptMiss {
    reason: String,
    version: Option<String>,
}

impl From<String> for ScriptMiss {
    fn from(reason: String) -> Self {
        Self {
            reason,
            version: None,
        }
    }
}

async fn from_script(store: &dyn RemoteStore) -> Result<(FamilyGraph, Option<String>), ScriptMiss> {
    let snapshot = store
        .read()
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "script API returned no data".to_string())?;
    if snapshot.records.is_empty() {
        return Err(ScriptMiss {
            reason: "script API returned no members".to_string(),
            version: snapshot.version,
        });
    }
    let graph = FamilyGraph::from_members(process_raw_records(&snapshot.records));
    Ok((graph, snapshot.version))
}

async fn from_mirror(mirror: &dyn CsvMirror) -> Result<FamilyGraph, String> {
    let text = mirror
        .fetch_csv()
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "CSV mirror returned no usable CSV".to_string())?;
    let members = parse_genealogy_csv(&text).map_err(|e| e.to_string())?;
    let graph = FamilyGraph::from_members(members);
    if graph.member_count() == 0 {
        return Err("CSV mirror has no members".to_string());
    }
    Ok(graph)
}

fn bundled() -> FamilyGraph {
    match parse_genealogy_csv(BUNDLED_DATASET_CSV) {
        Ok(members) => FamilyGraph::from_members(members),
        Err(e) => {
            log::error!("Bundled dataset failed to parse: {}", e);
            FamilyGraph::default()
        }
    }
}

/// Load the dataset from the first source that yields members.
///
/// A fallback dataset carries a version token only when the script API
/// answered with an empty sheet; otherwise it has none and cannot be synced.
pub async fn load_dataset(
    store: Option<&dyn RemoteStore>,
    mirror: Option<&dyn CsvMirror>,
) -> LoadedDataset {
    let mut fallback_reasons = Vec::new();
    let mut empty_sheet_version = None;

    match store {
        Some(store) => match from_script(store).await {
            Ok((graph, version)) => {
                log::info!(
                    "Loaded {} members from script API (version {:?})",
                    graph.member_count(),
                    version
                );
                return LoadedDataset {
                    graph,
                    version,
                    source: DataSource::ScriptApi,
                    fallback_reasons,
                };
            }
            Err(miss) => {
                log::warn!("Script API load failed: {}", miss.reason);
                fallback_reasons.push(miss.reason);
                empty_sheet_version = miss.version;
            }
        },
        None => fallback_reasons.push("no script URL configured".to_string()),
    }

    match mirror {
        Some(mirror) => match from_mirror(mirror).await {
            Ok(graph) => {
                log::info!("Loaded {} members from CSV mirror", graph.member_count());
                return LoadedDataset {
                    graph,
                    version: empty_sheet_version,
                    source: DataSource::CsvMirror,
                    fallback_reasons,
                };
            }
            Err(reason) => {
                log::warn!("CSV mirror load failed: {}", reason);
                fallback_reasons.push(reason);
            }
        },
        None => fallback_reasons.push("no CSV mirror configured".to_string()),
    }

    log::warn!(
        "Falling back to bundled dataset ({})",
        fallback_reasons.join("; ")
    );
    LoadedDataset {
        graph: bundled(),
        version: empty_sheet_version,
        source: DataSource::Bundled,
        fallback_reasons,
    }
}
