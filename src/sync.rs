//! Optimistic-concurrency sync engine.
//!
//! One attempt: serialize the snapshot, write it with the last known version
//! token, and on acceptance re-read the store so the caller adopts the
//! authoritative state. A version mismatch is never merged or overwritten;
//! the user reloads and reapplies.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::change::ChangeLog;
use crate::config::Config;
use crate::error::SyncError;
use crate::graph::FamilyGraph;
use crate::ingest::process_raw_records;
use crate::remote::{RemoteStore, WriteOutcome, WriteRequest};
use crate::types::{Member, RemoteRecord};

/// Sync state as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing {
        #[serde(rename = "startedAt")]
        started_at: DateTime<Utc>,
    },
    Verifying {
        #[serde(rename = "startedAt")]
        started_at: DateTime<Utc>,
    },
    Success {
        #[serde(rename = "finishedAt")]
        finished_at: DateTime<Utc>,
        count: usize,
    },
    Conflict {
        message: String,
        #[serde(rename = "currentVersion", skip_serializing_if = "Option::is_none")]
        current_version: Option<String>,
    },
    Error {
        message: String,
        #[serde(rename = "canRetry")]
        can_retry: bool,
    },
}

/// Result of a verified sync. The caller replaces its snapshot and version
/// token with these.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub graph: FamilyGraph,
    pub version: String,
    pub count: usize,
}

// ============================================================================
// Payload
// ============================================================================

fn or_empty(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn to_remote_record(graph: &FamilyGraph, member: &Member) -> RemoteRecord {
    let (father_name, mother_name) = graph.parent_names(member);
    RemoteRecord {
        name: member.name.clone(),
        spouse_name: or_empty(&member.spouse_name),
        father_name,
        mother_name,
        generation: member.generation.map(|g| g.to_string()).unwrap_or_default(),
        courtesy_name: or_empty(&member.courtesy_name),
        biography: or_empty(&member.biography),
        gender: member.gender.as_str().to_string(),
        birth_date: or_empty(&member.birth_date),
        death_date: or_empty(&member.death_date),
        location: or_empty(&member.location),
        phone: or_empty(&member.phone),
        spouse_phone: or_empty(&member.spouse_phone),
        email: or_empty(&member.email),
    }
}

/// Flatten the snapshot into the store's record shape. The root is left out
/// and parent names are re-derived from the resolved ids.
pub fn to_remote_records(graph: &FamilyGraph) -> Vec<RemoteRecord> {
    graph
        .display_members()
        .map(|m| to_remote_record(graph, m))
        .collect()
}

pub fn build_write_request(graph: &FamilyGraph, version: Option<&str>) -> WriteRequest {
    WriteRequest {
        version: version.map(str::to_string),
        data: to_remote_records(graph),
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct SyncEngine {
    store: Arc<dyn RemoteStore>,
    status: SyncStatus,
    success_display: Duration,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn RemoteStore>, config: &Config) -> Self {
        Self {
            store,
            status: SyncStatus::Idle,
            success_display: config.success_display(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn status(&self) -> SyncStatus {
        self.status_at(Utc::now())
    }

    /// Status as of `now`. A success older than the display window reads as idle.
    pub fn status_at(&self, now: DateTime<Utc>) -> SyncStatus {
        if let SyncStatus::Success { finished_at, .. } = &self.status {
            let shown_for = now.signed_duration_since(*finished_at);
            if shown_for.to_std().is_ok_and(|d| d >= self.success_display) {
                return SyncStatus::Idle;
            }
        }
        self.status.clone()
    }

    /// A write or its verification read is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.status,
            SyncStatus::Syncing { .. } | SyncStatus::Verifying { .. }
        )
    }

    /// Return to idle. Also acknowledges a conflict, which unblocks `sync`.
    pub fn dismiss(&mut self) {
        self.status = SyncStatus::Idle;
    }

    fn fail(&mut self, err: SyncError) -> SyncError {
        log::warn!("Sync failed: {}", err);
        self.status = SyncStatus::Error {
            message: err.to_string(),
            can_retry: err.is_retryable(),
        };
        err
    }

    /// Run one sync attempt.
    ///
    /// The graph is only read. On success the change log is cleared and the
    /// re-read snapshot is returned; on any failure the log is left as is.
    pub async fn sync(
        &mut self,
        graph: &FamilyGraph,
        version: Option<&str>,
        changes: &mut ChangeLog,
    ) -> Result<SyncReport, SyncError> {
        if matches!(self.status, SyncStatus::Conflict { .. }) {
            return Err(SyncError::ConflictUnacknowledged);
        }
        // The backend skips its version check for a null token and replaces
        // the sheet wholesale.
        let Some(version) = version else {
            return Err(self.fail(SyncError::NoVersion));
        };

        self.status = SyncStatus::Syncing {
            started_at: Utc::now(),
        };
        let request = build_write_request(graph, Some(version));
        log::info!(
            "Syncing {} members ({} unsynced changes) against version {}",
            request.data.len(),
            changes.len(),
            version
        );

        let accepted_version = match self.store.write(&request).await {
            Ok(WriteOutcome::Accepted { version, count }) => {
                log::info!("Write accepted: {} records, new version {}", count, version);
                version
            }
            Ok(WriteOutcome::Conflict {
                message,
                current_version,
            }) => {
                log::warn!(
                    "Write rejected, remote is at version {:?}: {}",
                    current_version,
                    message
                );
                self.status = SyncStatus::Conflict {
                    message: message.clone(),
                    current_version: current_version.clone(),
                };
                return Err(SyncError::Conflict {
                    message,
                    current_version,
                });
            }
            Ok(WriteOutcome::Failed { message }) => {
                return Err(self.fail(SyncError::Server(message)));
            }
            Err(e) => return Err(self.fail(e)),
        };

        self.status = SyncStatus::Verifying {
            started_at: Utc::now(),
        };
        let snapshot = match self.store.read().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                return Err(self.fail(SyncError::MalformedResponse(
                    "verification read returned no data".to_string(),
                )))
            }
            Err(e) => return Err(self.fail(e)),
        };
        if snapshot.records.is_empty() && !request.data.is_empty() {
            return Err(self.fail(SyncError::MalformedResponse(
                "verification read returned no records".to_string(),
            )));
        }

        let graph = FamilyGraph::from_members(process_raw_records(&snapshot.records));
        let count = graph.member_count();
        let version = snapshot.version.unwrap_or(accepted_version);

        changes.clear();
        self.status = SyncStatus::Success {
            finished_at: Utc::now(),
            count,
        };
        log::info!("Sync verified: {} members at version {}", count, version);

        Ok(SyncReport {
            graph,
            version,
            count,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use crate::ingest::parse_genealogy_csv;
    use crate::remote::RemoteSnapshot;
    use crate::types::RawRecord;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory store enforcing the version-token contract.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub(crate) state: Mutex<MemoryState>,
    }

    #[derive(Default)]
    pub(crate) struct MemoryState {
        pub(crate) records: Vec<RemoteRecord>,
        pub(crate) version: u64,
        pub(crate) writes: usize,
        pub(crate) fail_reads: bool,
        pub(crate) fail_writes: Option<String>,
        /// Reads answer with no data at all.
        pub(crate) blank_reads: bool,
        /// Writes are acknowledged but not stored.
        pub(crate) discard_writes: bool,
        /// A null expected version skips the check, as the deployed script does.
        pub(crate) accept_unversioned: bool,
    }

    impl MemoryStore {
        pub(crate) fn with_records(records: Vec<RemoteRecord>, version: u64) -> Self {
            Self {
                state: Mutex::new(MemoryState {
                    records,
                    version,
                    ..MemoryState::default()
                }),
            }
        }
    }

    fn to_raw(records: &[RemoteRecord]) -> Vec<RawRecord> {
        serde_json::from_value(serde_json::to_value(records).unwrap()).unwrap()
    }

    #[async_trait]
    impl RemoteStore for MemoryStore {
        async fn read(&self) -> Result<Option<RemoteSnapshot>, SyncError> {
            let state = self.state.lock().unwrap();
            if state.fail_reads {
                return Err(SyncError::Transport("connection reset".to_string()));
            }
            if state.blank_reads {
                return Ok(None);
            }
            Ok(Some(RemoteSnapshot {
                records: to_raw(&state.records),
                version: Some(format!("v{}", state.version)),
            }))
        }

        async fn write(&self, request: &WriteRequest) -> Result<WriteOutcome, SyncError> {
            let mut state = self.state.lock().unwrap();
            if let Some(message) = &state.fail_writes {
                return Ok(WriteOutcome::Failed {
                    message: message.clone(),
                });
            }
            let current = format!("v{}", state.version);
            let unchecked = state.accept_unversioned && request.version.is_none();
            if !unchecked && request.version.as_deref() != Some(current.as_str()) {
                return Ok(WriteOutcome::Conflict {
                    message: "Data has been modified by another user".to_string(),
                    current_version: Some(current),
                });
            }
            if !state.discard_writes {
                state.records = request.data.clone();
            }
            state.version += 1;
            state.writes += 1;
            Ok(WriteOutcome::Accepted {
                version: format!("v{}", state.version),
                count: state.records.len(),
            })
        }
    }

    const CSV: &str = "Name,SpouseName,Father,Mother,Generation,CourtesyName,Notes,gender
Grandpa,,,,1,,,MALE
Dad,Mom,Grandpa,,2,,,MALE
Kid,,Dad,Mom,3,,,FEMALE
";

    fn sample() -> FamilyGraph {
        FamilyGraph::from_members(parse_genealogy_csv(CSV).unwrap())
    }

    fn engine(store: Arc<MemoryStore>) -> SyncEngine {
        SyncEngine::new(store, &Config::default())
    }

    #[test]
    fn test_to_remote_records() {
        let g = sample();
        let mut dad = g.get("1").unwrap().clone();
        dad.name = "Father".to_string();
        let g = g.replace(dad);

        let records = to_remote_records(&g);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].father_name, "");
        assert_eq!(records[0].generation, "1");
        assert_eq!(records[2].father_name, "Father");
        // Mom is not a record; the stored name survives.
        assert_eq!(records[2].mother_name, "Mom");
        assert_eq!(records[2].gender, "FEMALE");
        assert_eq!(records[2].spouse_phone, "");
    }

    #[tokio::test]
    async fn test_sync_success_rereads_and_clears_log() {
        let store = Arc::new(MemoryStore::with_records(Vec::new(), 1));
        let mut engine = engine(store.clone());
        let mut changes = ChangeLog::new();
        changes.record(ChangeKind::Added, "Kid");

        let g = sample();
        let report = engine.sync(&g, Some("v1"), &mut changes).await.unwrap();

        assert_eq!(report.version, "v2");
        assert_eq!(report.count, 3);
        assert!(changes.is_empty());
        assert!(matches!(engine.status(), SyncStatus::Success { count: 3, .. }));

        let kid = report.graph.list().iter().find(|m| m.name == "Kid").unwrap();
        let dad = report.graph.list().iter().find(|m| m.name == "Dad").unwrap();
        assert_eq!(kid.father_id.as_deref(), Some(dad.id.as_str()));
        // Input snapshot untouched.
        assert_eq!(g, sample());
    }

    #[tokio::test]
    async fn test_sync_conflict_keeps_remote_and_log() {
        let existing = to_remote_records(&sample());
        let store = Arc::new(MemoryStore::with_records(existing.clone(), 2));
        let mut engine = engine(store.clone());
        let mut changes = ChangeLog::new();
        changes.record(ChangeKind::Edited, "Dad");

        let g = sample().remove("1");
        let err = engine.sync(&g, Some("v1"), &mut changes).await.unwrap_err();

        match &err {
            SyncError::Conflict {
                current_version, ..
            } => assert_eq!(current_version.as_deref(), Some("v2")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.requires_user_action());
        assert_eq!(changes.len(), 1);
        {
            let state = store.state.lock().unwrap();
            assert_eq!(state.records, existing);
            assert_eq!(state.version, 2);
            assert_eq!(state.writes, 0);
        }

        // Blocked until acknowledged.
        let err = engine.sync(&g, Some("v2"), &mut changes).await.unwrap_err();
        assert!(matches!(err, SyncError::ConflictUnacknowledged));
        assert_eq!(store.state.lock().unwrap().writes, 0);

        engine.dismiss();
        assert_eq!(engine.status(), SyncStatus::Idle);
        engine.sync(&g, Some("v2"), &mut changes).await.unwrap();
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn test_write_without_version_is_refused() {
        let existing = to_remote_records(&sample());
        let store = Arc::new(MemoryStore::with_records(existing.clone(), 1));
        store.state.lock().unwrap().accept_unversioned = true;
        let mut engine = engine(store.clone());
        let mut changes = ChangeLog::new();
        changes.record(ChangeKind::Added, "New Member");

        let err = engine
            .sync(&sample().remove("0"), None, &mut changes)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NoVersion));
        assert!(err.requires_user_action());
        assert!(matches!(
            engine.status(),
            SyncStatus::Error {
                can_retry: false,
                ..
            }
        ));
        assert_eq!(changes.len(), 1);

        let state = store.state.lock().unwrap();
        assert_eq!(state.records, existing);
        assert_eq!(state.writes, 0);
    }

    #[tokio::test]
    async fn test_verify_empty_read_is_error() {
        let store = Arc::new(MemoryStore::with_records(Vec::new(), 1));
        store.state.lock().unwrap().blank_reads = true;
        let mut engine = engine(store.clone());
        let mut changes = ChangeLog::new();
        changes.record(ChangeKind::Edited, "Dad");

        let err = engine.sync(&sample(), Some("v1"), &mut changes).await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedResponse(_)));
        assert!(matches!(engine.status(), SyncStatus::Error { .. }));
        assert_eq!(changes.len(), 1);

        // Write acknowledged, but the re-read comes back without records.
        {
            let mut state = store.state.lock().unwrap();
            state.blank_reads = false;
            state.discard_writes = true;
            state.records.clear();
        }
        let err = engine.sync(&sample(), Some("v2"), &mut changes).await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedResponse(_)));
        assert!(matches!(engine.status(), SyncStatus::Error { .. }));
        assert_eq!(changes.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_empty_after_delete_all_succeeds() {
        let store = Arc::new(MemoryStore::with_records(to_remote_records(&sample()), 1));
        let mut engine = engine(store.clone());
        let mut changes = ChangeLog::new();
        changes.record(ChangeKind::Deleted, "Grandpa");

        let report = engine
            .sync(&FamilyGraph::default(), Some("v1"), &mut changes)
            .await
            .unwrap();
        assert_eq!(report.count, 0);
        assert_eq!(report.version, "v2");
        assert!(changes.is_empty());
        assert!(matches!(engine.status(), SyncStatus::Success { count: 0, .. }));
        assert!(store.state.lock().unwrap().records.is_empty());
    }

    #[tokio::test]
    async fn test_server_failure_is_retryable_error() {
        let store = Arc::new(MemoryStore::with_records(Vec::new(), 1));
        store.state.lock().unwrap().fail_writes = Some("Sheet not found".to_string());
        let mut engine = engine(store);
        let mut changes = ChangeLog::new();
        changes.record(ChangeKind::Deleted, "X");

        let err = engine.sync(&sample(), Some("v1"), &mut changes).await.unwrap_err();
        assert!(matches!(err, SyncError::Server(_)));
        assert_eq!(
            engine.status(),
            SyncStatus::Error {
                message: "Server error: Sheet not found".to_string(),
                can_retry: true
            }
        );
        assert_eq!(changes.len(), 1);
        assert!(!engine.is_busy());
    }

    #[tokio::test]
    async fn test_failed_verification_is_error() {
        let store = Arc::new(MemoryStore::with_records(Vec::new(), 1));
        store.state.lock().unwrap().fail_reads = true;
        let mut engine = engine(store.clone());
        let mut changes = ChangeLog::new();
        changes.record(ChangeKind::Added, "Kid");

        let err = engine.sync(&sample(), Some("v1"), &mut changes).await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
        assert!(matches!(engine.status(), SyncStatus::Error { .. }));
        assert_eq!(changes.len(), 1);
        // The write itself went through.
        assert_eq!(store.state.lock().unwrap().writes, 1);
    }

    #[test]
    fn test_success_display_window() {
        let mut engine = engine(Arc::new(MemoryStore::default()));
        let finished_at = Utc::now();
        engine.status = SyncStatus::Success {
            finished_at,
            count: 2,
        };
        assert!(matches!(
            engine.status_at(finished_at + chrono::Duration::seconds(1)),
            SyncStatus::Success { .. }
        ));
        assert_eq!(
            engine.status_at(finished_at + chrono::Duration::seconds(3)),
            SyncStatus::Idle
        );
    }

    #[test]
    fn test_status_serialization() {
        let status = SyncStatus::Conflict {
            message: "stale".to_string(),
            current_version: Some("v9".to_string()),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "conflict");
        assert_eq!(json["currentVersion"], "v9");
        assert_eq!(
            serde_json::to_value(SyncStatus::Idle).unwrap(),
            serde_json::json!({"status": "idle"})
        );
    }
}
