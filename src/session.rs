//! Editing session: the current snapshot, its version token, the unsynced
//! change log, and the sync engine, kept together the way the app shell
//! holds them.
//!
//! Every local edit is applied first and then synced when a remote is
//! configured. A failed sync never rolls the edit back.

use std::sync::Arc;

use crate::change::{has_member_changed, ChangeKind, ChangeLog};
use crate::config::Config;
use crate::error::SyncError;
use crate::graph::FamilyGraph;
use crate::loader::{load_dataset, LoadSummary, LoadedDataset};
use crate::remote::http::{HttpCsvMirror, HttpRemoteStore};
use crate::remote::{CsvMirror, RemoteStore};
use crate::sync::{SyncEngine, SyncStatus};
use crate::types::{DataSource, Member};

/// What happened to the remote after a local edit.
#[derive(Debug)]
pub enum SyncAttempt {
    /// No remote configured.
    Skipped,
    Synced { count: usize },
    Failed(SyncError),
}

#[derive(Debug)]
pub enum SaveOutcome {
    /// Nothing meaningful changed; no log entry, no sync.
    Unchanged,
    Applied { kind: ChangeKind, sync: SyncAttempt },
}

pub struct Session {
    graph: FamilyGraph,
    version: Option<String>,
    source: DataSource,
    fallback_reasons: Vec<String>,
    changes: ChangeLog,
    engine: Option<SyncEngine>,
    mirror: Option<Arc<dyn CsvMirror>>,
}

impl Session {
    /// Build HTTP sources from the configured URLs and load.
    pub async fn open(config: &Config) -> Result<Self, SyncError> {
        let store: Option<Arc<dyn RemoteStore>> = match config.script_url.as_deref() {
            Some(url) => {
                let store = HttpRemoteStore::new(url, config.request_timeout())?;
                Some(Arc::new(store) as Arc<dyn RemoteStore>)
            }
            None => None,
        };
        let mirror: Option<Arc<dyn CsvMirror>> = match config.csv_mirror_url.as_deref() {
            Some(url) => {
                let mirror = HttpCsvMirror::new(url, config.request_timeout())?;
                Some(Arc::new(mirror) as Arc<dyn CsvMirror>)
            }
            None => None,
        };
        Ok(Self::load(store, mirror, config).await)
    }

    pub async fn load(
        store: Option<Arc<dyn RemoteStore>>,
        mirror: Option<Arc<dyn CsvMirror>>,
        config: &Config,
    ) -> Self {
        let loaded = load_dataset(store.as_deref(), mirror.as_deref()).await;
        let mut session = Self {
            graph: FamilyGraph::default(),
            version: None,
            source: DataSource::Bundled,
            fallback_reasons: Vec::new(),
            changes: ChangeLog::new(),
            engine: store.map(|s| SyncEngine::new(s, config)),
            mirror,
        };
        session.adopt(loaded);
        session
    }

    fn adopt(&mut self, loaded: LoadedDataset) {
        self.graph = loaded.graph;
        self.version = loaded.version;
        self.source = loaded.source;
        self.fallback_reasons = loaded.fallback_reasons;
    }

    pub fn graph(&self) -> &FamilyGraph {
        &self.graph
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn summary(&self) -> LoadSummary {
        LoadSummary::new(
            self.source,
            &self.graph,
            self.version.as_deref(),
            &self.fallback_reasons,
        )
    }

    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    pub fn has_unsynced_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.engine
            .as_ref()
            .map(SyncEngine::status)
            .unwrap_or_default()
    }

    pub fn dismiss_status(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.dismiss();
        }
    }

    // ========================================================================
    // Edits
    // ========================================================================

    /// Save an edited or new member. Parent links are re-resolved from the
    /// names before comparing.
    pub async fn save_member(&mut self, member: Member) -> SaveOutcome {
        if member.is_root() {
            log::warn!("Ignoring edit to the virtual root");
            return SaveOutcome::Unchanged;
        }

        let member = self.graph.relink(member);
        let kind = match self.graph.get(&member.id) {
            Some(prev) if !has_member_changed(prev, &member) => {
                log::debug!("No changes to {}, skipping sync", member.name);
                return SaveOutcome::Unchanged;
            }
            Some(_) => ChangeKind::Edited,
            None => ChangeKind::Added,
        };

        self.changes.record(kind, &member.name);
        self.graph = self.graph.insert(member);
        let sync = self.auto_sync().await;
        SaveOutcome::Applied { kind, sync }
    }

    /// Insert a default member under `parent_id` and return its id.
    pub async fn add_member(&mut self, parent_id: Option<&str>) -> (String, SyncAttempt) {
        let member = self.graph.new_member(parent_id);
        let id = member.id.clone();
        self.changes.record(ChangeKind::Added, &member.name);
        self.graph = self.graph.insert(member);
        (id, self.auto_sync().await)
    }

    /// Delete a member. Returns `None` for the root or an unknown id.
    pub async fn delete_member(&mut self, id: &str) -> Option<SyncAttempt> {
        let member = self.graph.get(id).filter(|m| !m.is_root())?;
        self.changes.record(ChangeKind::Deleted, &member.name);
        self.graph = self.graph.remove(id);
        Some(self.auto_sync().await)
    }

    /// Replace the whole snapshot (bulk CSV import) and push it.
    pub async fn import(&mut self, graph: FamilyGraph) -> SyncAttempt {
        let subject = format!("{} members", graph.member_count());
        self.changes.record(ChangeKind::Imported, &subject);
        self.graph = graph;
        self.auto_sync().await
    }

    // ========================================================================
    // Remote
    // ========================================================================

    /// Push the snapshot and adopt the verified remote state.
    ///
    /// Refused with [`SyncError::NoVersion`] until a script API read has
    /// issued a version token.
    pub async fn sync(&mut self) -> Result<usize, SyncError> {
        let engine = self.engine.as_mut().ok_or(SyncError::NotConfigured)?;
        let report = engine
            .sync(&self.graph, self.version.as_deref(), &mut self.changes)
            .await?;

        self.graph = report.graph;
        self.version = Some(report.version);
        self.source = DataSource::ScriptApi;
        self.fallback_reasons.clear();
        Ok(report.count)
    }

    async fn auto_sync(&mut self) -> SyncAttempt {
        if self.engine.is_none() {
            return SyncAttempt::Skipped;
        }
        match self.sync().await {
            Ok(count) => SyncAttempt::Synced { count },
            Err(e) => SyncAttempt::Failed(e),
        }
    }

    /// Reload from the sources. Refused while unsynced edits exist unless
    /// `force` is set, in which case they are discarded. Returns whether the
    /// reload happened.
    pub async fn reload(&mut self, force: bool) -> bool {
        if self.has_unsynced_changes() && !force {
            log::warn!(
                "Refusing reload with {} unsynced change(s)",
                self.changes.len()
            );
            return false;
        }

        let store = self.engine.as_ref().map(|e| e.store().clone());
        let loaded = load_dataset(store.as_deref(), self.mirror.as_deref()).await;
        self.adopt(loaded);
        self.changes.clear();
        self.dismiss_status();
        true
    }
}
