//! Family tree records: spreadsheet ingestion, an in-memory member snapshot,
//! change detection, and version-checked sync against a spreadsheet backend.

pub mod change;
pub mod config;
pub mod dates;
pub mod error;
pub mod export;
pub mod graph;
pub mod ingest;
pub mod loader;
pub mod parser;
pub mod remote;
pub mod session;
pub mod sync;
pub mod types;

pub use change::{has_member_changed, ChangeKind, ChangeLog};
pub use error::{ParseError, SyncError, SyncFailure};
pub use graph::FamilyGraph;
pub use ingest::{parse_genealogy_csv, process_raw_records};
pub use loader::{load_dataset, LoadedDataset};
pub use session::Session;
pub use sync::{SyncEngine, SyncReport, SyncStatus};
pub use types::{DataSource, Gender, Member, ROOT_ID};
