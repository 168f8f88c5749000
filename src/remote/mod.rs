//! Remote spreadsheet store contract.
//!
//! The store is consumed through two calls: a read returning every record
//! plus the current version token, and a write that the server accepts only
//! when the echoed token still matches its own.
//!
//! Modules:
//! - http: reqwest implementation for the Apps Script endpoint and CSV mirror

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::types::{loose_string, RawRecord, RemoteRecord};

// ============================================================================
// Wire types
// ============================================================================

/// Result of a successful read.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSnapshot {
    pub records: Vec<RawRecord>,
    /// Opaque token; echoed back unchanged on the next write.
    pub version: Option<String>,
}

/// Body of a versioned write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteRequest {
    /// `None` when no version was ever obtained (first write to a fresh sheet).
    pub version: Option<String>,
    pub data: Vec<RemoteRecord>,
}

/// Outcome of a write the server answered in-protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Accepted {
        version: String,
        count: usize,
    },
    Conflict {
        message: String,
        current_version: Option<String>,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct ReadBody {
    data: Option<Vec<RawRecord>>,
    #[serde(default, deserialize_with = "loose_string")]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum WriteBody {
    Success {
        #[serde(default, deserialize_with = "loose_string")]
        version: Option<String>,
        #[serde(default)]
        count: usize,
    },
    Conflict {
        #[serde(default)]
        message: String,
        #[serde(default, rename = "currentVersion", deserialize_with = "loose_string")]
        current_version: Option<String>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

/// Parse a read response body. Anything without a `data` array means
/// "no data available" rather than an error.
pub fn parse_read_body(body: &str) -> Option<RemoteSnapshot> {
    match serde_json::from_str::<ReadBody>(body) {
        Ok(ReadBody {
            data: Some(records),
            version,
        }) => Some(RemoteSnapshot { records, version }),
        Ok(_) => {
            log::debug!("Read response has no data array");
            None
        }
        Err(e) => {
            log::debug!("Read response is not a record set: {}", e);
            None
        }
    }
}

/// Parse a write response body into an outcome.
pub fn parse_write_body(body: &str) -> Result<WriteOutcome, SyncError> {
    let parsed: WriteBody = serde_json::from_str(body).map_err(|e| {
        SyncError::MalformedResponse(format!("unexpected write response: {}", e))
    })?;
    Ok(match parsed {
        WriteBody::Success { version, count } => WriteOutcome::Accepted {
            version: version.ok_or_else(|| {
                SyncError::MalformedResponse("success response without a version".to_string())
            })?,
            count,
        },
        WriteBody::Conflict {
            message,
            current_version,
        } => WriteOutcome::Conflict {
            message,
            current_version,
        },
        WriteBody::Error { message } => WriteOutcome::Failed { message },
    })
}

// ============================================================================
// Store seams
// ============================================================================

/// Primary read/write store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read every record. `Ok(None)` means the endpoint answered but served
    /// nothing usable (wrong content type, unparseable body).
    async fn read(&self) -> Result<Option<RemoteSnapshot>, SyncError>;

    /// Version-checked full replacement of the remote records.
    async fn write(&self, request: &WriteRequest) -> Result<WriteOutcome, SyncError>;
}

/// Read-only CSV export of the sheet.
#[async_trait]
pub trait CsvMirror: Send + Sync {
    /// Fetch the CSV text. `Ok(None)` when the mirror served something that
    /// is clearly not CSV (an HTML error page, a near-empty body).
    async fn fetch_csv(&self) -> Result<Option<String>, SyncError>;
}
