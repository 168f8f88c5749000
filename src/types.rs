//! Core record types shared by ingestion, the graph store, and sync.

use serde::{Deserialize, Deserializer, Serialize};

/// Reserved id of the synthetic root that parents every unresolved member.
pub const ROOT_ID: &str = "virtual_root";

/// Placeholder used when a remote record carries no name.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    /// Map a raw spreadsheet token. Latin tokens are case-insensitive.
    pub fn from_raw(raw: &str) -> Self {
        let token = raw.trim();
        if token.eq_ignore_ascii_case("MALE") || token == "男性" {
            Gender::Male
        } else if token.eq_ignore_ascii_case("FEMALE") || token == "女性" {
            Gender::Female
        } else {
            Gender::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Other => "OTHER",
        }
    }
}

/// A single person in the family dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spouse_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Generation number (世代). Only the root carries generation 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u32>,
    /// Courtesy name (字).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courtesy_name: Option<String>,
    /// Free-text spouse name; spouses are not graph nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spouse_name: Option<String>,
    /// Resolved father. `None` only on the root itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_id: Option<String>,
    /// Father name as imported or typed, kept for re-editing by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
}

impl Member {
    /// Empty record with the given id and name; father defaults to the root.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gender: Gender::Other,
            birth_date: None,
            death_date: None,
            biography: None,
            location: None,
            phone: None,
            spouse_phone: None,
            email: None,
            generation: None,
            courtesy_name: None,
            spouse_name: None,
            father_id: Some(ROOT_ID.to_string()),
            mother_id: None,
            father_name: None,
            mother_name: None,
        }
    }

    /// The synthetic root record.
    pub fn root() -> Self {
        Self {
            gender: Gender::Other,
            biography: Some("Hidden Root".to_string()),
            generation: Some(0),
            father_id: None,
            ..Self::new(ROOT_ID, "ROOT")
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }
}

/// Which source the current snapshot was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    /// Primary read/write endpoint (carries a version token).
    ScriptApi,
    /// Published CSV mirror of the spreadsheet (read-only).
    CsvMirror,
    /// Dataset compiled into the binary.
    Bundled,
}

impl DataSource {
    pub fn is_remote(&self) -> bool {
        !matches!(self, DataSource::Bundled)
    }

    /// Anything other than the primary read/write endpoint.
    pub fn is_fallback(&self) -> bool {
        !matches!(self, DataSource::ScriptApi)
    }
}

// ============================================================================
// Remote flat record shape
// ============================================================================

/// Loosely-typed record as delivered by the spreadsheet backend or built
/// from a CSV row. Every field is optional; values may arrive as strings
/// or numbers.
///
/// The spreadsheet's own column names are accepted as aliases so that a
/// backend which forwards raw headers still parses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(default, alias = "Name", deserialize_with = "loose_string")]
    pub name: Option<String>,
    #[serde(default, alias = "SpouseName", deserialize_with = "loose_string")]
    pub spouse_name: Option<String>,
    #[serde(default, alias = "Father", deserialize_with = "loose_string")]
    pub father_name: Option<String>,
    #[serde(default, alias = "Mother", deserialize_with = "loose_string")]
    pub mother_name: Option<String>,
    #[serde(default, alias = "Generation", deserialize_with = "loose_string")]
    pub generation: Option<String>,
    #[serde(default, alias = "CourtesyName", deserialize_with = "loose_string")]
    pub courtesy_name: Option<String>,
    #[serde(default, alias = "Notes", deserialize_with = "loose_string")]
    pub biography: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub birth_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub death_date: Option<String>,
    #[serde(default, alias = "Location", deserialize_with = "loose_string")]
    pub location: Option<String>,
    #[serde(default, alias = "Phone", deserialize_with = "loose_string")]
    pub phone: Option<String>,
    #[serde(default, alias = "SpousePhone", deserialize_with = "loose_string")]
    pub spouse_phone: Option<String>,
    #[serde(default, alias = "Email", deserialize_with = "loose_string")]
    pub email: Option<String>,
}

/// Outgoing flat record. Absent values are written as empty strings,
/// which is what the spreadsheet backend stores for blank cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub name: String,
    pub spouse_name: String,
    pub father_name: String,
    pub mother_name: String,
    pub generation: String,
    pub courtesy_name: String,
    pub biography: String,
    pub gender: String,
    pub birth_date: String,
    pub death_date: String,
    pub location: String,
    pub phone: String,
    pub spouse_phone: String,
    pub email: String,
}

/// Accept a JSON string, number, or bool as a string; null becomes `None`.
pub(crate) fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_flags() {
        assert!(!DataSource::ScriptApi.is_fallback());
        assert!(DataSource::CsvMirror.is_fallback());
        assert!(DataSource::CsvMirror.is_remote());
        assert!(DataSource::Bundled.is_fallback());
        assert!(!DataSource::Bundled.is_remote());
    }

    #[test]
    fn test_gender_from_raw() {
        assert_eq!(Gender::from_raw("MALE"), Gender::Male);
        assert_eq!(Gender::from_raw("male"), Gender::Male);
        assert_eq!(Gender::from_raw("男性"), Gender::Male);
        assert_eq!(Gender::from_raw("Female"), Gender::Female);
        assert_eq!(Gender::from_raw("女性"), Gender::Female);
        assert_eq!(Gender::from_raw(""), Gender::Other);
        assert_eq!(Gender::from_raw("unknown"), Gender::Other);
    }

    #[test]
    fn test_root_shape() {
        let root = Member::root();
        assert!(root.is_root());
        assert_eq!(root.generation, Some(0));
        assert!(root.father_id.is_none());
    }

    #[test]
    fn test_member_serializes_camel_case() {
        let mut m = Member::new("1", "A");
        m.courtesy_name = Some("元".to_string());
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["courtesyName"], "元");
        assert_eq!(json["fatherId"], ROOT_ID);
        assert_eq!(json["gender"], "OTHER");
        assert!(json.get("birthDate").is_none());
    }

    #[test]
    fn test_raw_record_loose_and_aliases() {
        let json = r#"{
            "Name": "曹德秀",
            "Generation": 11,
            "Father": "",
            "phone": 912345678,
            "email": null
        }"#;
        let raw: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(raw.name.as_deref(), Some("曹德秀"));
        assert_eq!(raw.generation.as_deref(), Some("11"));
        assert_eq!(raw.father_name.as_deref(), Some(""));
        assert_eq!(raw.phone.as_deref(), Some("912345678"));
        assert!(raw.email.is_none());
        assert!(raw.mother_name.is_none());
    }
}
