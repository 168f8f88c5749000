//! Dirty checking for edited members and the unsynced change log.

use serde::Serialize;

use crate::types::Member;

/// Fields that carry meaning for the family record. Resolved ids are left
/// out on purpose: they are derived from the names.
fn compared_fields(m: &Member) -> [Option<String>; 14] {
    [
        Some(m.name.clone()),
        Some(m.gender.as_str().to_string()),
        m.birth_date.clone(),
        m.death_date.clone(),
        m.biography.clone(),
        m.location.clone(),
        m.phone.clone(),
        m.spouse_phone.clone(),
        m.email.clone(),
        m.generation.map(|g| g.to_string()),
        m.courtesy_name.clone(),
        m.spouse_name.clone(),
        m.father_name.clone(),
        m.mother_name.clone(),
    ]
}

fn comparable(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

/// True if any compared field differs after trimming. Absent equals empty.
pub fn has_member_changed(prev: &Member, next: &Member) -> bool {
    compared_fields(prev)
        .iter()
        .zip(compared_fields(next).iter())
        .any(|(a, b)| comparable(a) != comparable(b))
}

/// Whether saving `next` warrants a remote sync. New records always do.
pub fn needs_sync(prev: Option<&Member>, next: &Member) -> bool {
    match prev {
        None => true,
        Some(prev) => has_member_changed(prev, next),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Edited,
    Deleted,
    Imported,
}

impl ChangeKind {
    fn label(&self) -> &'static str {
        match self {
            ChangeKind::Added => "[Added]",
            ChangeKind::Edited => "[Edited]",
            ChangeKind::Deleted => "[Deleted]",
            ChangeKind::Imported => "[Imported]",
        }
    }
}

/// Human-readable list of local edits not yet confirmed by the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeLog {
    entries: Vec<String>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: ChangeKind, subject: &str) {
        self.entries.push(format!("{} {}", kind.label(), subject));
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No unsynced changes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Gender;

    fn base() -> Member {
        let mut m = Member::new("7", "曹德秀");
        m.gender = Gender::Male;
        m.generation = Some(11);
        m.biography = Some("notes".to_string());
        m.father_name = Some("曹來秀".to_string());
        m
    }

    #[test]
    fn test_whitespace_only_edit_not_changed() {
        let prev = base();
        let mut next = base();
        next.biography = Some("  notes \n".to_string());
        next.location = Some("   ".to_string());
        assert!(!has_member_changed(&prev, &next));
    }

    #[test]
    fn test_substantive_edits_changed() {
        let prev = base();

        let mut next = base();
        next.biography = Some("more notes".to_string());
        assert!(has_member_changed(&prev, &next));

        let mut next = base();
        next.generation = Some(12);
        assert!(has_member_changed(&prev, &next));

        let mut next = base();
        next.gender = Gender::Female;
        assert!(has_member_changed(&prev, &next));

        let mut next = base();
        next.mother_name = Some("X".to_string());
        assert!(has_member_changed(&prev, &next));
    }

    #[test]
    fn test_ids_are_not_compared() {
        let prev = base();
        let mut next = base();
        next.father_id = Some("42".to_string());
        assert!(!has_member_changed(&prev, &next));
    }

    #[test]
    fn test_new_record_needs_sync() {
        assert!(needs_sync(None, &base()));
        assert!(!needs_sync(Some(&base()), &base()));
    }

    #[test]
    fn test_change_log() {
        let mut log = ChangeLog::new();
        assert!(log.is_empty());
        log.record(ChangeKind::Added, "A");
        log.record(ChangeKind::Deleted, "B");
        assert_eq!(log.entries(), &["[Added] A", "[Deleted] B"]);
        assert_eq!(serde_json::to_value(&log).unwrap(), serde_json::json!(["[Added] A", "[Deleted] B"]));
        log.clear();
        assert!(log.is_empty());
    }
}
