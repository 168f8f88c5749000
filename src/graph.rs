//! In-memory member snapshot.
//!
//! `FamilyGraph` is a value: every mutation returns a new graph and leaves
//! the receiver untouched, so callers can log the transition at the call
//! site and keep the previous snapshot for change detection.

use std::collections::{BTreeSet, HashMap};

use crate::ingest::{strip_whitespace, NameIndex};
use crate::types::{Gender, Member, ROOT_ID};

/// Default name given to a freshly added member.
pub const NEW_MEMBER_NAME: &str = "New Member";

#[derive(Debug, Clone, PartialEq)]
pub struct FamilyGraph {
    members: Vec<Member>,
    index: HashMap<String, usize>,
}

impl Default for FamilyGraph {
    fn default() -> Self {
        Self::from_members(Vec::new())
    }
}

impl FamilyGraph {
    /// Build a graph, guaranteeing the root at position 0. Later duplicates
    /// of an id are dropped.
    pub fn from_members(members: Vec<Member>) -> Self {
        let mut ordered = Vec::with_capacity(members.len() + 1);
        let root = members
            .iter()
            .find(|m| m.is_root())
            .cloned()
            .unwrap_or_else(Member::root);
        ordered.push(root);

        let mut index = HashMap::with_capacity(members.len() + 1);
        index.insert(ROOT_ID.to_string(), 0);
        for member in members.into_iter().filter(|m| !m.is_root()) {
            if index.contains_key(&member.id) {
                log::warn!("Dropping duplicate member id {} ({})", member.id, member.name);
                continue;
            }
            index.insert(member.id.clone(), ordered.len());
            ordered.push(member);
        }

        Self {
            members: ordered,
            index,
        }
    }

    /// All records, root included.
    pub fn list(&self) -> &[Member] {
        &self.members
    }

    pub fn get(&self, id: &str) -> Option<&Member> {
        self.index.get(id).map(|&i| &self.members[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of real members (root excluded).
    pub fn member_count(&self) -> usize {
        self.members.len() - 1
    }

    /// Members shown in lists and tables (root excluded).
    pub fn display_members(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| !m.is_root())
    }

    /// Apply a predicate. The root always passes; callers hide it at display.
    pub fn filter<P>(&self, predicate: P) -> Vec<&Member>
    where
        P: Fn(&Member) -> bool,
    {
        self.members
            .iter()
            .filter(|m| m.is_root() || predicate(m))
            .collect()
    }

    /// Search by free text and minimum generation.
    ///
    /// The term matches case- and whitespace-insensitively against name,
    /// courtesy name, spouse, parents' names, and biography. Members without
    /// a generation are never hidden by `min_generation`.
    pub fn search(&self, term: &str, min_generation: u32) -> Vec<&Member> {
        let needle = normalize_search(term);
        self.filter(|m| {
            if m.generation.is_some_and(|g| g < min_generation) {
                return false;
            }
            if needle.is_empty() {
                return true;
            }
            [
                Some(m.name.as_str()),
                m.courtesy_name.as_deref(),
                m.spouse_name.as_deref(),
                m.father_name.as_deref(),
                m.mother_name.as_deref(),
                m.biography.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| normalize_search(field).contains(&needle))
        })
    }

    /// Distinct positive generations, ascending.
    pub fn available_generations(&self) -> Vec<u32> {
        self.members
            .iter()
            .filter_map(|m| m.generation)
            .filter(|g| *g > 0)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn father_of(&self, member: &Member) -> Option<&Member> {
        member
            .father_id
            .as_deref()
            .filter(|id| *id != ROOT_ID)
            .and_then(|id| self.get(id))
    }

    pub fn mother_of(&self, member: &Member) -> Option<&Member> {
        member
            .mother_id
            .as_deref()
            .filter(|id| *id != ROOT_ID)
            .and_then(|id| self.get(id))
    }

    pub fn children_of(&self, id: &str) -> Vec<&Member> {
        self.members
            .iter()
            .filter(|m| m.father_id.as_deref() == Some(id) || m.mother_id.as_deref() == Some(id))
            .collect()
    }

    /// Father and mother names for export: the resolved member's current
    /// name when the id still resolves, otherwise the stored name string.
    pub fn parent_names(&self, member: &Member) -> (String, String) {
        let father = self
            .father_of(member)
            .map(|f| f.name.clone())
            .or_else(|| member.father_name.clone())
            .unwrap_or_default();
        let mother = self
            .mother_of(member)
            .map(|m| m.name.clone())
            .or_else(|| member.mother_name.clone())
            .unwrap_or_default();
        (father, mother)
    }

    /// Re-resolve an edited member's father/mother names against this graph.
    ///
    /// The member itself is excluded from matching so a record cannot become
    /// its own parent through an edit.
    pub fn relink(&self, mut member: Member) -> Member {
        if member.is_root() {
            return member;
        }
        let index = NameIndex::build(self.members.iter().filter(|m| m.id != member.id));

        member.father_id = Some(
            member
                .father_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .and_then(|n| index.resolve(n))
                .unwrap_or(ROOT_ID)
                .to_string(),
        );
        member.mother_id = member
            .mother_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .and_then(|n| index.resolve(n))
            .map(str::to_string);
        member
    }

    /// Default record for the "add member" action under `parent`.
    pub fn new_member(&self, parent_id: Option<&str>) -> Member {
        let parent = parent_id.and_then(|id| self.get(id)).filter(|p| !p.is_root());
        let mut member = Member::new(uuid::Uuid::new_v4().to_string(), NEW_MEMBER_NAME);
        member.gender = Gender::Male;
        if let Some(parent) = parent {
            member.generation = parent.generation.filter(|g| *g > 0).map(|g| g + 1);
            member.father_id = Some(parent.id.clone());
            member.father_name = Some(parent.name.clone());
        }
        member
    }

    // ------------------------------------------------------------------
    // Snapshot transitions
    // ------------------------------------------------------------------

    /// Add a member. An existing id is replaced instead.
    pub fn insert(&self, member: Member) -> Self {
        if self.contains(&member.id) {
            return self.replace(member);
        }
        let mut members = self.members.clone();
        members.push(member);
        Self::from_members(members)
    }

    /// Replace the record with the same id. Unknown ids leave the graph as is.
    pub fn replace(&self, member: Member) -> Self {
        let Some(&i) = self.index.get(&member.id) else {
            return self.clone();
        };
        let mut members = self.members.clone();
        members[i] = member;
        Self::from_members(members)
    }

    /// Remove a member. The root is never removed.
    pub fn remove(&self, id: &str) -> Self {
        if id == ROOT_ID {
            return self.clone();
        }
        Self::from_members(
            self.members
                .iter()
                .filter(|m| m.id != id)
                .cloned()
                .collect(),
        )
    }
}

fn normalize_search(s: &str) -> String {
    strip_whitespace(&s.to_lowercase())
}
