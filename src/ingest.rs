//! Raw records → member graph.
//!
//! Two passes: every record gets its id first, then father/mother names are
//! resolved against the full name table so that children listed before their
//! parents still link up.

use std::collections::HashMap;

use crate::dates::{leading_int, normalize_date};
use crate::error::ParseError;
use crate::parser::{parse_csv_rows, NEED_TO_ASK};
use crate::types::{Gender, Member, RawRecord, ROOT_ID, UNKNOWN_NAME};

/// Name → member lookup used for relation resolution.
///
/// Exact lookups hit the last member inserted under a name. The
/// whitespace-insensitive fallback scans names in first-insertion order.
pub(crate) struct NameIndex<'a> {
    exact: HashMap<&'a str, &'a str>,
    order: Vec<&'a str>,
}

impl<'a> NameIndex<'a> {
    pub(crate) fn build<I>(members: I) -> Self
    where
        I: IntoIterator<Item = &'a Member>,
    {
        let mut exact = HashMap::new();
        let mut order = Vec::new();
        for member in members {
            if member.is_root() {
                continue;
            }
            if exact
                .insert(member.name.as_str(), member.id.as_str())
                .is_none()
            {
                order.push(member.name.as_str());
            }
        }
        Self { exact, order }
    }

    /// Resolve a name to a member id, exact match first.
    pub(crate) fn resolve(&self, name: &str) -> Option<&'a str> {
        if let Some(id) = self.exact.get(name) {
            return Some(*id);
        }
        let wanted = strip_whitespace(name);
        self.order
            .iter()
            .find(|key| strip_whitespace(key) == wanted)
            .and_then(|key| self.exact.get(key).copied())
    }
}

pub(crate) fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn clean_relation(value: Option<&str>) -> Option<String> {
    clean(value).filter(|s| s != NEED_TO_ASK)
}

/// Positive generation from a raw cell; zero, negative, or junk yields `None`.
/// A negative cell such as `-3` is rejected too, not carried through.
fn parse_generation(value: Option<&str>) -> Option<u32> {
    value
        .and_then(leading_int)
        .filter(|g| *g > 0)
        .and_then(|g| u32::try_from(g).ok())
}

fn member_from_raw(index: usize, raw: &RawRecord) -> Member {
    Member {
        id: index.to_string(),
        name: clean(raw.name.as_deref()).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        gender: Gender::from_raw(raw.gender.as_deref().unwrap_or("")),
        birth_date: normalize_date(raw.birth_date.as_deref()),
        death_date: normalize_date(raw.death_date.as_deref()),
        biography: clean(raw.biography.as_deref()),
        location: clean(raw.location.as_deref()),
        phone: clean(raw.phone.as_deref()),
        spouse_phone: clean(raw.spouse_phone.as_deref()),
        email: clean(raw.email.as_deref()),
        generation: parse_generation(raw.generation.as_deref()),
        courtesy_name: clean(raw.courtesy_name.as_deref()),
        spouse_name: clean_relation(raw.spouse_name.as_deref()),
        father_id: None,
        mother_id: None,
        father_name: clean_relation(raw.father_name.as_deref()),
        mother_name: clean_relation(raw.mother_name.as_deref()),
    }
}

/// Build the member list from raw records. The root is always at position 0.
///
/// Unresolvable fathers fall back to the root; unresolvable mothers stay unset.
pub fn process_raw_records(raw: &[RawRecord]) -> Vec<Member> {
    let mut members: Vec<Member> = Vec::with_capacity(raw.len() + 1);
    members.push(Member::root());
    members.extend(raw.iter().enumerate().map(|(i, r)| member_from_raw(i, r)));

    let links: Vec<(Option<String>, Option<String>)> = {
        let index = NameIndex::build(members.iter());
        members
            .iter()
            .map(|m| {
                if m.is_root() {
                    return (None, None);
                }
                let father = m
                    .father_name
                    .as_deref()
                    .and_then(|n| index.resolve(n))
                    .unwrap_or(ROOT_ID);
                let mother = m.mother_name.as_deref().and_then(|n| index.resolve(n));
                (Some(father.to_string()), mother.map(str::to_string))
            })
            .collect()
    };

    let mut unresolved = 0usize;
    for (member, (father, mother)) in members.iter_mut().zip(links) {
        if member.father_name.is_some() && father.as_deref() == Some(ROOT_ID) {
            unresolved += 1;
        }
        member.father_id = father;
        member.mother_id = mother;
    }
    if unresolved > 0 {
        log::debug!(
            "{} member(s) with unresolved father names attached to the virtual root",
            unresolved
        );
    }

    members
}

/// Parse the family CSV into members. Empty input is rejected outright.
pub fn parse_genealogy_csv(text: &str) -> Result<Vec<Member>, ParseError> {
    let rows = parse_csv_rows(text)?;
    Ok(process_raw_records(&rows))
}
