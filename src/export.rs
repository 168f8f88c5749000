//! Bulk exports of the member snapshot.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::graph::FamilyGraph;
use crate::parser::{to_csv_line, COLUMNS};
use crate::types::Member;

const BOM: char = '\u{feff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("Unknown export format: {}", other)),
        }
    }
}

/// Full record dump, root included.
pub fn to_json(graph: &FamilyGraph) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(graph.list())
}

fn csv_row(graph: &FamilyGraph, m: &Member) -> String {
    let (father, mother) = graph.parent_names(m);
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    to_csv_line(&[
        m.name.clone(),
        opt(&m.spouse_name),
        father,
        mother,
        m.generation.map(|g| g.to_string()).unwrap_or_default(),
        opt(&m.courtesy_name),
        opt(&m.biography),
        m.gender.as_str().to_string(),
        opt(&m.birth_date),
        opt(&m.death_date),
        opt(&m.location),
        opt(&m.phone),
        opt(&m.spouse_phone),
        opt(&m.email),
    ])
}

/// CSV in the ingestion column order, with a UTF-8 BOM so spreadsheet
/// tools detect the encoding. The root is left out.
pub fn to_csv(graph: &FamilyGraph) -> String {
    let mut lines = Vec::with_capacity(graph.member_count() + 1);
    lines.push(to_csv_line(&COLUMNS));
    lines.extend(graph.display_members().map(|m| csv_row(graph, m)));

    let mut out = String::new();
    out.push(BOM);
    out.push_str(&lines.join("\n"));
    out
}

pub fn export(graph: &FamilyGraph, format: ExportFormat) -> Result<String, serde_json::Error> {
    match format {
        ExportFormat::Json => to_json(graph),
        ExportFormat::Csv => Ok(to_csv(graph)),
    }
}

/// `family_tree_backup_2024-05-01.csv`
pub fn export_file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "family_tree_backup_{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}
