//! CSV parsing for the 14-column family sheet.
//!
//! Records are split over the whole text rather than per line, so quoted
//! cells may contain commas, newlines, and `""`-escaped quotes.

use crate::error::ParseError;
use crate::types::RawRecord;

/// Column order of the sheet. Order-sensitive for ingestion and export.
pub const COLUMNS: [&str; 14] = [
    "Name",
    "SpouseName",
    "Father",
    "Mother",
    "Generation",
    "CourtesyName",
    "Notes",
    "gender",
    "birthDate",
    "deathDate",
    "location",
    "Phone",
    "SpousePhone",
    "Email",
];

/// Placeholder the family uses for relations nobody has asked about yet.
pub const NEED_TO_ASK: &str = "need to ask";

const BOM: char = '\u{feff}';

/// Split CSV text into records of raw (untrimmed) cells.
///
/// Records consisting only of blank cells are dropped.
pub fn split_records(text: &str) -> Result<Vec<Vec<String>>, ParseError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);

    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut quote_line = 1usize;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                    if in_quotes {
                        quote_line = line;
                    }
                }
            }
            ',' if !in_quotes => {
                record.push(std::mem::take(&mut field));
            }
            '\r' | '\n' if !in_quotes => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                line += 1;
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => {
                if c == '\n' {
                    line += 1;
                }
                field.push(c);
            }
        }
    }

    if in_quotes {
        return Err(ParseError::UnterminatedQuote { line: quote_line });
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }

    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    if record.iter().any(|cell| !cell.trim().is_empty()) {
        records.push(record);
    }
}

/// True when the record is the sheet's header row.
pub fn is_header(record: &[String]) -> bool {
    record
        .first()
        .map(|cell| cell.trim().to_lowercase().starts_with("name"))
        .unwrap_or(false)
}

/// Map a positional row into a raw record. Returns `None` for rows without
/// a name; those are skipped silently.
pub fn row_to_raw(cells: &[String]) -> Option<RawRecord> {
    let cell = |i: usize| -> Option<String> {
        cells
            .get(i)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    };
    let relation = |i: usize| cell(i).filter(|c| c != NEED_TO_ASK);

    let name = cell(0)?;
    Some(RawRecord {
        name: Some(name),
        spouse_name: relation(1),
        father_name: relation(2),
        mother_name: relation(3),
        generation: cell(4),
        courtesy_name: cell(5),
        biography: cell(6),
        gender: cell(7),
        birth_date: cell(8),
        death_date: cell(9),
        location: cell(10),
        phone: cell(11),
        spouse_phone: cell(12),
        email: cell(13),
    })
}

/// Parse CSV text into raw records, skipping an optional header row.
pub fn parse_csv_rows(text: &str) -> Result<Vec<RawRecord>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let records = split_records(text)?;
    let skip = usize::from(records.first().map(|r| is_header(r)).unwrap_or(false));

    Ok(records.iter().skip(skip).filter_map(|r| row_to_raw(r)).collect())
}

/// Quote a cell when it contains a delimiter, quote, or line break.
pub fn to_csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Join cells into one CSV line.
pub fn to_csv_line<S: AsRef<str>>(cells: &[S]) -> String {
    cells
        .iter()
        .map(|c| to_csv_field(c.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_quoted_fields() {
        let records = split_records("a,\"b,c\",\"say \"\"hi\"\"\"\n").unwrap();
        assert_eq!(records, vec![vec!["a", "b,c", "say \"hi\""]]);
    }

    #[test]
    fn test_split_newline_inside_quotes() {
        let text = "A,\"line one\nline two\"\r\nB,x\n";
        let records = split_records(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][1], "line one\nline two");
        assert_eq!(records[1], vec!["B", "x"]);
    }

    #[test]
    fn test_split_skips_blank_records_and_bom() {
        let records = split_records("\u{feff}Name,Father\n\n  \n,,\nA,\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][0], "Name");
        assert_eq!(records[1], vec!["A", ""]);
    }

    #[test]
    fn test_split_unterminated_quote() {
        let err = split_records("A,B\nC,\"open\n").unwrap_err();
        assert_eq!(err, ParseError::UnterminatedQuote { line: 2 });
    }

    #[test]
    fn test_is_header() {
        assert!(is_header(&["NAME".to_string()]));
        assert!(is_header(&[" name ".to_string(), "x".to_string()]));
        assert!(!is_header(&["曹德秀".to_string()]));
        assert!(!is_header(&[]));
    }

    #[test]
    fn test_row_to_raw_sentinel_and_blank_name() {
        let row: Vec<String> = ["B", "need to ask", "A", "need to ask", "12"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let raw = row_to_raw(&row).unwrap();
        assert_eq!(raw.name.as_deref(), Some("B"));
        assert!(raw.spouse_name.is_none());
        assert_eq!(raw.father_name.as_deref(), Some("A"));
        assert!(raw.mother_name.is_none());
        assert_eq!(raw.generation.as_deref(), Some("12"));
        assert!(raw.email.is_none());

        assert!(row_to_raw(&["  ".to_string(), "x".to_string()]).is_none());
    }

    #[test]
    fn test_parse_csv_rows_empty() {
        assert_eq!(parse_csv_rows("").unwrap_err(), ParseError::Empty);
        assert_eq!(parse_csv_rows(" \n\t ").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_parse_csv_rows_without_header() {
        let rows = parse_csv_rows("A,,,,1\nB,,A,,2").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].father_name.as_deref(), Some("A"));
    }

    #[test]
    fn test_to_csv_field() {
        assert_eq!(to_csv_field("plain"), "plain");
        assert_eq!(to_csv_field("a,b"), "\"a,b\"");
        assert_eq!(to_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(to_csv_field("two\nlines"), "\"two\nlines\"");
    }
}
