//! Marks sheets: the rows of a test's results and the grading applied to them.
use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{Result, SchoolError};

/// max marks assumed for a subject without a `<subject>_max` column
pub const DEFAULT_MAX_MARKS: f64 = 100.0;

const NAME_COLUMN: &str = "name";
const MAX_SUFFIX: &str = "_max";

/// One student's row in a marks sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarksRow {
    /// student name, matched case-insensitively against roster keys
    pub name: String,
    /// subject -> marks
    pub subjects: BTreeMap<String, SubjectMarks>,
}

/// Obtained and maximum marks for one subject
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectMarks {
    /// marks scored
    pub obtained: f64,
    /// marks available
    pub max: f64,
}

/// maps a percentage onto a letter grade
pub fn grade(percentage: f64) -> &'static str {
    match percentage {
        p if p >= 90.0 => "A+",
        p if p >= 80.0 => "A",
        p if p >= 70.0 => "B+",
        p if p >= 60.0 => "B",
        p if p >= 50.0 => "C",
        p if p >= 40.0 => "D",
        _ => "F",
    }
}

/// The computed result of one row, ready to be stored on a student record
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// stored under `tests[test_name]`
    pub detail: Value,
    /// stored under `performance[test_name]`
    pub summary: Value,
}

impl MarksRow {
    /// totals the subjects and grades the row
    pub fn evaluate(&self) -> TestResult {
        let obtained: f64 = self.subjects.values().map(|m| m.obtained).sum();
        let max: f64 = self.subjects.values().map(|m| m.max).sum();
        let percentage = if max > 0.0 {
            (obtained / max * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        let grade = grade(percentage);

        TestResult {
            detail: json!({
                "subjects": self.subjects,
                "total_obtained": obtained,
                "total_max": max,
                "percentage": percentage,
                "grade": grade,
            }),
            summary: json!({
                "percentage": percentage,
                "grade": grade,
            }),
        }
    }
}

/// Parses a CSV marks sheet.
///
/// The header must contain a `name` column. Every other column is a subject, except columns named
/// `<subject>_max` which give that subject's maximum marks (default [`DEFAULT_MAX_MARKS`]).
/// Empty cells are skipped.
pub fn parse_csv<R: Read>(input: R) -> Result<Vec<MarksRow>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();
    let name_idx = headers
        .iter()
        .position(|h| h == NAME_COLUMN)
        .ok_or_else(|| SchoolError::BadRequest("marks sheet has no 'name' column".to_string()))?;

    let mut rows = vec![];
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let name = record.get(name_idx).unwrap_or_default().to_string();
        if name.is_empty() {
            continue;
        }

        let mut subjects = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if idx == name_idx || header.ends_with(MAX_SUFFIX) {
                continue;
            }
            let Some(obtained) = parse_cell(record.get(idx), header, &name)? else {
                continue;
            };
            let max_header = format!("{}{}", header, MAX_SUFFIX);
            let max = match headers.iter().position(|h| *h == max_header) {
                Some(max_idx) => parse_cell(record.get(max_idx), &max_header, &name)?
                    .unwrap_or(DEFAULT_MAX_MARKS),
                None => DEFAULT_MAX_MARKS,
            };
            subjects.insert(header.clone(), SubjectMarks { obtained, max });
        }
        rows.push(MarksRow { name, subjects });
    }
    Ok(rows)
}

fn parse_cell(cell: Option<&str>, column: &str, name: &str) -> Result<Option<f64>> {
    match cell {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| {
            SchoolError::BadRequest(format!(
                "invalid marks '{}' in column '{}' for {}",
                raw, column, name
            ))
        }),
    }
}

fn csv_error(e: csv::Error) -> SchoolError {
    SchoolError::BadRequest(format!("invalid marks sheet: {}", e))
}
