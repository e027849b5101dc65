use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{normalize_class_name, normalize_id, School};
use crate::audit::{emit, AuditEvent};
use crate::documents::Roster;
use crate::marks::MarksRow;
use crate::store::Connector;
use crate::{Result, SchoolError};

/// The outcome of a marks upload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarksUploadReport {
    /// the test the marks were stored under
    pub test_name: String,
    /// `(section, roster key)` of every student that received marks
    pub updated: Vec<(String, String)>,
    /// names that matched no student in any scanned roster
    pub not_found: Vec<String>,
}

impl<C: Connector> School<C> {
    /// the rosters scanned by a marks upload for `course`, in scan order
    fn marks_sections(&self, course: &str, sections: Option<Vec<String>>) -> Result<Vec<String>> {
        let sections = match sections {
            Some(sections) => sections,
            None => self
                .config
                .marks_sections
                .get(&normalize_id(course))
                .cloned()
                .unwrap_or_default(),
        };
        if sections.is_empty() {
            return Err(SchoolError::BadRequest(format!(
                "No sections configured for course '{}'",
                course
            )));
        }
        sections.iter().map(|s| normalize_class_name(s)).collect()
    }

    /// stores a test's marks on the matching students.
    ///
    /// Each row's name is matched case-insensitively against the roster keys of the course's
    /// sections, in order, and the first match wins. The match receives `tests[test_name]` and
    /// `performance[test_name]`. Every roster that gained marks is written once.
    ///
    /// # Errors
    /// `SchoolError::BadRequest` if the test name is empty, there are no rows, or no sections
    /// are known for the course
    pub fn upload_marks(
        &self,
        course: &str,
        test_name: &str,
        rows: &[MarksRow],
        sections: Option<Vec<String>>,
    ) -> Result<MarksUploadReport> {
        let test_name = test_name.trim();
        if test_name.is_empty() {
            return Err(SchoolError::BadRequest("Test name is required".to_string()));
        }
        if rows.is_empty() {
            return Err(SchoolError::BadRequest("Marks sheet has no rows".to_string()));
        }
        let sections = self.marks_sections(course, sections)?;
        let paths: Vec<String> = sections.iter().map(|s| self.roster_path(s)).collect();
        let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();

        let report = self.store.with_locked(&path_refs, || {
            let mut rosters: Vec<Option<Roster>> = Vec::with_capacity(paths.len());
            for (section, path) in sections.iter().zip(&paths) {
                let roster = self.store.read_existing::<Roster>(path)?;
                if roster.is_none() {
                    warn!(section = %section, "section roster missing, skipped");
                }
                rosters.push(roster);
            }

            // lower-cased name -> (roster index, key); earlier rosters win
            let mut index: HashMap<String, (usize, String)> = HashMap::new();
            for (idx, roster) in rosters.iter().enumerate() {
                for key in roster.iter().flat_map(|r| r.keys()) {
                    index
                        .entry(key.to_lowercase())
                        .or_insert_with(|| (idx, key.clone()));
                }
            }
            debug!(students = index.len(), "marks index built");

            let mut report = MarksUploadReport {
                test_name: test_name.to_string(),
                ..MarksUploadReport::default()
            };
            let mut dirty = BTreeSet::new();
            for row in rows {
                let Some((idx, key)) = index.get(&row.name.trim().to_lowercase()) else {
                    report.not_found.push(row.name.clone());
                    continue;
                };
                let Some(record) = rosters[*idx].as_mut().and_then(|r| r.get_mut(key)) else {
                    report.not_found.push(row.name.clone());
                    continue;
                };
                let result = row.evaluate();
                record.tests.insert(test_name.to_string(), result.detail);
                record.performance.insert(test_name.to_string(), result.summary);
                dirty.insert(*idx);
                report.updated.push((sections[*idx].clone(), key.clone()));
            }

            for idx in dirty {
                if let Some(roster) = &rosters[idx] {
                    self.store.write(&paths[idx], roster)?;
                }
            }
            Ok(report)
        })?;

        info!(
            test = %report.test_name,
            updated = report.updated.len(),
            not_found = report.not_found.len(),
            "marks uploaded"
        );
        if !report.not_found.is_empty() {
            emit(
                self.audit.as_ref(),
                AuditEvent::new(
                    "marks_unmatched",
                    json!({
                        "course": normalize_id(course),
                        "test_name": report.test_name,
                        "names": report.not_found,
                    }),
                ),
            );
        }
        Ok(report)
    }
}
