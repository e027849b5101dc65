use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::students::class_not_found;
use super::{normalize_class_name, School};
use crate::audit::{emit, AuditEvent};
use crate::documents::Roster;
use crate::store::Connector;
use crate::{Result, SchoolError};

/// The outcome of moving students between two sections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    /// normalized source section
    pub source: String,
    /// normalized target section
    pub target: String,
    /// roster keys that were moved, as spelled in the source roster
    pub moved: Vec<String>,
    /// requested names that were absent from the source or already in the target
    pub skipped: Vec<String>,
}

/// finds the key matching `name` ignoring case
fn find_key<'a>(roster: &'a Roster, name: &str) -> Option<&'a String> {
    let wanted = name.trim().to_lowercase();
    roster.keys().find(|k| k.to_lowercase() == wanted)
}

impl<C: Connector> School<C> {
    /// moves the named students from one section's roster to another's.
    ///
    /// Names are matched case-insensitively and whole records are moved unchanged. Both rosters
    /// are written only if at least one student moved; the target is written first.
    ///
    /// # Errors
    /// `SchoolError::BadRequest` if source and target are the same section,
    /// `SchoolError::NotFound` if the source roster does not exist
    pub fn transfer_students(
        &self,
        source_section: &str,
        target_section: &str,
        names: &[String],
    ) -> Result<TransferReport> {
        let source = normalize_class_name(source_section)?;
        let target = normalize_class_name(target_section)?;
        if source == target {
            return Err(SchoolError::BadRequest(
                "Source and target sections must differ".to_string(),
            ));
        }
        let source_path = self.roster_path(&source);
        let target_path = self.roster_path(&target);

        let report = self.store.with_locked(&[source_path.as_str(), target_path.as_str()], || {
            let mut from: Roster = self
                .store
                .read_existing(&source_path)?
                .ok_or_else(|| class_not_found(&source))?;
            let mut to: Roster = self.store.read(&target_path)?;

            let mut report = TransferReport {
                source: source.clone(),
                target: target.clone(),
                ..TransferReport::default()
            };
            for name in names {
                let key = match find_key(&from, name) {
                    Some(key) if find_key(&to, key).is_none() => key.clone(),
                    _ => {
                        debug!(name = %name, "student skipped");
                        report.skipped.push(name.clone());
                        continue;
                    }
                };
                if let Some(record) = from.remove(&key) {
                    to.insert(key.clone(), record);
                    report.moved.push(key);
                }
            }

            if !report.moved.is_empty() {
                self.store.write(&target_path, &to)?;
                self.store.write(&source_path, &from)?;
            }
            Ok(report)
        })?;

        info!(
            source = %report.source,
            target = %report.target,
            moved = report.moved.len(),
            skipped = report.skipped.len(),
            "students transferred"
        );
        if !report.moved.is_empty() {
            emit(
                self.audit.as_ref(),
                AuditEvent::new(
                    "section_transfer",
                    json!({
                        "source": report.source,
                        "target": report.target,
                        "moved": report.moved,
                        "skipped": report.skipped,
                    }),
                ),
            );
        }
        Ok(report)
    }
}
