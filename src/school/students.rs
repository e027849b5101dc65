use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{normalize_class_name, School};
use crate::documents::{FeeStructure, Roster, StudentRecord};
use crate::store::Connector;
use crate::{Result, SchoolError};

// fields that are maintained by the store rather than taken from callers on insert
const MANAGED_FIELDS: [&str; 6] = [
    "totalfees",
    "feespaid",
    "feesremaining",
    "concession",
    "tests",
    "performance",
];

// an update touching any of these recomputes `feesremaining`
const FEE_FIELDS: [&str; 4] = ["totalfees", "feespaid", "concession", "feesremaining"];

pub(super) fn class_not_found(class: &str) -> SchoolError {
    SchoolError::NotFound(format!("Class '{}' not found", class))
}

pub(super) fn student_not_found(class: &str, student_id: &str) -> SchoolError {
    SchoolError::NotFound(format!(
        "Student '{}' not found in class '{}'",
        student_id, class
    ))
}

pub(super) fn validate_student_id(student_id: &str) -> Result<&str> {
    let id = student_id.trim();
    if id.is_empty() {
        Err(SchoolError::BadRequest("Student id cannot be empty".to_string()))
    } else {
        Ok(id)
    }
}

impl<C: Connector> School<C> {
    /// the full roster of `class_name`
    ///
    /// # Errors
    /// `SchoolError::NotFound` if the class has no roster
    pub fn get_students(&self, class_name: &str) -> Result<Roster> {
        let class = normalize_class_name(class_name)?;
        self.store
            .read_existing(&self.roster_path(&class))?
            .ok_or_else(|| class_not_found(&class))
    }

    /// inserts a new student. `totalfees` comes from the class' fee structure (0 if the class
    /// has none) and nothing has been paid yet.
    ///
    /// # Errors
    /// `SchoolError::Duplicate` if `student_id` is already in the roster
    pub fn add_student(
        &self,
        class_name: &str,
        student_id: &str,
        info: Map<String, Value>,
    ) -> Result<StudentRecord> {
        let class = normalize_class_name(class_name)?;
        let student_id = validate_student_id(student_id)?;
        let fees: FeeStructure = self.store.read(&self.fees_path())?;
        let totalfees = fees
            .class_fees
            .get(&class)
            .map(|f| f.total_fees)
            .unwrap_or(0);
        debug!(class = %class, totalfees, "fee structure looked up");

        let record = self.store.mutate(&self.roster_path(&class), |roster: &mut Roster| {
            if roster.contains_key(student_id) {
                return Err(SchoolError::Duplicate(format!(
                    "Student '{}' already exists in class '{}'",
                    student_id, class
                )));
            }
            let mut record = StudentRecord {
                totalfees,
                info: info
                    .into_iter()
                    .filter(|(k, _)| !MANAGED_FIELDS.contains(&k.as_str()))
                    .collect(),
                ..StudentRecord::default()
            };
            record.recompute_remaining()?;
            roster.insert(student_id.to_string(), record.clone());
            Ok(record)
        })?;
        info!(class = %class, student = %student_id, "student added");
        Ok(record)
    }

    /// merges `updates` into an existing student record.
    ///
    /// If any fee field is updated, `feesremaining` is recomputed after the merge, so a
    /// `feesremaining` given by the caller never overrides the balance.
    ///
    /// # Errors
    /// `SchoolError::NotFound` if the class or the student does not exist,
    /// `SchoolError::BadRequest` if an update has the wrong type for a fee field
    pub fn update_student(
        &self,
        class_name: &str,
        student_id: &str,
        updates: Map<String, Value>,
    ) -> Result<StudentRecord> {
        let class = normalize_class_name(class_name)?;
        let student_id = validate_student_id(student_id)?;
        let touches_fees = updates.keys().any(|k| FEE_FIELDS.contains(&k.as_str()));

        self.store.mutate_existing(
            &self.roster_path(&class),
            || class_not_found(&class),
            |roster: &mut Roster| {
                let current = roster
                    .get(student_id)
                    .ok_or_else(|| student_not_found(&class, student_id))?;

                let mut merged = match serde_json::to_value(current)? {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                merged.extend(updates);
                let mut record: StudentRecord = serde_json::from_value(Value::Object(merged))
                    .map_err(|e| SchoolError::BadRequest(format!("invalid update: {}", e)))?;
                if touches_fees {
                    record.recompute_remaining()?;
                }
                roster.insert(student_id.to_string(), record.clone());
                Ok(record)
            },
        )
    }

    /// sets the student's concession to `concession` (not added to the old one)
    ///
    /// # Errors
    /// `SchoolError::BadRequest` for a negative concession, `SchoolError::NotFound` if the class
    /// or the student does not exist
    pub fn update_concession(
        &self,
        class_name: &str,
        student_id: &str,
        concession: i64,
    ) -> Result<StudentRecord> {
        if concession < 0 {
            return Err(SchoolError::BadRequest(
                "Concession cannot be negative".to_string(),
            ));
        }
        let class = normalize_class_name(class_name)?;
        let student_id = validate_student_id(student_id)?;
        self.store.mutate_existing(
            &self.roster_path(&class),
            || class_not_found(&class),
            |roster: &mut Roster| {
                let record = roster
                    .get_mut(student_id)
                    .ok_or_else(|| student_not_found(&class, student_id))?;
                record.concession = concession;
                record.recompute_remaining()?;
                Ok(record.clone())
            },
        )
    }

    /// removes a student from the roster and returns the removed record
    ///
    /// # Errors
    /// `SchoolError::NotFound` if the class or the student does not exist
    pub fn remove_student(&self, class_name: &str, student_id: &str) -> Result<StudentRecord> {
        let class = normalize_class_name(class_name)?;
        let student_id = validate_student_id(student_id)?;
        let record = self.store.mutate_existing(
            &self.roster_path(&class),
            || class_not_found(&class),
            |roster: &mut Roster| {
                roster
                    .remove(student_id)
                    .ok_or_else(|| student_not_found(&class, student_id))
            },
        )?;
        info!(class = %class, student = %student_id, "student removed");
        Ok(record)
    }
}
