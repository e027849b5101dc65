use std::collections::BTreeMap;

use tracing::info;

use super::{normalize_id, School};
use crate::documents::{Period, Timetable};
use crate::store::Connector;
use crate::{Result, SchoolError};

impl<C: Connector> School<C> {
    /// the current timetable, empty if none was uploaded
    pub fn get_timetable(&self) -> Result<Timetable> {
        self.store.read(&self.timetable_path())
    }

    /// replaces the timetable with the one for `day`.
    /// Class and section keys are normalized.
    ///
    /// # Errors
    /// `SchoolError::BadRequest` if `day` is empty
    pub fn upload_timetable(
        &self,
        day: &str,
        classes: BTreeMap<String, BTreeMap<String, Vec<Period>>>,
    ) -> Result<Timetable> {
        let day = day.trim();
        if day.is_empty() {
            return Err(SchoolError::BadRequest("Timetable day is required".to_string()));
        }

        let timetable = Timetable {
            day: day.to_string(),
            classes: classes
                .into_iter()
                .map(|(class, sections)| {
                    let sections = sections
                        .into_iter()
                        .map(|(section, periods)| (normalize_id(&section), periods))
                        .collect();
                    (normalize_id(&class), sections)
                })
                .collect(),
        };

        let path = self.timetable_path();
        self.store
            .with_locked(&[path.as_str()], || self.store.write(&path, &timetable))?;
        info!(day = %timetable.day, classes = timetable.classes.len(), "timetable uploaded");
        Ok(timetable)
    }
}
