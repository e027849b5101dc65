use serde::Serialize;
use tracing::info;

use super::{normalize_class_name, School, RESERVED_NAMES};
use crate::documents::{Roster, JSON_SUFFIX};
use crate::store::Connector;
use crate::{Result, SchoolError};

/// Where a class roster lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassInfo {
    /// normalized class name
    pub class_name: String,
    /// roster file name
    pub file_name: String,
    /// full remote path of the roster
    pub file_path: String,
}

impl<C: Connector> School<C> {
    /// every class that has a roster, sorted ascending
    ///
    /// # Errors
    /// `SchoolError::NotFound` if the class directory does not exist
    pub fn list_classes(&self) -> Result<Vec<String>> {
        let mut classes: Vec<String> = self
            .store
            .list(&self.config.base_path)?
            .into_iter()
            .filter_map(|file| {
                file.strip_suffix(JSON_SUFFIX)
                    .map(|stem| stem.to_lowercase())
            })
            .filter(|stem| !RESERVED_NAMES.contains(&stem.as_str()))
            .collect();
        classes.sort();
        classes.dedup();
        Ok(classes)
    }

    /// creates an empty roster for `class_name`
    ///
    /// # Errors
    /// `SchoolError::Conflict` if the class already exists
    pub fn create_class(&self, class_name: &str) -> Result<ClassInfo> {
        let class = normalize_class_name(class_name)?;
        let path = self.roster_path(&class);
        self.store.with_locked(&[path.as_str()], || {
            if self.store.exists(&path)? {
                return Err(SchoolError::Conflict(format!(
                    "Class '{}' already exists",
                    class
                )));
            }
            self.store.write(&path, &Roster::new())
        })?;
        info!(class = %class, "class created");

        Ok(ClassInfo {
            file_name: format!("{}{}", class, JSON_SUFFIX),
            file_path: path,
            class_name: class,
        })
    }

    /// deletes the roster of `class_name`, returning the normalized name
    ///
    /// # Errors
    /// `SchoolError::NotFound` if there is no such class
    pub fn delete_class(&self, class_name: &str) -> Result<String> {
        let class = normalize_class_name(class_name)?;
        let path = self.roster_path(&class);
        let removed = self.store.with_locked(&[path.as_str()], || self.store.remove(&path))?;
        if !removed {
            return Err(SchoolError::NotFound(format!("Class '{}' not found", class)));
        }
        info!(class = %class, "class deleted");
        Ok(class)
    }

    /// true if `class_name` has a roster
    pub fn class_exists(&self, class_name: &str) -> Result<bool> {
        let class = normalize_class_name(class_name)?;
        self.store.exists(&self.roster_path(&class))
    }
}
