//! The school's document mutators.
//!
//! [`School`] layers read-modify-write operations for classes, students, fees, invoices,
//! notices, timetables and marks on top of a [`DocStore`]. Each operation reads the whole
//! document, changes it in memory and uploads the whole document again. Within this process,
//! mutations of the same path are serialized; across processes the last upload wins.
use std::sync::Arc;

use crate::audit::{AuditSink, TracingAudit};
use crate::documents::{FEES_FILE, INVOICES_FILE, JSON_SUFFIX, NOTICES_FILE, TIMETABLE_FILE};
use crate::receipt::ReceiptRenderer;
use crate::store::{join, Connector, DocStore};
use crate::{Result, SchoolError, StoreConfig};

mod classes;
mod fees;
mod marks;
mod notices;
mod students;
mod timetable;
mod transfer;

pub use self::classes::ClassInfo;
pub use self::fees::FeeCollection;
pub use self::marks::MarksUploadReport;
pub use self::transfer::TransferReport;

// names in the class directory that hold other documents
const RESERVED_NAMES: [&str; 2] = ["fees", "invoice_records"];

/// The entry point for every school operation
pub struct School<C: Connector> {
    store: DocStore<C>,
    config: Arc<StoreConfig>,
    audit: Arc<dyn AuditSink>,
    receipts: ReceiptRenderer,
}

impl<C: Connector> Clone for School<C> {
    fn clone(&self) -> Self {
        School {
            store: self.store.clone(),
            config: Arc::clone(&self.config),
            audit: Arc::clone(&self.audit),
            receipts: self.receipts.clone(),
        }
    }
}

impl<C: Connector> School<C> {
    /// creates a school backed by `connector`, auditing to the tracing log
    pub fn new(connector: C, config: StoreConfig) -> Self {
        let receipts = ReceiptRenderer::new(&config.scratch_dir, config.receipt_retention);
        School {
            store: DocStore::new(connector),
            config: Arc::new(config),
            audit: Arc::new(TracingAudit),
            receipts,
        }
    }

    /// replaces the audit sink
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// the underlying document store
    pub fn store(&self) -> &DocStore<C> {
        &self.store
    }

    /// the configuration this school was built with
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// remote path of a class roster, `class` must already be normalized
    pub fn roster_path(&self, class: &str) -> String {
        join(&self.config.base_path, &format!("{}{}", class, JSON_SUFFIX))
    }

    /// remote path of the fee structure document
    pub fn fees_path(&self) -> String {
        join(&self.config.base_path, FEES_FILE)
    }

    /// remote path of the invoice ledger
    pub fn invoices_path(&self) -> String {
        join(&self.config.base_path, INVOICES_FILE)
    }

    /// remote path of the notices feed
    pub fn notices_path(&self) -> String {
        join(&self.config.notices_path, NOTICES_FILE)
    }

    /// remote path of the timetable
    pub fn timetable_path(&self) -> String {
        join(&self.config.services_path, TIMETABLE_FILE)
    }
}

/// lower-cases and trims a class name and strips a trailing `.json`
///
/// # Errors
/// `SchoolError::BadRequest` for empty names, names containing a `/`, and the names of the
/// fee and invoice documents
pub fn normalize_class_name(raw: &str) -> Result<String> {
    let name = raw.trim().to_lowercase();
    let name = name.strip_suffix(JSON_SUFFIX).unwrap_or(&name).trim();
    if name.is_empty() {
        return Err(SchoolError::BadRequest("Class name cannot be empty".to_string()));
    }
    if name.contains('/') {
        return Err(SchoolError::BadRequest(format!(
            "Class name '{}' must not contain '/'",
            name
        )));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(SchoolError::BadRequest(format!(
            "'{}' is a reserved name",
            name
        )));
    }
    Ok(name.to_string())
}

/// lower-cases and trims an identifier used as a key
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_lowercase()
}
