#![allow(dead_code)]

use std::sync::Arc;

use schoolstore::audit::SledAudit;
use schoolstore::{School, SledConnector, StoreConfig};
use tempfile::TempDir;

/// a school on a throw-away sled store, with receipts rendered into a temporary directory
pub fn school() -> (School<SledConnector>, TempDir) {
    let scratch = tempfile::tempdir().expect("unable to create temporary scratch directory");
    let config = StoreConfig {
        scratch_dir: scratch.path().join("receipts"),
        ..StoreConfig::default()
    };
    let connector = SledConnector::temporary().expect("unable to open temporary sled store");
    (School::new(connector, config), scratch)
}

/// like [`school`] but recording audit events into the returned sled audit log
pub fn audited_school() -> (School<SledConnector>, SledAudit, TempDir) {
    let (school, scratch) = school();
    let db = sled::Config::new()
        .temporary(true)
        .open()
        .expect("unable to open audit db");
    let audit = SledAudit::with_db(db).expect("unable to open audit tree");
    let school = school.with_audit(Arc::new(audit.clone()));
    (school, audit, scratch)
}
