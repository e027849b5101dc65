//! Audit events for notable mutations.
//!
//! Sinks are best-effort: [`emit`] logs any failure and never propagates it.
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sled::{Db, Tree};
use tracing::{info, warn};

use crate::Result;

const EVENTS_TREE: &str = "audit_events";

/// A structured record of something that happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// type tag, e.g. `section_transfer`
    pub kind: String,
    /// identifiers relevant to the event
    pub details: Value,
    /// when it happened
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    /// a new event stamped with the current time
    pub fn new(kind: &str, details: Value) -> Self {
        AuditEvent {
            kind: kind.to_string(),
            details,
            at: Utc::now(),
        }
    }
}

/// Somewhere audit events are recorded
pub trait AuditSink: Send + Sync {
    /// records `event`
    fn record(&self, event: &AuditEvent) -> Result<()>;
}

/// emits `event` on `sink`, logging (and swallowing) any failure
pub fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    if let Err(e) = sink.record(&event) {
        warn!(kind = %event.kind, "could not record audit event: {}", e);
    }
}

/// Writes audit events to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        info!(target: "audit", kind = %event.kind, at = %event.at, details = %event.details);
        Ok(())
    }
}

/// Persists audit events as JSON in a sled tree, keyed so that iteration is in time order
#[derive(Debug, Clone)]
pub struct SledAudit {
    db: Db,
    events: Tree,
}

impl SledAudit {
    /// opens (or creates) the audit database in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        Self::with_db(sled::open(dir)?)
    }

    /// uses an already opened database
    pub fn with_db(db: Db) -> Result<Self> {
        let events = db.open_tree(EVENTS_TREE)?;
        Ok(SledAudit { db, events })
    }

    /// every recorded event in the order they were recorded
    pub fn events(&self) -> Result<Vec<AuditEvent>> {
        let mut out = vec![];
        for entry in self.events.iter() {
            let (_, value) = entry?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }
}

impl AuditSink for SledAudit {
    fn record(&self, event: &AuditEvent) -> Result<()> {
        // big-endian ids keep lexicographic order equal to insertion order
        let id = self.db.generate_id()?;
        self.events
            .insert(id.to_be_bytes(), serde_json::to_vec(event)?)?;
        Ok(())
    }
}
