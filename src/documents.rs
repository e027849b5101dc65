//! The shapes of the JSON documents kept on the remote store.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, SchoolError};

/// file name of the shared fee structure document
pub const FEES_FILE: &str = "fees.json";
/// file name of the invoice ledger
pub const INVOICES_FILE: &str = "invoice_records.json";
/// file name of the teachers' notices feed
pub const NOTICES_FILE: &str = "teachers.json";
/// file name of the timetable
pub const TIMETABLE_FILE: &str = "timetable.json";
/// suffix of every document file
pub const JSON_SUFFIX: &str = ".json";

/// A class roster: student id -> student record
pub type Roster = BTreeMap<String, StudentRecord>;

/// One student inside a roster.
///
/// The fee fields are typed; everything else (name, parents, phone numbers, ...) is kept
/// verbatim in `info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    /// total fees due for the year
    #[serde(default)]
    pub totalfees: i64,
    /// sum of all collected payments
    #[serde(default)]
    pub feespaid: i64,
    /// `totalfees - concession - feespaid`
    #[serde(default)]
    pub feesremaining: i64,
    /// fixed deduction from the total fees
    #[serde(default)]
    pub concession: i64,
    /// test name -> detailed marks
    #[serde(default)]
    pub tests: Map<String, Value>,
    /// test name -> percentage and grade
    #[serde(default)]
    pub performance: Map<String, Value>,
    /// all remaining personal fields
    #[serde(flatten)]
    pub info: Map<String, Value>,
}

impl StudentRecord {
    /// recomputes `feesremaining` from the other three fee fields
    ///
    /// # Errors
    /// `SchoolError::BadRequest` if the balance does not fit in an `i64`
    pub fn recompute_remaining(&mut self) -> Result<()> {
        self.feesremaining = self
            .totalfees
            .checked_sub(self.concession)
            .and_then(|v| v.checked_sub(self.feespaid))
            .ok_or_else(|| fee_overflow("feesremaining"))?;
        Ok(())
    }
}

/// `fees.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeStructure {
    /// class name -> fee breakdown
    #[serde(default)]
    pub class_fees: BTreeMap<String, ClassFees>,
}

/// The fee breakdown of one class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFees {
    /// tuition component
    pub tuition_fees: i64,
    /// laboratory component
    pub lab_fees: i64,
    /// everything else
    pub miscellaneous_fees: i64,
    /// sum of the three components
    pub total_fees: i64,
}

impl ClassFees {
    /// builds a breakdown with its total computed
    ///
    /// # Errors
    /// `SchoolError::BadRequest` if the total does not fit in an `i64`
    pub fn new(tuition_fees: i64, lab_fees: i64, miscellaneous_fees: i64) -> Result<Self> {
        let total_fees = tuition_fees
            .checked_add(lab_fees)
            .and_then(|v| v.checked_add(miscellaneous_fees))
            .ok_or_else(|| fee_overflow("total_fees"))?;
        Ok(ClassFees {
            tuition_fees,
            lab_fees,
            miscellaneous_fees,
            total_fees,
        })
    }
}

/// `invoice_records.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLedger {
    /// every issued invoice in issue order
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    /// the number the next invoice will receive
    #[serde(default = "first_invoice_number")]
    pub next_invoice_number: u64,
}

/// the error reported when fee arithmetic leaves the range of an `i64`
pub fn fee_overflow(field: &str) -> SchoolError {
    SchoolError::BadRequest(format!("{} is out of range", field))
}

fn first_invoice_number() -> u64 {
    1
}

impl Default for InvoiceLedger {
    fn default() -> Self {
        InvoiceLedger {
            invoices: vec![],
            next_invoice_number: first_invoice_number(),
        }
    }
}

/// A fee receipt issued when a payment was collected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// sequential invoice number
    pub invoice_number: u64,
    /// normalized class name
    pub class_name: String,
    /// roster key of the student
    pub student_id: String,
    /// amount collected by this payment
    pub amount: i64,
    /// student's total paid after this payment
    pub feespaid: i64,
    /// student's remaining balance after this payment
    pub feesremaining: i64,
    /// when the invoice was issued
    pub issued_at: DateTime<Utc>,
    /// local path of the rendered receipt, if one was rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
}

/// `teachers.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoticesFeed {
    /// time of the last change to the feed
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// notices in creation order
    #[serde(default)]
    pub notices: Vec<Notice>,
}

/// One notice posted to teachers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    /// creation time in milliseconds, as a string
    pub id: String,
    /// headline
    pub title: String,
    /// body text
    pub message: String,
    /// who posted it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// creation time
    pub created_at: DateTime<Utc>,
}

/// `timetable.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    /// the day this timetable is for
    #[serde(default)]
    pub day: String,
    /// puc class -> section -> periods in order
    #[serde(default)]
    pub classes: BTreeMap<String, BTreeMap<String, Vec<Period>>>,
}

/// One timetable slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// time range, e.g. `09:00-09:45`
    pub time: String,
    /// subject taught
    pub subject: String,
}
