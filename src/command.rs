use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::documents::Period;
use crate::marks::MarksRow;

/// These are the requests that can be made to a school server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// server version and whether store credentials are configured
    Health,
    /// names of every class
    ListClasses,
    /// create an empty class roster
    CreateClass {
        /// class to create
        class_name: String,
    },
    /// delete a class roster
    DeleteClass {
        /// class to delete
        class_name: String,
    },
    /// check whether a class roster exists
    ClassExists {
        /// class to check
        class_name: String,
    },
    /// the roster of a class
    GetStudents {
        /// class to read
        class_name: String,
    },
    /// add a student to a class
    AddStudent {
        /// class of the student
        class_name: String,
        /// roster key of the student
        student_id: String,
        /// personal details
        #[serde(default)]
        info: Map<String, Value>,
    },
    /// merge field updates into a student record
    UpdateStudent {
        /// class of the student
        class_name: String,
        /// roster key of the student
        student_id: String,
        /// fields to set
        updates: Map<String, Value>,
    },
    /// remove a student from a class
    RemoveStudent {
        /// class of the student
        class_name: String,
        /// roster key of the student
        student_id: String,
    },
    /// record a fee payment
    CollectFee {
        /// class of the student
        class_name: String,
        /// roster key of the student
        student_id: String,
        /// amount paid
        amount: i64,
        /// also issue an invoice and a receipt
        #[serde(default)]
        generate_invoice: bool,
    },
    /// set a student's concession
    UpdateConcession {
        /// class of the student
        class_name: String,
        /// roster key of the student
        student_id: String,
        /// new absolute concession
        concession: i64,
    },
    /// the fee structure of every class, or of one class
    GetFeeStructure {
        /// restrict to this class
        #[serde(default)]
        class_name: Option<String>,
    },
    /// set the fee breakdown of a class
    SetFeeStructure {
        /// class the fees apply to
        class_name: String,
        /// tuition component
        tuition_fees: i64,
        /// laboratory component
        lab_fees: i64,
        /// everything else
        miscellaneous_fees: i64,
    },
    /// remove the fee breakdown of a class
    DeleteFeeStructure {
        /// class to remove
        class_name: String,
    },
    /// the invoice ledger
    ListInvoices,
    /// one invoice
    GetInvoice {
        /// invoice number
        invoice_number: u64,
    },
    /// move students between sections
    TransferStudents {
        /// section the students leave
        source_section: String,
        /// section the students join
        target_section: String,
        /// names to move
        students: Vec<String>,
    },
    /// store a test's marks
    UploadMarks {
        /// course level whose sections are scanned
        course: String,
        /// name the results are stored under
        test_name: String,
        /// one row per student
        rows: Vec<MarksRow>,
        /// overrides the configured sections of the course
        #[serde(default)]
        sections: Option<Vec<String>>,
    },
    /// the notices feed
    ListNotices,
    /// post a notice
    AddNotice {
        /// headline
        title: String,
        /// body text
        message: String,
        /// who posted it
        #[serde(default)]
        author: Option<String>,
    },
    /// delete a notice
    DeleteNotice {
        /// notice id
        id: String,
    },
    /// the current timetable
    GetTimetable,
    /// replace the timetable
    UploadTimetable {
        /// the day the timetable is for
        day: String,
        /// puc class -> section -> periods
        classes: BTreeMap<String, BTreeMap<String, Vec<Period>>>,
    },
}

/// The response returned for any Request.
///
/// On the wire it is a JSON object whose `status` field is `"success"` or `"error"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    /// the request was successful
    Success {
        /// operation specific payload
        data: Value,
    },
    /// an error occurred while processing the request
    Error {
        /// http-like status code
        code: u16,
        /// human readable reason
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn responses_carry_a_status_field() {
        let ok = serde_json::to_value(Response::Success { data: json!({"total": 2}) }).unwrap();
        assert_eq!(ok, json!({"status": "success", "data": {"total": 2}}));

        let err = serde_json::to_value(Response::Error {
            code: 404,
            detail: "Class 'x' not found".into(),
        })
        .unwrap();
        assert_eq!(err["status"], "error");
        assert_eq!(err["code"], 404);
    }

    #[test]
    fn requests_default_optional_fields() {
        let req: Request = serde_json::from_value(json!({
            "CollectFee": {"class_name": "puc1a", "student_id": "s1", "amount": 100}
        }))
        .unwrap();
        assert_eq!(
            req,
            Request::CollectFee {
                class_name: "puc1a".into(),
                student_id: "s1".into(),
                amount: 100,
                generate_invoice: false,
            }
        );
    }
}
