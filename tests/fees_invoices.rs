mod common;

use std::fs;

use crossbeam_utils::thread;
use schoolstore::documents::INVOICES_FILE;
use schoolstore::store::SledSession;
use schoolstore::{Connector, School, SchoolError, Session, SledConnector, StoreConfig};
use serde_json::{json, Map};

/// a sled store whose uploads of the invoice ledger always fail
struct BrokenLedger(SledConnector);

struct BrokenLedgerSession(SledSession);

impl Connector for BrokenLedger {
    type Session = BrokenLedgerSession;

    fn connect(&self) -> schoolstore::Result<BrokenLedgerSession> {
        Ok(BrokenLedgerSession(self.0.connect()?))
    }
}

impl Session for BrokenLedgerSession {
    fn exists(&mut self, path: &str) -> schoolstore::Result<bool> {
        self.0.exists(path)
    }
    fn retrieve(&mut self, path: &str) -> schoolstore::Result<Option<Vec<u8>>> {
        self.0.retrieve(path)
    }
    fn store(&mut self, path: &str, bytes: &[u8]) -> schoolstore::Result<()> {
        if path.ends_with(INVOICES_FILE) {
            return Err(SchoolError::store("store", "ledger upload refused"));
        }
        self.0.store(path, bytes)
    }
    fn list(&mut self, dir: &str) -> schoolstore::Result<Vec<String>> {
        self.0.list(dir)
    }
    fn make_dir(&mut self, path: &str) -> schoolstore::Result<bool> {
        self.0.make_dir(path)
    }
    fn remove(&mut self, path: &str) -> schoolstore::Result<bool> {
        self.0.remove(path)
    }
}

fn enrol<C: Connector>(school: &School<C>, total: i64) {
    school.set_fee_structure("puc1a", total, 0, 0).unwrap();
    let mut info = Map::new();
    info.insert("name".into(), json!("Alice"));
    school.add_student("puc1a", "s1", info).unwrap();
}

#[test]
fn fee_structure_totals_are_recomputed() {
    let (school, _scratch) = common::school();
    let fees = school.set_fee_structure("PUC1A", 10_000, 1_500, 500).unwrap();
    assert_eq!(fees.total_fees, 12_000);
    let fees = school.set_fee_structure("puc1a", 9_000, 1_000, 0).unwrap();
    assert_eq!(fees.total_fees, 10_000);
    assert_eq!(school.get_class_fees("puc1a").unwrap(), fees);
    assert_eq!(school.get_fee_structure().unwrap().class_fees.len(), 1);

    assert!(matches!(
        school.set_fee_structure("puc1a", -1, 0, 0),
        Err(SchoolError::BadRequest(_))
    ));
    assert!(matches!(
        school.set_fee_structure("puc1a", 0, 0, 0),
        Err(SchoolError::BadRequest(_))
    ));
}

#[test]
fn delete_fee_structure() {
    let (school, _scratch) = common::school();
    school.set_fee_structure("puc1a", 100, 0, 0).unwrap();
    school.set_fee_structure("puc2a", 200, 0, 0).unwrap();
    assert_eq!(school.delete_fee_structure("puc1a").unwrap().total_fees, 100);
    assert!(matches!(
        school.delete_fee_structure("puc1a"),
        Err(SchoolError::NotFound(_))
    ));
    assert!(matches!(
        school.get_class_fees("puc1a"),
        Err(SchoolError::NotFound(_))
    ));
    assert_eq!(school.get_class_fees("puc2a").unwrap().total_fees, 200);
}

#[test]
fn collected_fees_accumulate_across_concession_changes() {
    let (school, _scratch) = common::school();
    enrol(&school, 10_000);

    school.collect_fee("puc1a", "s1", 1_000, false).unwrap();
    school.update_concession("puc1a", "s1", 500).unwrap();
    school.collect_fee("puc1a", "s1", 2_500, false).unwrap();
    school.update_concession("puc1a", "s1", 750).unwrap();
    let collected = school.collect_fee("puc1a", "s1", 250, false).unwrap();

    assert!(collected.invoice.is_none());
    let student = collected.student;
    assert_eq!(student.feespaid, 3_750);
    assert_eq!(student.concession, 750);
    assert_eq!(student.feesremaining, 10_000 - 750 - 3_750);
    assert_eq!(school.get_students("puc1a").unwrap()["s1"], student);
}

#[test]
fn concession_then_zero_payment_keeps_the_invariant() {
    let (school, _scratch) = common::school();
    enrol(&school, 8_000);
    school.collect_fee("puc1a", "s1", 3_000, false).unwrap();

    let after_concession = school.update_concession("puc1a", "s1", 1_200).unwrap();
    let after_payment = school.collect_fee("puc1a", "s1", 0, false).unwrap().student;
    assert_eq!(after_concession.feesremaining, 8_000 - 1_200 - 3_000);
    assert_eq!(after_payment, after_concession);

    assert!(matches!(
        school.update_concession("puc1a", "s1", -5),
        Err(SchoolError::BadRequest(_))
    ));
    assert!(matches!(
        school.collect_fee("puc1a", "s1", -5, false),
        Err(SchoolError::BadRequest(_))
    ));
}

#[test]
fn collecting_for_unknown_students_is_not_found() {
    let (school, _scratch) = common::school();
    assert!(matches!(
        school.collect_fee("puc1a", "s1", 10, true),
        Err(SchoolError::NotFound(_))
    ));
    enrol(&school, 1_000);
    assert!(matches!(
        school.collect_fee("puc1a", "s2", 10, true),
        Err(SchoolError::NotFound(_))
    ));
    assert!(school.list_invoices().unwrap().invoices.is_empty());
}

#[test]
fn sequential_invoices_have_consecutive_numbers() {
    let (school, _scratch) = common::school();
    enrol(&school, 10_000);

    let numbers: Vec<u64> = (0..4)
        .map(|_| {
            school
                .collect_fee("puc1a", "s1", 500, true)
                .unwrap()
                .invoice
                .expect("an invoice was requested")
                .invoice_number
        })
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    let ledger = school.list_invoices().unwrap();
    assert_eq!(ledger.next_invoice_number, 5);
    assert_eq!(ledger.invoices.len(), 4);
    assert_eq!(ledger.invoices[3].feespaid, 2_000);
    assert_eq!(ledger.invoices[3].feesremaining, 8_000);

    let invoice = school.get_invoice(2).unwrap();
    assert_eq!(invoice.amount, 500);
    let receipt = invoice.receipt.expect("receipt rendered");
    let text = fs::read_to_string(receipt).unwrap();
    assert!(text.contains("Invoice No : 2"));
    assert!(text.contains("Student    : Alice"));

    assert!(matches!(school.get_invoice(99), Err(SchoolError::NotFound(_))));
}

#[test]
fn concurrent_collections_in_one_process_are_not_lost() {
    let (school, _scratch) = common::school();
    enrol(&school, 100_000);

    thread::scope(|s| {
        for _ in 0..8 {
            let school = school.clone();
            s.spawn(move |_| {
                for _ in 0..5 {
                    school.collect_fee("puc1a", "s1", 100, true).unwrap();
                }
            });
        }
    })
    .unwrap();

    let student = &school.get_students("puc1a").unwrap()["s1"];
    assert_eq!(student.feespaid, 4_000);
    assert_eq!(student.feesremaining, 96_000);

    let ledger = school.list_invoices().unwrap();
    let mut numbers: Vec<u64> = ledger.invoices.iter().map(|i| i.invoice_number).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=40).collect::<Vec<u64>>());
}

#[test]
fn fee_amounts_out_of_range_are_rejected() {
    let (school, _scratch) = common::school();
    assert!(matches!(
        school.set_fee_structure("puc1a", i64::MAX, 1, 0),
        Err(SchoolError::BadRequest(_))
    ));
    assert!(matches!(
        school.get_class_fees("puc1a"),
        Err(SchoolError::NotFound(_))
    ));

    enrol(&school, 1_000);
    school.collect_fee("puc1a", "s1", 1, false).unwrap();
    assert!(matches!(
        school.collect_fee("puc1a", "s1", i64::MAX, true),
        Err(SchoolError::BadRequest(_))
    ));

    let student = &school.get_students("puc1a").unwrap()["s1"];
    assert_eq!(student.feespaid, 1);
    assert_eq!(student.feesremaining, 999);
    assert!(school.list_invoices().unwrap().invoices.is_empty());
}

#[test]
fn padded_student_ids_reach_the_same_student() {
    let (school, _scratch) = common::school();
    school.set_fee_structure("puc1a", 1_000, 0, 0).unwrap();
    school.add_student("puc1a", " s1 ", Map::new()).unwrap();

    let collected = school.collect_fee("puc1a", " s1 ", 100, false).unwrap();
    assert_eq!(collected.student.feesremaining, 900);
    assert_eq!(school.update_concession("puc1a", "s1 ", 50).unwrap().feesremaining, 850);
    assert!(school.get_students("puc1a").unwrap().contains_key("s1"));
}

#[test]
fn failed_ledger_upload_leaves_no_receipt_behind() {
    let scratch = tempfile::tempdir().unwrap();
    let receipts = scratch.path().join("receipts");
    let config = StoreConfig {
        scratch_dir: receipts.clone(),
        ..StoreConfig::default()
    };
    let school = School::new(BrokenLedger(SledConnector::temporary().unwrap()), config);
    enrol(&school, 1_000);

    assert!(matches!(
        school.collect_fee("puc1a", "s1", 100, true),
        Err(SchoolError::Store { .. })
    ));
    let leftovers = match fs::read_dir(&receipts) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    };
    assert_eq!(leftovers, 0);
    // the roster is written before the ledger
    assert_eq!(school.get_students("puc1a").unwrap()["s1"].feespaid, 100);
}
