use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use schoolstore::documents::{
    ClassFees, FeeStructure, Invoice, InvoiceLedger, Notice, NoticesFeed, Period, Roster,
    StudentRecord, Timetable,
};
use schoolstore::{
    Connector, DocStore, FtpConnector, SchoolError, Session, SledConnector, StoreConfig,
};
use serde_json::{json, Map, Value};

fn store() -> DocStore<SledConnector> {
    DocStore::new(SledConnector::temporary().expect("unable to open temporary sled store"))
}

#[test]
fn read_of_a_never_written_path_is_the_default() {
    let store = store();
    let roster: Roster = store.read("/htdocs/classes/nope.json").unwrap();
    assert!(roster.is_empty());
    let ledger: InvoiceLedger = store.read("/htdocs/classes/invoice_records.json").unwrap();
    assert_eq!(ledger.next_invoice_number, 1);
    assert!(store
        .read_existing::<Roster>("/htdocs/classes/nope.json")
        .unwrap()
        .is_none());
}

#[test]
fn write_provisions_missing_directories() {
    let store = store();
    assert!(matches!(
        store.list("/htdocs/classes"),
        Err(SchoolError::NotFound(_))
    ));

    store.write("/htdocs/classes/puc1a.json", &Roster::new()).unwrap();
    assert!(store.exists("/htdocs/classes/puc1a.json").unwrap());
    assert_eq!(store.list("/htdocs/classes").unwrap(), vec!["puc1a.json"]);
    assert!(store.list("/htdocs").unwrap().is_empty());
}

#[test]
fn ensure_directory_is_idempotent() {
    let store = store();
    store.ensure_directory("/a/b/c").unwrap();
    store.ensure_directory("/a/b/c").unwrap();
    store.ensure_directory("/a/b").unwrap();
    assert!(store.list("/a/b/c").unwrap().is_empty());
}

#[test]
fn sessions_refuse_to_store_into_missing_directories() {
    let connector = SledConnector::temporary().unwrap();
    let mut session = connector.connect().unwrap();
    assert!(matches!(
        session.store("/missing/doc.json", b"{}"),
        Err(SchoolError::Store { .. })
    ));
    assert!(matches!(
        session.make_dir("/missing/child"),
        Err(SchoolError::Store { .. })
    ));
    assert!(session.make_dir("/missing").unwrap());
    assert!(!session.make_dir("/missing").unwrap());
}

#[test]
fn undecodable_documents_read_as_empty() {
    let connector = SledConnector::temporary().unwrap();
    {
        let mut session = connector.connect().unwrap();
        session.make_dir("/docs").unwrap();
        session.store("/docs/broken.json", b"{not json").unwrap();
    }
    let store = DocStore::new(connector);
    let roster: Roster = store.read("/docs/broken.json").unwrap();
    assert!(roster.is_empty());
    assert!(matches!(
        store.read_existing::<Roster>("/docs/broken.json"),
        Err(SchoolError::Decode { .. })
    ));
}

#[test]
fn remove_reports_whether_the_file_existed() {
    let store = store();
    store.write("/d/x.json", &json!({})).unwrap();
    assert!(store.remove("/d/x.json").unwrap());
    assert!(!store.remove("/d/x.json").unwrap());
    assert!(!store.exists("/d/x.json").unwrap());
}

#[test]
fn failed_mutations_write_nothing() {
    let store = store();
    store.write("/d/fees.json", &FeeStructure::default()).unwrap();
    let result: Result<(), SchoolError> =
        store.mutate("/d/fees.json", |doc: &mut FeeStructure| {
            doc.class_fees.insert("puc1a".into(), ClassFees::new(1, 2, 3)?);
            Err(SchoolError::BadRequest("rejected".into()))
        });
    assert!(result.is_err());
    let doc: FeeStructure = store.read("/d/fees.json").unwrap();
    assert!(doc.class_fees.is_empty());
}

#[test]
fn every_document_shape_round_trips() {
    let store = store();

    let mut info = Map::new();
    info.insert("name".into(), json!("Alice"));
    info.insert("guardian".into(), json!({"name": "Bob", "phone": "555-0101"}));
    let mut roster = Roster::new();
    roster.insert(
        "s1".into(),
        StudentRecord {
            totalfees: 12_000,
            feespaid: 2_000,
            feesremaining: 9_500,
            concession: 500,
            info,
            ..StudentRecord::default()
        },
    );
    store.write("/c/puc1a.json", &roster).unwrap();
    assert_eq!(store.read::<Roster>("/c/puc1a.json").unwrap(), roster);

    let mut fees = FeeStructure::default();
    fees.class_fees.insert("puc1a".into(), ClassFees::new(10_000, 1_500, 500).unwrap());
    store.write("/c/fees.json", &fees).unwrap();
    assert_eq!(store.read::<FeeStructure>("/c/fees.json").unwrap(), fees);

    let ledger = InvoiceLedger {
        invoices: vec![Invoice {
            invoice_number: 1,
            class_name: "puc1a".into(),
            student_id: "s1".into(),
            amount: 2_000,
            feespaid: 2_000,
            feesremaining: 9_500,
            issued_at: Utc::now(),
            receipt: None,
        }],
        next_invoice_number: 2,
    };
    store.write("/c/invoice_records.json", &ledger).unwrap();
    assert_eq!(store.read::<InvoiceLedger>("/c/invoice_records.json").unwrap(), ledger);

    let now = Utc::now();
    let feed = NoticesFeed {
        last_updated: Some(now),
        notices: vec![Notice {
            id: now.timestamp_millis().to_string(),
            title: "Exams".into(),
            message: "Mid-terms start Monday".into(),
            author: Some("Principal".into()),
            created_at: now,
        }],
    };
    store.write("/n/teachers.json", &feed).unwrap();
    assert_eq!(store.read::<NoticesFeed>("/n/teachers.json").unwrap(), feed);

    let mut sections = BTreeMap::new();
    sections.insert(
        "a".to_string(),
        vec![Period {
            time: "09:00-09:45".into(),
            subject: "Physics".into(),
        }],
    );
    let mut classes = BTreeMap::new();
    classes.insert("puc1 science".to_string(), sections);
    let timetable = Timetable {
        day: "monday".into(),
        classes,
    };
    store.write("/s/timetable.json", &timetable).unwrap();
    assert_eq!(store.read::<Timetable>("/s/timetable.json").unwrap(), timetable);

    let raw: Value = json!({"anything": [1, 2, 3]});
    store.write("/s/raw.json", &raw).unwrap();
    assert_eq!(store.read::<Value>("/s/raw.json").unwrap(), raw);
}

#[test]
fn ftp_without_credentials_is_a_config_error() {
    let connector = FtpConnector::new(&StoreConfig::default());
    assert!(matches!(connector.connect(), Err(SchoolError::Config(_))));
}

#[test]
fn unreachable_ftp_host_is_a_store_error() {
    let config = StoreConfig {
        host: "127.0.0.1".into(),
        port: 1,
        user: "admin".into(),
        password: "secret".into(),
        timeout: Duration::from_secs(2),
        ..StoreConfig::default()
    };
    let store = DocStore::new(FtpConnector::new(&config));
    match store.read::<Roster>("/htdocs/classes/puc1a.json") {
        Err(SchoolError::Store { .. }) | Err(SchoolError::Timeout(_)) => {}
        other => panic!("expected a store failure, got {:?}", other),
    }
}
