mod common;

use std::net::{SocketAddr, TcpListener};
use std::thread;

use schoolstore::thread_pool::{SharedQueueThreadPool, ThreadPool};
use schoolstore::{Request, Response, SchoolClient, SchoolError, SchoolServer};
use serde_json::{json, Map};
use tempfile::TempDir;

/// starts a server on an ephemeral port and returns its address
fn start_server() -> (SocketAddr, TempDir) {
    let (school, scratch) = common::school();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let pool = SharedQueueThreadPool::new(2).unwrap();
    thread::spawn(move || SchoolServer::new(school, pool).serve(listener));
    (addr, scratch)
}

fn error_code(result: schoolstore::Result<serde_json::Value>) -> u16 {
    match result {
        Err(SchoolError::Protocol { code, .. }) => code,
        other => panic!("expected a protocol error, got {:?}", other),
    }
}

#[test]
fn health_reports_the_store_configuration() {
    let (addr, _scratch) = start_server();
    let mut client = SchoolClient::connect(addr).unwrap();
    let data = client.call(&Request::Health).unwrap();
    assert_eq!(data["status"], "healthy");
    assert_eq!(data["ftp_configured"], false);
}

#[test]
fn requests_on_one_connection_see_each_other() {
    let (addr, _scratch) = start_server();
    let mut client = SchoolClient::connect(addr).unwrap();

    let created = client
        .call(&Request::CreateClass {
            class_name: "PUC1A".into(),
        })
        .unwrap();
    assert_eq!(created["class_name"], "puc1a");

    client
        .call(&Request::SetFeeStructure {
            class_name: "puc1a".into(),
            tuition_fees: 9_000,
            lab_fees: 1_000,
            miscellaneous_fees: 0,
        })
        .unwrap();

    let mut info = Map::new();
    info.insert("name".into(), json!("Alice"));
    client
        .call(&Request::AddStudent {
            class_name: "puc1a".into(),
            student_id: "s1".into(),
            info,
        })
        .unwrap();

    let collected = client
        .call(&Request::CollectFee {
            class_name: "puc1a".into(),
            student_id: "s1".into(),
            amount: 2_500,
            generate_invoice: true,
        })
        .unwrap();
    assert_eq!(collected["student"]["feesremaining"], 7_500);
    assert_eq!(collected["invoice"]["invoice_number"], 1);

    let classes = client.call(&Request::ListClasses).unwrap();
    assert_eq!(classes, json!({ "total": 1, "classes": ["puc1a"] }));

    let exists = client
        .call(&Request::ClassExists {
            class_name: "puc1a.json".into(),
        })
        .unwrap();
    assert_eq!(exists["exists"], true);
}

#[test]
fn errors_carry_their_status_codes() {
    let (addr, _scratch) = start_server();
    let mut client = SchoolClient::connect(addr).unwrap();

    let missing = client.call(&Request::GetStudents {
        class_name: "nope".into(),
    });
    assert_eq!(error_code(missing), 404);

    client
        .call(&Request::CreateClass {
            class_name: "puc1a".into(),
        })
        .unwrap();
    let again = client.call(&Request::CreateClass {
        class_name: "puc1a".into(),
    });
    assert_eq!(error_code(again), 409);

    let same = client.call(&Request::TransferStudents {
        source_section: "puc1a".into(),
        target_section: "PUC1A".into(),
        students: vec!["Alice".into()],
    });
    assert_eq!(error_code(same), 400);

    // the connection stays usable after errors
    match client.send(&Request::ListInvoices).unwrap() {
        Response::Success { data } => assert_eq!(data["next_invoice_number"], 1),
        other => panic!("unexpected response {:?}", other),
    }
}
