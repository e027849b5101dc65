use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use serde::Serialize;
use serde_json::{json, Deserializer, Value};
use tracing::{debug, error, info, warn};

use crate::command::{Request, Response};
use crate::school::{normalize_class_name, School};
use crate::store::Connector;
use crate::thread_pool::ThreadPool;
use crate::Result;

/// A TCP socket server in front of a [`School`].
/// It listens for incoming [`Request`]s, deserializes them, and processes every connection on a
/// thread of its [`ThreadPool`].
///
/// Each thread receives its own handle to the school, which opens a fresh store session per
/// operation.
///
/// # Example
/// ```rust,no_run
/// use schoolstore::{FtpConnector, School, SchoolServer, StoreConfig};
/// use schoolstore::thread_pool::{SharedQueueThreadPool, ThreadPool};
/// # fn main() -> schoolstore::Result<()> {
/// let config = StoreConfig::default();
/// let school = School::new(FtpConnector::new(&config), config);
/// let server = SchoolServer::new(school, SharedQueueThreadPool::new(4)?);
/// server.run("127.0.0.1:8000")?;
/// # Ok(())
/// # }
/// ```
pub struct SchoolServer<C: Connector, P: ThreadPool> {
    /// the school every request is executed against
    school: School<C>,
    /// a pool of threads that will serve connections
    pool: P,
}

impl<C: Connector, P: ThreadPool> SchoolServer<C, P> {
    /// Create a new `SchoolServer` using the given [`School`] and [`ThreadPool`] implementation.
    pub fn new(school: School<C>, pool: P) -> Self {
        SchoolServer { school, pool }
    }

    /// binds to the given address and serves connections until the process exits
    ///
    /// # Errors
    /// returns an error if the address could not be bound
    pub fn run<A: ToSocketAddrs>(self, addr: A) -> Result<()> {
        let listener = TcpListener::bind(addr)?;
        self.serve(listener)
    }

    /// serves connections arriving on an already bound listener
    pub fn serve(self, listener: TcpListener) -> Result<()> {
        info!("listening on {}", listener.local_addr()?);
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let school = self.school.clone();
                    self.pool.spawn(move || {
                        if let Err(e) = serve_connection(school, stream) {
                            error!("Error on serving client: {}", e);
                        }
                    });
                }
                Err(e) => error!("Connection failed: {}", e),
            }
        }
        Ok(())
    }
}

/// Reads [`Request`]s from `tcp` until the peer closes it, answering each one with a
/// [`Response`]
fn serve_connection<C: Connector>(school: School<C>, tcp: TcpStream) -> Result<()> {
    let peer_addr = tcp.peer_addr()?;
    let stream_reader = BufReader::new(&tcp);
    let mut stream_writer = BufWriter::new(&tcp);
    let req_reader = Deserializer::from_reader(stream_reader).into_iter::<Request>();

    let mut send_resp = move |resp: Response| -> Result<()> {
        serde_json::to_writer(&mut stream_writer, &resp)?;
        stream_writer.flush()?;
        debug!("Response sent to {}: {:?}", peer_addr, resp);
        Ok(())
    };

    for req in req_reader {
        let req = req?;
        debug!("Receive request from {}: {:?}", peer_addr, req);
        send_resp(execute(&school, req))?;
    }
    Ok(())
}

/// runs one request against the school and wraps the outcome in a [`Response`]
pub fn execute<C: Connector>(school: &School<C>, req: Request) -> Response {
    match dispatch(school, req) {
        Ok(data) => Response::Success { data },
        Err(e) => {
            let code = e.status_code();
            if code >= 500 {
                error!(code, "request failed: {}", e);
            } else {
                warn!(code, "request rejected: {}", e);
            }
            Response::Error {
                code,
                detail: e.to_string(),
            }
        }
    }
}

fn to_data<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn dispatch<C: Connector>(school: &School<C>, req: Request) -> Result<Value> {
    match req {
        Request::Health => Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "status": "healthy",
            "ftp_configured": school.config().has_credentials(),
        })),
        Request::ListClasses => {
            let classes = school.list_classes()?;
            Ok(json!({ "total": classes.len(), "classes": classes }))
        }
        Request::CreateClass { class_name } => {
            let info = school.create_class(&class_name)?;
            Ok(json!({
                "message": format!("Class '{}' created successfully", info.class_name),
                "class_name": info.class_name,
                "file_name": info.file_name,
                "file_path": info.file_path,
            }))
        }
        Request::DeleteClass { class_name } => {
            let class = school.delete_class(&class_name)?;
            Ok(json!({
                "message": format!("Class '{}' deleted successfully", class),
                "class_name": class,
            }))
        }
        Request::ClassExists { class_name } => {
            let class = normalize_class_name(&class_name)?;
            let exists = school.class_exists(&class)?;
            Ok(json!({ "class_name": class, "exists": exists }))
        }
        Request::GetStudents { class_name } => to_data(school.get_students(&class_name)?),
        Request::AddStudent {
            class_name,
            student_id,
            info,
        } => to_data(school.add_student(&class_name, &student_id, info)?),
        Request::UpdateStudent {
            class_name,
            student_id,
            updates,
        } => to_data(school.update_student(&class_name, &student_id, updates)?),
        Request::RemoveStudent {
            class_name,
            student_id,
        } => to_data(school.remove_student(&class_name, &student_id)?),
        Request::CollectFee {
            class_name,
            student_id,
            amount,
            generate_invoice,
        } => to_data(school.collect_fee(&class_name, &student_id, amount, generate_invoice)?),
        Request::UpdateConcession {
            class_name,
            student_id,
            concession,
        } => to_data(school.update_concession(&class_name, &student_id, concession)?),
        Request::GetFeeStructure { class_name: None } => to_data(school.get_fee_structure()?),
        Request::GetFeeStructure {
            class_name: Some(class_name),
        } => to_data(school.get_class_fees(&class_name)?),
        Request::SetFeeStructure {
            class_name,
            tuition_fees,
            lab_fees,
            miscellaneous_fees,
        } => to_data(school.set_fee_structure(
            &class_name,
            tuition_fees,
            lab_fees,
            miscellaneous_fees,
        )?),
        Request::DeleteFeeStructure { class_name } => {
            to_data(school.delete_fee_structure(&class_name)?)
        }
        Request::ListInvoices => to_data(school.list_invoices()?),
        Request::GetInvoice { invoice_number } => to_data(school.get_invoice(invoice_number)?),
        Request::TransferStudents {
            source_section,
            target_section,
            students,
        } => to_data(school.transfer_students(&source_section, &target_section, &students)?),
        Request::UploadMarks {
            course,
            test_name,
            rows,
            sections,
        } => to_data(school.upload_marks(&course, &test_name, &rows, sections)?),
        Request::ListNotices => to_data(school.list_notices()?),
        Request::AddNotice {
            title,
            message,
            author,
        } => to_data(school.add_notice(&title, &message, author.as_deref())?),
        Request::DeleteNotice { id } => to_data(school.delete_notice(&id)?),
        Request::GetTimetable => to_data(school.get_timetable()?),
        Request::UploadTimetable { day, classes } => {
            to_data(school.upload_timetable(&day, classes)?)
        }
    }
}
