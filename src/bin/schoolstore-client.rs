//! The schoolstore-client executable supports the following command line arguments:
//!
//! `schoolstore-client health|classes|notices|invoices|timetable [--addr IP-PORT]`
//!
//!     Print the corresponding document or listing.
//!
//! `schoolstore-client students <CLASS> [--addr IP-PORT]`
//!
//!     Print the roster of a class.
//!
//! `schoolstore-client fees [CLASS] [--addr IP-PORT]`
//!
//!     Print the fee structure, optionally of a single class.
//!
//! `schoolstore-client marks <COURSE> <TEST> <CSV_FILE> [--sections S1,S2] [--addr IP-PORT]`
//!
//!     Upload a CSV marks sheet (a `name` column, one column per subject, optional
//!     `<subject>_max` columns).
//!
//! `schoolstore-client request <JSON> [--addr IP-PORT]`
//!
//!     Send any request, e.g. `'{"CreateClass":{"class_name":"puc1a"}}'`.
//!
//! --addr accepts an IP address, either v4 or v6, and a port number, with the format IP:PORT.
//! If --addr is not specified then connect on 127.0.0.1:8000. A non-zero exit code is returned
//! if the server reports an error.

use std::fs::File;
use std::net::SocketAddr;
use std::process::exit;

use clap::{crate_version, App, Arg, ArgMatches, SubCommand};
use schoolstore::marks::parse_csv;
use schoolstore::{Request, Response, Result, SchoolClient, SchoolError};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8000";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    /// the server's ip:port
    addr: SocketAddr,
    req: Request,
}

impl Opt {
    /// validates the `addr` parameter is a valid IP address and PORT
    /// # Errors
    /// returns [`SchoolError::Config`] if the address is invalid
    fn build(addr: &str, req: Request) -> Result<Opt> {
        let addr: SocketAddr = addr.parse().map_err(|_| {
            SchoolError::Config(format!("could not parse {} into an IP address and port", addr))
        })?;
        Ok(Opt { addr, req })
    }
}

fn main() {
    // configure a subscriber that will log messages to STDERR
    subscriber_config();

    let matches = App::new("schoolstore-client")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("client for the school administration backend")
        .subcommands(vec![
            SubCommand::with_name("health").about("Server version and store configuration"),
            SubCommand::with_name("classes").about("List every class"),
            SubCommand::with_name("students")
                .about("Print the roster of a class")
                .arg(Arg::with_name("CLASS").required(true).index(1)),
            SubCommand::with_name("fees")
                .about("Print the fee structure")
                .arg(Arg::with_name("CLASS").index(1)),
            SubCommand::with_name("invoices").about("Print the invoice ledger"),
            SubCommand::with_name("notices").about("Print the notices feed"),
            SubCommand::with_name("timetable").about("Print the timetable"),
            SubCommand::with_name("marks")
                .about("Upload a CSV marks sheet")
                .arg(Arg::with_name("COURSE").required(true).index(1))
                .arg(Arg::with_name("TEST").required(true).index(2))
                .arg(Arg::with_name("CSV_FILE").required(true).index(3))
                .arg(Arg::with_name("sections")
                    .long("sections")
                    .value_name("S1,S2")
                    .help("rosters to scan instead of the course's configured sections")),
            SubCommand::with_name("request")
                .about("Send a raw JSON request")
                .arg(Arg::with_name("JSON").required(true).index(1)),
        ])
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT of the server to connect to")
            .default_value(DEFAULT_ADDRESS))
        .get_matches();

    let result = parse_options(&matches).and_then(run);
    if let Err(e) = result {
        eprintln!("{}", e);
        exit(1);
    }
}

/// sends the request in `opt` and prints the response
fn run(opt: Opt) -> Result<()> {
    debug!("sending {:?} to {}", opt.req, opt.addr);
    let mut client = SchoolClient::connect(opt.addr)?;
    let resp = client.send(&opt.req)?;
    println!("{}", serde_json::to_string_pretty(&resp)?);
    match resp {
        Response::Success { .. } => Ok(()),
        Response::Error { code, detail } => Err(SchoolError::Protocol { code, detail }),
    }
}

/// parses the matches from the command line into an [`Opt`] struct
fn parse_options(matches: &ArgMatches) -> Result<Opt> {
    let addr = matches.value_of("addr").unwrap_or(DEFAULT_ADDRESS);
    let req = match matches.subcommand() {
        ("health", _) => Request::Health,
        ("classes", _) => Request::ListClasses,
        ("students", Some(args)) => Request::GetStudents {
            class_name: required(args, "CLASS")?,
        },
        ("fees", Some(args)) => Request::GetFeeStructure {
            class_name: args.value_of("CLASS").map(String::from),
        },
        ("invoices", _) => Request::ListInvoices,
        ("notices", _) => Request::ListNotices,
        ("timetable", _) => Request::GetTimetable,
        ("marks", Some(args)) => {
            let file = File::open(required(args, "CSV_FILE")?)?;
            Request::UploadMarks {
                course: required(args, "COURSE")?,
                test_name: required(args, "TEST")?,
                rows: parse_csv(file)?,
                sections: args
                    .value_of("sections")
                    .map(|s| s.split(',').map(|p| p.trim().to_string()).collect()),
            }
        }
        ("request", Some(args)) => serde_json::from_str(&required(args, "JSON")?)
            .map_err(|e| SchoolError::BadRequest(format!("invalid request: {}", e)))?,
        _ => {
            return Err(SchoolError::BadRequest(
                "no command given, see --help".to_string(),
            ))
        }
    };
    Opt::build(addr, req)
}

fn required(args: &ArgMatches, name: &str) -> Result<String> {
    args.value_of(name)
        .map(String::from)
        .ok_or_else(|| SchoolError::BadRequest(format!("missing {}", name)))
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not install the tracing subscriber: {}", e);
    }
}
