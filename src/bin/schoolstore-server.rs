//! this binary starts the school server
//! to see the list of options, type: `schoolstore-server --help`
//!
//! Every store option can also be supplied through the environment variable named in its help
//! text, e.g. `FTP_HOST`, `FTP_USER` and `FTP_PASS`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::time::Duration;

use clap::{arg_enum, crate_version, value_t, App, Arg, ArgMatches};
use schoolstore::audit::SledAudit;
use schoolstore::config::{
    DEFAULT_BASE_PATH, DEFAULT_FTP_HOST, DEFAULT_NOTICES_PATH, DEFAULT_SERVICES_PATH,
};
use schoolstore::thread_pool::{RayonThreadPool, SharedQueueThreadPool, ThreadPool};
use schoolstore::{
    Connector, FtpConnector, Result, School, SchoolError, SchoolServer, SledConnector,
    StoreConfig,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

arg_enum! {
    #[allow(non_camel_case_types)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Backend {
        ftp,
        sled
    }
}

arg_enum! {
    #[allow(non_camel_case_types)]
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Pool {
        shared,
        rayon
    }
}

const DEFAULT_ADDRESS: &str = "127.0.0.1:8000";
const DEFAULT_SLED_DIR: &str = ".schoolstore";

/// ['Opt'] holds parsed and validated options from the command line
#[derive(Debug)]
struct Opt {
    addr: SocketAddr,
    backend: Backend,
    pool: Pool,
    threads: u32,
    sled_dir: PathBuf,
    audit_dir: Option<PathBuf>,
    config: StoreConfig,
}

impl Opt {
    /// validates the command line options
    /// # Errors
    /// returns [`SchoolError::Config`] if one of the parameters is invalid
    fn build(matches: &ArgMatches) -> Result<Opt> {
        let addr = matches.value_of("addr").unwrap_or(DEFAULT_ADDRESS);
        let addr: SocketAddr = addr.parse().map_err(|_| {
            SchoolError::Config(format!("could not parse {} into an IP address and port", addr))
        })?;
        let threads = value_t!(matches, "threads", u32)
            .map_err(|e| SchoolError::Config(format!("invalid thread count: {}", e)))?;
        let port = value_t!(matches, "ftp-port", u16)
            .map_err(|e| SchoolError::Config(format!("invalid FTP port: {}", e)))?;
        let timeout = value_t!(matches, "timeout", u64)
            .map_err(|e| SchoolError::Config(format!("invalid timeout: {}", e)))?;

        let mut config = StoreConfig {
            host: matches.value_of("ftp-host").unwrap_or(DEFAULT_FTP_HOST).to_string(),
            port,
            user: matches.value_of("ftp-user").unwrap_or_default().to_string(),
            password: matches.value_of("ftp-pass").unwrap_or_default().to_string(),
            base_path: matches.value_of("base-path").unwrap_or(DEFAULT_BASE_PATH).to_string(),
            notices_path: matches
                .value_of("notices-path")
                .unwrap_or(DEFAULT_NOTICES_PATH)
                .to_string(),
            services_path: matches
                .value_of("services-path")
                .unwrap_or(DEFAULT_SERVICES_PATH)
                .to_string(),
            timeout: Duration::from_secs(timeout),
            ..StoreConfig::default()
        };
        if let Some(dir) = matches.value_of("receipt-dir") {
            config.scratch_dir = PathBuf::from(dir);
        }
        if let Some(sections) = matches.value_of("marks-sections") {
            config.marks_sections = StoreConfig::parse_marks_sections(sections)?;
        }

        Ok(Opt {
            addr,
            backend: value_t!(matches, "backend", Backend).unwrap_or(Backend::ftp),
            pool: value_t!(matches, "pool", Pool).unwrap_or(Pool::shared),
            threads,
            sled_dir: PathBuf::from(matches.value_of("sled-dir").unwrap_or(DEFAULT_SLED_DIR)),
            audit_dir: matches.value_of("audit-dir").map(PathBuf::from),
            config,
        })
    }
}

fn main() {
    // set up a tracing subscriber to log to STDERR
    subscriber_config();

    let matches = App::new("schoolstore-server")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("school administration backend storing JSON documents on an FTP server")
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT that the server listens on")
            .default_value(DEFAULT_ADDRESS))
        .arg(Arg::with_name("backend")
            .long("backend")
            .value_name("BACKEND")
            .help("the remote filesystem to use, either 'ftp' or 'sled' (local)")
            .default_value("ftp"))
        .arg(Arg::with_name("sled-dir")
            .long("sled-dir")
            .value_name("DIR")
            .help("database directory of the sled backend")
            .default_value(DEFAULT_SLED_DIR))
        .arg(Arg::with_name("pool")
            .long("pool")
            .value_name("POOL")
            .help("thread pool serving connections, either 'shared' or 'rayon'")
            .default_value("shared"))
        .arg(Arg::with_name("threads")
            .long("threads")
            .value_name("N")
            .help("number of threads in the pool")
            .default_value("8"))
        .arg(Arg::with_name("ftp-host")
            .long("ftp-host")
            .env("FTP_HOST")
            .value_name("HOST")
            .help("FTP server host [env FTP_HOST]")
            .default_value(DEFAULT_FTP_HOST))
        .arg(Arg::with_name("ftp-port")
            .long("ftp-port")
            .env("FTP_PORT")
            .value_name("PORT")
            .help("FTP control port [env FTP_PORT]")
            .default_value("21"))
        .arg(Arg::with_name("ftp-user")
            .long("ftp-user")
            .env("FTP_USER")
            .value_name("USER")
            .help("FTP user name [env FTP_USER]"))
        .arg(Arg::with_name("ftp-pass")
            .long("ftp-pass")
            .env("FTP_PASS")
            .hide_env_values(true)
            .value_name("PASSWORD")
            .help("FTP password [env FTP_PASS]"))
        .arg(Arg::with_name("base-path")
            .long("base-path")
            .env("BASE_PATH")
            .value_name("DIR")
            .help("remote directory of class rosters, fees and invoices [env BASE_PATH]")
            .default_value(DEFAULT_BASE_PATH))
        .arg(Arg::with_name("notices-path")
            .long("notices-path")
            .env("NOTICES_PATH")
            .value_name("DIR")
            .help("remote directory of the notices feed [env NOTICES_PATH]")
            .default_value(DEFAULT_NOTICES_PATH))
        .arg(Arg::with_name("services-path")
            .long("services-path")
            .env("SERVICES_PATH")
            .value_name("DIR")
            .help("remote directory of the timetable [env SERVICES_PATH]")
            .default_value(DEFAULT_SERVICES_PATH))
        .arg(Arg::with_name("timeout")
            .long("timeout")
            .env("FTP_TIMEOUT")
            .value_name("SECONDS")
            .help("connect and operation timeout of the remote store [env FTP_TIMEOUT]")
            .default_value("30"))
        .arg(Arg::with_name("receipt-dir")
            .long("receipt-dir")
            .env("RECEIPT_DIR")
            .value_name("DIR")
            .help("local directory receipts are rendered into [env RECEIPT_DIR]"))
        .arg(Arg::with_name("marks-sections")
            .long("marks-sections")
            .env("MARKS_SECTIONS")
            .value_name("COURSE=SECTION,..;..")
            .help("rosters scanned per course by marks uploads [env MARKS_SECTIONS]"))
        .arg(Arg::with_name("audit-dir")
            .long("audit-dir")
            .env("AUDIT_DIR")
            .value_name("DIR")
            .help("record audit events in a sled database in DIR instead of the log [env AUDIT_DIR]"))
        .get_matches();

    let opt = match Opt::build(&matches) {
        Ok(opt) => opt,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    if let Err(e) = run(opt) {
        eprintln!("{}", e);
        exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    info!("schoolstore-server {}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}, pool: {} ({} threads)", opt.backend, opt.pool, opt.threads);
    if !opt.config.has_credentials() && opt.backend == Backend::ftp {
        warn!("FTP credentials are not configured, store operations will fail");
    }

    match opt.backend {
        Backend::ftp => {
            let connector = FtpConnector::new(&opt.config);
            run_with_connector(connector, opt)
        }
        Backend::sled => {
            let connector = SledConnector::open(&opt.sled_dir)?;
            run_with_connector(connector, opt)
        }
    }
}

fn run_with_connector<C: Connector>(connector: C, opt: Opt) -> Result<()> {
    let mut school = School::new(connector, opt.config);
    if let Some(dir) = &opt.audit_dir {
        school = school.with_audit(Arc::new(SledAudit::open(dir)?));
    }
    match opt.pool {
        Pool::shared => run_with_pool(school, SharedQueueThreadPool::new(opt.threads)?, opt.addr),
        Pool::rayon => run_with_pool(school, RayonThreadPool::new(opt.threads)?, opt.addr),
    }
}

fn run_with_pool<C: Connector, P: ThreadPool>(
    school: School<C>,
    pool: P,
    addr: SocketAddr,
) -> Result<()> {
    SchoolServer::new(school, pool).run(addr)
}

/// configures a tracing subscriber that will log to STDERR
fn subscriber_config() {
    let subscriber = FmtSubscriber::builder()
        // all spans/events with a level of INFO or more severe are written
        .with_max_level(Level::INFO)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not install the tracing subscriber: {}", e);
    }
}
