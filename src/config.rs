//! Start-up configuration of the remote store, the receipt scratch directory and marks uploads.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::{Result, SchoolError};

/// default FTP host of the school's file server
pub const DEFAULT_FTP_HOST: &str = "ftp.ftpupload.net";
/// default FTP control port
pub const DEFAULT_FTP_PORT: u16 = 21;
/// directory holding class rosters, the fee structure and the invoice ledger
pub const DEFAULT_BASE_PATH: &str = "/htdocs/classes";
/// directory holding the notices feed
pub const DEFAULT_NOTICES_PATH: &str = "/htdocs/notices";
/// directory holding shared service documents such as the timetable
pub const DEFAULT_SERVICES_PATH: &str = "/htdocs/services";
/// connect and per-operation timeout for the remote store
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// rendered receipts older than this are removed by the scratch cleanup
pub const DEFAULT_RECEIPT_RETENTION: Duration = Duration::from_secs(10 * 24 * 60 * 60);

/// Process configuration for the store and everything layered on it.
///
/// It is built once at start-up and handed to constructors; store operations never consult the
/// environment themselves. Credentials may be empty here, the problem is reported as a
/// [`SchoolError::Config`] on the first connection attempt instead.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// FTP host name or ip address
    pub host: String,
    /// FTP control port
    pub port: u16,
    /// FTP user name
    pub user: String,
    /// FTP password
    pub password: String,
    /// remote directory for rosters, `fees.json` and `invoice_records.json`
    pub base_path: String,
    /// remote directory for `teachers.json`
    pub notices_path: String,
    /// remote directory for `timetable.json`
    pub services_path: String,
    /// bounded wait applied to connecting and to every read/write on the connection
    pub timeout: Duration,
    /// local directory receipts are rendered into
    pub scratch_dir: PathBuf,
    /// how long rendered receipts are kept
    pub receipt_retention: Duration,
    /// course level -> ordered list of roster names scanned by a marks upload
    pub marks_sections: BTreeMap<String, Vec<String>>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            host: DEFAULT_FTP_HOST.to_string(),
            port: DEFAULT_FTP_PORT,
            user: String::new(),
            password: String::new(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            notices_path: DEFAULT_NOTICES_PATH.to_string(),
            services_path: DEFAULT_SERVICES_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            scratch_dir: std::env::temp_dir().join("schoolstore-receipts"),
            receipt_retention: DEFAULT_RECEIPT_RETENTION,
            marks_sections: BTreeMap::new(),
        }
    }
}

impl StoreConfig {
    /// true if both a user and a password were supplied
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }

    /// returns the `(user, password)` pair
    ///
    /// # Errors
    /// returns [`SchoolError::Config`] if either is missing
    pub fn credentials(&self) -> Result<(&str, &str)> {
        if self.has_credentials() {
            Ok((&self.user, &self.password))
        } else {
            Err(SchoolError::Config(
                "FTP credentials are not configured (set FTP_USER and FTP_PASS)".to_string(),
            ))
        }
    }

    /// parses a marks section map of the form `puc1=puc1a,puc1b;puc2=puc2a`
    ///
    /// Course levels and roster names are lower-cased and trimmed.
    pub fn parse_marks_sections(spec: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let mut sections = BTreeMap::new();
        for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (level, rosters) = entry.split_once('=').ok_or_else(|| {
                SchoolError::Config(format!("invalid marks section entry: {}", entry))
            })?;
            let rosters: Vec<String> = rosters
                .split(',')
                .map(|r| r.trim().to_lowercase())
                .filter(|r| !r.is_empty())
                .collect();
            sections.insert(level.trim().to_lowercase(), rosters);
        }
        Ok(sections)
    }
}
