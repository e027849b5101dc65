use std::io::{self, Cursor};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, instrument, warn};

use super::{file_name, parent, Connector, Session};
use crate::{Result, SchoolError, StoreConfig};

// reply codes meaning "no such file or directory" (or not accessible) on most servers
const FILE_UNAVAILABLE: u32 = 550;
const FILE_BUSY: u32 = 450;
const MKDIR_EXISTS: u32 = 521;

/// Opens a new, logged in FTP connection for every session.
///
/// There is no pooling: sessions end with a `QUIT` when they are dropped.
#[derive(Debug, Clone)]
pub struct FtpConnector {
    config: StoreConfig,
}

impl FtpConnector {
    /// creates a connector for the host and credentials in `config`
    pub fn new(config: &StoreConfig) -> Self {
        FtpConnector {
            config: config.clone(),
        }
    }

    fn resolve(&self) -> Result<SocketAddr> {
        (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|e| {
                SchoolError::store(format!("could not resolve {}", &self.config.host), e)
            })?
            .next()
            .ok_or_else(|| {
                SchoolError::store(
                    "resolve",
                    format!("no address found for {}", &self.config.host),
                )
            })
    }
}

impl Connector for FtpConnector {
    type Session = FtpSession;

    #[instrument(skip(self), fields(host = %self.config.host))]
    fn connect(&self) -> Result<FtpSession> {
        let (user, password) = self.config.credentials()?;
        let addr = self.resolve()?;
        let timeout = self.config.timeout;

        let mut stream = FtpStream::connect_timeout(addr, timeout)
            .map_err(|e| ftp_error("connect", e))?;
        set_timeouts(&stream, timeout).map_err(|e| SchoolError::store("socket timeouts", e))?;
        stream
            .login(user, password)
            .map_err(|e| ftp_error("login", e))?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| ftp_error("binary mode", e))?;
        debug!("ftp session opened");

        Ok(FtpSession { stream })
    }
}

fn set_timeouts(stream: &FtpStream, timeout: Duration) -> io::Result<()> {
    stream.get_ref().set_read_timeout(Some(timeout))?;
    stream.get_ref().set_write_timeout(Some(timeout))
}

/// One logged in FTP control connection
pub struct FtpSession {
    stream: FtpStream,
}

impl FtpSession {
    /// true if `path` shows up in the name listing of its parent directory
    fn listed(&mut self, path: &str) -> Result<bool> {
        let dir = parent(path).unwrap_or(".");
        let name = file_name(path);
        match self.stream.nlst(Some(dir)) {
            Ok(entries) => Ok(entries.iter().any(|e| file_name(e) == name)),
            Err(e) if is_unavailable(&e) => Ok(false),
            Err(e) => Err(ftp_error(format!("list {}", dir), e)),
        }
    }
}

impl Session for FtpSession {
    fn exists(&mut self, path: &str) -> Result<bool> {
        self.listed(path)
    }

    fn retrieve(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        if !self.exists(path)? {
            return Ok(None);
        }
        match self.stream.retr_as_buffer(path) {
            Ok(buf) => Ok(Some(buf.into_inner())),
            Err(e) if is_unavailable(&e) => {
                warn!("{} is listed but could not be retrieved: {}", path, e);
                Ok(None)
            }
            Err(e) => Err(ftp_error(format!("retrieve {}", path), e)),
        }
    }

    fn store(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        let mut reader = Cursor::new(bytes);
        self.stream
            .put_file(path, &mut reader)
            .map_err(|e| ftp_error(format!("store {}", path), e))?;
        Ok(())
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>> {
        match self.stream.nlst(Some(dir)) {
            Ok(entries) => Ok(entries
                .iter()
                .map(|e| file_name(e).to_string())
                .filter(|e| e != "." && e != "..")
                .collect()),
            Err(e) if is_unavailable(&e) => {
                Err(SchoolError::NotFound(format!("directory {} not found", dir)))
            }
            Err(e) => Err(ftp_error(format!("list {}", dir), e)),
        }
    }

    fn make_dir(&mut self, path: &str) -> Result<bool> {
        // the working directory is never changed, relative paths stay relative to the login dir
        if self.listed(path)? {
            return Ok(false);
        }
        match self.stream.mkdir(path) {
            Ok(()) => Ok(true),
            // some servers answer 550 instead of 521 when the directory already exists
            Err(FtpError::UnexpectedResponse(resp))
                if resp.status.code() == MKDIR_EXISTS || resp.status.code() == FILE_UNAVAILABLE =>
            {
                Ok(false)
            }
            Err(e) => Err(ftp_error(format!("mkdir {}", path), e)),
        }
    }

    fn remove(&mut self, path: &str) -> Result<bool> {
        match self.stream.rm(path) {
            Ok(()) => Ok(true),
            Err(e) if is_unavailable(&e) => Ok(false),
            Err(e) => Err(ftp_error(format!("delete {}", path), e)),
        }
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        if let Err(e) = self.stream.quit() {
            debug!("ftp quit failed: {}", e);
        }
    }
}

fn is_unavailable(e: &FtpError) -> bool {
    match e {
        FtpError::UnexpectedResponse(resp) => {
            let code = resp.status.code();
            code == FILE_UNAVAILABLE || code == FILE_BUSY
        }
        _ => false,
    }
}

/// maps FTP errors onto the store's error taxonomy, keeping timeouts distinct
fn ftp_error(context: impl Into<String>, e: FtpError) -> SchoolError {
    let context = context.into();
    match e {
        FtpError::ConnectionError(io)
            if io.kind() == io::ErrorKind::TimedOut || io.kind() == io::ErrorKind::WouldBlock =>
        {
            SchoolError::Timeout(format!("{}: {}", context, io))
        }
        other => SchoolError::store(context, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeouts_map_to_timeout() {
        let timed_out = FtpError::ConnectionError(io::ErrorKind::TimedOut.into());
        assert!(matches!(ftp_error("retrieve", timed_out), SchoolError::Timeout(_)));

        let would_block = FtpError::ConnectionError(io::ErrorKind::WouldBlock.into());
        assert!(matches!(ftp_error("store", would_block), SchoolError::Timeout(_)));
    }

    #[test]
    fn other_connection_errors_are_store_errors() {
        let refused = FtpError::ConnectionError(io::ErrorKind::ConnectionRefused.into());
        match ftp_error("connect", refused) {
            SchoolError::Store { context, .. } => assert_eq!(context, "connect"),
            other => panic!("expected a store error, got {:?}", other),
        }
    }
}
