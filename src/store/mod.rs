//! This module provides the document store: whole JSON documents addressed by path on a remote
//! filesystem.
//!
//! A [`Connector`] opens a fresh [`Session`] against the remote filesystem, and the
//! [`DocStore`] opens (and drops) one session per operation. Two connectors are implemented,
//! [`FtpConnector`] for the school's FTP server and [`SledConnector`], which emulates the same
//! filesystem semantics inside an embedded [`sled`] database for local runs and tests.
//!
//! [`sled`]: https://docs.rs/sled/latest/sled/
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::{Result, SchoolError};

mod ftp;
mod sled;

pub use self::ftp::{FtpConnector, FtpSession};
pub use self::sled::{SledConnector, SledSession};

/// A factory for sessions against a remote filesystem.
///
/// Implementations decide whether a session is a brand new connection or something pooled; the
/// [`DocStore`] only relies on getting a usable session per call.
pub trait Connector: Send + Sync + 'static {
    /// the session type produced by this connector
    type Session: Session;

    /// opens a new session
    ///
    /// # Errors
    /// `SchoolError::Config` if credentials are missing, `SchoolError::Timeout` if the remote host
    /// did not answer in time, and `SchoolError::Store` for any other connection failure
    fn connect(&self) -> Result<Self::Session>;
}

/// The primitive file operations of one remote session. All paths are full remote paths.
pub trait Session {
    /// returns true if a file exists at `path`
    fn exists(&mut self, path: &str) -> Result<bool>;

    /// downloads the whole file at `path`
    ///
    /// Returns `None` if the file does not exist or cannot be read.
    fn retrieve(&mut self, path: &str) -> Result<Option<Vec<u8>>>;

    /// uploads `bytes` as the full content of `path`, replacing any existing file.
    /// The parent directory must already exist.
    fn store(&mut self, path: &str, bytes: &[u8]) -> Result<()>;

    /// lists the names (not paths) of the entries directly inside `dir`
    ///
    /// # Errors
    /// `SchoolError::NotFound` if `dir` does not exist
    fn list(&mut self, dir: &str) -> Result<Vec<String>>;

    /// creates a single directory whose parent already exists.
    /// Returns false if the directory was already there.
    fn make_dir(&mut self, path: &str) -> Result<bool>;

    /// deletes the file at `path`, returns false if there was nothing to delete
    fn remove(&mut self, path: &str) -> Result<bool>;
}

/// The remote document store.
///
/// Every public operation opens its own session through the [`Connector`], so a `DocStore` is
/// cheap to clone and safe to share between threads. Writers inside this process can be
/// serialized per path with [`DocStore::with_locked`]; writers in other processes are not
/// coordinated and the last successful upload wins.
pub struct DocStore<C: Connector> {
    connector: Arc<C>,
    // one mutex per remote path that has been mutated by this process
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl<C: Connector> Clone for DocStore<C> {
    fn clone(&self) -> Self {
        DocStore {
            connector: Arc::clone(&self.connector),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<C: Connector> DocStore<C> {
    /// creates a store that opens its sessions through `connector`
    pub fn new(connector: C) -> Self {
        DocStore {
            connector: Arc::new(connector),
            locks: Arc::new(DashMap::new()),
        }
    }

    /// reads the document at `path`.
    ///
    /// A missing file, or one that does not decode into `T`, yields `T::default()`, so callers
    /// treat "missing" and "empty" the same way.
    ///
    /// # Errors
    /// connection, login and timeout failures are returned
    #[instrument(skip(self))]
    pub fn read<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let mut session = self.connector.connect()?;
        match session.retrieve(path)? {
            None => Ok(T::default()),
            Some(bytes) => match decode(path, &bytes) {
                Ok(doc) => Ok(doc),
                Err(e) => {
                    warn!("{}, falling back to an empty document", e);
                    Ok(T::default())
                }
            },
        }
    }

    /// reads a document that is required to exist.
    ///
    /// Returns `Ok(None)` if there is no file at `path`.
    ///
    /// # Errors
    /// `SchoolError::Decode` if the file holds invalid JSON for `T`, plus any session error
    #[instrument(skip(self))]
    pub fn read_existing<T>(&self, path: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut session = self.connector.connect()?;
        match session.retrieve(path)? {
            None => Ok(None),
            Some(bytes) => decode(path, &bytes).map(Some),
        }
    }

    /// serializes `doc` as indented JSON and uploads it as the full content of `path`.
    /// Missing parent directories are created first.
    #[instrument(skip(self, doc))]
    pub fn write<T>(&self, path: &str, doc: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let mut session = self.connector.connect()?;
        if let Some(dir) = parent(path) {
            ensure_directory_with(&mut session, dir)?;
        }
        session.store(path, &bytes)?;
        debug!(bytes = bytes.len(), "document written");
        Ok(())
    }

    /// returns true if a file exists at `path`
    pub fn exists(&self, path: &str) -> Result<bool> {
        self.connector.connect()?.exists(path)
    }

    /// creates the directory at `path` and all of its missing ancestors.
    /// Directories that already exist are not an error.
    #[instrument(skip(self))]
    pub fn ensure_directory(&self, path: &str) -> Result<()> {
        let mut session = self.connector.connect()?;
        ensure_directory_with(&mut session, path)
    }

    /// lists the file names inside `dir`
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        self.connector.connect()?.list(dir)
    }

    /// deletes the file at `path`. Returns false if it did not exist.
    #[instrument(skip(self))]
    pub fn remove(&self, path: &str) -> Result<bool> {
        self.connector.connect()?.remove(path)
    }

    /// runs `f` while holding this process' write lock for every path in `paths`.
    ///
    /// Locks are taken in sorted order so overlapping multi-path callers cannot deadlock.
    pub fn with_locked<R, F>(&self, paths: &[&str], f: F) -> Result<R>
    where
        F: FnOnce() -> Result<R>,
    {
        let mut keys: Vec<&str> = paths.to_vec();
        keys.sort_unstable();
        keys.dedup();

        let locks: Vec<Arc<Mutex<()>>> = keys
            .iter()
            .map(|key| Arc::clone(self.locks.entry(key.to_string()).or_default().value()))
            .collect();
        let _guards: Vec<MutexGuard<'_, ()>> = locks
            .iter()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();

        f()
    }

    /// read-modify-write of the document at `path`.
    ///
    /// The current document (or `T::default()` when absent) is handed to `f`; if `f` succeeds the
    /// result is written back. If `f` fails nothing is written.
    pub fn mutate<T, R, F>(&self, path: &str, f: F) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> Result<R>,
    {
        self.with_locked(&[path], || {
            let mut doc: T = self.read(path)?;
            let out = f(&mut doc)?;
            self.write(path, &doc)?;
            Ok(out)
        })
    }

    /// like [`DocStore::mutate`] but for documents that must already exist.
    /// `missing` builds the error returned when there is no file at `path`.
    pub fn mutate_existing<T, R, F, M>(&self, path: &str, missing: M, f: F) -> Result<R>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(&mut T) -> Result<R>,
        M: FnOnce() -> SchoolError,
    {
        self.with_locked(&[path], || {
            let mut doc: T = self.read_existing(path)?.ok_or_else(missing)?;
            let out = f(&mut doc)?;
            self.write(path, &doc)?;
            Ok(out)
        })
    }
}

fn decode<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| SchoolError::Decode {
        path: path.to_string(),
        source,
    })
}

/// creates `path` one component at a time on an already open session
fn ensure_directory_with<S: Session>(session: &mut S, path: &str) -> Result<()> {
    let absolute = path.starts_with('/');
    let mut prefix = String::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if absolute || !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(component);
        if session.make_dir(&prefix)? {
            debug!("created remote directory {}", &prefix);
        }
    }
    Ok(())
}

/// joins a remote directory and a file name with exactly one `/` between them
pub fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// the directory portion of a remote path, `None` for paths without one
pub fn parent(path: &str) -> Option<&str> {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// the last component of a remote path
pub fn file_name(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_collapses_separators() {
        assert_eq!(join("/htdocs/classes", "a.json"), "/htdocs/classes/a.json");
        assert_eq!(join("/htdocs/classes/", "/a.json"), "/htdocs/classes/a.json");
        assert_eq!(join("", "a.json"), "/a.json");
        assert_eq!(join("rel", "a.json"), "rel/a.json");
    }

    #[test]
    fn parent_and_file_name() {
        assert_eq!(parent("/htdocs/classes/a.json"), Some("/htdocs/classes"));
        assert_eq!(parent("/a.json"), Some("/"));
        assert_eq!(parent("a.json"), None);
        assert_eq!(file_name("/htdocs/classes/a.json"), "a.json");
        assert_eq!(file_name("a.json"), "a.json");
        assert_eq!(file_name("/htdocs/classes/"), "classes");
    }

    #[derive(Default)]
    struct RecordingSession {
        made: Vec<String>,
    }

    impl Session for RecordingSession {
        fn exists(&mut self, _path: &str) -> Result<bool> {
            Ok(false)
        }
        fn retrieve(&mut self, _path: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        fn store(&mut self, _path: &str, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }
        fn list(&mut self, _dir: &str) -> Result<Vec<String>> {
            Ok(vec![])
        }
        fn make_dir(&mut self, path: &str) -> Result<bool> {
            self.made.push(path.to_string());
            Ok(true)
        }
        fn remove(&mut self, _path: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn directories_are_created_by_full_prefix() {
        let mut session = RecordingSession::default();
        ensure_directory_with(&mut session, "htdocs/classes").unwrap();
        assert_eq!(session.made, vec!["htdocs", "htdocs/classes"]);

        let mut session = RecordingSession::default();
        ensure_directory_with(&mut session, "/htdocs/classes/").unwrap();
        assert_eq!(session.made, vec!["/htdocs", "/htdocs/classes"]);
    }
}
