use std::io::{Error, ErrorKind};
use std::path::Path;

use sled::{Db, Tree};
use tracing::debug;

use super::{parent, Connector, Session};
use crate::{Result, SchoolError};

const FILES_TREE: &str = "files";
const DIRS_TREE: &str = "dirs";

/// A remote filesystem emulated inside an embedded sled database.
///
/// File contents live in one tree keyed by full path, directories in another. The emulation
/// keeps the FTP semantics the document store depends on: `make_dir` is not recursive and a
/// file cannot be stored into a directory that does not exist.
#[derive(Debug, Clone)]
pub struct SledConnector {
    db: Db,
}

impl SledConnector {
    /// opens (or creates) the database in `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(SledConnector {
            db: sled::open(dir)?,
        })
    }

    /// a throw-away database that is deleted when dropped
    pub fn temporary() -> Result<Self> {
        Ok(SledConnector {
            db: sled::Config::new().temporary(true).open()?,
        })
    }
}

impl Connector for SledConnector {
    type Session = SledSession;

    fn connect(&self) -> Result<SledSession> {
        Ok(SledSession {
            files: self.db.open_tree(FILES_TREE)?,
            dirs: self.db.open_tree(DIRS_TREE)?,
        })
    }
}

/// A session on a [`SledConnector`]
pub struct SledSession {
    files: Tree,
    dirs: Tree,
}

impl SledSession {
    fn dir_exists(&self, dir: &str) -> Result<bool> {
        let dir = dir.trim_end_matches('/');
        if dir.is_empty() || dir == "." {
            return Ok(true);
        }
        Ok(self.dirs.contains_key(dir)?)
    }

    fn require_parent(&self, path: &str, op: &str) -> Result<()> {
        match parent(path) {
            Some(dir) if !self.dir_exists(dir)? => Err(SchoolError::store(
                format!("{} {}", op, path),
                Error::new(ErrorKind::NotFound, format!("directory {} does not exist", dir)),
            )),
            _ => Ok(()),
        }
    }
}

impl Session for SledSession {
    fn exists(&mut self, path: &str) -> Result<bool> {
        Ok(self.files.contains_key(path)?)
    }

    fn retrieve(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.get(path)?.map(|v| v.to_vec()))
    }

    fn store(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.require_parent(path, "store")?;
        self.files.insert(path, bytes)?;
        self.files.flush()?;
        Ok(())
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>> {
        if !self.dir_exists(dir)? {
            return Err(SchoolError::NotFound(format!("directory {} not found", dir)));
        }
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut names = vec![];
        for entry in self.files.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry?;
            let key = String::from_utf8_lossy(&key);
            let rest = &key[prefix.len()..];
            if !rest.contains('/') {
                names.push(rest.to_string());
            }
        }
        Ok(names)
    }

    fn make_dir(&mut self, path: &str) -> Result<bool> {
        let path = path.trim_end_matches('/');
        if self.dir_exists(path)? {
            return Ok(false);
        }
        self.require_parent(path, "mkdir")?;
        self.dirs.insert(path, Vec::<u8>::new())?;
        debug!("sled directory created {}", path);
        Ok(true)
    }

    fn remove(&mut self, path: &str) -> Result<bool> {
        let existed = self.files.remove(path)?.is_some();
        self.files.flush()?;
        Ok(existed)
    }
}
