//! Flat directory of uploaded database files
//!
//! Every name handed to the store must be a single visible path component.
//! Listing applies the same check, so anything listed can be selected,
//! renamed and deleted. Listing also only reports names with a recognized
//! database extension or no extension at all.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{InspectorError, InspectorResult};

/// Extensions accepted for database files, compared case-insensitively.
pub const DATABASE_EXTENSIONS: [&str; 3] = ["db", "sqlite", "sqlite3"];

/// Longest accepted file name, in bytes.
const MAX_NAME_BYTES: usize = 255;

/// Names that collide with fixed routes under `/databases/`.
pub const RESERVED_NAMES: [&str; 2] = ["upload", "select"];

lazy_static! {
    // One component: no separators, no control characters, no leading dot.
    static ref FILE_NAME: Regex = Regex::new(r"^[^./\\\p{Cc}][^/\\\p{Cc}]*$")
        .expect("file name pattern is valid");
}

/// A database file held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDatabaseFile {
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Extension of `name` without the dot, if any.
pub fn extension_of(name: &str) -> Option<&str> {
    Path::new(name).extension().and_then(|ext| ext.to_str())
}

/// True for extensionless names and for the database extensions.
pub fn is_recognized_name(name: &str) -> bool {
    match Path::new(name).extension() {
        None => true,
        Some(ext) => ext
            .to_str()
            .map(|ext| DATABASE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
            .unwrap_or(false),
    }
}

/// Rejects anything that is not a single, visible path component.
pub fn validate_file_name(name: &str) -> InspectorResult<()> {
    if name.len() > MAX_NAME_BYTES
        || !FILE_NAME.is_match(name)
        || RESERVED_NAMES.iter().any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(InspectorError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the backing directory when it does not exist yet.
    pub fn open(root: impl Into<PathBuf>) -> InspectorResult<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root).map_err(|e| InspectorError::io("create data dir", e))?;
        info!("File store ready at: {}", store.root.display());
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry(&self, name: &str) -> StoredDatabaseFile {
        StoredDatabaseFile {
            name: name.to_string(),
            path: self.root.join(name),
        }
    }

    /// Recognized database files, sorted by name.
    pub fn list(&self) -> InspectorResult<Vec<StoredDatabaseFile>> {
        let entries = fs::read_dir(&self.root).map_err(|e| InspectorError::io("list", e))?;
        let mut files = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| InspectorError::io("list", e))?;
            let file_type = entry.file_type().map_err(|e| InspectorError::io("list", e))?;
            if !file_type.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_file_name(&name).is_err() || !is_recognized_name(&name) {
                continue;
            }
            files.push(StoredDatabaseFile {
                path: entry.path(),
                name,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Listed {} database files", files.len());
        Ok(files)
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_file_name(name).is_ok() && self.root.join(name).is_file()
    }

    /// Look up an existing file by name.
    pub fn resolve(&self, name: &str) -> InspectorResult<StoredDatabaseFile> {
        validate_file_name(name)?;
        if !is_recognized_name(name) || !self.root.join(name).is_file() {
            return Err(InspectorError::DatabaseNotFound(name.to_string()));
        }
        Ok(self.entry(name))
    }

    /// Create a new, empty file. Fails with `AlreadyExists` instead of truncating.
    pub fn create_new(&self, name: &str) -> InspectorResult<(StoredDatabaseFile, fs::File)> {
        validate_file_name(name)?;
        let entry = self.entry(name);
        match fs::OpenOptions::new().write(true).create_new(true).open(&entry.path) {
            Ok(file) => Ok((entry, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(InspectorError::AlreadyExists(name.to_string()))
            }
            Err(e) => Err(InspectorError::io("store upload", e)),
        }
    }

    pub fn rename(&self, old_name: &str, new_name: &str) -> InspectorResult<StoredDatabaseFile> {
        let old = self.resolve(old_name)?;
        validate_file_name(new_name)?;
        if !is_recognized_name(new_name) {
            return Err(InspectorError::InvalidFileName(new_name.to_string()));
        }
        if old_name == new_name {
            return Ok(old);
        }
        let new = self.entry(new_name);
        if new.path.exists() {
            return Err(InspectorError::AlreadyExists(new_name.to_string()));
        }

        fs::rename(&old.path, &new.path).map_err(|e| InspectorError::io("rename", e))?;
        info!("Renamed database {} -> {}", old_name, new_name);
        Ok(new)
    }

    pub fn delete(&self, name: &str) -> InspectorResult<()> {
        let entry = self.resolve(name)?;
        fs::remove_file(&entry.path).map_err(|e| InspectorError::io("delete", e))?;
        info!("Deleted database {}", name);
        Ok(())
    }

    /// Remove a file written by a failed upload. Missing files are fine.
    pub(crate) fn discard(&self, entry: &StoredDatabaseFile) -> InspectorResult<()> {
        match fs::remove_file(&entry.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InspectorError::io("discard upload", e)),
        }
    }
}
