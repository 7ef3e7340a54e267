//! On-disk persistence of the registry document

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use log::{debug, warn};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use sha2::{Digest, Sha256};

use super::document::RegistryDocument;
use crate::error::{BurrowError, Result};

/// Reads and writes one registry document at a fixed path.
#[derive(Debug, Clone)]
pub struct PersistentStore {
    path: PathBuf,
}

impl PersistentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents; an absent file reads as no bytes.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn read(&self) -> Result<RegistryDocument> {
        parse_document(&self.read_bytes()?, &self.path)
    }

    /// Checksum of the file as it is on disk right now.
    pub fn checksum(&self) -> Result<String> {
        Ok(checksum(&self.read_bytes()?))
    }

    /// Replace the file with `document`, returning the checksum of what was
    /// written.
    ///
    /// The exclusive lock is advisory and only held while writing, and
    /// readers do not take it, so a concurrent reader can observe a
    /// truncated or half-written file and fail with a parse error.
    pub fn write(&self, document: &RegistryDocument) -> Result<String> {
        let bytes = serialize_document(document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        FileExt::lock_exclusive(&file)?;
        let written = write_locked(&mut file, &bytes);
        if let Err(e) = FileExt::unlock(&file) {
            warn!("failed to unlock {}: {}", self.path.display(), e);
        }
        written?;

        debug!("wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(checksum(&bytes))
    }

    /// Parse a document from any path, with the same empty-file rules.
    pub fn load(path: &Path) -> Result<RegistryDocument> {
        PersistentStore::new(path).read()
    }
}

fn write_locked(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.set_len(0)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Sorted keys, four-space indentation, trailing newline.
pub fn serialize_document(document: &RegistryDocument) -> Result<Vec<u8>> {
    // Going through `Value` sorts every object's keys, including the
    // document's own fields and any flattened extras.
    let value = serde_json::to_value(document)?;
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

pub fn parse_document(bytes: &[u8], path: &Path) -> Result<RegistryDocument> {
    if bytes.is_empty() {
        return Ok(RegistryDocument::default());
    }
    serde_json::from_slice(bytes).map_err(|source| BurrowError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

/// Change-detection token for a file's contents. Not a security measure.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Fold `incoming` into `existing`. An incoming entry whose id is already
/// present replaces that entry in place; the others are appended in
/// incoming order. Entries without an id cannot be addressed and are
/// skipped.
pub fn merge(existing: &mut RegistryDocument, incoming: &RegistryDocument) {
    for entry in &incoming.container_list {
        let Some(id) = entry.id() else {
            warn!("skipping merged container entry without an id");
            continue;
        };
        match existing.position(id) {
            Some(index) => existing.container_list[index] = entry.clone(),
            None => existing.container_list.push(entry.clone()),
        }
    }
}
