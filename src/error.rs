use core::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::{error, io};

use thiserror::Error;

use crate::path::{InventoryPath, VersionNum};

pub type Result<T, E = OcflError> = core::result::Result<T, E>;

/// Errors produced by the OCFL object engine.
#[derive(Error)]
pub enum OcflError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid inventory: {0}")]
    InvalidInventory(String),

    #[error("Path constraint violated: {0}")]
    PathConstraint(String),

    #[error("File already exists at {0}. Use the overwrite option if you wish to replace it.")]
    Overwrite(String),

    #[error("Fixity mismatch for {path}: expected {expected}, computed {actual}")]
    FixityMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Object {object_id} was modified concurrently; refusing to commit")]
    ObjectOutOfSync { object_id: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Object {object_id} is corrupt: {message}")]
    CorruptObject { object_id: String, message: String },

    #[error("{0}")]
    Io(io::Error),

    #[error("{0}")]
    Wrapped(Box<dyn error::Error + Send + Sync>),
}

/// Constructs an `OcflError::NotFound` for an object, optionally scoped to a version.
pub fn not_found(object_id: &str, version_num: Option<VersionNum>) -> OcflError {
    match version_num {
        Some(version) => OcflError::NotFound(format!("Object {} version {}", object_id, version)),
        None => OcflError::NotFound(format!("Object {}", object_id)),
    }
}

/// Constructs an `OcflError::PathConstraint` for a rejected logical or content path.
pub fn path_constraint(path: &impl InventoryPath, reason: &str) -> OcflError {
    OcflError::PathConstraint(format!("{}: {}", path, reason))
}

impl Debug for OcflError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<io::Error> for OcflError {
    fn from(e: io::Error) -> Self {
        OcflError::Io(e)
    }
}

impl From<serde_json::Error> for OcflError {
    fn from(e: serde_json::Error) -> Self {
        OcflError::Wrapped(Box::new(e))
    }
}

impl From<walkdir::Error> for OcflError {
    fn from(e: walkdir::Error) -> Self {
        OcflError::Wrapped(Box::new(e))
    }
}
