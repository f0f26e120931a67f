//! A core engine for creating, updating, reading, and validating OCFL v1.0 objects.
//!
//! This crate implements the four tightly coupled subsystems that make up an OCFL
//! object engine: the inventory model and its invariants ([`inventory`]), the
//! version-building engine ([`updater`], [`addfile`]), the commit protocol
//! ([`commit`]), and the object validator ([`validate::object`]). Everything else --
//! concrete storage backends, storage-layout extensions, a public repository
//! façade, CLI, configuration loading -- is out of scope; this crate depends only
//! on the [`storage::Storage`] port and the [`layout::LayoutExtension`] extension
//! point those collaborators implement.
//!
//! An update flows caller -> [`updater::VersionUpdater`] / [`addfile::AddFileProcessor`]
//! (mutate a working inventory) -> [`commit::CommitEngine`] (stage, validate, install)
//! -> a new, immutable [`inventory::Inventory`] representing the object's new HEAD.
//! Validation flows [`validate::object`] reading via [`storage::Storage`], parsing
//! via [`codec`], and cross-checking digests via [`digest`] against the manifest.

pub mod addfile;
pub mod bimap;
pub mod codec;
pub mod commit;
pub mod consts;
pub mod digest;
pub mod error;
pub mod inventory;
pub mod layout;
pub mod path;
pub mod storage;
pub mod updater;
mod util;
pub mod validate;

pub use addfile::AddFileProcessor;
pub use commit::CommitEngine;
pub use digest::{DigestAlgorithm, HexDigest};
pub use error::{OcflError, Result};
pub use inventory::{Inventory, InventoryBuilder, InventoryContext, User, Version};
pub use path::{ContentPath, LogicalPath, VersionNum};
pub use storage::{FsStorage, Storage};
pub use updater::{UpdateOptions, VersionUpdater};
pub use validate::{Issue, IssueCode, Severity, ValidationResults};
