//! The pluggable object-ID-to-object-root mapping used by an OCFL storage root.
//!
//! Concrete strategies (flat-direct, hashed-n-tuple, …) are a caller's concern; this
//! crate only owns the extension point they plug into.

use serde::Deserialize;
use strum_macros::{Display as EnumDisplay, EnumString};

use crate::error::Result;

/// Names of the storage layout extensions defined by the OCFL extensions registry.
/// Naming a layout does not imply this crate implements it — see the module docs.
#[derive(Deserialize, Debug, Copy, Clone, PartialEq, Eq, EnumString, EnumDisplay)]
pub enum LayoutExtensionName {
    #[strum(serialize = "0002-flat-direct-storage-layout")]
    #[serde(rename = "0002-flat-direct-storage-layout")]
    FlatDirectLayout,
    #[strum(serialize = "0003-hash-and-id-n-tuple-storage-layout")]
    #[serde(rename = "0003-hash-and-id-n-tuple-storage-layout")]
    HashedNTupleObjectIdLayout,
    #[strum(serialize = "0004-hashed-n-tuple-storage-layout")]
    #[serde(rename = "0004-hashed-n-tuple-storage-layout")]
    HashedNTupleLayout,
}

/// Maps an object ID to a path relative the storage root. Implementations of the
/// OCFL storage layout extensions (0002, 0003, 0004, …) live outside this crate;
/// callers that need object-root discovery supply their own `LayoutExtension`.
pub trait LayoutExtension: std::fmt::Debug {
    /// The registered name of this layout extension.
    fn name(&self) -> LayoutExtensionName;

    /// Maps an object ID to a path relative the storage root.
    fn map_object_id(&self, object_id: &str) -> Result<String>;
}
