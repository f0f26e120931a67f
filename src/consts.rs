//! Fixed names and values defined by the OCFL v1.0 specification.

pub const OBJECT_NAMASTE_FILE: &str = "0=ocfl_object_1.0";
pub const OBJECT_NAMASTE_CONTENTS: &str = "ocfl_object_1.0\n";
pub const ROOT_NAMASTE_FILE: &str = "0=ocfl_1.0";
pub const ROOT_NAMASTE_CONTENTS: &str = "ocfl_1.0\n";

pub const INVENTORY_FILE: &str = "inventory.json";
pub const INVENTORY_SIDECAR_PREFIX: &str = "inventory.json.";
pub const INVENTORY_TYPE: &str = "https://ocfl.io/1.0/spec/#inventory";

pub const OCFL_LAYOUT_FILE: &str = "ocfl_layout.json";
pub const EXTENSIONS_DIR: &str = "extensions";
pub const EXTENSIONS_CONFIG_FILE: &str = "config.json";

pub const DEFAULT_CONTENT_DIR: &str = "content";

/// Reserved subdirectory (relative the object root) that houses the mutable HEAD extension.
pub const MUTABLE_HEAD_EXT_DIR: &str = "extensions/0005-mutable-head";
pub const MUTABLE_HEAD_EXTENSION_NAME: &str = "0005-mutable-head";

/// Object-root entries tolerated alongside version directories by the validator.
pub const RESERVED_ROOT_ENTRIES: &[&str] =
    &[OBJECT_NAMASTE_FILE, INVENTORY_FILE, EXTENSIONS_DIR, "logs"];

/// Conservative path length cap (bytes) enforced by C2's path-safety checks.
/// spec.md names "length caps" as a requirement without a concrete figure; see
/// DESIGN.md's Open Question resolutions for why 4096 was chosen.
pub const MAX_PATH_LENGTH: usize = 4096;
