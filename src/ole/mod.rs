/// Constants for the compound file format
pub mod consts;

/// Compound file reader
mod file;

/// Property set stream decoding
mod property;

/// Compound file generator for tests
#[cfg(test)]
pub(crate) mod fixture;

// Re-export public types for convenient access
pub use file::{DirectoryEntry, EntryKind, OleFile, is_compound_file};
pub use property::{PropertySet, PropertyValue};

#[cfg(test)]
pub(crate) use property::{build_property_set, lpstr};
