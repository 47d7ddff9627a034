//! Per-scan memoization store.

use std::any::Any;
use std::collections::HashMap;

/// Well-known keys of the shared family preconditions.
pub mod keys {
    /// Start window carries a ZIP local file header
    pub const IS_ZIP: &str = "IsZIP";
    /// Entry names of the archive, `None` when it does not open
    pub const ZIP_ENTRIES: &str = "ZipEntries";
    /// Text of `[Content_Types].xml`, `None` when the archive does not open
    pub const CONTENT_TYPES: &str = "OOXmlContentTypes";
    /// Text of the `mimetype` entry, `None` when the archive does not open
    pub const MIMETYPE: &str = "ZipMimeType";
    /// Start window carries the compound file signature
    pub const IS_OLE_CFS: &str = "IsOleCFS";
    /// Entry names of the compound file, `None` when it does not open
    pub const OLE_ENTRIES: &str = "OleEntries";
    /// Start window carries a RIFF header
    pub const IS_RIFF: &str = "IsRIFF";
    /// Start window carries an ISO base media `ftyp` box
    pub const IS_QUICKTIME: &str = "IsQuickTime";
    /// Start window carries an EBML header
    pub const IS_EBML: &str = "IsEBML";
    /// EBML header naming the `matroska` doctype
    pub const IS_MATROSKA: &str = "IsMatroska";
}

/// Case-insensitive map from key to an opaque value, owned by one scan job.
///
/// Sibling scanners of one container family use it to run an expensive
/// structural check once per job.
#[derive(Default)]
pub struct JobCache {
    entries: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl JobCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(key: &str) -> String {
        key.to_lowercase()
    }

    /// Store a value, replacing any previous one.
    pub fn set<T: Any + Send + Sync>(&mut self, key: &str, value: T) -> bool {
        self.set_with(key, value, true)
    }

    /// Store a value.
    ///
    /// Returns `false` and leaves the old value in place when the key exists
    /// and `replace` is not set.
    pub fn set_with<T: Any + Send + Sync>(&mut self, key: &str, value: T, replace: bool) -> bool {
        let key = Self::normalize(key);
        if !replace && self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, Box::new(value));
        true
    }

    /// Typed lookup. A missing key or a value of another type is `None`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.get_raw(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Untyped lookup.
    pub fn get_raw(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.entries.get(&Self::normalize(key)).map(|v| v.as_ref())
    }

    pub fn exists(&self, key: &str) -> bool {
        self.entries.contains_key(&Self::normalize(key))
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(&Self::normalize(key)).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for JobCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
