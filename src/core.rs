use std::io;

use thiserror::Error;

pub mod utils;

/// Names of the top-level keys every store exposes directly under the virtualization root.
pub const WELL_KNOWN_ROOTS: [&str; 5] = [
    "HKEY_CLASSES_ROOT",
    "HKEY_CURRENT_USER",
    "HKEY_LOCAL_MACHINE",
    "HKEY_USERS",
    "HKEY_CURRENT_CONFIG",
];

pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure raised by a backing store while resolving or reading a path.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn access_denied(path: impl Into<String>) -> Self {
        Self::AccessDenied(path.into())
    }
}

/// What a path resolves to in the backing store.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Key,
    Value(u64),
}

impl NodeKind {
    pub fn is_key(&self) -> bool {
        matches!(self, NodeKind::Key)
    }

    pub fn is_value(&self) -> bool {
        matches!(self, NodeKind::Value(_))
    }

    /// Byte size presented to the host; keys are always zero.
    pub fn size(&self) -> u64 {
        match self {
            NodeKind::Key => 0,
            NodeKind::Value(size) => *size,
        }
    }
}

/// Immediate children of a key, in discovery order.
///
/// An unnamed (default) value is reported with an empty name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children {
    pub subkeys: Vec<String>,
    pub values: Vec<(String, u64)>,
}

/// The contract a hierarchical key-value store fulfils to be projected.
///
/// Paths are relative to the virtualization root, components separated by `\`.
/// The empty path is the root itself; a single component must name one of
/// [`WELL_KNOWN_ROOTS`].
pub trait BackingStore: Send + Sync {
    /// Resolves `path` to a key or a value.
    /// Returns `Ok(None)` when neither exists.
    fn exists(&self, path: &str) -> StoreResult<Option<NodeKind>>;

    /// Lists subkeys and values of the key at `path`.
    /// For the root it returns the well-known roots and no values.
    fn enumerate_children(&self, path: &str) -> StoreResult<Children>;

    /// Fills `dest` from the start of the value at `path`.
    /// Bytes past the end of the value are zeroed.
    /// Returns `false` if `path` is not a value.
    fn read_value(&self, path: &str, dest: &mut [u8]) -> StoreResult<bool>;

    /// Fills `dest` with the value's bytes starting at `offset`.
    ///
    /// The provided implementation reads the whole value; stores with random access
    /// should override it.
    fn read_value_at(&self, path: &str, offset: u64, dest: &mut [u8]) -> StoreResult<bool> {
        if offset == 0 {
            return self.read_value(path, dest);
        }
        let size = match self.exists(path)? {
            Some(NodeKind::Value(size)) => size,
            _ => return Ok(false),
        };
        let size = usize::try_from(size).map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
        let mut whole = vec![0u8; size];
        if !self.read_value(path, &mut whole)? {
            return Ok(false);
        }
        dest.fill(0);
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(whole.len());
        let available = &whole[start..];
        let n = available.len().min(dest.len());
        dest[..n].copy_from_slice(&available[..n]);
        Ok(true)
    }
}
