//! This module provides a read-only backing store that maps to an exported hive directory
//! on the host system.
//!
//! ### Layout
//! - Every well-known root is a directory directly under the store root. A missing one is
//!   treated as an empty key.
//! - Sub-directories are keys, regular files are values, the file length is the value size.
//! - A file named `@` holds the key's unnamed (default) value.
//!
//! Names resolve case-insensitively: an exact host match is tried first, then the parent
//! directory is scanned.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use tracing::debug;

use crate::core::utils::{self, DEFAULT_VALUE_NAME};
use crate::core::{BackingStore, Children, NodeKind, Result, StoreError, StoreResult, WELL_KNOWN_ROOTS};

/// A backing store reading keys and values from a directory tree.
///
/// The store never writes to the host; it only resolves, lists and reads.
///
/// ### Example:
/// ```no_run
/// use regfs_kit::{BackingStore, DirStore};
///
/// let store = DirStore::new("/var/lib/regfs/hive").unwrap();
/// let children = store.enumerate_children("HKEY_CURRENT_USER").unwrap();
/// println!("{:?}", children.subkeys);
/// ```
#[derive(Debug)]
pub struct DirStore {
    root: PathBuf, // host-related absolute path
}

impl DirStore {
    /// Opens a store rooted at `root`.
    /// * `root` must be an existing directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(anyhow!("invalid hive path: empty"));
        }
        if !root.is_dir() {
            return Err(anyhow!("{:?} is not a directory", root));
        }
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    /// Returns the hive directory on the host.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Maps a store path to an existing host path.
    /// Returns `Ok(None)` when some component does not exist or is a symbolic link, so
    /// resolution never leaves the hive.
    fn locate(&self, path: &str) -> StoreResult<Option<PathBuf>> {
        let components = utils::split(path);
        let Some((first, rest)) = components.split_first() else {
            return Ok(Some(self.root.clone()));
        };
        let Some(root_name) = utils::well_known_root(first) else {
            return Ok(None);
        };

        let mut current = self.root.join(root_name);
        if is_symlink(&current).map_err(|e| map_io(path, e))? {
            debug!(path, "refusing to follow a symbolic link");
            return Ok(None);
        }
        for component in rest {
            if *component == "." || *component == ".." {
                return Ok(None);
            }
            let exact = current.join(component);
            let next = match fs::symlink_metadata(&exact) {
                Ok(meta) if meta.file_type().is_symlink() => None,
                Ok(_) => Some(exact),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    match Self::find_case_insensitive(&current, component).map_err(|e| map_io(path, e))? {
                        Some(found) if is_symlink(&found).map_err(|e| map_io(path, e))? => None,
                        Some(found) => Some(found),
                        None => return Ok(None),
                    }
                }
                Err(e) => return Err(map_io(path, e)),
            };
            match next {
                Some(next) => current = next,
                None => {
                    debug!(path, "refusing to follow a symbolic link");
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }

    /// Resolves `path` to a value file, or `None` if it is not a value.
    fn open_value(&self, path: &str) -> StoreResult<Option<fs::File>> {
        if !self.exists(path)?.is_some_and(|kind| kind.is_value()) {
            return Ok(None);
        }
        let Some(host) = self.locate(path)? else {
            return Ok(None);
        };
        fs::File::open(&host).map(Some).map_err(|e| map_io(path, e))
    }

    fn find_case_insensitive(dir: &Path, name: &str) -> io::Result<Option<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            if let Some(candidate) = entry.file_name().to_str() {
                if utils::names_equal(candidate, name) {
                    return Ok(Some(entry.path()));
                }
            }
        }
        Ok(None)
    }
}

/// A missing path is not a link.
fn is_symlink(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(meta.file_type().is_symlink()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Reads until `dest` is full or the reader runs dry, zeroing the rest.
fn fill_from<R: Read>(path: &str, mut reader: R, dest: &mut [u8]) -> StoreResult<()> {
    let mut filled = 0;
    while filled < dest.len() {
        let n = reader
            .read(&mut dest[filled..])
            .map_err(|e| map_io(path, e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    dest[filled..].fill(0);
    Ok(())
}

fn map_io(path: &str, e: io::Error) -> StoreError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        StoreError::access_denied(path)
    } else {
        StoreError::Io(e)
    }
}

impl BackingStore for DirStore {
    fn exists(&self, path: &str) -> StoreResult<Option<NodeKind>> {
        let components = utils::split(path);
        match components.len() {
            0 => return Ok(Some(NodeKind::Key)),
            1 => return Ok(utils::well_known_root(components[0]).map(|_| NodeKind::Key)),
            _ => {}
        }

        let Some(host) = self.locate(path)? else {
            return Ok(None);
        };
        match fs::symlink_metadata(&host) {
            Ok(meta) if meta.is_dir() => Ok(Some(NodeKind::Key)),
            Ok(meta) if meta.is_file() => Ok(Some(NodeKind::Value(meta.len()))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io(path, e)),
        }
    }

    fn enumerate_children(&self, path: &str) -> StoreResult<Children> {
        if utils::is_virtual_root(path) {
            return Ok(Children {
                subkeys: WELL_KNOWN_ROOTS.iter().map(|s| s.to_string()).collect(),
                values: Vec::new(),
            });
        }
        if !self.exists(path)?.is_some_and(|kind| kind.is_key()) {
            return Err(StoreError::not_found(path));
        }
        let Some(host) = self.locate(path)? else {
            return Ok(Children::default());
        };

        let entries = match fs::read_dir(&host) {
            Ok(entries) => entries,
            // a well-known root without a directory is an empty key
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Children::default()),
            Err(e) => return Err(map_io(path, e)),
        };

        let mut children = Children::default();
        for entry in entries {
            let entry = entry.map_err(|e| map_io(path, e))?;
            let Ok(name) = entry.file_name().into_string() else {
                debug!(path, "skipping entry with a non-UTF-8 name");
                continue;
            };
            let meta = entry.metadata().map_err(|e| map_io(path, e))?;
            if meta.is_dir() {
                children.subkeys.push(name);
            } else if meta.is_file() {
                let name = if name == DEFAULT_VALUE_NAME { String::new() } else { name };
                children.values.push((name, meta.len()));
            }
        }
        Ok(children)
    }

    fn read_value(&self, path: &str, dest: &mut [u8]) -> StoreResult<bool> {
        let Some(file) = self.open_value(path)? else {
            return Ok(false);
        };
        fill_from(path, file.take(dest.len() as u64), dest)?;
        Ok(true)
    }

    fn read_value_at(&self, path: &str, offset: u64, dest: &mut [u8]) -> StoreResult<bool> {
        let Some(mut file) = self.open_value(path)? else {
            return Ok(false);
        };
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| map_io(path, e))?;
        fill_from(path, file.take(dest.len() as u64), dest)?;
        Ok(true)
    }
}
