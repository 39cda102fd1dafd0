//! Virtualization root setup.
//!
//! A root is a plain directory carrying a marker file with the instance identifier. The
//! marker is written once, on first start, and verified on every start after that.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::Result;

/// Reserved name of the marker file directly under the virtualization root.
pub const MARKER_NAME: &str = ".regfs-id";

const MARKER_TMP_NAME: &str = ".regfs-id.tmp";

/// Makes sure a directory is usable as a virtualization root.
pub trait HostBootstrap {
    /// Returns the instance identifier stored under `root`, creating and tagging the root
    /// first if it has never been set up. Idempotent.
    fn ensure_root(&self, root: &Path) -> Result<Uuid>;
}

type Registration = Box<dyn Fn(&Path, &Uuid) -> Result<()> + Send + Sync>;

/// Bootstrap that tags the root with a marker file holding a random UUID.
///
/// An optional registration hook runs after the marker is written, on first setup only;
/// it is where a host integration announces the new root. If any step fails, everything
/// this call created is removed again (best effort) before the error is returned.
#[derive(Default)]
pub struct DirBootstrap {
    register: Option<Registration>,
}

impl DirBootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook that registers a freshly tagged root with the host.
    pub fn with_registration<F>(mut self, register: F) -> Self
    where
        F: Fn(&Path, &Uuid) -> Result<()> + Send + Sync + 'static,
    {
        self.register = Some(Box::new(register));
        self
    }

    /// Reads and verifies the marker under `root`.
    pub fn read_marker(root: &Path) -> Result<Uuid> {
        let marker = root.join(MARKER_NAME);
        let bytes = fs::read(&marker)?;
        let id = Uuid::from_slice(&bytes)
            .map_err(|_| anyhow!("corrupted root marker {:?}: {} bytes", marker, bytes.len()))?;
        if id.is_nil() {
            return Err(anyhow!("corrupted root marker {:?}: nil identifier", marker));
        }
        Ok(id)
    }

    /// Make directories recursively.
    /// Returns vector of created directories.
    fn mkdir_all(path: &Path) -> Result<Vec<PathBuf>> {
        let mut missing = Vec::new();
        let mut cursor = Some(path);
        // a relative path ends in an empty parent
        while let Some(dir) = cursor.filter(|d| !d.as_os_str().is_empty()) {
            if fs::exists(dir)? {
                break;
            }
            missing.push(dir.to_path_buf());
            cursor = dir.parent();
        }

        let mut created = Vec::new();
        for dir in missing.into_iter().rev() {
            if let Err(e) = fs::create_dir(&dir) {
                Self::rollback(&created, &[]);
                return Err(e.into());
            }
            created.push(dir);
        }
        Ok(created)
    }

    fn setup(&self, root: &Path, created: &[PathBuf]) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let tmp = root.join(MARKER_TMP_NAME);
        let marker = root.join(MARKER_NAME);

        let written = fs::write(&tmp, id.as_bytes()).and_then(|_| fs::rename(&tmp, &marker));
        if let Err(e) = written {
            Self::rollback(created, &[tmp, marker]);
            return Err(anyhow!("failed to write root marker under {:?}: {e}", root));
        }

        if let Some(register) = &self.register {
            if let Err(e) = register(root, &id) {
                Self::rollback(created, &[tmp, marker]);
                return Err(e.context(format!("failed to register root {:?}", root)));
            }
        }
        Ok(id)
    }

    /// Removes created files, then created directories deepest first.
    fn rollback(created: &[PathBuf], files: &[PathBuf]) {
        for file in files {
            if file.exists() {
                if let Err(e) = fs::remove_file(file) {
                    warn!(path = %file.display(), error = %e, "unable to remove");
                }
            }
        }
        for dir in created.iter().rev() {
            if let Err(e) = fs::remove_dir(dir) {
                warn!(path = %dir.display(), error = %e, "unable to remove");
            }
        }
    }
}

impl HostBootstrap for DirBootstrap {
    fn ensure_root(&self, root: &Path) -> Result<Uuid> {
        if root.as_os_str().is_empty() {
            return Err(anyhow!("invalid root path: empty"));
        }
        if root.exists() && !root.is_dir() {
            return Err(anyhow!("{:?} is not a directory", root));
        }
        if root.join(MARKER_NAME).exists() {
            let id = Self::read_marker(root)?;
            info!(root = %root.display(), %id, "virtualization root already set up");
            return Ok(id);
        }

        let created = Self::mkdir_all(root)?;
        let id = self.setup(root, &created)?;
        info!(root = %root.display(), %id, "virtualization root created");
        Ok(id)
    }
}
