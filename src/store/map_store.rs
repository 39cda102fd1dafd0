//! This module provides a backing store implementation that keeps keys and values in memory.

use anyhow::anyhow;
use parking_lot::RwLock;

use crate::core::utils::{self, DEFAULT_VALUE_NAME};
use crate::core::{BackingStore, Children, NodeKind, Result, StoreError, StoreResult, WELL_KNOWN_ROOTS};

/// An in-memory hierarchical key/value store.
///
/// `MapStore` keeps one tree per well-known root. Every key holds an ordered list of
/// subkeys and an ordered list of values; insertion order is the discovery order reported
/// by [`BackingStore::enumerate_children`].
///
/// ### Internal state
///
/// * `roots` — one [`Key`] per entry of [`WELL_KNOWN_ROOTS`], always present.
///   - Names resolve case-insensitively.
///   - A key marked as denied fails every lookup that opens it with `AccessDenied`.
///   - The unnamed value has an empty name and is reachable through `@`.
///
/// ### Thread Safety
///
/// All state sits behind a `parking_lot::RwLock`, so the store can be shared between the
/// host's worker threads and mutated between callbacks (for example to observe a listing
/// restart picking up new children).
///
/// ### Example
///
/// ```
/// use regfs_kit::{BackingStore, MapStore, NodeKind};
///
/// let store = MapStore::new();
/// store.set_value("HKEY_CURRENT_USER\\Software", "Path", b"C:\\").unwrap();
///
/// assert_eq!(
///     store.exists("HKEY_CURRENT_USER\\Software\\Path").unwrap(),
///     Some(NodeKind::Value(3))
/// );
/// ```
pub struct MapStore {
    roots: RwLock<Vec<Key>>,
}

#[derive(Debug, Clone, Default)]
struct Key {
    name: String,
    subkeys: Vec<Key>,
    values: Vec<(String, Vec<u8>)>,
    denied: bool,
}

enum Target<'a> {
    Root,
    Key(&'a Key),
    Value(&'a [u8]),
}

impl Key {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn subkey(&self, name: &str) -> Option<&Key> {
        self.subkeys.iter().find(|k| utils::names_equal(&k.name, name))
    }

    fn subkey_mut(&mut self, name: &str) -> Option<&mut Key> {
        self.subkeys
            .iter_mut()
            .find(|k| utils::names_equal(&k.name, name))
    }

    /// Looks a value up by its host-visible name; `@` falls back to the unnamed value.
    fn value(&self, name: &str) -> Option<&[u8]> {
        let exact = self
            .values
            .iter()
            .find(|(n, _)| utils::names_equal(n, name));
        let found = match exact {
            Some(found) => Some(found),
            None if name == DEFAULT_VALUE_NAME => self.values.iter().find(|(n, _)| n.is_empty()),
            None => None,
        };
        found.map(|(_, data)| data.as_slice())
    }

    fn open(&self, path: &str) -> StoreResult<&Key> {
        if self.denied {
            return Err(StoreError::access_denied(path));
        }
        Ok(self)
    }
}

impl MapStore {
    /// Creates a store holding the empty well-known roots.
    pub fn new() -> Self {
        let roots = WELL_KNOWN_ROOTS.iter().map(|name| Key::named(name)).collect();
        Self {
            roots: RwLock::new(roots),
        }
    }

    /// Creates the key at `path` and all its missing parents.
    /// * `path` must start with a well-known root.
    pub fn create_key(&self, path: &str) -> Result<()> {
        let mut roots = self.roots.write();
        Self::key_mut(&mut roots, path, true).map(|_| ())
    }

    /// Sets (creates or replaces) a value under the key at `key_path`.
    /// The key is created if necessary. An empty `name` sets the unnamed value.
    pub fn set_value(&self, key_path: &str, name: &str, data: &[u8]) -> Result<()> {
        let mut roots = self.roots.write();
        let key = Self::key_mut(&mut roots, key_path, true)?;
        match key.values.iter_mut().find(|(n, _)| utils::names_equal(n, name)) {
            Some((_, existing)) => *existing = data.to_vec(),
            None => key.values.push((name.to_string(), data.to_vec())),
        }
        Ok(())
    }

    /// Removes the key at `path` with everything below it.
    /// Well-known roots cannot be removed.
    pub fn remove_key(&self, path: &str) -> Result<()> {
        let components = utils::split(path);
        if components.len() < 2 {
            return Err(anyhow!("invalid path: {path:?} cannot be removed"));
        }
        let (name, parent) = components
            .split_last()
            .ok_or_else(|| anyhow!("invalid path: empty"))?;
        let parent = parent.join("\\");

        let mut roots = self.roots.write();
        let key = Self::key_mut(&mut roots, &parent, false)?;
        let before = key.subkeys.len();
        key.subkeys.retain(|k| !utils::names_equal(&k.name, name));
        if key.subkeys.len() == before {
            return Err(anyhow!("{path} does not exist"));
        }
        Ok(())
    }

    /// Removes a value from the key at `key_path`.
    pub fn remove_value(&self, key_path: &str, name: &str) -> Result<()> {
        let mut roots = self.roots.write();
        let key = Self::key_mut(&mut roots, key_path, false)?;
        let before = key.values.len();
        key.values.retain(|(n, _)| !utils::names_equal(n, name));
        if key.values.len() == before {
            return Err(anyhow!("value {name:?} does not exist under {key_path}"));
        }
        Ok(())
    }

    /// Marks the key at `path` as inaccessible: opening it fails with `AccessDenied`.
    pub fn deny(&self, path: &str) -> Result<()> {
        let mut roots = self.roots.write();
        Self::key_mut(&mut roots, path, false)?.denied = true;
        Ok(())
    }

    fn key_mut<'a>(roots: &'a mut [Key], path: &str, create: bool) -> Result<&'a mut Key> {
        let components = utils::split(path);
        let (first, rest) = components
            .split_first()
            .ok_or_else(|| anyhow!("invalid path: empty"))?;
        let mut key = roots
            .iter_mut()
            .find(|k| utils::names_equal(&k.name, first))
            .ok_or_else(|| anyhow!("{first} is not a well-known root"))?;

        for component in rest {
            if key.subkey(component).is_none() {
                if !create {
                    return Err(anyhow!("{path} does not exist"));
                }
                key.subkeys.push(Key::named(component));
            }
            key = key
                .subkey_mut(component)
                .ok_or_else(|| anyhow!("{path} does not exist"))?;
        }
        Ok(key)
    }

    fn resolve<'a>(roots: &'a [Key], path: &str) -> StoreResult<Option<Target<'a>>> {
        let components = utils::split(path);
        let Some((first, rest)) = components.split_first() else {
            return Ok(Some(Target::Root));
        };
        let Some(mut key) = roots.iter().find(|k| utils::names_equal(&k.name, first)) else {
            return Ok(None);
        };
        key = key.open(path)?;

        for (i, component) in rest.iter().enumerate() {
            let is_last = i + 1 == rest.len();
            match key.subkey(component) {
                Some(sub) => key = sub.open(path)?,
                None if is_last => return Ok(key.value(component).map(Target::Value)),
                None => return Ok(None),
            }
        }
        Ok(Some(Target::Key(key)))
    }
}

impl Default for MapStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStore for MapStore {
    fn exists(&self, path: &str) -> StoreResult<Option<NodeKind>> {
        let roots = self.roots.read();
        Ok(Self::resolve(&roots, path)?.map(|target| match target {
            Target::Root | Target::Key(_) => NodeKind::Key,
            Target::Value(data) => NodeKind::Value(data.len() as u64),
        }))
    }

    fn enumerate_children(&self, path: &str) -> StoreResult<Children> {
        let roots = self.roots.read();
        match Self::resolve(&roots, path)? {
            Some(Target::Root) => Ok(Children {
                subkeys: WELL_KNOWN_ROOTS.iter().map(|s| s.to_string()).collect(),
                values: Vec::new(),
            }),
            Some(Target::Key(key)) => Ok(Children {
                subkeys: key.subkeys.iter().map(|k| k.name.clone()).collect(),
                values: key
                    .values
                    .iter()
                    .map(|(name, data)| (name.clone(), data.len() as u64))
                    .collect(),
            }),
            Some(Target::Value(_)) | None => Err(StoreError::not_found(path)),
        }
    }

    fn read_value(&self, path: &str, dest: &mut [u8]) -> StoreResult<bool> {
        let roots = self.roots.read();
        let Some(Target::Value(data)) = Self::resolve(&roots, path)? else {
            return Ok(false);
        };
        dest.fill(0);
        let n = data.len().min(dest.len());
        dest[..n].copy_from_slice(&data[..n]);
        Ok(true)
    }
}
