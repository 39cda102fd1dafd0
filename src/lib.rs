//! Projects a registry-like hierarchical key/value store onto a filesystem.
//!
//! ### Overview
//!
//! `regfs-kit` implements the provider side of a virtualization host: the host intercepts
//! filesystem operations under a root directory and calls back into the provider, which
//! answers them from a [`BackingStore`]. Keys appear as directories and values as files
//! whose content is the value's raw bytes.
//!
//! **Key pieces**:
//! - [`BackingStore`]: the read-only store contract, with [`MapStore`] (in memory) and
//!   [`DirStore`] (a directory tree) as implementations.
//! - [`Dispatcher`]: answers every [`ProjectionCallbacks`] call from a store.
//! - [`NamespacePolicy`]: approves or denies rename, delete and modification requests.
//! - [`SessionRegistry`]: holds per-session listing state across resumed listing calls.
//! - [`VirtualizationInstance`]: binds a provider to a root prepared by a [`HostBootstrap`].
//!
//! ### Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use regfs_kit::{Dispatcher, DirBootstrap, MapStore, NamespacePolicy, VirtualizationInstance};
//!
//! let root = std::env::temp_dir().join(format!("regfs-doc-{}", std::process::id()));
//! let provider = Arc::new(Dispatcher::new(MapStore::new(), NamespacePolicy::new(true)));
//!
//! let instance = VirtualizationInstance::start(&root, &DirBootstrap::new(), provider).unwrap();
//! assert!(root.join(regfs_kit::MARKER_NAME).exists());
//! instance.stop();
//! # std::fs::remove_dir_all(&root).unwrap();
//! ```

mod config;
mod core;
mod host;
mod provider;
mod store;

pub use crate::config::{ENV_BLOCK_MODIFY, ENV_HIVE, ENV_READ_ONLY, ProviderConfig};
pub use crate::core::utils;
pub use crate::core::{BackingStore, Children, NodeKind, Result, StoreError, StoreResult, WELL_KNOWN_ROOTS};
pub use crate::host::{
    CallbackContext, Capabilities, ContentSink, DirBootstrap, DirEntry, EntrySink, FillResult, HostBootstrap,
    HostNameRules, MARKER_NAME, MAX_NAME_LEN, NameRules, Notification, PlaceholderInfo, PlaceholderSink,
    ProjectionCallbacks, SessionId, TransferBuffer, VirtualizationInstance,
};
pub use crate::provider::{
    Decision, Dispatcher, EntryCollector, Intent, NamespacePolicy, ProjError, ProjResult, S_OK, SessionRegistry,
    SessionState, decide, status_code,
};
pub use crate::store::{DirStore, MapStore};
