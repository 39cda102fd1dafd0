//! Host protocol surface.
//!
//! The virtualization host intercepts filesystem operations under the root and calls back
//! into a provider through [`ProjectionCallbacks`]. Everything the provider hands back to
//! the host goes through one of the sinks defined here.

use std::fmt;

use bitflags::bitflags;
use uuid::Uuid;

use crate::core::NodeKind;
use crate::provider::ProjResult;

mod bootstrap;
mod buffer;
mod instance;
mod names;

pub use bootstrap::{DirBootstrap, HostBootstrap, MARKER_NAME};
pub use buffer::TransferBuffer;
pub use instance::VirtualizationInstance;
pub use names::{HostNameRules, MAX_NAME_LEN, NameRules};

/// Host-issued identifier of an enumeration session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

/// Information the host attaches to every callback.
#[derive(Debug, Clone, Default)]
pub struct CallbackContext {
    pub command_id: i32,
    /// Target path, relative to the virtualization root.
    pub path: String,
    pub triggering_process_id: u32,
    pub triggering_process_name: Option<String>,
}

impl CallbackContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_command_id(mut self, command_id: i32) -> Self {
        self.command_id = command_id;
        self
    }

    pub fn with_process(mut self, pid: u32, name: impl Into<String>) -> Self {
        self.triggering_process_id = pid;
        self.triggering_process_name = Some(name.into());
        self
    }

    /// Name of the process that triggered the callback, or `<unknown>`.
    pub fn process_name(&self) -> &str {
        self.triggering_process_name.as_deref().unwrap_or("<unknown>")
    }
}

/// A single entry offered to the host during a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    name: String,
    is_directory: bool,
    size: u64,
}

impl DirEntry {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            size: 0,
        }
    }

    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Placeholder descriptor written back to the host after metadata resolution.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlaceholderInfo {
    pub is_directory: bool,
    pub size: u64,
}

impl From<NodeKind> for PlaceholderInfo {
    fn from(kind: NodeKind) -> Self {
        Self {
            is_directory: kind.is_key(),
            size: kind.size(),
        }
    }
}

/// Outcome of offering one entry to the host's listing buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FillResult {
    Added,
    BufferFull,
}

/// The host's directory-listing buffer for a single listing call.
pub trait EntrySink {
    fn add(&mut self, entry: &DirEntry) -> FillResult;
}

/// Receives the placeholder descriptor for a resolved path.
pub trait PlaceholderSink {
    fn write_placeholder_info(&mut self, path: &str, info: &PlaceholderInfo) -> ProjResult<()>;
}

/// Receives hydrated file content and hands out the transfer buffers it is written from.
///
/// Sinks are shared handles into the host, so every method takes `&self`.
pub trait ContentSink {
    /// Acquires a zeroed buffer of exactly `len` bytes, or `None` if memory is exhausted.
    fn allocate_buffer(&self, len: usize) -> Option<Vec<u8>> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).ok()?;
        buffer.resize(len, 0);
        Some(buffer)
    }

    /// Takes back a buffer obtained from [`ContentSink::allocate_buffer`].
    fn release_buffer(&self, buffer: Vec<u8>) {
        drop(buffer);
    }

    /// Writes `data` into the placeholder's content at `offset`.
    fn write_file_data(&self, offset: u64, data: &[u8]) -> ProjResult<()>;
}

bitflags! {
    /// Optional callbacks a provider implements.
    ///
    /// The host only registers handlers for declared capabilities.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const NOTIFICATIONS = 0x1;
        const CANCEL_COMMAND = 0x2;
    }
}

/// File-system event reported through the notification callback.
///
/// Raw values follow the host's notification bits; anything else is kept as `Unknown`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Notification {
    FileOpened,
    NewFileCreated,
    FileOverwritten,
    PreDelete,
    PreRename,
    PreSetHardlink,
    FileRenamed,
    HardlinkCreated,
    FileHandleClosedNoModification,
    FileHandleClosedFileModified,
    FileHandleClosedFileDeleted,
    FilePreConvertToFull,
    Unknown(u32),
}

impl Notification {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0x0000_0002 => Self::FileOpened,
            0x0000_0004 => Self::NewFileCreated,
            0x0000_0008 => Self::FileOverwritten,
            0x0000_0010 => Self::PreDelete,
            0x0000_0020 => Self::PreRename,
            0x0000_0040 => Self::PreSetHardlink,
            0x0000_0080 => Self::FileRenamed,
            0x0000_0100 => Self::HardlinkCreated,
            0x0000_0200 => Self::FileHandleClosedNoModification,
            0x0000_0400 => Self::FileHandleClosedFileModified,
            0x0000_0800 => Self::FileHandleClosedFileDeleted,
            0x0000_1000 => Self::FilePreConvertToFull,
            other => Self::Unknown(other),
        }
    }

    pub fn raw(&self) -> u32 {
        match self {
            Self::FileOpened => 0x0000_0002,
            Self::NewFileCreated => 0x0000_0004,
            Self::FileOverwritten => 0x0000_0008,
            Self::PreDelete => 0x0000_0010,
            Self::PreRename => 0x0000_0020,
            Self::PreSetHardlink => 0x0000_0040,
            Self::FileRenamed => 0x0000_0080,
            Self::HardlinkCreated => 0x0000_0100,
            Self::FileHandleClosedNoModification => 0x0000_0200,
            Self::FileHandleClosedFileModified => 0x0000_0400,
            Self::FileHandleClosedFileDeleted => 0x0000_0800,
            Self::FilePreConvertToFull => 0x0000_1000,
            Self::Unknown(raw) => *raw,
        }
    }
}

/// Callbacks a provider exposes to the virtualization host.
///
/// The five listing/metadata/content callbacks are required. The rest are optional and
/// are only invoked when the matching bit is present in [`ProjectionCallbacks::capabilities`].
pub trait ProjectionCallbacks: Send + Sync {
    /// Optional callbacks this provider implements.
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn begin_enumeration(&self, ctx: &CallbackContext, session: SessionId) -> ProjResult<()>;

    fn end_enumeration(&self, ctx: &CallbackContext, session: SessionId) -> ProjResult<()>;

    /// Fills `sink` with the entries of `ctx.path` matching `pattern`.
    fn list_entries(
        &self,
        ctx: &CallbackContext,
        session: SessionId,
        pattern: Option<&str>,
        restart: bool,
        sink: &mut dyn EntrySink,
    ) -> ProjResult<()>;

    /// Resolves `ctx.path` and writes its placeholder descriptor to `sink`.
    fn resolve_metadata(&self, ctx: &CallbackContext, sink: &mut dyn PlaceholderSink) -> ProjResult<()>;

    /// Hydrates `length` bytes of `ctx.path` starting at `offset`.
    fn read_content(
        &self,
        ctx: &CallbackContext,
        offset: u64,
        length: u32,
        sink: &dyn ContentSink,
    ) -> ProjResult<()>;

    fn notify_event(
        &self,
        _ctx: &CallbackContext,
        _notification: Notification,
        _is_directory: bool,
        _destination: Option<&str>,
    ) -> ProjResult<()> {
        Ok(())
    }

    fn cancel_command(&self, _command_id: i32) {}
}
