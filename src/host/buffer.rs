use std::ops::{Deref, DerefMut};

use tracing::trace;

use crate::host::ContentSink;
use crate::provider::{ProjError, ProjResult};

/// A transfer buffer borrowed from the host for the duration of one content read.
///
/// The buffer goes back to the sink when the guard is dropped, whichever way the
/// read returns.
pub struct TransferBuffer<'a> {
    sink: &'a dyn ContentSink,
    buffer: Option<Vec<u8>>,
}

impl<'a> TransferBuffer<'a> {
    /// Acquires `len` bytes from `sink`.
    /// Returns `OutOfMemory` if the host cannot provide them.
    pub fn acquire(sink: &'a dyn ContentSink, len: usize) -> ProjResult<Self> {
        let buffer = sink.allocate_buffer(len).ok_or(ProjError::OutOfMemory)?;
        trace!(len, "transfer buffer acquired");
        Ok(Self {
            sink,
            buffer: Some(buffer),
        })
    }
}

impl Deref for TransferBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or_default()
    }
}

impl DerefMut for TransferBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buffer.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for TransferBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            trace!(len = buffer.len(), "transfer buffer released");
            self.sink.release_buffer(buffer);
        }
    }
}
