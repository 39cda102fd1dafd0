use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::Result;
use crate::host::{
    CallbackContext, Capabilities, ContentSink, EntrySink, HostBootstrap, Notification,
    PlaceholderSink, ProjectionCallbacks, SessionId,
};
use crate::provider::ProjResult;

type CancelHandler = Box<dyn FnOnce() + Send>;

const NO_COMMAND: i32 = 0;

/// A provider bound to a virtualization root.
///
/// This is the surface a host integration drives: it forwards each host callback to the
/// provider, but only forwards optional callbacks the provider declared in its
/// [`Capabilities`]. Undeclared notifications succeed without reaching the provider.
///
/// Commands may carry a cancellation handler registered for their duration; handlers are
/// dropped when the command completes and never run unless the host cancels it.
pub struct VirtualizationInstance<P: ProjectionCallbacks> {
    root: PathBuf,
    instance_id: Uuid,
    provider: Arc<P>,
    capabilities: Capabilities,
    cancellations: DashMap<i32, CancelHandler>,
}

impl<P: ProjectionCallbacks> VirtualizationInstance<P> {
    /// Ensures `root` is set up and starts projecting `provider` under it.
    pub fn start<B: HostBootstrap + ?Sized>(root: &Path, bootstrap: &B, provider: Arc<P>) -> Result<Self> {
        let instance_id = bootstrap.ensure_root(root)?;
        let capabilities = provider.capabilities();
        info!(
            root = %root.display(),
            %instance_id,
            notifications = capabilities.contains(Capabilities::NOTIFICATIONS),
            cancellation = capabilities.contains(Capabilities::CANCEL_COMMAND),
            "virtualization started"
        );
        Ok(Self {
            root: root.to_path_buf(),
            instance_id,
            provider,
            capabilities,
            cancellations: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Stops virtualization. Pending cancellation handlers are discarded.
    pub fn stop(self) {
        self.cancellations.clear();
        info!(root = %self.root.display(), instance_id = %self.instance_id, "virtualization stopped");
    }

    /// Attaches a handler to run if the host cancels `command_id` while it is in flight.
    pub fn register_cancellation<F>(&self, command_id: i32, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancellations.insert(command_id, Box::new(handler));
    }

    /// Host request to cancel an in-flight command.
    pub fn cancel_command(&self, command_id: i32) {
        if let Some((_, handler)) = self.cancellations.remove(&command_id) {
            debug!(command_id, "running cancellation handler");
            handler();
        }
        if self.capabilities.contains(Capabilities::CANCEL_COMMAND) {
            self.provider.cancel_command(command_id);
        }
    }

    /// Drops the finished command's handler. Command id 0 means the host gave none.
    fn complete<T>(&self, ctx: &CallbackContext, result: ProjResult<T>) -> ProjResult<T> {
        if ctx.command_id != NO_COMMAND {
            self.cancellations.remove(&ctx.command_id);
        }
        result
    }

    pub fn begin_enumeration(&self, ctx: &CallbackContext, session: SessionId) -> ProjResult<()> {
        self.complete(ctx, self.provider.begin_enumeration(ctx, session))
    }

    pub fn end_enumeration(&self, ctx: &CallbackContext, session: SessionId) -> ProjResult<()> {
        self.complete(ctx, self.provider.end_enumeration(ctx, session))
    }

    pub fn list_entries(
        &self,
        ctx: &CallbackContext,
        session: SessionId,
        pattern: Option<&str>,
        restart: bool,
        sink: &mut dyn EntrySink,
    ) -> ProjResult<()> {
        let result = self.provider.list_entries(ctx, session, pattern, restart, sink);
        self.complete(ctx, result)
    }

    pub fn resolve_metadata(&self, ctx: &CallbackContext, sink: &mut dyn PlaceholderSink) -> ProjResult<()> {
        self.complete(ctx, self.provider.resolve_metadata(ctx, sink))
    }

    pub fn read_content(
        &self,
        ctx: &CallbackContext,
        offset: u64,
        length: u32,
        sink: &dyn ContentSink,
    ) -> ProjResult<()> {
        self.complete(ctx, self.provider.read_content(ctx, offset, length, sink))
    }

    pub fn notify_event(
        &self,
        ctx: &CallbackContext,
        notification: Notification,
        is_directory: bool,
        destination: Option<&str>,
    ) -> ProjResult<()> {
        if !self.capabilities.contains(Capabilities::NOTIFICATIONS) {
            return self.complete(ctx, Ok(()));
        }
        let result = self
            .provider
            .notify_event(ctx, notification, is_directory, destination);
        self.complete(ctx, result)
    }
}
