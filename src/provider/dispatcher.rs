//! The provider's implementation of the host callbacks.
//!
//! `Dispatcher` is the only component that hands statuses back to the host. It resolves
//! paths against the backing store, keeps enumeration sessions in a [`SessionRegistry`],
//! and asks the [`NamespacePolicy`] about mutating notifications.
//!
//! Every callback logs an entry event and an exit event carrying the status code.

use tracing::{debug, info, trace, warn};

use crate::core::BackingStore;
use crate::core::utils;
use crate::host::{
    CallbackContext, Capabilities, ContentSink, DirEntry, EntrySink, HostNameRules, NameRules,
    Notification, PlaceholderInfo, PlaceholderSink, ProjectionCallbacks, SessionId, TransferBuffer,
};
use crate::provider::session::SessionRegistry;
use crate::provider::{NamespacePolicy, ProjError, ProjResult, status_code};

fn enter(op: &'static str, ctx: &CallbackContext) {
    info!(
        op,
        path = %ctx.path,
        process = ctx.process_name(),
        pid = ctx.triggering_process_id,
        command = ctx.command_id,
        "---->"
    );
}

fn leave<T>(op: &'static str, ctx: &CallbackContext, result: &ProjResult<T>) {
    let status = format!("{:#010x}", status_code(result) as u32);
    match result {
        Ok(_) => info!(op, path = %ctx.path, process = ctx.process_name(), %status, "<----"),
        Err(e) => warn!(
            op,
            path = %ctx.path,
            process = ctx.process_name(),
            %status,
            error = %e,
            "<----"
        ),
    }
}

/// Projects a [`BackingStore`] through the host callbacks.
///
/// ### Example
/// ```
/// use regfs_kit::{CallbackContext, Dispatcher, MapStore, NamespacePolicy, PlaceholderInfo,
///     PlaceholderSink, ProjResult, ProjectionCallbacks};
///
/// struct Print;
/// impl PlaceholderSink for Print {
///     fn write_placeholder_info(&mut self, path: &str, info: &PlaceholderInfo) -> ProjResult<()> {
///         println!("{path}: {info:?}");
///         Ok(())
///     }
/// }
///
/// let dispatcher = Dispatcher::new(MapStore::new(), NamespacePolicy::new(true));
/// let ctx = CallbackContext::new("HKEY_CURRENT_USER");
/// assert!(dispatcher.resolve_metadata(&ctx, &mut Print).is_ok());
/// ```
pub struct Dispatcher<S: BackingStore> {
    store: S,
    sessions: SessionRegistry,
    policy: NamespacePolicy,
    rules: Box<dyn NameRules>,
}

impl<S: BackingStore> Dispatcher<S> {
    /// Creates a dispatcher using the default host name rules.
    pub fn new(store: S, policy: NamespacePolicy) -> Self {
        Self {
            store,
            sessions: SessionRegistry::new(),
            policy,
            rules: Box::new(HostNameRules),
        }
    }

    /// Replaces the host name rules (matching, collation, validity).
    pub fn with_name_rules<R: NameRules + 'static>(mut self, rules: R) -> Self {
        self.rules = Box::new(rules);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn policy(&self) -> &NamespacePolicy {
        &self.policy
    }

    /// Children of `parent` matching `pattern`, in discovery order.
    fn collect(&self, parent: &str, pattern: Option<&str>) -> ProjResult<Vec<DirEntry>> {
        let children = self.store.enumerate_children(parent)?;
        let mut entries = Vec::with_capacity(children.subkeys.len() + children.values.len());

        for name in children.subkeys {
            if self.rules.matches(&name, pattern) {
                entries.push(DirEntry::directory(name));
            }
        }
        for (name, size) in children.values {
            let name = utils::display_value_name(&name);
            if self.rules.matches(name, pattern) {
                entries.push(DirEntry::file(name, size));
            }
        }
        Ok(entries)
    }

    fn fill_listing(
        &self,
        ctx: &CallbackContext,
        session: SessionId,
        pattern: Option<&str>,
        restart: bool,
        sink: &mut dyn EntrySink,
    ) -> ProjResult<()> {
        let collector = self.sessions.get(session).ok_or(ProjError::InvalidArgument)?;
        let mut collector = collector.lock();

        if restart {
            collector.reset();
        }
        if !collector.is_filled() {
            let entries = self.collect(&ctx.path, pattern)?;
            collector.fill(entries, self.rules.as_ref());
        }

        let placed = collector.drain_into(sink);
        trace!(
            %session,
            placed,
            cursor = collector.cursor(),
            total = collector.entries().len(),
            "listing drained"
        );
        Ok(())
    }

    fn hydrate(&self, ctx: &CallbackContext, offset: u64, length: u32, sink: &dyn ContentSink) -> ProjResult<()> {
        let mut buffer = TransferBuffer::acquire(sink, length as usize)?;

        let read = if offset == 0 {
            self.store.read_value(&ctx.path, &mut buffer)
        } else {
            self.store.read_value_at(&ctx.path, offset, &mut buffer)
        };
        match read {
            Ok(true) => {}
            Ok(false) => return Err(ProjError::NotFound),
            Err(e) => {
                debug!(path = %ctx.path, error = %e, "value read failed");
                return Err(ProjError::NotFound);
            }
        }

        sink.write_file_data(offset, &buffer)
    }
}

impl<S: BackingStore> ProjectionCallbacks for Dispatcher<S> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::NOTIFICATIONS
    }

    fn begin_enumeration(&self, ctx: &CallbackContext, session: SessionId) -> ProjResult<()> {
        enter("begin_enumeration", ctx);
        self.sessions.begin(session);
        let result = Ok(());
        leave("begin_enumeration", ctx, &result);
        result
    }

    fn end_enumeration(&self, ctx: &CallbackContext, session: SessionId) -> ProjResult<()> {
        enter("end_enumeration", ctx);
        if !self.sessions.end(session) {
            debug!(%session, "ending a session that was not live");
        }
        let result = Ok(());
        leave("end_enumeration", ctx, &result);
        result
    }

    fn list_entries(
        &self,
        ctx: &CallbackContext,
        session: SessionId,
        pattern: Option<&str>,
        restart: bool,
        sink: &mut dyn EntrySink,
    ) -> ProjResult<()> {
        enter("list_entries", ctx);
        let result = self.fill_listing(ctx, session, pattern, restart, sink);
        leave("list_entries", ctx, &result);
        result
    }

    fn resolve_metadata(&self, ctx: &CallbackContext, sink: &mut dyn PlaceholderSink) -> ProjResult<()> {
        enter("resolve_metadata", ctx);
        let result = self
            .store
            .exists(&ctx.path)
            .map_err(ProjError::from)
            .and_then(|kind| kind.ok_or(ProjError::NotFound))
            .and_then(|kind| sink.write_placeholder_info(&ctx.path, &PlaceholderInfo::from(kind)));
        leave("resolve_metadata", ctx, &result);
        result
    }

    fn read_content(
        &self,
        ctx: &CallbackContext,
        offset: u64,
        length: u32,
        sink: &dyn ContentSink,
    ) -> ProjResult<()> {
        enter("read_content", ctx);
        let result = self.hydrate(ctx, offset, length, sink);
        leave("read_content", ctx, &result);
        result
    }

    fn notify_event(
        &self,
        ctx: &CallbackContext,
        notification: Notification,
        is_directory: bool,
        destination: Option<&str>,
    ) -> ProjResult<()> {
        enter("notify_event", ctx);
        let result = match notification {
            Notification::FileOpened
            | Notification::NewFileCreated
            | Notification::FileOverwritten
            | Notification::FileHandleClosedFileModified
            | Notification::FileHandleClosedFileDeleted
            | Notification::FileRenamed => {
                info!(
                    path = %ctx.path,
                    ?notification,
                    is_directory,
                    destination = destination.unwrap_or_default(),
                    "observed"
                );
                Ok(())
            }
            Notification::PreRename => self.policy.decide_rename().into_result(),
            Notification::PreDelete => self.policy.decide_delete().into_result(),
            Notification::FilePreConvertToFull => self.policy.decide_modify().into_result(),
            other => {
                info!(path = %ctx.path, raw = other.raw(), "unhandled notification");
                Ok(())
            }
        };
        leave("notify_event", ctx, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::MapStore;
    use crate::provider::SessionState;

    struct VecSink {
        capacity: usize,
        entries: Vec<DirEntry>,
    }

    impl VecSink {
        fn new(capacity: usize) -> Self {
            Self { capacity, entries: Vec::new() }
        }

        fn names(&self) -> Vec<&str> {
            self.entries.iter().map(|e| e.name()).collect()
        }
    }

    impl EntrySink for VecSink {
        fn add(&mut self, entry: &DirEntry) -> crate::host::FillResult {
            if self.entries.len() == self.capacity {
                return crate::host::FillResult::BufferFull;
            }
            self.entries.push(entry.clone());
            crate::host::FillResult::Added
        }
    }

    #[derive(Default)]
    struct InfoSink {
        written: Vec<(String, PlaceholderInfo)>,
    }

    impl PlaceholderSink for InfoSink {
        fn write_placeholder_info(&mut self, path: &str, info: &PlaceholderInfo) -> ProjResult<()> {
            self.written.push((path.to_string(), *info));
            Ok(())
        }
    }

    #[derive(Default)]
    struct DataSink {
        outstanding: AtomicI32,
        exhausted: bool,
        written: Mutex<Vec<(u64, Vec<u8>)>>,
    }

    impl ContentSink for DataSink {
        fn allocate_buffer(&self, len: usize) -> Option<Vec<u8>> {
            if self.exhausted {
                return None;
            }
            self.outstanding.fetch_add(1, Ordering::SeqCst);
            Some(vec![0; len])
        }

        fn release_buffer(&self, _buffer: Vec<u8>) {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }

        fn write_file_data(&self, offset: u64, data: &[u8]) -> ProjResult<()> {
            self.written.lock().push((offset, data.to_vec()));
            Ok(())
        }
    }

    fn setup_store() -> MapStore {
        let store = MapStore::new();
        store.create_key("HKEY_LOCAL_MACHINE\\sub\\zeta").unwrap();
        store.create_key("HKEY_LOCAL_MACHINE\\sub\\Alpha").unwrap();
        store.set_value("HKEY_LOCAL_MACHINE\\sub", "val", b"DATA").unwrap();
        store.set_value("HKEY_LOCAL_MACHINE\\sub", "Beta", b"xyz").unwrap();
        store.set_value("HKEY_LOCAL_MACHINE\\sub", "", b"default!").unwrap();
        store.set_value("HKEY_LOCAL_MACHINE\\sub", "bad|name", b"x").unwrap();
        store
    }

    fn setup_dispatcher(read_only: bool) -> Dispatcher<MapStore> {
        Dispatcher::new(setup_store(), NamespacePolicy::new(read_only))
    }

    fn ctx(path: &str) -> CallbackContext {
        CallbackContext::new(path).with_process(1234, "test.exe")
    }

    fn list_all(dispatcher: &Dispatcher<MapStore>, path: &str, pattern: Option<&str>) -> Vec<DirEntry> {
        let session = SessionId::new();
        let ctx = ctx(path);
        dispatcher.begin_enumeration(&ctx, session).unwrap();
        let mut sink = VecSink::new(usize::MAX);
        dispatcher
            .list_entries(&ctx, session, pattern, false, &mut sink)
            .unwrap();
        dispatcher.end_enumeration(&ctx, session).unwrap();
        sink.entries
    }

    mod metadata {
        use super::*;

        #[test]
        fn test_well_known_root_is_directory() {
            let dispatcher = setup_dispatcher(true);
            let mut sink = InfoSink::default();
            dispatcher
                .resolve_metadata(&ctx("HKEY_LOCAL_MACHINE"), &mut sink)
                .unwrap();
            assert_eq!(
                sink.written,
                vec![(
                    "HKEY_LOCAL_MACHINE".to_string(),
                    PlaceholderInfo { is_directory: true, size: 0 }
                )]
            );
        }

        #[test]
        fn test_key_is_directory() {
            let dispatcher = setup_dispatcher(true);
            let mut sink = InfoSink::default();
            dispatcher
                .resolve_metadata(&ctx("HKEY_LOCAL_MACHINE\\sub\\zeta"), &mut sink)
                .unwrap();
            assert_eq!(sink.written[0].1, PlaceholderInfo { is_directory: true, size: 0 });
        }

        #[test]
        fn test_value_is_file_with_size() {
            let dispatcher = setup_dispatcher(true);
            let mut sink = InfoSink::default();
            dispatcher
                .resolve_metadata(&ctx("HKEY_LOCAL_MACHINE\\sub\\val"), &mut sink)
                .unwrap();
            assert_eq!(sink.written[0].1, PlaceholderInfo { is_directory: false, size: 4 });
        }

        #[test]
        fn test_missing_is_not_found() {
            let dispatcher = setup_dispatcher(true);
            let mut sink = InfoSink::default();
            for path in ["HKEY_LOCAL_MACHINE\\missing", "NOT_A_ROOT", "HKEY_LOCAL_MACHINE\\sub\\val\\x"] {
                assert_eq!(
                    dispatcher.resolve_metadata(&ctx(path), &mut sink),
                    Err(ProjError::NotFound)
                );
            }
            assert!(sink.written.is_empty());
        }

        #[test]
        fn test_denied_is_access_denied() {
            let dispatcher = setup_dispatcher(true);
            dispatcher.store().deny("HKEY_LOCAL_MACHINE\\sub").unwrap();
            let mut sink = InfoSink::default();
            assert_eq!(
                dispatcher.resolve_metadata(&ctx("HKEY_LOCAL_MACHINE\\sub\\val"), &mut sink),
                Err(ProjError::AccessDenied)
            );
        }
    }

    mod listing {
        use super::*;

        #[test]
        fn test_list_star_is_sorted_union() {
            let dispatcher = setup_dispatcher(true);
            let entries = list_all(&dispatcher, "HKEY_LOCAL_MACHINE\\sub", Some("*"));

            let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
            assert_eq!(names, vec!["@", "Alpha", "Beta", "val", "zeta"]);

            assert!(entries[1].is_directory());
            assert_eq!(entries[0], DirEntry::file("@", 8));
            assert_eq!(entries[3], DirEntry::file("val", 4));
            assert_eq!(entries[4], DirEntry::directory("zeta"));
        }

        #[test]
        fn test_list_root() {
            let dispatcher = setup_dispatcher(true);
            let entries = list_all(&dispatcher, "", None);
            let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
            assert_eq!(
                names,
                vec![
                    "HKEY_CLASSES_ROOT",
                    "HKEY_CURRENT_CONFIG",
                    "HKEY_CURRENT_USER",
                    "HKEY_LOCAL_MACHINE",
                    "HKEY_USERS"
                ]
            );
            assert!(entries.iter().all(|e| e.is_directory()));
        }

        #[test]
        fn test_list_pattern() {
            let dispatcher = setup_dispatcher(true);
            let entries = list_all(&dispatcher, "HKEY_LOCAL_MACHINE\\sub", Some("?eta"));
            let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
            assert_eq!(names, vec!["Beta", "zeta"]);
        }

        #[test]
        fn test_list_no_match_succeeds_empty() {
            let dispatcher = setup_dispatcher(true);
            let entries = list_all(&dispatcher, "HKEY_LOCAL_MACHINE\\sub", Some("nothing*"));
            assert!(entries.is_empty());
        }

        #[test]
        fn test_unknown_session_is_invalid_argument() {
            let dispatcher = setup_dispatcher(true);
            let mut sink = VecSink::new(10);
            let result = dispatcher.list_entries(
                &ctx("HKEY_LOCAL_MACHINE"),
                SessionId::new(),
                None,
                false,
                &mut sink,
            );
            assert_eq!(result, Err(ProjError::InvalidArgument));
        }

        #[test]
        fn test_missing_parent_is_not_found() {
            let dispatcher = setup_dispatcher(true);
            let session = SessionId::new();
            let ctx = ctx("HKEY_LOCAL_MACHINE\\missing");
            dispatcher.begin_enumeration(&ctx, session).unwrap();
            let mut sink = VecSink::new(10);
            assert_eq!(
                dispatcher.list_entries(&ctx, session, None, false, &mut sink),
                Err(ProjError::NotFound)
            );
        }

        #[test]
        fn test_resume_across_capacities() {
            let dispatcher = setup_dispatcher(true);
            let expected: Vec<_> = list_all(&dispatcher, "HKEY_LOCAL_MACHINE\\sub", None)
                .iter()
                .map(|e| e.name().to_string())
                .collect();

            for capacity in 1..=expected.len() + 1 {
                let session = SessionId::new();
                let ctx = ctx("HKEY_LOCAL_MACHINE\\sub");
                dispatcher.begin_enumeration(&ctx, session).unwrap();

                let mut collected = Vec::new();
                loop {
                    let mut sink = VecSink::new(capacity);
                    dispatcher
                        .list_entries(&ctx, session, None, false, &mut sink)
                        .unwrap();
                    if sink.entries.is_empty() {
                        break;
                    }
                    collected.extend(sink.names().into_iter().map(str::to_string));
                }
                dispatcher.end_enumeration(&ctx, session).unwrap();

                assert_eq!(collected, expected, "capacity {capacity}");
            }
        }

        #[test]
        fn test_restart_recomputes() {
            let dispatcher = setup_dispatcher(true);
            let session = SessionId::new();
            let ctx = ctx("HKEY_LOCAL_MACHINE\\sub");
            dispatcher.begin_enumeration(&ctx, session).unwrap();

            let mut sink = VecSink::new(2);
            dispatcher.list_entries(&ctx, session, None, false, &mut sink).unwrap();
            assert_eq!(sink.names(), vec!["@", "Alpha"]);
            assert_eq!(dispatcher.sessions().state(session), Some(SessionState::Draining));

            dispatcher.store().create_key("HKEY_LOCAL_MACHINE\\sub\\Aardvark").unwrap();

            // without restart the snapshot is kept
            let mut sink = VecSink::new(1);
            dispatcher.list_entries(&ctx, session, None, false, &mut sink).unwrap();
            assert_eq!(sink.names(), vec!["Beta"]);

            let mut sink = VecSink::new(2);
            dispatcher.list_entries(&ctx, session, None, true, &mut sink).unwrap();
            assert_eq!(sink.names(), vec!["@", "Aardvark"]);
        }

        #[test]
        fn test_new_session_does_not_see_old_entries() {
            let dispatcher = setup_dispatcher(true);
            let ctx_sub = ctx("HKEY_LOCAL_MACHINE\\sub");
            let first = SessionId::new();
            dispatcher.begin_enumeration(&ctx_sub, first).unwrap();
            dispatcher
                .list_entries(&ctx_sub, first, None, false, &mut VecSink::new(1))
                .unwrap();
            dispatcher.end_enumeration(&ctx_sub, first).unwrap();

            let ctx_root = ctx("");
            let second = SessionId::new();
            dispatcher.begin_enumeration(&ctx_root, second).unwrap();
            let mut sink = VecSink::new(usize::MAX);
            dispatcher
                .list_entries(&ctx_root, second, None, false, &mut sink)
                .unwrap();
            assert_eq!(sink.entries.len(), 5);
            assert!(!sink.names().contains(&"Alpha"));

            let mut sink = VecSink::new(10);
            assert_eq!(
                dispatcher.list_entries(&ctx_sub, first, None, false, &mut sink),
                Err(ProjError::InvalidArgument)
            );
        }

        #[test]
        fn test_concurrent_drain_of_one_session() {
            let dispatcher = setup_dispatcher(true);
            let session = SessionId::new();
            let ctx = ctx("HKEY_LOCAL_MACHINE\\sub");
            dispatcher.begin_enumeration(&ctx, session).unwrap();

            let collected = Mutex::new(Vec::new());
            std::thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| {
                        for _ in 0..4 {
                            let mut sink = VecSink::new(1);
                            dispatcher
                                .list_entries(&ctx, session, None, false, &mut sink)
                                .unwrap();
                            collected.lock().extend(sink.entries);
                        }
                    });
                }
            });

            let mut names: Vec<_> = collected.into_inner().into_iter().map(|e| e.name().to_string()).collect();
            names.sort();
            assert_eq!(names, vec!["@", "Alpha", "Beta", "val", "zeta"]);
        }
    }

    mod content {
        use super::*;

        #[test]
        fn test_read_exact_value() {
            let dispatcher = setup_dispatcher(true);
            let sink = DataSink::default();
            dispatcher
                .read_content(&ctx("HKEY_LOCAL_MACHINE\\sub\\val"), 0, 4, &sink)
                .unwrap();
            assert_eq!(*sink.written.lock(), vec![(0u64, b"DATA".to_vec())]);
            assert_eq!(sink.outstanding.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn test_read_at_offset() {
            let dispatcher = setup_dispatcher(true);
            let sink = DataSink::default();
            dispatcher
                .read_content(&ctx("HKEY_LOCAL_MACHINE\\sub\\@"), 3, 5, &sink)
                .unwrap();
            assert_eq!(*sink.written.lock(), vec![(3u64, b"ault!".to_vec())]);
        }

        #[test]
        fn test_read_missing_is_not_found_and_releases() {
            let dispatcher = setup_dispatcher(true);
            let sink = DataSink::default();
            assert_eq!(
                dispatcher.read_content(&ctx("HKEY_LOCAL_MACHINE\\sub\\nope"), 0, 4, &sink),
                Err(ProjError::NotFound)
            );
            assert_eq!(
                dispatcher.read_content(&ctx("HKEY_LOCAL_MACHINE\\sub"), 0, 4, &sink),
                Err(ProjError::NotFound)
            );
            assert!(sink.written.lock().is_empty());
            assert_eq!(sink.outstanding.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn test_read_without_buffer_is_out_of_memory() {
            let dispatcher = setup_dispatcher(true);
            let sink = DataSink { exhausted: true, ..DataSink::default() };
            assert_eq!(
                dispatcher.read_content(&ctx("HKEY_LOCAL_MACHINE\\sub\\val"), 0, 4, &sink),
                Err(ProjError::OutOfMemory)
            );
            assert_eq!(
                dispatcher.read_content(&ctx("HKEY_LOCAL_MACHINE\\sub\\nope"), 0, 4, &sink),
                Err(ProjError::OutOfMemory)
            );
        }

        #[test]
        fn test_concurrent_reads_of_different_files() {
            let dispatcher = setup_dispatcher(true);
            let sink = DataSink::default();
            std::thread::scope(|s| {
                for path in ["HKEY_LOCAL_MACHINE\\sub\\val", "HKEY_LOCAL_MACHINE\\sub\\Beta"] {
                    let dispatcher = &dispatcher;
                    let sink = &sink;
                    s.spawn(move || {
                        for _ in 0..50 {
                            dispatcher.read_content(&ctx(path), 0, 3, sink).unwrap();
                        }
                    });
                }
            });
            let written = sink.written.lock();
            assert_eq!(written.len(), 100);
            assert!(written.iter().all(|(_, d)| d == b"DAT" || d == b"xyz"));
            assert_eq!(sink.outstanding.load(Ordering::SeqCst), 0);
        }
    }

    mod notifications {
        use super::*;

        const INFORMATIONAL: [Notification; 6] = [
            Notification::FileOpened,
            Notification::NewFileCreated,
            Notification::FileOverwritten,
            Notification::FileHandleClosedFileModified,
            Notification::FileHandleClosedFileDeleted,
            Notification::FileRenamed,
        ];

        #[test]
        fn test_read_only_blocks_delete_and_rename() {
            let dispatcher = setup_dispatcher(true);
            for path in ["HKEY_LOCAL_MACHINE", "HKEY_LOCAL_MACHINE\\sub\\val", "anything"] {
                assert_eq!(
                    dispatcher.notify_event(&ctx(path), Notification::PreDelete, false, None),
                    Err(ProjError::CannotDelete)
                );
                assert_eq!(
                    dispatcher.notify_event(&ctx(path), Notification::PreRename, false, Some("x")),
                    Err(ProjError::AccessDenied)
                );
            }
        }

        #[test]
        fn test_writable_allows_delete_and_rename() {
            let dispatcher = setup_dispatcher(false);
            let ctx = ctx("HKEY_LOCAL_MACHINE\\sub\\val");
            assert_eq!(dispatcher.notify_event(&ctx, Notification::PreDelete, false, None), Ok(()));
            assert_eq!(dispatcher.notify_event(&ctx, Notification::PreRename, false, Some("y")), Ok(()));
        }

        #[test]
        fn test_informational_always_succeed() {
            let dispatcher = setup_dispatcher(true);
            for notification in INFORMATIONAL {
                assert_eq!(
                    dispatcher.notify_event(&ctx("HKEY_USERS"), notification, true, None),
                    Ok(())
                );
            }
        }

        #[test]
        fn test_unknown_is_success() {
            let dispatcher = setup_dispatcher(true);
            assert_eq!(
                dispatcher.notify_event(&ctx("HKEY_USERS"), Notification::from_raw(0x4000), false, None),
                Ok(())
            );
            assert_eq!(
                dispatcher.notify_event(&ctx("HKEY_USERS"), Notification::PreSetHardlink, false, None),
                Ok(())
            );
        }

        #[test]
        fn test_modification_configurable() {
            let dispatcher = setup_dispatcher(true);
            let ctx = ctx("HKEY_LOCAL_MACHINE\\sub\\val");
            assert_eq!(
                dispatcher.notify_event(&ctx, Notification::FilePreConvertToFull, false, None),
                Ok(())
            );

            let strict = Dispatcher::new(
                setup_store(),
                NamespacePolicy::new(true).with_content_modification_blocked(true),
            );
            assert_eq!(
                strict.notify_event(&ctx, Notification::FilePreConvertToFull, false, None),
                Err(ProjError::AccessDenied)
            );
        }

        #[test]
        fn test_declares_notifications() {
            assert_eq!(setup_dispatcher(true).capabilities(), Capabilities::NOTIFICATIONS);
        }
    }

    mod logging {
        use std::io;
        use std::sync::Arc;

        use tracing::Level;

        use super::*;

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Captured {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        fn captured_at_info<F: FnOnce()>(f: F) -> String {
            let out = Captured::default();
            let writer = out.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(Level::INFO)
                .with_ansi(false)
                .with_writer(move || writer.clone())
                .finish();
            tracing::subscriber::with_default(subscriber, f);
            let bytes = out.0.lock().clone();
            String::from_utf8_lossy(&bytes).into_owned()
        }

        #[test]
        fn test_entry_and_exit_visible_at_info() {
            let dispatcher = setup_dispatcher(true);
            let log = captured_at_info(|| {
                let mut sink = InfoSink::default();
                dispatcher
                    .resolve_metadata(&ctx("HKEY_LOCAL_MACHINE\\sub"), &mut sink)
                    .unwrap();
            });

            assert!(log.contains("---->"), "{log}");
            assert!(log.contains("<----"), "{log}");
            assert!(log.contains("HKEY_LOCAL_MACHINE\\sub"), "{log}");
            assert!(log.contains("test.exe"), "{log}");
            assert!(log.contains("0x00000000"), "{log}");
        }

        #[test]
        fn test_failure_status_logged() {
            let dispatcher = setup_dispatcher(true);
            let log = captured_at_info(|| {
                let mut sink = InfoSink::default();
                let result = dispatcher.resolve_metadata(&ctx("HKEY_LOCAL_MACHINE\\missing"), &mut sink);
                assert_eq!(result, Err(ProjError::NotFound));
            });

            assert!(log.contains("0x80070002"), "{log}");
        }
    }
}
