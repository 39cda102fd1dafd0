mod dispatcher;
mod policy;
mod session;
mod status;

pub use dispatcher::Dispatcher;
pub use policy::{Decision, Intent, NamespacePolicy, decide};
pub use session::{EntryCollector, SessionRegistry, SessionState};
pub use status::{ProjError, ProjResult, S_OK, status_code};
