use crate::provider::ProjError;

/// A mutation the host asks permission for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Intent {
    Rename,
    Delete,
    /// In-place modification of an already hydrated file.
    Modify,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(ProjError),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), ProjError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(status) => Err(status),
        }
    }
}

/// Decides rename and delete requests from the read-only flag alone.
///
/// Rename is denied with `AccessDenied`, delete with `CannotDelete`; the host tells the
/// two apart by status.
pub fn decide(intent: Intent, read_only: bool) -> Decision {
    match (intent, read_only) {
        (Intent::Rename, true) => Decision::Deny(ProjError::AccessDenied),
        (Intent::Delete, true) => Decision::Deny(ProjError::CannotDelete),
        _ => Decision::Allow,
    }
}

/// Process-wide mutation policy, fixed at startup.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NamespacePolicy {
    read_only: bool,
    block_content_modification: bool,
}

impl NamespacePolicy {
    pub fn new(read_only: bool) -> Self {
        Self {
            read_only,
            block_content_modification: false,
        }
    }

    /// Also deny modification of hydrated files while read-only.
    pub fn with_content_modification_blocked(mut self, block: bool) -> Self {
        self.block_content_modification = block;
        self
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn decide_rename(&self) -> Decision {
        decide(Intent::Rename, self.read_only)
    }

    pub fn decide_delete(&self) -> Decision {
        decide(Intent::Delete, self.read_only)
    }

    pub fn decide_modify(&self) -> Decision {
        if self.read_only && self.block_content_modification {
            Decision::Deny(ProjError::AccessDenied)
        } else {
            Decision::Allow
        }
    }

    pub fn decide(&self, intent: Intent) -> Decision {
        match intent {
            Intent::Rename => self.decide_rename(),
            Intent::Delete => self.decide_delete(),
            Intent::Modify => self.decide_modify(),
        }
    }
}

impl Default for NamespacePolicy {
    fn default() -> Self {
        Self::new(true)
    }
}
