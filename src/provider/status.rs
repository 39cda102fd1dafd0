use std::io;

use thiserror::Error;

use crate::core::StoreError;

/// Status code reported to the host for a successful callback.
pub const S_OK: i32 = 0;

/// Status returned to the virtualization host.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum ProjError {
    /// The path has no corresponding key or value.
    #[error("not found")]
    NotFound,

    /// Permission fault during lookup, or a rename blocked by policy.
    #[error("access denied")]
    AccessDenied,

    /// Unknown enumeration session.
    #[error("invalid argument")]
    InvalidArgument,

    /// A transfer buffer could not be acquired.
    #[error("out of memory")]
    OutOfMemory,

    /// A delete blocked by policy.
    #[error("cannot delete")]
    CannotDelete,

    #[error("internal error")]
    Internal,
}

impl ProjError {
    /// The exact status value the host expects.
    pub fn code(&self) -> i32 {
        let code: u32 = match self {
            ProjError::NotFound => 0x8007_0002,
            ProjError::AccessDenied => 0x8007_0005,
            ProjError::InvalidArgument => 0x8007_0057,
            ProjError::OutOfMemory => 0x8007_000E,
            // STATUS_CANNOT_DELETE carried as an NT-facility HRESULT
            ProjError::CannotDelete => 0xD000_0121,
            ProjError::Internal => 0x8000_FFFF,
        };
        code as i32
    }
}

pub type ProjResult<T> = Result<T, ProjError>;

/// Collapses a callback result into the status code handed to the host.
pub fn status_code<T>(result: &ProjResult<T>) -> i32 {
    match result {
        Ok(_) => S_OK,
        Err(e) => e.code(),
    }
}

impl From<StoreError> for ProjError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ProjError::NotFound,
            StoreError::AccessDenied(_) => ProjError::AccessDenied,
            StoreError::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => ProjError::NotFound,
                io::ErrorKind::PermissionDenied => ProjError::AccessDenied,
                _ => ProjError::Internal,
            },
        }
    }
}
