//! Error types shared by the guard and the platform backends.

use std::fmt;
use std::io;

/// Failure reported by a single OS call.
///
/// `code` is the raw platform error number (`GetLastError` on Windows,
/// `errno` elsewhere) and is what ends up in the report. `kind` is the
/// portable classification the guard branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsError {
    kind: io::ErrorKind,
    code: u32,
}

impl OsError {
    pub fn new(kind: io::ErrorKind, code: u32) -> Self {
        Self { kind, code }
    }

    /// Classify a raw Windows error code.
    pub fn from_win32(code: u32) -> Self {
        const ERROR_ACCESS_DENIED: u32 = 5;
        const ERROR_ALREADY_EXISTS: u32 = 183;

        let kind = match code {
            ERROR_ACCESS_DENIED => io::ErrorKind::PermissionDenied,
            ERROR_ALREADY_EXISTS => io::ErrorKind::AlreadyExists,
            _ => io::ErrorKind::Other,
        };
        Self { kind, code }
    }

    /// Convert an `io::Error`, keeping its raw OS code when it has one.
    pub fn from_io(err: &io::Error) -> Self {
        let code = err.raw_os_error().map(|c| c as u32).unwrap_or(0);
        Self {
            kind: err.kind(),
            code,
        }
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.kind
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn is_access_denied(&self) -> bool {
        self.kind == io::ErrorKind::PermissionDenied
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == io::ErrorKind::AlreadyExists
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl std::error::Error for OsError {}

/// Terminal failure of the single-instance check. None of these are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    #[error("boundary descriptor creation failed: {0}")]
    BoundaryCreationFailed(OsError),

    #[error("administrators principal could not be resolved: {0}")]
    PrincipalResolutionFailed(OsError),

    #[error("principal could not be attached to the boundary: {0}")]
    PrincipalAttachFailed(OsError),

    #[error("security descriptor creation failed: {0}")]
    SecurityDescriptorBuildFailed(OsError),

    #[error("access denied when creating the namespace")]
    AccessDenied,

    #[error("namespace exists but could not be opened: {0}")]
    NamespaceOpenFailed(OsError),

    #[error("unexpected namespace failure: {0}")]
    UnexpectedNamespaceFailure(OsError),

    #[error("singleton mutex creation failed: {0}")]
    MutexCreationFailed(OsError),
}

impl CheckError {
    /// Raw OS code carried by the failure, if any.
    pub fn os_code(&self) -> Option<u32> {
        match self {
            CheckError::BoundaryCreationFailed(e)
            | CheckError::PrincipalResolutionFailed(e)
            | CheckError::PrincipalAttachFailed(e)
            | CheckError::SecurityDescriptorBuildFailed(e)
            | CheckError::NamespaceOpenFailed(e)
            | CheckError::UnexpectedNamespaceFailure(e)
            | CheckError::MutexCreationFailed(e) => Some(e.code()),
            CheckError::AccessDenied => None,
        }
    }

    /// Stable snake_case name used in machine-readable output.
    pub fn name(&self) -> &'static str {
        match self {
            CheckError::BoundaryCreationFailed(_) => "boundary_creation_failed",
            CheckError::PrincipalResolutionFailed(_) => "principal_resolution_failed",
            CheckError::PrincipalAttachFailed(_) => "principal_attach_failed",
            CheckError::SecurityDescriptorBuildFailed(_) => "security_descriptor_build_failed",
            CheckError::AccessDenied => "access_denied",
            CheckError::NamespaceOpenFailed(_) => "namespace_open_failed",
            CheckError::UnexpectedNamespaceFailure(_) => "unexpected_namespace_failure",
            CheckError::MutexCreationFailed(_) => "mutex_creation_failed",
        }
    }
}
