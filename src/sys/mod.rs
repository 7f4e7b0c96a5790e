//! Platform backends. Exactly one of them is exported as [`NativeBackend`].

use crate::config::GuardConfig;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use self::unix::LockDirBackend as NativeBackend;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::PrivateNamespaceBackend as NativeBackend;

/// Build the backend for the current platform.
///
/// Nothing is touched on disk here; a root that cannot be created surfaces
/// as a boundary creation failure in the report.
#[cfg(unix)]
pub fn native_backend(config: &GuardConfig) -> NativeBackend {
    NativeBackend::new(config.root.clone())
}

/// Build the backend for the current platform.
#[cfg(windows)]
pub fn native_backend(_config: &GuardConfig) -> NativeBackend {
    NativeBackend::new()
}
