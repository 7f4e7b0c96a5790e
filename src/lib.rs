//! Detect whether another instance of this program is already running.
//!
//! The detection is built on named kernel objects living in a private,
//! access-controlled namespace: a boundary descriptor restricted to the
//! administrators group, a namespace on top of it, and a mutex inside the
//! namespace whose prior existence means a peer instance is alive.
//!
//! ```no_run
//! use singleton::{GuardConfig, Outcome};
//!
//! let config = GuardConfig::from_env();
//! let mut report: Vec<String> = Vec::new();
//! let (guard, status) = singleton::check_singleton(&config, &mut report)?;
//! if status == Ok(Outcome::FirstInstance) {
//!     // application features are available while `guard` lives
//! }
//! drop(guard);
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io;

mod backend;
mod config;
mod error;
mod guard;
mod report;
mod status;
mod sys;

pub use backend::{Backend, Created};
pub use config::{
    GuardConfig, ADMIN_ONLY_ACCESS, DEFAULT_BOUNDARY, DEFAULT_NAMESPACE, MUTEX_LEAF, ROOT_ENV,
};
pub use error::{CheckError, OsError};
pub use guard::{InstanceGuard, Outcome};
pub use report::{colors_enabled, ReportSink, Tone, WriterSink};
pub use status::StatusRecord;
pub use sys::{native_backend, NativeBackend};

/// Public helper running the check against the platform backend.
///
/// The returned guard holds the claim; dropping it releases every handle.
/// Only configuration problems surface as `Err`; every OS-level outcome is
/// in the inner `Result`.
pub fn check_singleton(
    config: &GuardConfig,
    sink: &mut dyn ReportSink,
) -> io::Result<(InstanceGuard<NativeBackend>, Result<Outcome, CheckError>)> {
    config.validate()?;
    let backend = native_backend(config);
    let mut guard = InstanceGuard::new(backend);
    let status = guard.check(config, sink);
    Ok((guard, status))
}
