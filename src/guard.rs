//! The single-instance detection sequence.
//!
//! [`InstanceGuard::check`] walks boundary → principal → namespace → mutex,
//! stops at the first failure, and leaves every handle it obtained inside the
//! guard. [`InstanceGuard::release_all`] gives them back in the mirrored
//! order: mutex → namespace → boundary.

use log::{debug, warn};
use serde::Serialize;

use crate::backend::Backend;
use crate::config::GuardConfig;
use crate::error::CheckError;
use crate::report::{ReportSink, Tone};

/// Outcome of a successful check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    FirstInstance,
    AlreadyRunning,
}

pub struct InstanceGuard<B: Backend> {
    backend: B,
    boundary: Option<B::Boundary>,
    namespace: Option<B::Namespace>,
    lock: Option<B::Lock>,
    owns_namespace: bool,
}

impl<B: Backend> InstanceGuard<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            boundary: None,
            namespace: None,
            lock: None,
            owns_namespace: false,
        }
    }

    /// Run the detection sequence and report every branch taken to `sink`.
    ///
    /// Handles acquired before a failure stay in the guard and are released
    /// by [`release_all`](Self::release_all) or on drop. A guard that still
    /// holds handles from a previous check releases them first.
    pub fn check(
        &mut self,
        config: &GuardConfig,
        sink: &mut dyn ReportSink,
    ) -> Result<Outcome, CheckError> {
        self.release_all();

        debug!("creating boundary descriptor '{}'", config.boundary);
        let boundary = match self.backend.create_boundary(&config.boundary) {
            Ok(b) => self.boundary.insert(b),
            Err(e) => {
                sink.append_styled(
                    Tone::Failure,
                    &format!("CreateBoundaryDescriptor failed: {}", e.code()),
                );
                return Err(CheckError::BoundaryCreationFailed(e));
            }
        };

        let principal = match self.backend.resolve_admin_principal() {
            Ok(p) => p,
            Err(e) => {
                sink.append_styled(
                    Tone::Failure,
                    &format!("AddSIDToBoundaryDescriptor failed: {}", e.code()),
                );
                return Err(CheckError::PrincipalResolutionFailed(e));
            }
        };

        // Only callers matching the principal can reach objects created in
        // namespaces built on this boundary.
        if let Err(e) = self.backend.attach_principal(boundary, &principal) {
            sink.append_styled(
                Tone::Failure,
                &format!("AddSIDToBoundaryDescriptor failed: {}", e.code()),
            );
            return Err(CheckError::PrincipalAttachFailed(e));
        }

        let security = match self.backend.build_security(&config.access) {
            Ok(s) => s,
            Err(e) => {
                sink.append_styled(
                    Tone::Failure,
                    &format!("Security Descriptor creation failed: {}", e.code()),
                );
                return Err(CheckError::SecurityDescriptorBuildFailed(e));
            }
        };

        debug!("creating namespace '{}'", config.namespace);
        let created = self
            .backend
            .create_namespace(boundary, &security, &config.namespace);
        drop(security);

        let namespace = match created {
            Ok(ns) => {
                self.owns_namespace = true;
                ns
            }
            Err(e) if e.is_access_denied() => {
                sink.append_styled(Tone::Failure, "Access denied when creating the namespace.");
                sink.append_line("   You must be running as Administrator.");
                return Err(CheckError::AccessDenied);
            }
            Err(e) if e.is_already_exists() => {
                // Another instance owns the namespace; attach to it instead.
                sink.append_line(&format!("CreatePrivateNamespace failed: {}", e.code()));
                match self.backend.open_namespace(boundary, &config.namespace) {
                    Ok(ns) => {
                        sink.append_line("   but OpenPrivateNamespace succeeded");
                        self.owns_namespace = false;
                        ns
                    }
                    Err(open_err) => {
                        sink.append_styled(
                            Tone::Failure,
                            &format!("   and OpenPrivateNamespace failed: {}", open_err.code()),
                        );
                        return Err(CheckError::NamespaceOpenFailed(open_err));
                    }
                }
            }
            Err(e) => {
                sink.append_styled(
                    Tone::Failure,
                    &format!("Unexpected error occured: {}", e.code()),
                );
                return Err(CheckError::UnexpectedNamespaceFailure(e));
            }
        };
        let namespace = self.namespace.insert(namespace);
        debug!(
            "namespace '{}' {}",
            config.namespace,
            if self.owns_namespace { "created" } else { "opened" }
        );

        let mutex_name = config.mutex_name();
        let created = match self.backend.create_mutex(namespace, &mutex_name) {
            Ok(c) => c,
            Err(e) => {
                sink.append_styled(Tone::Failure, &format!("CreateMutex failed: {}", e.code()));
                return Err(CheckError::MutexCreationFailed(e));
            }
        };

        // Keep the handle either way: the name stays reserved for as long as
        // any instance holding it is alive.
        self.lock = Some(created.handle);

        if created.already_existed {
            debug!("mutex '{mutex_name}' already existed");
            sink.append_styled(Tone::Warning, "Another instance of Singleton is running:");
            sink.append_line("--> Impossible to access application features.");
            Ok(Outcome::AlreadyRunning)
        } else {
            debug!("mutex '{mutex_name}' created");
            sink.append_styled(Tone::Success, "First instance of Singleton:");
            sink.append_line("--> Access application features now.");
            Ok(Outcome::FirstInstance)
        }
    }

    /// Whether this process created (and will destroy) the namespace.
    pub fn owns_namespace(&self) -> bool {
        self.namespace.is_some() && self.owns_namespace
    }

    /// Whether any handle is currently held.
    pub fn is_holding(&self) -> bool {
        self.boundary.is_some() || self.namespace.is_some() || self.lock.is_some()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Release everything in mutex → namespace → boundary order.
    ///
    /// A failing step is logged and never prevents the following ones.
    /// Calling this with nothing held is a no-op.
    pub fn release_all(&mut self) {
        if let Some(lock) = self.lock.take() {
            if let Err(e) = self.backend.close_mutex(lock) {
                warn!("closing singleton mutex failed: {}", e.code());
            }
        }

        if let Some(namespace) = self.namespace.take() {
            // An opener must leave the owner's reservation intact.
            let destroy = self.owns_namespace;
            if let Err(e) = self.backend.close_namespace(namespace, destroy) {
                warn!("closing namespace (destroy={destroy}) failed: {}", e.code());
            }
        }
        self.owns_namespace = false;

        if let Some(boundary) = self.boundary.take() {
            if let Err(e) = self.backend.delete_boundary(boundary) {
                warn!("deleting boundary descriptor failed: {}", e.code());
            }
        }
    }
}

impl<B: Backend> Drop for InstanceGuard<B> {
    fn drop(&mut self) {
        self.release_all();
    }
}
