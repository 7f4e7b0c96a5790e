//! Seam between the platform-neutral detection sequence and the OS objects
//! it is built on.
//!
//! Each platform provides one [`Backend`]. The guard owns every handle a
//! backend hands out and gives each one back exactly once through the
//! matching release method.

use crate::error::OsError;

/// Result of creating a named object that may already exist.
#[derive(Debug)]
pub struct Created<T> {
    pub handle: T,
    pub already_existed: bool,
}

pub trait Backend {
    /// Local boundary descriptor. Always owned by the process that built it.
    type Boundary;
    /// The well-known administrators principal.
    type Principal;
    /// Access-control description applied to a freshly created namespace.
    type Security;
    /// Handle to a created or opened namespace.
    type Namespace;
    /// Handle to the singleton mutex.
    type Lock;

    fn create_boundary(&mut self, name: &str) -> Result<Self::Boundary, OsError>;

    fn resolve_admin_principal(&mut self) -> Result<Self::Principal, OsError>;

    fn attach_principal(
        &mut self,
        boundary: &mut Self::Boundary,
        principal: &Self::Principal,
    ) -> Result<(), OsError>;

    /// Build the security descriptor from an SDDL access expression. The
    /// value is dropped right after the namespace creation attempt.
    fn build_security(&mut self, access: &str) -> Result<Self::Security, OsError>;

    /// Create the namespace. Fails with an `AlreadyExists` error when
    /// another process owns it, and `PermissionDenied` when the caller is
    /// not part of the boundary's principal filter.
    fn create_namespace(
        &mut self,
        boundary: &Self::Boundary,
        security: &Self::Security,
        name: &str,
    ) -> Result<Self::Namespace, OsError>;

    fn open_namespace(
        &mut self,
        boundary: &Self::Boundary,
        name: &str,
    ) -> Result<Self::Namespace, OsError>;

    /// Create the mutex `name` (prefixed with the namespace alias) and report
    /// whether it existed before the call.
    fn create_mutex(
        &mut self,
        namespace: &Self::Namespace,
        name: &str,
    ) -> Result<Created<Self::Lock>, OsError>;

    fn close_mutex(&mut self, lock: Self::Lock) -> Result<(), OsError>;

    /// Close the namespace handle; `destroy` additionally removes the name so
    /// a future first instance can create it again.
    fn close_namespace(&mut self, namespace: Self::Namespace, destroy: bool) -> Result<(), OsError>;

    fn delete_boundary(&mut self, boundary: Self::Boundary) -> Result<(), OsError>;
}
