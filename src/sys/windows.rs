//! Private-namespace backend built directly on the Win32 API.
//!
//! Handles are kept as raw `isize` values, the same way the rest of the
//! `windows-sys` 0.52 surface represents them; `0` is the invalid value.

use std::iter::once;
use std::mem::size_of;
use std::ptr;

use log::debug;
use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, LocalFree, ERROR_ALREADY_EXISTS,
};
use windows_sys::Win32::Security::Authorization::{
    ConvertStringSecurityDescriptorToSecurityDescriptorW,
};
use windows_sys::Win32::Security::{
    CreateWellKnownSid, WinBuiltinAdministratorsSid, PSECURITY_DESCRIPTOR, SECURITY_ATTRIBUTES,
};
use windows_sys::Win32::System::Threading::{
    AddSIDToBoundaryDescriptor, ClosePrivateNamespace, CreateBoundaryDescriptorW, CreateMutexW,
    CreatePrivateNamespaceW, DeleteBoundaryDescriptor, OpenPrivateNamespaceW,
};

use crate::backend::{Backend, Created};
use crate::error::OsError;

// See `ClosePrivateNamespace` in namespaceapi.h.
const PRIVATE_NAMESPACE_FLAG_DESTROY: u32 = 0x0000_0001;
const SDDL_REVISION_1: u32 = 1;
const SECURITY_MAX_SID_SIZE: usize = 68;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(once(0)).collect()
}

fn last_error() -> OsError {
    // Safety: reads thread-local state only.
    OsError::from_win32(unsafe { GetLastError() })
}

#[derive(Debug, Default)]
pub struct PrivateNamespaceBackend;

impl PrivateNamespaceBackend {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
pub struct Boundary(isize);

pub struct Principal {
    sid: [u8; SECURITY_MAX_SID_SIZE],
}

/// Self-relative security descriptor allocated by
/// `ConvertStringSecurityDescriptorToSecurityDescriptorW`; freed on drop.
pub struct Security(PSECURITY_DESCRIPTOR);

impl Drop for Security {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // A failed LocalFree leaks a few bytes; nothing to report.
            unsafe {
                LocalFree(self.0 as _);
            }
        }
    }
}

#[derive(Debug)]
pub struct Namespace(isize);

#[derive(Debug)]
pub struct Lock(isize);

impl Backend for PrivateNamespaceBackend {
    type Boundary = Boundary;
    type Principal = Principal;
    type Security = Security;
    type Namespace = Namespace;
    type Lock = Lock;

    fn create_boundary(&mut self, name: &str) -> Result<Boundary, OsError> {
        let name = wide(name);
        let handle = unsafe { CreateBoundaryDescriptorW(name.as_ptr(), 0) } as isize;
        if handle == 0 {
            return Err(last_error());
        }
        debug!("boundary descriptor {handle:#x}");
        Ok(Boundary(handle))
    }

    fn resolve_admin_principal(&mut self) -> Result<Principal, OsError> {
        let mut principal = Principal {
            sid: [0u8; SECURITY_MAX_SID_SIZE],
        };
        let mut cb_sid = SECURITY_MAX_SID_SIZE as u32;
        let ok = unsafe {
            CreateWellKnownSid(
                WinBuiltinAdministratorsSid,
                ptr::null_mut(),
                principal.sid.as_mut_ptr().cast(),
                &mut cb_sid,
            )
        };
        if ok == 0 {
            return Err(last_error());
        }
        Ok(principal)
    }

    fn attach_principal(
        &mut self,
        boundary: &mut Boundary,
        principal: &Principal,
    ) -> Result<(), OsError> {
        // The API may reallocate the descriptor and writes the new handle
        // back through the pointer.
        let mut sid = principal.sid;
        let ok = unsafe {
            AddSIDToBoundaryDescriptor(
                (&mut boundary.0 as *mut isize).cast(),
                sid.as_mut_ptr().cast(),
            )
        };
        if ok == 0 {
            return Err(last_error());
        }
        Ok(())
    }

    fn build_security(&mut self, access: &str) -> Result<Security, OsError> {
        let sddl = wide(access);
        let mut descriptor: PSECURITY_DESCRIPTOR = ptr::null_mut();
        let ok = unsafe {
            ConvertStringSecurityDescriptorToSecurityDescriptorW(
                sddl.as_ptr(),
                SDDL_REVISION_1,
                &mut descriptor,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(last_error());
        }
        Ok(Security(descriptor))
    }

    fn create_namespace(
        &mut self,
        boundary: &Boundary,
        security: &Security,
        name: &str,
    ) -> Result<Namespace, OsError> {
        let alias = wide(name);
        let attributes = SECURITY_ATTRIBUTES {
            nLength: size_of::<SECURITY_ATTRIBUTES>() as u32,
            lpSecurityDescriptor: security.0,
            bInheritHandle: 0,
        };
        let handle = unsafe {
            CreatePrivateNamespaceW(&attributes, boundary.0 as _, alias.as_ptr())
        } as isize;
        // Read the error before anything else can overwrite it.
        let err = last_error();
        if handle == 0 {
            return Err(err);
        }
        Ok(Namespace(handle))
    }

    fn open_namespace(&mut self, boundary: &Boundary, name: &str) -> Result<Namespace, OsError> {
        let alias = wide(name);
        let handle = unsafe { OpenPrivateNamespaceW(boundary.0 as _, alias.as_ptr()) } as isize;
        if handle == 0 {
            return Err(last_error());
        }
        Ok(Namespace(handle))
    }

    fn create_mutex(
        &mut self,
        _namespace: &Namespace,
        name: &str,
    ) -> Result<Created<Lock>, OsError> {
        // The namespace handle only has to stay open; the kernel resolves the
        // "<alias>\<name>" prefix itself.
        let name = wide(name);
        let handle = unsafe { CreateMutexW(ptr::null(), 0, name.as_ptr()) } as isize;
        let err = last_error();
        if handle == 0 {
            return Err(err);
        }
        Ok(Created {
            handle: Lock(handle),
            already_existed: err.code() == ERROR_ALREADY_EXISTS,
        })
    }

    fn close_mutex(&mut self, lock: Lock) -> Result<(), OsError> {
        if unsafe { CloseHandle(lock.0 as _) } == 0 {
            return Err(last_error());
        }
        Ok(())
    }

    fn close_namespace(&mut self, namespace: Namespace, destroy: bool) -> Result<(), OsError> {
        let flags = if destroy { PRIVATE_NAMESPACE_FLAG_DESTROY } else { 0 };
        if unsafe { ClosePrivateNamespace(namespace.0 as _, flags) } == 0 {
            return Err(last_error());
        }
        Ok(())
    }

    fn delete_boundary(&mut self, boundary: Boundary) -> Result<(), OsError> {
        unsafe { DeleteBoundaryDescriptor(boundary.0 as _) };
        Ok(())
    }
}
