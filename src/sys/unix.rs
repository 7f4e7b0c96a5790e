//! Reduced-guarantee fallback for platforms without private namespaces.
//!
//! * boundary  – in-process descriptor naming `<root>/<boundary>`
//! * principal – the caller's effective uid, not the administrators group
//! * namespace – directory `<root>/<boundary>/<namespace>`, mode `0700`;
//!   `mkdir` succeeding makes this process the owner
//! * mutex     – exclusive advisory lock on `<namespace dir>/<leaf>.lock`;
//!   contention means another instance got there first
//!
//! Atomicity comes from `mkdir` and `flock`, the same way the kernel makes
//! `CreatePrivateNamespace` and `CreateMutex` atomic on Windows.

use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::debug;

use crate::backend::{Backend, Created};
use crate::error::OsError;

#[derive(Debug)]
pub struct LockDirBackend {
    root: PathBuf,
}

impl LockDirBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[derive(Debug)]
pub struct Boundary {
    dir: PathBuf,
    principals: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
pub struct Principal {
    uid: u32,
}

/// Permission bits applied to a namespace directory we create.
#[derive(Debug, Clone, Copy)]
pub struct Security {
    mode: u32,
}

#[derive(Debug)]
pub struct Namespace {
    dir: PathBuf,
}

#[derive(Debug)]
pub struct Lock {
    _file: File,
    path: PathBuf,
}

fn os_err(err: io::Error) -> OsError {
    OsError::from_io(&err)
}

fn effective_uid() -> u32 {
    // Safety: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() as u32 }
}

fn lock_path(namespace: &Namespace, mutex_name: &str) -> PathBuf {
    // The name arrives as "<namespace>\<leaf>"; the namespace part is the
    // directory we already resolved.
    let leaf = mutex_name.rsplit('\\').next().unwrap_or(mutex_name);
    namespace.dir.join(format!("{leaf}.lock"))
}

/// True when `path` still names the inode `file` refers to. A destroying
/// owner may unlink the lock file between our open and our lock.
fn same_file(file: &File, path: &Path) -> io::Result<bool> {
    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

impl Backend for LockDirBackend {
    type Boundary = Boundary;
    type Principal = Principal;
    type Security = Security;
    type Namespace = Namespace;
    type Lock = Lock;

    fn create_boundary(&mut self, name: &str) -> Result<Boundary, OsError> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir).map_err(os_err)?;
        Ok(Boundary {
            dir,
            principals: Vec::new(),
        })
    }

    fn resolve_admin_principal(&mut self) -> Result<Principal, OsError> {
        Ok(Principal {
            uid: effective_uid(),
        })
    }

    fn attach_principal(
        &mut self,
        boundary: &mut Boundary,
        principal: &Principal,
    ) -> Result<(), OsError> {
        boundary.principals.push(principal.uid);
        Ok(())
    }

    fn build_security(&mut self, access: &str) -> Result<Security, OsError> {
        // Only the owner-only shape of the SDDL expression has a POSIX
        // counterpart.
        debug!("mapping access expression '{access}' to mode 0700");
        Ok(Security { mode: 0o700 })
    }

    fn create_namespace(
        &mut self,
        boundary: &Boundary,
        security: &Security,
        name: &str,
    ) -> Result<Namespace, OsError> {
        let dir = boundary.dir.join(name);
        DirBuilder::new()
            .mode(security.mode)
            .create(&dir)
            .map_err(os_err)?;
        Ok(Namespace { dir })
    }

    fn open_namespace(&mut self, boundary: &Boundary, name: &str) -> Result<Namespace, OsError> {
        let dir = boundary.dir.join(name);
        let meta = fs::metadata(&dir).map_err(os_err)?;
        if !meta.is_dir() {
            return Err(OsError::new(io::ErrorKind::Other, libc::ENOTDIR as u32));
        }
        if !boundary.principals.contains(&meta.uid()) {
            return Err(OsError::new(
                io::ErrorKind::PermissionDenied,
                libc::EACCES as u32,
            ));
        }
        Ok(Namespace { dir })
    }

    fn create_mutex(
        &mut self,
        namespace: &Namespace,
        name: &str,
    ) -> Result<Created<Lock>, OsError> {
        let path = lock_path(namespace, name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(os_err)?;

        let already_existed = match file.try_lock_exclusive() {
            Ok(()) => false,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(e) => return Err(os_err(e)),
        };

        if !already_existed && !same_file(&file, &path).map_err(os_err)? {
            return Err(OsError::new(io::ErrorKind::Other, libc::ESTALE as u32));
        }

        Ok(Created {
            handle: Lock { _file: file, path },
            already_existed,
        })
    }

    fn close_mutex(&mut self, lock: Lock) -> Result<(), OsError> {
        debug!("closing {}", lock.path.display());
        drop(lock);
        Ok(())
    }

    fn close_namespace(&mut self, namespace: Namespace, destroy: bool) -> Result<(), OsError> {
        if !destroy {
            return Ok(());
        }

        // Remove lock files only while holding them ourselves, so a live
        // first instance that merely opened our namespace keeps its claim.
        let entries = match fs::read_dir(&namespace.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(os_err(e)),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("lock") {
                continue;
            }
            let Ok(file) = OpenOptions::new().write(true).open(&path) else {
                continue;
            };
            if file.try_lock_exclusive().is_ok() {
                fs::remove_file(&path).map_err(os_err)?;
            } else {
                debug!("{} still held, keeping namespace", path.display());
                return Ok(());
            }
        }

        match fs::remove_dir(&namespace.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(os_err(e)),
        }
    }

    fn delete_boundary(&mut self, boundary: Boundary) -> Result<(), OsError> {
        // The boundary directory is shared by every instance; only the local
        // descriptor goes away.
        drop(boundary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn claim(backend: &mut LockDirBackend) -> (Boundary, Namespace, Created<Lock>, bool) {
        let mut boundary = backend.create_boundary("b").unwrap();
        let principal = backend.resolve_admin_principal().unwrap();
        backend.attach_principal(&mut boundary, &principal).unwrap();
        let security = backend.build_security("D:(A;;GA;;;BA)").unwrap();
        let (namespace, owner) = match backend.create_namespace(&boundary, &security, "ns") {
            Ok(ns) => (ns, true),
            Err(e) => {
                assert!(e.is_already_exists());
                (backend.open_namespace(&boundary, "ns").unwrap(), false)
            }
        };
        let lock = backend.create_mutex(&namespace, "ns\\Singleton").unwrap();
        (boundary, namespace, lock, owner)
    }

    #[test]
    fn second_claim_sees_existing_mutex() {
        let tmp = TempDir::new().unwrap();
        let mut a = LockDirBackend::new(tmp.path());
        let mut b = LockDirBackend::new(tmp.path());

        let (_ba, _na, la, owner_a) = claim(&mut a);
        let (_bb, _nb, lb, owner_b) = claim(&mut b);

        assert!(owner_a && !owner_b);
        assert!(!la.already_existed);
        assert!(lb.already_existed);
        assert!(tmp.path().join("b/ns/Singleton.lock").exists());
    }

    #[test]
    fn owner_destroy_removes_namespace_directory() {
        let tmp = TempDir::new().unwrap();
        let mut a = LockDirBackend::new(tmp.path());
        let (boundary, namespace, lock, owner) = claim(&mut a);
        assert!(owner);

        a.close_mutex(lock.handle).unwrap();
        a.close_namespace(namespace, true).unwrap();
        a.delete_boundary(boundary).unwrap();

        assert!(!tmp.path().join("b/ns").exists());
        assert!(tmp.path().join("b").exists());
    }

    #[test]
    fn destroy_keeps_namespace_while_lock_is_held_elsewhere() {
        let tmp = TempDir::new().unwrap();
        let mut owner = LockDirBackend::new(tmp.path());
        let mut other = LockDirBackend::new(tmp.path());

        let (_b1, ns1, lock1, _) = claim(&mut owner);
        // Hand the claim over: owner's mutex goes away first, then another
        // process takes the lock before the owner destroys the namespace.
        owner.close_mutex(lock1.handle).unwrap();
        let (_b2, _ns2, lock2, owner2) = claim(&mut other);
        assert!(!owner2);
        assert!(!lock2.already_existed);

        owner.close_namespace(ns1, true).unwrap();
        assert!(tmp.path().join("b/ns/Singleton.lock").exists());
    }
}
