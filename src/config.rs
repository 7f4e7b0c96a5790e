use std::env;
use std::io;
use std::path::PathBuf;

/// Boundary name shared by every cooperating instance.
pub const DEFAULT_BOUNDARY: &str = "3-Boundary";
/// Private namespace alias shared by every cooperating instance.
pub const DEFAULT_NAMESPACE: &str = "3-Namespace";
/// Leaf name of the mutex created inside the namespace.
pub const MUTEX_LEAF: &str = "Singleton";
/// SDDL granting generic-all to the built-in administrators group only.
pub const ADMIN_ONLY_ACCESS: &str = "D:(A;;GA;;;BA)";

/// Environment variable overriding the root of the fallback backend.
pub const ROOT_ENV: &str = "SINGLETON_DIR";

/// Names and locations the guard works with.
///
/// The defaults form the contract between instances: two processes only see
/// each other when every field matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub boundary: String,
    pub namespace: String,
    pub access: String,
    pub root: PathBuf,
}

impl GuardConfig {
    /// Configuration with the fixed identifiers and the root taken from
    /// `SINGLETON_DIR` (or a per-user directory under the temp directory).
    pub fn from_env() -> Self {
        Self {
            boundary: DEFAULT_BOUNDARY.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            access: ADMIN_ONLY_ACCESS.to_string(),
            root: default_root(),
        }
    }

    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Full mutex name, prefixed by the namespace alias.
    pub fn mutex_name(&self) -> String {
        format!("{}\\{}", self.namespace, MUTEX_LEAF)
    }

    /// Reject names that would not round-trip through every backend.
    pub fn validate(&self) -> io::Result<()> {
        validate_name("boundary", &self.boundary)?;
        validate_name("namespace", &self.namespace)?;
        Ok(())
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn default_root() -> PathBuf {
    if let Some(p) = env::var_os(ROOT_ENV) {
        PathBuf::from(p)
    } else {
        per_user_root(env::temp_dir())
    }
}

/// The fallback scopes namespaces to a uid; a root shared between users would
/// let the first one to run lock every other user out of the boundary.
#[cfg(unix)]
fn per_user_root(mut base: PathBuf) -> PathBuf {
    // Safety: geteuid has no preconditions and cannot fail.
    let uid = unsafe { libc::geteuid() };
    base.push(format!("singleton-{uid}"));
    base
}

#[cfg(not(unix))]
fn per_user_root(mut base: PathBuf) -> PathBuf {
    base.push("singleton");
    base
}

// Rules:
//   • ASCII letters, digits, dash, underscore, and single dots are allowed
//   • No leading dot, no repeated dots ("..")
//   • Maximum length 100 codepoints
//   • No path separators; Windows treats `\` as the namespace delimiter
//   • Must be in Unicode NFC normal form (if non-ASCII)
fn validate_name(what: &str, name: &str) -> io::Result<()> {
    let invalid = |msg: String| io::Error::new(io::ErrorKind::InvalidInput, msg);

    if name.trim().is_empty() {
        return Err(invalid(format!("{what} name cannot be empty")));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(invalid(format!("{what} name must not contain path separators")));
    }

    if name.chars().count() > 100 {
        return Err(invalid(format!("{what} name must not exceed 100 characters")));
    }

    if name.starts_with('.') || name.contains("..") {
        return Err(invalid(format!(
            "{what} name must not start with a dot or contain repeated dots"
        )));
    }

    if !name.chars().all(|c| {
        if c.is_ascii() {
            c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
        } else {
            !c.is_control()
        }
    }) {
        return Err(invalid(format!("{what} name contains invalid characters")));
    }

    use unicode_normalization::UnicodeNormalization;
    if name.nfc().collect::<String>() != name {
        return Err(invalid(format!("{what} name must be Unicode NFC normalised")));
    }

    Ok(())
}
