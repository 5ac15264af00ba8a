//! Shim control-socket addressing.
//!
//! A shim's address is `unix://<root>/s/<sha256(namespace/id)>`. Deriving
//! it needs no coordination: the manager and the shim compute the same
//! address from the same inputs, and the fixed-length digest keeps the
//! path well under the `sun_path` limit whatever the identifier length.

use std::fmt;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use conman_common::constants::{SOCKET_NAMESPACE, SOCKET_ROOT};
use conman_common::error::{ConmanError, Result};
use sha2::{Digest, Sha256};

const SCHEME: &str = "unix://";

/// A `unix://` address of a shim control socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShimAddress(String);

impl ShimAddress {
    /// Wraps an address string, adding the `unix://` scheme if missing.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        if addr.starts_with(SCHEME) {
            Self(addr)
        } else {
            Self(format!("{SCHEME}{addr}"))
        }
    }

    /// Returns the filesystem path of the socket.
    #[must_use]
    pub fn path(&self) -> &Path {
        Path::new(self.0.strip_prefix(SCHEME).unwrap_or(&self.0))
    }

    /// Returns the full address string, scheme included.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShimAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the address of the shim serving `id` within `namespace`, under
/// the fixed socket root.
#[must_use]
pub fn derive_address(namespace: &Path, id: &str) -> ShimAddress {
    derive_address_in(Path::new(SOCKET_ROOT), namespace, id)
}

/// Derives the address of the shim serving `id` in the default namespace.
#[must_use]
pub fn default_address(id: &str) -> ShimAddress {
    derive_address(Path::new(SOCKET_NAMESPACE), id)
}

/// Derives a shim address below an explicit socket root.
#[must_use]
pub fn derive_address_in(root: &Path, namespace: &Path, id: &str) -> ShimAddress {
    let digest = Sha256::digest(namespace.join(id).as_os_str().as_encoded_bytes());
    let path = root.join("s").join(hex::encode(digest));
    ShimAddress::new(path.display().to_string())
}

/// Binds a listener at `addr`, making one attempt.
///
/// The socket's parent directory is created (mode 0700) if needed, and the
/// socket file is restricted to mode 0600 once bound.
///
/// # Errors
///
/// Returns `Io` on failure; use [`is_addr_in_use`] to recognize a stale
/// socket left behind by a previous occupant.
pub fn bind_listener(addr: &ShimAddress) -> Result<UnixListener> {
    let path = addr.path();
    if let Some(parent) = path.parent() {
        crate::fs::create_dir_all(parent, 0o700)?;
    }
    let listener = UnixListener::bind(path).map_err(|e| ConmanError::io(path, e))?;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        drop(listener);
        let _ = fs::remove_file(path);
        return Err(ConmanError::io(path, e));
    }
    tracing::debug!(socket = %addr, "listener bound");
    Ok(listener)
}

/// Returns `true` if `err` reports that a socket address is already bound.
#[must_use]
pub fn is_addr_in_use(err: &ConmanError) -> bool {
    matches!(
        err.root(),
        ConmanError::Io { source, .. } if source.kind() == std::io::ErrorKind::AddrInUse
    )
}

/// Binds a listener at `addr`, replacing a stale socket file once.
///
/// # Errors
///
/// Returns the first error if it is anything but "address in use", and
/// the second error if the retry after removing the stale file fails.
pub fn listen(addr: &ShimAddress) -> Result<UnixListener> {
    match bind_listener(addr) {
        Ok(listener) => Ok(listener),
        Err(e) if is_addr_in_use(&e) => {
            tracing::warn!(socket = %addr, "removing stale socket");
            remove_socket(addr)?;
            bind_listener(addr)
        }
        Err(e) => Err(e),
    }
}

/// Removes the socket file behind `addr`. A missing file is not an error.
///
/// # Errors
///
/// Returns `Io` if the file exists but cannot be removed.
pub fn remove_socket(addr: &ShimAddress) -> Result<()> {
    match fs::remove_file(addr.path()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ConmanError::io(addr.path(), e)),
    }
}

/// Persists `addr` to `path` atomically.
///
/// Relative paths are resolved against the current working directory.
///
/// # Errors
///
/// Returns `Io` if the working directory or the file cannot be accessed.
pub fn write_address(path: &Path, addr: &ShimAddress) -> Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| ConmanError::io(path, e))?
            .join(path)
    };
    crate::fs::atomic_write(&path, addr.as_str().as_bytes(), 0o644)?;
    Ok(path)
}

/// Reads an address persisted by [`write_address`].
///
/// # Errors
///
/// Returns `Io` if the file cannot be read.
pub fn read_address(path: &Path) -> Result<ShimAddress> {
    let raw = fs::read_to_string(path).map_err(|e| ConmanError::io(path, e))?;
    Ok(ShimAddress::new(raw.trim()))
}
