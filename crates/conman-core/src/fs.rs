//! Filesystem helpers for container layouts.
//!
//! [`atomic_write`] is the single persistence primitive of the workspace:
//! content goes to a uniquely named temporary file in the destination
//! directory and is renamed over the target, so a reader opening the
//! target sees either the previous or the new content in full.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use conman_common::error::{ConmanError, Result};

/// Returns whether `path` exists, distinguishing "absent" from "cannot tell".
///
/// # Errors
///
/// Returns `Io` if the existence check itself fails (e.g. permission denied
/// on a parent directory).
pub fn exists(path: &Path) -> Result<bool> {
    path.try_exists().map_err(|e| ConmanError::io(path, e))
}

/// Creates `path` and all missing parents with the given mode.
///
/// # Errors
///
/// Returns `Io` if any directory cannot be created.
pub fn create_dir_all(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
        .map_err(|e| ConmanError::io(path, e))
}

/// Atomically replaces `path` with `contents`.
///
/// # Errors
///
/// Returns `Io` if the temporary file cannot be written or renamed. The
/// temporary file is removed on failure.
pub fn atomic_write(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let tmp = temp_path_for(path)?;
    let written = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(&tmp)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(ConmanError::io(path, e));
    }
    tracing::trace!(path = %path.display(), bytes = contents.len(), "atomic write");
    Ok(())
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| ConmanError::InvalidArgument {
            message: format!("{} has no file name", path.display()),
        })?
        .to_string_lossy();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let nonce: u64 = rand::random();
    Ok(dir.join(format!(".{name}.{nonce:016x}.tmp")))
}

/// Recursively copies the directory tree at `src` into `dst`.
///
/// Regular files keep their permission bits, directories are recreated,
/// and symbolic links are recreated pointing at the same target rather
/// than followed. `dst` is created if missing.
///
/// # Errors
///
/// Returns `Io` naming the first path that could not be read or written.
/// Entries copied before the failure are left in place.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::metadata(src).map_err(|e| ConmanError::io(src, e))?;
    if !meta.is_dir() {
        return Err(ConmanError::InvalidArgument {
            message: format!("{} is not a directory", src.display()),
        });
    }
    fs::create_dir_all(dst).map_err(|e| ConmanError::io(dst, e))?;

    for entry in fs::read_dir(src).map_err(|e| ConmanError::io(src, e))? {
        let entry = entry.map_err(|e| ConmanError::io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| ConmanError::io(&from, e))?;

        if file_type.is_dir() {
            copy_dir(&from, &to)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(&from).map_err(|e| ConmanError::io(&from, e))?;
            std::os::unix::fs::symlink(&target, &to).map_err(|e| ConmanError::io(&to, e))?;
        } else {
            let _ = fs::copy(&from, &to).map_err(|e| ConmanError::io(&from, e))?;
        }
    }
    // Read-only source directories must stay writable until filled.
    fs::set_permissions(dst, meta.permissions()).map_err(|e| ConmanError::io(dst, e))
}

/// Returns the permission bits of `path`.
///
/// # Errors
///
/// Returns `Io` if the metadata cannot be read.
pub fn mode(path: &Path) -> Result<u32> {
    fs::symlink_metadata(path)
        .map(|m| m.permissions().mode() & 0o7777)
        .map_err(|e| ConmanError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exists_reports_presence() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(exists(dir.path()).expect("check"));
        assert!(!exists(&dir.path().join("missing")).expect("check"));
    }

    #[test]
    fn atomic_write_replaces_content_and_leaves_no_temp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        atomic_write(&path, b"created", 0o600).expect("first write");
        atomic_write(&path, b"running", 0o600).expect("second write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "running");
        let names: Vec<_> = fs::read_dir(dir.path())
            .expect("readdir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("state.json")]);
        assert_eq!(mode(&path).expect("mode"), 0o600);
    }

    #[test]
    fn atomic_write_into_missing_dir_fails_with_io() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = atomic_write(&dir.path().join("nope/state.json"), b"x", 0o600).unwrap_err();
        assert_eq!(err.kind(), conman_common::error::ErrorKind::Io);
    }

    #[test]
    fn create_dir_all_applies_mode() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("a/b");
        create_dir_all(&target, 0o700).expect("mkdir");
        assert_eq!(mode(&target).expect("mode"), 0o700);
    }

    #[test]
    fn copy_dir_copies_nested_tree_and_symlinks() {
        let src = tempfile::tempdir().expect("src");
        let dst = tempfile::tempdir().expect("dst");
        fs::create_dir_all(src.path().join("bin")).expect("mkdir");
        fs::write(src.path().join("bin/echo"), b"#!/bin/sh\n").expect("write");
        fs::set_permissions(src.path().join("bin/echo"), fs::Permissions::from_mode(0o755))
            .expect("chmod");
        std::os::unix::fs::symlink("bin/echo", src.path().join("echo")).expect("symlink");

        let target = dst.path().join("rootfs");
        copy_dir(src.path(), &target).expect("copy");

        assert_eq!(fs::read(target.join("bin/echo")).expect("read"), b"#!/bin/sh\n");
        assert_eq!(mode(&target.join("bin/echo")).expect("mode"), 0o755);
        assert_eq!(
            fs::read_link(target.join("echo")).expect("readlink"),
            PathBuf::from("bin/echo")
        );
    }

    #[test]
    fn copy_dir_fills_read_only_directories() {
        let src = tempfile::tempdir().expect("src");
        let dst = tempfile::tempdir().expect("dst");
        let proc_dir = src.path().join("proc");
        fs::create_dir(&proc_dir).expect("mkdir");
        fs::write(proc_dir.join("stub"), b"x").expect("write");
        fs::set_permissions(&proc_dir, fs::Permissions::from_mode(0o555)).expect("chmod");

        let target = dst.path().join("rootfs");
        let copied = copy_dir(src.path(), &target);

        fs::set_permissions(&proc_dir, fs::Permissions::from_mode(0o755)).expect("restore");
        copied.expect("copy");
        let copied_mode = mode(&target.join("proc")).expect("mode");
        fs::set_permissions(target.join("proc"), fs::Permissions::from_mode(0o755))
            .expect("restore");
        assert_eq!(copied_mode, 0o555);
        assert_eq!(fs::read(target.join("proc/stub")).expect("read"), b"x");
    }

    #[test]
    fn copy_dir_missing_source_is_io() {
        let dst = tempfile::tempdir().expect("dst");
        let err = copy_dir(Path::new("/definitely/not/here"), dst.path()).unwrap_err();
        assert_eq!(err.kind(), conman_common::error::ErrorKind::Io);
    }
}
