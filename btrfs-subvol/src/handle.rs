// SPDX-License-Identifier: GPL-3.0-only

//! Opening and inspecting filesystem locations

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use btrfs_subvol_sys::ioctl::{self, BTRFS_SUBVOL_NAME_MAX, BTRFS_SUPER_MAGIC};
use btrfs_subvol_sys::items::BTRFS_FIRST_FREE_OBJECTID;
use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::sys::stat::{self, Mode, SFlag};
use nix::unistd::{self, UnlinkatFlags};

use crate::error::{BtrfsError, ErrorKind, OrKind, Result};

/// Descriptor of the directory a traversal runs against.
///
/// A traversal started from a path owns the descriptor it opened; one
/// started from a caller's descriptor only borrows it.
#[derive(Debug)]
pub enum RootFd<'fd> {
    Owned(OwnedFd),
    Borrowed(BorrowedFd<'fd>),
}

impl AsFd for RootFd<'_> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            RootFd::Owned(fd) => fd.as_fd(),
            RootFd::Borrowed(fd) => *fd,
        }
    }
}

fn invalid(errno: Errno) -> BtrfsError {
    BtrfsError::with_errno(ErrorKind::InvalidArgument, errno)
}

/// Paths reach the kernel as C strings and cannot hold a NUL.
fn check_path(path: &Path) -> Result<()> {
    if path.as_os_str().as_bytes().contains(&0) {
        return Err(invalid(Errno::EINVAL));
    }
    Ok(())
}

/// Open `path` read-only. Directories are accepted.
pub(crate) fn open(path: &Path) -> Result<OwnedFd> {
    check_path(path)?;
    fcntl::open(path, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())
        .or_kind(ErrorKind::OpenFailed)
}

/// Open `path` read-only relative to the directory `dir`.
pub(crate) fn open_at(dir: BorrowedFd<'_>, path: &Path) -> Result<OwnedFd> {
    check_path(path)?;
    fcntl::openat(dir, path, OFlag::O_RDONLY | OFlag::O_CLOEXEC, Mode::empty())
        .or_kind(ErrorKind::OpenFailed)
}

/// Remove the empty directory `path` relative to `dir`.
pub(crate) fn rmdir_at(dir: BorrowedFd<'_>, path: &Path) -> Result<()> {
    check_path(path)?;
    unistd::unlinkat(dir, path, UnlinkatFlags::RemoveDir).or_kind(ErrorKind::RmdirFailed)
}

/// Check that `name` can be used as a subvolume name.
pub(crate) fn validate_name(name: &[u8]) -> Result<()> {
    if name.is_empty() || name.contains(&b'/') || name.contains(&0) {
        return Err(invalid(Errno::EINVAL));
    }
    if name.len() > BTRFS_SUBVOL_NAME_MAX {
        return Err(invalid(Errno::ENAMETOOLONG));
    }
    Ok(())
}

/// Open the directory containing `path` and return it with the final
/// component of `path`. Relative paths resolve against `dir` when given,
/// the working directory otherwise.
pub(crate) fn open_parent_and_name(
    dir: Option<BorrowedFd<'_>>,
    path: &Path,
) -> Result<(OwnedFd, Vec<u8>)> {
    let name = path
        .file_name()
        .ok_or_else(|| invalid(Errno::EINVAL))?
        .as_bytes()
        .to_vec();
    validate_name(&name)?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parent = match dir {
        Some(dir) => open_at(dir, parent)?,
        None => open(parent)?,
    };
    Ok((parent, name))
}

pub(crate) fn is_btrfs(fd: BorrowedFd<'_>) -> Result<bool> {
    let magic = ioctl::statfs_magic(fd).or_kind(ErrorKind::StatfsFailed)?;
    Ok(magic == BTRFS_SUPER_MAGIC)
}

pub(crate) fn check_btrfs(fd: BorrowedFd<'_>) -> Result<()> {
    if !is_btrfs(fd)? {
        return Err(BtrfsError::with_errno(ErrorKind::NotBtrfs, Errno::EINVAL));
    }
    Ok(())
}

/// Fail with `NotSubvolume` unless `fd` is the root directory of a
/// subvolume on a BTRFS filesystem.
pub(crate) fn check_subvolume_root(fd: BorrowedFd<'_>) -> Result<()> {
    check_btrfs(fd)?;

    let stat = stat::fstat(fd).or_kind(ErrorKind::StatFailed)?;
    let is_dir = SFlag::from_bits_truncate(stat.st_mode) & SFlag::S_IFMT == SFlag::S_IFDIR;
    if stat.st_ino != BTRFS_FIRST_FREE_OBJECTID || !is_dir {
        return Err(BtrfsError::with_errno(ErrorKind::NotSubvolume, Errno::EINVAL));
    }
    Ok(())
}
