// SPDX-License-Identifier: GPL-3.0-only

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use btrfs_subvol_types::{FS_TREE_ID, SubvolumeId, SubvolumeInfo};
use enumflags2::BitFlags;
use nix::errno::Errno;
use tracing::debug;

use crate::error::{BtrfsError, ErrorKind, Result};
use crate::iterator::{Order, SubvolumeInfos};
use crate::subvolume::{self, DeleteFlags, SnapshotFlags};

/// Manager for BTRFS subvolume operations on one mounted filesystem
///
/// Relative paths given to its methods are resolved against the mount point.
#[derive(Debug, Clone)]
pub struct SubvolumeManager {
    mount_point: PathBuf,
}

impl SubvolumeManager {
    /// Create a new SubvolumeManager for the given mount point
    pub fn new<P: Into<PathBuf>>(mount_point: P) -> Result<Self> {
        let mount_point = mount_point.into();

        if !subvolume::is_btrfs(&mount_point)? {
            return Err(BtrfsError::with_errno(ErrorKind::NotBtrfs, Errno::EINVAL));
        }
        Ok(Self { mount_point })
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    fn resolve<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        if path.is_absolute() {
            Cow::Borrowed(path)
        } else {
            Cow::Owned(self.mount_point.join(path))
        }
    }

    /// List every subvolume in the filesystem, parents before children,
    /// with paths relative to the top-level subvolume
    pub fn list_all(&self) -> Result<Vec<(PathBuf, SubvolumeInfo)>> {
        let subvolumes = self
            .iter(FS_TREE_ID, Order::PreOrder)?
            .collect::<Result<Vec<_>>>()?;

        if subvolumes.is_empty() {
            debug!(mount_point = %self.mount_point.display(), "no subvolumes below the top level");
        }
        Ok(subvolumes)
    }

    /// Traverse the subvolumes below `top` (0 for the subvolume mounted here)
    pub fn iter(&self, top: SubvolumeId, order: Order) -> Result<SubvolumeInfos<'static>> {
        SubvolumeInfos::open(&self.mount_point, top, order)
    }

    /// Create a new subvolume
    pub fn create<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        subvolume::create_subvolume(self.resolve(path.as_ref()), None)
    }

    /// Delete a subvolume
    pub fn delete(&self, path: &Path, recursive: bool) -> Result<()> {
        let flags = if recursive {
            BitFlags::from(DeleteFlags::Recursive)
        } else {
            BitFlags::empty()
        };
        subvolume::delete_subvolume(self.resolve(path), flags)
    }

    /// Create a snapshot of a subvolume
    pub fn snapshot(
        &self,
        source: &Path,
        dest: &Path,
        readonly: bool,
        recursive: bool,
    ) -> Result<()> {
        let mut flags = BitFlags::empty();
        if readonly {
            flags |= SnapshotFlags::ReadOnly;
        }
        if recursive {
            flags |= SnapshotFlags::Recursive;
        }
        subvolume::create_snapshot(self.resolve(source), self.resolve(dest), flags, None)
    }

    /// Set or unset the read-only flag on a subvolume
    pub fn set_readonly(&self, path: &Path, readonly: bool) -> Result<()> {
        subvolume::set_subvolume_read_only(self.resolve(path), readonly)
    }

    /// Set a subvolume as the default
    pub fn set_default(&self, path: &Path) -> Result<()> {
        let id = subvolume::subvolume_id(self.resolve(path))?;
        subvolume::set_default_subvolume(&self.mount_point, id)
    }

    /// Get the default subvolume ID
    pub fn get_default(&self) -> Result<SubvolumeId> {
        subvolume::get_default_subvolume(&self.mount_point)
    }

    /// List deleted subvolumes pending cleanup
    pub fn list_deleted(&self) -> Result<Vec<SubvolumeInfo>> {
        let mut deleted = Vec::new();

        for id in subvolume::deleted_subvolumes(&self.mount_point)? {
            match subvolume::subvolume_info(&self.mount_point, id) {
                Ok(info) => deleted.push(info),
                // cleaned up since it was listed
                Err(e) if e.kind() == ErrorKind::SubvolumeNotFound => {}
                Err(e) => return Err(e),
            }
        }

        Ok(deleted)
    }
}
