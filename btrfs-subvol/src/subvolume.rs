// SPDX-License-Identifier: GPL-3.0-only

//! One-shot subvolume operations
//!
//! Every operation comes in a path form and a descriptor form (`*_fd`).
//! Path forms open what they need and close it before returning.

use std::ffi::{OsStr, OsString};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use btrfs_subvol_sys::ioctl::{self, BTRFS_SUBVOL_RDONLY};
use btrfs_subvol_sys::items::{
    BTRFS_DIR_ITEM_KEY, BTRFS_FIRST_FREE_OBJECTID, BTRFS_FS_TREE_OBJECTID, BTRFS_ORPHAN_ITEM_KEY,
    BTRFS_ORPHAN_OBJECTID, BTRFS_ROOT_BACKREF_KEY, BTRFS_ROOT_TREE_DIR_OBJECTID,
    BTRFS_ROOT_TREE_OBJECTID,
};
use btrfs_subvol_sys::{BtrfsIoctlSearchKey, DirItem, RootRef};
use btrfs_subvol_types::{SubvolumeId, SubvolumeInfo};
use enumflags2::{BitFlags, bitflags};
use nix::errno::Errno;
use nix::unistd::geteuid;
use tracing::{debug, info};

use crate::error::{BtrfsError, ErrorKind, OrKind, Result};
use crate::handle;
use crate::info as subvol_info;
use crate::iterator::{Order, SubvolumeIds};
use crate::qgroup::QgroupInherit;
use crate::search::{SEARCH_BATCH, TreeSearch, advance_key, corrupt_item};

/// Options for [`create_snapshot`].
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFlags {
    /// Also snapshot every subvolume nested beneath the source.
    Recursive = 1 << 0,
    ReadOnly = 1 << 1,
}

/// Options for [`delete_subvolume`].
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteFlags {
    /// Delete nested subvolumes first. Not atomic: a failure can leave
    /// some of them deleted.
    Recursive = 1 << 0,
}

/// Which failures [`is_subvolume_with`] reports as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SubvolumeCheck {
    /// Only `NotSubvolume`.
    #[default]
    Strict,
    /// Also `SubvolumeNotFound` and anything caused by `ENOENT`.
    Lenient,
}

const DEFAULT_DIR_ITEM: &[u8] = b"default";

fn qgroup_words(qgroup: Option<&QgroupInherit>) -> Option<&[u64]> {
    qgroup.map(QgroupInherit::as_words)
}

fn os_path(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(OsString::from_vec(bytes))
}

/// True if `path` is on a BTRFS filesystem.
pub fn is_btrfs<P: AsRef<Path>>(path: P) -> Result<bool> {
    let fd = handle::open(path.as_ref())?;
    handle::is_btrfs(fd.as_fd())
}

pub fn is_btrfs_fd(fd: BorrowedFd<'_>) -> Result<bool> {
    handle::is_btrfs(fd)
}

/// Fail unless `path` is the root directory of a subvolume.
pub fn check_subvolume<P: AsRef<Path>>(path: P) -> Result<()> {
    let fd = handle::open(path.as_ref())?;
    handle::check_subvolume_root(fd.as_fd())
}

pub fn check_subvolume_fd(fd: BorrowedFd<'_>) -> Result<()> {
    handle::check_subvolume_root(fd)
}

/// Whether `path` is the root directory of a subvolume, with
/// [`SubvolumeCheck::Strict`] coercion.
pub fn is_subvolume<P: AsRef<Path>>(path: P) -> Result<bool> {
    is_subvolume_with(path, SubvolumeCheck::Strict)
}

pub fn is_subvolume_with<P: AsRef<Path>>(path: P, check: SubvolumeCheck) -> Result<bool> {
    coerce(check_subvolume(path), check)
}

pub fn is_subvolume_fd(fd: BorrowedFd<'_>, check: SubvolumeCheck) -> Result<bool> {
    coerce(check_subvolume_fd(fd), check)
}

fn coerce(result: Result<()>, check: SubvolumeCheck) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotSubvolume => Ok(false),
        Err(e)
            if check == SubvolumeCheck::Lenient
                && (e.kind() == ErrorKind::SubvolumeNotFound || e.errno() == Some(Errno::ENOENT)) =>
        {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Id of the subvolume containing `path`.
pub fn subvolume_id<P: AsRef<Path>>(path: P) -> Result<SubvolumeId> {
    let fd = handle::open(path.as_ref())?;
    subvolume_id_fd(fd.as_fd())
}

pub fn subvolume_id_fd(fd: BorrowedFd<'_>) -> Result<SubvolumeId> {
    Ok(fd.ino_lookup(0, BTRFS_FIRST_FREE_OBJECTID)?.0)
}

/// Path of subvolume `id` relative to the top-level subvolume. `id` 0
/// selects the subvolume containing `path`.
pub fn subvolume_path<P: AsRef<Path>>(path: P, id: SubvolumeId) -> Result<PathBuf> {
    let fd = handle::open(path.as_ref())?;
    subvolume_path_fd(fd.as_fd(), id)
}

pub fn subvolume_path_fd(fd: BorrowedFd<'_>, id: SubvolumeId) -> Result<PathBuf> {
    let id = match id {
        0 => subvolume_id_fd(fd)?,
        id => id,
    };
    path_in(&fd, id).map(os_path)
}

/// Walk back references from `id` up to the top-level subvolume.
fn path_in<S: TreeSearch + ?Sized>(search: &S, mut id: SubvolumeId) -> Result<Vec<u8>> {
    let mut components: Vec<Vec<u8>> = Vec::new();

    while id != BTRFS_FS_TREE_OBJECTID {
        let mut key =
            BtrfsIoctlSearchKey::for_object(BTRFS_ROOT_TREE_OBJECTID, id, BTRFS_ROOT_BACKREF_KEY);
        key.nr_items = 1;
        let items = search.tree_search(&mut key)?;
        let Some(item) = items.first() else {
            return Err(BtrfsError::with_errno(ErrorKind::SubvolumeNotFound, Errno::ENOENT));
        };

        let parent = item.offset;
        let backref = RootRef::parse(&item.data).map_err(|e| corrupt_item(item, e))?;
        let (_, dir) = search.ino_lookup(parent, backref.dirid)?;

        let mut component = dir;
        component.extend_from_slice(&backref.name);
        components.push(component);
        id = parent;
    }

    components.reverse();
    Ok(components.join(&b'/'))
}

/// Metadata of subvolume `id`. `id` 0 selects the subvolume containing
/// `path`, and works without privileges.
pub fn subvolume_info<P: AsRef<Path>>(path: P, id: SubvolumeId) -> Result<SubvolumeInfo> {
    let fd = handle::open(path.as_ref())?;
    subvolume_info_fd(fd.as_fd(), id)
}

pub fn subvolume_info_fd(fd: BorrowedFd<'_>, id: SubvolumeId) -> Result<SubvolumeInfo> {
    if id == 0 && !geteuid().is_root() {
        let args = ioctl::get_subvol_info(fd).or_kind(ErrorKind::GetSubvolInfoFailed)?;
        return Ok(subvol_info::from_ioctl(&args));
    }

    let id = match id {
        0 => subvolume_id_fd(fd)?,
        id => id,
    };
    subvol_info::read_subvolume_info(&fd, id)
}

pub fn get_subvolume_read_only<P: AsRef<Path>>(path: P) -> Result<bool> {
    let fd = handle::open(path.as_ref())?;
    get_subvolume_read_only_fd(fd.as_fd())
}

pub fn get_subvolume_read_only_fd(fd: BorrowedFd<'_>) -> Result<bool> {
    let flags = ioctl::subvol_getflags(fd).or_kind(ErrorKind::SubvolGetflagsFailed)?;
    Ok(flags & BTRFS_SUBVOL_RDONLY != 0)
}

pub fn set_subvolume_read_only<P: AsRef<Path>>(path: P, read_only: bool) -> Result<()> {
    let fd = handle::open(path.as_ref())?;
    set_subvolume_read_only_fd(fd.as_fd(), read_only)
}

pub fn set_subvolume_read_only_fd(fd: BorrowedFd<'_>, read_only: bool) -> Result<()> {
    let flags = ioctl::subvol_getflags(fd).or_kind(ErrorKind::SubvolGetflagsFailed)?;
    let flags = if read_only {
        flags | BTRFS_SUBVOL_RDONLY
    } else {
        flags & !BTRFS_SUBVOL_RDONLY
    };
    info!(read_only, "setting subvolume read-only flag");
    ioctl::subvol_setflags(fd, flags).or_kind(ErrorKind::SubvolSetflagsFailed)
}

/// Id of the subvolume mounted when no subvolume is requested.
pub fn get_default_subvolume<P: AsRef<Path>>(path: P) -> Result<SubvolumeId> {
    let fd = handle::open(path.as_ref())?;
    get_default_subvolume_fd(fd.as_fd())
}

pub fn get_default_subvolume_fd(fd: BorrowedFd<'_>) -> Result<SubvolumeId> {
    default_in(&fd)
}

fn default_in<S: TreeSearch + ?Sized>(search: &S) -> Result<SubvolumeId> {
    let mut key = BtrfsIoctlSearchKey::for_object(
        BTRFS_ROOT_TREE_OBJECTID,
        BTRFS_ROOT_TREE_DIR_OBJECTID,
        BTRFS_DIR_ITEM_KEY,
    );

    loop {
        key.nr_items = SEARCH_BATCH;
        let items = search.tree_search(&mut key)?;
        let Some(last) = items.last() else {
            break;
        };

        for item in &items {
            let entries = DirItem::parse_all(&item.data).map_err(|e| corrupt_item(item, e))?;
            if let Some(entry) = entries.iter().find(|d| d.name == DEFAULT_DIR_ITEM) {
                return Ok(entry.location_objectid);
            }
        }
        advance_key(&mut key, last);
    }

    Err(BtrfsError::with_errno(ErrorKind::DefaultSubvolFailed, Errno::ENOENT))
}

/// Make subvolume `id` the default. `id` 0 selects the subvolume
/// containing `path`.
pub fn set_default_subvolume<P: AsRef<Path>>(path: P, id: SubvolumeId) -> Result<()> {
    let fd = handle::open(path.as_ref())?;
    set_default_subvolume_fd(fd.as_fd(), id)
}

pub fn set_default_subvolume_fd(fd: BorrowedFd<'_>, id: SubvolumeId) -> Result<()> {
    let id = match id {
        0 => subvolume_id_fd(fd)?,
        id => id,
    };
    info!(id, "setting default subvolume");
    ioctl::default_subvol(fd, id).or_kind(ErrorKind::DefaultSubvolFailed)
}

/// Create an empty subvolume at `path`.
pub fn create_subvolume<P: AsRef<Path>>(path: P, qgroup: Option<&QgroupInherit>) -> Result<()> {
    let (parent, name) = handle::open_parent_and_name(None, path.as_ref())?;
    create_subvolume_fd(parent.as_fd(), OsStr::from_bytes(&name), qgroup)
}

/// Create an empty subvolume named `name` in the directory `parent`.
pub fn create_subvolume_fd<N: AsRef<OsStr>>(
    parent: BorrowedFd<'_>,
    name: N,
    qgroup: Option<&QgroupInherit>,
) -> Result<()> {
    let name = name.as_ref().as_bytes();
    handle::validate_name(name)?;
    info!(name = %String::from_utf8_lossy(name), "creating subvolume");
    ioctl::subvol_create(parent, name, qgroup_words(qgroup)).or_kind(ErrorKind::SubvolCreateFailed)
}

/// Snapshot the subvolume at `source` as `path`.
pub fn create_snapshot<S: AsRef<Path>, P: AsRef<Path>>(
    source: S,
    path: P,
    flags: BitFlags<SnapshotFlags>,
    qgroup: Option<&QgroupInherit>,
) -> Result<()> {
    let source = handle::open(source.as_ref())?;
    create_snapshot_fd(source.as_fd(), path, flags, qgroup)
}

/// Snapshot the subvolume open at `source` as `path`.
pub fn create_snapshot_fd<P: AsRef<Path>>(
    source: BorrowedFd<'_>,
    path: P,
    flags: BitFlags<SnapshotFlags>,
    qgroup: Option<&QgroupInherit>,
) -> Result<()> {
    let (parent, name) = handle::open_parent_and_name(None, path.as_ref())?;
    create_snapshot_fd2(source, parent.as_fd(), OsStr::from_bytes(&name), flags, qgroup)
}

/// Snapshot the subvolume open at `source` as `name` inside `parent`.
pub fn create_snapshot_fd2<N: AsRef<OsStr>>(
    source: BorrowedFd<'_>,
    parent: BorrowedFd<'_>,
    name: N,
    flags: BitFlags<SnapshotFlags>,
    qgroup: Option<&QgroupInherit>,
) -> Result<()> {
    let name = name.as_ref().as_bytes();
    handle::validate_name(name)?;

    let recursive = flags.contains(SnapshotFlags::Recursive);
    let read_only = flags.contains(SnapshotFlags::ReadOnly);

    // Nested snapshots are placed inside the new snapshot, which must
    // therefore be writable.
    if recursive && read_only && has_nested(source)? {
        return Err(BtrfsError::with_errno(ErrorKind::SnapCreateFailed, Errno::EROFS));
    }

    info!(name = %String::from_utf8_lossy(name), recursive, read_only, "creating snapshot");
    ioctl::snap_create(parent, source, name, read_only, qgroup_words(qgroup))
        .or_kind(ErrorKind::SnapCreateFailed)?;

    if recursive {
        let snapshot = handle::open_at(parent, Path::new(OsStr::from_bytes(name)))?;
        snapshot_nested(source, snapshot.as_fd())?;
    }
    Ok(())
}

fn has_nested(source: BorrowedFd<'_>) -> Result<bool> {
    let mut nested = SubvolumeIds::from_fd(source, 0, Order::PreOrder)?;
    Ok(nested.advance()?.is_some())
}

/// Tracks the new snapshot, and everything beneath it, when it was
/// created inside its own source.
#[derive(Debug)]
struct OwnSubtree {
    id: SubvolumeId,
    path: Option<PathBuf>,
}

impl OwnSubtree {
    fn new(id: SubvolumeId) -> Self {
        Self { id, path: None }
    }

    /// True if the nested subvolume at `path` is the snapshot itself or
    /// lies inside it.
    fn contains(&mut self, path: &Path, id: SubvolumeId) -> bool {
        if id == self.id {
            self.path = Some(path.to_path_buf());
            return true;
        }
        self.path.as_deref().is_some_and(|own| path.starts_with(own))
    }
}

/// Replace each placeholder directory left in `snapshot` by a snapshot of
/// the matching subvolume nested in `source`. Parents come first so each
/// placeholder exists by the time it is replaced.
fn snapshot_nested(source: BorrowedFd<'_>, snapshot: BorrowedFd<'_>) -> Result<()> {
    let mut own = OwnSubtree::new(subvolume_id_fd(snapshot)?);
    let mut nested = SubvolumeIds::from_fd(source, 0, Order::PreOrder)?;

    while let Some((path, id)) = nested.advance()? {
        if own.contains(&path, id) {
            continue;
        }
        debug!(id, path = %path.display(), "snapshotting nested subvolume");
        handle::rmdir_at(snapshot, &path)?;

        let child = handle::open_at(source, &path)?;
        let (dst_parent, name) = handle::open_parent_and_name(Some(snapshot), &path)?;
        ioctl::snap_create(dst_parent.as_fd(), child.as_fd(), &name, false, None)
            .or_kind(ErrorKind::SnapCreateFailed)?;
    }
    Ok(())
}

/// Delete the subvolume at `path`.
pub fn delete_subvolume<P: AsRef<Path>>(path: P, flags: BitFlags<DeleteFlags>) -> Result<()> {
    let (parent, name) = handle::open_parent_and_name(None, path.as_ref())?;
    delete_subvolume_fd(parent.as_fd(), OsStr::from_bytes(&name), flags)
}

/// Delete the subvolume `name` inside the directory `parent`.
pub fn delete_subvolume_fd<N: AsRef<OsStr>>(
    parent: BorrowedFd<'_>,
    name: N,
    flags: BitFlags<DeleteFlags>,
) -> Result<()> {
    let name = name.as_ref().as_bytes();
    handle::validate_name(name)?;

    if flags.contains(DeleteFlags::Recursive) {
        let subvolume = handle::open_at(parent, Path::new(OsStr::from_bytes(name)))?;
        delete_nested(subvolume.as_fd())?;
    }

    info!(name = %String::from_utf8_lossy(name), "deleting subvolume");
    ioctl::snap_destroy(parent, name).or_kind(ErrorKind::SnapDestroyFailed)
}

/// Delete every subvolume nested in `subvolume`, children before parents.
fn delete_nested(subvolume: BorrowedFd<'_>) -> Result<()> {
    let mut nested = SubvolumeIds::from_fd(subvolume, 0, Order::PostOrder)?;

    while let Some((path, id)) = nested.advance()? {
        debug!(id, path = %path.display(), "deleting nested subvolume");
        let (parent, name) = handle::open_parent_and_name(Some(subvolume), &path)?;
        ioctl::snap_destroy(parent.as_fd(), &name).or_kind(ErrorKind::SnapDestroyFailed)?;
    }
    Ok(())
}

/// Delete subvolume `id` of the filesystem containing `path`. The
/// subvolume must be reachable from `path`.
pub fn delete_subvolume_by_id<P: AsRef<Path>>(path: P, id: SubvolumeId) -> Result<()> {
    let fd = handle::open(path.as_ref())?;
    delete_subvolume_by_id_fd(fd.as_fd(), id)
}

pub fn delete_subvolume_by_id_fd(fd: BorrowedFd<'_>, id: SubvolumeId) -> Result<()> {
    info!(id, "deleting subvolume by id");
    ioctl::snap_destroy_by_id(fd, id).or_kind(ErrorKind::SnapDestroyFailed)
}

/// Subvolumes deleted but not yet cleaned up.
pub fn deleted_subvolumes<P: AsRef<Path>>(path: P) -> Result<Vec<SubvolumeId>> {
    let fd = handle::open(path.as_ref())?;
    deleted_subvolumes_fd(fd.as_fd())
}

pub fn deleted_subvolumes_fd(fd: BorrowedFd<'_>) -> Result<Vec<SubvolumeId>> {
    deleted_in(&fd)
}

/// Orphan items name deleted trees; the ones still holding a root item
/// have not been cleaned yet.
fn deleted_in<S: TreeSearch + ?Sized>(search: &S) -> Result<Vec<SubvolumeId>> {
    let mut key = BtrfsIoctlSearchKey::for_object(
        BTRFS_ROOT_TREE_OBJECTID,
        BTRFS_ORPHAN_OBJECTID,
        BTRFS_ORPHAN_ITEM_KEY,
    );
    let mut deleted = Vec::new();

    loop {
        key.nr_items = SEARCH_BATCH;
        let items = search.tree_search(&mut key)?;
        let Some(last) = items.last() else {
            break;
        };

        for item in &items {
            if subvol_info::root_item_exists(search, item.offset)? {
                deleted.push(item.offset);
            }
        }
        advance_key(&mut key, last);
    }

    Ok(deleted)
}

/// Commit the current transaction and wait for it.
pub fn sync<P: AsRef<Path>>(path: P) -> Result<()> {
    let fd = handle::open(path.as_ref())?;
    sync_fd(fd.as_fd())
}

pub fn sync_fd(fd: BorrowedFd<'_>) -> Result<()> {
    info!("syncing filesystem");
    ioctl::sync(fd).or_kind(ErrorKind::SyncFailed)
}

/// Start committing the current transaction without waiting. Returns the
/// transaction id to pass to [`wait_sync`].
pub fn start_sync<P: AsRef<Path>>(path: P) -> Result<u64> {
    let fd = handle::open(path.as_ref())?;
    start_sync_fd(fd.as_fd())
}

pub fn start_sync_fd(fd: BorrowedFd<'_>) -> Result<u64> {
    let transid = ioctl::start_sync(fd).or_kind(ErrorKind::StartSyncFailed)?;
    info!(transid, "started filesystem sync");
    Ok(transid)
}

/// Wait for transaction `transid` to commit; 0 waits for the current one.
pub fn wait_sync<P: AsRef<Path>>(path: P, transid: u64) -> Result<()> {
    let fd = handle::open(path.as_ref())?;
    wait_sync_fd(fd.as_fd(), transid)
}

pub fn wait_sync_fd(fd: BorrowedFd<'_>, transid: u64) -> Result<()> {
    debug!(transid, "waiting for filesystem sync");
    ioctl::wait_sync(fd, transid).or_kind(ErrorKind::WaitSyncFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryTree;
    use btrfs_subvol_sys::items::BTRFS_ROOT_ITEM_KEY;

    #[test]
    fn default_subvolume_from_dir_item() {
        let mut tree = MemoryTree::scenario();
        tree.set_default(257);
        assert_eq!(default_in(&tree).unwrap(), 257);
    }

    #[test]
    fn missing_default_is_an_error() {
        let tree = MemoryTree::scenario();
        let err = default_in(&tree).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DefaultSubvolFailed);
        assert_eq!(err.errno(), Some(Errno::ENOENT));
    }

    #[test]
    fn deleted_lists_only_uncleaned_orphans() {
        let mut tree = MemoryTree::scenario();
        assert!(deleted_in(&tree).unwrap().is_empty());

        tree.add_orphan(257);
        tree.add_orphan(900);
        tree.add_orphan(258);
        assert_eq!(deleted_in(&tree).unwrap(), vec![257, 258]);

        tree.remove(257, BTRFS_ROOT_ITEM_KEY, 0);
        assert_eq!(deleted_in(&tree).unwrap(), vec![258]);
    }

    #[test]
    fn path_walks_back_references() {
        let mut tree = MemoryTree::scenario();
        tree.add_subvolume(259, 258, 300, b"x/y/", b"deep");

        assert_eq!(path_in(&tree, 256).unwrap(), b"subvol1");
        assert_eq!(path_in(&tree, 257).unwrap(), b"subvol1/subvol2");
        assert_eq!(path_in(&tree, 259).unwrap(), b"subvol1/subvol3/x/y/deep");
        assert!(path_in(&tree, 5).unwrap().is_empty());

        let err = path_in(&tree, 4000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubvolumeNotFound);
    }

    #[test]
    fn boolean_form_swallows_per_policy() {
        let not_subvol = || Err(BtrfsError::with_errno(ErrorKind::NotSubvolume, Errno::EINVAL));
        let not_found = || Err(BtrfsError::with_errno(ErrorKind::SubvolumeNotFound, Errno::ENOENT));
        let missing = || Err(BtrfsError::with_errno(ErrorKind::OpenFailed, Errno::ENOENT));
        let denied = || Err(BtrfsError::with_errno(ErrorKind::OpenFailed, Errno::EACCES));

        assert_eq!(coerce(Ok(()), SubvolumeCheck::Strict), Ok(true));
        assert_eq!(coerce(not_subvol(), SubvolumeCheck::Strict), Ok(false));
        assert_eq!(coerce(not_subvol(), SubvolumeCheck::Lenient), Ok(false));

        assert_eq!(
            coerce(not_found(), SubvolumeCheck::Strict).unwrap_err().kind(),
            ErrorKind::SubvolumeNotFound
        );
        assert_eq!(coerce(not_found(), SubvolumeCheck::Lenient), Ok(false));
        assert!(coerce(missing(), SubvolumeCheck::Strict).is_err());
        assert_eq!(coerce(missing(), SubvolumeCheck::Lenient), Ok(false));
        assert!(coerce(denied(), SubvolumeCheck::Lenient).is_err());
    }

    #[test]
    fn plain_directory_is_not_a_subvolume() {
        let dir = tempfile::tempdir().unwrap();
        match is_subvolume(dir.path()) {
            Ok(is) => assert!(!is),
            Err(e) => assert_eq!(e.kind(), ErrorKind::NotBtrfs),
        }
    }

    #[test]
    fn snapshot_inside_its_source_is_skipped() {
        let mut own = OwnSubtree::new(260);

        assert!(!own.contains(Path::new("b"), 257));
        assert!(own.contains(Path::new("copy"), 260));
        assert!(own.contains(Path::new("copy/b"), 261));
        assert!(own.contains(Path::new("copy/b/d"), 262));
        assert!(!own.contains(Path::new("copy-old"), 263));
        assert!(!own.contains(Path::new("dir/c"), 258));
    }

    #[test]
    fn nul_in_path_is_invalid_argument() {
        let err = create_subvolume("/tmp/x\0y/z", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.errno(), Some(Errno::EINVAL));

        let err = is_btrfs("/tmp/a\0b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn flags_combine() {
        let flags = SnapshotFlags::Recursive | SnapshotFlags::ReadOnly;
        assert!(flags.contains(SnapshotFlags::ReadOnly));
        assert_eq!(flags.bits(), 0b11);
        assert!(BitFlags::<DeleteFlags>::empty().is_empty());
    }
}
