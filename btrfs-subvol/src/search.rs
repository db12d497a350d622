// SPDX-License-Identifier: GPL-3.0-only

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use btrfs_subvol_sys::ioctl;
use btrfs_subvol_sys::{BtrfsIoctlSearchKey, DecodeError, SearchItem};
use btrfs_subvol_types::SubvolumeId;
use nix::errno::Errno;
use tracing::{debug, warn};

use crate::error::{BtrfsError, ErrorKind, OrKind, Result};
use crate::handle::RootFd;

/// Items requested per tree search. The kernel also stops once its result
/// buffer is full, so fewer may come back.
pub(crate) const SEARCH_BATCH: u32 = 4096;

/// The two filesystem queries subvolume lookups are built on.
pub trait TreeSearch {
    /// One bounded `BTRFS_IOC_TREE_SEARCH`.
    ///
    /// `key.nr_items` is the maximum number of items to return and is
    /// updated to the number returned.
    fn tree_search(&self, key: &mut BtrfsIoctlSearchKey) -> Result<Vec<SearchItem>>;

    /// `BTRFS_IOC_INO_LOOKUP`: the path of inode `objectid` relative to the
    /// root of subvolume `tree_id`, with a trailing `/` for directories
    /// other than the root itself. `tree_id` 0 means the subvolume the
    /// search runs in; the resolved id is returned alongside the path.
    fn ino_lookup(&self, tree_id: SubvolumeId, objectid: u64) -> Result<(SubvolumeId, Vec<u8>)>;
}

impl TreeSearch for BorrowedFd<'_> {
    fn tree_search(&self, key: &mut BtrfsIoctlSearchKey) -> Result<Vec<SearchItem>> {
        debug!(
            tree = key.tree_id,
            objectid = key.min_objectid,
            min_type = key.min_type,
            min_offset = key.min_offset,
            "searching B-tree"
        );
        ioctl::tree_search(*self, key).or_kind(ErrorKind::SearchFailed)
    }

    fn ino_lookup(&self, tree_id: SubvolumeId, objectid: u64) -> Result<(SubvolumeId, Vec<u8>)> {
        ioctl::ino_lookup(*self, tree_id, objectid).or_kind(ErrorKind::InoLookupFailed)
    }
}

impl TreeSearch for OwnedFd {
    fn tree_search(&self, key: &mut BtrfsIoctlSearchKey) -> Result<Vec<SearchItem>> {
        self.as_fd().tree_search(key)
    }

    fn ino_lookup(&self, tree_id: SubvolumeId, objectid: u64) -> Result<(SubvolumeId, Vec<u8>)> {
        self.as_fd().ino_lookup(tree_id, objectid)
    }
}

impl TreeSearch for RootFd<'_> {
    fn tree_search(&self, key: &mut BtrfsIoctlSearchKey) -> Result<Vec<SearchItem>> {
        self.as_fd().tree_search(key)
    }

    fn ino_lookup(&self, tree_id: SubvolumeId, objectid: u64) -> Result<(SubvolumeId, Vec<u8>)> {
        self.as_fd().ino_lookup(tree_id, objectid)
    }
}

impl<T: TreeSearch + ?Sized> TreeSearch for &T {
    fn tree_search(&self, key: &mut BtrfsIoctlSearchKey) -> Result<Vec<SearchItem>> {
        (**self).tree_search(key)
    }

    fn ino_lookup(&self, tree_id: SubvolumeId, objectid: u64) -> Result<(SubvolumeId, Vec<u8>)> {
        (**self).ino_lookup(tree_id, objectid)
    }
}

/// A search returned an item that does not decode.
pub(crate) fn corrupt_item(item: &SearchItem, err: DecodeError) -> BtrfsError {
    warn!(
        objectid = item.objectid,
        item_type = item.item_type,
        offset = item.offset,
        "undecodable item: {err}"
    );
    BtrfsError::with_errno(ErrorKind::SearchFailed, Errno::EIO)
}

/// Move `key` past `item` so the next search resumes after it.
pub(crate) fn advance_key(key: &mut BtrfsIoctlSearchKey, item: &SearchItem) {
    key.min_objectid = item.objectid;
    key.min_type = item.item_type;
    match item.offset.checked_add(1) {
        Some(offset) => key.min_offset = offset,
        None => {
            key.min_offset = 0;
            key.min_type = item.item_type.saturating_add(1);
        }
    }
}
