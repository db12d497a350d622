// SPDX-License-Identifier: GPL-3.0-only

//! Subvolume metadata from root tree items

use btrfs_subvol_sys::items::{
    BTRFS_FIRST_FREE_OBJECTID, BTRFS_FS_TREE_OBJECTID, BTRFS_LAST_FREE_OBJECTID,
    BTRFS_ROOT_BACKREF_KEY, BTRFS_ROOT_ITEM_KEY, BTRFS_ROOT_TREE_OBJECTID,
};
use btrfs_subvol_sys::{
    BtrfsIoctlGetSubvolInfoArgs, BtrfsIoctlSearchKey, BtrfsIoctlTimespec, DiskTimespec, RootItem,
    RootRef,
};
use btrfs_subvol_types::{SubvolumeId, SubvolumeInfo, Timespec};
use nix::errno::Errno;
use tracing::trace;
use uuid::Uuid;

use crate::error::{BtrfsError, ErrorKind, Result};
use crate::search::{SEARCH_BATCH, TreeSearch, advance_key, corrupt_item};

fn timespec(ts: DiskTimespec) -> Timespec {
    Timespec::new(ts.sec as i64, ts.nsec)
}

fn ioctl_timespec(ts: BtrfsIoctlTimespec) -> Timespec {
    Timespec::new(ts.sec as i64, ts.nsec)
}

/// True for ids that can name a subvolume tree.
pub(crate) fn is_subvolume_id(id: SubvolumeId) -> bool {
    id == BTRFS_FS_TREE_OBJECTID
        || (BTRFS_FIRST_FREE_OBJECTID..=BTRFS_LAST_FREE_OBJECTID).contains(&id)
}

pub(crate) fn from_root_item(
    id: SubvolumeId,
    parent_id: SubvolumeId,
    dir_id: u64,
    item: &RootItem,
) -> SubvolumeInfo {
    SubvolumeInfo {
        id,
        parent_id,
        dir_id,
        flags: item.flags,
        uuid: Uuid::from_bytes(item.uuid),
        parent_uuid: Uuid::from_bytes(item.parent_uuid),
        received_uuid: Uuid::from_bytes(item.received_uuid),
        generation: item.generation,
        ctransid: item.ctransid,
        otransid: item.otransid,
        stransid: item.stransid,
        rtransid: item.rtransid,
        ctime: timespec(item.ctime),
        otime: timespec(item.otime),
        stime: timespec(item.stime),
        rtime: timespec(item.rtime),
    }
}

/// Metadata returned by `BTRFS_IOC_GET_SUBVOL_INFO`.
pub(crate) fn from_ioctl(args: &BtrfsIoctlGetSubvolInfoArgs) -> SubvolumeInfo {
    SubvolumeInfo {
        id: args.treeid,
        parent_id: args.parent_id,
        dir_id: args.dirid,
        flags: args.flags,
        uuid: Uuid::from_bytes(args.uuid),
        parent_uuid: Uuid::from_bytes(args.parent_uuid),
        received_uuid: Uuid::from_bytes(args.received_uuid),
        generation: args.generation,
        ctransid: args.ctransid,
        otransid: args.otransid,
        stransid: args.stransid,
        rtransid: args.rtransid,
        ctime: ioctl_timespec(args.ctime),
        otime: ioctl_timespec(args.otime),
        stime: ioctl_timespec(args.stime),
        rtime: ioctl_timespec(args.rtime),
    }
}

fn not_found() -> BtrfsError {
    BtrfsError::with_errno(ErrorKind::SubvolumeNotFound, Errno::ENOENT)
}

/// Read the metadata of subvolume `id` from the root tree.
///
/// The root item supplies most fields; the back reference, when there is
/// one, supplies the parent and directory. The top-level subvolume has no
/// back reference and reports parent 0.
pub fn read_subvolume_info<S: TreeSearch + ?Sized>(
    search: &S,
    id: SubvolumeId,
) -> Result<SubvolumeInfo> {
    let mut key = BtrfsIoctlSearchKey {
        min_type: BTRFS_ROOT_ITEM_KEY,
        max_type: BTRFS_ROOT_BACKREF_KEY,
        ..BtrfsIoctlSearchKey::for_object(BTRFS_ROOT_TREE_OBJECTID, id, BTRFS_ROOT_ITEM_KEY)
    };

    let mut root_item = None;
    let mut backref = None;

    while root_item.is_none() || backref.is_none() {
        key.nr_items = SEARCH_BATCH;
        let items = search.tree_search(&mut key)?;
        let Some(last) = items.last() else {
            break;
        };

        for item in &items {
            match item.item_type {
                BTRFS_ROOT_ITEM_KEY if root_item.is_none() => {
                    trace!(id, "root item");
                    let parsed = RootItem::parse(&item.data).map_err(|e| corrupt_item(item, e))?;
                    root_item = Some(parsed);
                }
                BTRFS_ROOT_BACKREF_KEY if backref.is_none() => {
                    trace!(id, parent = item.offset, "root backref");
                    let parsed = RootRef::parse(&item.data).map_err(|e| corrupt_item(item, e))?;
                    backref = Some((item.offset, parsed.dirid));
                }
                _ => {}
            }
        }
        advance_key(&mut key, last);
    }

    let root_item = root_item.ok_or_else(not_found)?;
    let (parent_id, dir_id) = backref.unwrap_or((0, 0));
    Ok(from_root_item(id, parent_id, dir_id, &root_item))
}

/// True if the root tree holds a root item for `id`.
pub(crate) fn root_item_exists<S: TreeSearch + ?Sized>(
    search: &S,
    id: SubvolumeId,
) -> Result<bool> {
    let mut key =
        BtrfsIoctlSearchKey::for_object(BTRFS_ROOT_TREE_OBJECTID, id, BTRFS_ROOT_ITEM_KEY);
    key.nr_items = 1;
    Ok(!search.tree_search(&mut key)?.is_empty())
}

/// Fail unless `id` names an existing subvolume.
pub(crate) fn ensure_subvolume<S: TreeSearch + ?Sized>(search: &S, id: SubvolumeId) -> Result<()> {
    if !is_subvolume_id(id) {
        return Err(BtrfsError::with_errno(ErrorKind::NotSubvolume, Errno::EINVAL));
    }
    if !root_item_exists(search, id)? {
        return Err(not_found());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryTree, root_item};

    #[test]
    fn reads_root_item_and_backref() {
        let mut tree = MemoryTree::new();
        tree.add_subvolume(256, 5, 260, b"dir/", b"home");

        let info = read_subvolume_info(&tree, 256).unwrap();
        assert_eq!(info.id, 256);
        assert_eq!(info.parent_id, 5);
        assert_eq!(info.dir_id, 260);
        assert_eq!(info.generation, 356);
        assert_eq!(info.ctransid, 266);
        assert_eq!(info.uuid, Uuid::from_bytes(root_item(256).uuid));
        assert_eq!(info.otime, Timespec::new(1_700_000_256, 5));
        assert!(info.stime.is_zero());
        assert!(info.parent_uuid.is_nil());
    }

    #[test]
    fn top_level_has_no_parent() {
        let tree = MemoryTree::new();
        let info = read_subvolume_info(&tree, 5).unwrap();
        assert_eq!(info.id, 5);
        assert_eq!(info.parent_id, 0);
        assert_eq!(info.dir_id, 0);
        assert_eq!(info.generation, root_item(5).generation);
    }

    #[test]
    fn missing_root_item_is_not_found() {
        let mut tree = MemoryTree::scenario();
        tree.remove(257, BTRFS_ROOT_ITEM_KEY, 0);

        let err = read_subvolume_info(&tree, 257).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubvolumeNotFound);
        assert_eq!(err.errno(), Some(Errno::ENOENT));
    }

    #[test]
    fn truncated_root_item_is_a_search_failure() {
        let mut tree = MemoryTree::new();
        tree.insert(300, BTRFS_ROOT_ITEM_KEY, 0, vec![0; 100]);

        let err = read_subvolume_info(&tree, 300).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SearchFailed);
        assert_eq!(err.errno(), Some(Errno::EIO));
    }

    #[test]
    fn subvolume_ids_are_range_checked() {
        let tree = MemoryTree::scenario();
        assert!(ensure_subvolume(&tree, 5).is_ok());
        assert!(ensure_subvolume(&tree, 258).is_ok());

        for id in [1, 6, 255, BTRFS_LAST_FREE_OBJECTID + 1] {
            let err = ensure_subvolume(&tree, id).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotSubvolume);
        }

        let err = ensure_subvolume(&tree, 4000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubvolumeNotFound);
    }

    #[test]
    fn ioctl_info_converts_every_field() {
        let args = BtrfsIoctlGetSubvolInfoArgs {
            treeid: 257,
            name: [0; 256],
            parent_id: 256,
            dirid: 256,
            generation: 9,
            flags: 1,
            uuid: [1; 16],
            parent_uuid: [2; 16],
            received_uuid: [0; 16],
            ctransid: 8,
            otransid: 7,
            stransid: 0,
            rtransid: 0,
            ctime: BtrfsIoctlTimespec { sec: 10, nsec: 1 },
            otime: BtrfsIoctlTimespec { sec: 11, nsec: 2 },
            stime: BtrfsIoctlTimespec::default(),
            rtime: BtrfsIoctlTimespec::default(),
            reserved: [0; 8],
        };

        let info = from_ioctl(&args);
        assert_eq!(info.id, 257);
        assert_eq!(info.parent_id, 256);
        assert!(info.is_read_only());
        assert!(info.is_snapshot());
        assert_eq!(info.ctime, Timespec::new(10, 1));
        assert!(info.rtime.to_datetime().is_none());
    }
}
