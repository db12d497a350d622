// SPDX-License-Identifier: GPL-3.0-only

//! In-memory root tree for exercising tree searches without a filesystem

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet};

use btrfs_subvol_sys::ioctl::BTRFS_SEARCH_ARGS_BUFSIZE;
use btrfs_subvol_sys::items::{
    BTRFS_DIR_ITEM_KEY, BTRFS_FIRST_FREE_OBJECTID, BTRFS_FS_TREE_OBJECTID, BTRFS_ORPHAN_ITEM_KEY,
    BTRFS_ORPHAN_OBJECTID, BTRFS_ROOT_BACKREF_KEY, BTRFS_ROOT_ITEM_KEY, BTRFS_ROOT_REF_KEY,
    BTRFS_ROOT_TREE_DIR_OBJECTID, BTRFS_ROOT_TREE_OBJECTID, SEARCH_HEADER_SIZE,
};
use btrfs_subvol_sys::{BtrfsIoctlSearchKey, DirItem, DiskTimespec, RootItem, RootRef, SearchItem};
use btrfs_subvol_types::SubvolumeId;
use nix::errno::Errno;

use crate::error::{BtrfsError, ErrorKind, Result};
use crate::search::TreeSearch;

type Key = (u64, u32, u64);

/// A root tree held in a map, searched with the kernel's compound key
/// semantics and result buffer limit.
#[derive(Debug)]
pub(crate) struct MemoryTree {
    items: BTreeMap<Key, Vec<u8>>,
    /// (tree, inode) -> path relative to the tree's root
    paths: HashMap<(SubvolumeId, u64), Vec<u8>>,
    failing_lookups: HashSet<(SubvolumeId, u64)>,
    /// Subvolume resolved for lookups against tree 0.
    containing: SubvolumeId,
    pub searches: Cell<usize>,
}

impl MemoryTree {
    /// A filesystem holding only the top-level subvolume.
    pub fn new() -> Self {
        let mut tree = Self {
            items: BTreeMap::new(),
            paths: HashMap::new(),
            failing_lookups: HashSet::new(),
            containing: BTRFS_FS_TREE_OBJECTID,
            searches: Cell::new(0),
        };
        tree.insert(
            BTRFS_FS_TREE_OBJECTID,
            BTRFS_ROOT_ITEM_KEY,
            0,
            root_item(BTRFS_FS_TREE_OBJECTID).encode(),
        );
        tree
    }

    /// The scenario filesystem: `subvol1` (256) holding `subvol2` (257) and
    /// `subvol3` (258).
    pub fn scenario() -> Self {
        let mut tree = Self::new();
        tree.add_subvolume(256, 5, 256, b"", b"subvol1");
        tree.add_subvolume(257, 256, 256, b"", b"subvol2");
        tree.add_subvolume(258, 256, 256, b"", b"subvol3");
        tree
    }

    pub fn insert(&mut self, objectid: u64, item_type: u32, offset: u64, data: Vec<u8>) {
        self.items.insert((objectid, item_type, offset), data);
    }

    pub fn remove(&mut self, objectid: u64, item_type: u32, offset: u64) {
        self.items.remove(&(objectid, item_type, offset));
    }

    /// Add subvolume `id` named `name` in directory `dirid` of `parent`,
    /// where `dir_path` is that directory's lookup path.
    pub fn add_subvolume(
        &mut self,
        id: SubvolumeId,
        parent: SubvolumeId,
        dirid: u64,
        dir_path: &[u8],
        name: &[u8],
    ) {
        let root_ref = RootRef {
            dirid,
            sequence: id,
            name: name.to_vec(),
        }
        .encode();
        self.insert(id, BTRFS_ROOT_ITEM_KEY, 0, root_item(id).encode());
        self.insert(parent, BTRFS_ROOT_REF_KEY, id, root_ref.clone());
        self.insert(id, BTRFS_ROOT_BACKREF_KEY, parent, root_ref);
        self.paths.insert((parent, dirid), dir_path.to_vec());
    }

    pub fn set_containing(&mut self, id: SubvolumeId) {
        self.containing = id;
    }

    pub fn set_default(&mut self, id: SubvolumeId) {
        let item = DirItem {
            location_objectid: id,
            location_type: BTRFS_ROOT_ITEM_KEY as u8,
            location_offset: u64::MAX,
            transid: 1,
            file_type: 2,
            name: b"default".to_vec(),
        };
        self.insert(BTRFS_ROOT_TREE_DIR_OBJECTID, BTRFS_DIR_ITEM_KEY, 0x1234, item.encode());
    }

    pub fn add_orphan(&mut self, id: SubvolumeId) {
        self.insert(BTRFS_ORPHAN_OBJECTID, BTRFS_ORPHAN_ITEM_KEY, id, Vec::new());
    }

    pub fn fail_lookup(&mut self, tree: SubvolumeId, objectid: u64) {
        self.failing_lookups.insert((tree, objectid));
    }
}

/// A root item whose fields are derived from `id`.
pub(crate) fn root_item(id: SubvolumeId) -> RootItem {
    RootItem {
        generation: id + 100,
        flags: 0,
        uuid: [id as u8; 16],
        ctransid: id + 10,
        otransid: id,
        otime: DiskTimespec {
            sec: 1_700_000_000 + id,
            nsec: 5,
        },
        ..Default::default()
    }
}

impl TreeSearch for MemoryTree {
    fn tree_search(&self, key: &mut BtrfsIoctlSearchKey) -> Result<Vec<SearchItem>> {
        self.searches.set(self.searches.get() + 1);
        if key.tree_id != BTRFS_ROOT_TREE_OBJECTID {
            return Err(BtrfsError::with_errno(ErrorKind::SearchFailed, Errno::ENOENT));
        }

        let min = (key.min_objectid, key.min_type, key.min_offset);
        let max = (key.max_objectid, key.max_type, key.max_offset);
        let mut found = Vec::new();
        let mut used = 0usize;

        if min <= max {
            for (&(objectid, item_type, offset), data) in self.items.range(min..=max) {
                if found.len() == key.nr_items as usize {
                    break;
                }
                used += SEARCH_HEADER_SIZE + data.len();
                if used > BTRFS_SEARCH_ARGS_BUFSIZE {
                    break;
                }
                found.push(SearchItem {
                    transid: 1,
                    objectid,
                    offset,
                    item_type,
                    data: data.clone(),
                });
            }
        }

        key.nr_items = found.len() as u32;
        Ok(found)
    }

    fn ino_lookup(&self, tree_id: SubvolumeId, objectid: u64) -> Result<(SubvolumeId, Vec<u8>)> {
        let tree_id = if tree_id == 0 { self.containing } else { tree_id };
        let lookup_failed = || BtrfsError::with_errno(ErrorKind::InoLookupFailed, Errno::ENOENT);

        if self.failing_lookups.contains(&(tree_id, objectid)) {
            return Err(lookup_failed());
        }
        if objectid == BTRFS_FIRST_FREE_OBJECTID {
            return Ok((tree_id, Vec::new()));
        }
        self.paths
            .get(&(tree_id, objectid))
            .map(|path| (tree_id, path.clone()))
            .ok_or_else(lookup_failed)
    }
}
