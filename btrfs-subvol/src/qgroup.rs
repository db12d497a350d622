// SPDX-License-Identifier: GPL-3.0-only

//! Quota group inheritance for new subvolumes and snapshots

use btrfs_subvol_sys::ioctl::QGROUP_INHERIT_HEADER_WORDS;
use nix::errno::Errno;

use crate::error::{BtrfsError, ErrorKind, Result};

/// Index of `num_qgroups` in the `btrfs_qgroup_inherit` header.
const NUM_QGROUPS_WORD: usize = 1;

/// Quota groups a new subvolume or snapshot is added to.
///
/// Stored in the kernel's `btrfs_qgroup_inherit` layout so the create
/// ioctls can use it in place. Groups keep insertion order and duplicates
/// are not removed. An empty set inherits nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QgroupInherit {
    words: Vec<u64>,
}

impl QgroupInherit {
    pub fn new() -> Self {
        Self {
            words: vec![0; QGROUP_INHERIT_HEADER_WORDS],
        }
    }

    /// Append a quota group id.
    pub fn add_group(&mut self, qgroupid: u64) -> Result<()> {
        self.words
            .try_reserve(1)
            .map_err(|_| BtrfsError::with_errno(ErrorKind::NoMemory, Errno::ENOMEM))?;
        self.words.push(qgroupid);
        self.words[NUM_QGROUPS_WORD] += 1;
        Ok(())
    }

    /// The quota group ids added so far.
    pub fn groups(&self) -> &[u64] {
        &self.words[QGROUP_INHERIT_HEADER_WORDS..]
    }

    pub fn len(&self) -> usize {
        self.groups().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups().is_empty()
    }

    /// The complete `btrfs_qgroup_inherit` structure, header first.
    pub(crate) fn as_words(&self) -> &[u64] {
        &self.words
    }
}

impl Default for QgroupInherit {
    fn default() -> Self {
        Self::new()
    }
}
