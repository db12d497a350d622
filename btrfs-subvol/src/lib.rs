// SPDX-License-Identifier: GPL-3.0-only

//! BTRFS subvolume management
//!
//! This library provides a safe Rust interface for BTRFS subvolume
//! operations: creation, deletion, snapshots, quota group inheritance,
//! read-only and default subvolume control, transaction sync, metadata
//! queries, and streaming traversal of the subvolume tree.

pub mod error;
pub mod handle;
pub mod info;
pub mod iterator;
pub mod manager;
pub mod qgroup;
pub mod search;
pub mod subvolume;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use enumflags2::BitFlags;
pub use error::{BtrfsError, ErrorKind, Result, UnknownStatus};
pub use handle::RootFd;
pub use info::read_subvolume_info;
pub use iterator::{Order, Payload, SubvolumeIds, SubvolumeInfos, SubvolumeIterator};
pub use manager::SubvolumeManager;
pub use qgroup::QgroupInherit;
pub use search::TreeSearch;
pub use subvolume::*;

pub use btrfs_subvol_types::{FS_TREE_ID, SubvolumeId, SubvolumeInfo, Timespec, Uuid};

// Re-export the raw ioctl layer for callers that need it
pub use btrfs_subvol_sys;
