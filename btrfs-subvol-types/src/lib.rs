// SPDX-License-Identifier: GPL-3.0-only

//! Shared domain models for BTRFS subvolume management
//!
//! These types carry no I/O. They are produced by `btrfs-subvol` and are
//! serializable so callers can ship them across process boundaries.

pub mod subvolume;

pub use subvolume::{FS_TREE_ID, SubvolumeId, SubvolumeInfo, Timespec};
pub use uuid::Uuid;
