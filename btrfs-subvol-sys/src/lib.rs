// SPDX-License-Identifier: GPL-3.0-only

//! Low-level BTRFS operations
//!
//! This crate provides direct system call interfaces used by `btrfs-subvol`:
//! - `#[repr(C)]` mirrors of the kernel's ioctl argument structures
//! - Safe wrappers around each ioctl, returning the raw errno on failure
//! - Decoders for the on-disk items returned by tree searches
//!
//! Nothing here interprets errors; mapping errno values onto the subvolume
//! error taxonomy is the job of the safe API crate.

pub mod error;
pub mod ioctl;
pub mod items;

pub use error::{DecodeError, Result};
pub use ioctl::{BtrfsIoctlGetSubvolInfoArgs, BtrfsIoctlSearchKey, BtrfsIoctlTimespec};
pub use items::{DirItem, DiskTimespec, RootItem, RootRef, SearchItem};
