// SPDX-License-Identifier: GPL-3.0-only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Numeric identifier of a subvolume (the object id of its tree).
pub type SubvolumeId = u64;

/// Identifier of the top-level subvolume of every BTRFS filesystem.
pub const FS_TREE_ID: SubvolumeId = 5;

/// Root item flag marking a read-only subvolume.
const ROOT_SUBVOL_RDONLY: u64 = 1 << 0;

/// A point in time as stored by BTRFS: seconds and nanoseconds since the epoch.
///
/// Events that never happened (a subvolume that was never received, for
/// example) are recorded as the epoch itself rather than being absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: u32,
}

impl Timespec {
    pub const fn new(sec: i64, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    /// True for the epoch, which BTRFS uses for "never".
    pub fn is_zero(&self) -> bool {
        self.sec == 0 && self.nsec == 0
    }

    /// Convert to a UTC timestamp, or `None` for the epoch placeholder.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if self.is_zero() {
            return None;
        }
        DateTime::<Utc>::from_timestamp(self.sec, self.nsec)
    }
}

/// Metadata of a subvolume, read from its root item and back reference.
///
/// This is a snapshot taken at read time. `generation` is not guaranteed
/// to be greater than or equal to any of the transaction ids, and zeroed
/// transaction ids or timestamps mean the corresponding event has not
/// happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubvolumeInfo {
    pub id: SubvolumeId,
    /// Subvolume containing this one, 0 for the top-level subvolume.
    pub parent_id: SubvolumeId,
    /// Inode number of the directory in the parent containing this subvolume.
    pub dir_id: u64,
    /// Root item flags.
    pub flags: u64,

    pub uuid: Uuid,
    /// UUID of the subvolume this one was snapshotted from, nil if none.
    pub parent_uuid: Uuid,
    /// UUID of the subvolume this one was received from, nil if none.
    pub received_uuid: Uuid,

    pub generation: u64,
    /// Transaction of the last change to the subvolume.
    pub ctransid: u64,
    /// Transaction the subvolume was created in.
    pub otransid: u64,
    /// Transaction the subvolume was sent in, 0 if never.
    pub stransid: u64,
    /// Transaction the subvolume was received in, 0 if never.
    pub rtransid: u64,

    pub ctime: Timespec,
    pub otime: Timespec,
    pub stime: Timespec,
    pub rtime: Timespec,
}

impl SubvolumeInfo {
    pub fn is_read_only(&self) -> bool {
        self.flags & ROOT_SUBVOL_RDONLY != 0
    }

    /// True if this subvolume was created as a snapshot of another one.
    pub fn is_snapshot(&self) -> bool {
        !self.parent_uuid.is_nil()
    }
}
