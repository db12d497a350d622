// SPDX-License-Identifier: GPL-3.0-only

use nix::errno::Errno;
use thiserror::Error;

/// Kinds of failure reported by subvolume operations.
///
/// The discriminants are the stable status codes of the subvolume API;
/// 0 is reserved for success and never names a kind.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    /// End of a traversal. Not a failure.
    #[error("stop iteration")]
    StopIteration = 1,

    #[error("cannot allocate memory")]
    NoMemory = 2,

    #[error("invalid argument")]
    InvalidArgument = 3,

    #[error("not a Btrfs filesystem")]
    NotBtrfs = 4,

    #[error("not a Btrfs subvolume")]
    NotSubvolume = 5,

    #[error("subvolume not found")]
    SubvolumeNotFound = 6,

    #[error("could not open")]
    OpenFailed = 7,

    #[error("could not rmdir")]
    RmdirFailed = 8,

    #[error("could not unlink")]
    UnlinkFailed = 9,

    #[error("could not stat")]
    StatFailed = 10,

    #[error("could not statfs")]
    StatfsFailed = 11,

    #[error("could not search B-tree")]
    SearchFailed = 12,

    #[error("could not lookup inode")]
    InoLookupFailed = 13,

    #[error("could not get subvolume flags")]
    SubvolGetflagsFailed = 14,

    #[error("could not set subvolume flags")]
    SubvolSetflagsFailed = 15,

    #[error("could not create subvolume")]
    SubvolCreateFailed = 16,

    #[error("could not create snapshot")]
    SnapCreateFailed = 17,

    #[error("could not destroy subvolume/snapshot")]
    SnapDestroyFailed = 18,

    #[error("could not set default subvolume")]
    DefaultSubvolFailed = 19,

    #[error("could not sync filesystem")]
    SyncFailed = 20,

    #[error("could not start filesystem sync")]
    StartSyncFailed = 21,

    #[error("could not wait for filesystem sync")]
    WaitSyncFailed = 22,

    #[error("could not get subvolume information with BTRFS_IOC_GET_SUBVOL_INFO")]
    GetSubvolInfoFailed = 23,

    #[error("could not get rootref information with BTRFS_IOC_GET_SUBVOL_ROOTREF")]
    GetSubvolRootrefFailed = 24,

    #[error("could not resolve subvolume path with BTRFS_IOC_INO_LOOKUP_USER")]
    InoLookupUserFailed = 25,

    #[error("could not get filesystem information")]
    FsInfoFailed = 26,
}

impl ErrorKind {
    /// Every kind, indexed by `code - 1`.
    pub const ALL: [ErrorKind; 26] = [
        ErrorKind::StopIteration,
        ErrorKind::NoMemory,
        ErrorKind::InvalidArgument,
        ErrorKind::NotBtrfs,
        ErrorKind::NotSubvolume,
        ErrorKind::SubvolumeNotFound,
        ErrorKind::OpenFailed,
        ErrorKind::RmdirFailed,
        ErrorKind::UnlinkFailed,
        ErrorKind::StatFailed,
        ErrorKind::StatfsFailed,
        ErrorKind::SearchFailed,
        ErrorKind::InoLookupFailed,
        ErrorKind::SubvolGetflagsFailed,
        ErrorKind::SubvolSetflagsFailed,
        ErrorKind::SubvolCreateFailed,
        ErrorKind::SnapCreateFailed,
        ErrorKind::SnapDestroyFailed,
        ErrorKind::DefaultSubvolFailed,
        ErrorKind::SyncFailed,
        ErrorKind::StartSyncFailed,
        ErrorKind::WaitSyncFailed,
        ErrorKind::GetSubvolInfoFailed,
        ErrorKind::GetSubvolRootrefFailed,
        ErrorKind::InoLookupUserFailed,
        ErrorKind::FsInfoFailed,
    ];

    /// Numeric status code of this kind.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Classify a numeric status code.
    ///
    /// `0` is success and yields `Ok(None)`. Codes outside the table are
    /// rejected rather than being read as success.
    pub fn from_status(code: u32) -> std::result::Result<Option<Self>, UnknownStatus> {
        if code == 0 {
            return Ok(None);
        }
        Self::ALL
            .get(code as usize - 1)
            .copied()
            .map(Some)
            .ok_or(UnknownStatus(code))
    }
}

/// A status code with no entry in the error table.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown subvolume status code {0}")]
pub struct UnknownStatus(pub u32);

/// Error returned by every fallible subvolume operation.
///
/// Displays as its kind. When the failure came from a system call the
/// errno is available both from [`BtrfsError::errno`] and as the error
/// source.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{kind}")]
pub struct BtrfsError {
    kind: ErrorKind,
    #[source]
    errno: Option<Errno>,
}

impl BtrfsError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, errno: None }
    }

    pub fn with_errno(kind: ErrorKind, errno: Errno) -> Self {
        Self {
            kind,
            errno: Some(errno),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn errno(&self) -> Option<Errno> {
        self.errno
    }

    /// True for the end-of-traversal sentinel.
    pub fn is_stop_iteration(&self) -> bool {
        self.kind == ErrorKind::StopIteration
    }
}

impl From<ErrorKind> for BtrfsError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Result type alias for subvolume operations
pub type Result<T> = std::result::Result<T, BtrfsError>;

/// Attach an [`ErrorKind`] to a raw system call result.
pub(crate) trait OrKind<T> {
    fn or_kind(self, kind: ErrorKind) -> Result<T>;
}

impl<T> OrKind<T> for nix::Result<T> {
    fn or_kind(self, kind: ErrorKind) -> Result<T> {
        self.map_err(|errno| BtrfsError::with_errno(kind, errno))
    }
}
