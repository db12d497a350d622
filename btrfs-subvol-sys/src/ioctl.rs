// SPDX-License-Identifier: GPL-3.0-only

//! BTRFS ioctl definitions (include/uapi/linux/btrfs.h)
//!
//! Each wrapper issues exactly one ioctl against the given descriptor and
//! returns the errno unchanged on failure.

use std::mem::{MaybeUninit, size_of};
use std::os::fd::{AsRawFd, BorrowedFd};

use nix::errno::Errno;
use nix::sys::statfs::fstatfs;
use nix::{ioctl_none, ioctl_read, ioctl_readwrite, ioctl_write_ptr};

use crate::items::{SearchItem, parse_search_buffer};

pub const BTRFS_IOCTL_MAGIC: u8 = 0x94;

pub const BTRFS_PATH_NAME_MAX: usize = 4087;
pub const BTRFS_SUBVOL_NAME_MAX: usize = 4039;
pub const BTRFS_VOL_NAME_MAX: usize = 255;
pub const BTRFS_INO_LOOKUP_PATH_MAX: usize = 4080;
pub const BTRFS_UUID_SIZE: usize = 16;
pub const BTRFS_SEARCH_ARGS_BUFSIZE: usize = 4096 - size_of::<BtrfsIoctlSearchKey>();

/// `fstatfs` magic of a BTRFS filesystem.
pub const BTRFS_SUPER_MAGIC: u32 = 0x9123_683e;

// btrfs_ioctl_vol_args_v2 flags
pub const BTRFS_SUBVOL_RDONLY: u64 = 1 << 1;
pub const BTRFS_SUBVOL_QGROUP_INHERIT: u64 = 1 << 2;
pub const BTRFS_SUBVOL_SPEC_BY_ID: u64 = 1 << 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BtrfsIoctlSearchKey {
    pub tree_id: u64,
    pub min_objectid: u64,
    pub max_objectid: u64,
    pub min_offset: u64,
    pub max_offset: u64,
    pub min_transid: u64,
    pub max_transid: u64,
    pub min_type: u32,
    pub max_type: u32,
    /// In: maximum items to return. Out: items returned.
    pub nr_items: u32,
    pub unused: u32,
    pub unused1: u64,
    pub unused2: u64,
    pub unused3: u64,
    pub unused4: u64,
}

impl BtrfsIoctlSearchKey {
    /// A key matching every item of `item_type` owned by `objectid` in `tree_id`.
    pub fn for_object(tree_id: u64, objectid: u64, item_type: u32) -> Self {
        Self {
            tree_id,
            min_objectid: objectid,
            max_objectid: objectid,
            min_type: item_type,
            max_type: item_type,
            min_offset: 0,
            max_offset: u64::MAX,
            min_transid: 0,
            max_transid: u64::MAX,
            ..Default::default()
        }
    }
}

#[repr(C)]
pub struct BtrfsIoctlSearchArgs {
    pub key: BtrfsIoctlSearchKey,
    pub buf: [u8; BTRFS_SEARCH_ARGS_BUFSIZE],
}

#[repr(C)]
pub struct BtrfsIoctlInoLookupArgs {
    pub treeid: u64,
    pub objectid: u64,
    pub name: [u8; BTRFS_INO_LOOKUP_PATH_MAX],
}

#[repr(C)]
pub struct BtrfsIoctlVolArgs {
    pub fd: i64,
    pub name: [u8; BTRFS_PATH_NAME_MAX + 1],
}

/// `struct btrfs_qgroup_limit`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct BtrfsQgroupLimit {
    pub flags: u64,
    pub max_rfer: u64,
    pub max_excl: u64,
    pub rsv_rfer: u64,
    pub rsv_excl: u64,
}

/// Fixed header of `struct btrfs_qgroup_inherit`; `num_qgroups` ids follow.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct BtrfsQgroupInherit {
    pub flags: u64,
    pub num_qgroups: u64,
    pub num_ref_copies: u64,
    pub num_excl_copies: u64,
    pub lim: BtrfsQgroupLimit,
}

/// Number of u64 words in [`BtrfsQgroupInherit`].
pub const QGROUP_INHERIT_HEADER_WORDS: usize = size_of::<BtrfsQgroupInherit>() / size_of::<u64>();

#[repr(C)]
pub struct BtrfsIoctlVolArgsV2 {
    pub fd: i64,
    pub transid: u64,
    pub flags: u64,
    pub size: u64,
    pub qgroup_inherit: *const BtrfsQgroupInherit,
    pub unused: [u64; 2],
    /// Shares storage with `devid`/`subvolid` in the kernel's union.
    pub name: [u8; BTRFS_SUBVOL_NAME_MAX + 1],
}

impl BtrfsIoctlVolArgsV2 {
    fn zeroed() -> Self {
        Self {
            fd: 0,
            transid: 0,
            flags: 0,
            size: 0,
            qgroup_inherit: std::ptr::null(),
            unused: [0; 2],
            name: [0; BTRFS_SUBVOL_NAME_MAX + 1],
        }
    }

    fn set_qgroup_inherit(&mut self, qgroup: Option<&[u64]>) {
        if let Some(words) = qgroup {
            self.flags |= BTRFS_SUBVOL_QGROUP_INHERIT;
            self.size = (words.len() * size_of::<u64>()) as u64;
            self.qgroup_inherit = words.as_ptr().cast();
        }
    }

    fn set_subvolid(&mut self, id: u64) {
        self.name[..8].copy_from_slice(&id.to_ne_bytes());
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BtrfsIoctlTimespec {
    pub sec: u64,
    pub nsec: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BtrfsIoctlGetSubvolInfoArgs {
    pub treeid: u64,
    pub name: [u8; BTRFS_VOL_NAME_MAX + 1],
    pub parent_id: u64,
    pub dirid: u64,
    pub generation: u64,
    pub flags: u64,
    pub uuid: [u8; BTRFS_UUID_SIZE],
    pub parent_uuid: [u8; BTRFS_UUID_SIZE],
    pub received_uuid: [u8; BTRFS_UUID_SIZE],
    pub ctransid: u64,
    pub otransid: u64,
    pub stransid: u64,
    pub rtransid: u64,
    pub ctime: BtrfsIoctlTimespec,
    pub otime: BtrfsIoctlTimespec,
    pub stime: BtrfsIoctlTimespec,
    pub rtime: BtrfsIoctlTimespec,
    pub reserved: [u64; 8],
}

ioctl_none!(btrfs_ioc_sync, BTRFS_IOCTL_MAGIC, 8);
ioctl_write_ptr!(btrfs_ioc_snap_destroy, BTRFS_IOCTL_MAGIC, 15, BtrfsIoctlVolArgs);
ioctl_readwrite!(btrfs_ioc_tree_search, BTRFS_IOCTL_MAGIC, 17, BtrfsIoctlSearchArgs);
ioctl_readwrite!(btrfs_ioc_ino_lookup, BTRFS_IOCTL_MAGIC, 18, BtrfsIoctlInoLookupArgs);
ioctl_write_ptr!(btrfs_ioc_default_subvol, BTRFS_IOCTL_MAGIC, 19, u64);
ioctl_write_ptr!(btrfs_ioc_wait_sync, BTRFS_IOCTL_MAGIC, 22, u64);
ioctl_write_ptr!(btrfs_ioc_snap_create_v2, BTRFS_IOCTL_MAGIC, 23, BtrfsIoctlVolArgsV2);
ioctl_read!(btrfs_ioc_start_sync, BTRFS_IOCTL_MAGIC, 24, u64);
ioctl_write_ptr!(btrfs_ioc_subvol_create_v2, BTRFS_IOCTL_MAGIC, 24, BtrfsIoctlVolArgsV2);
ioctl_read!(btrfs_ioc_subvol_getflags, BTRFS_IOCTL_MAGIC, 25, u64);
ioctl_write_ptr!(btrfs_ioc_subvol_setflags, BTRFS_IOCTL_MAGIC, 26, u64);
ioctl_read!(btrfs_ioc_get_subvol_info, BTRFS_IOCTL_MAGIC, 60, BtrfsIoctlGetSubvolInfoArgs);
ioctl_write_ptr!(btrfs_ioc_snap_destroy_v2, BTRFS_IOCTL_MAGIC, 63, BtrfsIoctlVolArgsV2);

/// Copy `name` into a NUL-terminated fixed buffer.
fn copy_name(dst: &mut [u8], name: &[u8]) -> nix::Result<()> {
    if name.contains(&0) {
        return Err(Errno::EINVAL);
    }
    if name.len() >= dst.len() {
        return Err(Errno::ENAMETOOLONG);
    }
    dst[..name.len()].copy_from_slice(name);
    dst[name.len()] = 0;
    Ok(())
}

fn c_bytes(buf: &[u8]) -> Vec<u8> {
    let nul = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    buf[..nul].to_vec()
}

/// `fstatfs` the descriptor and return its filesystem magic.
pub fn statfs_magic(fd: BorrowedFd<'_>) -> nix::Result<u32> {
    let stat = fstatfs(fd)?;
    // f_type's width varies by architecture; the magic fits in 32 bits.
    Ok(stat.filesystem_type().0 as u32)
}

/// One bounded `BTRFS_IOC_TREE_SEARCH`.
///
/// `key.nr_items` caps the number of items requested; on return it holds
/// the number found. The rest of `key` is passed through unchanged so the
/// caller can advance it.
pub fn tree_search(
    fd: BorrowedFd<'_>,
    key: &mut BtrfsIoctlSearchKey,
) -> nix::Result<Vec<SearchItem>> {
    let mut args = BtrfsIoctlSearchArgs {
        key: *key,
        buf: [0; BTRFS_SEARCH_ARGS_BUFSIZE],
    };
    unsafe { btrfs_ioc_tree_search(fd.as_raw_fd(), &mut args) }?;
    key.nr_items = args.key.nr_items;
    parse_search_buffer(&args.buf, args.key.nr_items).map_err(|_| Errno::EIO)
}

/// `BTRFS_IOC_INO_LOOKUP`: resolve `objectid` in tree `treeid` to a path.
///
/// Returns the tree id actually used (meaningful when `treeid` is 0, which
/// selects the tree containing `fd`) and the path of the inode relative to
/// the root of that tree. Directory paths carry a trailing `/`; the tree's
/// root directory resolves to the empty string.
pub fn ino_lookup(fd: BorrowedFd<'_>, treeid: u64, objectid: u64) -> nix::Result<(u64, Vec<u8>)> {
    let mut args = BtrfsIoctlInoLookupArgs {
        treeid,
        objectid,
        name: [0; BTRFS_INO_LOOKUP_PATH_MAX],
    };
    unsafe { btrfs_ioc_ino_lookup(fd.as_raw_fd(), &mut args) }?;
    Ok((args.treeid, c_bytes(&args.name)))
}

/// `BTRFS_IOC_SUBVOL_CREATE_V2` of `name` inside the directory `parent`.
///
/// `qgroup` is a complete `btrfs_qgroup_inherit` (header words followed by
/// the group ids).
pub fn subvol_create(
    parent: BorrowedFd<'_>,
    name: &[u8],
    qgroup: Option<&[u64]>,
) -> nix::Result<()> {
    let mut args = BtrfsIoctlVolArgsV2::zeroed();
    copy_name(&mut args.name, name)?;
    args.set_qgroup_inherit(qgroup);
    unsafe { btrfs_ioc_subvol_create_v2(parent.as_raw_fd(), &args) }?;
    Ok(())
}

/// `BTRFS_IOC_SNAP_CREATE_V2`: snapshot `source` as `name` inside `parent`.
pub fn snap_create(
    parent: BorrowedFd<'_>,
    source: BorrowedFd<'_>,
    name: &[u8],
    read_only: bool,
    qgroup: Option<&[u64]>,
) -> nix::Result<()> {
    let mut args = BtrfsIoctlVolArgsV2::zeroed();
    args.fd = i64::from(source.as_raw_fd());
    copy_name(&mut args.name, name)?;
    if read_only {
        args.flags |= BTRFS_SUBVOL_RDONLY;
    }
    args.set_qgroup_inherit(qgroup);
    unsafe { btrfs_ioc_snap_create_v2(parent.as_raw_fd(), &args) }?;
    Ok(())
}

/// `BTRFS_IOC_SNAP_DESTROY` of the subvolume `name` inside `parent`.
pub fn snap_destroy(parent: BorrowedFd<'_>, name: &[u8]) -> nix::Result<()> {
    let mut args = BtrfsIoctlVolArgs {
        fd: 0,
        name: [0; BTRFS_PATH_NAME_MAX + 1],
    };
    copy_name(&mut args.name, name)?;
    unsafe { btrfs_ioc_snap_destroy(parent.as_raw_fd(), &args) }?;
    Ok(())
}

/// `BTRFS_IOC_SNAP_DESTROY_V2` addressing the subvolume by id.
pub fn snap_destroy_by_id(fd: BorrowedFd<'_>, id: u64) -> nix::Result<()> {
    let mut args = BtrfsIoctlVolArgsV2::zeroed();
    args.flags = BTRFS_SUBVOL_SPEC_BY_ID;
    args.set_subvolid(id);
    unsafe { btrfs_ioc_snap_destroy_v2(fd.as_raw_fd(), &args) }?;
    Ok(())
}

pub fn subvol_getflags(fd: BorrowedFd<'_>) -> nix::Result<u64> {
    let mut flags = 0u64;
    unsafe { btrfs_ioc_subvol_getflags(fd.as_raw_fd(), &mut flags) }?;
    Ok(flags)
}

pub fn subvol_setflags(fd: BorrowedFd<'_>, flags: u64) -> nix::Result<()> {
    unsafe { btrfs_ioc_subvol_setflags(fd.as_raw_fd(), &flags) }?;
    Ok(())
}

pub fn default_subvol(fd: BorrowedFd<'_>, id: u64) -> nix::Result<()> {
    unsafe { btrfs_ioc_default_subvol(fd.as_raw_fd(), &id) }?;
    Ok(())
}

pub fn sync(fd: BorrowedFd<'_>) -> nix::Result<()> {
    unsafe { btrfs_ioc_sync(fd.as_raw_fd()) }?;
    Ok(())
}

/// Start committing the current transaction and return its id.
pub fn start_sync(fd: BorrowedFd<'_>) -> nix::Result<u64> {
    let mut transid = 0u64;
    unsafe { btrfs_ioc_start_sync(fd.as_raw_fd(), &mut transid) }?;
    Ok(transid)
}

/// Wait for transaction `transid` (0 for the current one) to commit.
pub fn wait_sync(fd: BorrowedFd<'_>, transid: u64) -> nix::Result<()> {
    unsafe { btrfs_ioc_wait_sync(fd.as_raw_fd(), &transid) }?;
    Ok(())
}

/// `BTRFS_IOC_GET_SUBVOL_INFO` for the subvolume containing `fd`. Does not
/// require privileges.
pub fn get_subvol_info(fd: BorrowedFd<'_>) -> nix::Result<BtrfsIoctlGetSubvolInfoArgs> {
    let mut args: MaybeUninit<BtrfsIoctlGetSubvolInfoArgs> = MaybeUninit::zeroed();
    unsafe { btrfs_ioc_get_subvol_info(fd.as_raw_fd(), args.as_mut_ptr()) }?;
    Ok(unsafe { args.assume_init() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_structs_match_kernel_sizes() {
        assert_eq!(size_of::<BtrfsIoctlSearchKey>(), 104);
        assert_eq!(size_of::<BtrfsIoctlSearchArgs>(), 4096);
        assert_eq!(size_of::<BtrfsIoctlInoLookupArgs>(), 4096);
        assert_eq!(size_of::<BtrfsIoctlVolArgs>(), 4096);
        assert_eq!(size_of::<BtrfsIoctlVolArgsV2>(), 4096);
        assert_eq!(size_of::<BtrfsIoctlTimespec>(), 16);
        assert_eq!(size_of::<BtrfsIoctlGetSubvolInfoArgs>(), 504);
        assert_eq!(QGROUP_INHERIT_HEADER_WORDS, 9);
    }

    #[test]
    fn names_are_bounded_and_nul_free() {
        let mut buf = [0xffu8; 8];
        copy_name(&mut buf, b"subvol").unwrap();
        assert_eq!(&buf[..7], b"subvol\0");

        assert_eq!(copy_name(&mut buf, b"12345678"), Err(Errno::ENAMETOOLONG));
        assert_eq!(copy_name(&mut buf, b"a\0b"), Err(Errno::EINVAL));
    }

    #[test]
    fn subvolid_overlays_name() {
        let mut args = BtrfsIoctlVolArgsV2::zeroed();
        args.set_subvolid(258);
        assert_eq!(&args.name[..8], &258u64.to_ne_bytes());

        let words = [0u64; QGROUP_INHERIT_HEADER_WORDS + 2];
        args.set_qgroup_inherit(Some(&words[..]));
        assert_eq!(args.flags, BTRFS_SUBVOL_QGROUP_INHERIT);
        assert_eq!(args.size, 88);
    }

    #[test]
    fn c_bytes_stops_at_nul() {
        assert_eq!(c_bytes(b"dir/\0junk"), b"dir/".to_vec());
        assert_eq!(c_bytes(b""), Vec::<u8>::new());
    }
}
