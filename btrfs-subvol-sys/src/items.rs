// SPDX-License-Identifier: GPL-3.0-only

//! Decoders for root tree items
//!
//! Search headers are in host byte order (they are filled in by the kernel
//! as a plain C struct); item payloads are on-disk structures and are
//! always little-endian.

use crate::error::{DecodeError, Result, ensure_len};

// Well-known object ids
pub const BTRFS_ROOT_TREE_OBJECTID: u64 = 1;
pub const BTRFS_FS_TREE_OBJECTID: u64 = 5;
pub const BTRFS_ROOT_TREE_DIR_OBJECTID: u64 = 6;
pub const BTRFS_FIRST_FREE_OBJECTID: u64 = 256;
pub const BTRFS_LAST_FREE_OBJECTID: u64 = u64::MAX - 255;
pub const BTRFS_ORPHAN_OBJECTID: u64 = u64::MAX - 4;

// Key types
pub const BTRFS_ORPHAN_ITEM_KEY: u32 = 48;
pub const BTRFS_DIR_ITEM_KEY: u32 = 84;
pub const BTRFS_ROOT_ITEM_KEY: u32 = 132;
pub const BTRFS_ROOT_BACKREF_KEY: u32 = 144;
pub const BTRFS_ROOT_REF_KEY: u32 = 156;

/// Size of `struct btrfs_ioctl_search_header`.
pub const SEARCH_HEADER_SIZE: usize = 32;

// btrfs_root_item layout. Items written before the v2 extension stop
// after `level` and carry none of the uuid/transid/time fields.
const ROOT_ITEM_LEGACY_SIZE: usize = 239;
const ROOT_ITEM_SIZE: usize = 439;
const ROOT_ITEM_GENERATION: usize = 160;
const ROOT_ITEM_FLAGS: usize = 208;
const ROOT_ITEM_UUID: usize = 247;
const ROOT_ITEM_PARENT_UUID: usize = 263;
const ROOT_ITEM_RECEIVED_UUID: usize = 279;
const ROOT_ITEM_CTRANSID: usize = 295;
const ROOT_ITEM_OTRANSID: usize = 303;
const ROOT_ITEM_STRANSID: usize = 311;
const ROOT_ITEM_RTRANSID: usize = 319;
const ROOT_ITEM_CTIME: usize = 327;
const ROOT_ITEM_OTIME: usize = 339;
const ROOT_ITEM_STIME: usize = 351;
const ROOT_ITEM_RTIME: usize = 363;

const ROOT_REF_SIZE: usize = 18;
const DIR_ITEM_SIZE: usize = 30;

fn le64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(b)
}

fn le32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(b)
}

fn le16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn ne64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_ne_bytes(b)
}

fn ne32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_ne_bytes(b)
}

fn uuid_at(buf: &[u8], off: usize) -> [u8; 16] {
    let mut b = [0u8; 16];
    b.copy_from_slice(&buf[off..off + 16]);
    b
}

/// One item returned by `BTRFS_IOC_TREE_SEARCH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub transid: u64,
    pub objectid: u64,
    pub offset: u64,
    pub item_type: u32,
    pub data: Vec<u8>,
}

impl SearchItem {
    /// Encode this item the way the kernel lays it out in a search buffer.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.transid.to_ne_bytes());
        buf.extend_from_slice(&self.objectid.to_ne_bytes());
        buf.extend_from_slice(&self.offset.to_ne_bytes());
        buf.extend_from_slice(&self.item_type.to_ne_bytes());
        buf.extend_from_slice(&(self.data.len() as u32).to_ne_bytes());
        buf.extend_from_slice(&self.data);
    }
}

/// Split a search buffer into its `nr_items` items.
pub fn parse_search_buffer(buf: &[u8], nr_items: u32) -> Result<Vec<SearchItem>> {
    let mut items = Vec::with_capacity(nr_items as usize);
    let mut off = 0usize;

    for found in 0..nr_items {
        let rest = &buf[off.min(buf.len())..];
        if rest.len() < SEARCH_HEADER_SIZE {
            return Err(DecodeError::ItemCount {
                expected: nr_items,
                found,
            });
        }

        let len = ne32(rest, 28) as usize;
        ensure_len("search item", rest, SEARCH_HEADER_SIZE + len)?;

        items.push(SearchItem {
            transid: ne64(rest, 0),
            objectid: ne64(rest, 8),
            offset: ne64(rest, 16),
            item_type: ne32(rest, 24),
            data: rest[SEARCH_HEADER_SIZE..SEARCH_HEADER_SIZE + len].to_vec(),
        });
        off += SEARCH_HEADER_SIZE + len;
    }

    Ok(items)
}

/// On-disk `btrfs_timespec`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskTimespec {
    pub sec: u64,
    pub nsec: u32,
}

impl DiskTimespec {
    fn parse(buf: &[u8], off: usize) -> Self {
        Self {
            sec: le64(buf, off),
            nsec: le32(buf, off + 8),
        }
    }
}

/// The subset of `btrfs_root_item` describing a subvolume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootItem {
    pub generation: u64,
    pub flags: u64,
    pub uuid: [u8; 16],
    pub parent_uuid: [u8; 16],
    pub received_uuid: [u8; 16],
    pub ctransid: u64,
    pub otransid: u64,
    pub stransid: u64,
    pub rtransid: u64,
    pub ctime: DiskTimespec,
    pub otime: DiskTimespec,
    pub stime: DiskTimespec,
    pub rtime: DiskTimespec,
}

impl RootItem {
    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("root item", data, ROOT_ITEM_LEGACY_SIZE)?;

        // Zero-extend legacy items so the extended fields read as "never".
        let mut buf = [0u8; ROOT_ITEM_SIZE];
        let n = data.len().min(ROOT_ITEM_SIZE);
        buf[..n].copy_from_slice(&data[..n]);

        Ok(Self {
            generation: le64(&buf, ROOT_ITEM_GENERATION),
            flags: le64(&buf, ROOT_ITEM_FLAGS),
            uuid: uuid_at(&buf, ROOT_ITEM_UUID),
            parent_uuid: uuid_at(&buf, ROOT_ITEM_PARENT_UUID),
            received_uuid: uuid_at(&buf, ROOT_ITEM_RECEIVED_UUID),
            ctransid: le64(&buf, ROOT_ITEM_CTRANSID),
            otransid: le64(&buf, ROOT_ITEM_OTRANSID),
            stransid: le64(&buf, ROOT_ITEM_STRANSID),
            rtransid: le64(&buf, ROOT_ITEM_RTRANSID),
            ctime: DiskTimespec::parse(&buf, ROOT_ITEM_CTIME),
            otime: DiskTimespec::parse(&buf, ROOT_ITEM_OTIME),
            stime: DiskTimespec::parse(&buf, ROOT_ITEM_STIME),
            rtime: DiskTimespec::parse(&buf, ROOT_ITEM_RTIME),
        })
    }

    /// Encode as a full-size on-disk item. Fields not modelled are zero.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; ROOT_ITEM_SIZE];
        let mut put64 = |off: usize, v: u64| buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
        put64(ROOT_ITEM_GENERATION, self.generation);
        put64(ROOT_ITEM_FLAGS, self.flags);
        put64(ROOT_ITEM_CTRANSID, self.ctransid);
        put64(ROOT_ITEM_OTRANSID, self.otransid);
        put64(ROOT_ITEM_STRANSID, self.stransid);
        put64(ROOT_ITEM_RTRANSID, self.rtransid);
        for (off, ts) in [
            (ROOT_ITEM_CTIME, self.ctime),
            (ROOT_ITEM_OTIME, self.otime),
            (ROOT_ITEM_STIME, self.stime),
            (ROOT_ITEM_RTIME, self.rtime),
        ] {
            buf[off..off + 8].copy_from_slice(&ts.sec.to_le_bytes());
            buf[off + 8..off + 12].copy_from_slice(&ts.nsec.to_le_bytes());
        }
        buf[ROOT_ITEM_UUID..ROOT_ITEM_UUID + 16].copy_from_slice(&self.uuid);
        buf[ROOT_ITEM_PARENT_UUID..ROOT_ITEM_PARENT_UUID + 16].copy_from_slice(&self.parent_uuid);
        buf[ROOT_ITEM_RECEIVED_UUID..ROOT_ITEM_RECEIVED_UUID + 16]
            .copy_from_slice(&self.received_uuid);
        buf
    }
}

/// `btrfs_root_ref` plus its trailing name. Used for both ROOT_REF and
/// ROOT_BACKREF items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRef {
    /// Directory in the parent subvolume holding the child.
    pub dirid: u64,
    pub sequence: u64,
    pub name: Vec<u8>,
}

impl RootRef {
    pub fn parse(data: &[u8]) -> Result<Self> {
        ensure_len("root ref", data, ROOT_REF_SIZE)?;
        let name_len = le16(data, 16) as usize;
        ensure_len("root ref name", data, ROOT_REF_SIZE + name_len)?;

        Ok(Self {
            dirid: le64(data, 0),
            sequence: le64(data, 8),
            name: data[ROOT_REF_SIZE..ROOT_REF_SIZE + name_len].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ROOT_REF_SIZE + self.name.len());
        buf.extend_from_slice(&self.dirid.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.name);
        buf
    }
}

/// `btrfs_dir_item` plus its name. Data bytes (xattr values) are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirItem {
    pub location_objectid: u64,
    pub location_type: u8,
    pub location_offset: u64,
    pub transid: u64,
    pub file_type: u8,
    pub name: Vec<u8>,
}

impl DirItem {
    /// Parse every dir item packed into one item payload. Names that hash
    /// to the same key share a payload.
    pub fn parse_all(data: &[u8]) -> Result<Vec<Self>> {
        let mut items = Vec::new();
        let mut rest = data;

        while !rest.is_empty() {
            ensure_len("dir item", rest, DIR_ITEM_SIZE)?;
            let data_len = le16(rest, 25) as usize;
            let name_len = le16(rest, 27) as usize;
            let total = DIR_ITEM_SIZE + name_len + data_len;
            ensure_len("dir item name", rest, total)?;

            items.push(Self {
                location_objectid: le64(rest, 0),
                location_type: rest[8],
                location_offset: le64(rest, 9),
                transid: le64(rest, 17),
                file_type: rest[29],
                name: rest[DIR_ITEM_SIZE..DIR_ITEM_SIZE + name_len].to_vec(),
            });
            rest = &rest[total..];
        }

        Ok(items)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DIR_ITEM_SIZE + self.name.len());
        buf.extend_from_slice(&self.location_objectid.to_le_bytes());
        buf.push(self.location_type);
        buf.extend_from_slice(&self.location_offset.to_le_bytes());
        buf.extend_from_slice(&self.transid.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        buf.push(self.file_type);
        buf.extend_from_slice(&self.name);
        buf
    }
}
