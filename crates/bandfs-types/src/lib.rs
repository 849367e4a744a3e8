#![forbid(unsafe_code)]
//! Core types for SysV band images.
//!
//! Layout constants, unit-carrying newtypes, the `ParseError` taxonomy,
//! byte-order helpers for the big-endian (68K) on-disk encoding, and the
//! pure logical-to-physical block resolution plan. No I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fixed device block size in bytes. Every transfer is one whole block.
pub const BLOCK_SIZE: usize = 1024;

/// Physical block index of the superblock.
pub const SUPERBLOCK_BLOCK: u64 = 1;

/// Superblock record size (the whole of block 1).
pub const SUPERBLOCK_SIZE: usize = 1024;

/// Superblock signature. Stored unswapped by the 68K-era tooling, so it
/// is the one multi-byte field read little-endian (see `bandfs-ondisk`).
pub const SUPERBLOCK_MAGIC: u32 = 0x207E_18FD;

/// Byte offset of inode number 0; inode `n` lives at `0x7C0 + n * 0x40`.
/// Inode numbers are 1-based, so the first real record starts at 0x800.
pub const INODE_TABLE_BASE: u64 = 0x7C0;

/// On-disk inode record size in bytes.
pub const INODE_RECORD_SIZE: usize = 0x40;

/// Number of block-address slots in an inode.
pub const INODE_ADDR_SLOTS: usize = 13;

/// Slots 0..10 hold direct block numbers.
pub const DIRECT_SLOTS: usize = 10;

/// Slot holding the single-indirection table block.
pub const SINGLE_INDIRECT_SLOT: usize = 10;

/// Slot holding the double-indirection root block. Slot 12 is unused.
pub const DOUBLE_INDIRECT_SLOT: usize = 11;

/// Big-endian u32 entries per 1024-byte indirect table block.
pub const ADDRS_PER_BLOCK: u64 = 256;

/// First logical index served by the single-indirect table.
pub const SINGLE_INDIRECT_START: u64 = DIRECT_SLOTS as u64;

/// First logical index served by the double-indirect tree (10 + 256).
pub const DOUBLE_INDIRECT_START: u64 = SINGLE_INDIRECT_START + ADDRS_PER_BLOCK;

/// First logical index beyond two indirection levels (10 + 256 + 256*256).
pub const INDIRECTION_LIMIT: u64 = DOUBLE_INDIRECT_START + ADDRS_PER_BLOCK * ADDRS_PER_BLOCK;

/// Directory entry record size: 2-byte inode number + 14-byte name.
pub const DIR_ENTRY_SIZE: usize = 16;

/// Fixed width of a directory entry name.
pub const DIR_NAME_LEN: usize = 14;

/// Directory entries per 1024-byte block.
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

/// Physical block number on the band image.
///
/// Block addresses are assembled from 3 on-disk bytes, so the value is
/// always below 2^24; indirect table entries widen it to u32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(pub u32);

impl BlockNumber {
    /// Byte offset of this block on the device.
    #[must_use]
    pub fn to_byte_offset(self) -> u64 {
        u64::from(self.0) * BLOCK_SIZE as u64
    }
}

/// Inode number (1-based; 2 is always the root directory).
///
/// Directory entries store inode numbers as big-endian u16, which fixes
/// the width for the whole format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeNumber(pub u16);

impl InodeNumber {
    pub const ROOT: Self = Self(2);

    /// Byte offset of this inode's 64-byte record.
    #[must_use]
    pub fn to_byte_offset(self) -> u64 {
        INODE_TABLE_BASE + u64::from(self.0) * INODE_RECORD_SIZE as u64
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("insufficient data: need {needed} bytes at offset {offset}, got {actual}")]
    InsufficientData {
        needed: usize,
        offset: usize,
        actual: usize,
    },
    #[error("invalid magic: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },
    #[error("invalid field: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

// ── Byte-order normalizer ───────────────────────────────────────────────────
//
// The band format is big-endian (68K); these reverse a word or halfword
// between the on-disk and host representation. Both are self-inverse.

/// Reverse the byte order of a 32-bit word.
#[must_use]
pub fn swap_word(value: u32) -> u32 {
    value.swap_bytes()
}

/// Reverse the byte order of a 16-bit halfword.
#[must_use]
pub fn swap_hword(value: u16) -> u16 {
    value.swap_bytes()
}

// ── Raw-buffer read helpers ─────────────────────────────────────────────────

#[inline]
pub fn ensure_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    let Some(end) = offset.checked_add(len) else {
        return Err(ParseError::InvalidField {
            field: "offset",
            reason: "overflow",
        });
    };

    if end > data.len() {
        return Err(ParseError::InsufficientData {
            needed: len,
            offset,
            actual: data.len().saturating_sub(offset),
        });
    }

    Ok(&data[offset..end])
}

#[inline]
pub fn read_be_u16(data: &[u8], offset: usize) -> Result<u16, ParseError> {
    let bytes = ensure_slice(data, offset, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub fn read_be_u32(data: &[u8], offset: usize) -> Result<u32, ParseError> {
    let bytes = ensure_slice(data, offset, 4)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub fn read_fixed<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], ParseError> {
    let bytes = ensure_slice(data, offset, N)?;
    let mut out = [0_u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Decode a fixed-width, NUL-padded name field into a `String`.
#[must_use]
pub fn trim_nul_padded(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

// ── Block resolution plan ───────────────────────────────────────────────────

/// How a logical block index within a file maps onto the inode's address
/// slots. Pure arithmetic; the actual table walks live in `bandfs-core`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPlan {
    /// `inode.addr[slot]` is the physical block.
    Direct { slot: usize },
    /// `inode.addr[10]` names a table; `index` selects the entry.
    SingleIndirect { index: usize },
    /// `inode.addr[11]` names a table of tables.
    DoubleIndirect { first: usize, second: usize },
    /// Beyond two indirection levels; not addressable by this format.
    OutOfRange,
}

/// Map a logical block index to its resolution plan.
///
/// Thresholds: direct below 10, single-indirect below 266,
/// double-indirect below 65802.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // indices are < 256 by construction
pub fn block_plan(logical: u64) -> BlockPlan {
    if logical < SINGLE_INDIRECT_START {
        BlockPlan::Direct {
            slot: logical as usize,
        }
    } else if logical < DOUBLE_INDIRECT_START {
        BlockPlan::SingleIndirect {
            index: (logical - SINGLE_INDIRECT_START) as usize,
        }
    } else if logical < INDIRECTION_LIMIT {
        let offset = logical - DOUBLE_INDIRECT_START;
        BlockPlan::DoubleIndirect {
            first: (offset / ADDRS_PER_BLOCK) as usize,
            second: (offset % ADDRS_PER_BLOCK) as usize,
        }
    } else {
        BlockPlan::OutOfRange
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_is_self_inverse() {
        for value in [0_u32, 1, 0x0102_0304, 0xDEAD_BEEF, u32::MAX] {
            assert_eq!(swap_word(swap_word(value)), value);
        }
        for value in [0_u16, 1, 0x0102, 0xBEEF, u16::MAX] {
            assert_eq!(swap_hword(swap_hword(value)), value);
        }
    }

    #[test]
    fn swap_reverses_bytes() {
        assert_eq!(swap_word(0x0102_0304), 0x0403_0201);
        assert_eq!(swap_hword(0x0102), 0x0201);
    }

    #[test]
    fn read_helpers_are_big_endian() {
        let bytes = [0x12_u8, 0x34, 0x56, 0x78];
        assert_eq!(read_be_u16(&bytes, 0).expect("u16"), 0x1234);
        assert_eq!(read_be_u16(&bytes, 2).expect("u16"), 0x5678);
        assert_eq!(read_be_u32(&bytes, 0).expect("u32"), 0x1234_5678);
    }

    #[test]
    fn read_helpers_reject_short_input() {
        let bytes = [0_u8; 3];
        assert!(matches!(
            read_be_u32(&bytes, 0),
            Err(ParseError::InsufficientData {
                needed: 4,
                offset: 0,
                actual: 3
            })
        ));
        assert!(read_be_u16(&bytes, 2).is_err());
    }

    #[test]
    fn trim_nul_padded_stops_at_first_nul() {
        assert_eq!(trim_nul_padded(b"usr\0\0\0"), "usr");
        assert_eq!(trim_nul_padded(b"abcdef"), "abcdef");
        assert_eq!(trim_nul_padded(b"\0junk"), "");
    }

    #[test]
    fn inode_offsets_match_fixed_table() {
        assert_eq!(InodeNumber(1).to_byte_offset(), 0x800);
        assert_eq!(InodeNumber(2).to_byte_offset(), 0x840);
        assert_eq!(InodeNumber::ROOT, InodeNumber(2));
    }

    #[test]
    fn block_byte_offsets() {
        assert_eq!(BlockNumber(0).to_byte_offset(), 0);
        assert_eq!(BlockNumber(1).to_byte_offset(), 1024);
        assert_eq!(BlockNumber(0x00FF_FFFF).to_byte_offset(), 0x3FF_FFFC00);
    }

    #[test]
    fn plan_direct_range() {
        assert_eq!(block_plan(0), BlockPlan::Direct { slot: 0 });
        assert_eq!(block_plan(9), BlockPlan::Direct { slot: 9 });
    }

    #[test]
    fn plan_single_indirect_range() {
        assert_eq!(block_plan(10), BlockPlan::SingleIndirect { index: 0 });
        assert_eq!(block_plan(15), BlockPlan::SingleIndirect { index: 5 });
        assert_eq!(block_plan(265), BlockPlan::SingleIndirect { index: 255 });
    }

    #[test]
    fn plan_double_indirect_range() {
        assert_eq!(
            block_plan(266),
            BlockPlan::DoubleIndirect {
                first: 0,
                second: 0
            }
        );
        assert_eq!(
            block_plan(266 + 256 + 3),
            BlockPlan::DoubleIndirect {
                first: 1,
                second: 3
            }
        );
        assert_eq!(
            block_plan(65801),
            BlockPlan::DoubleIndirect {
                first: 255,
                second: 255
            }
        );
    }

    #[test]
    fn plan_out_of_range_at_limit() {
        assert_eq!(block_plan(65802), BlockPlan::OutOfRange);
        assert_eq!(block_plan(u64::MAX), BlockPlan::OutOfRange);
    }

    #[test]
    fn threshold_constants_line_up() {
        assert_eq!(DOUBLE_INDIRECT_START, 266);
        assert_eq!(INDIRECTION_LIMIT, 65802);
        assert_eq!(DIR_ENTRIES_PER_BLOCK, 64);
    }
}
