#![forbid(unsafe_code)]
//! On-disk format parsing for SysV band images.
//!
//! Pure parsing crate — no I/O, no side effects. Decodes byte slices into
//! typed structures for the three fixed records of the format: the
//! 1024-byte superblock, the 64-byte inode, and the 16-byte directory
//! entry. All multi-byte integers are big-endian (68K) except the
//! superblock magic (stored unswapped, see [`SuperBlock::parse_region`]),
//! the packed mode/type field, and the 3-byte block-address entries.

use bandfs_types::{
    BlockNumber, DIR_ENTRIES_PER_BLOCK, DIR_ENTRY_SIZE, DIR_NAME_LEN, INODE_ADDR_SLOTS,
    INODE_RECORD_SIZE, InodeNumber, ParseError, SUPERBLOCK_MAGIC, SUPERBLOCK_SIZE, ensure_slice,
    read_be_u16, read_be_u32, read_fixed, trim_nul_padded,
};
use serde::{Deserialize, Serialize};

// ── Superblock ──────────────────────────────────────────────────────────────

/// Decoded volume header (block 1 of the image).
///
/// Only the magic is validated; every other field is trusted for the
/// lifetime of the session. The free lists and lock flags are decoded for
/// inspection but never interpreted — this toolkit performs no mount-state
/// negotiation and no allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    /// Number of blocks in the i-list.
    pub ilist_blocks: u16,
    /// Size of the volume in blocks.
    pub volume_blocks: u32,
    /// Number of valid addresses in the free block list.
    pub nfree: u16,
    /// Free block list (50 entries).
    pub free: Vec<u32>,
    /// Number of inodes in the free inode list.
    pub ninode: u16,
    /// Free inode list (100 entries).
    pub free_inodes: Vec<u16>,
    /// Free block list update lock.
    pub flock: u8,
    /// Free inode list update lock.
    pub ilock: u8,
    /// Superblock-modified flag.
    pub fmod: u8,
    /// Read-only mount flag.
    pub readonly: u8,
    /// Timestamp of the last superblock update (seconds since epoch).
    pub time: u32,
    /// Device information words.
    pub dinfo: [u16; 4],
    /// Total free blocks.
    pub tfree: u32,
    /// Total free inodes.
    pub tinode: u16,
    /// Filesystem name.
    pub fname: String,
    /// Disk pack name.
    pub fpack: String,
    /// Magic number (must equal [`SUPERBLOCK_MAGIC`]).
    pub magic: u32,
    /// Filesystem type word.
    pub fs_type: u32,
}

impl SuperBlock {
    /// Parse a superblock from its 1024-byte on-disk region.
    ///
    /// Fails with `InvalidMagic` unless the magic word equals
    /// `0x207E18FD`. The magic is the one field the 68K-era tooling
    /// wrote without byte-swapping, so it is decoded little-endian;
    /// everything else is big-endian.
    pub fn parse_region(region: &[u8]) -> Result<Self, ParseError> {
        if region.len() < SUPERBLOCK_SIZE {
            return Err(ParseError::InsufficientData {
                needed: SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            });
        }

        let magic_bytes = read_fixed::<4>(region, 1016)?;
        let magic = u32::from_le_bytes(magic_bytes);
        if magic != SUPERBLOCK_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: SUPERBLOCK_MAGIC,
                actual: magic,
            });
        }

        let mut free = Vec::with_capacity(50);
        for k in 0..50 {
            free.push(read_be_u32(region, 8 + k * 4)?);
        }

        let mut free_inodes = Vec::with_capacity(100);
        for k in 0..100 {
            free_inodes.push(read_be_u16(region, 210 + k * 2)?);
        }

        let flags = ensure_slice(region, 410, 4)?;

        Ok(Self {
            ilist_blocks: read_be_u16(region, 0)?,
            volume_blocks: read_be_u32(region, 2)?,
            nfree: read_be_u16(region, 6)?,
            free,
            ninode: read_be_u16(region, 208)?,
            free_inodes,
            flock: flags[0],
            ilock: flags[1],
            fmod: flags[2],
            readonly: flags[3],
            time: read_be_u32(region, 414)?,
            dinfo: [
                read_be_u16(region, 418)?,
                read_be_u16(region, 420)?,
                read_be_u16(region, 422)?,
                read_be_u16(region, 424)?,
            ],
            tfree: read_be_u32(region, 426)?,
            tinode: read_be_u16(region, 430)?,
            fname: trim_nul_padded(&read_fixed::<6>(region, 432)?),
            fpack: trim_nul_padded(&read_fixed::<6>(region, 438)?),
            magic,
            fs_type: read_be_u32(region, 1020)?,
        })
    }
}

// ── Inode ───────────────────────────────────────────────────────────────────

/// Object type nibble of the packed mode field.
///
/// Values other than the five named kinds are not interpreted and
/// propagate as [`FileKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    None,
    Fifo,
    CharDevice,
    Directory,
    BlockDevice,
    RegularFile,
    Other(u8),
}

impl FileKind {
    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Fifo,
            2 => Self::CharDevice,
            4 => Self::Directory,
            6 => Self::BlockDevice,
            8 => Self::RegularFile,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn is_directory(self) -> bool {
        self == Self::Directory
    }

    #[must_use]
    pub fn is_regular(self) -> bool {
        self == Self::RegularFile
    }
}

/// Split the packed on-disk mode field into permission bits and type.
///
/// `raw` holds the two mode bytes in on-disk order (big-endian, so
/// `raw[0]` is the high byte). The low byte and the low nibble of the
/// high byte carry the 12 permission bits; the high nibble of the high
/// byte is the object type. Kept free of I/O so the bit arithmetic is
/// testable on its own.
#[must_use]
pub fn split_mode(raw: [u8; 2]) -> (u16, FileKind) {
    let perms = u16::from(raw[1]) | (u16::from(raw[0] & 0x0F) << 8);
    let kind = FileKind::from_raw((raw[0] >> 4) & 0x0F);
    (perms, kind)
}

/// Decoded inode record.
///
/// Address slots 0–9 are direct block numbers, slot 10 the
/// single-indirection table, slot 11 the double-indirection root; slot 12
/// is present on disk but unused by this implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    /// Permission bits (12 bits: rwxrwxrwx plus setuid/setgid/sticky).
    pub mode: u16,
    /// Object type from the packed mode field.
    pub kind: FileKind,
    /// Number of links.
    pub nlink: u16,
    pub uid: u16,
    pub gid: u16,
    /// File size in bytes.
    pub size: u32,
    /// Block-address slots, each assembled from 3 on-disk bytes.
    pub addr: [u32; INODE_ADDR_SLOTS],
    /// Last access timestamp (seconds since epoch).
    pub atime: u32,
    /// Last modification timestamp.
    pub mtime: u32,
    /// Creation timestamp.
    pub ctime: u32,
}

impl Inode {
    /// Parse an inode from its 64-byte on-disk record.
    ///
    /// The 13 block addresses are each reconstructed from 3 consecutive
    /// bytes (`b0<<16 | b1<<8 | b2`); this is not a halfword/word field
    /// and does not go through the byte-order normalizer.
    pub fn parse_record(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < INODE_RECORD_SIZE {
            return Err(ParseError::InsufficientData {
                needed: INODE_RECORD_SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        let (mode, kind) = split_mode(read_fixed::<2>(bytes, 0)?);

        let mut addr = [0_u32; INODE_ADDR_SLOTS];
        let raw_addr = ensure_slice(bytes, 12, INODE_ADDR_SLOTS * 3)?;
        for (slot, chunk) in raw_addr.chunks_exact(3).enumerate() {
            addr[slot] =
                (u32::from(chunk[0]) << 16) | (u32::from(chunk[1]) << 8) | u32::from(chunk[2]);
        }

        Ok(Self {
            mode,
            kind,
            nlink: read_be_u16(bytes, 2)?,
            uid: read_be_u16(bytes, 4)?,
            gid: read_be_u16(bytes, 6)?,
            size: read_be_u32(bytes, 8)?,
            addr,
            atime: read_be_u32(bytes, 52)?,
            mtime: read_be_u32(bytes, 56)?,
            ctime: read_be_u32(bytes, 60)?,
        })
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.kind.is_regular()
    }
}

// ── Directory entries ───────────────────────────────────────────────────────

/// One 16-byte directory entry: inode number plus fixed-width name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub inode: InodeNumber,
    /// Raw 14-byte name field; short names are NUL-padded.
    pub name: [u8; DIR_NAME_LEN],
}

impl DirEntry {
    /// Name as a UTF-8 string (lossy), trimmed at the first NUL.
    #[must_use]
    pub fn name_str(&self) -> String {
        trim_nul_padded(&self.name)
    }

    /// Fixed-width comparison against a path segment.
    ///
    /// The segment is zero-padded to 14 bytes and compared exactly —
    /// trailing bytes in the on-disk name field participate. Segments
    /// longer than 14 bytes can never match any on-disk name.
    #[must_use]
    pub fn matches(&self, segment: &[u8]) -> bool {
        if segment.len() > DIR_NAME_LEN {
            return false;
        }
        let mut padded = [0_u8; DIR_NAME_LEN];
        padded[..segment.len()].copy_from_slice(segment);
        self.name == padded
    }
}

/// Parse the populated entries of one directory data block.
///
/// Entries are scanned in order; an entry with inode number 0 marks the
/// end of the populated region and terminates the scan of this block.
/// A returned length below [`DIR_ENTRIES_PER_BLOCK`] therefore means the
/// directory ends inside this block.
pub fn parse_dir_block(block: &[u8]) -> Result<Vec<DirEntry>, ParseError> {
    let mut entries = Vec::new();

    for index in 0..DIR_ENTRIES_PER_BLOCK {
        let offset = index * DIR_ENTRY_SIZE;
        let inode = read_be_u16(block, offset)?;
        if inode == 0 {
            break;
        }
        entries.push(DirEntry {
            inode: InodeNumber(inode),
            name: read_fixed::<DIR_NAME_LEN>(block, offset + 2)?,
        });
    }

    Ok(entries)
}

/// Look up a single segment in a directory data block.
#[must_use]
pub fn lookup_in_dir_block(block: &[u8], segment: &[u8]) -> Option<DirEntry> {
    let entries = parse_dir_block(block).ok()?;
    entries.into_iter().find(|e| e.matches(segment))
}

/// Physical block referenced by an address slot, with 0 meaning
/// "unallocated" (EOF for direct slots).
#[must_use]
pub fn slot_block(addr: u32) -> Option<BlockNumber> {
    if addr == 0 {
        None
    } else {
        Some(BlockNumber(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal valid superblock region with a handful of fields set.
    fn make_superblock_region() -> Vec<u8> {
        let mut region = vec![0_u8; SUPERBLOCK_SIZE];
        region[0..2].copy_from_slice(&100_u16.to_be_bytes()); // ilist_blocks
        region[2..6].copy_from_slice(&20_000_u32.to_be_bytes()); // volume_blocks
        region[6..8].copy_from_slice(&3_u16.to_be_bytes()); // nfree
        region[8..12].copy_from_slice(&777_u32.to_be_bytes()); // free[0]
        region[208..210].copy_from_slice(&5_u16.to_be_bytes()); // ninode
        region[210..212].copy_from_slice(&42_u16.to_be_bytes()); // free_inodes[0]
        region[414..418].copy_from_slice(&1_234_567_u32.to_be_bytes()); // time
        region[426..430].copy_from_slice(&9_999_u32.to_be_bytes()); // tfree
        region[430..432].copy_from_slice(&55_u16.to_be_bytes()); // tinode
        region[432..438].copy_from_slice(b"root\0\0");
        region[438..444].copy_from_slice(b"pack01");
        // Magic is stored unswapped (little-endian on disk).
        region[1016..1020].copy_from_slice(&SUPERBLOCK_MAGIC.to_le_bytes());
        region[1020..1024].copy_from_slice(&2_u32.to_be_bytes()); // fs_type
        region
    }

    #[test]
    fn parse_superblock_smoke() {
        let region = make_superblock_region();
        let sb = SuperBlock::parse_region(&region).expect("superblock parse");
        assert_eq!(sb.ilist_blocks, 100);
        assert_eq!(sb.volume_blocks, 20_000);
        assert_eq!(sb.nfree, 3);
        assert_eq!(sb.free[0], 777);
        assert_eq!(sb.ninode, 5);
        assert_eq!(sb.free_inodes[0], 42);
        assert_eq!(sb.time, 1_234_567);
        assert_eq!(sb.tfree, 9_999);
        assert_eq!(sb.tinode, 55);
        assert_eq!(sb.fname, "root");
        assert_eq!(sb.fpack, "pack01");
        assert_eq!(sb.magic, SUPERBLOCK_MAGIC);
        assert_eq!(sb.fs_type, 2);
    }

    #[test]
    fn parse_superblock_rejects_bad_magic() {
        let mut region = make_superblock_region();
        region[1016..1020].copy_from_slice(&0xDEAD_BEEF_u32.to_le_bytes());
        let err = SuperBlock::parse_region(&region).expect_err("bad magic");
        assert_eq!(
            err,
            ParseError::InvalidMagic {
                expected: SUPERBLOCK_MAGIC,
                actual: 0xDEAD_BEEF,
            }
        );
    }

    #[test]
    fn parse_superblock_rejects_byteswapped_magic() {
        // The magic written big-endian (i.e. swapped relative to the
        // 68K-era tooling) must not pass.
        let mut region = make_superblock_region();
        region[1016..1020].copy_from_slice(&SUPERBLOCK_MAGIC.to_be_bytes());
        assert!(SuperBlock::parse_region(&region).is_err());
    }

    #[test]
    fn parse_superblock_rejects_short_region() {
        let err = SuperBlock::parse_region(&[0_u8; 512]).expect_err("short");
        assert!(matches!(
            err,
            ParseError::InsufficientData { needed: 1024, .. }
        ));
    }

    #[test]
    fn split_mode_vectors() {
        // drwxr-xr-x: type nibble 4, permissions 0o755.
        assert_eq!(split_mode([0x41, 0xED]), (0o755, FileKind::Directory));
        // -rw-r--r--: type nibble 8, permissions 0o644.
        assert_eq!(split_mode([0x81, 0xA4]), (0o644, FileKind::RegularFile));
        // Char device with every permission bit set.
        assert_eq!(split_mode([0x2F, 0xFF]), (0o7777, FileKind::CharDevice));
        assert_eq!(split_mode([0x10, 0x00]), (0, FileKind::Fifo));
        assert_eq!(split_mode([0x60, 0x00]), (0, FileKind::BlockDevice));
        // Unknown type nibbles propagate opaquely.
        assert_eq!(split_mode([0x30, 0x00]).1, FileKind::Other(3));
    }

    fn make_inode_record() -> Vec<u8> {
        let mut rec = vec![0_u8; INODE_RECORD_SIZE];
        rec[0] = 0x81; // regular file, high permission nibble 1
        rec[1] = 0xA4; // 0o644
        rec[2..4].copy_from_slice(&2_u16.to_be_bytes()); // nlink
        rec[4..6].copy_from_slice(&0o10_u16.to_be_bytes()); // uid
        rec[6..8].copy_from_slice(&0o20_u16.to_be_bytes()); // gid
        rec[8..12].copy_from_slice(&2_000_u32.to_be_bytes()); // size
        rec[12..15].copy_from_slice(&[0x01, 0x02, 0x03]); // addr[0] = 0x010203
        rec[15..18].copy_from_slice(&[0x00, 0x00, 0x2A]); // addr[1] = 42
        rec[48..51].copy_from_slice(&[0x00, 0x01, 0x00]); // addr[12] = 256
        rec[52..56].copy_from_slice(&111_u32.to_be_bytes()); // atime
        rec[56..60].copy_from_slice(&222_u32.to_be_bytes()); // mtime
        rec[60..64].copy_from_slice(&333_u32.to_be_bytes()); // ctime
        rec
    }

    #[test]
    fn parse_inode_record_smoke() {
        let inode = Inode::parse_record(&make_inode_record()).expect("inode parse");
        assert_eq!(inode.mode, 0o644);
        assert_eq!(inode.kind, FileKind::RegularFile);
        assert!(inode.is_regular());
        assert_eq!(inode.nlink, 2);
        assert_eq!(inode.uid, 0o10);
        assert_eq!(inode.gid, 0o20);
        assert_eq!(inode.size, 2_000);
        assert_eq!(inode.addr[0], 0x0001_0203);
        assert_eq!(inode.addr[1], 42);
        assert_eq!(inode.addr[2], 0);
        assert_eq!(inode.addr[12], 256);
        assert_eq!(inode.atime, 111);
        assert_eq!(inode.mtime, 222);
        assert_eq!(inode.ctime, 333);
    }

    #[test]
    fn parse_inode_record_rejects_short_buffer() {
        let err = Inode::parse_record(&[0_u8; 63]).expect_err("short");
        assert!(matches!(err, ParseError::InsufficientData { needed: 64, .. }));
    }

    fn push_entry(block: &mut [u8], index: usize, inode: u16, name: &[u8]) {
        let offset = index * DIR_ENTRY_SIZE;
        block[offset..offset + 2].copy_from_slice(&inode.to_be_bytes());
        block[offset + 2..offset + 2 + name.len()].copy_from_slice(name);
    }

    #[test]
    fn parse_dir_block_stops_at_sentinel() {
        let mut block = vec![0_u8; 1024];
        push_entry(&mut block, 0, 2, b".");
        push_entry(&mut block, 1, 2, b"..");
        push_entry(&mut block, 2, 10, b"bin");
        // Entry 3 has inode 0 — scan must stop even though entry 4 is set.
        push_entry(&mut block, 4, 99, b"ghost");

        let entries = parse_dir_block(&block).expect("dir block");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].inode, InodeNumber(10));
        assert_eq!(entries[2].name_str(), "bin");
    }

    #[test]
    fn parse_dir_block_full_block() {
        let mut block = vec![0_u8; 1024];
        for k in 0..DIR_ENTRIES_PER_BLOCK {
            push_entry(&mut block, k, (k + 1) as u16, format!("e{k}").as_bytes());
        }
        let entries = parse_dir_block(&block).expect("dir block");
        assert_eq!(entries.len(), DIR_ENTRIES_PER_BLOCK);
    }

    #[test]
    fn dir_entry_matching_is_fixed_width() {
        let mut block = vec![0_u8; 1024];
        push_entry(&mut block, 0, 11, b"a.txt");
        let entries = parse_dir_block(&block).expect("dir block");

        // NUL-padded on-disk name matches the unpadded query.
        assert!(entries[0].matches(b"a.txt"));
        // Prefixes and extensions do not.
        assert!(!entries[0].matches(b"a.tx"));
        assert!(!entries[0].matches(b"a.txt2"));
        // Over-long segments can never match.
        assert!(!entries[0].matches(b"name-way-too-long"));
    }

    #[test]
    fn dir_entry_matching_at_full_width() {
        let mut block = vec![0_u8; 1024];
        push_entry(&mut block, 0, 7, b"fourteen-bytes");
        let entries = parse_dir_block(&block).expect("dir block");
        assert_eq!(entries[0].name_str(), "fourteen-bytes");
        assert!(entries[0].matches(b"fourteen-bytes"));
        assert!(!entries[0].matches(b"fourteen-byte"));
    }

    #[test]
    fn lookup_in_dir_block_finds_entry() {
        let mut block = vec![0_u8; 1024];
        push_entry(&mut block, 0, 2, b".");
        push_entry(&mut block, 1, 10, b"usr");
        let entry = lookup_in_dir_block(&block, b"usr").expect("found");
        assert_eq!(entry.inode, InodeNumber(10));
        assert!(lookup_in_dir_block(&block, b"missing").is_none());
    }

    #[test]
    fn slot_block_zero_is_unallocated() {
        assert_eq!(slot_block(0), None);
        assert_eq!(slot_block(7), Some(BlockNumber(7)));
    }
}
