#![forbid(unsafe_code)]
//! Band image session layer.
//!
//! `BandImage` owns an opened device and a validated superblock, and
//! provides every read operation the toolkit offers: inode decoding,
//! logical-to-physical block resolution through two indirection levels,
//! absolute-path resolution, directory listing, and regular-file
//! extraction. Nothing decoded is cached; every call re-reads the disk
//! structures it needs.

use bandfs_block::{BandDevice, BlockBuf, ByteDevice, FileByteDevice};
use bandfs_error::{FsError, Result};
use bandfs_ondisk::{DirEntry, Inode, SuperBlock, parse_dir_block, slot_block};
use bandfs_types::{
    BLOCK_SIZE, BlockNumber, BlockPlan, DIR_ENTRIES_PER_BLOCK, DIR_NAME_LEN, DOUBLE_INDIRECT_SLOT,
    INODE_RECORD_SIZE, InodeNumber, ParseError, SINGLE_INDIRECT_SLOT, block_plan, read_be_u32,
};
use std::io::Write;
use std::path::Path;
use tracing::{debug, trace};

/// Convert a parse-layer error into the user-facing error type.
///
/// The magic check keeps its structured variant; everything else
/// carries the parse diagnostic as text.
#[must_use]
pub fn parse_error_to_fs(err: ParseError) -> FsError {
    match err {
        ParseError::InvalidMagic { expected, actual } => FsError::BadMagic { expected, actual },
        other => FsError::Parse(other.to_string()),
    }
}

/// An opened band image: device handle plus validated superblock.
///
/// The session is read-only and single-threaded. The superblock is the
/// only structure retained across calls; inodes, indirect tables, and
/// directory blocks are decoded on demand.
#[derive(Debug)]
pub struct BandImage {
    superblock: SuperBlock,
    dev: BandDevice,
}

impl BandImage {
    /// Open a band image file and validate its superblock.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        debug!(path = %path.as_ref().display(), "opening band image");
        let dev = FileByteDevice::open(path)?;
        Self::from_device(Box::new(dev))
    }

    /// Build a session from an already-opened byte device.
    pub fn from_device(dev: Box<dyn ByteDevice>) -> Result<Self> {
        let dev = BandDevice::new(dev);
        let region = dev.read_superblock_region()?;
        let superblock = SuperBlock::parse_region(&region).map_err(parse_error_to_fs)?;
        debug!(
            fname = %superblock.fname,
            volume_blocks = superblock.volume_blocks,
            "superblock validated"
        );
        Ok(Self { superblock, dev })
    }

    #[must_use]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[must_use]
    pub fn device(&self) -> &BandDevice {
        &self.dev
    }

    // ── Inode reads ─────────────────────────────────────────────────────────

    /// Read and decode one inode record.
    ///
    /// Inode numbers are 1-based; 0 is the directory-entry sentinel and
    /// never addresses a record.
    pub fn read_inode(&self, number: InodeNumber) -> Result<Inode> {
        if number.0 == 0 {
            return Err(FsError::Format("inode number 0 is not addressable".to_owned()));
        }
        let mut record = [0_u8; INODE_RECORD_SIZE];
        self.dev.read_exact_at(number.to_byte_offset(), &mut record)?;
        Inode::parse_record(&record).map_err(parse_error_to_fs)
    }

    // ── Block resolution ────────────────────────────────────────────────────

    /// Resolve a logical block index within a file to a physical block.
    ///
    /// `Ok(None)` means the file ends before this block (an address of 0
    /// anywhere on the resolution path). Logical indices beyond two
    /// indirection levels fail with `IndirectionLimit`.
    pub fn resolve_block(&self, inode: &Inode, logical: u64) -> Result<Option<BlockNumber>> {
        match block_plan(logical) {
            BlockPlan::Direct { slot } => Ok(slot_block(inode.addr[slot])),
            BlockPlan::SingleIndirect { index } => {
                let Some(table) = slot_block(inode.addr[SINGLE_INDIRECT_SLOT]) else {
                    return Ok(None);
                };
                self.indirect_entry(table, index)
            }
            BlockPlan::DoubleIndirect { first, second } => {
                let Some(root) = slot_block(inode.addr[DOUBLE_INDIRECT_SLOT]) else {
                    return Ok(None);
                };
                let Some(table) = self.indirect_entry(root, first)? else {
                    return Ok(None);
                };
                self.indirect_entry(table, second)
            }
            BlockPlan::OutOfRange => Err(FsError::IndirectionLimit { logical }),
        }
    }

    /// Read one entry of an indirect table block (256 big-endian words).
    fn indirect_entry(&self, table: BlockNumber, index: usize) -> Result<Option<BlockNumber>> {
        let buf = self.dev.read_block(table)?;
        let entry = read_be_u32(buf.as_slice(), index * 4).map_err(parse_error_to_fs)?;
        trace!(table = table.0, index, entry, "indirect entry");
        Ok(slot_block(entry))
    }

    /// Read the data block at a logical index, or `None` at EOF.
    pub fn read_file_block(&self, inode: &Inode, logical: u64) -> Result<Option<BlockBuf>> {
        match self.resolve_block(inode, logical)? {
            Some(block) => Ok(Some(self.dev.read_block(block)?)),
            None => Ok(None),
        }
    }

    // ── Path resolution ─────────────────────────────────────────────────────

    /// Resolve an absolute path to its inode.
    ///
    /// Paths must start with `/`; `/` alone names the root directory
    /// (inode 2) without any scanning. Repeated separators are
    /// collapsed. A non-directory anywhere before the final segment
    /// fails with `NotDirectory`.
    pub fn resolve_path(&self, path: &str) -> Result<(InodeNumber, Inode)> {
        if !path.starts_with('/') {
            return Err(FsError::Format(format!("path is not absolute: {path}")));
        }
        debug!(path, "resolving path");

        let mut number = InodeNumber::ROOT;
        let mut inode = self.read_inode(number)?;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !inode.is_directory() {
                return Err(FsError::NotDirectory);
            }
            let entry = self
                .lookup_segment(&inode, segment.as_bytes())?
                .ok_or_else(|| FsError::NotFound(segment.to_owned()))?;
            number = entry.inode;
            inode = self.read_inode(number)?;
            trace!(segment, inode = number.0, "segment resolved");
        }

        Ok((number, inode))
    }

    /// Scan a directory's blocks for one name.
    ///
    /// Blocks are visited in increasing logical order. A block holding
    /// fewer than 64 populated entries ends the directory; later blocks
    /// are never scanned. Segments longer than the 14-byte name field
    /// cannot match and skip the scan entirely.
    fn lookup_segment(&self, dir: &Inode, segment: &[u8]) -> Result<Option<DirEntry>> {
        if segment.len() > DIR_NAME_LEN {
            return Ok(None);
        }

        for logical in 0.. {
            let Some(buf) = self.read_file_block(dir, logical)? else {
                return Ok(None);
            };
            let entries = parse_dir_block(buf.as_slice()).map_err(parse_error_to_fs)?;
            let populated = entries.len();

            if let Some(entry) = entries.into_iter().find(|e| e.matches(segment)) {
                return Ok(Some(entry));
            }
            if populated < DIR_ENTRIES_PER_BLOCK {
                return Ok(None);
            }
        }
        unreachable!("logical block range is unbounded")
    }

    /// Enumerate a directory's entries together with each child's inode.
    ///
    /// Uses the same block-scan termination as path resolution: the
    /// first block with fewer than 64 populated entries is the last one
    /// read.
    pub fn list_dir(&self, dir: &Inode) -> Result<Vec<(DirEntry, Inode)>> {
        if !dir.is_directory() {
            return Err(FsError::NotDirectory);
        }

        let mut listing = Vec::new();
        for logical in 0.. {
            let Some(buf) = self.read_file_block(dir, logical)? else {
                break;
            };
            let entries = parse_dir_block(buf.as_slice()).map_err(parse_error_to_fs)?;
            let populated = entries.len();

            for entry in entries {
                let child = self.read_inode(entry.inode)?;
                listing.push((entry, child));
            }
            if populated < DIR_ENTRIES_PER_BLOCK {
                break;
            }
        }
        Ok(listing)
    }

    // ── Extraction ──────────────────────────────────────────────────────────

    /// Stream a regular file's contents into a sink.
    ///
    /// Copies exactly `inode.size` bytes; the final block is truncated
    /// to the remainder. Running out of allocated blocks before `size`
    /// bytes have been copied is an on-disk inconsistency and fails with
    /// `UnexpectedEof`. Returns the number of bytes written.
    pub fn extract(&self, inode: &Inode, sink: &mut dyn Write) -> Result<u64> {
        if inode.is_directory() {
            return Err(FsError::IsDirectory);
        }
        if !inode.is_regular() {
            return Err(FsError::NotRegularFile);
        }

        let size = u64::from(inode.size);
        debug!(size, "extracting file");

        let mut copied = 0_u64;
        let mut logical = 0_u64;
        while copied < size {
            let Some(buf) = self.read_file_block(inode, logical)? else {
                return Err(FsError::UnexpectedEof {
                    expected: size,
                    copied,
                });
            };
            let take = usize::try_from((size - copied).min(BLOCK_SIZE as u64))
                .map_err(|_| FsError::Format("block length does not fit usize".to_owned()))?;
            sink.write_all(&buf.as_slice()[..take])?;
            copied += take as u64;
            logical += 1;
            trace!(logical, copied, "block copied");
        }

        Ok(copied)
    }

    /// Resolve an absolute path and extract it in one step.
    pub fn extract_path(&self, path: &str, sink: &mut dyn Write) -> Result<u64> {
        let (_, inode) = self.resolve_path(path)?;
        self.extract(&inode, sink)
    }
}
