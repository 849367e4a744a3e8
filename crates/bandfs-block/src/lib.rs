#![forbid(unsafe_code)]
//! Read-only device access for band images.
//!
//! Provides the `ByteDevice` trait for fixed-offset reads, a file-backed
//! and an in-memory implementation, and `BandDevice`, the block-addressed
//! wrapper that the session layer reads 1024-byte blocks through. This
//! toolkit never writes to an image, so the device surface has no write
//! or sync operations.

use bandfs_error::{FsError, Result};
use bandfs_types::{BLOCK_SIZE, BlockNumber, SUPERBLOCK_BLOCK, SUPERBLOCK_SIZE};
use std::fs::File;
use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

/// Owned block buffer.
///
/// Invariant: length == [`BLOCK_SIZE`] for buffers produced by
/// [`BandDevice::read_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBuf {
    bytes: Vec<u8>,
}

impl BlockBuf {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

/// Byte-addressed device for fixed-offset reads (pread semantics).
pub trait ByteDevice: Send + Sync {
    /// Total length in bytes.
    fn len_bytes(&self) -> u64;

    /// Read exactly `buf.len()` bytes from `offset` into `buf`.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
}

/// File-backed byte device using `pread`-style I/O.
///
/// Uses `std::os::unix::fs::FileExt`, which is thread-safe and does not
/// require a shared seek position. The file is opened read-only.
#[derive(Debug, Clone)]
pub struct FileByteDevice {
    file: Arc<File>,
    len: u64,
}

impl FileByteDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Arc::new(file),
            len,
        })
    }
}

impl ByteDevice for FileByteDevice {
    fn len_bytes(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_read_range(offset, buf.len(), self.len)?;
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }
}

/// In-memory byte device backed by a `Vec<u8>`.
///
/// Used by tests and by callers that already hold a whole image in memory.
#[derive(Debug, Clone)]
pub struct MemoryByteDevice {
    bytes: Arc<Vec<u8>>,
}

impl MemoryByteDevice {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }
}

impl ByteDevice for MemoryByteDevice {
    fn len_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_read_range(offset, buf.len(), self.len_bytes())?;
        let start = usize::try_from(offset)
            .map_err(|_| FsError::Format("offset does not fit usize".to_owned()))?;
        buf.copy_from_slice(&self.bytes[start..start + buf.len()]);
        Ok(())
    }
}

fn check_read_range(offset: u64, len: usize, device_len: u64) -> Result<()> {
    let end = offset
        .checked_add(
            u64::try_from(len).map_err(|_| FsError::Format("read length overflows u64".to_owned()))?,
        )
        .ok_or_else(|| FsError::Format("read range overflows u64".to_owned()))?;
    if end > device_len {
        return Err(FsError::Format(format!(
            "read out of bounds: offset={offset} len={len} device_len={device_len}"
        )));
    }
    Ok(())
}

/// Block-addressed view of a band image.
///
/// Every transfer through [`read_block`](Self::read_block) is one whole
/// 1024-byte block at `block * 1024`; partial blocks do not exist in this
/// format.
pub struct BandDevice {
    inner: Box<dyn ByteDevice>,
}

impl BandDevice {
    #[must_use]
    pub fn new(inner: Box<dyn ByteDevice>) -> Self {
        Self { inner }
    }

    /// Total length of the underlying image in bytes.
    #[must_use]
    pub fn len_bytes(&self) -> u64 {
        self.inner.len_bytes()
    }

    /// Number of whole blocks the image holds.
    #[must_use]
    pub fn block_count(&self) -> u64 {
        self.inner.len_bytes() / BLOCK_SIZE as u64
    }

    /// Read one whole block by number.
    pub fn read_block(&self, block: BlockNumber) -> Result<BlockBuf> {
        trace!(block = block.0, "read_block");
        let mut buf = vec![0_u8; BLOCK_SIZE];
        self.inner.read_exact_at(block.to_byte_offset(), &mut buf)?;
        Ok(BlockBuf::new(buf))
    }

    /// Fixed-offset read for structures that do not sit on block
    /// boundaries (the inode table starts mid-block at 0x7C0).
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact_at(offset, buf)
    }

    /// Read the 1024-byte superblock region (block 1).
    pub fn read_superblock_region(&self) -> Result<[u8; SUPERBLOCK_SIZE]> {
        let mut region = [0_u8; SUPERBLOCK_SIZE];
        self.inner
            .read_exact_at(SUPERBLOCK_BLOCK * BLOCK_SIZE as u64, &mut region)?;
        Ok(region)
    }
}

impl std::fmt::Debug for BandDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BandDevice")
            .field("len_bytes", &self.inner.len_bytes())
            .finish_non_exhaustive()
    }
}
