#![forbid(unsafe_code)]
//! Error types for bandfs.
//!
//! # Error Taxonomy
//!
//! bandfs uses a two-layer error model:
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Parsing | `ParseError` | `bandfs-types` | On-disk format violations detected during byte parsing |
//! | Runtime | `FsError` | `bandfs-error` (this crate) | User-facing errors for CLI and API consumers |
//!
//! ## Mapping Policy: ParseError → FsError
//!
//! `bandfs-error` is intentionally independent of `bandfs-types` and
//! `bandfs-ondisk` to avoid cyclic dependencies. The conversion from
//! `ParseError` to `FsError` is implemented in `bandfs-core`, which depends
//! on both crates.
//!
//! The mapping rules are:
//!
//! | ParseError Variant | FsError Variant | Rationale |
//! |--------------------|-----------------|-----------|
//! | `InsufficientData` | `Parse(detail)` | Truncated metadata indicates a truncated or corrupt image |
//! | `InvalidMagic` | `BadMagic { expected, actual }` | Wrong magic means not a band image, not corruption |
//! | `InvalidField` | `Format(detail)` | Structurally invalid on-disk parameters |
//!
//! ## CLI Exit-Code Mapping
//!
//! Every `FsError` variant maps to exactly one `sysexits.h` exit code via
//! [`FsError::exit_code`]. The mapping is exhaustive (no wildcard arms) so
//! adding a new variant is a compile error until its code is assigned.
//!
//! | Variant | Exit code | Constant |
//! |---------|-----------|----------|
//! | `Io` | 74 | `EX_IOERR` |
//! | `BadMagic` | 65 | `EX_DATAERR` |
//! | `Parse` | 65 | `EX_DATAERR` |
//! | `IndirectionLimit` | 65 | `EX_DATAERR` |
//! | `UnexpectedEof` | 65 | `EX_DATAERR` |
//! | `Format` | 64 | `EX_USAGE` |
//! | `NotFound` | 66 | `EX_NOINPUT` |
//! | `NotDirectory` | 66 | `EX_NOINPUT` |
//! | `IsDirectory` | 66 | `EX_NOINPUT` |
//! | `NotRegularFile` | 66 | `EX_NOINPUT` |
//!
//! ## Design Constraints
//!
//! - `bandfs-error` MUST NOT depend on `bandfs-types` or `bandfs-ondisk`
//!   (no cyclic deps).
//! - `FsError` is the single user-facing error type; crate-internal errors
//!   (like `ParseError`) convert into `FsError` at their crate boundaries.
//! - All string payloads in `FsError` are owned (`String`).

use thiserror::Error;

/// `sysexits.h` exit codes used by the CLI.
pub mod exitcode {
    /// Bad command-line usage or structurally invalid input parameters.
    pub const USAGE: i32 = 64;
    /// Input data was incorrect in some way.
    pub const DATAERR: i32 = 65;
    /// An input file did not exist or was not the expected kind of object.
    pub const NOINPUT: i32 = 66;
    /// An error occurred while doing I/O.
    pub const IOERR: i32 = 74;
}

/// Unified error type for all bandfs operations.
///
/// This is the canonical error type returned by CLI commands and public API
/// surfaces. Internal crate-specific errors (e.g., `ParseError` from
/// `bandfs-types`) are converted into `FsError` at crate boundaries.
#[derive(Debug, Error)]
pub enum FsError {
    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The superblock magic does not identify a band image.
    #[error("bad magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic { expected: u32, actual: u32 },

    /// Parse-layer error surfaced to the user.
    ///
    /// Carries the string representation of a `ParseError` from
    /// `bandfs-types` so that higher-level code can convert parse failures
    /// without losing diagnostic detail.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid on-disk format or structurally invalid parameters.
    #[error("invalid on-disk format: {0}")]
    Format(String),

    /// File, directory, or other named object not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A path component is not a directory.
    #[error("not a directory")]
    NotDirectory,

    /// Attempted a file operation on a directory.
    #[error("is a directory")]
    IsDirectory,

    /// Extraction requested for an object that is not a regular file.
    #[error("not a regular file")]
    NotRegularFile,

    /// A logical block index lies beyond two levels of indirection.
    #[error("logical block {logical} exceeds the double-indirection limit")]
    IndirectionLimit { logical: u64 },

    /// A file's data ran out before its recorded size was copied.
    #[error("unexpected end of file data: expected {expected} bytes, copied {copied}")]
    UnexpectedEof { expected: u64, copied: u64 },
}

impl FsError {
    /// Convert this error into a `sysexits.h` exit code for the CLI.
    ///
    /// The mapping is exhaustive — every variant has an explicit arm. Adding
    /// a new variant without updating this function is a compile error.
    ///
    /// Policy notes:
    /// - `BadMagic`, `Parse`, `IndirectionLimit`, `UnexpectedEof` →
    ///   `EX_DATAERR`: the image bytes themselves are wrong.
    /// - `Format` → `EX_USAGE`: the caller handed us something structurally
    ///   unusable (not a readable image at all).
    /// - `NotFound`, `NotDirectory`, `IsDirectory`, `NotRegularFile` →
    ///   `EX_NOINPUT`: the named object is missing or the wrong kind.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => exitcode::IOERR,
            Self::BadMagic { .. }
            | Self::Parse(_)
            | Self::IndirectionLimit { .. }
            | Self::UnexpectedEof { .. } => exitcode::DATAERR,
            Self::Format(_) => exitcode::USAGE,
            Self::NotFound(_)
            | Self::NotDirectory
            | Self::IsDirectory
            | Self::NotRegularFile => exitcode::NOINPUT,
        }
    }
}

/// Result alias using `FsError`.
pub type Result<T> = std::result::Result<T, FsError>;
