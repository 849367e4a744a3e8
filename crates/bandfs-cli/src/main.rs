#![forbid(unsafe_code)]
//! `bandfs` — inspect, list, and extract from SysV band images.
//!
//! Three subcommands: `info` prints the superblock summary (optionally
//! as JSON), `ls` renders a long-format listing of a path, and `read`
//! copies a regular file out of the image into a host file. Exit codes
//! follow `sysexits.h` via [`FsError::exit_code`].

use anyhow::Context;
use bandfs_core::BandImage;
use bandfs_error::FsError;
use bandfs_ondisk::{FileKind, Inode};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bandfs", version, about = "SysV band image inspection toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the image's superblock summary.
    Info {
        /// Path to the band image file.
        image: PathBuf,
        /// Emit the full superblock as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// List a directory (or a single file) inside the image.
    Ls {
        /// Path to the band image file.
        image: PathBuf,
        /// Absolute path inside the image.
        path: String,
    },
    /// Copy a regular file out of the image.
    Read {
        /// Path to the band image file.
        image: PathBuf,
        /// Absolute path of the file inside the image.
        source: String,
        /// Destination file on the host.
        dest: PathBuf,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("bandfs: {err:#}");
        let code = err
            .downcast_ref::<FsError>()
            .map_or(1, FsError::exit_code);
        std::process::exit(code);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Info { image, json } => info(&image, json),
        Command::Ls { image, path } => ls(&image, &path),
        Command::Read {
            image,
            source,
            dest,
        } => read(&image, &source, &dest),
    }
}

fn info(image: &Path, json: bool) -> anyhow::Result<()> {
    let img = BandImage::open(image)?;
    let sb = img.superblock();

    if json {
        println!("{}", serde_json::to_string_pretty(sb)?);
        return Ok(());
    }

    println!("filesystem:   {}", sb.fname);
    println!("pack:         {}", sb.fpack);
    println!("volume:       {} blocks", sb.volume_blocks);
    println!("i-list:       {} blocks", sb.ilist_blocks);
    println!("free blocks:  {} (cache {})", sb.tfree, sb.nfree);
    println!("free inodes:  {} (cache {})", sb.tinode, sb.ninode);
    println!("updated:      {}", format_mtime(sb.time));
    println!("type:         {:#x}", sb.fs_type);
    Ok(())
}

fn ls(image: &Path, path: &str) -> anyhow::Result<()> {
    let img = BandImage::open(image)?;
    let (_, inode) = img.resolve_path(path)?;

    if inode.is_directory() {
        for (entry, child) in img.list_dir(&inode)? {
            println!("{}", format_row(&child, &entry.name_str()));
        }
    } else {
        let name = path
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("/");
        println!("{}", format_row(&inode, name));
    }
    Ok(())
}

fn read(image: &Path, source: &str, dest: &Path) -> anyhow::Result<()> {
    let img = BandImage::open(image)?;
    let mut out = File::create(dest)
        .with_context(|| format!("creating {}", dest.display()))?;
    let copied = img.extract_path(source, &mut out)?;
    println!("{copied} bytes");
    Ok(())
}

// ── Rendering ───────────────────────────────────────────────────────────────

/// One listing row: type+permissions, nlink, uid/gid (octal), size,
/// modify date, name.
fn format_row(inode: &Inode, name: &str) -> String {
    format!(
        "{} {:>3} {:>5o} {:>5o} {:>8} {} {}",
        permission_string(inode.mode, inode.kind),
        inode.nlink,
        inode.uid,
        inode.gid,
        inode.size,
        format_mtime(inode.mtime),
        name,
    )
}

/// `ls`-style mode string: type character plus nine permission bits,
/// with setuid/setgid/sticky folded into the execute positions.
fn permission_string(mode: u16, kind: FileKind) -> String {
    let type_char = match kind {
        FileKind::Directory => 'd',
        FileKind::CharDevice => 'c',
        FileKind::BlockDevice => 'b',
        FileKind::Fifo => 'p',
        FileKind::RegularFile => '-',
        FileKind::None | FileKind::Other(_) => '?',
    };

    let mut out = String::with_capacity(10);
    out.push(type_char);
    for shift in [6_u16, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        let x = bits & 0o1 != 0;
        let special = match shift {
            6 => mode & 0o4000 != 0,
            3 => mode & 0o2000 != 0,
            _ => mode & 0o1000 != 0,
        };
        out.push(match (special, x, shift) {
            (true, true, 0) => 't',
            (true, false, 0) => 'T',
            (true, true, _) => 's',
            (true, false, _) => 'S',
            (false, true, _) => 'x',
            (false, false, _) => '-',
        });
    }
    out
}

/// Render an epoch timestamp as `Mon dd  yyyy` (UTC).
///
/// Civil-calendar arithmetic over the day count; no time-of-day and no
/// timezone handling.
fn format_mtime(secs: u32) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let (year, month, day) = civil_from_days(i64::from(secs / 86_400));
    format!("{} {:>2}  {}", MONTHS[(month - 1) as usize], day, year)
}

/// Days-since-epoch to (year, month, day) in the proleptic Gregorian
/// calendar.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let year = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (year + i64::from(month <= 2), month, day)
}
