//! Streaming SHA-512 content hashing
//!
//! Files are read in 4 KiB chunks and fed through SHA-512. The digest is
//! returned as 128 uppercase hex characters without separators.
//!
//! ## Progress
//!
//! Hashing a large file can take a while, so callers may pass a progress
//! callback. Reports are throttled by [`ProgressThrottle`]: one is emitted only
//! after at least [`MIN_REPORT_LOOPS`] chunks, more than [`MIN_REPORT_BYTES`]
//! bytes and more than [`MIN_REPORT_MILLIS`] milliseconds since the previous
//! report. A final report is always emitted once the end of the file is
//! reached, so a small file produces exactly one.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use treestamp::hasher::hash_file;
//!
//! # fn example() -> treestamp::Result<()> {
//! let digest = hash_file(Path::new("photo.jpg"), |progress| {
//!     println!("{:.0}%", progress.percentage());
//! })?;
//! assert_eq!(digest.len(), 128);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::types::HashProgress;
use sha2::{Digest, Sha512};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::trace;

/// Chunk size used for reads
pub const BUFFER_SIZE: usize = 0x1000;

/// Minimum number of chunks between two progress reports
pub const MIN_REPORT_LOOPS: u32 = 0x800;

/// Bytes that must be exceeded between two progress reports
pub const MIN_REPORT_BYTES: u64 = 0x40_0000;

/// Milliseconds that must be exceeded between two progress reports
pub const MIN_REPORT_MILLIS: u64 = 200;

/// Decides when a streaming hash reports progress
#[derive(Debug)]
pub struct ProgressThrottle {
    total_length: u64,
    total_read: u64,
    read_since_report: u64,
    loops_since_report: u32,
    since_report: Instant,
}

impl ProgressThrottle {
    /// Start tracking a file of `total_length` bytes
    pub fn new(total_length: u64) -> Self {
        Self {
            total_length,
            total_read: 0,
            read_since_report: 0,
            loops_since_report: 0,
            since_report: Instant::now(),
        }
    }

    /// Account for one chunk of `bytes` read
    ///
    /// Returns a report when all three thresholds have been passed.
    pub fn record(&mut self, bytes: usize) -> Option<HashProgress> {
        let elapsed_ms = self.since_report.elapsed().as_millis() as u64;
        self.record_with_elapsed(bytes, elapsed_ms)
    }

    /// Same as [`record`](Self::record) with an explicit elapsed time
    pub fn record_with_elapsed(&mut self, bytes: usize, elapsed_ms: u64) -> Option<HashProgress> {
        self.total_read += bytes as u64;
        self.read_since_report += bytes as u64;
        self.loops_since_report += 1;

        if self.loops_since_report >= MIN_REPORT_LOOPS
            && self.read_since_report > MIN_REPORT_BYTES
            && elapsed_ms > MIN_REPORT_MILLIS
        {
            let progress = self.snapshot(elapsed_ms);
            self.read_since_report = 0;
            self.loops_since_report = 0;
            self.since_report = Instant::now();
            Some(progress)
        } else {
            None
        }
    }

    /// Final report, emitted unconditionally at end of file
    pub fn finish(self) -> HashProgress {
        let elapsed_ms = self.since_report.elapsed().as_millis() as u64;
        self.snapshot(elapsed_ms)
    }

    fn snapshot(&self, elapsed_ms: u64) -> HashProgress {
        HashProgress {
            total_length: self.total_length,
            total_read: self.total_read,
            read_since_report: self.read_since_report,
            elapsed_ms,
        }
    }
}

/// Compute the SHA-512 of a file
///
/// # Arguments
///
/// * `path` - File to hash
/// * `progress` - Called with throttled progress reports and once at the end
///
/// # Returns
///
/// Returns the digest as 128 uppercase hex characters.
///
/// # Errors
///
/// - [`TreestampError::Io`](crate::TreestampError::Io) if the file cannot be opened or read
pub fn hash_file(path: &Path, mut progress: impl FnMut(HashProgress)) -> Result<String> {
    let mut file = File::open(path)?;
    let total_length = file.metadata()?.len();
    let mut throttle = ProgressThrottle::new(total_length);
    let mut hasher = Sha512::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        if let Some(report) = throttle.record(read) {
            progress(report);
        }
    }
    progress(throttle.finish());

    trace!("Hashed {:?} ({} bytes)", path, total_length);
    Ok(hex::encode_upper(hasher.finalize()))
}

/// Compute the SHA-512 of a file using tokio file I/O
///
/// Same contract as [`hash_file`]. Reads go through a buffered async reader,
/// which keeps the disk busy while the digest is updated.
///
/// # Errors
///
/// - [`TreestampError::Io`](crate::TreestampError::Io) if the file cannot be opened or read
pub async fn hash_file_async(path: &Path, mut progress: impl FnMut(HashProgress)) -> Result<String> {
    let file = tokio::fs::File::open(path).await?;
    let total_length = file.metadata().await?.len();
    let mut reader = BufReader::with_capacity(BUFFER_SIZE * 16, file);
    let mut throttle = ProgressThrottle::new(total_length);
    let mut hasher = Sha512::new();
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        if let Some(report) = throttle.record(read) {
            progress(report);
        }
    }
    progress(throttle.finish());

    trace!("Hashed {:?} asynchronously ({} bytes)", path, total_length);
    Ok(hex::encode_upper(hasher.finalize()))
}

/// Compute the SHA-512 of in-memory data
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode_upper(Sha512::digest(data))
}
