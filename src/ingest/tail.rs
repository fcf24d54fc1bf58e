//! Line sources
//!
//! [`FileTailer`] follows an append-only log file the way `tail -F` does:
//! it waits for the file to appear, starts at the end, and polls for
//! newly appended lines forever. A file replaced at the same path (rename
//! rotation) is reopened from the start; a file truncated in place is
//! re-read from offset 0.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

/// How often to check whether the log file exists yet
const FILE_WAIT_INTERVAL: Duration = Duration::from_millis(500);

/// Default idle sleep between reads at end of file
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Ordered supply of raw log lines
#[async_trait]
pub trait LineSource: Send {
    /// Next non-blank line, waiting as long as needed.
    ///
    /// `Ok(None)` means the source is exhausted.
    async fn next_line(&mut self) -> Result<Option<String>, TailError>;
}

/// Identity of an open file, stable across renames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    #[cfg(unix)]
    fn of(meta: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(_meta: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// Tails a log file for newly appended lines
pub struct FileTailer {
    path: PathBuf,
    reader: BufReader<File>,
    /// Identity of the open handle; `None` where the platform has none
    file_id: Option<FileId>,
    /// Byte offset of the next read
    position: u64,
    /// Bytes of a line whose newline has not been written yet
    pending: Vec<u8>,
    poll_interval: Duration,
}

impl FileTailer {
    /// Wait for `path` to exist, then open it positioned at the end
    pub async fn open(path: impl AsRef<Path>, poll_interval: Duration) -> Result<Self, TailError> {
        let path = path.as_ref().to_path_buf();
        wait_for_file(&path).await;

        let mut file = File::open(&path).await.map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;
        let file_id = FileId::of(&file.metadata().await?);
        let position = file.seek(SeekFrom::End(0)).await?;

        tracing::info!(path = %path.display(), offset = position, "Tailing log file");

        Ok(Self {
            path,
            reader: BufReader::new(file),
            file_id,
            position,
            pending: Vec::new(),
            poll_interval,
        })
    }

    /// Path being tailed
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read whatever is available up to the next newline.
    ///
    /// Returns `None` at end of file or when only a partial line is available.
    async fn read_available(&mut self) -> Result<Option<String>, TailError> {
        let n = self.reader.read_until(b'\n', &mut self.pending).await?;
        self.position += n as u64;

        if n == 0 || self.pending.last() != Some(&b'\n') {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        Ok(Some(line))
    }

    /// Follow the path to a new file after rotation, or restart the
    /// current file if it shrank underneath us
    async fn check_rotated(&mut self) -> Result<(), TailError> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) => {
                // Renamed away and not recreated yet; keep the old handle
                tracing::debug!(path = %self.path.display(), error = %e, "Could not stat log file");
                return Ok(());
            }
        };

        let path_id = FileId::of(&meta);
        if path_id.is_some() && path_id != self.file_id {
            // Finish the rotated file first
            if !self.reader.fill_buf().await?.is_empty() {
                return Ok(());
            }
            return self.reopen().await;
        }

        if meta.len() < self.position {
            tracing::info!(
                path = %self.path.display(),
                previous_offset = self.position,
                new_len = meta.len(),
                "Log file truncated, reading from start"
            );
            self.reader.seek(SeekFrom::Start(0)).await?;
            self.position = 0;
            self.pending.clear();
        }

        Ok(())
    }

    /// Open whatever file now lives at the path, from offset 0.
    ///
    /// Only called once the old handle is at end of file.
    async fn reopen(&mut self) -> Result<(), TailError> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Could not reopen rotated log file");
                return Ok(());
            }
        };
        let file_id = FileId::of(&file.metadata().await?);

        tracing::info!(path = %self.path.display(), "Log file rotated, following new file");

        self.reader = BufReader::new(file);
        self.file_id = file_id;
        self.position = 0;
        self.pending.clear();
        Ok(())
    }
}

#[async_trait]
impl LineSource for FileTailer {
    async fn next_line(&mut self) -> Result<Option<String>, TailError> {
        loop {
            match self.read_available().await? {
                Some(line) if line.is_empty() => continue,
                Some(line) => return Ok(Some(line)),
                None => {
                    self.check_rotated().await?;
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

async fn wait_for_file(path: &Path) {
    let mut logged = false;
    while !tokio::fs::try_exists(path).await.unwrap_or(false) {
        if !logged {
            tracing::info!(path = %path.display(), "Waiting for log file to appear");
            logged = true;
        }
        tokio::time::sleep(FILE_WAIT_INTERVAL).await;
    }
}

/// Line source errors
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Read error: {0}")]
    Io(#[from] std::io::Error),
}
