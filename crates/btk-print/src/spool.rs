// SPDX-License-Identifier: AGPL-3.0
// BTK Print - Spool channels and delivery sinks
//
// A spool channel holds the page data of one job before delivery: either a
// caller supplied source file opened for reading, or an anonymous temporary
// file that a surface renders into. Delivery copies the channel in bounded
// chunks into a backend sink, yielding to the runtime between chunks.

use crate::types::PrintError;
use async_trait::async_trait;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Upper bound of one read/write step when streaming a job
pub const STREAM_MAX_CHUNK_SIZE: usize = 8192;

const SPOOL_PREFIX: &str = "btkprint_";

/// Where and how temporary spool files are created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpoolOptions {
    /// None means the OS temp directory
    pub dir: Option<PathBuf>,
    /// Keep the file on disk (debugging). Otherwise it is unlinked as soon
    /// as it has been opened and only the descriptor keeps it alive.
    pub keep_files: bool,
}

#[derive(Debug)]
enum SpoolOrigin {
    SourceFile(PathBuf),
    Temporary { retained: Option<PathBuf> },
}

/// Raw byte channel holding a job's page data
#[derive(Debug)]
pub struct SpoolChannel {
    file: File,
    origin: SpoolOrigin,
}

impl SpoolChannel {
    /// Open an existing document for reading
    pub fn open_source(path: &Path) -> Result<Self, PrintError> {
        let file = File::open(path).map_err(|e| {
            PrintError::FileIo(format!("Failed to open {}: {}", path.display(), e))
        })?;
        Ok(Self {
            file,
            origin: SpoolOrigin::SourceFile(path.to_path_buf()),
        })
    }

    /// Create a fresh owner-only temporary spool file
    pub fn create_temporary(options: &SpoolOptions) -> Result<Self, PrintError> {
        let dir = options.dir.clone().unwrap_or_else(std::env::temp_dir);
        let temp = tempfile::Builder::new()
            .prefix(SPOOL_PREFIX)
            .tempfile_in(&dir)
            .map_err(|e| PrintError::FileIo(format!("Failed to create spool file: {}", e)))?;

        let (file, retained) = if options.keep_files {
            let (file, path) = temp
                .keep()
                .map_err(|e| PrintError::FileIo(format!("Failed to keep spool file: {}", e)))?;
            tracing::debug!("Keeping spool file {}", path.display());
            (file, Some(path))
        } else {
            (temp.into_file(), None)
        };

        Ok(Self {
            file,
            origin: SpoolOrigin::Temporary { retained },
        })
    }

    /// True when the channel streams a caller supplied document verbatim
    pub fn is_source_file(&self) -> bool {
        matches!(self.origin, SpoolOrigin::SourceFile(_))
    }

    /// Path of the source document or of a retained spool file
    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            SpoolOrigin::SourceFile(path) => Some(path),
            SpoolOrigin::Temporary { retained } => retained.as_deref(),
        }
    }

    /// Second handle on the same open file, used by surfaces to write pages
    pub fn writer(&self) -> Result<File, PrintError> {
        self.file
            .try_clone()
            .map_err(|e| PrintError::FileIo(format!("Failed to duplicate spool channel: {}", e)))
    }

    /// Seek back to the first byte
    pub fn rewind(&mut self) -> Result<(), PrintError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(|e| PrintError::FileIo(format!("Failed to rewind spool channel: {}", e)))
    }

    fn into_async(self) -> tokio::fs::File {
        tokio::fs::File::from_std(self.file)
    }
}

/// Final destination of a job's bytes
#[async_trait]
pub trait SpoolSink: Send {
    /// Write a whole chunk
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), PrintError>;

    /// Called once after the last chunk; the job is delivered when this succeeds
    async fn finish(self: Box<Self>) -> Result<(), PrintError>;

    /// Called instead of `finish` when delivery failed or was cancelled
    async fn abort(self: Box<Self>);
}

/// Copy the whole channel into the sink, chunk by chunk.
///
/// Returns the number of bytes delivered. Cancellation is checked before
/// every read and while waiting on I/O; a cancelled copy returns
/// [`PrintError::Cancelled`] and the caller is expected to abort the sink.
pub async fn copy_to_sink(
    spool: SpoolChannel,
    sink: &mut dyn SpoolSink,
    cancel: &CancellationToken,
) -> Result<u64, PrintError> {
    let mut source = spool.into_async();
    let mut buf = vec![0u8; STREAM_MAX_CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            tracing::debug!("Spool copy cancelled after {} bytes", total);
            return Err(PrintError::Cancelled);
        }

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PrintError::Cancelled),
            read = source.read(&mut buf) => read.map_err(|e| {
                PrintError::FileIo(format!("Failed to read spool channel: {}", e))
            })?,
        };

        if read == 0 {
            return Ok(total);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PrintError::Cancelled),
            written = sink.write_chunk(&buf[..read]) => written?,
        }

        total += read as u64;
        tracing::debug!("Wrote {} byte chunk to destination ({} total)", read, total);

        tokio::task::yield_now().await;
    }
}

/// Sink that replaces a destination file atomically.
///
/// Bytes go to a temporary sibling of the destination, which is renamed over
/// the destination in `finish`. An aborted delivery removes the temporary and
/// leaves any previous destination file untouched.
pub struct FileReplaceSink {
    destination: PathBuf,
    temp_path: tempfile::TempPath,
    file: tokio::fs::File,
}

impl FileReplaceSink {
    pub fn create(destination: &Path) -> Result<Self, PrintError> {
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = destination
            .file_name()
            .ok_or_else(|| {
                PrintError::FileIo(format!("Invalid output path: {}", destination.display()))
            })?
            .to_string_lossy()
            .to_string();

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .tempfile_in(&parent)
            .map_err(|e| {
                PrintError::FileIo(format!(
                    "Failed to create output file in {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        let (file, temp_path) = temp.into_parts();

        Ok(Self {
            destination: destination.to_path_buf(),
            temp_path,
            file: tokio::fs::File::from_std(file),
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

#[async_trait]
impl SpoolSink for FileReplaceSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), PrintError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| PrintError::Transport(format!("Failed to write output file: {}", e)))
    }

    async fn finish(self: Box<Self>) -> Result<(), PrintError> {
        let Self {
            destination,
            temp_path,
            mut file,
        } = *self;

        file.flush()
            .await
            .map_err(|e| PrintError::Transport(format!("Failed to flush output file: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| PrintError::Transport(format!("Failed to sync output file: {}", e)))?;
        drop(file);

        temp_path.persist(&destination).map_err(|e| {
            PrintError::FileIo(format!(
                "Failed to replace {}: {}",
                destination.display(),
                e.error
            ))
        })?;

        tracing::info!("Output written to {}", destination.display());
        Ok(())
    }

    async fn abort(self: Box<Self>) {
        let Self {
            destination,
            temp_path,
            file,
        } = *self;
        drop(file);
        if let Err(e) = temp_path.close() {
            tracing::warn!(
                "Failed to remove partial output for {}: {}",
                destination.display(),
                e
            );
        }
    }
}

/// Turn an output URI ("file:///tmp/out.pdf") or plain path into a path.
/// Relative paths are resolved against the current directory.
pub fn uri_to_path(uri: &str) -> Result<PathBuf, PrintError> {
    let raw = if let Some(rest) = uri.strip_prefix("file://") {
        // Only local URIs: "file:///path" or "file://localhost/path"
        let rest = rest.strip_prefix("localhost").unwrap_or(rest);
        if !rest.starts_with('/') {
            return Err(PrintError::InvalidSetting(format!(
                "unsupported output URI '{}'",
                uri
            )));
        }
        percent_decode(rest)?
    } else if uri.contains("://") {
        return Err(PrintError::InvalidSetting(format!(
            "unsupported output URI '{}'",
            uri
        )));
    } else {
        uri.to_string()
    };

    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// `file://` URI for an absolute path, escaping anything outside the
/// unreserved set
pub fn path_to_uri(path: &Path) -> String {
    let mut uri = String::from("file://");
    for byte in path.to_string_lossy().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b'-' | b'.' | b'_' | b'~' => {
                uri.push(byte as char)
            }
            _ => uri.push_str(&format!("%{:02X}", byte)),
        }
    }
    uri
}

fn percent_decode(input: &str) -> Result<String, PrintError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| {
                    PrintError::InvalidSetting(format!("malformed escape in URI '{}'", input))
                })?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out)
        .map_err(|_| PrintError::InvalidSetting(format!("URI is not UTF-8: '{}'", input)))
}
