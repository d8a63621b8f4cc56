//! File access for both ends of a transfer.
//!
//! [`FileSource`] is the client's read side: it validates the file up front
//! (exists, is a regular file, fits the size cap) and then yields full-sized
//! chunks.  [`FileSink`] is the server's write side.

use std::path::{Component, Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};

use crate::error::SessionError;

/// A validated file opened for sequential reading.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: File,
    size: u64,
}

impl FileSource {
    /// Open `path` for reading, rejecting directories and files over
    /// `max_size` bytes.
    pub async fn open(path: impl AsRef<Path>, max_size: u64) -> Result<Self, SessionError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|e| SessionError::file(&path, e))?;
        let meta = file
            .metadata()
            .await
            .map_err(|e| SessionError::file(&path, e))?;
        if !meta.is_file() {
            return Err(SessionError::file(
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        if meta.len() > max_size {
            return Err(SessionError::FileTooLarge {
                path,
                size: meta.len(),
                limit: max_size,
            });
        }
        Ok(Self {
            size: meta.len(),
            path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Name to announce on the wire: the final path component.
    pub fn file_name(&self) -> Result<&str, SessionError> {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SessionError::InvalidFileName {
                path: self.path.clone(),
            })
    }

    /// Fill `buf` from the file.
    ///
    /// Returns fewer than `buf.len()` bytes only at end of file, and `0`
    /// once the file is exhausted.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, SessionError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .file
                .read(&mut buf[filled..])
                .await
                .map_err(|e| SessionError::file(&self.path, e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// A file being received, created inside the output directory.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl FileSink {
    /// Create (or truncate) `dir/name`, creating `dir` if needed.
    ///
    /// `name` must already be a bare file name; see [`sanitize_file_name`].
    pub async fn create_in_directory(dir: &Path, name: &str) -> Result<Self, SessionError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| SessionError::file(dir, e))?;
        let path = dir.join(name);
        let file = File::create(&path)
            .await
            .map_err(|e| SessionError::file(&path, e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn append(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| SessionError::file(&self.path, e))?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Flush buffered bytes to disk and release the handle.
    pub async fn close(mut self) -> Result<PathBuf, SessionError> {
        self.writer
            .flush()
            .await
            .map_err(|e| SessionError::file(&self.path, e))?;
        self.writer
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| SessionError::file(&self.path, e))?;
        Ok(self.path)
    }
}

/// Reduce a peer-supplied name to a single safe path component.
///
/// Returns `None` for names that are empty or that consist only of `.`/`..`
/// or separators.
pub fn sanitize_file_name(name: &str) -> Option<&str> {
    match Path::new(name).components().next_back()? {
        Component::Normal(last) => last.to_str(),
        _ => None,
    }
}
