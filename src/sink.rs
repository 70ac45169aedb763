use crate::{
    error::{Error, Result},
    prompt::CSV_HEADER,
};
use std::path::{Path, PathBuf};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{debug, info};

/// Append-only destination for cleaned records.
///
/// Opened once per run. Each [`append_line`](Self::append_line) is written
/// and flushed before it returns, so at most one write is in flight.
pub struct OutputSink {
    file: File,
    path: PathBuf,
    lines_written: usize,
}

impl OutputSink {
    /// Opens `path` in append mode, creating it if needed.
    ///
    /// Existing content is preserved. With `write_header` set, the CSV header
    /// is written first when the file is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the header cannot be
    /// written.
    pub async fn open(path: &Path, write_header: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| Error::io(path, e))?;

        let existing = file
            .metadata()
            .await
            .map_err(|e| Error::io(path, e))?
            .len();

        let mut sink = Self {
            file,
            path: path.to_path_buf(),
            lines_written: 0,
        };

        if write_header && existing == 0 {
            sink.write_raw(CSV_HEADER).await?;
            debug!("Wrote CSV header to {}", path.display());
        }

        info!(
            "Appending to {} ({} bytes already present)",
            path.display(),
            existing
        );
        Ok(sink)
    }

    /// Appends `line` followed by a newline and waits for the flush.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the write or flush fails.
    pub async fn append_line(&mut self, line: &str) -> Result<()> {
        self.write_raw(line).await?;
        self.lines_written += 1;
        Ok(())
    }

    async fn write_raw(&mut self, line: &str) -> Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        self.file
            .write_all(buf.as_bytes())
            .await
            .map_err(|e| Error::write(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| Error::write(&self.path, e))
    }

    /// Returns the output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of records appended (header excluded).
    #[must_use]
    pub const fn lines_written(&self) -> usize {
        self.lines_written
    }

    /// Flushes pending data to disk and closes the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or sync fails.
    pub async fn close(mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| Error::write(&self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| Error::write(&self.path, e))?;

        debug!(
            "Closed {} after {} lines",
            self.path.display(),
            self.lines_written
        );
        Ok(())
    }
}
