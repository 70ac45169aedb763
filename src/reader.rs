use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
};
use tracing::{debug, warn};

/// Upper bound on the records reserved up front for one batch
const MAX_PREALLOCATED: usize = 1024;

/// An ordered group of raw records, owned by whoever processes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 0-based position of this batch in the run
    pub index: usize,
    /// 1-based ordinal of the first record, counting non-blank lines only
    pub first_record: usize,
    /// Trimmed, non-empty input lines in input order
    pub records: Vec<String>,
}

impl Batch {
    /// Returns the number of records in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Streams non-blank lines from a source and groups them into batches.
///
/// Only one line is buffered at a time; input size is unbounded.
pub struct LineBatcher<R> {
    reader: R,
    source: PathBuf,
    batch_size: usize,
    line_buf: Vec<u8>,
    physical_line: usize,
    records_read: usize,
    batches_emitted: usize,
}

impl LineBatcher<BufReader<File>> {
    /// Opens `path` for streaming.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub async fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let file = File::open(path).await.map_err(|e| Error::io(path, e))?;
        debug!("Opened {} for reading", path.display());
        Ok(Self::with_source(BufReader::new(file), path, batch_size))
    }
}

impl<R: AsyncBufRead + Unpin> LineBatcher<R> {
    /// Creates a batcher over any buffered reader.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    pub fn from_reader(reader: R, batch_size: usize) -> Self {
        Self::with_source(reader, Path::new("<reader>"), batch_size)
    }

    fn with_source(reader: R, source: &Path, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be greater than 0");

        Self {
            reader,
            source: source.to_path_buf(),
            batch_size,
            line_buf: Vec::new(),
            physical_line: 0,
            records_read: 0,
            batches_emitted: 0,
        }
    }

    /// Returns the next batch, or `None` once the input is exhausted.
    ///
    /// Every batch has exactly `batch_size` records except possibly the
    /// last one. An empty batch is never returned.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the source fails.
    pub async fn next_batch(&mut self) -> Result<Option<Batch>> {
        let first_record = self.records_read + 1;
        let mut records = Vec::with_capacity(self.batch_size.min(MAX_PREALLOCATED));

        while records.len() < self.batch_size {
            match self.next_record().await? {
                Some(record) => records.push(record),
                None => break,
            }
        }

        if records.is_empty() {
            return Ok(None);
        }

        let batch = Batch {
            index: self.batches_emitted,
            first_record,
            records,
        };
        self.batches_emitted += 1;

        debug!(
            "Batch {} ready: {} records starting at record {}",
            batch.index + 1,
            batch.len(),
            batch.first_record
        );

        Ok(Some(batch))
    }

    /// Reads lines until a non-blank one is found.
    async fn next_record(&mut self) -> Result<Option<String>> {
        loop {
            self.line_buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.line_buf)
                .await
                .map_err(|e| Error::io(&self.source, e))?;

            if read == 0 {
                return Ok(None);
            }
            self.physical_line += 1;

            let line = String::from_utf8_lossy(&self.line_buf);
            if let std::borrow::Cow::Owned(_) = line {
                warn!(
                    "Invalid UTF-8 in {} line {}; undecodable bytes replaced",
                    self.source.display(),
                    self.physical_line
                );
            }

            // trim() also drops the '\r' of CRLF endings
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                self.records_read += 1;
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    /// Returns the number of non-blank records read so far.
    #[must_use]
    pub const fn records_read(&self) -> usize {
        self.records_read
    }

    /// Returns the number of batches emitted so far.
    #[must_use]
    pub const fn batches_emitted(&self) -> usize {
        self.batches_emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    async fn collect(input: &str, batch_size: usize) -> Vec<Batch> {
        let mut batcher = LineBatcher::from_reader(input.as_bytes(), batch_size);
        let mut batches = Vec::new();
        while let Some(batch) = batcher.next_batch().await.unwrap() {
            batches.push(batch);
        }
        batches
    }

    fn sizes(batches: &[Batch]) -> Vec<usize> {
        batches.iter().map(Batch::len).collect()
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let batches = collect("first\n\n   \nsecond\n\t\nthird\n", 2).await;

        assert_eq!(sizes(&batches), vec![2, 1]);
        assert_eq!(batches[0].records, vec!["first", "second"]);
        assert_eq!(batches[1].records, vec!["third"]);
    }

    #[tokio::test]
    async fn test_batch_count_is_ceiling() {
        let input: String = (1..=7).map(|i| format!("row {i}\n")).collect();

        assert_eq!(sizes(&collect(&input, 3).await), vec![3, 3, 1]);
        assert_eq!(sizes(&collect(&input, 7).await), vec![7]);
        assert_eq!(sizes(&collect(&input, 1).await), vec![1; 7]);
        assert_eq!(sizes(&collect(&input, 50).await), vec![7]);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_trailing_batch() {
        let input: String = (1..=6).map(|i| format!("row {i}\n")).collect();
        assert_eq!(sizes(&collect(&input, 3).await), vec![3, 3]);
    }

    #[tokio::test]
    async fn test_concatenation_preserves_order() {
        let lines: Vec<String> = (0..23).map(|i| format!("record-{i}")).collect();
        let mut input = String::new();
        for (i, line) in lines.iter().enumerate() {
            input.push_str(line);
            input.push('\n');
            if i % 4 == 0 {
                input.push_str("  \n");
            }
        }

        let batches = collect(&input, 5).await;
        let flattened: Vec<String> = batches.into_iter().flat_map(|b| b.records).collect();

        assert_eq!(flattened, lines);
    }

    #[tokio::test]
    async fn test_crlf_and_missing_final_newline() {
        let batches = collect("a \\n b\r\n\r\nc \\n d\r\ne", 10).await;

        assert_eq!(batches[0].records, vec!["a \\n b", "c \\n d", "e"]);
    }

    #[tokio::test]
    async fn test_lines_are_trimmed() {
        let batches = collect("   padded value  \n", 2).await;
        assert_eq!(batches[0].records, vec!["padded value"]);
    }

    #[tokio::test]
    async fn test_empty_and_blank_input() {
        assert!(collect("", 3).await.is_empty());
        assert!(collect("\n  \n\r\n", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_metadata() {
        let batches = collect("a\nb\nc\nd\ne\n", 2).await;

        assert_eq!(
            batches
                .iter()
                .map(|b| (b.index, b.first_record))
                .collect::<Vec<_>>(),
            vec![(0, 1), (1, 3), (2, 5)]
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let input: &[u8] = b"a\ncaf\xe9 latin1\nb\n";
        let mut batcher = LineBatcher::from_reader(input, 50);

        let batch = batcher.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.records, vec!["a", "caf\u{FFFD} latin1", "b"]);
        assert!(batcher.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unbounded_batch_size() {
        let batches = collect("one\ntwo\nthree\n", usize::MAX).await;

        assert_eq!(sizes(&batches), vec![3]);
    }

    #[tokio::test]
    async fn test_open_reads_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let input = temp.child("dump.sql");
        input.write_str("one\n\ntwo\nthree\n").unwrap();

        let mut batcher = LineBatcher::open(input.path(), 2).await.unwrap();
        assert_eq!(batcher.next_batch().await.unwrap().unwrap().len(), 2);
        assert_eq!(batcher.next_batch().await.unwrap().unwrap().len(), 1);
        assert!(batcher.next_batch().await.unwrap().is_none());
        assert_eq!(batcher.records_read(), 3);
        assert_eq!(batcher.batches_emitted(), 2);
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = LineBatcher::open(Path::new("/nonexistent/dump.sql"), 2).await;
        assert!(result.err().unwrap().is_io());
    }
}
