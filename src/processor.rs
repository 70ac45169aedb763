use crate::{cleaner::RecordCleaner, error::Result, reader::Batch, sink::OutputSink};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// What happened to the records of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Records cleaned and appended to the output
    pub written: usize,
    /// Records whose cleaning failed and were skipped
    pub failed: usize,
    /// Time spent waiting on the cleaner
    pub cleaning_time: Duration,
}

/// Cleans the records of a batch one at a time and appends the results.
pub struct BatchProcessor<'a> {
    cleaner: &'a dyn RecordCleaner,
}

impl<'a> BatchProcessor<'a> {
    /// Creates a processor around `cleaner`.
    #[must_use]
    pub fn new(cleaner: &'a dyn RecordCleaner) -> Self {
        Self { cleaner }
    }

    /// Processes `batch` sequentially.
    ///
    /// A cleaning failure is logged and the record skipped. A write failure
    /// stops processing and is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if appending to `sink` fails.
    pub async fn process(&self, batch: Batch, sink: &mut OutputSink) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();

        for (offset, record) in batch.records.into_iter().enumerate() {
            let ordinal = batch.first_record + offset;

            let started = Instant::now();
            let cleaned = self.cleaner.clean(&record).await;
            outcome.cleaning_time += started.elapsed();

            match cleaned {
                Ok(line) => {
                    sink.append_line(&line).await?;
                    outcome.written += 1;
                    debug!("Record {} cleaned and written", ordinal);
                }
                Err(e) => {
                    outcome.failed += 1;
                    error!("Error processing record {}: {}", ordinal, e);
                }
            }
        }

        Ok(outcome)
    }
}
