use crate::{
    cleaner::{OpenAiCleaner, RecordCleaner},
    config::Config,
    error::Result,
    processor::{BatchOutcome, BatchProcessor},
    reader::LineBatcher,
    sink::OutputSink,
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Statistics collected during pipeline execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Number of batches processed
    pub batches: usize,

    /// Non-blank input lines read
    pub records_read: usize,

    /// Cleaned records appended to the output
    pub records_written: usize,

    /// Records skipped because cleaning failed
    pub records_failed: usize,

    /// Total execution time
    pub duration: Duration,

    /// Time spent waiting on the model
    pub cleaning_duration: Duration,

    /// Output file path
    pub output_path: String,

    /// Whether the run was a dry run
    pub dry_run: bool,
}

impl PipelineStats {
    fn record_batch(&mut self, outcome: BatchOutcome) {
        self.batches += 1;
        self.records_written += outcome.written;
        self.records_failed += outcome.failed;
        self.cleaning_duration += outcome.cleaning_time;
    }

    /// Returns the share of read records that made it to the output.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.records_read == 0 {
            return 0.0;
        }
        self.records_written as f64 / self.records_read as f64
    }

    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║            Conversion Summary                         ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Batches:              {:>8}                        ║",
            self.batches
        );
        println!(
            "║ Records Read:         {:>8}                        ║",
            self.records_read
        );
        if self.dry_run {
            println!("║ ⚠ Dry run: no model calls, nothing written           ║");
        } else {
            println!(
                "║   - Written:          {:>8}                        ║",
                self.records_written
            );
            println!(
                "║   - Skipped:          {:>8}                        ║",
                self.records_failed
            );
            println!(
                "║   - Success rate:     {:>7.1}%                        ║",
                self.success_rate() * 100.0
            );
        }
        println!("║                                                       ║");
        println!("║ Output File:                                          ║");
        println!("║   {}", self.output_path);
        println!("║                                                       ║");
        println!(
            "║ Model Time:           {:>8.2}s                     ║",
            self.cleaning_duration.as_secs_f64()
        );
        println!(
            "║ Total Time:           {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!(
            "║ Finished At:   {}                    ║",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Streams the input through the cleaner into the output file.
///
/// The run moves between reading a batch and processing it until the
/// input is exhausted. Batches are processed one after another and the
/// records of a batch one at a time.
pub struct Pipeline {
    config: Config,
    cleaner: Box<dyn RecordCleaner>,
}

impl Pipeline {
    /// Creates a pipeline that cleans records with the OpenAI chat API.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The prompt template or HTTP client cannot be built
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let cleaner = OpenAiCleaner::new(&config)?;
        Ok(Self::with_cleaner(config, cleaner))
    }

    /// Creates a pipeline around any [`RecordCleaner`].
    #[must_use]
    pub fn with_cleaner(config: Config, cleaner: impl RecordCleaner + 'static) -> Self {
        Self {
            config,
            cleaner: Box::new(cleaner),
        }
    }

    /// Executes the conversion and returns statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read or the output cannot be
    /// written. Records that fail to clean are skipped, not reported here.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use question_csv::{Config, Pipeline};
    ///
    /// # async fn example() -> question_csv::Result<()> {
    /// let config = Config::builder()
    ///     .input_path("./appx_question_answer.sql")
    ///     .build()?;
    ///
    /// let stats = Pipeline::new(config)?.run().await?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(input = %self.config.input_path.display()))]
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        info!("Starting conversion");

        let mut batcher = LineBatcher::open(&self.config.input_path, self.config.batch_size).await?;

        let mut stats = if self.config.dry_run {
            warn!("Dry run mode enabled - skipping model calls and file writes");
            self.count_batches(&mut batcher).await?
        } else {
            let mut sink =
                OutputSink::open(&self.config.output_path, self.config.write_header).await?;

            let result = self.convert(&mut batcher, &mut sink).await;

            // the sink is released on every path; an earlier error wins
            let closed = sink.close().await;
            let stats = result?;
            closed?;
            stats
        };

        stats.records_read = batcher.records_read();
        stats.output_path = self.config.output_path.display().to_string();
        stats.dry_run = self.config.dry_run;
        stats.duration = start_time.elapsed();

        info!(
            "✓ Conversion completed successfully to {} ({} written, {} skipped) in {:.2}s",
            stats.output_path,
            stats.records_written,
            stats.records_failed,
            stats.duration.as_secs_f64()
        );

        Ok(stats)
    }

    async fn convert<R>(
        &self,
        batcher: &mut LineBatcher<R>,
        sink: &mut OutputSink,
    ) -> Result<PipelineStats>
    where
        R: tokio::io::AsyncBufRead + Unpin + Send,
    {
        let processor = BatchProcessor::new(self.cleaner.as_ref());
        let mut stats = PipelineStats::default();

        while let Some(batch) = batcher.next_batch().await? {
            let index = batch.index;
            let size = batch.len();

            info!("Processing batch {} ({} records)", index + 1, size);
            let outcome = processor.process(batch, sink).await?;

            if outcome.failed > 0 {
                warn!(
                    "Batch {}: {} of {} records skipped",
                    index + 1,
                    outcome.failed,
                    size
                );
            }
            stats.record_batch(outcome);
        }

        debug!("Input exhausted after {} batches", stats.batches);
        Ok(stats)
    }

    async fn count_batches<R>(&self, batcher: &mut LineBatcher<R>) -> Result<PipelineStats>
    where
        R: tokio::io::AsyncBufRead + Unpin + Send,
    {
        let mut stats = PipelineStats::default();

        while let Some(batch) = batcher.next_batch().await? {
            info!("Batch {}: {} records", batch.index + 1, batch.len());
            stats.batches += 1;
        }

        Ok(stats)
    }
}
