//! # question-csv
//!
//! Converts a line-per-record exam question SQL dump into CSV by asking a
//! chat model to extract and clean the fields of each record.
//!
//! ## Features
//!
//! - Streaming input: the dump is never loaded into memory
//! - Fixed-size batches processed strictly in input order
//! - Per-record failure isolation: a record the model cannot clean is skipped
//! - Append-only output, one flushed line per cleaned record
//! - Replaceable prompt (Tera templates) and replaceable cleaner
//!
//! ## Quick Start
//!
//! ```no_run
//! use question_csv::{Config, Pipeline};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::builder()
//!     .input_path("./appx_question_answer.sql")
//!     .output_path("./output.csv")
//!     .batch_size(50)
//!     .api_key(std::env::var("OPENAI_API_KEY").unwrap_or_default())
//!     .build()?;
//!
//! Pipeline::new(config)?.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Reader**: streams non-blank lines and groups them into batches
//! 2. **Cleaner**: renders the prompt and calls the model for one record
//! 3. **Processor**: cleans a batch record by record, skipping failures
//! 4. **Sink**: appends each cleaned line to the output file

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod cleaner;
mod config;
mod error;
mod pipeline;
mod processor;
mod prompt;
mod reader;
mod sink;
mod template_validator;
mod trigger;

pub use cleaner::{OpenAiCleaner, RecordCleaner};
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineStats};
pub use processor::{BatchOutcome, BatchProcessor};
pub use prompt::{CSV_HEADER, FIELDS, FieldSpec, PromptTemplate};
pub use reader::{Batch, LineBatcher};
pub use sink::OutputSink;
pub use trigger::Trigger;

/// Runs the conversion with the default OpenAI cleaner.
///
/// This is the main entry point for the library.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - The input file cannot be read
/// - The output file cannot be opened or written
///
/// # Examples
///
/// ```no_run
/// use question_csv::{Config, run};
///
/// # async fn example() -> question_csv::Result<()> {
/// let config = Config::builder()
///     .input_path("./appx_question_answer.sql")
///     .build()?;
///
/// let stats = run(config).await?;
/// println!("{} records written", stats.records_written);
/// # Ok(())
/// # }
/// ```
pub async fn run(config: Config) -> Result<PipelineStats> {
    Pipeline::new(config)?.run().await
}
