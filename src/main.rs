use anyhow::Context;
use clap::Parser;
use question_csv::{Config, Pipeline, Trigger};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "question-csv",
    version,
    author,
    about = "Clean an exam question SQL dump into CSV with a language model",
    long_about = "Reads a SQL dump with one question record per line, asks a chat model \
    to extract and clean the question fields of every record, and appends one CSV line \
    per record to the output file.\n\n\
    Records the model fails to clean are logged and skipped. The output file is \
    opened in append mode: running twice on the same input duplicates its rows.\n\n\
    USAGE EXAMPLES:\n  \
      # Convert the default dump into ./output.csv\n  \
      OPENAI_API_KEY=sk-... question-csv\n\n  \
      # Smaller batches, explicit paths\n  \
      question-csv --input dump.sql --output questions.csv --batch-size 10\n\n  \
      # Start the conversion once a listener is bound on port 3000\n  \
      question-csv --listen 127.0.0.1:3000"
)]
struct Cli {
    /// SQL dump to convert, one record per line
    #[arg(short, long, default_value = "appx_question_answer.sql", value_name = "PATH")]
    input: PathBuf,

    /// CSV file to append cleaned records to
    #[arg(short, long, default_value = "output.csv", value_name = "PATH")]
    output: PathBuf,

    /// Records per batch
    #[arg(short, long, default_value_t = 50)]
    batch_size: usize,

    /// Chat model used to clean records
    #[arg(short, long, default_value = "gpt-3.5-turbo")]
    model: String,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// API key for the model service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    api_base: String,

    /// Per-request timeout in seconds (waits indefinitely when unset)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Path to a custom Tera prompt template
    ///
    /// The template receives `record` (the raw line), `fields` and `header`.
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Write the CSV header when the output file is empty
    #[arg(long)]
    header: bool,

    /// Dry run (read and batch only; no model calls, no writes)
    #[arg(long)]
    dry_run: bool,

    /// Bind a listener on this address and start converting once it is ready
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is fine; real environment variables win over it
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    let mut builder = Config::builder()
        .input_path(cli.input)
        .output_path(cli.output)
        .batch_size(cli.batch_size)
        .model(cli.model)
        .temperature(cli.temperature)
        .api_base(cli.api_base)
        .write_header(cli.header)
        .dry_run(cli.dry_run);

    if let Some(api_key) = cli.api_key {
        builder = builder.api_key(api_key);
    }

    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }

    if let Some(template_path) = cli.template {
        builder = builder.template_path(template_path);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let pipeline = Pipeline::new(config).context("Failed to create pipeline")?;

    let stats = if let Some(addr) = cli.listen {
        let trigger = Trigger::bind(addr)
            .await
            .context("Failed to start listener")?;
        trigger
            .serve(pipeline, interrupt)
            .await
            .context("Pipeline execution failed")?
    } else {
        pipeline.run().await.context("Pipeline execution failed")?
    };

    stats.print_summary();

    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("question_csv=info"),
        1 => EnvFilter::new("question_csv=debug"),
        _ => EnvFilter::new("question_csv=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
