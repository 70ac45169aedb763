use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_INPUT_PATH: &str = "appx_question_answer.sql";
const DEFAULT_OUTPUT_PATH: &str = "output.csv";
const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TEMPERATURE: f32 = 0.0;
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const MAX_TEMPERATURE: f32 = 2.0;

/// Configuration for the conversion pipeline.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// SQL dump to read, one record per line
    pub input_path: PathBuf,

    /// CSV file that cleaned records are appended to
    pub output_path: PathBuf,

    /// Number of records handed to the processor at a time
    pub batch_size: usize,

    /// Chat model used for cleaning
    pub model: String,

    /// Sampling temperature passed to the model
    pub temperature: f32,

    /// Credential for the model service
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// Per-request timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,

    /// Path to an external prompt template
    pub template_path: Option<PathBuf>,

    /// Write the CSV header when the output file starts out empty
    pub write_header: bool,

    /// Dry run mode (no model calls, no file writes)
    pub dry_run: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use question_csv::Config;
    ///
    /// let config = Config::builder()
    ///     .input_path("./appx_question_answer.sql")
    ///     .batch_size(25)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Input file doesn't exist or is not a file
    /// - Batch size is zero
    /// - Model settings are invalid
    /// - External template is invalid
    pub fn validate(&self) -> Result<()> {
        if !self.input_path.exists() {
            return Err(Error::config(format!(
                "Input file does not exist: {}",
                self.input_path.display()
            )));
        }

        if !self.input_path.is_file() {
            return Err(Error::config(format!(
                "Input path is not a file: {}",
                self.input_path.display()
            )));
        }

        if self.output_path.is_dir() {
            return Err(Error::config(format!(
                "Output path is a directory: {}",
                self.output_path.display()
            )));
        }

        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be greater than 0"));
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }

        if !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature ({}) must be between 0.0 and {MAX_TEMPERATURE}",
                self.temperature
            )));
        }

        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(Error::config(format!(
                "api_base must be an http(s) URL: {}",
                self.api_base
            )));
        }

        if let Some(ref template_path) = self.template_path {
            crate::template_validator::TemplateValidator::validate_template(template_path)?;
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            batch_size: DEFAULT_BATCH_SIZE,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: None,
            template_path: None,
            write_header: false,
            dry_run: false,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    input_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    batch_size: Option<usize>,
    model: Option<String>,
    temperature: Option<f32>,
    api_key: Option<String>,
    api_base: Option<String>,
    request_timeout: Option<Duration>,
    template_path: Option<PathBuf>,
    write_header: bool,
    dry_run: bool,
}

impl ConfigBuilder {
    /// Sets the SQL dump to read.
    #[must_use]
    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    /// Sets the CSV file to append to.
    #[must_use]
    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Sets the number of records per batch.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the chat model name.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the API key. Empty keys are treated as missing.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    /// Sets the base URL of the OpenAI-compatible API.
    #[must_use]
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = Some(url.into());
        self
    }

    /// Sets a per-request timeout for model calls.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the path to an external prompt template.
    ///
    /// The template must be valid Tera and reference the `record` variable.
    #[must_use]
    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    /// Enables writing the CSV header into an empty output file.
    #[must_use]
    pub fn write_header(mut self, enabled: bool) -> Self {
        self.write_header = enabled;
        self
    }

    /// Enables dry run mode (no model calls, no file writes).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            input_path: self
                .input_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_PATH)),
            output_path: self
                .output_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            api_key: self.api_key,
            api_base: self
                .api_base
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            request_timeout: self.request_timeout,
            template_path: self.template_path,
            write_header: self.write_header,
            dry_run: self.dry_run,
        };

        config.validate()?;
        Ok(config)
    }
}
