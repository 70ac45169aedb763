use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tera::Tera;

/// Maximum template file size (1MB)
const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

/// Variable every prompt template must substitute
const RECORD_VARIABLE: &str = "record";

/// Validates external prompt templates
pub(crate) struct TemplateValidator;

impl TemplateValidator {
    /// Checks that `path` holds a usable prompt template: a regular file no
    /// larger than [`MAX_TEMPLATE_SIZE`], non-blank, valid Tera, and
    /// substituting `record`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::TemplateValidation`] for everything else.
    pub(crate) fn validate_template(path: &Path) -> Result<()> {
        let reject = |reason: String| Error::template_validation(path.to_string_lossy(), reason);

        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if !metadata.is_file() {
            return Err(reject("Path is not a file".to_string()));
        }
        if metadata.len() > MAX_TEMPLATE_SIZE {
            return Err(reject(format!(
                "Template file too large: {} bytes (max: {MAX_TEMPLATE_SIZE} bytes)",
                metadata.len()
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        if content.trim().is_empty() {
            return Err(reject("Template file is empty".to_string()));
        }

        Tera::default()
            .add_raw_template("validation", &content)
            .map_err(|e| reject(format!("Template syntax error: {e}")))?;

        Self::check_record_variable(&content, path)
    }

    /// Checks that the template references the record variable.
    ///
    /// Heuristic: looks for `{{ record` / `{{record` in the template source.
    fn check_record_variable(content: &str, path: &Path) -> Result<()> {
        let patterns = [
            format!("{{{{ {RECORD_VARIABLE}"),
            format!("{{{{{RECORD_VARIABLE}"),
        ];

        if patterns.iter().any(|pattern| content.contains(pattern)) {
            Ok(())
        } else {
            Err(Error::template_validation(
                path.to_string_lossy(),
                format!(
                    "Template never substitutes `{{{{ {RECORD_VARIABLE} }}}}`; \
                    the raw record would not reach the model"
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_validate_valid_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("prompt.tera");
        template_file
            .write_str("Clean this row and answer with one CSV line:\n{{ record }}")
            .unwrap();

        assert!(TemplateValidator::validate_template(template_file.path()).is_ok());
    }

    #[test]
    fn test_validate_nonexistent_file() {
        let result = TemplateValidator::validate_template(Path::new("/nonexistent/template.tera"));
        assert!(result.unwrap_err().is_io());
    }

    #[test]
    fn test_validate_directory() {
        let temp = assert_fs::TempDir::new().unwrap();

        let result = TemplateValidator::validate_template(temp.path());
        assert!(result.unwrap_err().to_string().contains("not a file"));
    }

    #[test]
    fn test_validate_empty_template() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("empty.tera");
        template_file.write_str("   \n  \n  ").unwrap();

        let result = TemplateValidator::validate_template(template_file.path());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_syntax_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("invalid.tera");
        template_file
            .write_str("{% if record %}\n{{ record }}")
            .unwrap();

        let result = TemplateValidator::validate_template(template_file.path());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Template syntax error"));
    }

    #[test]
    fn test_validate_missing_record_variable() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("no_record.tera");
        template_file.write_str("Return a CSV line.").unwrap();

        let result = TemplateValidator::validate_template(template_file.path());
        let err = result.unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("never substitutes"));
    }

    #[test]
    fn test_validate_file_too_large() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template_file = temp.child("large.tera");

        let large_content = "x".repeat((MAX_TEMPLATE_SIZE + 1) as usize);
        template_file.write_str(&large_content).unwrap();

        let result = TemplateValidator::validate_template(template_file.path());
        assert!(result.unwrap_err().to_string().contains("too large"));
    }
}
