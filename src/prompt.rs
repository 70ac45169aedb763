use crate::{
    config::Config,
    error::{Error, Result},
};
use serde::Serialize;
use std::fs;
use tera::{Context, Tera};

const BUILTIN_TEMPLATE_NAME: &str = "sanitize";
const EXTERNAL_TEMPLATE_NAME: &str = "external";

/// Header of the CSV produced by the cleaning prompt, in column order.
pub const CSV_HEADER: &str = "id,test_series,test_title,test_section,question,\
option_1,option_2,option_3,option_4,option_5,option_6,option_7,option_8,option_9,option_10,answer";

/// A field the model is asked to extract from a raw record.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    /// Human-readable field name used in the instruction
    pub label: &'static str,
    /// Where the value sits in the raw record
    pub columns: &'static str,
    /// Whether HTML/CSS must be stripped from the value
    pub strip_markup: bool,
}

/// Column layout of the question dump.
///
/// Records are not checked against it; a short or malformed record is left
/// to the model's interpretation.
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        label: "ID",
        columns: "index 0",
        strip_markup: false,
    },
    FieldSpec {
        label: "Test Series",
        columns: "index 1",
        strip_markup: false,
    },
    FieldSpec {
        label: "Test Title",
        columns: "index 2",
        strip_markup: false,
    },
    FieldSpec {
        label: "Test Section",
        columns: "index 3",
        strip_markup: false,
    },
    FieldSpec {
        label: "Question text",
        columns: "index 6",
        strip_markup: true,
    },
    FieldSpec {
        label: "Options 1-10",
        columns: "indices 9-18",
        strip_markup: true,
    },
    FieldSpec {
        label: "Answer",
        columns: "index 32",
        strip_markup: false,
    },
];

#[derive(Serialize)]
struct PromptContext<'a> {
    record: &'a str,
    fields: &'static [FieldSpec],
    header: &'static str,
}

/// Renders the cleaning instruction for a single raw record.
pub struct PromptTemplate {
    tera: Tera,
    template_name: &'static str,
}

impl PromptTemplate {
    /// Creates the prompt template from configuration.
    ///
    /// Uses the external template when `config.template_path` is set,
    /// the built-in instruction otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be read or compiled.
    pub fn new(config: &Config) -> Result<Self> {
        let mut tera = Tera::default();

        let template_name = if let Some(ref path) = config.template_path {
            let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            tera.add_raw_template(EXTERNAL_TEMPLATE_NAME, &source)
                .map_err(|e| Error::template(path.display().to_string(), &e))?;
            EXTERNAL_TEMPLATE_NAME
        } else {
            Self::register_builtin_template(&mut tera)?;
            BUILTIN_TEMPLATE_NAME
        };

        Ok(Self {
            tera,
            template_name,
        })
    }

    /// Creates the prompt template with the built-in instruction.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in template fails to compile.
    pub fn builtin() -> Result<Self> {
        let mut tera = Tera::default();
        Self::register_builtin_template(&mut tera)?;

        Ok(Self {
            tera,
            template_name: BUILTIN_TEMPLATE_NAME,
        })
    }

    fn register_builtin_template(tera: &mut Tera) -> Result<()> {
        tera.add_raw_template(
            BUILTIN_TEMPLATE_NAME,
            include_str!("../templates/sanitize.tera"),
        )
        .map_err(|e| Error::template(BUILTIN_TEMPLATE_NAME, &e))
    }

    /// Renders the instruction with `record` substituted.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn render(&self, record: &str) -> Result<String> {
        let context = PromptContext {
            record,
            fields: FIELDS,
            header: CSV_HEADER,
        };

        let tera_context = Context::from_serialize(&context)
            .map_err(|e| Error::template(self.template_name, &e))?;

        self.tera
            .render(self.template_name, &tera_context)
            .map_err(|e| Error::template(self.template_name, &e))
    }
}
