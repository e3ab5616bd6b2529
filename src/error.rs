//! Error types for fetching and rendering issues

use thiserror::Error;

/// Errors that abort an issue fetch
#[derive(Error, Debug)]
pub enum FetchError {
    /// Repository is not of the form `owner/name`
    #[error("Invalid repository format '{0}'. Please use format: owner/repository")]
    InvalidRepositoryFormat(String),

    /// Rate limiting persisted past the retry ceiling
    #[error("Maximum retry attempts exceeded while fetching issues ({attempts} rate-limited responses)")]
    RetriesExhausted { attempts: u32 },

    /// Any other network or API failure
    #[error("GitHub API error: {0}")]
    Api(String),
}

/// Errors raised while laying out or writing a document
#[derive(Error, Debug)]
pub enum RenderError {
    /// Rendering was requested without any issue
    #[error("No issues to generate PDF from")]
    EmptyInput,

    /// Body text could not be converted
    #[error("Failed to convert issue body: {0}")]
    Conversion(String),

    /// A single issue could not be laid out
    #[error("Failed to render issue #{number}: {message}")]
    Issue { number: u64, message: String },

    /// An embedded font could not be parsed
    #[error(transparent)]
    Font(#[from] FontError),

    /// The finished document could not be written
    #[error("Failed to write document: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading a font
#[derive(Error, Debug, Clone)]
pub enum FontError {
    #[error("Failed to load font {name}: {source}")]
    Parse {
        name: &'static str,
        #[source]
        source: ttf_parser::FaceParsingError,
    },
}
