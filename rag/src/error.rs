//! Error types for the indexing and answering pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is present but unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required configuration value is absent
    #[error("Missing configuration: {0} must be set")]
    MissingConfig(&'static str),

    /// A single uploaded file could not be read as a PDF
    #[error("Failed to parse '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Every uploaded file was skipped
    #[error("No valid documents: {}", warnings.join("; "))]
    NoValidDocuments { warnings: Vec<String> },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status
    #[error("HTTP error: POST {url} failed: {status} {body}")]
    Status { url: String, status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A question arrived before any document set was indexed
    #[error("No documents are indexed yet; upload PDFs first")]
    NotReady,

    #[error("Question is empty")]
    EmptyQuestion,
}

impl Error {
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }
}
