//! Error types for the renderer

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning a document into a PDF
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to start the browser or open its page
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Navigation or markup loading failed
    #[error("Failed to load content: {0}")]
    ContentLoad(String),

    /// The pagination script could not be fetched or evaluated
    #[error("Failed to inject pagination script: {0}")]
    PaginationInjection(String),

    /// Paged.js reported a failure while laying out the document
    #[error("Pagination failed: {0}")]
    PaginationFailed(String),

    /// The completion marker stayed pending for the whole wait
    #[error("Pagination did not finish within {elapsed:?}")]
    RenderTimeout { elapsed: Duration },

    /// Printing the page to PDF failed
    #[error("PDF export failed: {0}")]
    Export(String),

    /// Evaluating script in the page failed
    #[error("Script execution failed: {0}")]
    Script(String),

    /// Invalid configuration or command-line input
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn io_at(path: &Path, err: std::io::Error) -> Self {
        Error::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.display(), err),
        ))
    }
}
