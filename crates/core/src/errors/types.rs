use std::path::PathBuf;

/// Result type alias for rolegate core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rolegate operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A value failed validation
    #[error("invalid {field} '{value}': {message}")]
    Validation {
        field: &'static str,
        value: String,
        message: String,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}
