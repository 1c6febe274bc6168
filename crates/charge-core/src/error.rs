use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the charging-session analytics engine.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// The file extension is not one of the recognised export formats.
    #[error("Unsupported file format '{extension}' for {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Delimited text could not be tokenised, or a workbook could not be read.
    #[error("Failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    /// The file was readable but no row carried both a station id and a
    /// valid timestamp.
    #[error("No usable charging sessions: {0}")]
    EmptyDataset(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be serialised or parsed.
    #[error("Failed to process JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A background analysis task panicked or was cancelled.
    #[error("Analysis task failed: {0}")]
    Task(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalyticsError {
    /// Create a parse error for `file`.
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the charge crates.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unsupported_format() {
        let err = AnalyticsError::UnsupportedFormat {
            path: PathBuf::from("/exports/sessions.txt"),
            extension: "txt".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Unsupported file format 'txt'"));
        assert!(msg.contains("/exports/sessions.txt"));
    }

    #[test]
    fn test_error_display_parse() {
        let err = AnalyticsError::parse("sessions.csv", "2 malformed row(s)");
        assert_eq!(err.to_string(), "Failed to parse sessions.csv: 2 malformed row(s)");
    }

    #[test]
    fn test_error_display_empty_dataset() {
        let err = AnalyticsError::EmptyDataset("0 of 4 rows usable".to_string());
        assert_eq!(err.to_string(), "No usable charging sessions: 0 of 4 rows usable");
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = AnalyticsError::FileRead {
            path: PathBuf::from("/some/export.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/export.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_config() {
        let err = AnalyticsError::Config("bad date".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad date");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AnalyticsError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: AnalyticsError = json_err.into();
        assert!(err.to_string().contains("Failed to process JSON"));
    }
}
