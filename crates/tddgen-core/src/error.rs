//! Error taxonomy shared by the injector binary and the watcher.
//!
//! Every error knows whether retrying could help. The injector maps that onto
//! its exit status so the watcher can stop early on failures that would only
//! repeat.

use std::path::PathBuf;
use thiserror::Error;

/// Process exit statuses used by the `tddgen` injector.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    /// Anything that might succeed on another attempt (I/O, locked files).
    pub const FAILURE: i32 = 1;
    /// Deterministic failures: the same inputs will fail the same way.
    pub const PERMANENT: i32 = 2;
}

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("no value supplied for field '{0}'")]
    MissingValue(String),

    #[error("field '{field}' contains a non-ASCII character at position {position}")]
    NonAscii { field: String, position: usize },

    #[error("offset {offset:#x} of field '{field}' is outside the template ({len} bytes)")]
    OffsetOutOfBounds {
        field: String,
        offset: usize,
        len: usize,
    },

    #[error("field '{field}' at {offset:#x} does not follow the previous field at {previous:#x}")]
    UnorderedSchema {
        field: String,
        offset: usize,
        previous: usize,
    },

    #[error("field '{0}' appears more than once in the schema")]
    DuplicateField(String),

    #[error("'{0}' cannot be used as an output file name")]
    InvalidIdentifier(String),

    #[error("failed to read template {}: {source}", path.display())]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write output {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl InjectError {
    /// True when the same inputs will always produce this error.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Self::Template { .. } | Self::Write { .. })
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_permanent() {
            exit_code::PERMANENT
        } else {
            exit_code::FAILURE
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document too short: {pages} pages, at least {required} required")]
    TooShort { pages: usize, required: usize },

    #[error("page {0} does not exist")]
    MissingPage(usize),

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: lopdf::Error,
    },

    #[error("failed to read text of page {page}: {source}")]
    PageText { page: usize, source: lopdf::Error },
}

impl ExtractError {
    /// The page count of a document never changes between attempts.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::TooShort { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required config key '{key}' in {}", path.display())]
    MissingKey { key: &'static str, path: PathBuf },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}:{line}: expected key=value, found '{text}'", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error("invalid value in {}: {source}", path.display())]
    Value {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("could not determine config directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_errors_are_permanent() {
        let err = InjectError::NonAscii {
            field: "re".to_string(),
            position: 3,
        };
        assert!(err.is_permanent());
        assert_eq!(err.exit_code(), exit_code::PERMANENT);
    }

    #[test]
    fn test_io_errors_are_retryable() {
        let err = InjectError::Write {
            path: PathBuf::from("/out/x.tdd"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
        };
        assert!(!err.is_permanent());
        assert_eq!(err.exit_code(), exit_code::FAILURE);
    }

    #[test]
    fn test_short_document_is_permanent() {
        assert!(ExtractError::TooShort {
            pages: 3,
            required: 6
        }
        .is_permanent());
        assert!(!ExtractError::MissingPage(9).is_permanent());
    }

    #[test]
    fn test_error_messages() {
        let err = InjectError::OffsetOutOfBounds {
            field: "dob".to_string(),
            offset: 0x949A,
            len: 16,
        };
        assert_eq!(
            err.to_string(),
            "offset 0x949a of field 'dob' is outside the template (16 bytes)"
        );

        let err = ConfigError::MissingKey {
            key: "output_folder",
            path: PathBuf::from(".config"),
        };
        assert!(err.to_string().contains("output_folder"));
    }
}
