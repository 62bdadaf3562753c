use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unexpected document shape: expected {expected}, found {found}")]
    Format { expected: String, found: String },

    #[error("Invalid number in <{element}>: {value:?}")]
    InvalidNumber { element: String, value: String },

    #[error("Preferences error: {0}")]
    Preferences(#[from] rusqlite::Error),

    #[error("Type mismatch for preference {key}: expected {expected}, got {actual}")]
    TypeMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Book not found: {0}")]
    NotFound(u32),

    #[error("No book id left after {0}")]
    IdsExhausted(u32),
}

impl LibraryError {
    pub(crate) fn format(expected: impl Into<String>, found: impl Into<String>) -> Self {
        LibraryError::Format {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
