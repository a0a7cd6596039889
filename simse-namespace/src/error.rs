use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamespaceError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Not a file: {0}")]
    NotAFile(String),
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl NamespaceError {
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidPath(_) => "NS_INVALID_PATH",
            Self::InvalidName(_) => "NS_INVALID_NAME",
            Self::NotFound(_) => "NS_NOT_FOUND",
            Self::AlreadyExists(_) => "NS_ALREADY_EXISTS",
            Self::NotAFile(_) => "NS_NOT_FILE",
            Self::NotADirectory(_) => "NS_NOT_DIRECTORY",
            Self::DirectoryNotEmpty(_) => "NS_NOT_EMPTY",
            Self::InvalidOperation(_) => "NS_INVALID_OPERATION",
        }
    }

    /// Structured form used by the demo's `--json` output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        })
    }
}
