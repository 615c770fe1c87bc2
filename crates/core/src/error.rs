#[derive(Debug, thiserror::Error)]
pub enum EgfrError {
    #[error("insufficient input: {field} is required")]
    InsufficientInput { field: &'static str },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("patient is {age} years old; the pediatric formula is required under 18")]
    PediatricFormulaRequired { age: f64 },

    #[error("unauthenticated: no account matches the supplied user id")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("an account with identifier '{identifier}' already exists for role {role}")]
    DuplicateAccount { identifier: String, role: String },

    #[error("failed to parse CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),
}

impl EgfrError {
    /// True for failures of the storage layer itself rather than of the request.
    ///
    /// Callers surface these as "storage unavailable".
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(
            self,
            EgfrError::StorageDirCreation(_)
                | EgfrError::FileWrite(_)
                | EgfrError::FileRead(_)
                | EgfrError::Serialization(_)
                | EgfrError::Deserialization(_)
        )
    }
}

pub type EgfrResult<T> = std::result::Result<T, EgfrError>;
