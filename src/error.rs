use thiserror::Error;

#[derive(Error, Debug)]
pub enum MandataError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Required sheet missing: {0}")]
    SheetMissing(String),

    #[error("Import session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid chunk request: {0}")]
    BadRequest(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, MandataError>;
