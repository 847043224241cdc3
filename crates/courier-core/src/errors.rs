/// Core error type for the courier service.
///
/// Adapter crates map their specific failures into this type so the HTTP
/// layer can translate them consistently (caller mistake vs upstream
/// rejection vs internal fault).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("reply store error: {0}")]
    Store(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
