/// Shared error type used across all aicall crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("engine {engine}: {message}")]
    Engine { engine: String, message: String },

    #[error("{service} service: {message}")]
    Service { service: String, message: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("validation: {0}")]
    Validation(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("unknown tool call: {0}")]
    UnknownTool(String),

    #[error("canceled: {0}")]
    Canceled(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn engine(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Engine {
            engine: engine.into(),
            message: message.into(),
        }
    }

    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Service {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Event handlers treat a missing record as "already gone".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
