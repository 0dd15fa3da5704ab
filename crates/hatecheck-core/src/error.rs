//! Error types for hatecheck

/// Result type alias using hatecheck's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hatecheck operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed client input (empty text, empty batch)
    #[error("{0}")]
    InvalidInput(String),

    /// Classifier execution errors, including malformed classifier output
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Classifier could not be brought up at process start
    #[error("startup error: {0}")]
    Startup(String),

    /// Config file could not be read
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid YAML for the expected shape
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new startup error
    pub fn startup(msg: impl Into<String>) -> Self {
        Self::Startup(msg.into())
    }

    /// Whether the caller caused this error and can fix it by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Short, stable name used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Classifier(_) => "classifier",
            Self::Config(_) => "config",
            Self::Startup(_) => "startup",
            Self::Io(_) => "io",
            Self::Yaml(_) => "yaml",
        }
    }
}
