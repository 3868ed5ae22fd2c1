//! Configuration errors

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("invalid glob `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("unknown dialect `{0}`")]
    UnknownDialect(String),
}
