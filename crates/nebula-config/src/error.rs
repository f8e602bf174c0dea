//! Errors raised while persisting or parsing `config.ron`.

/// Failure to read, write, parse or serialize the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// The directory or file could not be written.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// The file is not valid RON for [`Config`](crate::Config).
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),
}
