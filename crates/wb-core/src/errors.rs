use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the core can decide
/// what is fatal (startup config), what is reported to an admin, and what is only
/// logged (background tasks).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("missing credential in {}: {reason}", path.display())]
    ConfigMissing { path: PathBuf, reason: String },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("template references unknown placeholder {{{key}}}")]
    MissingPlaceholder { key: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("blocking store task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("cannot serialize config file: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
