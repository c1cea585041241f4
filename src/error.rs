use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed queue record {source_name}: {reason}")]
    MalformedRecord { source_name: String, reason: String },

    #[error("Queue record already exists: {0}")]
    IdentityCollision(String),

    #[error("Dependency cycle between {from} and {to}")]
    CycleRejected { from: String, to: String },

    #[error("Queue write failed after {written} of {total} records: {source}")]
    Enqueue {
        written: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
