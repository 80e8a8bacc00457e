use std::path::PathBuf;

/// Errors produced while encoding or binding a configuration request
/// against the `config.v1` wire schema.
///
/// These always indicate a programming error or a schema mismatch, never a
/// runtime condition: the encoder and the schema are generated from the same
/// contract, so an unknown field must fail loudly instead of being dropped.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("message {message} has no field named '{field}'")]
    UnknownField {
        message: &'static str,
        field: String,
    },
    #[error("field '{field}' of {message} cannot hold a {given} payload")]
    PayloadMismatch {
        message: &'static str,
        field: &'static str,
        given: &'static str,
    },
    #[error("request must fold at least one selector around the action")]
    EmptyPath,
    #[error("selector '{0}' is not a valid top-level section")]
    BadRoot(String),
}

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No release artifact exists for this machine.
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("failed to download service artifact from {url}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to extract service artifact {archive}")]
    Extract {
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The launched service never wrote its run file.
    #[error("service did not register within {}ms of launch", timeout.as_millis())]
    StartTimeout { timeout: std::time::Duration },

    /// A session-scoped call was made before `init` established a handle.
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),

    /// A scalar `get()` found no value of the expected kind.
    #[error("{kind} value does not exist at {path}")]
    ValueNotSet { kind: &'static str, path: String },

    /// Malformed input rejected before any remote call.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// The remote side answered with a Connect error envelope.
    #[error("rpc {method} failed: {code}: {message}")]
    Rpc {
        method: String,
        code: String,
        message: String,
    },

    /// The byte stream of a streaming call was malformed.
    #[error("malformed stream frame: {0}")]
    Stream(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("transport error")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to decode response")]
    Decode(#[from] serde_json::Error),

    #[error("failed to parse settings")]
    Settings(#[from] toml::de::Error),

    /// The machine has no usable config/data directory.
    #[error("could not resolve {0} directory for this platform")]
    NoDirectory(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
