/// Core error type shared by every drt crate.
///
/// Adapter crates map their specific errors into this type so the prober and the
/// command executor can tell retryable transport failures from fatal ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed by peer ({code}): {message}")]
    Closed { code: i64, message: String },

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("token store {path}: {message}")]
    Store { path: String, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("token exchange failed: {status} {body}")]
    Exchange { status: u16, body: String },

    #[error("no usable endpoint after {attempts} attempts (last error: {last})")]
    Exhausted { attempts: u32, last: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Errors that must stop the prober instead of moving on to the next endpoint.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::InvalidInput(_)
                | Error::Auth(_)
                | Error::Store { .. }
                | Error::Exchange { .. }
                | Error::Exhausted { .. }
        )
    }

    /// The connection to the host is gone; further requests on it will fail too.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Closed { .. })
    }

    /// The host application answered the request with an `ERROR` event.
    pub fn is_rpc_rejection(&self) -> bool {
        matches!(self, Error::Rpc { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
