use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bind failure: {0}")]
    BindFailure(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unsupported report: type 0x{report_type:02X} id 0x{id:02X}")]
    UnsupportedReport { report_type: u8, id: u8 },

    #[error("Invalid report length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Session error [{remote}]: {reason}")]
    Session { remote: String, reason: String },

    #[error("Endpoint error [{endpoint}]: {source}")]
    Endpoint {
        endpoint: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Gadget error: {0}")]
    Gadget(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether an endpoint error only affects the current sample.
    ///
    /// EAGAIN means the endpoint FIFO is busy; the sample is dropped and the
    /// next tick retries. Anything else releases the function.
    pub fn is_transient_endpoint(&self) -> bool {
        match self {
            BridgeError::Endpoint { source, .. } => {
                matches!(source.raw_os_error(), Some(libc::EAGAIN))
            }
            _ => false,
        }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
