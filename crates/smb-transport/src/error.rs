#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("transport is not connected")]
    NotConnected,
    #[error("operation {0} timed out after {1:?}")]
    Timeout(String, std::time::Duration),
    #[error("frame of {0} bytes exceeds the maximum Direct TCP message size")]
    FrameTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, TransportError>;
