use std::{num::TryFromIntError, sync::PoisonError};

use smb_msg::{Command, ErrorResponse, Status};
use smb_transport::TransportError;
use thiserror::Error;

#[derive(Debug)]
pub enum TimedOutTask {
    TcpConnect,
    ReceiveNextMessage,
    Authenticate,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected message: {0}")]
    InvalidMessage(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("binrw error: {0}")]
    BinRWError(#[from] binrw::Error),
    #[error("int conversion error: {0}")]
    ParsingError(#[from] TryFromIntError),
    #[error("client is not connected")]
    NotConnected,
    #[error("client is already connected")]
    AlreadyConnected,
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("negotiation error: {0}")]
    NegotiationError(String),
    #[error("signature verification failed")]
    SignatureVerificationFailed,
    #[error("unexpected message status: {0}")]
    UnexpectedMessageStatus(Status),
    #[error("server returned an error message with status {0}: {1:?}")]
    ReceivedErrorMessage(Status, ErrorResponse),
    #[error("unexpected command: {0}")]
    UnexpectedMessageCommand(Command),
    #[error("SSPI error: {0}")]
    SspiError(#[from] sspi::Error),
    #[error("unsupported authentication mechanism: {0}")]
    UnsupportedAuthenticationMechanism(String),
    #[error("no authenticator supports the server's offered mechanisms")]
    NoSuitableAuthenticator,
    #[error("SPNEGO token error: {0}")]
    SpnegoError(String),
    #[error("message processing failed: {0}")]
    MessageProcessingError(String),
    #[error("operation timed out: {0:?}, took >{1:?}")]
    OperationTimeout(TimedOutTask, std::time::Duration),
    #[error("lock error")]
    LockError,
    #[error("task join error")]
    JoinError(#[from] tokio::task::JoinError),
    #[error("unexpected message with id {0} (expected {1})")]
    UnexpectedMessageId(u64, u64),
    #[error("invalid endpoint: {0}")]
    InvalidAddress(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("session not found: {0}")]
    SessionNotFound(u64),
    #[error("DER encoding error: {0}")]
    DerError(#[from] der::Error),
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("SMB message error: {0}")]
    SmbMessageError(#[from] smb_msg::SmbMsgError),
    #[error("transport error: {0}")]
    TransportError(#[from] TransportError),
}

impl Error {
    /// Builds the error every outstanding promise is failed with when the
    /// connection errors out (spec.md §4.7 `handleError`). `Error` can't
    /// derive `Clone` (several variants wrap non-`Clone` upstream error
    /// types), so the original error is stringified once and fanned out.
    pub fn connection_closed(cause: &Error) -> Error {
        Error::ConnectionClosed(cause.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::LockError
    }
}

pub type Result<T> = std::result::Result<T, Error>;
