//! The shapes exchanged between a caller and the connection engine, plus
//! the small [`MessageHandler`] trait [`crate::connection::Connection`]
//! implements. A request bound for an established session doesn't go
//! through a session-specific handler; [`OutgoingMessage::with_session_id`]
//! stamps the ID directly, since a [`crate::session::Session`] holding its
//! own handle back to the connection would recreate the Connection/Session
//! reference cycle spec.md §9 calls out.
//!
//! Unlike the handler chain this is grounded on, responses are not polled
//! for via a second `recvo` call: spec.md §4.3 has `send` return the
//! request's future directly, so `sendo` here returns a [`PendingResponse`]
//! wrapping the `tokio::sync::oneshot` receiver half of that promise.

use std::sync::Arc;
use std::time::Duration;

use smb_msg::{Header, ResponseContent, Status};
use tokio::sync::oneshot;

use crate::error::TimedOutTask;
use crate::{Error, Result};

pub use smb_msg::RequestContent;

/// A request awaiting assignment of a `MessageId` and credits by the send
/// path.
#[derive(Debug)]
pub struct OutgoingMessage {
    pub content: RequestContent,
    /// `0` for connection-level requests (NEGOTIATE, the first round of
    /// SESSION_SETUP); the session ID for everything sent on an
    /// established or in-progress session.
    pub session_id: u64,
}

impl OutgoingMessage {
    pub fn new(content: RequestContent) -> Self {
        OutgoingMessage {
            content,
            session_id: 0,
        }
    }

    pub fn with_session_id(mut self, session_id: u64) -> Self {
        self.session_id = session_id;
        self
    }
}

/// The future a caller awaits for a sent message's response (spec.md §4.3
/// step 6's "Request's future").
pub struct PendingResponse {
    pub msg_id: u64,
    receiver: oneshot::Receiver<Result<IncomingMessage>>,
}

impl PendingResponse {
    pub(crate) fn new(msg_id: u64, receiver: oneshot::Receiver<Result<IncomingMessage>>) -> Self {
        PendingResponse { msg_id, receiver }
    }

    /// Awaits the response, bounded by `timeout` (`Duration::ZERO` means
    /// wait forever). Per spec.md §5, an elapsed timeout does not retract
    /// the request: it stays outstanding and may still be delivered to
    /// whatever called `wait` first (subsequent calls will find the
    /// receiver already consumed).
    pub async fn wait(self, timeout: Duration) -> Result<IncomingMessage> {
        if timeout.is_zero() {
            return self
                .receiver
                .await
                .map_err(|_| Error::MessageProcessingError("response sender dropped".into()))?;
        }
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                Err(Error::MessageProcessingError("response sender dropped".into()))
            }
            Err(_) => Err(Error::OperationTimeout(
                TimedOutTask::ReceiveNextMessage,
                timeout,
            )),
        }
    }
}

/// A fully decoded response, after signature verification (spec.md §4.4).
#[derive(Debug)]
pub struct IncomingMessage {
    pub header: Header,
    pub content: ResponseContent,
    /// Whether the header's `SIGNED` flag was set and its signature
    /// verified successfully.
    pub signed: bool,
}

impl IncomingMessage {
    /// Returns `Ok(self)` unless the header carries a non-success status,
    /// in which case it's surfaced as [`Error::ReceivedErrorMessage`].
    /// Spec.md §7: the core itself never raises on a non-success status —
    /// this is a convenience the caller opts into.
    pub fn expect_status(self, expected: &[Status]) -> Result<Self> {
        if expected.contains(&self.header.status) {
            return Ok(self);
        }
        let status = self.header.status;
        match self.content {
            ResponseContent::Error(err) => Err(Error::ReceivedErrorMessage(status, err)),
            _ => Err(Error::UnexpectedMessageStatus(status)),
        }
    }
}

/// Trait for entities that can send an SMB2 message and hand back a
/// promise for its response. [`crate::connection::Connection`] is the only
/// implementor.
#[allow(async_fn_in_trait)]
pub trait MessageHandler: Send + Sync {
    async fn sendo(&self, msg: OutgoingMessage) -> Result<PendingResponse>;

    #[inline]
    async fn send(&self, content: RequestContent) -> Result<PendingResponse> {
        self.sendo(OutgoingMessage::new(content)).await
    }

    #[inline]
    async fn send_recv(
        &self,
        content: RequestContent,
        timeout: Duration,
    ) -> Result<IncomingMessage> {
        self.send(content).await?.wait(timeout).await
    }
}

/// A templated shared reference to a [`MessageHandler`], giving ergonomic
/// `Deref`-based access to its methods while remaining cheaply `Clone`.
pub struct HandlerReference<T: MessageHandler + ?Sized> {
    pub handler: Arc<T>,
}

impl<T: MessageHandler> HandlerReference<T> {
    pub(crate) fn new(handler: T) -> Self {
        HandlerReference {
            handler: Arc::new(handler),
        }
    }
}

impl<T: MessageHandler> std::ops::Deref for HandlerReference<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.handler
    }
}

impl<T: MessageHandler> Clone for HandlerReference<T> {
    fn clone(&self) -> Self {
        HandlerReference {
            handler: self.handler.clone(),
        }
    }
}
