use crate::error::Result;

/// A byte-stream transport carrying whole, already-framed SMB2 messages.
///
/// Implementations own their own framing (a 4-byte length prefix for Direct
/// TCP); callers hand `send` a single SMB2 message (header + body) and get
/// back from `receive` a single decoded message with the frame stripped.
///
/// Connections are full-duplex: a client may have a request in flight on the
/// write side while the read side is blocked waiting on an unrelated
/// response. [`split`](SmbTransport::split) hands out the two halves as
/// independently owned trait objects so a caller can lock them separately
/// instead of serializing reads behind writes (or vice versa) on a single
/// mutex.
#[allow(async_fn_in_trait)]
pub trait SmbTransport: Send + SmbTransportRead + SmbTransportWrite {
    /// Opens the underlying connection to `endpoint` (`host:port`).
    async fn connect(&mut self, endpoint: &str) -> Result<()>;

    /// Splits a connected transport into independently lockable read and
    /// write halves.
    fn split(self: Box<Self>) -> (Box<dyn SmbTransportRead>, Box<dyn SmbTransportWrite>);
}

#[allow(async_fn_in_trait)]
pub trait SmbTransportRead: Send {
    /// Reads and de-frames the next SMB2 message. Blocks until a full
    /// message has arrived.
    async fn receive(&mut self) -> Result<Vec<u8>>;
}

#[allow(async_fn_in_trait)]
pub trait SmbTransportWrite: Send {
    /// Closes the underlying connection. Idempotent.
    async fn disconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Frames and writes a single SMB2 message.
    async fn send(&mut self, message: &[u8]) -> Result<()>;
}
