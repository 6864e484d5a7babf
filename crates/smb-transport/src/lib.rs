//! The byte-stream transport collaborator: frames whole SMB2 messages onto
//! a connection. Only Direct TCP (port 445, 4-byte length-prefixed frames)
//! is implemented; NetBIOS/QUIC/RDMA transports are not modeled here.

use std::time::Duration;

pub mod config;
pub mod error;
pub mod tcp;
pub mod traits;
pub mod utils;

pub use config::TransportConfig;
pub use error::TransportError;
pub use tcp::TcpTransport;
pub use traits::{SmbTransport, SmbTransportRead, SmbTransportWrite};

/// Creates an [`SmbTransport`] out of a [`TransportConfig`].
///
/// ## Arguments
/// * `transport` - the transport configuration to make the transport by.
/// * `timeout` - the connect timeout to use for the transport.
pub fn make_transport(
    transport: &TransportConfig,
    timeout: Duration,
) -> Result<Box<dyn SmbTransport>, TransportError> {
    match transport {
        TransportConfig::Tcp => Ok(Box::new(tcp::TcpTransport::new(timeout))),
    }
}
