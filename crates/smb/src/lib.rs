//! An SMB2/3 connection engine: dialect negotiation, the credit-based
//! sequence window, request/response correlation, the asynchronous-response
//! extension, GSS/SPNEGO authentication, inbound frame dispatch (signature
//! verification and session routing), and orderly shutdown.
//!
//! This crate models the commands the engine itself drives — NEGOTIATE,
//! SESSION_SETUP, LOGOFF — and nothing above that layer: no tree/file/pipe
//! operations, no SMB1, no on-disk session persistence.

pub mod auth;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod event;
pub mod msg_handler;
pub mod session;

pub use connection::{Connection, ConnectionConfig, ConnectionInfo};
pub use error::{Error, Result};
pub use event::ConnectionEvent;
pub use msg_handler::{HandlerReference, MessageHandler};
pub use session::Session;
