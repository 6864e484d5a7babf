//! GSS/SPNEGO multi-round authentication (spec.md §4.6).
//!
//! [`Authenticator`] is mechanism-agnostic; [`spnego`] is the only caller
//! that needs to know SPNEGO exists at all, and [`ntlm`] is the only
//! mechanism implementation this crate ships. A Kerberos implementation
//! would plug in beside it without either module changing.

pub mod ntlm;
pub mod spnego;

use crate::Result;

/// What driving an [`Authenticator`] one round produced.
pub enum AuthenticationStep {
    /// Send this token to the server and feed its response back into
    /// `next`.
    NextToken(Vec<u8>),
    /// The mechanism has authenticated; no further exchange is needed and
    /// `session_key` now returns a usable key.
    Complete { session_key: [u8; 16] },
}

/// A single authentication mechanism's state machine.
pub trait Authenticator: Send {
    /// Feeds the server's last token (empty on the very first call) and
    /// returns either the next token to send, or completion.
    fn next(&mut self, server_token: &[u8]) -> Result<AuthenticationStep>;

    fn is_authenticated(&self) -> bool;

    /// The signing/sealing key derived from the completed exchange.
    /// Only meaningful once `is_authenticated()` is `true`.
    fn session_key(&self) -> Result<[u8; 16]>;
}
