//! What the engine learns about a connection during NEGOTIATE (spec.md
//! §3): written once while negotiating, read-only for the life of the
//! connection after that (the two session tables are the exception — they
//! grow and shrink as sessions come and go).

use smb_dtyp::Guid;
use smb_msg::{Dialect, GlobalCapabilities, NegotiateSecurityMode};

use crate::session::{PreauthSessionTable, SessionTable};

/// Negotiated connection state, grounded on the teacher's
/// `connection/connection_info.rs`, trimmed of preauth-integrity hash
/// chaining and multi-dialect negotiate-context bookkeeping that came with
/// SMB 3.1.1 support `smb-msg` already dropped.
pub struct ConnectionInfo {
    pub client_guid: Guid,
    pub server_guid: Guid,
    pub dialect: Dialect,
    pub security_mode: NegotiateSecurityMode,
    pub capabilities: GlobalCapabilities,
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    /// The server's own GSS negotiate token from NEGOTIATE's response
    /// buffer, handed to the first `SESSION_SETUP` round (spec.md §4.6
    /// step 1).
    pub gss_negotiate_token: Vec<u8>,
    pub sessions: SessionTable,
    pub preauth_sessions: PreauthSessionTable,
}

impl ConnectionInfo {
    pub fn new(client_guid: Guid) -> Self {
        ConnectionInfo {
            client_guid,
            server_guid: Guid::ZERO,
            dialect: Dialect::MIN,
            security_mode: NegotiateSecurityMode::new(),
            capabilities: GlobalCapabilities::new(),
            max_transact_size: 0,
            max_read_size: 0,
            max_write_size: 0,
            gss_negotiate_token: Vec::new(),
            sessions: SessionTable::new(),
            preauth_sessions: PreauthSessionTable::new(),
        }
    }

    /// Whether the negotiated security mode obliges the client to sign
    /// every request ([MS-SMB2] 3.2.5.1.3).
    pub fn server_requires_signing(&self) -> bool {
        self.security_mode.signing_required()
    }
}
