//! Connection configuration (spec.md §1's ambient configuration surface).
//!
//! Trimmed from the teacher's `ConnectionConfig`: multichannel,
//! compression and encryption modes, and the Kerberos/QUIC feature gates
//! all went with the features they configured (see `DESIGN.md`). What's
//! left — timeouts, dialect range, transport, signing/auth policy, and
//! the credit backlog — is exactly the ambient surface spec.md §1 calls
//! for regardless of which protocol features are in scope.

use std::time::Duration;

use smb_msg::Dialect;
use smb_transport::config::TransportConfig;

use crate::{Error, Result};

/// Which authentication mechanisms the client is willing to offer.
/// Kerberos isn't implemented (spec.md explicitly scopes concrete GSS
/// mechanisms other than stubbing the negotiation out); the field exists
/// so turning it on later doesn't need a config-shape change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthMethodsConfig {
    pub ntlm: bool,
}

impl Default for AuthMethodsConfig {
    fn default() -> Self {
        AuthMethodsConfig { ntlm: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Defaults to the transport's own default port (445 for Direct TCP)
    /// if unset.
    pub port: Option<u16>,

    /// `None` means wait forever. Unset defaults to
    /// [`ConnectionConfig::DEFAULT_TIMEOUT`].
    pub timeout: Option<Duration>,

    /// Lower bound of the dialects offered in NEGOTIATE. Must be `<=`
    /// `max_dialect` when both are set.
    pub min_dialect: Option<Dialect>,
    pub max_dialect: Option<Dialect>,

    /// Sign every request regardless of what the server requires.
    pub require_signing: bool,

    /// Allow unsigned access for sessions the server reports as guest or
    /// anonymous, even when `require_signing` is set ([MS-SMB2] 3.2.5.3).
    pub allow_unsigned_guest_access: bool,

    pub transport: TransportConfig,
    pub auth_methods: AuthMethodsConfig,

    /// Desired SMB2 credit balance. Unset uses
    /// [`crate::connection::sequence_window::SequenceWindow::PREFERRED_MINIMUM_CREDITS`].
    pub credits_backlog: Option<u16>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            port: None,
            timeout: None,
            min_dialect: None,
            max_dialect: None,
            require_signing: false,
            allow_unsigned_guest_access: false,
            transport: TransportConfig::default(),
            auth_methods: AuthMethodsConfig::default(),
            credits_backlog: None,
        }
    }
}

impl ConnectionConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_dialect, self.max_dialect) {
            if min > max {
                return Err(Error::InvalidConfiguration(
                    "minimum dialect is greater than maximum dialect".to_string(),
                ));
            }
        }
        if !self.auth_methods.ntlm {
            return Err(Error::InvalidConfiguration(
                "no authentication mechanism enabled".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(Self::DEFAULT_TIMEOUT)
    }
}
