//! Established sessions and sessions still mid-authentication (spec.md §3,
//! §4.6). Trimmed from the teacher's `Session`/`Channel` machinery, which
//! additionally tracked alternate channels for multichannel and an
//! encryptor/decryptor pair for SMB 3.x encryption, neither in scope here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::auth::Authenticator;
use crate::crypto::{self, SigningKey};
use crate::Result;

/// A session that has completed `SESSION_SETUP` with `STATUS_SUCCESS`
/// (spec.md §4.6 step 5).
pub struct Session {
    pub session_id: u64,
    signing_key: Option<SigningKey>,
    /// Guest and anonymous sessions never sign, even when the connection
    /// otherwise requires signing ([MS-SMB2] 3.2.5.3).
    pub is_guest_or_anonymous: bool,
    /// Set when an inbound packet on this session carries
    /// `STATUS_NETWORK_SESSION_EXPIRED`. Per spec.md §9 this is surfaced to
    /// the caller, not acted on automatically.
    needs_reauth: AtomicBool,
}

impl Session {
    pub fn new(session_id: u64, signing_key: Option<SigningKey>, is_guest_or_anonymous: bool) -> Self {
        Session {
            session_id,
            signing_key,
            is_guest_or_anonymous,
            needs_reauth: AtomicBool::new(false),
        }
    }

    pub(crate) fn should_sign(&self) -> bool {
        self.signing_key.is_some() && !self.is_guest_or_anonymous
    }

    /// Signs `message` (the full serialized header+body) in place, if
    /// this session signs outgoing requests.
    pub fn sign_request(&self, message: &mut [u8]) -> Result<()> {
        if !self.should_sign() {
            return Ok(());
        }
        crypto::signing::sign(message, self.signing_key.as_ref().unwrap())
    }

    /// Verifies an inbound message's signature. A session without a
    /// signing key (still being negotiated) has nothing to verify against,
    /// and is treated as trivially valid.
    pub fn verify_response(&self, message: &[u8]) -> Result<bool> {
        match &self.signing_key {
            Some(key) if self.should_sign() => crypto::signing::verify(message, key),
            _ => Ok(true),
        }
    }

    pub fn flag_needs_reauth(&self) {
        self.needs_reauth.store(true, Ordering::SeqCst);
    }

    pub fn needs_reauth(&self) -> bool {
        self.needs_reauth.load(Ordering::SeqCst)
    }
}

/// A session still in the middle of `SESSION_SETUP`'s multi-round
/// exchange: it has a `SessionId` (the server assigns one on the very
/// first response, interim or not, per [MS-SMB2] 3.3.5.5), but no signing
/// key until the exchange completes.
pub struct PreauthSession {
    pub session_id: u64,
    pub authenticator: Box<dyn Authenticator>,
}

#[derive(Default)]
pub struct PreauthSessionTable {
    sessions: Mutex<HashMap<u64, PreauthSession>>,
}

impl PreauthSessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: PreauthSession) -> Result<()> {
        self.sessions.lock()?.insert(session.session_id, session);
        Ok(())
    }

    /// Removes and returns the entry for `session_id`, if any, so its
    /// authenticator can be driven by `&mut` without holding the table's
    /// lock across the (synchronous) SPNEGO/NTLM round.
    pub fn take(&self, session_id: u64) -> Result<Option<PreauthSession>> {
        Ok(self.sessions.lock()?.remove(&session_id))
    }

    pub fn contains(&self, session_id: u64) -> Result<bool> {
        Ok(self.sessions.lock()?.contains_key(&session_id))
    }
}

#[derive(Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<u64, Arc<Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) -> Result<Arc<Session>> {
        let session = Arc::new(session);
        self.sessions.lock()?.insert(session.session_id, session.clone());
        Ok(session)
    }

    pub fn get(&self, session_id: u64) -> Result<Option<Arc<Session>>> {
        Ok(self.sessions.lock()?.get(&session_id).cloned())
    }

    pub fn remove(&self, session_id: u64) -> Result<Option<Arc<Session>>> {
        Ok(self.sessions.lock()?.remove(&session_id))
    }

    /// Snapshot of the currently tracked session IDs, used by
    /// `ConnectionLifecycle::close` to log each session off in turn
    /// (spec.md §4.7).
    pub fn ids(&self) -> Result<Vec<u64>> {
        Ok(self.sessions.lock()?.keys().copied().collect())
    }
}
