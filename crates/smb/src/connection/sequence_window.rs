//! The credit-based message-ID allocator ([MS-SMB2] 3.1.5.2, 3.2.5.1.4).
//!
//! A connection holds exactly one of these. It is guarded by a plain
//! `std::sync::Mutex`: `get`/`credits_granted` are short, non-blocking
//! critical sections invoked from both the async send path and the receive
//! task, so there is no value in paying for an async mutex here.

use std::sync::Mutex;

use crate::{Error, Result};

/// A single unit of server-granted work, per [MS-SMB2] 3.1.5.2: every SMB2
/// request must be covered by at least one credit, and large requests (or
/// responses) consume credits in proportion to their size.
#[derive(Debug, Default)]
pub struct SequenceWindow {
    state: Mutex<WindowState>,
}

#[derive(Debug, Default, Clone, Copy)]
struct WindowState {
    next_id: u64,
    available_credits: u16,
}

impl SequenceWindow {
    /// A single credit covers this many octets of request or response
    /// payload ([MS-SMB2] 3.1.5.2).
    pub const SINGLE_CREDIT_PAYLOAD_SIZE: u32 = 65536;

    /// The client tries to keep its credit balance above this value by
    /// requesting more whenever it sends.
    pub const PREFERRED_MINIMUM_CREDITS: u16 = 512;

    pub fn new() -> Self {
        Self::default()
    }

    /// Credits available for immediate allocation.
    pub fn available(&self) -> crate::Result<u16> {
        Ok(self.state.lock()?.available_credits)
    }

    /// Sets the initial credit balance, granted by the server's NEGOTIATE
    /// response (which always carries an implicit credit of 1, see
    /// [MS-SMB2] 3.2.5.2).
    pub fn set_initial_credits(&self, credits: u16) -> crate::Result<()> {
        self.state.lock()?.available_credits = credits;
        Ok(())
    }

    /// Allocates `n` contiguous message IDs and debits `n` credits.
    ///
    /// Returns the first ID of the contiguous range `[id, id + n)`. Per
    /// spec, issued IDs are never reused and allocation always advances
    /// `next_id`, regardless of whether `n` exceeds the current credit
    /// balance (the caller is expected to have sized `n` using
    /// [`Self::available`] beforehand; see `Connection::sendo` in
    /// `crate::connection` for the policy on sending with zero credits).
    pub fn get(&self, n: u16) -> Result<u64> {
        if n == 0 {
            return Err(Error::InvalidState(
                "sequence window allocation of zero IDs requested".into(),
            ));
        }
        let mut state = self.state.lock()?;
        let id = state.next_id;
        state.next_id = state
            .next_id
            .checked_add(n as u64)
            .ok_or_else(|| Error::InvalidState("message ID space exhausted".into()))?;
        state.available_credits = state.available_credits.saturating_sub(n);
        Ok(id)
    }

    /// Returns `k` credits to the window, as reported by a response's
    /// `CreditResponse` field. `k == 0` is a no-op.
    pub fn credits_granted(&self, k: u16) -> Result<()> {
        if k == 0 {
            return Ok(());
        }
        let mut state = self.state.lock()?;
        state.available_credits = state.available_credits.saturating_add(k);
        Ok(())
    }
}
