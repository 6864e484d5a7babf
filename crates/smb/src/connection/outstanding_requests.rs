//! Correlates in-flight `MessageId`s to the caller awaiting their response
//! (spec.md §3/§4.4).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use smb_msg::Command;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::msg_handler::IncomingMessage;
use crate::{Error, Result};

/// An in-flight request, owned by [`OutstandingRequests`] from registration
/// until its promise is fulfilled or the connection errors out.
///
/// `command` stands in for spec.md §3's `packet` field: the engine never
/// needs the full serialized request again once it's on the wire, only
/// enough to log/diagnose what it was.
pub struct Request {
    pub message_id: u64,
    pub correlation_id: Uuid,
    pub command: Command,
    pub sent_at: Instant,
    /// Set once a `STATUS_PENDING` + `SMB2_FLAGS_ASYNC_COMMAND` interim
    /// response names this request's `AsyncId` (spec.md §4.4 step 4).
    pub async_id: Option<u64>,
    responder: oneshot::Sender<Result<IncomingMessage>>,
}

#[derive(Default)]
pub struct OutstandingRequests {
    by_message_id: Mutex<HashMap<u64, Request>>,
    by_async_id: Mutex<HashMap<u64, u64>>,
}

impl OutstandingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly sent request, returning the receiver half of its
    /// promise.
    pub fn register_outstanding(
        &self,
        message_id: u64,
        command: Command,
    ) -> Result<oneshot::Receiver<Result<IncomingMessage>>> {
        let (tx, rx) = oneshot::channel();
        let request = Request {
            message_id,
            correlation_id: Uuid::new_v4(),
            command,
            sent_at: Instant::now(),
            async_id: None,
            responder: tx,
        };
        self.by_message_id.lock()?.insert(message_id, request);
        Ok(rx)
    }

    pub fn is_outstanding(&self, message_id: u64) -> Result<bool> {
        Ok(self.by_message_id.lock()?.contains_key(&message_id))
    }

    /// Records the `AsyncId` of an interim `STATUS_PENDING` response
    /// (spec.md §4.4 step 4). The request remains outstanding.
    pub fn set_async_id(&self, message_id: u64, async_id: u64) -> Result<()> {
        let mut by_id = self.by_message_id.lock()?;
        let request = by_id
            .get_mut(&message_id)
            .ok_or(Error::UnexpectedMessageId(message_id, message_id))?;
        request.async_id = Some(async_id);
        drop(by_id);
        self.by_async_id.lock()?.insert(async_id, message_id);
        Ok(())
    }

    /// Removes and returns the request for `message_id`, if any is
    /// outstanding, along with its `async_id` mapping.
    pub fn received_response_for(&self, message_id: u64) -> Result<Option<Request>> {
        let request = self.by_message_id.lock()?.remove(&message_id);
        if let Some(request) = &request {
            if let Some(async_id) = request.async_id {
                self.by_async_id.lock()?.remove(&async_id);
            }
        }
        Ok(request)
    }

    /// Delivers a terminal response to the request registered under
    /// `message_id`, removing it from the table. Fails with
    /// [`Error::UnexpectedMessageId`] if the ID is not outstanding
    /// (spec.md §4.4 step 1).
    pub fn resolve(&self, message_id: u64, response: Result<IncomingMessage>) -> Result<()> {
        let request = self
            .received_response_for(message_id)?
            .ok_or(Error::UnexpectedMessageId(message_id, message_id))?;
        // The caller may have dropped its receiver (e.g. after a timeout);
        // that's not this module's error to report.
        let _ = request.responder.send(response);
        Ok(())
    }

    /// Fails every pending promise with `err` and clears the tables
    /// (spec.md §4.7 `handleError`).
    pub fn handle_error(&self, err: &Error) -> Result<()> {
        let mut by_id = self.by_message_id.lock()?;
        for (_, request) in by_id.drain() {
            let _ = request
                .responder
                .send(Err(Error::connection_closed(err)));
        }
        drop(by_id);
        self.by_async_id.lock()?.clear();
        Ok(())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_message_id.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smb_msg::{Header, HeaderFlags, PlainResponse, ResponseContent, Status};

    fn fake_incoming(message_id: u64) -> IncomingMessage {
        let header = Header {
            credit_charge: 1,
            status: Status::SUCCESS,
            command: Command::NEGOTIATE,
            credit_request: 1,
            flags: HeaderFlags::new(),
            next_command: 0,
            message_id,
            reserved: 0,
            tree_id: 0,
            session_id: 0,
            signature: [0; 16],
        };
        IncomingMessage {
            header,
            content: ResponseContent::Negotiate(
                smb_msg::NegotiateResponse {
                    security_mode: Default::default(),
                    dialect_revision: smb_msg::NegotiateDialect::Smb0300,
                    server_guid: Default::default(),
                    capabilities: Default::default(),
                    max_transact_size: 0,
                    max_read_size: 0,
                    max_write_size: 0,
                    system_time: 0,
                    server_start_time: 0,
                    buffer: vec![],
                },
            ),
            signed: false,
        }
    }

    #[tokio::test]
    async fn registered_request_is_outstanding_until_resolved() {
        let reqs = OutstandingRequests::new();
        let rx = reqs.register_outstanding(7, Command::NEGOTIATE).unwrap();
        assert!(reqs.is_outstanding(7).unwrap());
        reqs.resolve(7, Ok(fake_incoming(7))).unwrap();
        assert!(!reqs.is_outstanding(7).unwrap());
        let resp = rx.await.unwrap().unwrap();
        assert_eq!(resp.header.message_id, 7);
    }

    #[tokio::test]
    async fn async_pending_keeps_request_outstanding() {
        let reqs = OutstandingRequests::new();
        let _rx = reqs.register_outstanding(3, Command::NEGOTIATE).unwrap();
        reqs.set_async_id(3, 0xABCD).unwrap();
        assert!(reqs.is_outstanding(3).unwrap());
        let req = reqs.received_response_for(3).unwrap().unwrap();
        assert_eq!(req.async_id, Some(0xABCD));
    }

    #[tokio::test]
    async fn resolving_unknown_message_id_is_an_error() {
        let reqs = OutstandingRequests::new();
        assert!(reqs.resolve(99, Ok(fake_incoming(99))).is_err());
    }

    #[tokio::test]
    async fn handle_error_fails_every_pending_promise() {
        let reqs = OutstandingRequests::new();
        let rx1 = reqs.register_outstanding(1, Command::NEGOTIATE).unwrap();
        let rx2 = reqs.register_outstanding(2, Command::NEGOTIATE).unwrap();
        reqs.handle_error(&Error::NotConnected).unwrap();
        assert_eq!(reqs.len(), 0);
        assert!(rx1.await.unwrap().is_err());
        assert!(rx2.await.unwrap().is_err());
    }
}
