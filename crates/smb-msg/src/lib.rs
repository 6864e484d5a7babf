//! On-wire SMB2 message types: the 64-byte header, the NEGOTIATE and
//! SESSION_SETUP/LOGOFF bodies, and the generic ERROR response body. This
//! crate only models the commands the connection engine itself drives —
//! higher-level commands (tree connect, create, read/write, ...) are not
//! represented here.

pub mod error;
pub mod header;
pub mod message;
pub mod negotiate;
pub mod session_setup;

pub use error::*;
pub use header::*;
pub use message::*;
pub use negotiate::*;
pub use session_setup::*;

use binrw::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum SmbMsgError {
    #[error("binrw error: {0}")]
    BinRW(#[from] binrw::Error),
    #[error("invalid dialect value: {0:?}")]
    InvalidDialect(NegotiateDialect),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, SmbMsgError>;

/// Parses bytes into a full response (header + content).
pub fn decode_response(bytes: &[u8]) -> Result<PlainResponse> {
    let mut cursor = std::io::Cursor::new(bytes);
    Ok(PlainResponse::read(&mut cursor)?)
}

/// Parses bytes into a full request (header + content).
pub fn decode_request(bytes: &[u8]) -> Result<PlainRequest> {
    let mut cursor = std::io::Cursor::new(bytes);
    Ok(PlainRequest::read(&mut cursor)?)
}

/// Builds a minimal default [`Header`] carrying `content`'s command and
/// serializes the resulting [`PlainRequest`] to bytes. Used directly by
/// tests; [`crate::message::PlainRequest`] is built with a real header by
/// callers that need to customize message ID, credits, signing, etc.
pub fn encode_content(content: RequestContent) -> Vec<u8> {
    let header = Header {
        credit_charge: 0,
        status: Status::SUCCESS,
        command: content.command(),
        credit_request: 1,
        flags: HeaderFlags::new(),
        next_command: 0,
        message_id: 0,
        reserved: 0,
        tree_id: 0,
        session_id: 0,
        signature: [0; 16],
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    PlainRequest { header, content }
        .write(&mut cursor)
        .expect("in-memory write never fails");
    cursor.into_inner()
}
