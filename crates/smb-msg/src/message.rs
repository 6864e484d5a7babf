//! The top-level request/response envelope: a [`Header`] plus a body whose
//! shape depends on the header's `command`.

use binrw::prelude::*;

use crate::error::ErrorResponse;
use crate::header::{Command, Header};
use crate::negotiate::{NegotiateRequest, NegotiateResponse};
use crate::session_setup::{LogoffRequest, LogoffResponse, SessionSetupRequest, SessionSetupResponse};

#[binrw::binrw]
#[derive(Debug)]
#[br(import(command: Command))]
pub enum RequestContent {
    #[br(pre_assert(command == Command::NEGOTIATE))]
    Negotiate(NegotiateRequest),
    #[br(pre_assert(command == Command::SESSION_SETUP))]
    SessionSetup(SessionSetupRequest),
    #[br(pre_assert(command == Command::LOGOFF))]
    Logoff(LogoffRequest),
}

impl RequestContent {
    pub fn command(&self) -> Command {
        match self {
            RequestContent::Negotiate(_) => Command::NEGOTIATE,
            RequestContent::SessionSetup(_) => Command::SESSION_SETUP,
            RequestContent::Logoff(_) => Command::LOGOFF,
        }
    }
}

impl From<NegotiateRequest> for RequestContent {
    fn from(value: NegotiateRequest) -> Self {
        RequestContent::Negotiate(value)
    }
}

impl From<SessionSetupRequest> for RequestContent {
    fn from(value: SessionSetupRequest) -> Self {
        RequestContent::SessionSetup(value)
    }
}

impl From<LogoffRequest> for RequestContent {
    fn from(value: LogoffRequest) -> Self {
        RequestContent::Logoff(value)
    }
}

/// A response body. Any non-success status still carries a command-shaped
/// body per [MS-SMB2] 3.3.4.1, *except* that servers commonly substitute an
/// [`ErrorResponse`] body for any command on failure — that substitution is
/// resolved by [`PlainResponse`] rather than here, since it depends on the
/// header's status, not just its command.
#[binrw::binrw]
#[derive(Debug)]
#[br(import(command: Command))]
pub enum ResponseContent {
    #[br(pre_assert(command == Command::NEGOTIATE))]
    Negotiate(NegotiateResponse),
    #[br(pre_assert(command == Command::SESSION_SETUP))]
    SessionSetup(SessionSetupResponse),
    #[br(pre_assert(command == Command::LOGOFF))]
    Logoff(LogoffResponse),
    Error(ErrorResponse),
}

impl From<NegotiateResponse> for ResponseContent {
    fn from(value: NegotiateResponse) -> Self {
        ResponseContent::Negotiate(value)
    }
}

impl From<SessionSetupResponse> for ResponseContent {
    fn from(value: SessionSetupResponse) -> Self {
        ResponseContent::SessionSetup(value)
    }
}

impl From<LogoffResponse> for ResponseContent {
    fn from(value: LogoffResponse) -> Self {
        ResponseContent::Logoff(value)
    }
}

impl From<ErrorResponse> for ResponseContent {
    fn from(value: ErrorResponse) -> Self {
        ResponseContent::Error(value)
    }
}

#[binrw::binrw]
#[derive(Debug)]
#[brw(little)]
pub struct PlainRequest {
    pub header: Header,
    #[br(args(header.command))]
    pub content: RequestContent,
}

/// A full response: header plus body. A non-success status commonly comes
/// with an [`ErrorResponse`] body instead of the command-shaped one
/// ([MS-SMB2] 2.2.2), so the body is parsed as [`ErrorResponse`] whenever
/// the status is neither success nor a command-specific "expected failure"
/// (`STATUS_MORE_PROCESSING_REQUIRED` during SESSION_SETUP, `STATUS_PENDING`
/// for an async interim response).
#[derive(Debug)]
pub struct PlainResponse {
    pub header: Header,
    pub content: ResponseContent,
}

impl BinRead for PlainResponse {
    type Args<'a> = ();

    fn read_options<R: binrw::io::Read + binrw::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let header = Header::read_options(reader, endian, ())?;
        let content = if header.status == crate::header::Status::SUCCESS
            || header.status == crate::header::Status::MORE_PROCESSING_REQUIRED
            || header.status == crate::header::Status::PENDING
        {
            ResponseContent::read_options(reader, endian, (header.command,))?
        } else {
            ErrorResponse::read_options(reader, endian, ())?.into()
        };
        Ok(PlainResponse { header, content })
    }
}

impl BinWrite for PlainResponse {
    type Args<'a> = ();

    fn write_options<W: binrw::io::Write + binrw::io::Seek>(
        &self,
        writer: &mut W,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.header.write_options(writer, endian, ())?;
        match &self.content {
            ResponseContent::Error(e) => e.write_options(writer, endian, ()),
            other => other.write_options(writer, endian, ()),
        }
    }
}
