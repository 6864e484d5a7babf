//! The SMB2 packet header, common to every request and response.

use binrw::prelude::*;
use modular_bitfield::prelude::*;

/// The command a header's body carries.
///
/// Modeled as an open `u16` rather than a closed enum, like [`Status`]:
/// a header must parse regardless of which of the ~20 SMB2 commands it
/// names, even though this crate only models the bodies of the three the
/// connection engine itself drives (an `ErrorResponse` body, the common
/// case for a non-success status, carries the original command unchanged).
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[brw(little)]
pub struct Command(pub u16);

impl Command {
    pub const NEGOTIATE: Command = Command(0x00);
    pub const SESSION_SETUP: Command = Command(0x01);
    pub const LOGOFF: Command = Command(0x02);
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            Command::NEGOTIATE => "Negotiate",
            Command::SESSION_SETUP => "Session Setup",
            Command::LOGOFF => "Logoff",
            _ => "Unknown",
        };
        write!(f, "{name} ({:#x})", self.0)
    }
}

/// An NT status code, as found in the header's `status` field.
///
/// Modeled as an open `u32` rather than a closed enum: a connection must be
/// able to pass through *any* status the server returns (including vendor
/// and rarely-seen ones) without failing to parse the header, per
/// [MS-SMB2] 2.2.1's treatment of `Status` as an opaque NTSTATUS.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[brw(little)]
pub struct Status(pub u32);

impl Status {
    pub const SUCCESS: Status = Status(0x0000_0000);
    pub const PENDING: Status = Status(0x0000_0103);
    pub const MORE_PROCESSING_REQUIRED: Status = Status(0xC000_0016);
    pub const NETWORK_SESSION_EXPIRED: Status = Status(0xC000_035C);
    pub const ACCESS_DENIED: Status = Status(0xC000_0022);
    pub const OBJECT_NAME_NOT_FOUND: Status = Status(0xC000_0034);
    pub const LOGON_FAILURE: Status = Status(0xC000_006D);

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl From<u32> for Status {
    fn from(value: u32) -> Self {
        Status(value)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct HeaderFlags {
    pub server_to_redir: bool,
    pub async_command: bool,
    pub related_operations: bool,
    pub signed: bool,
    pub priority_mask: B3,
    #[skip]
    __: B21,
    pub dfs_operations: bool,
    pub replay_operation: bool,
    #[skip]
    __: B2,
}

/// The 64-byte SMB2 header. Identical layout for requests and responses.
#[binrw::binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
#[brw(magic(b"\xfeSMB"), little)]
pub struct Header {
    #[bw(calc = Self::STRUCT_SIZE as u16)]
    #[br(assert(_structure_size == Self::STRUCT_SIZE as u16))]
    _structure_size: u16,
    pub credit_charge: u16,
    pub status: Status,
    pub command: Command,
    pub credit_request: u16,
    pub flags: HeaderFlags,
    pub next_command: u32,
    pub message_id: u64,
    /// `Reserved` for a sync header; the low 32 bits of `AsyncId` for an
    /// async one (MS-SMB2 2.2.1.2). Only meaningful combined with `tree_id`
    /// via [`Header::async_id`] when `flags.async_command()` is set.
    pub reserved: u32,
    /// `TreeId` for a sync header; the high 32 bits of `AsyncId` for an
    /// async one.
    pub tree_id: u32,
    pub session_id: u64,
    pub signature: [u8; 16],
}

impl Header {
    pub const STRUCT_SIZE: usize = 64;

    pub fn async_id(&self) -> u64 {
        ((self.tree_id as u64) << 32) | (self.reserved as u64)
    }
}
