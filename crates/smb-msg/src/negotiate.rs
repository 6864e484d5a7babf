//! The NEGOTIATE request/response pair that opens dialect negotiation.

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use smb_dtyp::{Guid, binrw_util::prelude::*};

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct NegotiateSecurityMode {
    pub signing_enabled: bool,
    pub signing_required: bool,
    #[skip]
    __: B14,
}

#[bitfield]
#[derive(BinWrite, BinRead, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct GlobalCapabilities {
    pub dfs: bool,
    pub leasing: bool,
    pub large_mtu: bool,
    pub multi_channel: bool,

    pub persistent_handles: bool,
    pub directory_leasing: bool,
    pub encryption: bool,
    pub notifications: bool,

    #[skip]
    __: B24,
}

/// A dialect the client is willing to negotiate. Unlike [`NegotiateDialect`],
/// this is never a wildcard — it's what a successful negotiation settles on.
#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[brw(repr(u16))]
pub enum Dialect {
    Smb0202 = 0x0202,
    Smb021 = 0x0210,
    Smb0300 = 0x0300,
    Smb0302 = 0x0302,
    Smb0311 = 0x0311,
}

impl Dialect {
    pub const MIN: Dialect = Dialect::Smb0202;
    pub const MAX: Dialect = Dialect::Smb0311;
    pub const ALL: [Dialect; 5] = [
        Dialect::Smb0202,
        Dialect::Smb021,
        Dialect::Smb0300,
        Dialect::Smb0302,
        Dialect::Smb0311,
    ];

    pub fn is_smb3(&self) -> bool {
        matches!(self, Dialect::Smb0300 | Dialect::Smb0302 | Dialect::Smb0311)
    }
}

/// The dialect value as it appears on the wire for a NEGOTIATE *response*,
/// which may also carry the SMB 2.0.2-family wildcard used by older
/// multi-protocol negotiation.
#[derive(BinRead, BinWrite, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[brw(repr(u16))]
pub enum NegotiateDialect {
    Smb0202 = Dialect::Smb0202 as isize,
    Smb021 = Dialect::Smb021 as isize,
    Smb0300 = Dialect::Smb0300 as isize,
    Smb0302 = Dialect::Smb0302 as isize,
    Smb0311 = Dialect::Smb0311 as isize,
    Smb02Wildcard = 0x02FF,
}

impl TryFrom<NegotiateDialect> for Dialect {
    type Error = crate::SmbMsgError;

    fn try_from(value: NegotiateDialect) -> Result<Self, Self::Error> {
        match value {
            NegotiateDialect::Smb0202 => Ok(Dialect::Smb0202),
            NegotiateDialect::Smb021 => Ok(Dialect::Smb021),
            NegotiateDialect::Smb0300 => Ok(Dialect::Smb0300),
            NegotiateDialect::Smb0302 => Ok(Dialect::Smb0302),
            NegotiateDialect::Smb0311 => Ok(Dialect::Smb0311),
            NegotiateDialect::Smb02Wildcard => Err(Self::Error::InvalidDialect(value)),
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct NegotiateRequest {
    #[bw(calc = 36)]
    #[br(assert(_structure_size == 36))]
    _structure_size: u16,
    #[bw(try_calc(u16::try_from(dialects.len())))]
    dialect_count: u16,
    pub security_mode: NegotiateSecurityMode,
    #[bw(calc = 0)]
    _reserved: u16,
    pub capabilities: GlobalCapabilities,
    pub client_guid: Guid,
    #[bw(calc = 0)]
    _negotiate_context_offset: u32,
    #[bw(calc = 0)]
    _negotiate_context_count: u16,
    #[bw(calc = 0)]
    _reserved2: u16,
    #[br(count = dialect_count)]
    pub dialects: Vec<Dialect>,
}

impl NegotiateRequest {
    pub fn new(dialects: Vec<Dialect>, client_guid: Guid, signing_required: bool) -> Self {
        NegotiateRequest {
            security_mode: NegotiateSecurityMode::new()
                .with_signing_enabled(true)
                .with_signing_required(signing_required),
            capabilities: GlobalCapabilities::new()
                .with_dfs(true)
                .with_large_mtu(true),
            client_guid,
            dialects,
        }
    }
}

#[binrw::binrw]
#[derive(Debug, PartialEq, Eq)]
pub struct NegotiateResponse {
    #[bw(calc = 65)]
    #[br(assert(_structure_size == 65))]
    _structure_size: u16,
    pub security_mode: NegotiateSecurityMode,
    pub dialect_revision: NegotiateDialect,
    #[bw(calc = 0)]
    _negotiate_context_count: u16,
    pub server_guid: Guid,
    pub capabilities: GlobalCapabilities,
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    pub system_time: u64,
    pub server_start_time: u64,
    #[bw(calc = PosMarker::default())]
    _security_buffer_offset: PosMarker<u16>,
    #[bw(try_calc(u16::try_from(buffer.len())))]
    security_buffer_length: u16,
    #[bw(calc = 0)]
    _negotiate_context_offset: u32,
    #[br(count = security_buffer_length)]
    #[bw(write_with = PosMarker::write_aoff, args(&_security_buffer_offset))]
    pub buffer: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode_request, encode_content};

    #[test]
    fn negotiate_request_round_trips_dialect_list() {
        let req = NegotiateRequest::new(
            vec![Dialect::Smb0202, Dialect::Smb0300, Dialect::Smb0311],
            Guid::ZERO,
            false,
        );
        let bytes = encode_content(req.into());
        let decoded = decode_request(&bytes).unwrap();
        match decoded.content {
            crate::RequestContent::Negotiate(n) => {
                assert_eq!(n.dialects.len(), 3);
                assert!(n.capabilities.large_mtu());
            }
            _ => panic!("unexpected content"),
        }
    }
}
