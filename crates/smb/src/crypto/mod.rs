//! Packet signing (spec.md §4.4/§4.6, [MS-SMB2] 3.1.4.1).
//!
//! The teacher supports three signing algorithms plus encryption; both
//! the GMAC/CMAC algorithms and all of encryption rode on AES-GCM/AES-CCM
//! support that has no counterpart in spec.md's scope, so only the
//! HMAC-SHA256 path survives the cut (see `DESIGN.md`).

pub mod signing;

pub type SigningKey = [u8; 16];

/// Byte offset of the `Signature` field within a serialized 64-byte
/// [`smb_msg::Header`]: 4 (protocol ID) + 2 + 2 + 4 + 2 + 2 + 4 + 4 + 8 + 4
/// + 4 + 8 bytes of the preceding fields.
pub const SIGNATURE_OFFSET: usize = 48;
pub const SIGNATURE_LEN: usize = 16;
