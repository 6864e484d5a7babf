//! HMAC-SHA256 message signing, grounded on the teacher's
//! `crypto::signing::hmac_signer` module, collapsed from a
//! `Box<dyn SigningAlgo>` trait object (which existed to let callers pick
//! among HMAC/CMAC/GMAC at runtime) to two free functions: this crate
//! supports exactly one algorithm.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{SigningKey, SIGNATURE_LEN, SIGNATURE_OFFSET};
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

fn new_mac(key: &SigningKey) -> HmacSha256 {
    // A 16-byte key is always valid for HMAC-SHA256; the underlying
    // crate only errors on malformed *variable*-length keys.
    HmacSha256::new_from_slice(key).expect("16-byte key is always valid for HMAC-SHA256")
}

/// Signs `message` in place: zeroes the header's `Signature` field,
/// computes HMAC-SHA256 over the whole buffer, and writes the first 16
/// bytes of the digest back into that field ([MS-SMB2] 3.1.4.1).
pub fn sign(message: &mut [u8], key: &SigningKey) -> Result<()> {
    if message.len() < SIGNATURE_OFFSET + SIGNATURE_LEN {
        return Err(Error::InvalidMessage(
            "message too short to contain a signature field".into(),
        ));
    }
    message[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN].fill(0);
    let mut mac = new_mac(key);
    mac.update(message);
    let digest = mac.finalize().into_bytes();
    message[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN]
        .copy_from_slice(&digest[..SIGNATURE_LEN]);
    Ok(())
}

/// Verifies a received message's signature, recomputing it with the
/// signature field zeroed and comparing against the value that was
/// actually on the wire.
pub fn verify(message: &[u8], key: &SigningKey) -> Result<bool> {
    if message.len() < SIGNATURE_OFFSET + SIGNATURE_LEN {
        return Err(Error::InvalidMessage(
            "message too short to contain a signature field".into(),
        ));
    }
    let received = &message[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN];
    let mut zeroed = message.to_vec();
    zeroed[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN].fill(0);
    let mut mac = new_mac(key);
    mac.update(&zeroed);
    let digest = mac.finalize().into_bytes();
    Ok(&digest[..SIGNATURE_LEN] == received)
}
