//! SPNEGO token wrapping/unwrapping ([RFC 4178]), grounded on the teacher
//! pack's `GssAuthenticator::{build,parse_inital_context_token,next}`
//! (`christian-belloni-smb-rs/src/authenticator.rs`), narrowed to select
//! exactly one mechanism (NTLM) instead of trying several, and without the
//! `mechListMIC` exchange (no other mechanism is ever offered alongside
//! NTLM here, so there is nothing for a MIC to protect against downgrade
//! to).

use der::asn1::OctetStringRef;
use der::oid::ObjectIdentifier;
use der::{Decode, Encode};
use gss_api::negotiation::{NegState, NegTokenInit2, NegTokenResp, NegotiationToken};
use gss_api::InitialContextToken;

use super::ntlm::NtlmAuthenticator;
use super::{AuthenticationStep, Authenticator};
use crate::{Error, Result};

const SPNEGO_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.2");
const NTLMSSP_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.2.10");

/// Parses the server's initial negotiate token (NEGOTIATE's response
/// buffer), confirms it offers NTLM, and drives one round of NTLM to
/// produce the token for the first `SESSION_SETUP` request (spec.md §4.6
/// steps 1-2).
pub fn start(
    server_token: &[u8],
    account_name: &str,
    password: &str,
) -> Result<(Box<dyn Authenticator>, Vec<u8>)> {
    let init_token = InitialContextToken::from_der(server_token)?;
    if init_token.this_mech != SPNEGO_OID {
        return Err(Error::UnsupportedAuthenticationMechanism(
            init_token.this_mech.to_string(),
        ));
    }

    let inner = init_token.inner_context_token.to_der()?;
    let neg_init = match NegotiationToken::from_der(&inner)? {
        NegotiationToken::NegTokenInit2(init) => init,
        _ => return Err(Error::SpnegoError("expected negTokenInit2".into())),
    };
    let mech_types = neg_init
        .mech_types
        .ok_or_else(|| Error::SpnegoError("server offered no mechTypes".into()))?;
    if !mech_types.contains(&NTLMSSP_OID) {
        return Err(Error::NoSuitableAuthenticator);
    }

    let mut authenticator = NtlmAuthenticator::new(account_name, password)?;
    let first_token = match authenticator.next(&[])? {
        AuthenticationStep::NextToken(token) => token,
        AuthenticationStep::Complete { .. } => {
            return Err(Error::SpnegoError(
                "NTLM completed before a round-trip with the server".into(),
            ))
        }
    };

    let wrapped = initial_request(&first_token)?;
    Ok((Box::new(authenticator), wrapped))
}

/// Unwraps a `negTokenResp` found in a `SESSION_SETUP` response buffer,
/// returning its embedded mechanism token, if any (absent on the final
/// `STATUS_SUCCESS` response when the server has nothing left to say).
pub fn unwrap_response(buffer: &[u8]) -> Result<Option<Vec<u8>>> {
    match NegotiationToken::from_der(buffer)? {
        NegotiationToken::NegTokenResp(resp) => {
            Ok(resp.response_token.map(|t| t.as_bytes().to_vec()))
        }
        _ => Err(Error::SpnegoError("expected negTokenResp".into())),
    }
}

/// Wraps a mechanism token (or none, when the client has nothing further
/// to send) in a `negTokenResp`, for every round after the first.
pub fn wrap(mech_token: &[u8], neg_state: Option<NegState>) -> Result<Vec<u8>> {
    let resp = NegTokenResp {
        neg_state,
        supported_mech: None,
        response_token: Some(OctetStringRef::new(mech_token)?),
        mech_list_mic: None,
    };
    Ok(NegotiationToken::NegTokenResp(resp).to_der()?)
}

/// Wraps the client's first mechanism token in a `negTokenInit2` (the
/// client re-advertises the mechanism it picked, same as the server's
/// advertisement in `NEGOTIATE`'s response).
fn initial_request(mech_token: &[u8]) -> Result<Vec<u8>> {
    let init = NegTokenInit2 {
        mech_types: Some(vec![NTLMSSP_OID]),
        req_flags: None,
        neg_hints: None,
        mech_token: Some(OctetStringRef::new(mech_token)?),
        mech_list_mic: None,
    };
    let inner = NegotiationToken::NegTokenInit2(init).to_der()?;
    let outer = InitialContextToken {
        this_mech: SPNEGO_OID,
        inner_context_token: der::asn1::AnyRef::from_der(&inner)?,
    };
    Ok(outer.to_der()?)
}
