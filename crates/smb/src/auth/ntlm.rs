//! The one [`Authenticator`] this crate ships: NTLM via the `sspi` crate.
//!
//! Grounded on the teacher pack's `NtlmGssAuthSession` (found in
//! `christian-belloni-smb-rs/src/authenticator.rs`), narrowed to the
//! synchronous `resolve_to_result` path — NTLM never needs a network
//! round-trip mid-handshake, unlike Kerberos, so there's no reason to
//! thread a generator/executor through it.

use sspi::{
    AcquireCredentialsHandleResult, AuthIdentity, ClientRequestFlags, CredentialUse,
    CredentialsBuffers, DataRepresentation, InitializeSecurityContextResult, Ntlm, Secret,
    SecurityBuffer, SecurityBufferType, Sspi, SspiImpl, Username,
};

use super::{AuthenticationStep, Authenticator};
use crate::{Error, Result};

pub struct NtlmAuthenticator {
    ntlm: Ntlm,
    target_name: String,
    acquired: AcquireCredentialsHandleResult<Option<CredentialsBuffers>>,
    last_state: Option<InitializeSecurityContextResult>,
}

impl NtlmAuthenticator {
    pub fn new(account_name: &str, password: &str) -> Result<Self> {
        let username = Username::parse(account_name)
            .map_err(|e| Error::UnsupportedAuthenticationMechanism(e.to_string()))?;
        let target_name = username.account_name().to_string();
        let identity = AuthIdentity {
            username,
            password: Secret::new(password.to_string()),
        };
        let mut ntlm = Ntlm::new();
        let acquired = ntlm
            .acquire_credentials_handle()
            .with_credential_use(CredentialUse::Outbound)
            .with_auth_data(&sspi::Credentials::AuthIdentity(identity))
            .execute(&mut ntlm)?;
        Ok(NtlmAuthenticator {
            ntlm,
            target_name,
            acquired,
            last_state: None,
        })
    }
}

impl Authenticator for NtlmAuthenticator {
    fn next(&mut self, server_token: &[u8]) -> Result<AuthenticationStep> {
        let mut output_buffer = vec![SecurityBuffer::new(Vec::new(), SecurityBufferType::Token)];

        let mut builder = self
            .ntlm
            .initialize_security_context()
            .with_credentials_handle(&mut self.acquired.credentials_handle)
            .with_context_requirements(
                ClientRequestFlags::INTEGRITY
                    | ClientRequestFlags::MUTUAL_AUTH
                    | ClientRequestFlags::ALLOCATE_MEMORY,
            )
            .with_target_data_representation(DataRepresentation::Native)
            .with_target_name(&self.target_name)
            .with_output(&mut output_buffer);

        let mut input_buffers;
        if !server_token.is_empty() {
            input_buffers = vec![SecurityBuffer::new(
                server_token.to_vec(),
                SecurityBufferType::Token,
            )];
            builder = builder.with_input(&mut input_buffers);
        }

        let state = self
            .ntlm
            .initialize_security_context_impl(&mut builder)?
            .resolve_to_result()?;
        self.last_state = Some(state);

        let out_token = output_buffer
            .pop()
            .map(|b| b.buffer)
            .ok_or_else(|| Error::SpnegoError("NTLM produced no output token".into()))?;

        match self.last_state.as_ref().unwrap().status {
            sspi::SecurityStatus::Ok => Ok(AuthenticationStep::Complete {
                session_key: self.session_key()?,
            }),
            sspi::SecurityStatus::ContinueNeeded => Ok(AuthenticationStep::NextToken(out_token)),
            other => Err(Error::SpnegoError(format!(
                "unexpected NTLM security status: {other:?}"
            ))),
        }
    }

    fn is_authenticated(&self) -> bool {
        matches!(
            self.last_state.as_ref().map(|s| s.status),
            Some(sspi::SecurityStatus::Ok)
        )
    }

    fn session_key(&self) -> Result<[u8; 16]> {
        let key = self
            .ntlm
            .session_key()
            .ok_or_else(|| Error::SpnegoError("no NTLM session key available".into()))?;
        key[..16]
            .try_into()
            .map_err(|_| Error::SpnegoError("NTLM session key shorter than 16 bytes".into()))
    }
}
