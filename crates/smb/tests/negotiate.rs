//! End-to-end coverage of `Connection::connect` over a real TCP loopback
//! socket, driven by a scripted fake server. Only NEGOTIATE is exercised
//! here since it needs no NTLM material to fake convincingly; see
//! `connection::receive_path_tests` inside `src/connection/mod.rs` for
//! white-box coverage of ReceivePath dispatch that would otherwise need
//! real session keys.

use std::time::Duration;

use binrw::BinWrite;
use smb::auth::{AuthenticationStep, Authenticator};
use smb::connection::{Connection, ConnectionConfig};
use smb_dtyp::Guid;
use smb_msg::{
    Command, Dialect, GlobalCapabilities, Header, HeaderFlags, NegotiateDialect,
    NegotiateResponse, NegotiateSecurityMode, PlainResponse, RequestContent, ResponseContent,
    SessionFlags, SessionSetupResponse, Status,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

async fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut len_prefix = [0u8; 4];
    stream.read_exact(&mut len_prefix).await.unwrap();
    let len = u32::from_be_bytes(len_prefix) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.unwrap();
    buf
}

async fn write_frame(stream: &mut TcpStream, bytes: &[u8]) {
    stream
        .write_all(&(bytes.len() as u32).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(bytes).await.unwrap();
}

fn negotiate_response_header(message_id: u64, status: Status) -> Header {
    Header {
        credit_charge: 1,
        status,
        command: smb_msg::Command::NEGOTIATE,
        credit_request: 1,
        flags: HeaderFlags::new(),
        next_command: 0,
        message_id,
        reserved: 0,
        tree_id: 0,
        session_id: 0,
        signature: [0; 16],
    }
}

fn negotiate_response_body() -> NegotiateResponse {
    NegotiateResponse {
        security_mode: NegotiateSecurityMode::new(),
        dialect_revision: NegotiateDialect::Smb0300,
        server_guid: Guid::gen(),
        capabilities: GlobalCapabilities::new().with_large_mtu(true),
        max_transact_size: 0x10_0000,
        max_read_size: 0x10_0000,
        max_write_size: 0x10_0000,
        system_time: 0,
        server_start_time: 0,
        buffer: Vec::new(),
    }
}

fn encode_plain_response(header: Header, content: ResponseContent) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    PlainResponse { header, content }.write(&mut cursor).unwrap();
    cursor.into_inner()
}

/// S1: a single NEGOTIATE request/response round trip. `connect` succeeds
/// and publishes the negotiated dialect and capabilities.
#[tokio::test]
async fn negotiate_only_round_trip_publishes_connection_info() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let req_bytes = read_frame(&mut sock).await;
        let req = smb_msg::decode_request(&req_bytes).unwrap();
        assert!(matches!(req.content, RequestContent::Negotiate(_)));

        let header = negotiate_response_header(req.header.message_id, Status::SUCCESS);
        let body = encode_plain_response(header, ResponseContent::Negotiate(negotiate_response_body()));
        write_frame(&mut sock, &body).await;
        sock
    });

    let config = ConnectionConfig {
        port: Some(addr.port()),
        timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let conn = Connection::connect("127.0.0.1", config).await.unwrap();

    let info = conn.info().unwrap();
    assert_eq!(info.dialect, Dialect::Smb0300);
    assert!(info.capabilities.large_mtu());

    server.await.unwrap();
}

/// S4: the server sends an interim `STATUS_PENDING`/`ASYNC_COMMAND`
/// response before the real NEGOTIATE response. `connect` still succeeds,
/// having transparently waited out the interim.
#[tokio::test]
async fn negotiate_tolerates_an_async_pending_interim_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let req_bytes = read_frame(&mut sock).await;
        let req = smb_msg::decode_request(&req_bytes).unwrap();
        let message_id = req.header.message_id;

        let mut pending_header = negotiate_response_header(message_id, Status::PENDING);
        pending_header.flags = pending_header.flags.with_async_command(true);
        pending_header.reserved = 0x1111;
        pending_header.tree_id = 0x2222;
        let pending_body =
            encode_plain_response(pending_header, ResponseContent::Negotiate(negotiate_response_body()));
        write_frame(&mut sock, &pending_body).await;

        tokio::time::sleep(Duration::from_millis(20)).await;

        let header = negotiate_response_header(message_id, Status::SUCCESS);
        let body = encode_plain_response(header, ResponseContent::Negotiate(negotiate_response_body()));
        write_frame(&mut sock, &body).await;
        sock
    });

    let config = ConnectionConfig {
        port: Some(addr.port()),
        timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let conn = Connection::connect("127.0.0.1", config).await.unwrap();
    assert_eq!(conn.info().unwrap().dialect, Dialect::Smb0300);

    server.await.unwrap();
}

fn session_setup_response_header(message_id: u64, session_id: u64, status: Status) -> Header {
    Header {
        credit_charge: 1,
        status,
        command: Command::SESSION_SETUP,
        credit_request: 1,
        flags: HeaderFlags::new(),
        next_command: 0,
        message_id,
        reserved: 0,
        tree_id: 0,
        session_id,
        signature: [0; 16],
    }
}

/// A stub mechanism that ignores whatever bytes it's fed and completes
/// after exactly one round trip, standing in for NTLM so this test can
/// exercise the `SESSION_SETUP` round loop's table bookkeeping without a
/// real cryptographic handshake.
struct StubAuthenticator {
    rounds: u32,
}

impl Authenticator for StubAuthenticator {
    fn next(&mut self, _server_token: &[u8]) -> smb::Result<AuthenticationStep> {
        self.rounds += 1;
        if self.rounds == 1 {
            Ok(AuthenticationStep::NextToken(vec![0xAA]))
        } else {
            Ok(AuthenticationStep::Complete {
                session_key: [9u8; 16],
            })
        }
    }

    fn is_authenticated(&self) -> bool {
        self.rounds >= 2
    }

    fn session_key(&self) -> smb::Result<[u8; 16]> {
        Ok([9u8; 16])
    }
}

/// S5: a two-round `SESSION_SETUP` exchange (`STATUS_MORE_PROCESSING_REQUIRED`
/// then `STATUS_SUCCESS`). Per invariant 6 (spec.md §4.6), the session lives
/// in `PreauthSessionTable` after round one and is promoted into
/// `SessionTable` (and dropped from the preauth table) only after round two.
#[tokio::test]
async fn authenticate_promotes_session_from_preauth_to_established_table() {
    const SESSION_ID: u64 = 0x4242;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (round1_sent_tx, round1_sent_rx) = oneshot::channel::<()>();
    let (checked_tx, checked_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();

        let req_bytes = read_frame(&mut sock).await;
        let req = smb_msg::decode_request(&req_bytes).unwrap();
        assert!(matches!(req.content, RequestContent::Negotiate(_)));
        let header = negotiate_response_header(req.header.message_id, Status::SUCCESS);
        let body =
            encode_plain_response(header, ResponseContent::Negotiate(negotiate_response_body()));
        write_frame(&mut sock, &body).await;

        // Round 1: STATUS_MORE_PROCESSING_REQUIRED, assigning SESSION_ID.
        let req_bytes = read_frame(&mut sock).await;
        let req = smb_msg::decode_request(&req_bytes).unwrap();
        assert!(matches!(req.content, RequestContent::SessionSetup(_)));
        let message_id = req.header.message_id;
        let inner_token = smb::auth::spnego::wrap(&[0xBB], None).unwrap();
        let header =
            session_setup_response_header(message_id, SESSION_ID, Status::MORE_PROCESSING_REQUIRED);
        let body = encode_plain_response(
            header,
            ResponseContent::SessionSetup(SessionSetupResponse {
                session_flags: SessionFlags::new(),
                buffer: inner_token,
            }),
        );
        write_frame(&mut sock, &body).await;
        round1_sent_tx.send(()).unwrap();
        checked_rx.await.unwrap();

        // Round 2: STATUS_SUCCESS, same SESSION_ID.
        let req_bytes = read_frame(&mut sock).await;
        let req = smb_msg::decode_request(&req_bytes).unwrap();
        assert_eq!(req.header.session_id, SESSION_ID);
        let message_id = req.header.message_id;
        let header = session_setup_response_header(message_id, SESSION_ID, Status::SUCCESS);
        let body = encode_plain_response(
            header,
            ResponseContent::SessionSetup(SessionSetupResponse {
                session_flags: SessionFlags::new(),
                buffer: Vec::new(),
            }),
        );
        write_frame(&mut sock, &body).await;
        sock
    });

    let config = ConnectionConfig {
        port: Some(addr.port()),
        timeout: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let conn = Connection::connect("127.0.0.1", config).await.unwrap();

    let auth_conn = conn.clone();
    let auth_task = tokio::spawn(async move {
        let authenticator: Box<dyn Authenticator> = Box::new(StubAuthenticator { rounds: 0 });
        auth_conn.authenticate_with(authenticator, vec![0x01]).await
    });

    round1_sent_rx.await.unwrap();
    // Give the receive loop a moment to dispatch the just-sent response
    // before inspecting table state.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let info = conn.info().unwrap();
    assert!(info.preauth_sessions.contains(SESSION_ID).unwrap());
    assert!(info.sessions.get(SESSION_ID).unwrap().is_none());
    checked_tx.send(()).unwrap();

    let session = auth_task.await.unwrap().unwrap();
    assert_eq!(session.session_id, SESSION_ID);
    let info = conn.info().unwrap();
    assert!(!info.preauth_sessions.contains(SESSION_ID).unwrap());
    assert!(info.sessions.get(SESSION_ID).unwrap().is_some());

    server.await.unwrap();
}
