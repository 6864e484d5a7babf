use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, tcp};

use crate::error::{Result, TransportError};
use crate::traits::{SmbTransport, SmbTransportRead, SmbTransportWrite};
use crate::utils::TransportUtils;

/// SMB2 over Direct TCP, per [MS-SMB2] 2.1: each message is prefixed with a
/// 4-byte big-endian length (the top byte must be zero — messages never
/// exceed 2^24 bytes) and carries no other session framing, unlike NetBIOS.
const MAX_FRAME_LEN: usize = 0x00FF_FFFF;

fn map_io_error(e: std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::ConnectionAborted
        || e.kind() == std::io::ErrorKind::UnexpectedEof
    {
        log::warn!("connection lost: {e}");
        return TransportError::NotConnected;
    }
    e.into()
}

async fn receive_frame(reader: &mut tcp::OwnedReadHalf) -> Result<Vec<u8>> {
    let mut len_prefix = [0u8; 4];
    reader
        .read_exact(&mut len_prefix)
        .await
        .map_err(map_io_error)?;
    let len = u32::from_be_bytes(len_prefix) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(map_io_error)?;
    log::trace!("received {len} byte SMB2 message");
    Ok(buf)
}

async fn send_frame(writer: &mut tcp::OwnedWriteHalf, message: &[u8]) -> Result<()> {
    if message.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(message.len()));
    }
    let len_prefix = (message.len() as u32).to_be_bytes();
    writer.write_all(&len_prefix).await.map_err(map_io_error)?;
    writer.write_all(message).await.map_err(map_io_error)?;
    Ok(())
}

pub struct TcpTransport {
    reader: Option<tcp::OwnedReadHalf>,
    writer: Option<tcp::OwnedWriteHalf>,
    timeout: Duration,
}

impl TcpTransport {
    pub const DEFAULT_PORT: u16 = 445;

    pub fn new(timeout: Duration) -> Self {
        TcpTransport {
            reader: None,
            writer: None,
            timeout,
        }
    }

    async fn connect_timeout(&self, address: &str) -> Result<TcpStream> {
        if self.timeout == Duration::ZERO {
            log::debug!("connecting to {address}");
            return TcpStream::connect(address).await.map_err(Into::into);
        }

        log::debug!("connecting to {address} with timeout {:?}", self.timeout);
        let addr = TransportUtils::parse_socket_address(address)?;
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(res) => res.map_err(Into::into),
            Err(_) => Err(TransportError::Timeout(
                format!("tcp connect to {address}"),
                self.timeout,
            )),
        }
    }
}

impl SmbTransport for TcpTransport {
    async fn connect(&mut self, endpoint: &str) -> Result<()> {
        let socket = self.connect_timeout(endpoint).await?;
        let (r, w) = socket.into_split();
        self.reader = Some(r);
        self.writer = Some(w);
        Ok(())
    }

    fn split(self: Box<Self>) -> (Box<dyn SmbTransportRead>, Box<dyn SmbTransportWrite>) {
        let reader = self.reader.expect("split requires a connected transport");
        let writer = self.writer.expect("split requires a connected transport");
        (
            Box::new(TcpReadHalf { reader }),
            Box::new(TcpWriteHalf {
                writer,
                connected: true,
            }),
        )
    }
}

impl SmbTransportWrite for TcpTransport {
    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }
        self.reader = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.reader.is_some() && self.writer.is_some()
    }

    async fn send(&mut self, message: &[u8]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(TransportError::NotConnected)?;
        send_frame(writer, message).await
    }
}

impl SmbTransportRead for TcpTransport {
    async fn receive(&mut self) -> Result<Vec<u8>> {
        let reader = self.reader.as_mut().ok_or(TransportError::NotConnected)?;
        receive_frame(reader).await
    }
}

/// The read half of a split [`TcpTransport`].
struct TcpReadHalf {
    reader: tcp::OwnedReadHalf,
}

impl SmbTransportRead for TcpReadHalf {
    async fn receive(&mut self) -> Result<Vec<u8>> {
        receive_frame(&mut self.reader).await
    }
}

/// The write half of a split [`TcpTransport`].
struct TcpWriteHalf {
    writer: tcp::OwnedWriteHalf,
    connected: bool,
}

impl SmbTransportWrite for TcpWriteHalf {
    async fn disconnect(&mut self) -> Result<()> {
        let _ = self.writer.shutdown().await;
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send(&mut self, message: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        send_frame(&mut self.writer, message).await
    }
}
