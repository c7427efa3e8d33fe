use std::{io, net::SocketAddr};

use bytes::{BufMut as _, BytesMut};
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpStream,
};
use tracing::{debug, trace};

use crate::chain::Block;

/// Frame magic identifying harness peer traffic.
const WIRE_MAGIC: u32 = 0x4348_4E31; // "CHN1"

/// Frame header: magic, command, payload length.
const FRAME_HEADER_LEN: usize = 4 + 1 + 4;

const CMD_HELLO: u8 = 0x01;
const CMD_HELLO_ACK: u8 = 0x02;
const CMD_BLOCK: u8 = 0x10;

/// Largest payload the channel will frame; a u32 length field bounds the
/// wire format anyway, this just fails early on nonsense.
const MAX_FRAME_PAYLOAD: usize = u32::MAX as usize;

/// The simulated-peer connection failed. Submission correctness is the
/// property under test, so none of these are retried.
#[derive(Debug, Error)]
pub enum PeerProtocolError {
    #[error("failed to connect to peer endpoint {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("peer {addr} answered the handshake with command {command:#04x}")]
    Handshake { addr: SocketAddr, command: u8 },
    #[error("peer {addr} sent frame magic {magic:#010x}")]
    BadMagic { addr: SocketAddr, magic: u32 },
    #[error("peer closed the connection mid-frame")]
    Disconnected,
    #[error("payload of {len} bytes exceeds the wire limit")]
    Oversized { len: usize },
    #[error("peer connection io failure: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Simulated-peer channel: a framed TCP client that ships serialized blocks
/// to a node's P2P listener as an ordinary remote peer would.
pub struct PeerChannel {
    stream: TcpStream,
    addr: SocketAddr,
}

impl PeerChannel {
    /// Dial the node's P2P port and perform the hello handshake.
    pub async fn connect(addr: SocketAddr) -> Result<Self, PeerProtocolError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| PeerProtocolError::Connect { addr, source })?;
        let mut channel = Self { stream, addr };

        channel.write_frame(CMD_HELLO, &[]).await?;
        let (command, _payload) = channel.read_frame().await?;
        if command != CMD_HELLO_ACK {
            return Err(PeerProtocolError::Handshake { addr, command });
        }

        debug!(peer = %addr, "peer handshake complete");
        Ok(channel)
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Ship one serialized block.
    pub async fn send_block(&mut self, block: &Block) -> Result<(), PeerProtocolError> {
        let raw = block.encoded();
        trace!(peer = %self.addr, id = %block.id(), bytes = raw.len(), "sending block");
        self.write_frame(CMD_BLOCK, &raw).await
    }

    async fn write_frame(&mut self, command: u8, payload: &[u8]) -> Result<(), PeerProtocolError> {
        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(PeerProtocolError::Oversized { len: payload.len() });
        }

        let mut header = BytesMut::with_capacity(FRAME_HEADER_LEN);
        header.put_u32_le(WIRE_MAGIC);
        header.put_u8(command);
        header.put_u32_le(payload.len() as u32);

        self.stream.write_all(&header).await?;
        self.stream.write_all(payload).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<(u8, Vec<u8>), PeerProtocolError> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        self.read_exact(&mut header).await?;

        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if magic != WIRE_MAGIC {
            return Err(PeerProtocolError::BadMagic {
                addr: self.addr,
                magic,
            });
        }
        let command = header[4];
        let len = u32::from_le_bytes([header[5], header[6], header[7], header[8]]) as usize;

        let mut payload = vec![0u8; len];
        self.read_exact(&mut payload).await?;
        Ok((command, payload))
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), PeerProtocolError> {
        self.stream.read_exact(buf).await.map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                PeerProtocolError::Disconnected
            } else {
                PeerProtocolError::Io { source: err }
            }
        })?;
        Ok(())
    }
}
