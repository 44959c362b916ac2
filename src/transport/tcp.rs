use std::io;
use std::net::SocketAddr;

use anyhow::anyhow;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::{timeout, Duration};

use crate::config::EngineConfig;
use crate::protocol::Message;
use crate::transport::Transport;

const LEN_PREFIX: usize = 4;

/// Length-prefixed bincode frames over TCP.
///
/// Each frame is a big-endian `u32` length followed by that many bytes of
/// bincode. Incoming bytes are accumulated in an internal buffer, so a
/// cancelled `recv` resumes where it left off.
pub struct TcpTransport {
    stream: TcpStream,
    send_timeout: Duration,
    max_frame_size: u32,
    buffer: Vec<u8>,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self::with_config(stream, &EngineConfig::default())
    }

    pub fn with_config(stream: TcpStream, config: &EngineConfig) -> Self {
        Self {
            stream,
            send_timeout: config.send_timeout,
            max_frame_size: config.max_frame_size,
            buffer: Vec::new(),
        }
    }

    pub async fn connect<A: ToSocketAddrs>(addr: A) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Pop one complete frame from the buffer, if there is one.
    fn take_frame(&mut self) -> anyhow::Result<Option<Message>> {
        if self.buffer.len() < LEN_PREFIX {
            return Ok(None);
        }
        let mut len_buf = [0u8; LEN_PREFIX];
        len_buf.copy_from_slice(&self.buffer[..LEN_PREFIX]);
        let len = u32::from_be_bytes(len_buf);
        if len == 0 {
            return Err(anyhow!("Invalid message length: 0"));
        }
        if len > self.max_frame_size {
            return Err(anyhow!(
                "Message too large: {} bytes (max: {})",
                len,
                self.max_frame_size
            ));
        }
        let end = LEN_PREFIX + len as usize;
        if self.buffer.len() < end {
            return Ok(None);
        }
        let msg = bincode::deserialize(&self.buffer[LEN_PREFIX..end])
            .map_err(|e| anyhow!("Deserialization error: {}", e));
        self.buffer.drain(..end);
        msg.map(Some)
    }
}

fn io_error(e: io::Error) -> anyhow::Error {
    match e.kind() {
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
            anyhow!("Connection closed by peer")
        }
        _ => anyhow!("I/O error: {}", e),
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, msg: Message) -> anyhow::Result<()> {
        let data = bincode::serialize(&msg).map_err(|e| anyhow!("Serialization error: {}", e))?;
        if data.len() > self.max_frame_size as usize {
            return Err(anyhow!(
                "Message too large: {} bytes (max: {})",
                data.len(),
                self.max_frame_size
            ));
        }
        let mut frame = Vec::with_capacity(LEN_PREFIX + data.len());
        frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
        frame.extend_from_slice(&data);

        let limit = self.send_timeout;
        let stream = &mut self.stream;
        timeout(limit, async move {
            stream.write_all(&frame).await.map_err(io_error)?;
            stream.flush().await.map_err(io_error)
        })
        .await
        .map_err(|_| anyhow!("Send timeout after {:?}", limit))?
    }

    async fn recv(&mut self) -> anyhow::Result<Message> {
        loop {
            if let Some(msg) = self.take_frame()? {
                return Ok(msg);
            }
            self.buffer.reserve(4096);
            let n = self.stream.read_buf(&mut self.buffer).await.map_err(io_error)?;
            if n == 0 {
                return Err(if self.buffer.is_empty() {
                    anyhow!("Connection closed by peer")
                } else {
                    anyhow!("Connection closed mid-frame")
                });
            }
        }
    }
}
