// Copyright 2025 sudonet Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::error::{Result, SudonetError};
use crate::protocol::{Message, NodeAddress};
use crate::transport::codec::JsonCodec;

/// Largest frame body accepted by default (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default timeout for establishing an outbound connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Async TCP transport for peer links.
///
/// # Wire Protocol
///
/// Every message is a frame: a 4-byte big-endian length followed by that
/// many bytes of UTF-8 JSON.
///
/// ```text
/// [4-byte length] [JSON body]
/// ```
///
/// The transport only moves frames. Turning a frame into a [`Message`] is
/// left to the caller so that a body that fails to decode can be discarded
/// without tearing the connection down.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    max_frame_size: usize,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Connects to a peer.
    ///
    /// Resolves the address and tries each result in turn until one accepts
    /// within the connect timeout.
    pub async fn connect(&self, addr: &NodeAddress) -> Result<TcpStream> {
        let target = addr.to_string();
        let socket_addrs = tokio::net::lookup_host(&target)
            .await
            .map_err(|e| SudonetError::Connection(format!("Invalid address '{}': {}", target, e)))?;

        let mut last_err = None;
        for socket_addr in socket_addrs {
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(socket_addr)).await {
                Ok(Ok(stream)) => {
                    // Frames are small and latency-sensitive
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Ok(Err(e)) => last_err = Some(e.to_string()),
                Err(_) => {
                    last_err = Some(format!("timed out after {}ms", self.connect_timeout.as_millis()))
                }
            }
        }

        Err(SudonetError::Connection(format!(
            "Failed to connect to {}: {}",
            target,
            last_err.unwrap_or_else(|| "no addresses resolved".to_string())
        )))
    }

    /// Encodes and sends one message as a frame.
    pub async fn send_message<W>(writer: &mut W, message: &Message) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = JsonCodec::encode_frame(message)?;

        writer
            .write_all(&frame)
            .await
            .map_err(|e| Self::map_io_error(e, "writing frame"))?;

        writer
            .flush()
            .await
            .map_err(|e| Self::map_io_error(e, "flushing stream"))?;

        Ok(())
    }

    /// Receives one frame body.
    ///
    /// Returns `Ok(None)` when the peer closed the stream between frames.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The stream fails or ends in the middle of a frame
    /// - The announced length exceeds the configured maximum
    pub async fn receive_frame<R>(&self, reader: &mut R) -> Result<Option<Vec<u8>>>
    where
        R: AsyncRead + Unpin,
    {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(Self::map_io_error(e, "reading length prefix")),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > self.max_frame_size {
            return Err(SudonetError::FrameTooLarge {
                len,
                max: self.max_frame_size,
            });
        }

        let mut buf = vec![0u8; len];
        reader
            .read_exact(&mut buf)
            .await
            .map_err(|e| Self::map_io_error(e, "reading frame body"))?;

        Ok(Some(buf))
    }

    /// Map IO errors to connection-level errors
    ///
    /// - Resets, aborts and truncation -> `Connection`
    /// - Everything else -> `Io`
    fn map_io_error(err: std::io::Error, context: &str) -> SudonetError {
        match err.kind() {
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::UnexpectedEof => {
                SudonetError::Connection(format!("{}: connection lost", context))
            }
            _ => SudonetError::Io(err),
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_transport_defaults() {
        let transport = TcpTransport::default();
        assert_eq!(transport.max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
    }

    #[test]
    fn test_tcp_transport_builder() {
        let transport = TcpTransport::new()
            .with_max_frame_size(1024)
            .with_connect_timeout(Duration::from_millis(250));
        assert_eq!(transport.max_frame_size(), 1024);
        assert_eq!(transport.connect_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = NodeAddress::from(listener.local_addr().unwrap());
        drop(listener);

        let result = TcpTransport::new().connect(&addr).await;
        assert!(matches!(result, Err(SudonetError::Connection(_))));
    }
}
