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

//! Peer connections.
//!
//! Every TCP stream to a peer is driven by its own pair of tasks: a reader
//! that turns frames into [`ConnectionEvent`]s for the node's event loop, and
//! a writer that drains an outbound queue. The event loop never performs
//! socket I/O itself; it only pushes messages into [`Connection::send`] and
//! reacts to events.

use std::net::SocketAddr;

use sudonet_common::transport::{JsonCodec, TcpTransport};
use sudonet_common::{Message, NodeAddress, Result, SudonetError};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub type ConnectionId = u64;

/// Something that happened on a peer connection.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A complete, decoded message.
    Frame {
        conn: ConnectionId,
        message: Message,
    },
    /// The stream failed or was closed by the peer. May be reported more than
    /// once for the same connection.
    Closed { conn: ConnectionId, reason: String },
}

/// Handle to a live peer connection.
///
/// Dropping the handle tears down both I/O tasks.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Message>,
    task: Option<JoinHandle<()>>,
}

enum Target {
    Accepted(TcpStream),
    Dial(NodeAddress),
}

impl Connection {
    /// Wraps an already-established stream (an accepted peer).
    pub fn spawn(
        id: ConnectionId,
        stream: TcpStream,
        transport: TcpTransport,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self::start(id, Target::Accepted(stream), transport, events)
    }

    /// Opens a connection to `addr` in the background.
    ///
    /// Messages sent before the connect completes are queued and written in
    /// order once it does. A failed connect is reported as
    /// [`ConnectionEvent::Closed`].
    pub fn dial(
        id: ConnectionId,
        addr: NodeAddress,
        transport: TcpTransport,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self::start(id, Target::Dial(addr), transport, events)
    }

    fn start(
        id: ConnectionId,
        target: Target,
        transport: TcpTransport,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(id, target, transport, outbound_rx, events));
        Self {
            id,
            outbound,
            task: Some(task),
        }
    }

    /// Queues a message for this peer.
    ///
    /// # Errors
    ///
    /// Returns `PeerUnavailable` if the connection's writer has already shut down.
    pub fn send(&self, message: Message) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|e| SudonetError::PeerUnavailable(format!("connection {} closed ({})", self.id, e.0.kind())))
    }

    /// Stops accepting messages but lets the writer flush what is queued.
    ///
    /// The returned task completes once the queue is drained.
    pub fn finish(mut self) -> Option<JoinHandle<()>> {
        self.task.take()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn drive(
    id: ConnectionId,
    target: Target,
    transport: TcpTransport,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let stream = match target {
        Target::Accepted(stream) => stream,
        Target::Dial(addr) => match transport.connect(&addr).await {
            Ok(stream) => {
                debug!("Connection {} established to {}", id, addr);
                stream
            }
            Err(e) => {
                let _ = events.send(ConnectionEvent::Closed {
                    conn: id,
                    reason: e.to_string(),
                });
                return;
            }
        },
    };

    let (reader, mut writer) = stream.into_split();
    let _reader = AbortOnDrop(tokio::spawn(read_loop(id, reader, transport, events.clone())));

    while let Some(message) = outbound.recv().await {
        if let Err(e) = TcpTransport::send_message(&mut writer, &message).await {
            let _ = events.send(ConnectionEvent::Closed {
                conn: id,
                reason: e.to_string(),
            });
            return;
        }
    }
}

async fn read_loop(
    id: ConnectionId,
    mut reader: OwnedReadHalf,
    transport: TcpTransport,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    loop {
        let received = match transport.receive_frame(&mut reader).await {
            Ok(Some(frame)) => JsonCodec::decode(&frame),
            Ok(None) => {
                let _ = events.send(ConnectionEvent::Closed {
                    conn: id,
                    reason: "peer closed the connection".to_string(),
                });
                return;
            }
            Err(e) => Err(e),
        };

        match received {
            Ok(message) => {
                if events.send(ConnectionEvent::Frame { conn: id, message }).is_err() {
                    return;
                }
            }
            Err(e) if !e.is_fatal_to_connection() => {
                warn!("Discarding message on connection {}: {}", id, e);
            }
            Err(e) => {
                let _ = events.send(ConnectionEvent::Closed {
                    conn: id,
                    reason: e.to_string(),
                });
                return;
            }
        }
    }
}

/// Accepts inbound peer streams and hands them to the event loop.
///
/// Runs until the receiving side of `accepted` is dropped.
pub fn spawn_acceptor(
    listener: TcpListener,
    accepted: mpsc::UnboundedSender<(TcpStream, SocketAddr)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    let _ = stream.set_nodelay(true);
                    if accepted.send((stream, remote)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    // Usually fd exhaustion; back off instead of spinning
                    warn!("Failed to accept peer connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    })
}
