//! Transport abstraction for the realtime channel.
//!
//! Decouples the connection manager from any specific socket
//! implementation. [`crate::ws_transport::WsTransport`] is the production
//! transport; [`MemoryTransport`] wires a session to an in-process peer.

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O or protocol-level error.
    #[error("{0}")]
    Io(String),
}

/// Read half of a transport connection.
pub trait TransportReader: Send + 'static {
    /// Receive the next text frame.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(&mut self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;
}

/// Write half of a transport connection.
pub trait TransportWriter: Send + 'static {
    /// Send a text frame to the remote peer.
    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the connection from our side.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// A bidirectional transport that can be split into independent read and
/// write halves, so each can live in its own task.
pub trait Transport: Send + 'static {
    type Reader: TransportReader;
    type Writer: TransportWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}

// ---------------------------------------------------------------------------
// In-process transport
// ---------------------------------------------------------------------------

/// Channel-backed transport. The matching [`MemoryPeer`] plays the server.
pub struct MemoryTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<PeerFrame>,
}

/// What the client side wrote, as seen by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerFrame {
    Text(String),
    Close,
}

/// Server end of a [`MemoryTransport`].
pub struct MemoryPeer {
    pub to_client: mpsc::UnboundedSender<String>,
    pub from_client: mpsc::UnboundedReceiver<PeerFrame>,
}

impl MemoryTransport {
    pub fn pair() -> (Self, MemoryPeer) {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        (
            Self { inbound, outbound },
            MemoryPeer {
                to_client,
                from_client,
            },
        )
    }
}

impl Transport for MemoryTransport {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (
            MemoryReader {
                inbound: self.inbound,
            },
            MemoryWriter {
                outbound: self.outbound,
            },
        )
    }
}

pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<String>,
}

impl TransportReader for MemoryReader {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.inbound.recv().await)
    }
}

pub struct MemoryWriter {
    outbound: mpsc::UnboundedSender<PeerFrame>,
}

impl TransportWriter for MemoryWriter {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.outbound
            .send(PeerFrame::Text(text.to_string()))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outbound
            .send(PeerFrame::Close)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_pair_carries_frames_both_ways() {
        let (transport, mut peer) = MemoryTransport::pair();
        let (mut reader, mut writer) = transport.split();

        tokio_test::block_on(async {
            peer.to_client.send("hello".into()).unwrap();
            assert_eq!(reader.recv().await.unwrap().as_deref(), Some("hello"));

            writer.send("world").await.unwrap();
            writer.close().await.unwrap();
            assert_eq!(
                peer.from_client.recv().await,
                Some(PeerFrame::Text("world".into()))
            );
            assert_eq!(peer.from_client.recv().await, Some(PeerFrame::Close));

            drop(peer);
            assert_eq!(reader.recv().await.unwrap(), None);
        });
    }
}
