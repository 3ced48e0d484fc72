//! WebSocket transport for native targets.
//!
//! Uses `tokio-tungstenite`. The server authenticates the socket at connect
//! time from the `Sec-WebSocket-Protocol` header, which carries `chat` and the
//! caller's token.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::transport::{Transport, TransportError, TransportReader, TransportWriter};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the per-game socket URL: `<base>?gameId=<id>`.
pub fn game_socket_url(ws_base: &str, game_id: &str) -> String {
    format!("{}?gameId={game_id}", ws_base.trim_end_matches('/'))
}

pub struct WsTransport {
    stream: WsStream,
}

impl WsTransport {
    /// Connect to `url`, offering the `chat` subprotocol plus `token`.
    pub async fn connect(url: &str, token: &str) -> Result<Self, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        let protocols = HeaderValue::from_str(&format!("chat, {token}"))
            .map_err(|e| TransportError::Io(e.to_string()))?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, protocols);

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Self { stream })
    }
}

impl Transport for WsTransport {
    type Reader = WsReader;
    type Writer = WsWriter;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (sink, stream) = self.stream.split();
        (WsReader { stream }, WsWriter { sink })
    }
}

pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl TransportReader for WsReader {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.to_string())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Binary and control frames carry nothing for us.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }
}

pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

impl TransportWriter for WsWriter {
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        self.sink
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
