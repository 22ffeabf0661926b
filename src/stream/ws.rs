//! WebSocket implementation of the recognition channel.
//!
//! Wire protocol: the configuration goes out as a JSON text frame, audio
//! chunks as binary frames. The service replies with JSON text frames
//! (`ready`, `result`, `error`) and closes the stream when it has no more
//! results. Half-closing the outbound direction is a Close frame; the
//! close frame the service sends back carries the terminal status.

use crate::error::{Result, VoxdriveError};
use crate::stream::channel::{AudioWriter, RecognitionChannel, ResultReader};
use crate::stream::types::{
    ChannelStatus, ClientFrame, OutboundMessage, RecognitionResult, ServerFrame,
};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Recognition channel over a WebSocket connection.
pub struct WsRecognitionChannel {
    endpoint: String,
    transport: Option<Transport>,
}

impl WsRecognitionChannel {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RecognitionChannel for WsRecognitionChannel {
    async fn start(&mut self) -> Result<()> {
        let (transport, _response) =
            connect_async(self.endpoint.as_str())
                .await
                .map_err(|e| VoxdriveError::ChannelStart {
                    message: e.to_string(),
                })?;
        self.transport = Some(transport);
        Ok(())
    }

    fn split(self: Box<Self>) -> (Box<dyn AudioWriter>, Box<dyn ResultReader>) {
        let transport = self
            .transport
            .expect("split called before start; this is a caller bug");
        let (sink, stream) = transport.split();
        (
            Box::new(WsAudioWriter {
                sink,
                closed: false,
            }),
            Box::new(WsResultReader {
                stream,
                status: None,
            }),
        )
    }
}

/// Whether a sink error means "peer already closed" rather than a fault.
fn is_peer_closed(error: &WsError) -> bool {
    matches!(error, WsError::ConnectionClosed | WsError::AlreadyClosed)
}

fn encode(message: OutboundMessage) -> Result<Message> {
    match message {
        OutboundMessage::Config(config) => {
            let frame = ClientFrame::Config {
                sample_rate: config.sample_rate,
                encoding: &config.encoding,
                language: &config.language,
            };
            let payload =
                serde_json::to_string(&frame).map_err(|e| VoxdriveError::ChannelWrite {
                    message: format!("failed to encode configuration: {}", e),
                })?;
            Ok(Message::Text(payload.into()))
        }
        OutboundMessage::Audio(chunk) => Ok(Message::Binary(chunk.into_bytes().into())),
    }
}

struct WsAudioWriter {
    sink: SplitSink<Transport, Message>,
    closed: bool,
}

#[async_trait]
impl AudioWriter for WsAudioWriter {
    async fn write(&mut self, message: OutboundMessage, urgent: bool) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        let frame = encode(message)?;
        let sent = if urgent {
            self.sink.send(frame).await
        } else {
            self.sink.feed(frame).await
        };
        match sent {
            Ok(()) => Ok(true),
            Err(e) if is_peer_closed(&e) => {
                self.closed = true;
                Ok(false)
            }
            Err(e) => Err(VoxdriveError::ChannelWrite {
                message: e.to_string(),
            }),
        }
    }

    async fn writes_done(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let close = Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        }));
        match self.sink.send(close).await {
            Ok(()) => Ok(()),
            // The peer beat us to closing; the half-close already happened.
            Err(e) if is_peer_closed(&e) => Ok(()),
            Err(e) => Err(VoxdriveError::ChannelWrite {
                message: e.to_string(),
            }),
        }
    }
}

struct WsResultReader {
    stream: SplitStream<Transport>,
    /// Terminal status once observed (close frame, error frame, or
    /// transport error).
    status: Option<ChannelStatus>,
}

impl WsResultReader {
    fn record_close(&mut self, frame: Option<CloseFrame>) {
        let status = match frame {
            Some(frame) => {
                let code = u16::from(frame.code);
                if code == crate::stream::types::STATUS_OK {
                    ChannelStatus::ok()
                } else {
                    ChannelStatus::error(code, frame.reason.as_str())
                }
            }
            None => ChannelStatus::ok(),
        };
        if self.status.is_none() {
            self.status = Some(status);
        }
    }
}

#[async_trait]
impl ResultReader for WsResultReader {
    async fn read(&mut self) -> Option<RecognitionResult> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(payload))) => {
                    match serde_json::from_str::<ServerFrame>(payload.as_str()) {
                        Ok(ServerFrame::Result {
                            stability,
                            alternatives,
                        }) => {
                            return Some(RecognitionResult {
                                stability,
                                alternatives,
                            });
                        }
                        Ok(ServerFrame::Ready { .. }) => continue,
                        Ok(ServerFrame::Error { message }) => {
                            // In-band failure: terminal for this session.
                            if self.status.is_none() {
                                self.status = Some(ChannelStatus::error(1011, message));
                            }
                            return None;
                        }
                        Err(e) => {
                            if self.status.is_none() {
                                self.status = Some(ChannelStatus::error(
                                    1007,
                                    format!("malformed result frame: {}", e),
                                ));
                            }
                            return None;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    self.record_close(frame);
                    return None;
                }
                // Binary, ping and pong frames carry no results.
                Some(Ok(_)) => continue,
                Some(Err(e)) if is_peer_closed(&e) => {
                    if self.status.is_none() {
                        self.status = Some(ChannelStatus::ok());
                    }
                    return None;
                }
                Some(Err(e)) => {
                    if self.status.is_none() {
                        self.status = Some(ChannelStatus::error(1006, e.to_string()));
                    }
                    return None;
                }
                None => return None,
            }
        }
    }

    async fn finish(mut self: Box<Self>) -> ChannelStatus {
        // Drain whatever is left so the close frame, if any, is observed.
        while self.status.is_none() {
            if self.read().await.is_none() {
                break;
            }
        }
        self.status.take().unwrap_or_else(ChannelStatus::ok)
    }
}
