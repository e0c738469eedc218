//! WebSocket transport backed by `tokio-tungstenite`.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tracing::{debug, trace};

use crate::transport::{BoxFuture, Connector, FrameReader, FrameWriter, Link, TransportError};

/// Maximum inbound message size in bytes (16 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Opens console sockets with `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Link, TransportError>> {
        Box::pin(async move {
            let mut request = url.into_client_request()?;
            for (name, value) in headers {
                let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    TransportError::InvalidHeader {
                        name: name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let header_value =
                    HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                        name: name.clone(),
                        reason: e.to_string(),
                    })?;
                request.headers_mut().insert(header_name, header_value);
            }

            let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
            ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
            ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
            let (ws_stream, _) =
                tokio_tungstenite::connect_async_with_config(request, Some(ws_config), false)
                    .await?;
            debug!(url = %url, "socket open");

            let (write, read) = ws_stream.split();
            let reader: Box<dyn FrameReader> = Box::new(WsReader { read });
            let writer: Box<dyn FrameWriter> = Box::new(WsWriter { write });
            Ok((reader, writer))
        })
    }
}

/// Reads text frames, skipping control and binary frames.
pub struct WsReader<S> {
    read: S,
}

impl<S> FrameReader for WsReader<S>
where
    S: Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin + Send,
{
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, TransportError>> {
        Box::pin(async move {
            loop {
                match self.read.next().await {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        return Ok(Some(text.to_string()));
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        debug!(?frame, "received close frame");
                        return Ok(None);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => trace!("received ping"),
                    Some(Ok(tungstenite::Message::Pong(_))) => trace!("received pong"),
                    Some(Ok(_)) => trace!("ignoring non-text frame"),
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        debug!("WebSocket stream ended");
                        return Ok(None);
                    }
                }
            }
        })
    }
}

/// Writes text frames.
pub struct WsWriter<S> {
    write: S,
}

impl<S> FrameWriter for WsWriter<S>
where
    S: Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin + Send,
{
    fn send(&mut self, text: String) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            self.write
                .send(tungstenite::Message::Text(text.into()))
                .await?;
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = self.write.send(tungstenite::Message::Close(None)).await;
            let _ = self.write.close().await;
        })
    }
}
