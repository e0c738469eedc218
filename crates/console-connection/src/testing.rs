//! In-memory transport and token source used by the session tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use pteroconsole_protocol::WireEvent;

use crate::transport::{
    BoxFuture, Connector, FetchReason, FrameReader, FrameWriter, Link, TokenError, TokenSource,
    TransportError,
};
use crate::types::{Credential, SessionEvent};

pub(crate) const SOCKET_URL: &str = "wss://node.example.com:8080/api/servers/abc/ws";
const WAIT: Duration = Duration::from_secs(5);

/// Hands out scripted tokens. `None` entries fail; an empty script keeps
/// issuing `T-default`.
#[derive(Default)]
pub(crate) struct FakeTokens {
    script: Mutex<VecDeque<Option<&'static str>>>,
    calls: Mutex<Vec<FetchReason>>,
}

impl FakeTokens {
    pub(crate) fn scripted(tokens: &[Option<&'static str>]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(tokens.iter().copied().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<FetchReason> {
        self.calls.lock().unwrap().clone()
    }
}

impl TokenSource for FakeTokens {
    fn fetch(&self, reason: FetchReason) -> BoxFuture<'_, Result<Credential, TokenError>> {
        self.calls.lock().unwrap().push(reason);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Some("T-default"));
        Box::pin(async move {
            match next {
                Some(token) => Ok(Credential {
                    token: token.to_string(),
                    socket_url: SOCKET_URL.to_string(),
                }),
                None => Err(TokenError::new(std::io::Error::other("panel unavailable"))),
            }
        })
    }
}

/// A token source that never answers.
pub(crate) struct HangingTokens;

impl TokenSource for HangingTokens {
    fn fetch(&self, _reason: FetchReason) -> BoxFuture<'_, Result<Credential, TokenError>> {
        Box::pin(std::future::pending())
    }
}

/// The daemon side of one fake connection.
pub(crate) struct FakeServer {
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl FakeServer {
    pub(crate) fn push(&self, event: &str, args: &[&str]) {
        let frame = WireEvent::new(event, args.iter().copied())
            .encode()
            .unwrap();
        self.push_raw(&frame);
    }

    pub(crate) fn push_raw(&self, frame: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(frame.to_string());
        }
    }

    /// Drops the daemon end, which the client sees as a peer close.
    pub(crate) fn hang_up(&mut self) {
        self.to_client = None;
    }

    pub(crate) async fn expect_sent(&mut self) -> WireEvent {
        let frame = tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .expect("client frame in time")
            .expect("client writer alive");
        WireEvent::decode(&frame).unwrap()
    }

    pub(crate) fn nothing_sent(&mut self) -> bool {
        self.from_client.try_recv().is_err()
    }

    pub(crate) fn client_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Opens in-memory links and hands the daemon side to the test.
pub(crate) struct FakeConnector {
    servers: mpsc::UnboundedSender<FakeServer>,
    refusals: AtomicU32,
    stalled: AtomicBool,
    hang_on_close: Arc<AtomicBool>,
}

impl FakeConnector {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeServer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            servers: tx,
            refusals: AtomicU32::new(0),
            stalled: AtomicBool::new(false),
            hang_on_close: Arc::new(AtomicBool::new(false)),
        });
        (connector, rx)
    }

    /// Refuses the next `count` connection attempts.
    pub(crate) fn refuse(&self, count: u32) {
        self.refusals.store(count, Ordering::SeqCst);
    }

    /// Makes every later connection attempt hang forever.
    pub(crate) fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    /// Makes `close()` on every writer never complete.
    pub(crate) fn hang_on_close(&self) {
        self.hang_on_close.store(true, Ordering::SeqCst);
    }
}

impl Connector for FakeConnector {
    fn connect<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Link, TransportError>> {
        Box::pin(async move {
            if self.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let refused = self
                .refusals
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if refused {
                return Err(TransportError::Closed);
            }

            let (to_client, client_rx) = mpsc::unbounded_channel();
            let (client_tx, from_client) = mpsc::unbounded_channel();
            let closed = Arc::new(AtomicBool::new(false));
            let _ = self.servers.send(FakeServer {
                url: url.to_string(),
                headers: headers.to_vec(),
                to_client: Some(to_client),
                from_client,
                closed: closed.clone(),
            });

            let reader: Box<dyn FrameReader> = Box::new(FakeReader { rx: client_rx });
            let writer: Box<dyn FrameWriter> = Box::new(FakeWriter {
                tx: client_tx,
                closed,
                hang_on_close: self.hang_on_close.clone(),
            });
            Ok((reader, writer))
        })
    }
}

struct FakeReader {
    rx: mpsc::UnboundedReceiver<String>,
}

impl FrameReader for FakeReader {
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<String>, TransportError>> {
        Box::pin(async move { Ok(self.rx.recv().await) })
    }
}

struct FakeWriter {
    tx: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
    hang_on_close: Arc<AtomicBool>,
}

impl FrameWriter for FakeWriter {
    fn send(&mut self, text: String) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            self.tx.send(text).map_err(|_| TransportError::Closed)
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
            if self.hang_on_close.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
        })
    }
}

pub(crate) async fn next_server(rx: &mut mpsc::UnboundedReceiver<FakeServer>) -> FakeServer {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("connection attempt in time")
        .expect("connector alive")
}

pub(crate) async fn next_event(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("session event in time")
        .expect("event channel open")
}
