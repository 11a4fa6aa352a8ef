//! WebSocket client for the clearinghouse.
//!
//! One long-lived connection carries JSON-RPC request/response pairs
//! correlated by id, plus unsolicited notifications. A background task owns
//! the read half and completes pending requests; callers hold the write
//! half only long enough to push one frame. Timeouts: 10 s to connect,
//! 30 s per request. A request never holds any other lock while waiting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clearbook_types::{constants, Error, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::protocol::{self, AuthRequestResult, AuthVerifyResult, Request, Response};
use crate::signer::StateSigner;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<Response>>>>;

/// Request/response seam between the session manager and the wire. Mocked
/// in tests; implemented by [`ClearinghouseClient`] in production.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Send one request and wait for its correlated response.
    async fn request(&self, request: Request) -> Result<Response>;

    /// Whether the auth handshake has completed.
    fn is_authenticated(&self) -> bool;
}

/// Production clearinghouse connection.
pub struct ClearinghouseClient {
    signer: Arc<dyn StateSigner>,
    sink: tokio::sync::Mutex<WsSink>,
    pending: PendingMap,
    authenticated: AtomicBool,
    session_id: Mutex<Option<String>>,
}

impl ClearinghouseClient {
    /// Dial the clearinghouse and start the read loop.
    ///
    /// # Errors
    /// `Timeout` if the TLS/WebSocket handshake exceeds the connect
    /// deadline, `Transport` on any handshake failure.
    pub async fn connect(url: &str, signer: Arc<dyn StateSigner>) -> Result<Arc<Self>> {
        info!(url, "connecting to clearinghouse");
        let connect = connect_async(url);
        let (stream, response) =
            tokio::time::timeout(Duration::from_secs(constants::CONNECT_TIMEOUT_SECS), connect)
                .await
                .map_err(|_| Error::Timeout)?
                .map_err(|e| Error::Transport(e.to_string()))?;
        info!(status = %response.status(), "clearinghouse connected");

        let (sink, source) = stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let client = Arc::new(Self {
            signer,
            sink: tokio::sync::Mutex::new(sink),
            pending: Arc::clone(&pending),
            authenticated: AtomicBool::new(false),
            session_id: Mutex::new(None),
        });

        tokio::spawn(read_loop(source, pending));
        Ok(client)
    }

    /// Run the challenge/verify auth flow with the broker identity.
    ///
    /// # Errors
    /// Propagates transport, signing, and clearinghouse rejections.
    pub async fn authenticate(&self) -> Result<()> {
        let address = self.signer.address();
        let now = chrono::Utc::now().timestamp();

        let challenge: AuthRequestResult = self
            .request(protocol::auth_request(&address, now)?)
            .await?
            .into_result()?;

        let signature = self.signer.sign(challenge.challenge.as_bytes())?;

        let verified: AuthVerifyResult = self
            .request(protocol::auth_verify(&address, &signature, now)?)
            .await?
            .into_result()?;

        *self.session_id.lock() = Some(verified.session_id.clone());
        self.authenticated.store(true, Ordering::SeqCst);
        info!(session_id = %verified.session_id, "authenticated with clearinghouse");
        Ok(())
    }

    /// The auth session id, once authenticated.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }
}

#[async_trait]
impl ChannelTransport for ClearinghouseClient {
    async fn request(&self, request: Request) -> Result<Response> {
        let (tx, rx) = oneshot::channel();
        let id = request.id;
        self.pending.lock().insert(id, tx);

        // Drop the pending slot however this function exits.
        let cleanup = |pending: &PendingMap| {
            pending.lock().remove(&id);
        };

        let frame = match serde_json::to_string(&request) {
            Ok(json) => Message::Text(json.into()),
            Err(e) => {
                cleanup(&self.pending);
                return Err(Error::Serialization(e.to_string()));
            }
        };

        if let Err(e) = self.sink.lock().await.send(frame).await {
            cleanup(&self.pending);
            return Err(Error::Transport(e.to_string()));
        }

        match tokio::time::timeout(Duration::from_secs(constants::REQUEST_TIMEOUT_SECS), rx).await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                cleanup(&self.pending);
                Err(Error::Transport("connection closed".into()))
            }
            Err(_) => {
                cleanup(&self.pending);
                Err(Error::Timeout)
            }
        }
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }
}

/// Owns the read half: completes pending requests, logs notifications,
/// and fails everything outstanding when the connection dies.
async fn read_loop(mut source: WsSource, pending: PendingMap) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<Response>(&text) {
                Ok(response) => {
                    let waiter = pending.lock().remove(&response.id);
                    match waiter {
                        Some(tx) => {
                            let _ = tx.send(response);
                        }
                        None => debug!(raw = %text, "unsolicited clearinghouse message"),
                    }
                }
                Err(e) => warn!(error = %e, raw = %text, "unparseable clearinghouse frame"),
            },
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(frame)) => {
                info!(frame = ?frame, "clearinghouse closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "clearinghouse read error");
                break;
            }
        }
    }
    // Dropping the senders fails every in-flight request with
    // "connection closed" rather than letting them ride out the timeout.
    pending.lock().clear();
}
