//! The push channel: WebSocket connections, one read pump and one write
//! pump each.
//!
//! The write pump drains the connection's hub buffer into the socket; the
//! read pump watches for inbound messages (currently only `yellow_auth`)
//! and tears the connection down on any read failure. Registration and
//! eviction both go through the [`Hub`].

use std::sync::Arc;

use clearbook_types::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::auth::{Principal, TokenValidator, YellowAuthMessage};
use crate::event::Event;
use crate::hub::{ConnId, Hub};

/// Accept connections until shutdown. Each connection runs on its own task.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<Hub>,
    validator: Arc<dyn TokenValidator>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "push channel listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "inbound connection");
                        let hub = Arc::clone(&hub);
                        let validator = Arc::clone(&validator);
                        tokio::spawn(handle_connection(stream, hub, validator));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("push channel stopping");
                    return Ok(());
                }
            }
        }
    }
}

/// Upgrade, register, pump. Returns when the client disconnects or is
/// evicted by the hub.
pub async fn handle_connection(
    stream: TcpStream,
    hub: Arc<Hub>,
    validator: Arc<dyn TokenValidator>,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "websocket upgrade failed");
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    let (conn, mut outbound) = hub.register();
    hub.send_to(conn, &Event::connected());

    // Write pump: hub buffer -> socket. Ends when the hub evicts the
    // connection (sender dropped) or the socket dies.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Read pump: inbound frames. Any failure disconnects.
    let mut principal: Option<Principal> = None;
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Some(identity) = handle_inbound(conn, &hub, validator.as_ref(), &text) {
                    principal = Some(identity);
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(conn = %conn, error = %e, "read error; disconnecting");
                break;
            }
        }
    }

    if let Some(principal) = &principal {
        debug!(conn = %conn, address = %principal.address, "authenticated connection closed");
    }
    hub.unregister(conn);
    writer.abort();
}

/// Dispatch one inbound frame. Returns the principal on a successful auth.
fn handle_inbound(
    conn: ConnId,
    hub: &Hub,
    validator: &dyn TokenValidator,
    raw: &str,
) -> Option<Principal> {
    let Some(message) = YellowAuthMessage::parse(raw) else {
        debug!(conn = %conn, raw, "unhandled message");
        return None;
    };

    match validator.validate(&message.jwt_token, &message.session_key) {
        Ok(principal) => {
            info!(conn = %conn, address = %principal.address, "push-channel auth succeeded");
            hub.send_to(
                conn,
                &Event::YellowAuthSuccess {
                    address: principal.address.clone(),
                    session_key: principal.session_key.clone(),
                    expires_at: principal.expires_at.timestamp(),
                },
            );
            Some(principal)
        }
        Err(err) => {
            warn!(conn = %conn, error = %err, "push-channel auth failed");
            hub.send_to(conn, &Event::error("Invalid push-channel authentication"));
            None
        }
    }
}
