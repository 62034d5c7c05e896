//! Per-connection handler: handshake, auth, and event dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `{"version", "sessionId"}` → check version, authenticate
//!   2. Send `connected` → register with the hub, start the writer task
//!   3. Loop: receive events → dispatch to the hub or the router
//!   4. On exit: unregister, let the writer flush, then write any final
//!      protocol error and close
//!
//! Everything the hub sends to this connection goes through its outbox and
//! the writer task. Replies produced before registration (the `connected`
//! ack, handshake errors) and the final protocol error are written directly,
//! the latter only after the writer has finished.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use huddle_protocol::{
    ClientEvent, Codec, Handshake, PROTOCOL_VERSION, ProtocolError, ServerEvent, UserIdentity,
};
use huddle_session::{Authenticator, Outbox, SessionError};
use huddle_store::MessageStore;
use huddle_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::HuddleError;
use crate::router;
use crate::server::ServerState;

/// How long the writer gets to flush queued events once the read loop ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Unregisters the connection if the handler unwinds before doing so
/// itself. Disconnecting twice is harmless.
///
/// `Drop` is synchronous, so the hub lock is taken on a spawned task.
struct ConnectionGuard<A: Authenticator, M: MessageStore, C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<A, M, C>>,
}

impl<A: Authenticator, M: MessageStore, C: Codec> Drop for ConnectionGuard<A, M, C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.hub.lock().await.disconnect(conn_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, M, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, M, C>>,
) -> Result<(), HuddleError>
where
    A: Authenticator,
    M: MessageStore,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let identity = match perform_handshake(&conn, &state).await {
        Ok(identity) => identity,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    tracing::info!(%conn_id, user_id = %identity.id, username = %identity.username, "user authenticated");

    let (outbox, inbox) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(write_loop(Arc::clone(&conn), Arc::clone(&state), inbox));

    state
        .hub
        .lock()
        .await
        .connect(conn_id, identity.clone(), outbox.clone());
    let guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    let result = read_loop(&conn, &state, &identity, &outbox).await;

    // Unregistering drops the hub's sender. With ours gone too, the writer
    // stops once everything already queued is on the wire.
    state.hub.lock().await.disconnect(conn_id);
    drop(guard);
    drop(outbox);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        tracing::debug!(%conn_id, "writer did not drain in time");
        writer.abort();
    }

    if let Err(e) = &result {
        if let Some(code) = e.client_code() {
            tracing::warn!(%conn_id, error = %e, "protocol violation, closing");
            let _ = send_error(&conn, &state.codec, code, &e.to_string()).await;
        }
    }

    let _ = conn.close().await;
    result
}

/// Receives the handshake frame, checks it, and authenticates the token.
///
/// Any failure is answered with an `error` frame before returning.
async fn perform_handshake<A, M, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, M, C>,
) -> Result<UserIdentity, HuddleError>
where
    A: Authenticator,
    M: MessageStore,
    C: Codec,
{
    let data = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            send_error(conn, &state.codec, 400, "handshake timed out").await?;
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let handshake: Handshake = match state.codec.decode(&data) {
        Ok(hs) => hs,
        Err(e) => {
            send_error(conn, &state.codec, 400, "expected handshake").await?;
            return Err(e.into());
        }
    };

    if handshake.version != PROTOCOL_VERSION {
        let err = ProtocolError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            got: handshake.version,
        };
        send_error(conn, &state.codec, 400, &err.to_string()).await?;
        return Err(err.into());
    }

    let token = handshake.session_id.as_deref().unwrap_or("");
    let identity = match state.auth.authenticate(token).await {
        Ok(identity) => identity,
        Err(e) => {
            let message = match e {
                SessionError::InvalidSession => "unauthorized",
                SessionError::StoreUnavailable(_) => "session store unavailable",
            };
            send_error(conn, &state.codec, e.code(), message).await?;
            return Err(e.into());
        }
    };

    let ack = state.codec.encode(&ServerEvent::Connected(identity.clone()))?;
    conn.send(&ack).await?;
    Ok(identity)
}

/// Reads and dispatches events until the peer leaves, goes idle, or breaks
/// the protocol.
async fn read_loop<A, M, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, M, C>,
    identity: &UserIdentity,
    outbox: &Outbox,
) -> Result<(), HuddleError>
where
    A: Authenticator,
    M: MessageStore,
    C: Codec,
{
    let conn_id = conn.id();
    loop {
        let data = match tokio::time::timeout(state.config.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, user_id = %identity.id, "connection closed cleanly");
                return Ok(());
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Ok(());
            }
            Err(_) => {
                tracing::info!(%conn_id, user_id = %identity.id, "connection idle, closing");
                return Ok(());
            }
        };

        let event: ClientEvent = state.codec.decode(&data)?;
        tracing::debug!(%conn_id, event = event.name(), "event received");
        dispatch(conn_id, state, identity, outbox, event).await?;
    }
}

async fn dispatch<A, M, C>(
    conn_id: ConnectionId,
    state: &ServerState<A, M, C>,
    identity: &UserIdentity,
    outbox: &Outbox,
    event: ClientEvent,
) -> Result<(), HuddleError>
where
    A: Authenticator,
    M: MessageStore,
    C: Codec,
{
    match event {
        ClientEvent::JoinRoom(room_id) => {
            state.hub.lock().await.join_room(conn_id, room_id);
        }

        ClientEvent::LeaveRoom(room_id) => {
            state.hub.lock().await.leave_room(conn_id, room_id);
        }

        ClientEvent::SendMessage { content, room_id } => {
            let sent =
                router::send_to_room(&state.hub, state.store.as_ref(), identity, room_id, content)
                    .await;
            if let Err(e) = sent {
                tracing::warn!(%conn_id, %room_id, error = %e, "message not persisted, dropped");
            }
        }

        ClientEvent::SendPrivateMessage {
            content,
            recipient_id,
        } => {
            let sent = router::send_private(
                &state.hub,
                state.store.as_ref(),
                conn_id,
                identity,
                recipient_id,
                content,
            )
            .await;
            if let Err(e) = sent {
                tracing::warn!(%conn_id, %recipient_id, error = %e, "private message not persisted, dropped");
            }
        }

        ClientEvent::RequestWebcam(target) => {
            let context = target.context()?;
            state.hub.lock().await.request_call(conn_id, context);
        }

        ClientEvent::AcceptWebcam(requester) => {
            state.hub.lock().await.accept_call(conn_id, requester);
        }

        ClientEvent::RejectWebcam(requester) => {
            state.hub.lock().await.reject_call(conn_id, requester);
        }

        ClientEvent::SendWebcamSignal { user_id, data } => {
            state.hub.lock().await.relay_signal(conn_id, user_id, data);
        }

        ClientEvent::EndWebcam(user_id) => {
            state.hub.lock().await.end_call(conn_id, user_id);
        }

        ClientEvent::Ping { client_time } => {
            let server_time = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
            let _ = outbox.send(ServerEvent::Pong {
                client_time,
                server_time,
            });
        }
    }
    Ok(())
}

/// Drains the outbox onto the socket until either side goes away.
async fn write_loop<A, M, C>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<A, M, C>>,
    mut inbox: mpsc::UnboundedReceiver<ServerEvent>,
) where
    A: Authenticator,
    M: MessageStore,
    C: Codec,
{
    let conn_id = conn.id();
    while let Some(event) = inbox.recv().await {
        let bytes = match state.codec.encode(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode outbound event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, writer stopping");
            break;
        }
    }
}

/// Writes an `error` frame straight to the socket.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
) -> Result<(), HuddleError> {
    let bytes = codec.encode(&ServerEvent::Error {
        code,
        message: message.to_string(),
    })?;
    conn.send(&bytes).await?;
    Ok(())
}
