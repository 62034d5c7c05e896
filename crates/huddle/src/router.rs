//! Chat message routing: persist, then broadcast.
//!
//! The store call happens without the hub lock held. Only the broadcast
//! takes the lock, so messages to one room go out in the order their
//! broadcasts reach the lock. Persist and broadcast are not atomic: a
//! message stored just before the author's room membership changes is
//! still broadcast to the room as it is at broadcast time.

use huddle_protocol::{PrivateMessage, RoomId, RoomMessage, UserId, UserIdentity};
use huddle_store::{MessageStore, MessageTarget, NewMessage, StoreError};
use huddle_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::hub::Hub;

/// Persists a room message and sends it to everyone in the room,
/// the author included.
///
/// # Errors
/// The store's error. Nothing is broadcast in that case.
pub async fn send_to_room<M: MessageStore>(
    hub: &Mutex<Hub>,
    store: &M,
    author: &UserIdentity,
    room_id: RoomId,
    content: String,
) -> Result<RoomMessage, StoreError> {
    let stored = store
        .create_message(NewMessage {
            content: content.clone(),
            author: author.id,
            target: MessageTarget::Room(room_id),
        })
        .await?;

    let message = RoomMessage {
        id: stored.id,
        content,
        user_id: author.id,
        username: author.username.clone(),
        room_id,
        created_at: stored.created_at,
    };

    let delivered = hub.lock().await.broadcast_room(message.clone());
    tracing::debug!(user_id = %author.id, %room_id, delivered, "room message sent");
    Ok(message)
}

/// Sends a private message.
///
/// Both parties are joined to their channel first (the recipient only if
/// connected), then the message is persisted and sent to whoever is in the
/// channel. An offline recipient gets nothing later; the author still sees
/// the echo.
///
/// Returns `Ok(None)` if the author's connection went away before the
/// channel could be opened.
///
/// # Errors
/// The store's error. Nothing is broadcast in that case.
pub async fn send_private<M: MessageStore>(
    hub: &Mutex<Hub>,
    store: &M,
    conn_id: ConnectionId,
    author: &UserIdentity,
    recipient_id: UserId,
    content: String,
) -> Result<Option<PrivateMessage>, StoreError> {
    let Some(channel) = hub.lock().await.open_private_channel(conn_id, recipient_id) else {
        return Ok(None);
    };

    let stored = store
        .create_message(NewMessage {
            content: content.clone(),
            author: author.id,
            target: MessageTarget::Private(recipient_id),
        })
        .await?;

    let message = PrivateMessage {
        id: stored.id,
        content,
        user_id: author.id,
        username: author.username.clone(),
        recipient_id,
        created_at: stored.created_at,
    };

    let delivered = hub
        .lock()
        .await
        .broadcast_private(channel.clone(), message.clone());
    tracing::debug!(user_id = %author.id, %channel, delivered, "private message sent");
    Ok(Some(message))
}
