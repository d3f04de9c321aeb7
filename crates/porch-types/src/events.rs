use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Notification};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is authenticated and registered
    Ready { user_id: Uuid },

    /// A user came online or went offline
    PresenceUpdate { user_id: Uuid, online: bool },

    /// A direct message, either new or re-delivered during a thread sync
    MessageCreate { message: Message },

    /// Confirms a message sent over this connection was stored
    MessageAck {
        nonce: Option<String>,
        message: Message,
    },

    /// A notification was recorded for this user
    Notification { notification: Notification },

    /// The peer started typing in the conversation with this user
    TypingStart { from_user_id: Uuid },

    /// A command from this connection could not be carried out
    Error { message: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Send a direct message. Re-sending with the same nonce is a no-op.
    SendMessage {
        to: Uuid,
        text: String,
        #[serde(default)]
        nonce: Option<String>,
    },

    /// Re-deliver the thread with `with_user`, optionally only messages newer than `after`
    SyncThread {
        with_user: Uuid,
        #[serde(default)]
        after: Option<i64>,
    },

    /// Indicate typing in the conversation with `to`
    StartTyping { to: Uuid },

    /// Mark every message from `with_user` as read
    MarkRead { with_user: Uuid },
}
