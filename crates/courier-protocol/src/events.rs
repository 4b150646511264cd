//! Event types for the Courier wire protocol.
//!
//! Events are tagged JSON objects exchanged over a persistent connection.
//! [`ClientEvent`] covers everything a client may send; [`ServerEvent`] is
//! the full outbound catalogue. Field names are camelCase on the wire and
//! optional fields are omitted entirely when absent.

use serde::{Deserialize, Serialize};

use crate::timestamp::now_iso8601;

/// A user as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    /// Stable user identifier.
    pub user_id: String,
    /// Display name.
    pub nickname: String,
}

impl UserRef {
    /// Create a new user reference.
    #[must_use]
    pub fn new(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            nickname: nickname.into(),
        }
    }
}

/// An inbound event from a client.
///
/// Unknown fields are ignored during deserialization; unknown event types
/// never reach this enum (see [`crate::codec::decode_client`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Bind a verified identity to the connection.
    #[serde(rename_all = "camelCase")]
    Authenticate {
        user_id: String,
        nickname: String,
        token: String,
    },

    /// Join a room.
    #[serde(rename_all = "camelCase")]
    JoinChat { chat_id: String, user_id: String },

    /// Leave a room.
    #[serde(rename_all = "camelCase")]
    LeaveChat { chat_id: String, user_id: String },

    /// Start (or refresh) the typing indicator for a room.
    #[serde(rename_all = "camelCase")]
    TypingStart {
        chat_id: String,
        user_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
    },

    /// Explicitly stop the typing indicator for a room.
    #[serde(rename_all = "camelCase")]
    TypingStop { chat_id: String, user_id: String },

    /// React to a message. Stateless relay.
    #[serde(rename_all = "camelCase")]
    MessageReaction {
        message_id: String,
        chat_id: String,
        reaction: String,
        user_id: String,
    },

    /// Mark a message as read. Stateless relay.
    #[serde(rename_all = "camelCase")]
    MessageRead {
        message_id: String,
        chat_id: String,
        user_id: String,
    },

    /// Announce a status change to every joined room.
    #[serde(rename_all = "camelCase")]
    PresenceUpdate {
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        custom_message: Option<String>,
    },
}

impl ClientEvent {
    /// The wire tag of this event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::Authenticate { .. } => "authenticate",
            ClientEvent::JoinChat { .. } => "join_chat",
            ClientEvent::LeaveChat { .. } => "leave_chat",
            ClientEvent::TypingStart { .. } => "typing_start",
            ClientEvent::TypingStop { .. } => "typing_stop",
            ClientEvent::MessageReaction { .. } => "message_reaction",
            ClientEvent::MessageRead { .. } => "message_read",
            ClientEvent::PresenceUpdate { .. } => "presence_update",
        }
    }

    /// Whether `event_type` names a known inbound event.
    #[must_use]
    pub fn is_known_type(event_type: &str) -> bool {
        matches!(
            event_type,
            "authenticate"
                | "join_chat"
                | "leave_chat"
                | "typing_start"
                | "typing_stop"
                | "message_reaction"
                | "message_read"
                | "presence_update"
        )
    }
}

/// An outbound event to a client.
///
/// This catalogue is the compatibility surface for every client: tags,
/// field names, and optionality are exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Reply to a successful `authenticate`.
    #[serde(rename_all = "camelCase")]
    Authenticated { success: bool, user: UserRef },

    /// Authentication or `authenticate` validation failure.
    AuthError { error: String },

    /// A user came online. Broadcast to all connections.
    #[serde(rename_all = "camelCase")]
    UserOnline {
        user_id: String,
        nickname: String,
        timestamp: String,
    },

    /// Reply to the joining connection with the post-join member count.
    #[serde(rename_all = "camelCase")]
    ChatJoined {
        chat_id: String,
        participants: usize,
        timestamp: String,
    },

    /// A user joined a room. Broadcast to the rest of that room.
    #[serde(rename_all = "camelCase")]
    UserJoinedChat {
        user_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
        chat_id: String,
        timestamp: String,
    },

    /// `join_chat` failure.
    JoinChatError { error: String },

    /// A user left a room. Broadcast to the remaining members.
    #[serde(rename_all = "camelCase")]
    UserLeftChat {
        user_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
        chat_id: String,
        timestamp: String,
    },

    /// `leave_chat` failure.
    LeaveChatError { error: String },

    /// A user started typing in a room.
    #[serde(rename_all = "camelCase")]
    UserTyping {
        user_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
        chat_id: String,
        timestamp: String,
    },

    /// A user stopped typing in a room, explicitly or by expiry.
    #[serde(rename_all = "camelCase")]
    UserStoppedTyping {
        user_id: String,
        chat_id: String,
        timestamp: String,
    },

    /// `typing_start` failure.
    TypingStartError { error: String },

    /// `typing_stop` failure.
    TypingStopError { error: String },

    /// A reaction was added to a message.
    #[serde(rename_all = "camelCase")]
    MessageReactionAdded {
        message_id: String,
        chat_id: String,
        reaction: String,
        user_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        nickname: Option<String>,
        timestamp: String,
    },

    /// `message_reaction` failure.
    MessageReactionError { error: String },

    /// A message was read.
    #[serde(rename_all = "camelCase")]
    MessageReadStatus {
        message_id: String,
        chat_id: String,
        user_id: String,
        timestamp: String,
    },

    /// `message_read` failure.
    MessageReadError { error: String },

    /// A user changed presence status. Scoped to joined rooms.
    #[serde(rename_all = "camelCase")]
    UserPresenceChanged {
        user_id: String,
        nickname: String,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        custom_message: Option<String>,
        timestamp: String,
    },

    /// `presence_update` failure.
    PresenceUpdateError { error: String },

    /// A user went offline. `chat_id` is set on the room-scoped copies and
    /// absent on the global one.
    #[serde(rename_all = "camelCase")]
    UserOffline {
        user_id: String,
        nickname: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        chat_id: Option<String>,
        timestamp: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl ServerEvent {
    /// The wire tag of this event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::Authenticated { .. } => "authenticated",
            ServerEvent::AuthError { .. } => "auth_error",
            ServerEvent::UserOnline { .. } => "user_online",
            ServerEvent::ChatJoined { .. } => "chat_joined",
            ServerEvent::UserJoinedChat { .. } => "user_joined_chat",
            ServerEvent::JoinChatError { .. } => "join_chat_error",
            ServerEvent::UserLeftChat { .. } => "user_left_chat",
            ServerEvent::LeaveChatError { .. } => "leave_chat_error",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::UserStoppedTyping { .. } => "user_stopped_typing",
            ServerEvent::TypingStartError { .. } => "typing_start_error",
            ServerEvent::TypingStopError { .. } => "typing_stop_error",
            ServerEvent::MessageReactionAdded { .. } => "message_reaction_added",
            ServerEvent::MessageReactionError { .. } => "message_reaction_error",
            ServerEvent::MessageReadStatus { .. } => "message_read_status",
            ServerEvent::MessageReadError { .. } => "message_read_error",
            ServerEvent::UserPresenceChanged { .. } => "user_presence_changed",
            ServerEvent::PresenceUpdateError { .. } => "presence_update_error",
            ServerEvent::UserOffline { .. } => "user_offline",
        }
    }

    /// Create a successful `authenticated` reply.
    #[must_use]
    pub fn authenticated(user: UserRef) -> Self {
        ServerEvent::Authenticated {
            success: true,
            user,
        }
    }

    /// Create a `user_online` broadcast, stamped now.
    #[must_use]
    pub fn user_online(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        ServerEvent::UserOnline {
            user_id: user_id.into(),
            nickname: nickname.into(),
            timestamp: now_iso8601(),
        }
    }

    /// Create a `chat_joined` reply, stamped now.
    #[must_use]
    pub fn chat_joined(chat_id: impl Into<String>, participants: usize) -> Self {
        ServerEvent::ChatJoined {
            chat_id: chat_id.into(),
            participants,
            timestamp: now_iso8601(),
        }
    }

    /// Create a `user_joined_chat` broadcast, stamped now.
    #[must_use]
    pub fn user_joined_chat(
        user_id: impl Into<String>,
        nickname: Option<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        ServerEvent::UserJoinedChat {
            user_id: user_id.into(),
            nickname,
            chat_id: chat_id.into(),
            timestamp: now_iso8601(),
        }
    }

    /// Create a `user_left_chat` broadcast, stamped now.
    #[must_use]
    pub fn user_left_chat(
        user_id: impl Into<String>,
        nickname: Option<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        ServerEvent::UserLeftChat {
            user_id: user_id.into(),
            nickname,
            chat_id: chat_id.into(),
            timestamp: now_iso8601(),
        }
    }

    /// Create a `user_typing` broadcast, stamped now.
    #[must_use]
    pub fn user_typing(
        user_id: impl Into<String>,
        nickname: Option<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        ServerEvent::UserTyping {
            user_id: user_id.into(),
            nickname,
            chat_id: chat_id.into(),
            timestamp: now_iso8601(),
        }
    }

    /// Create a `user_stopped_typing` broadcast, stamped now.
    #[must_use]
    pub fn user_stopped_typing(user_id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        ServerEvent::UserStoppedTyping {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            timestamp: now_iso8601(),
        }
    }

    /// Create a `message_reaction_added` broadcast, stamped now.
    #[must_use]
    pub fn message_reaction_added(
        message_id: impl Into<String>,
        chat_id: impl Into<String>,
        reaction: impl Into<String>,
        user_id: impl Into<String>,
        nickname: Option<String>,
    ) -> Self {
        ServerEvent::MessageReactionAdded {
            message_id: message_id.into(),
            chat_id: chat_id.into(),
            reaction: reaction.into(),
            user_id: user_id.into(),
            nickname,
            timestamp: now_iso8601(),
        }
    }

    /// Create a `message_read_status` broadcast, stamped now.
    #[must_use]
    pub fn message_read_status(
        message_id: impl Into<String>,
        chat_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        ServerEvent::MessageReadStatus {
            message_id: message_id.into(),
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            timestamp: now_iso8601(),
        }
    }

    /// Create a `user_presence_changed` broadcast, stamped now.
    #[must_use]
    pub fn user_presence_changed(
        user_id: impl Into<String>,
        nickname: impl Into<String>,
        status: impl Into<String>,
        custom_message: Option<String>,
    ) -> Self {
        ServerEvent::UserPresenceChanged {
            user_id: user_id.into(),
            nickname: nickname.into(),
            status: status.into(),
            custom_message,
            timestamp: now_iso8601(),
        }
    }

    /// Create a `user_offline` broadcast, stamped now.
    #[must_use]
    pub fn user_offline(
        user_id: impl Into<String>,
        nickname: impl Into<String>,
        chat_id: Option<String>,
        reason: Option<String>,
    ) -> Self {
        ServerEvent::UserOffline {
            user_id: user_id.into(),
            nickname: nickname.into(),
            chat_id,
            timestamp: now_iso8601(),
            reason,
        }
    }

    /// Create the scoped error event for a failed inbound operation.
    ///
    /// `authenticate` maps to `auth_error`; every other operation maps to
    /// `<op>_error`. Returns `None` for unrecognized operations.
    #[must_use]
    pub fn operation_error(op: &str, error: impl Into<String>) -> Option<Self> {
        let error = error.into();
        Some(match op {
            "authenticate" => ServerEvent::AuthError { error },
            "join_chat" => ServerEvent::JoinChatError { error },
            "leave_chat" => ServerEvent::LeaveChatError { error },
            "typing_start" => ServerEvent::TypingStartError { error },
            "typing_stop" => ServerEvent::TypingStopError { error },
            "message_reaction" => ServerEvent::MessageReactionError { error },
            "message_read" => ServerEvent::MessageReadError { error },
            "presence_update" => ServerEvent::PresenceUpdateError { error },
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(event: &ServerEvent) -> Value {
        serde_json::to_value(event).unwrap()
    }

    #[test]
    fn test_client_event_type() {
        let event = ClientEvent::JoinChat {
            chat_id: "c1".into(),
            user_id: "u1".into(),
        };
        assert_eq!(event.event_type(), "join_chat");
    }

    #[test]
    fn test_known_types() {
        assert!(ClientEvent::is_known_type("authenticate"));
        assert!(ClientEvent::is_known_type("presence_update"));
        assert!(!ClientEvent::is_known_type("send_message"));
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let value = to_value(&ServerEvent::user_online("u1", "Alice"));
        assert_eq!(value["type"], "user_online");
        assert_eq!(value["userId"], "u1");
        assert_eq!(value["nickname"], "Alice");
        assert!(value["timestamp"].is_string());

        let value = to_value(&ServerEvent::chat_joined("c1", 2));
        assert_eq!(value["type"], "chat_joined");
        assert_eq!(value["chatId"], "c1");
        assert_eq!(value["participants"], 2);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let value = to_value(&ServerEvent::user_offline("u1", "Alice", None, None));
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("chatId"));
        assert!(!object.contains_key("reason"));

        let value = to_value(&ServerEvent::user_offline(
            "u1",
            "Alice",
            Some("c1".into()),
            Some("client disconnect".into()),
        ));
        assert_eq!(value["chatId"], "c1");
        assert_eq!(value["reason"], "client disconnect");
    }

    #[test]
    fn test_authenticated_reply_shape() {
        let value = to_value(&ServerEvent::authenticated(UserRef::new("u1", "Alice")));
        assert_eq!(value["type"], "authenticated");
        assert_eq!(value["success"], true);
        assert_eq!(value["user"]["userId"], "u1");
        assert_eq!(value["user"]["nickname"], "Alice");
    }

    #[test]
    fn test_operation_error_mapping() {
        let event = ServerEvent::operation_error("authenticate", "bad token").unwrap();
        assert_eq!(event.event_type(), "auth_error");

        let event = ServerEvent::operation_error("join_chat", "missing chatId").unwrap();
        assert_eq!(event.event_type(), "join_chat_error");

        let event = ServerEvent::operation_error("presence_update", "oops").unwrap();
        assert_eq!(event.event_type(), "presence_update_error");

        assert!(ServerEvent::operation_error("send_message", "oops").is_none());
    }

    #[test]
    fn test_client_event_ignores_unknown_fields() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "join_chat",
            "chatId": "c1",
            "userId": "u1",
            "color": "teal"
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinChat {
                chat_id: "c1".into(),
                user_id: "u1".into(),
            }
        );
    }

    #[test]
    fn test_typing_start_nickname_optional() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "typing_start",
            "chatId": "c1",
            "userId": "u1"
        }))
        .unwrap();
        match event {
            ClientEvent::TypingStart { nickname, .. } => assert!(nickname.is_none()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
