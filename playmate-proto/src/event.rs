//! Event vocabulary exchanged over a relay connection.
//!
//! Events are adjacently tagged: `{"event": "send-message", "data": {...}}`.
//! [`ClientEvent`] covers what a client may send, [`ServerEvent`] what the
//! relay (or the application, through the relay) emits. Payload fields beyond
//! the typed core are captured in `extra` maps and carried through verbatim.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use crate::connection::ConnectionId;
use crate::room::RoomId;

/// Identifier of an application entity (team, match, user).
///
/// Accepts any JSON number or a non-empty JSON string and re-serializes in
/// the same form it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric id, kept as the JSON number that was sent.
    Number(Number),
    /// String id (cuid, uuid, slug).
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.is_f64() => match n.as_f64() {
                // `42.0` names the same room as `42`.
                Some(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.0}"),
                _ => write!(f, "{n}"),
            },
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for EntityId {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<u32> for EntityId {
    fn from(n: u32) -> Self {
        Self::Number(n.into())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(Number),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::Number(n)),
            Raw::Text(s) if s.is_empty() => {
                Err(serde::de::Error::custom("entity id must not be empty"))
            }
            Raw::Text(s) => Ok(Self::Text(s)),
        }
    }
}

/// A team chat message.
///
/// Sent by a client as `send-message` and fanned out to `team-<teamId>` as
/// `new-message`. Only `teamId` is interpreted; the rest of the record is
/// relayed as received, whatever its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Team whose chat room receives the message.
    pub team_id: EntityId,
    /// Every other field of the message record (content, id, sender,
    /// timestamps).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// Builds a message carrying only a text `content` field.
    #[must_use]
    pub fn new(team_id: impl Into<EntityId>, content: impl Into<String>) -> Self {
        let mut extra = Map::new();
        extra.insert("content".to_string(), Value::String(content.into()));
        Self {
            team_id: team_id.into(),
            extra,
        }
    }

    /// The `content` field, if the sender included one.
    #[must_use]
    pub fn content(&self) -> Option<&Value> {
        self.extra.get("content")
    }

    /// Room this message is delivered to.
    #[must_use]
    pub fn room(&self) -> RoomId {
        RoomId::team(&self.team_id)
    }
}

/// A change to a team's tactical formation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormationUpdate {
    /// Team whose room receives the update.
    pub team_id: EntityId,
    /// Formation descriptor, player positions, and anything else sent along.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FormationUpdate {
    /// Builds an update with a formation descriptor and player positions.
    #[must_use]
    pub fn new(team_id: impl Into<EntityId>, formation: Value, players: Value) -> Self {
        let mut extra = Map::new();
        extra.insert("formation".to_string(), formation);
        extra.insert("players".to_string(), players);
        Self {
            team_id: team_id.into(),
            extra,
        }
    }

    /// Formation descriptor, e.g. `"4-4-2"` or a structured layout.
    #[must_use]
    pub fn formation(&self) -> Option<&Value> {
        self.extra.get("formation")
    }

    /// Player positions.
    #[must_use]
    pub fn players(&self) -> Option<&Value> {
        self.extra.get("players")
    }

    /// Room this update is delivered to.
    #[must_use]
    pub fn room(&self) -> RoomId {
        RoomId::team(&self.team_id)
    }
}

/// Lifecycle status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    HalfTime,
    Completed,
    Cancelled,
}

/// Current score of a match, pushed to `match-<id>` after it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdate {
    pub home_score: u32,
    pub away_score: u32,
    pub status: MatchStatus,
}

/// A notification record addressed to one user. Shape is owned by the
/// application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Notification(pub Value);

/// Greeting sent by the relay as the first frame on every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connected {
    /// Identifier assigned to this connection.
    pub connection_id: ConnectionId,
}

/// Events a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Subscribe this connection to a room.
    JoinRoom(RoomId),
    /// Unsubscribe this connection from a room.
    LeaveRoom(RoomId),
    /// Post a chat message to the team room (echoed back to the sender too).
    SendMessage(ChatMessage),
    /// Share a formation change with the rest of the team room.
    FormationUpdate(FormationUpdate),
}

impl ClientEvent {
    /// Wire name of this event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "join-room",
            Self::LeaveRoom(_) => "leave-room",
            Self::SendMessage(_) => "send-message",
            Self::FormationUpdate(_) => "formation-update",
        }
    }
}

/// Events delivered to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(Connected),
    NewMessage(ChatMessage),
    ScoreUpdate(ScoreUpdate),
    NewNotification(Notification),
    FormationUpdate(FormationUpdate),
}

impl ServerEvent {
    /// Wire name of this event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::NewMessage(_) => "new-message",
            Self::ScoreUpdate(_) => "score-update",
            Self::NewNotification(_) => "new-notification",
            Self::FormationUpdate(_) => "formation-update",
        }
    }
}
