//! Application-facing handle for server-initiated broadcasts.
//!
//! The application layer performs the authoritative state change (persisting
//! a chat message, committing a score) and then calls the matching
//! `publish_*` method. All of these deliver to every current member of the
//! target room, including whichever client triggered the change.

use std::fmt;
use std::sync::Arc;

use playmate_proto::connection::ConnectionId;
use playmate_proto::event::{
    ChatMessage, FormationUpdate, Notification, ScoreUpdate, ServerEvent,
};
use playmate_proto::room::RoomId;

use crate::hub::Delivery;
use crate::relay::RelayState;

/// Cloneable handle onto the running relay.
#[derive(Clone)]
pub struct Publisher {
    state: Arc<RelayState>,
}

impl Publisher {
    /// Wraps shared relay state. Usually obtained via
    /// [`RelayState::publisher`].
    #[must_use]
    pub const fn new(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    /// Delivers `event` to every member of `room`. Returns how many
    /// connections it was handed to.
    pub fn broadcast(&self, room: &RoomId, event: &ServerEvent) -> usize {
        self.state.hub.broadcast(room, event, Delivery::Everyone)
    }

    /// Pushes a persisted chat message to its team room as `new-message`.
    pub fn publish_message(&self, message: ChatMessage) -> usize {
        let room = message.room();
        self.broadcast(&room, &ServerEvent::NewMessage(message))
    }

    /// Pushes a committed score to `match-<match_id>` as `score-update`.
    pub fn publish_score_update(&self, match_id: impl fmt::Display, score: ScoreUpdate) -> usize {
        let room = RoomId::match_room(match_id);
        let delivered = self.broadcast(&room, &ServerEvent::ScoreUpdate(score));
        tracing::debug!(room = %room, delivered, "published score update");
        delivered
    }

    /// Pushes a notification to `user-<user_id>` as `new-notification`.
    pub fn publish_notification(
        &self,
        user_id: impl fmt::Display,
        notification: Notification,
    ) -> usize {
        self.broadcast(
            &RoomId::user(user_id),
            &ServerEvent::NewNotification(notification),
        )
    }

    /// Pushes a saved formation to its team room as `formation-update`.
    pub fn publish_formation(&self, update: FormationUpdate) -> usize {
        let room = update.room();
        self.broadcast(&room, &ServerEvent::FormationUpdate(update))
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.hub.connection_count()
    }

    /// Number of rooms with at least one member.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.state.hub.room_count()
    }

    /// Current members of `room`.
    #[must_use]
    pub fn room_members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.state.hub.room_members(room)
    }
}
