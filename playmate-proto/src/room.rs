//! Structured room identifiers.
//!
//! A room is keyed internally by its entity kind and id, so a team and a user
//! that happen to share an id never land in the same room. The flat
//! `"<kind>-<id>"` string form only exists at the wire boundary.
//!
//! Any other non-empty string is accepted as an opaque [`RoomKind::Named`]
//! room; the relay enforces no naming format beyond non-emptiness.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors produced when parsing a room name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomIdError {
    /// Room names must contain at least one character.
    #[error("room name must not be empty")]
    Empty,
}

/// The entity a room is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoomKind {
    /// Team chat and formation updates (`team-<id>`).
    Team,
    /// Live score updates for one match (`match-<id>`).
    Match,
    /// Per-user notification feed (`user-<id>`).
    User,
    /// Any other caller-chosen room name.
    Named,
}

impl RoomKind {
    const PREFIXED: [Self; 3] = [Self::Team, Self::Match, Self::User];

    const fn prefix(self) -> &'static str {
        match self {
            Self::Team => "team-",
            Self::Match => "match-",
            Self::User => "user-",
            Self::Named => "",
        }
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Team => write!(f, "team"),
            Self::Match => write!(f, "match"),
            Self::User => write!(f, "user"),
            Self::Named => write!(f, "named"),
        }
    }
}

/// Identifier of a broadcast room.
///
/// Always held in canonical form: a name that matches one of the entity
/// prefixes with a non-empty id is stored as that kind, everything else as
/// [`RoomKind::Named`]. Two `RoomId`s are equal exactly when their wire
/// names are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId {
    kind: RoomKind,
    id: String,
}

impl RoomId {
    /// Room for a team's chat and formation feed.
    #[must_use]
    pub fn team(id: impl fmt::Display) -> Self {
        Self::classify(format!("team-{id}"))
    }

    /// Room for a match's live score feed.
    #[must_use]
    pub fn match_room(id: impl fmt::Display) -> Self {
        Self::classify(format!("match-{id}"))
    }

    /// Room for a user's notification feed.
    #[must_use]
    pub fn user(id: impl fmt::Display) -> Self {
        Self::classify(format!("user-{id}"))
    }

    /// Parses a wire room name.
    ///
    /// # Errors
    ///
    /// Returns [`RoomIdError::Empty`] if `name` is empty.
    pub fn parse(name: impl Into<String>) -> Result<Self, RoomIdError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RoomIdError::Empty);
        }
        Ok(Self::classify(name))
    }

    /// Returns the entity kind this room is scoped to.
    #[must_use]
    pub const fn kind(&self) -> RoomKind {
        self.kind
    }

    /// Returns the entity id, or the whole name for [`RoomKind::Named`] rooms.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sorts a non-empty name into its canonical kind.
    fn classify(name: String) -> Self {
        for kind in RoomKind::PREFIXED {
            if let Some(id) = name.strip_prefix(kind.prefix())
                && !id.is_empty()
            {
                return Self {
                    kind,
                    id: id.to_string(),
                };
            }
        }
        Self {
            kind: RoomKind::Named,
            id: name,
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.id)
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::parse(name).map_err(serde::de::Error::custom)
    }
}
