//! Property-based tests for room names and event frames.
//!
//! Uses proptest to verify:
//! 1. Any non-empty room name parses, and displays back to the same string.
//! 2. Two room ids are equal exactly when their wire names are equal.
//! 3. Entity constructors never collide across kinds.
//! 4. Arbitrary text never causes a panic in `codec::decode`.

use proptest::prelude::*;
use playmate_proto::codec;
use playmate_proto::event::{ClientEvent, ServerEvent};
use playmate_proto::room::{RoomId, RoomKind};

/// Strategy for names that look like the application's conventions.
fn arb_conventional_name() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("team-"), Just("match-"), Just("user-"), Just("")],
        "[a-z0-9]{0,12}",
    )
        .prop_map(|(prefix, id)| format!("{prefix}{id}"))
        .prop_filter("room names are non-empty", |name| !name.is_empty())
}

/// Strategy for arbitrary non-empty names, including unicode and dashes.
fn arb_any_name() -> impl Strategy<Value = String> {
    ".{1,40}"
}

proptest! {
    #[test]
    fn conventional_names_survive_display(name in arb_conventional_name()) {
        let room = RoomId::parse(name.clone()).unwrap();
        prop_assert_eq!(room.to_string(), name);
    }

    #[test]
    fn arbitrary_names_survive_display(name in arb_any_name()) {
        let room = RoomId::parse(name.clone()).unwrap();
        prop_assert_eq!(room.to_string(), name);
    }

    #[test]
    fn equality_follows_wire_name(a in arb_conventional_name(), b in arb_conventional_name()) {
        let ra = RoomId::parse(a.clone()).unwrap();
        let rb = RoomId::parse(b.clone()).unwrap();
        prop_assert_eq!(ra == rb, a == b);
    }

    #[test]
    fn entity_kinds_never_collide(id in "[a-z0-9]{1,12}") {
        let team = RoomId::team(&id);
        let game = RoomId::match_room(&id);
        let user = RoomId::user(&id);
        prop_assert_eq!(team.kind(), RoomKind::Team);
        prop_assert_eq!(game.kind(), RoomKind::Match);
        prop_assert_eq!(user.kind(), RoomKind::User);
        prop_assert_ne!(&team, &game);
        prop_assert_ne!(&team, &user);
        prop_assert_ne!(&game, &user);
    }

    #[test]
    fn join_frames_decode_for_any_name(name in arb_any_name()) {
        let frame = serde_json::json!({"event": "join-room", "data": name}).to_string();
        let event: ClientEvent = codec::decode(&frame).unwrap();
        prop_assert_eq!(event, ClientEvent::JoinRoom(RoomId::parse(name).unwrap()));
    }

    #[test]
    fn random_text_never_panics(text in ".{0,256}") {
        let _ = codec::decode::<ClientEvent>(&text);
        let _ = codec::decode::<ServerEvent>(&text);
    }
}
