#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Property-based tests for hub membership.
//!
//! Runs random sequences of join, leave, disconnect, and broadcast against a
//! [`Hub`] and a plain set-based model, checking after every step that:
//! 1. Room membership matches the model exactly.
//! 2. Rooms with no members do not exist.
//! 3. A broadcast reaches exactly the model's members (minus the sender when
//!    delivery excludes it), and nobody outside the room.

use std::collections::{BTreeMap, BTreeSet};

use axum::extract::ws::Message;
use playmate_proto::connection::ConnectionId;
use playmate_proto::event::{ChatMessage, ServerEvent};
use playmate_proto::room::RoomId;
use playmate_relay::hub::{Delivery, Hub};
use proptest::prelude::*;
use tokio::sync::mpsc;

const CONNECTIONS: usize = 4;
const ROOMS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Join(usize, usize),
    Leave(usize, usize),
    Disconnect(usize),
    Broadcast { room: usize, sender: Option<usize> },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..CONNECTIONS, 0..ROOMS).prop_map(|(c, r)| Op::Join(c, r)),
        2 => (0..CONNECTIONS, 0..ROOMS).prop_map(|(c, r)| Op::Leave(c, r)),
        1 => (0..CONNECTIONS).prop_map(Op::Disconnect),
        2 => (0..ROOMS, prop::option::of(0..CONNECTIONS))
            .prop_map(|(room, sender)| Op::Broadcast { room, sender }),
    ]
}

/// Alternates kinds so the same numeric id shows up under several kinds.
fn room(index: usize) -> RoomId {
    match index % 3 {
        0 => RoomId::team(index / 3),
        1 => RoomId::user(index / 3),
        _ => RoomId::match_room(index / 3),
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> usize {
    let mut n = 0;
    while rx.try_recv().is_ok() {
        n += 1;
    }
    n
}

proptest! {
    #[test]
    fn hub_matches_set_model(ops in prop::collection::vec(arb_op(), 1..60)) {
        let hub = Hub::new();
        let mut ids: Vec<ConnectionId> = Vec::new();
        let mut inboxes = Vec::new();
        for _ in 0..CONNECTIONS {
            let (tx, rx) = mpsc::unbounded_channel();
            ids.push(hub.connect(tx));
            inboxes.push(rx);
        }

        // connection index -> joined rooms; absent once disconnected.
        let mut model: BTreeMap<usize, BTreeSet<usize>> =
            (0..CONNECTIONS).map(|c| (c, BTreeSet::new())).collect();
        let event = ServerEvent::NewMessage(ChatMessage::new(1, "probe"));

        for op in ops {
            match op {
                Op::Join(c, r) => {
                    let changed = hub.join(ids[c], &room(r));
                    let expected = model.get_mut(&c).is_some_and(|rooms| rooms.insert(r));
                    prop_assert_eq!(changed, expected);
                }
                Op::Leave(c, r) => {
                    let changed = hub.leave(ids[c], &room(r));
                    let expected = model.get_mut(&c).is_some_and(|rooms| rooms.remove(&r));
                    prop_assert_eq!(changed, expected);
                }
                Op::Disconnect(c) => {
                    let left = hub.disconnect(ids[c]);
                    let expected = model.remove(&c);
                    prop_assert_eq!(left.map(|rooms| rooms.len()), expected.map(|rooms| rooms.len()));
                }
                Op::Broadcast { room: r, sender } => {
                    for rx in &mut inboxes {
                        drain(rx);
                    }
                    let delivery = sender.map_or(Delivery::Everyone, |s| Delivery::ExceptSender(ids[s]));
                    let delivered = hub.broadcast(&room(r), &event, delivery);

                    let mut expected = 0;
                    for (c, rx) in inboxes.iter_mut().enumerate() {
                        let member = model.get(&c).is_some_and(|rooms| rooms.contains(&r));
                        let should_receive = member && sender != Some(c);
                        prop_assert_eq!(drain(rx), usize::from(should_receive));
                        expected += usize::from(should_receive);
                    }
                    prop_assert_eq!(delivered, expected);
                }
            }

            for r in 0..ROOMS {
                let expected: BTreeSet<ConnectionId> = model
                    .iter()
                    .filter(|(_, rooms)| rooms.contains(&r))
                    .map(|(c, _)| ids[*c])
                    .collect();
                let actual: BTreeSet<ConnectionId> =
                    hub.room_members(&room(r)).into_iter().collect();
                prop_assert_eq!(actual, expected);
            }
            let live_rooms: BTreeSet<usize> = model.values().flatten().copied().collect();
            prop_assert_eq!(hub.room_count(), live_rooms.len());
            prop_assert_eq!(hub.connection_count(), model.len());
        }
    }
}
