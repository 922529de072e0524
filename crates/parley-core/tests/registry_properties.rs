//! Property-based tests for the client registry and transfer accounting
//!
//! Drives the registry with arbitrary register/unregister/name sequences and
//! checks the invariants the broadcaster relies on: size tracks accepts minus
//! closes, snapshots are in accept order, and names are written once.

use std::net::SocketAddr;

use parley_core::{ClientRegistry, ConnectionId, TransferSession};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Accept,
    Close(usize),
    Name(usize, String),
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Accept),
        2 => any::<usize>().prop_map(Op::Close),
        2 => (any::<usize>(), "[a-z]{1,8}").prop_map(|(i, name)| Op::Name(i, name)),
    ]
}

fn peer(n: usize) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 20000 + (n % 40000) as u16))
}

proptest! {
    #[test]
    fn prop_registry_tracks_live_connections(ops in prop::collection::vec(arbitrary_op(), 0..200)) {
        let mut registry = ClientRegistry::new();
        let mut live: Vec<ConnectionId> = Vec::new();
        let mut names: Vec<(ConnectionId, String)> = Vec::new();
        let mut accepts = 0usize;
        let mut closes = 0usize;

        for op in ops {
            match op {
                Op::Accept => {
                    let id = registry.register(peer(accepts), accepts);
                    accepts += 1;
                    live.push(id);
                },
                Op::Close(i) if !live.is_empty() => {
                    let id = live.remove(i % live.len());
                    prop_assert!(registry.unregister(id).is_some());
                    closes += 1;
                },
                Op::Name(i, name) if !live.is_empty() => {
                    let id = live[i % live.len()];
                    let first = !names.iter().any(|(named, _)| *named == id);
                    prop_assert_eq!(registry.set_name(id, name.clone()), first);
                    if first {
                        names.push((id, name));
                    }
                },
                _ => {},
            }

            prop_assert_eq!(registry.len(), accepts - closes);
        }

        let snapshot: Vec<ConnectionId> =
            registry.snapshot().into_iter().map(|(id, _)| id).collect();
        prop_assert_eq!(&snapshot, &live);

        for (id, name) in names.iter().filter(|(id, _)| registry.contains(*id)) {
            prop_assert_eq!(registry.name(*id), Some(name.as_str()));
        }
    }

    /// However the payload is chunked, the session accepts exactly the
    /// declared number of bytes and they are the payload prefix.
    #[test]
    fn prop_session_accepts_exact_prefix(
        payload in prop::collection::vec(any::<u8>(), 1..512),
        declared in 1u64..512,
        splits in prop::collection::vec(1usize..64, 1..32),
    ) {
        let mut session = TransferSession::upload("f", declared);
        let mut stored = Vec::new();
        let mut rest = &payload[..];

        for split in splits.iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let (chunk, tail) = rest.split_at((*split).min(rest.len()));
            stored.extend_from_slice(session.accept(chunk));
            rest = tail;
        }

        let expected = (declared as usize).min(payload.len());
        prop_assert_eq!(&stored[..], &payload[..expected]);
        prop_assert_eq!(session.is_complete(), payload.len() as u64 >= declared);
    }
}
