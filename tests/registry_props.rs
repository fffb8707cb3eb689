//! Property-based tests for collector registration.
//!
//! Random sequences of add and remove operations are applied to a backend
//! whose dialer refuses everything, and the registry is compared with a
//! simple model after every step.

use std::{collections::BTreeSet, sync::Arc};

use femtologging_tcp::{
    AddServerError, ConnectionStatus, Endpoint, FemtoTcpBackend, ManualClock, RemoveServerError,
    TcpBackendBuilder, Tick,
};
use proptest::prelude::*;

mod test_utils;
use test_utils::RefusingDialer;

#[derive(Clone, Debug)]
enum Op {
    Add(Endpoint),
    Remove(Endpoint),
}

fn endpoint() -> impl Strategy<Value = Endpoint> {
    // A small address space so duplicates and removals actually collide.
    (0u8..4, 1u16..4).prop_map(|(host, port)| Endpoint::from(([10, 0, 0, host], port)))
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => endpoint().prop_map(Op::Add),
        1 => endpoint().prop_map(Op::Remove),
    ]
}

fn backend(max_servers: usize) -> FemtoTcpBackend {
    TcpBackendBuilder::new()
        .with_max_servers(max_servers)
        .build_with(
            Box::new(RefusingDialer),
            Arc::new(ManualClock::starting_at(Tick(0))),
        )
        .expect("build backend")
}

proptest! {
    #[test]
    fn registry_matches_model(
        max_servers in 1usize..6,
        ops in proptest::collection::vec(op(), 1..40),
    ) {
        let backend = backend(max_servers);
        let mut model = BTreeSet::new();

        for op in ops {
            match op {
                Op::Add(endpoint) => {
                    let result = backend.add_server(endpoint);
                    if model.contains(&endpoint) {
                        prop_assert_eq!(result, Err(AddServerError::DuplicateEndpoint(endpoint)));
                    } else if model.len() >= max_servers {
                        prop_assert_eq!(
                            result,
                            Err(AddServerError::CapacityExceeded { max: max_servers })
                        );
                    } else {
                        prop_assert_eq!(result, Ok(()));
                        model.insert(endpoint);
                    }
                }
                Op::Remove(endpoint) => {
                    let result = backend.remove_server(endpoint);
                    if model.remove(&endpoint) {
                        prop_assert_eq!(result, Ok(()));
                    } else {
                        prop_assert_eq!(result, Err(RemoveServerError::UnknownEndpoint(endpoint)));
                    }
                }
            }

            let snapshot = backend.snapshot();
            prop_assert!(snapshot.len() <= max_servers);
            let registered: BTreeSet<_> = snapshot.iter().map(|s| s.endpoint).collect();
            prop_assert_eq!(registered.len(), snapshot.len(), "no duplicates");
            prop_assert_eq!(&registered, &model);
            let all_down = snapshot
                .iter()
                .all(|s| matches!(s.status, ConnectionStatus::Down { .. }));
            prop_assert!(all_down);
        }
    }
}
