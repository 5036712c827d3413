use proptest::prelude::*;
use sockrun::drivers::client::round_trip;
use sockrun::drivers::server::accept_loop;
use sockrun::{Scheduler, StartPolicy, TcpListener, TcpStream};

use std::cell::Cell;
use std::rc::Rc;

/// Echoes `payload` through a real server task and reports whether it came back intact.
fn echo_once(payload: Vec<u8>) -> bool {
    let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap(), 4).expect("bind");
    let port = listener.local_addr().expect("local addr").port();

    let mut scheduler = Scheduler::new();
    let spawner = scheduler.spawner();
    scheduler.spawn_with(StartPolicy::Eager, async move {
        accept_loop(listener, spawner, Some(1)).await;
    });

    let intact = Rc::new(Cell::new(false));
    {
        let intact = intact.clone();
        scheduler.spawn_with(StartPolicy::Eager, async move {
            let stream = TcpStream::connect("127.0.0.1", port).await.expect("connect");
            intact.set(round_trip(&stream, &payload).await.is_ok());
        });
    }

    scheduler.run().expect("run");
    intact.get()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_payload_comes_back_unchanged(payload in prop::collection::vec(any::<u8>(), 1..=255)) {
        prop_assert!(echo_once(payload));
    }
}

#[test]
fn all_zero_payload() {
    assert!(echo_once(vec![0x00; 255]));
}

#[test]
fn all_ones_payload() {
    assert!(echo_once(vec![0xFF; 255]));
}

#[test]
fn single_byte_payload() {
    assert!(echo_once(vec![0x2A]));
}
