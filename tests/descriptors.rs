//! Descriptor accounting. Every test counts the whole process's open
//! descriptors, so they run one at a time.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serial_test::serial;
use sockrun::drivers::client::{ClientConfig, ClientStats, client_loop};
use sockrun::drivers::server::accept_loop;
use sockrun::{Scheduler, StartPolicy, TcpListener};

use std::rc::Rc;

fn open_descriptors() -> usize {
    std::fs::read_dir("/dev/fd").expect("list /dev/fd").count()
}

fn client_config(port: u16, connections: usize) -> Rc<ClientConfig> {
    let mut config = ClientConfig::new(port, connections);
    config.host = "127.0.0.1".into();
    config.exchanges = Some(3);
    Rc::new(config)
}

#[test]
#[serial]
fn completed_run_closes_every_socket() {
    let before = open_descriptors();

    {
        let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap(), 16).expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        let mut scheduler = Scheduler::new();
        let spawner = scheduler.spawner();
        scheduler.spawn_with(StartPolicy::Eager, async move {
            accept_loop(listener, spawner, Some(4)).await;
        });

        let config = client_config(port, 4);
        let stats = Rc::new(ClientStats::default());
        for index in 0..4 {
            scheduler.spawn_with(
                StartPolicy::Eager,
                client_loop(config.clone(), stats.clone(), StdRng::seed_from_u64(index)),
            );
        }

        scheduler.run().expect("run");
        assert_eq!(stats.report().round_trips, 12);
    }

    assert_eq!(open_descriptors(), before);
}

#[test]
#[serial]
fn dropping_a_scheduler_closes_sockets_of_unfinished_tasks() {
    let before = open_descriptors();

    {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        let scheduler = Scheduler::new();
        let config = client_config(port, 3);
        let stats = Rc::new(ClientStats::default());
        for index in 0..3 {
            scheduler.spawn_with(
                StartPolicy::Eager,
                client_loop(config.clone(), stats.clone(), StdRng::seed_from_u64(index)),
            );
        }

        // Each client holds a socket while suspended in connect or its first read.
        assert_eq!(scheduler.live_tasks(), 3);
        assert!(open_descriptors() >= before + 4);

        drop(scheduler);
        drop(listener);
    }

    assert_eq!(open_descriptors(), before);
}
