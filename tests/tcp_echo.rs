use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sockrun::drivers::client::{
    ClientConfig, ClientReport, ClientStats, client_loop, exchange, round_trip, run_clients,
};
use sockrun::drivers::server::{AcceptStats, Acceptor, accept_loop, serve_listener};
use sockrun::{Error, Result, Scheduler, StartPolicy, TcpListener, TcpStream};

use std::cell::{Cell, RefCell};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::rc::Rc;
use std::thread;

fn loopback_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0".parse().unwrap(), 16).expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

#[test]
fn client_and_server_share_one_scheduler() {
    let (listener, port) = loopback_listener();
    let mut scheduler = Scheduler::new();
    let spawner = scheduler.spawner();

    let stats = Rc::new(Cell::new(AcceptStats::default()));
    {
        let stats = stats.clone();
        scheduler.spawn_with(StartPolicy::Eager, async move {
            stats.set(accept_loop(listener, spawner, Some(1)).await);
        });
    }

    let echoed = Rc::new(RefCell::new(None));
    {
        let echoed = echoed.clone();
        scheduler.spawn_with(StartPolicy::Eager, async move {
            let stream = TcpStream::connect("127.0.0.1", port).await.expect("connect");
            let reply = exchange(&stream, &[1, 2, 3, 4, 5]).await.expect("exchange");
            *echoed.borrow_mut() = Some(reply);
        });
    }

    let summary = scheduler.run().expect("run");

    assert_eq!(*echoed.borrow(), Some(vec![1, 2, 3, 4, 5]));
    assert_eq!(stats.get(), AcceptStats { accepted: 1, failures: 0 });
    // accept loop, client and the echo task it spawned
    assert_eq!(summary.completed, 3);
}

#[test]
fn server_echoes_frames_from_a_blocking_client() {
    let (listener, port) = loopback_listener();
    let server = thread::spawn(move || serve_listener(listener, Some(1)));

    let mut client = std::net::TcpStream::connect(("127.0.0.1", port)).expect("connect");
    client.write_all(&[0x05, 1, 2, 3, 4, 5]).expect("send frame");
    let mut echoed = [0u8; 5];
    client.read_exact(&mut echoed).expect("read echo");
    assert_eq!(echoed, [1, 2, 3, 4, 5]);

    // An empty frame is echoed as nothing; the next frame still round-trips.
    client.write_all(&[0x00, 0x01, 0xAB]).expect("send frames");
    let mut echoed = [0u8; 1];
    client.read_exact(&mut echoed).expect("read echo");
    assert_eq!(echoed, [0xAB]);

    drop(client);

    let stats = server.join().expect("server thread").expect("serve");
    assert_eq!(stats, AcceptStats { accepted: 1, failures: 0 });
}

#[test]
fn closed_client_releases_its_connection_task_while_the_server_runs() {
    let (listener, port) = loopback_listener();

    let client = thread::spawn(move || {
        let mut stream = std::net::TcpStream::connect(("127.0.0.1", port)).expect("connect");
        stream.write_all(&[0x05, 1, 2, 3, 4, 5]).expect("send frame");
        let mut echoed = [0u8; 5];
        stream.read_exact(&mut echoed).expect("read echo");

        // Half-close: the server task sees EOF at a frame boundary, finishes
        // and closes its end, which shows up here as EOF.
        stream.shutdown(std::net::Shutdown::Write).expect("shutdown");
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).expect("read to EOF");

        // Only now let the accept loop reach its limit.
        drop(std::net::TcpStream::connect(("127.0.0.1", port)).expect("second connect"));
        (echoed, rest)
    });

    let mut scheduler = Scheduler::new();
    let spawner = scheduler.spawner();
    scheduler.spawn_with(StartPolicy::Eager, async move {
        accept_loop(listener, spawner, Some(2)).await;
    });

    let summary = scheduler.run().expect("run");
    let (echoed, rest) = client.join().expect("client thread");

    assert_eq!(echoed, [1, 2, 3, 4, 5]);
    assert_eq!(rest, Vec::<u8>::new());
    // accept loop plus both connection tasks
    assert_eq!(summary.completed, 3);
    assert_eq!(scheduler.task_states(), Vec::new());
}

/// Fails the first few accepts before handing over to a real listener.
struct FlakyAcceptor {
    listener: TcpListener,
    failures_left: Cell<usize>,
}

impl Acceptor for FlakyAcceptor {
    async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        if self.failures_left.get() > 0 {
            self.failures_left.set(self.failures_left.get() - 1);
            return Err(Error::Transfer(io::Error::from_raw_os_error(libc::ECONNABORTED)));
        }
        self.listener.accept().await
    }
}

#[test]
fn accept_failures_do_not_stop_the_loop() {
    let (listener, port) = loopback_listener();
    let acceptor = FlakyAcceptor {
        listener,
        failures_left: Cell::new(2),
    };

    let mut scheduler = Scheduler::new();
    let spawner = scheduler.spawner();
    let stats = Rc::new(Cell::new(AcceptStats::default()));
    {
        let stats = stats.clone();
        scheduler.spawn_with(StartPolicy::Eager, async move {
            stats.set(accept_loop(acceptor, spawner, Some(1)).await);
        });
    }

    let ok = Rc::new(Cell::new(false));
    {
        let ok = ok.clone();
        scheduler.spawn(async move {
            let stream = TcpStream::connect("127.0.0.1", port).await.expect("connect");
            round_trip(&stream, b"still serving").await.expect("round trip");
            ok.set(true);
        });
    }

    scheduler.run().expect("run");

    assert!(ok.get());
    assert_eq!(stats.get(), AcceptStats { accepted: 1, failures: 2 });
}

#[test]
fn many_clients_interleave_with_the_server() {
    const CLIENTS: u64 = 8;
    const EXCHANGES: u64 = 10;

    let (listener, port) = loopback_listener();
    let mut scheduler = Scheduler::new();
    let spawner = scheduler.spawner();

    let accepted = Rc::new(Cell::new(AcceptStats::default()));
    {
        let accepted = accepted.clone();
        scheduler.spawn_with(StartPolicy::Eager, async move {
            accepted.set(accept_loop(listener, spawner, Some(CLIENTS as usize)).await);
        });
    }

    let mut config = ClientConfig::new(port, CLIENTS as usize);
    config.host = "127.0.0.1".into();
    config.max_payload = 255;
    config.exchanges = Some(EXCHANGES);
    let config = Rc::new(config);
    let stats = Rc::new(ClientStats::default());

    for index in 0..CLIENTS {
        scheduler.spawn_with(
            StartPolicy::Eager,
            client_loop(config.clone(), stats.clone(), StdRng::seed_from_u64(index)),
        );
    }

    scheduler.run().expect("run");

    assert_eq!(
        stats.report(),
        ClientReport {
            connected: CLIENTS as usize,
            round_trips: CLIENTS * EXCHANGES,
            failures: 0,
        }
    );
    assert_eq!(accepted.get().accepted, CLIENTS as usize);
}

#[test]
fn run_clients_against_a_threaded_server() {
    let (listener, port) = loopback_listener();
    let server = thread::spawn(move || serve_listener(listener, Some(3)));

    let mut config = ClientConfig::new(port, 3);
    config.host = "127.0.0.1".into();
    config.exchanges = Some(5);
    config.seed = Some(7);

    let report = run_clients(config).expect("clients");
    assert_eq!(
        report,
        ClientReport {
            connected: 3,
            round_trips: 15,
            failures: 0,
        }
    );

    let stats = server.join().expect("server thread").expect("serve");
    assert_eq!(stats, AcceptStats { accepted: 3, failures: 0 });
}

#[test]
fn corrupted_echo_is_reported_as_a_mismatch() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();

    let server = thread::spawn(move || {
        let (mut peer, _) = listener.accept().expect("accept");
        let mut prefix = [0u8; 1];
        peer.read_exact(&mut prefix).expect("prefix");
        let mut payload = vec![0u8; prefix[0] as usize];
        peer.read_exact(&mut payload).expect("payload");
        payload[2] ^= 0xFF;
        peer.write_all(&payload).expect("echo");
    });

    let outcome = Rc::new(RefCell::new(None));
    let mut scheduler = Scheduler::new();
    {
        let outcome = outcome.clone();
        scheduler.spawn(async move {
            let stream = TcpStream::connect("127.0.0.1", port).await.expect("connect");
            *outcome.borrow_mut() = Some(round_trip(&stream, &[9, 9, 9, 9]).await);
        });
    }
    scheduler.run().expect("run");
    server.join().expect("server thread");

    match outcome.borrow_mut().take() {
        Some(Err(Error::Mismatch { len, offset })) => assert_eq!((len, offset), (4, 2)),
        other => panic!("expected a mismatch, got {other:?}"),
    }
}

#[test]
fn connecting_to_a_closed_port_fails_the_task() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .expect("free port")
        .port();

    let outcome = Rc::new(RefCell::new(None));
    let mut scheduler = Scheduler::new();
    {
        let outcome = outcome.clone();
        scheduler.spawn_with(StartPolicy::Eager, async move {
            *outcome.borrow_mut() = Some(TcpStream::connect("127.0.0.1", port).await);
        });
    }
    scheduler.run().expect("run");

    match outcome.borrow_mut().take() {
        Some(Err(err @ Error::Connect(_))) => {
            assert_eq!(err.raw_os_error(), Some(libc::ECONNREFUSED));
        }
        other => panic!("expected a refused connect, got {other:?}"),
    }
}
