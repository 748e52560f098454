//! # Integration Tests
//!
//! End-to-end tests across crates.
//!
//! - Configuration file to datagrams on a real loopback socket
//! - Termination and fatal escalation through the public API

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        let _ = contracts::FatalKind::DispatchThreadFailed;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::net::UdpSocket;
    use std::time::{Duration, Instant};

    use config_loader::ConfigLoader;
    use dispatcher::{
        decode_float_message, fatal_channel, Dispatcher, FloatMessage, OscSocket,
        DEFAULT_WRITE_TIMEOUT,
    };

    /// Loopback receiver that never blocks a test for long
    fn receiver() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    fn recv_message(socket: &UdpSocket) -> FloatMessage {
        let mut buf = [0u8; 1024];
        let n = socket.recv(&mut buf).unwrap();
        decode_float_message(&buf[..n]).unwrap()
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Config file -> connect -> enqueue all controls -> loopback -> decode
    #[test]
    fn test_e2e_config_to_datagrams() {
        let (listener, port) = receiver();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[osc]
host = "127.0.0.1"
port = {port}

[[controls]]
address = "/tab1/slider1"
value = 0.5

[[controls]]
address = "/tab1/label"
data_type = "string"

[[controls]]
address = "/tab1/toggle"
data_type = "bool"
value = 1.0
"#
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        let socket = OscSocket::connect(
            &config.osc.host,
            config.osc.port,
            Duration::from_secs(config.osc.write_timeout_secs),
        )
        .unwrap();
        let dispatcher = Dispatcher::start(&socket, ()).unwrap();

        for control in config.transmittable_controls() {
            dispatcher
                .enqueue(&control.address, control.value as f32)
                .unwrap();
        }

        let first = recv_message(&listener);
        let second = recv_message(&listener);
        assert_eq!(
            first,
            FloatMessage {
                address: "/tab1/slider1".to_string(),
                value: 0.5
            }
        );
        assert_eq!(second.address, "/tab1/toggle");
        assert_eq!(second.value, 1.0);

        wait_until(|| dispatcher.metrics().sent == 2);
        let report = dispatcher.shutdown().unwrap();
        assert_eq!(report.summary.datagrams_sent, 2);
        assert_eq!(report.summary.bytes_sent, 24 + 24);
        socket.disconnect().unwrap();
    }

    /// Strict FIFO across many enqueues from one producer
    #[test]
    fn test_e2e_fifo_over_loopback() {
        let (listener, port) = receiver();
        let socket = OscSocket::connect("127.0.0.1", port, DEFAULT_WRITE_TIMEOUT).unwrap();
        let dispatcher = Dispatcher::start(&socket, ()).unwrap();

        const N: usize = 50;
        for i in 0..N {
            dispatcher.enqueue("/seq", i as f32).unwrap();
        }

        let received: Vec<f32> = (0..N).map(|_| recv_message(&listener).value).collect();
        assert_eq!(received, (0..N).map(|i| i as f32).collect::<Vec<_>>());

        dispatcher.shutdown().unwrap();
        socket.disconnect().unwrap();
    }

    /// Producers on several threads; every accepted message is sent or dropped once
    #[test]
    fn test_e2e_concurrent_producers_account_for_every_message() {
        let (listener, port) = receiver();
        listener
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let socket = OscSocket::connect("127.0.0.1", port, DEFAULT_WRITE_TIMEOUT).unwrap();
        let dispatcher = Dispatcher::start(&socket, ()).unwrap();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let handle = dispatcher.handle();
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|i| handle.enqueue(&format!("/p{p}"), *i as f32).is_ok())
                        .count()
                })
            })
            .collect();

        let accepted: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();
        assert_eq!(accepted, 400);

        let report = dispatcher.shutdown().unwrap();
        assert_eq!(report.summary.datagrams_sent as usize + report.dropped, accepted);

        let mut buf = [0u8; 64];
        let mut on_wire = 0;
        while listener.recv(&mut buf).is_ok() {
            on_wire += 1;
        }
        // Loopback may still lose datagrams under load, never duplicate them
        assert!(on_wire <= report.summary.datagrams_sent);

        socket.disconnect().unwrap();
    }

    /// Shutdown with nothing queued exits cleanly and sends nothing
    #[test]
    fn test_e2e_idle_shutdown() {
        let (listener, port) = receiver();
        listener
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        let socket = OscSocket::connect("127.0.0.1", port, DEFAULT_WRITE_TIMEOUT).unwrap();
        let (notifier, fatal_rx) = fatal_channel();
        let dispatcher = Dispatcher::start(&socket, notifier).unwrap();

        let report = dispatcher.shutdown().unwrap();
        assert_eq!(report.dropped, 0);
        assert_eq!(report.summary.datagrams_sent, 0);

        // Clean exit drops the sender without notifying
        assert!(fatal_rx.blocking_recv().is_none());

        let mut buf = [0u8; 64];
        assert!(listener.recv(&mut buf).is_err());
        socket.disconnect().unwrap();
    }

    /// Shutdown releases the socket so it can be closed
    #[test]
    fn test_e2e_disconnect_after_shutdown() {
        let (_listener, port) = receiver();
        let socket = OscSocket::connect("127.0.0.1", port, DEFAULT_WRITE_TIMEOUT).unwrap();
        let dispatcher = Dispatcher::start(&socket, ()).unwrap();

        dispatcher.shutdown().unwrap();
        socket.disconnect().unwrap();
    }

    /// Encode failures are local to the call and leave the stream intact
    #[test]
    fn test_e2e_bad_address_does_not_disturb_stream() {
        let (listener, port) = receiver();
        let socket = OscSocket::connect("127.0.0.1", port, DEFAULT_WRITE_TIMEOUT).unwrap();
        let dispatcher = Dispatcher::start(&socket, ()).unwrap();

        dispatcher.enqueue("/before", 1.0).unwrap();
        assert!(matches!(
            dispatcher.enqueue("", 2.0),
            Err(dispatcher::DispatchError::Encode(_))
        ));
        dispatcher.enqueue("/after", 3.0).unwrap();

        assert_eq!(recv_message(&listener).address, "/before");
        assert_eq!(recv_message(&listener).address, "/after");

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.encode_failures, 1);
        assert_eq!(metrics.enqueued, 2);

        dispatcher.shutdown().unwrap();
        socket.disconnect().unwrap();
    }

    /// A listener that went away: the kernel refuses the connected socket's
    /// sends, the dispatch thread stops and raises exactly one fatal event.
    #[tokio::test]
    async fn test_e2e_refused_peer_raises_fatal_event() {
        let port = {
            let (closed, port) = receiver();
            drop(closed);
            port
        };
        let socket = OscSocket::connect("127.0.0.1", port, DEFAULT_WRITE_TIMEOUT).unwrap();
        let (notifier, mut fatal_rx) = fatal_channel();
        let dispatcher = Dispatcher::start(&socket, notifier).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                // Fails once the thread has exited; the event is what matters
                let _ = dispatcher.enqueue("/probe", 1.0);
                tokio::select! {
                    event = fatal_rx.recv() => break event,
                    _ = tokio::time::sleep(Duration::from_millis(5)) => {}
                }
            }
        })
        .await
        .expect("no fatal event within 5s")
        .expect("sender dropped without notifying");

        assert_eq!(event.kind, contracts::FatalKind::DispatchThreadFailed);
        assert!(fatal_rx.try_recv().is_none());

        let result = tokio::task::spawn_blocking(move || dispatcher.shutdown())
            .await
            .unwrap();
        assert!(matches!(
            result,
            Err(dispatcher::DispatchError::Transmit(_))
        ));
        socket.disconnect().unwrap();
    }
}
