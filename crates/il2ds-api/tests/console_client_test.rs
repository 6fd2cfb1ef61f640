// Integration tests for `ConsoleClient` against a scripted TCP server.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use il2ds_api::{ChatTarget, ConsoleClient, ConsoleSettings, Error};
use il2ds_core::MissionStatus;

// ── Helpers ─────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn bind() -> (TcpListener, SocketAddr) {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

async fn connect(addr: SocketAddr) -> ConsoleClient {
    ConsoleClient::connect(ConsoleSettings::new(addr).with_request_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
}

/// Read one command: bytes up to the escaped line delimiter `\n`
/// (backslash + 'n') the client appends.
async fn read_command(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = socket.read(&mut byte).await.unwrap();
        assert!(n > 0, "client closed mid-command");
        buf.push(byte[0]);
        if buf.ends_with(b"\\n") {
            buf.truncate(buf.len() - 2);
            return String::from_utf8(buf).unwrap();
        }
    }
}

async fn send(socket: &mut TcpStream, text: &str) {
    socket.write_all(text.as_bytes()).await.unwrap();
}

fn prompt(counter: u32) -> String {
    format!("<consoleN><{counter}>\r\n")
}

// ── Typed requests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_server_info() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        assert_eq!(read_command(&mut socket).await, "server");
        send(
            &mut socket,
            "Type: Local server\\nName: Test server\\nDescription: Dogfights\\n",
        )
        .await;
        send(&mut socket, &prompt(1)).await;
    });

    let client = connect(addr).await;
    let info = client.server_info().await.unwrap();
    assert_eq!(info.server_type, "Local server");
    assert_eq!(info.name, "Test server");
    assert_eq!(info.description, "Dogfights");
    client.close().await;
}

#[tokio::test]
async fn test_concurrent_requests_resolve_in_enqueue_order() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        // Hold back the first answer so the other two requests are
        // already queued while the first is in flight.
        assert_eq!(read_command(&mut socket).await, "one");
        tokio::time::sleep(Duration::from_millis(50)).await;
        send(&mut socket, "reply to one\\n").await;
        send(&mut socket, &prompt(1)).await;

        assert_eq!(read_command(&mut socket).await, "two");
        send(&mut socket, "reply to two\\n").await;
        send(&mut socket, &prompt(2)).await;

        assert_eq!(read_command(&mut socket).await, "three");
        send(&mut socket, "reply to three\\n").await;
        send(&mut socket, &prompt(3)).await;
    });

    let client = connect(addr).await;
    // The futures are polled in declaration order, so the requests are
    // enqueued as one, two, three before any response arrives.
    let (one, two, three) = tokio::join!(
        client.execute("one"),
        client.execute("two"),
        client.execute("three"),
    );
    assert_eq!(one.unwrap(), vec!["reply to one"]);
    assert_eq!(two.unwrap(), vec!["reply to two"]);
    assert_eq!(three.unwrap(), vec!["reply to three"]);
    client.close().await;
}

#[tokio::test]
async fn test_response_split_across_transport_messages() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        assert_eq!(read_command(&mut socket).await, "mission");
        // One logical line split across two transport messages, with the
        // prompt arriving in a third write.
        send(&mut socket, "Mission: net/dogfight/1.mis").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        send(&mut socket, " is Playing\\n\r\n").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        send(&mut socket, &prompt(1)).await;
    });

    let client = connect(addr).await;
    let mission = client.mission_status().await.unwrap();
    assert_eq!(mission.status, MissionStatus::Playing);
    assert_eq!(mission.file_path.as_deref(), Some("net/dogfight/1.mis"));
    client.close().await;
}

#[tokio::test]
async fn test_mission_not_loaded() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        assert_eq!(read_command(&mut socket).await, "mission");
        send(&mut socket, "Mission NOT loaded\\n").await;
        send(&mut socket, &prompt(1)).await;
    });

    let client = connect(addr).await;
    let mission = client.mission_status().await.unwrap();
    assert_eq!(mission.status, MissionStatus::NotLoaded);
    assert_eq!(mission.file_path, None);
    client.close().await;
}

#[tokio::test]
async fn test_mission_load_failure_surfaces_server_error() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        assert_eq!(
            read_command(&mut socket).await,
            "mission LOAD net/missing.mis"
        );
        send(&mut socket, "ERROR mission: net/missing.mis NOT loaded\\n").await;
        send(&mut socket, &prompt(1)).await;
    });

    let client = connect(addr).await;
    let err = client.mission_load("net/missing.mis").await.unwrap_err();
    match err {
        Error::Server { message } => {
            assert_eq!(message, "mission: net/missing.mis NOT loaded");
        }
        other => panic!("expected server error, got {other:?}"),
    }
    client.close().await;
}

#[tokio::test]
async fn test_long_chat_message_is_split() {
    let (listener, addr) = bind().await;
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut payload_lengths = Vec::new();
        for counter in 1..=3 {
            let command = read_command(&mut socket).await;
            let payload = command
                .strip_prefix("chat ")
                .and_then(|rest| rest.strip_suffix(" ALL"))
                .unwrap_or_else(|| panic!("unexpected command {command:?}"))
                .to_string();
            payload_lengths.push(payload.chars().count());
            send(&mut socket, &prompt(counter)).await;
        }
        payload_lengths
    });

    let client = connect(addr).await;
    let message = "x".repeat(170);
    client.chat(&message, ChatTarget::All).await.unwrap();
    client.close().await;

    assert_eq!(server.await.unwrap(), vec![80, 80, 10]);
}

#[tokio::test]
async fn test_kick_all_loops_until_empty() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut remaining = 3;
        let mut counter = 0;
        loop {
            let command = read_command(&mut socket).await;
            counter += 1;
            match command.as_str() {
                "user" => {
                    send(&mut socket, " N  Name  Ping  Score  Army\\n").await;
                    for i in 0..remaining {
                        send(&mut socket, &format!("pilot{i} 30 0 (1)Red\\n")).await;
                    }
                    send(&mut socket, &prompt(counter)).await;
                    if remaining == 0 {
                        return;
                    }
                }
                "kick 1" => {
                    remaining -= 1;
                    send(&mut socket, &prompt(counter)).await;
                }
                other => panic!("unexpected command {other:?}"),
            }
        }
    });

    let client = connect(addr).await;
    assert_eq!(client.kick_all().await.unwrap(), 3);
    client.close().await;
}

// ── Foreign input and events ────────────────────────────────────────

#[tokio::test]
async fn test_manual_echo_batch_is_discarded() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        assert_eq!(read_command(&mut socket).await, "user");
        // Someone typed `user` on the server's own terminal: its echo and
        // prompt land first, then the response to our request.
        send(&mut socket, "user\\n").await;
        send(&mut socket, &prompt(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        send(&mut socket, " N  Name  Ping  Score  Army\\n").await;
        send(&mut socket, "pilot0 30 100 (1)Red\\n").await;
        send(&mut socket, &prompt(2)).await;
    });

    let client = connect(addr).await;
    let users = client.users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].callsign, "pilot0");
    client.close().await;
}

#[tokio::test]
async fn test_unsolicited_chat_line_becomes_event() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        // Give the client time to subscribe before the line goes out.
        tokio::time::sleep(Duration::from_millis(100)).await;
        send(&mut socket, "Chat: pilot0: \tgood hunting\\n\r\n").await;
        // Keep the connection open until the client closes it.
        let mut buf = [0u8; 64];
        let _ = socket.read(&mut buf).await;
    });

    let client = connect(addr).await;
    let mut chat = client.chat_events();
    let message = tokio::time::timeout(Duration::from_secs(2), chat.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.author.as_deref(), Some("pilot0"));
    assert_eq!(message.body, "good hunting");
    client.close().await;
}

// ── Deadlines and lifecycle ─────────────────────────────────────────

#[tokio::test]
async fn test_request_timeout() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        // Swallow the command and never answer.
        let _ = read_command(&mut socket).await;
        let mut buf = [0u8; 64];
        let _ = socket.read(&mut buf).await;
    });

    let client = connect(addr).await;
    let err = client
        .execute_with_timeout("server", Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    client.close().await;
}

#[tokio::test]
async fn test_close_fails_pending_and_later_requests() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 64];
        let _ = socket.read(&mut buf).await;
    });

    let client = connect(addr).await;
    client.close().await;
    assert!(client.is_closed());

    let err = client.execute("server").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));

    // Idempotent.
    client.close().await;
}

#[tokio::test]
async fn test_server_disconnect_fails_in_flight_request() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_command(&mut socket).await;
        socket.shutdown().await.unwrap();
    });

    let client = connect(addr).await;
    let err = client.execute("server").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
}
