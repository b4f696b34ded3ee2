use std::time::Duration;

use respline::test_utils::MockServer;
use respline::{Connection, Error, Mode};

#[tokio::test]
async fn set_then_get_round_trips() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.set("foo", "bar").await.unwrap();
    assert_eq!(conn.get("foo").await.unwrap(), Some(b"bar".to_vec()));
    assert_eq!(conn.mode(), Mode::Normal);
}

#[tokio::test]
async fn nil_bulk_and_empty_bulk_stay_apart() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    assert_eq!(conn.get("missing").await.unwrap(), None);

    conn.set("empty", "").await.unwrap();
    let empty = conn.get("empty").await.unwrap();
    assert_eq!(empty, Some(Vec::new()));
    assert_ne!(empty, None);
}

#[tokio::test]
async fn connect_handshake_authenticates_and_selects() {
    let server = MockServer::start().await.unwrap();
    let info = server
        .connection_info()
        .database(3)
        .username("app")
        .password("sesame");
    let mut conn = Connection::connect(info).await.unwrap();
    assert_eq!(conn.ping().await.unwrap(), "PONG");
}

#[tokio::test]
async fn close_is_terminal_and_idempotent() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.close().await;
    conn.close().await;
    assert_eq!(conn.mode(), Mode::Closed);
    assert!(!conn.is_open());

    let err = conn.ping().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionLost { .. }));
    let err = conn.set("k", "v").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionLost { .. }));
}

#[tokio::test]
async fn server_errors_carry_the_message_verbatim() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.set("k", "abc").await.unwrap();
    match conn.incr("k").await.unwrap_err() {
        Error::Server(message) => {
            assert_eq!(message, "ERR value is not an integer or out of range")
        }
        other => panic!("expected a server error, got {other:?}"),
    }
    // a server error is not fatal
    assert_eq!(conn.ping().await.unwrap(), "PONG");
    assert_eq!(conn.mode(), Mode::Normal);
}

#[tokio::test]
async fn echo_is_binary_clean() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    let payload = b"\x00\x01\xff\r\n mixed".to_vec();
    assert_eq!(conn.echo(&payload).await.unwrap(), payload);
}

#[tokio::test]
async fn lists_keep_their_order() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.rpush("jobs", &["a", "b", "c"]).await.unwrap();
    assert_eq!(conn.llen("jobs").await.unwrap(), 3);
    assert_eq!(
        conn.lrange("jobs", 0, -1).await.unwrap(),
        vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
    );
    assert_eq!(conn.lpop("jobs").await.unwrap(), Some(b"a".to_vec()));
    assert_eq!(conn.rpop("jobs").await.unwrap(), Some(b"c".to_vec()));
    assert_eq!(conn.key_type("jobs").await.unwrap(), "list");
}

#[tokio::test]
async fn hashes_round_trip() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    assert!(conn.hset("h", "f1", "v1").await.unwrap());
    assert!(conn.hset("h", "f2", "v2").await.unwrap());
    assert!(!conn.hset("h", "f1", "v3").await.unwrap());

    assert_eq!(conn.hget("h", "f1").await.unwrap(), Some(b"v3".to_vec()));
    let all = conn.hgetall("h").await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.get(b"f2".as_slice()), Some(&b"v2".to_vec()));
}

#[tokio::test]
async fn blocking_pop_waits_for_a_push() {
    let server = MockServer::start().await.unwrap();
    let mut consumer = Connection::connect(server.connection_info()).await.unwrap();
    let mut producer = Connection::connect(server.connection_info()).await.unwrap();

    let push = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        producer.rpush("queue", &["job-1"]).await.unwrap();
    });

    let popped = consumer.blpop(&["queue"], 5).await.unwrap();
    assert_eq!(popped, Some((b"queue".to_vec(), b"job-1".to_vec())));
    push.await.unwrap();
}

#[tokio::test]
async fn blocking_pop_times_out_to_none() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    assert_eq!(conn.blpop(&["nothing-here"], 1).await.unwrap(), None);
    // still healthy afterwards
    assert_eq!(conn.ping().await.unwrap(), "PONG");
}
