use respline::test_utils::MockServer;
use respline::{Connection, Error, Mode, Reply};

#[tokio::test]
async fn pipeline_preserves_submission_order() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.open_pipeline().unwrap();
    assert_eq!(conn.mode(), Mode::Pipeline);

    conn.set("a", "1").await.unwrap();
    conn.get("a").await.unwrap();
    conn.incr("counter").await.unwrap();
    conn.exists("a").await.unwrap();

    let outcomes = conn.close_pipeline().await.unwrap();
    assert_eq!(outcomes.len(), 4);
    assert!(matches!(outcomes[0], Ok(ref r) if r.is_ok()));
    assert_eq!(outcomes[1].as_ref().unwrap(), &Reply::Bulk(Some(b"1".to_vec())));
    assert_eq!(outcomes[2].as_ref().unwrap(), &Reply::Integer(1));
    assert_eq!(outcomes[3].as_ref().unwrap(), &Reply::Integer(1));
    assert_eq!(conn.mode(), Mode::Normal);
}

#[tokio::test]
async fn pipelined_dispatch_returns_sentinels() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();
    conn.set("real", "value").await.unwrap();

    conn.open_pipeline().unwrap();
    // sentinels, not results; callers must not inspect them
    assert_eq!(conn.get("real").await.unwrap(), None);
    assert_eq!(conn.incr("n").await.unwrap(), 0);
    assert!(!conn.exists("real").await.unwrap());
    let outcomes = conn.close_pipeline().await.unwrap();
    assert_eq!(
        outcomes[0].as_ref().unwrap(),
        &Reply::Bulk(Some(b"value".to_vec()))
    );
}

#[tokio::test]
async fn partial_failure_carries_the_full_outcome_list() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.set("k", "abc").await.unwrap();
    conn.open_pipeline().unwrap();
    conn.incr("k").await.unwrap();
    conn.get("k").await.unwrap();

    let err = conn.close_pipeline().await.unwrap_err();
    let Error::PipelinePartial(outcomes) = err else {
        panic!("expected PipelinePartial, got {err:?}");
    };
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes.failed(), 1);
    match &outcomes.outcomes()[0] {
        Err(Error::Server(message)) => {
            assert_eq!(message, "ERR value is not an integer or out of range")
        }
        other => panic!("slot 0 should be a server error, got {other:?}"),
    }
    assert_eq!(
        outcomes.outcomes()[1].as_ref().unwrap(),
        &Reply::Bulk(Some(b"abc".to_vec()))
    );

    // per-slot server errors do not poison the connection
    assert_eq!(conn.mode(), Mode::Normal);
    assert_eq!(conn.ping().await.unwrap(), "PONG");
}

#[tokio::test]
async fn closing_an_unopened_pipeline_is_empty() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    let outcomes = conn.close_pipeline().await.unwrap();
    assert!(outcomes.is_empty());
}

#[tokio::test]
async fn open_pipeline_is_idempotent() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.open_pipeline().unwrap();
    conn.open_pipeline().unwrap();
    conn.set("x", "y").await.unwrap();
    let outcomes = conn.close_pipeline().await.unwrap();
    assert_eq!(outcomes.len(), 1);
}

#[tokio::test]
async fn large_pipeline_stays_aligned() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.open_pipeline().unwrap();
    for i in 0..100i64 {
        conn.set(format!("k{i}"), format!("v{i}")).await.unwrap();
        conn.get(format!("k{i}")).await.unwrap();
    }
    let outcomes = conn.close_pipeline().await.unwrap();
    assert_eq!(outcomes.len(), 200);
    for i in 0..100usize {
        assert_eq!(
            outcomes[i * 2 + 1].as_ref().unwrap(),
            &Reply::Bulk(Some(format!("v{i}").into_bytes())),
            "slot {} misaligned",
            i * 2 + 1
        );
    }
}
