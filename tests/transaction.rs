use respline::test_utils::MockServer;
use respline::{Connection, Error, Mode, Reply};

#[tokio::test]
async fn exec_returns_the_queued_outcomes_in_order() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.multi().await.unwrap();
    assert_eq!(conn.mode(), Mode::Transaction);

    // sentinels while queued
    assert_eq!(conn.incr("n").await.unwrap(), 0);
    assert_eq!(conn.get("n").await.unwrap(), None);

    let outcomes = conn.exec().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].as_ref().unwrap(), &Reply::Integer(1));
    assert_eq!(
        outcomes[1].as_ref().unwrap(),
        &Reply::Bulk(Some(b"1".to_vec()))
    );
    assert_eq!(conn.mode(), Mode::Normal);
}

#[tokio::test]
async fn watch_then_exec_succeeds_without_interference() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.set("n", "10").await.unwrap();
    conn.watch(&["n"]).await.unwrap();
    assert_eq!(conn.get("n").await.unwrap(), Some(b"10".to_vec()));

    conn.multi().await.unwrap();
    conn.set("n", "11").await.unwrap();
    let outcomes = conn.exec().await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].as_ref().unwrap().is_ok());
    assert_eq!(conn.get("n").await.unwrap(), Some(b"11".to_vec()));
}

#[tokio::test]
async fn watched_write_aborts_exec_with_an_empty_list() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();
    let mut writer = Connection::connect(server.connection_info()).await.unwrap();

    conn.set("n", "10").await.unwrap();
    conn.watch(&["n"]).await.unwrap();
    assert_eq!(conn.get("n").await.unwrap(), Some(b"10".to_vec()));

    // another connection races the transaction
    writer.set("n", "99").await.unwrap();

    conn.multi().await.unwrap();
    conn.set("n", "11").await.unwrap();
    let outcomes = conn.exec().await.unwrap();

    assert!(outcomes.is_empty(), "aborted EXEC must yield an empty list");
    assert_eq!(conn.mode(), Mode::Normal);
    assert_eq!(conn.get("n").await.unwrap(), Some(b"99".to_vec()));
}

#[tokio::test]
async fn blocking_operations_are_rejected_inside_multi() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.multi().await.unwrap();
    let err = conn.blpop(&["q"], 5).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    let err = conn.brpoplpush("a", "b", 5).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));

    // the rejection never touched the wire, the transaction is intact
    conn.set("k", "v").await.unwrap();
    let outcomes = conn.exec().await.unwrap();
    assert_eq!(outcomes.len(), 1);
}

#[tokio::test]
async fn watch_inside_multi_is_invalid() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.multi().await.unwrap();
    let err = conn.watch(&["k"]).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    conn.discard().await.unwrap();
}

#[tokio::test]
async fn exec_and_discard_require_an_open_multi() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    assert!(matches!(
        conn.exec().await.unwrap_err(),
        Error::InvalidState(_)
    ));
    assert!(matches!(
        conn.discard().await.unwrap_err(),
        Error::InvalidState(_)
    ));
}

#[tokio::test]
async fn multi_inside_multi_is_a_no_op() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.multi().await.unwrap();
    conn.multi().await.unwrap();
    conn.set("k", "v").await.unwrap();
    let outcomes = conn.exec().await.unwrap();
    assert_eq!(outcomes.len(), 1);
}

#[tokio::test]
async fn discard_drops_everything_queued() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.multi().await.unwrap();
    conn.set("ghost", "value").await.unwrap();
    conn.discard().await.unwrap();

    assert_eq!(conn.mode(), Mode::Normal);
    assert!(!conn.exists("ghost").await.unwrap());
}

#[tokio::test]
async fn transaction_inside_an_external_pipeline() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.open_pipeline().unwrap();
    conn.set("a", "1").await.unwrap();

    conn.multi().await.unwrap();
    assert_eq!(conn.mode(), Mode::PipelineTransaction);
    conn.incr("b").await.unwrap();
    conn.incr("b").await.unwrap();
    let sentinel = conn.exec().await.unwrap();
    assert!(sentinel.is_empty(), "exec in a pipeline returns a sentinel");
    assert_eq!(conn.mode(), Mode::Pipeline);

    // queued acks occupy no slots: one for SET, one authoritative EXEC
    let outcomes = conn.close_pipeline().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].as_ref().unwrap().is_ok());
    assert_eq!(
        outcomes[1].as_ref().unwrap(),
        &Reply::Multi(Some(vec![Reply::Integer(1), Reply::Integer(2)]))
    );
    assert_eq!(conn.mode(), Mode::Normal);
}

#[tokio::test]
async fn closing_the_pipeline_keeps_the_transaction_open() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.open_pipeline().unwrap();
    conn.set("a", "1").await.unwrap();
    conn.multi().await.unwrap();
    conn.incr("b").await.unwrap();

    let outcomes = conn.close_pipeline().await.unwrap();
    assert_eq!(outcomes.len(), 1, "only the pre-MULTI command has a slot");
    assert_eq!(conn.mode(), Mode::Transaction);

    conn.incr("b").await.unwrap();
    let outcomes = conn.exec().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[1].as_ref().unwrap(), &Reply::Integer(2));
}
