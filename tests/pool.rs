use std::time::Duration;

use respline::test_utils::MockServer;
use respline::{Error, Message, Pool, PoolConfig};

fn pool() -> Pool {
    Pool::new(PoolConfig::default())
}

#[tokio::test]
async fn released_connections_are_reused() {
    let server = MockServer::start().await.unwrap();
    let info = server.connection_info();
    let pool = pool();

    {
        let mut conn = pool.lease(&info).await.unwrap();
        conn.set("k", "v").await.unwrap();
    }
    assert_eq!(server.accepted_connections(), 1);
    assert_eq!(pool.idle_count(&info), 1);

    {
        let mut conn = pool.lease(&info).await.unwrap();
        assert_eq!(conn.get("k").await.unwrap(), Some(b"v".to_vec()));
    }
    assert_eq!(server.accepted_connections(), 1, "the idle one was reused");
}

#[tokio::test]
async fn concurrent_leases_get_distinct_connections() {
    let server = MockServer::start().await.unwrap();
    let info = server.connection_info();
    let pool = pool();

    let mut first = pool.lease(&info).await.unwrap();
    let mut second = pool.lease(&info).await.unwrap();
    first.set("a", "1").await.unwrap();
    second.set("b", "2").await.unwrap();
    assert_eq!(server.accepted_connections(), 2);
}

#[tokio::test]
async fn exhausted_pool_fails_after_the_lease_timeout() {
    let server = MockServer::start().await.unwrap();
    let info = server.connection_info();
    let pool = Pool::new(PoolConfig {
        max_per_endpoint: 1,
        lease_timeout: Some(Duration::from_millis(100)),
        check_on_lease: false,
    });

    let held = pool.lease(&info).await.unwrap();
    let err = pool.lease(&info).await.unwrap_err();
    assert!(matches!(err, Error::PoolExhausted));
    drop(held);

    // capacity came back with the release
    pool.lease(&info).await.unwrap();
}

#[tokio::test]
async fn dirty_connections_are_not_restacked() {
    let server = MockServer::start().await.unwrap();
    let info = server.connection_info();
    let pool = pool();

    {
        let mut conn = pool.lease(&info).await.unwrap();
        conn.open_pipeline().unwrap();
        conn.set("x", "1").await.unwrap();
        // dropped mid-pipeline
    }
    assert_eq!(pool.idle_count(&info), 0);

    {
        let mut conn = pool.lease(&info).await.unwrap();
        conn.watch(&["x"]).await.unwrap();
        // dropped while watching
    }
    assert_eq!(pool.idle_count(&info), 0);

    {
        let mut conn = pool.lease(&info).await.unwrap();
        conn.close().await;
    }
    assert_eq!(pool.idle_count(&info), 0);

    {
        let mut conn = pool.lease(&info).await.unwrap();
        conn.subscribe_with(|_: Message| {}, &["ch"]).await.unwrap();
        // a subscriber core never goes back
    }
    assert_eq!(pool.idle_count(&info), 0);

    // clean use still pools
    {
        let mut conn = pool.lease(&info).await.unwrap();
        conn.ping().await.unwrap();
    }
    assert_eq!(pool.idle_count(&info), 1);
}

#[tokio::test]
async fn health_checked_leases_reuse_healthy_connections() {
    let server = MockServer::start().await.unwrap();
    let info = server.connection_info();
    let pool = Pool::new(PoolConfig {
        check_on_lease: true,
        ..PoolConfig::default()
    });

    {
        let mut conn = pool.lease(&info).await.unwrap();
        conn.set("k", "v").await.unwrap();
    }
    {
        let mut conn = pool.lease(&info).await.unwrap();
        assert_eq!(conn.get("k").await.unwrap(), Some(b"v".to_vec()));
    }
    assert_eq!(server.accepted_connections(), 1);
}

#[tokio::test]
async fn evict_idle_closes_old_connections() {
    let server = MockServer::start().await.unwrap();
    let info = server.connection_info();
    let pool = pool();

    {
        let mut conn = pool.lease(&info).await.unwrap();
        conn.ping().await.unwrap();
    }
    assert_eq!(pool.idle_count(&info), 1);

    // a generous threshold keeps it
    pool.evict_idle(Duration::from_secs(60)).await;
    assert_eq!(pool.idle_count(&info), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    pool.evict_idle(Duration::from_millis(1)).await;
    assert_eq!(pool.idle_count(&info), 0);
}

#[tokio::test]
async fn drained_pools_refuse_further_leases() {
    let server = MockServer::start().await.unwrap();
    let info = server.connection_info();
    let pool = pool();

    {
        let mut conn = pool.lease(&info).await.unwrap();
        conn.ping().await.unwrap();
    }
    pool.drain().await;

    assert_eq!(pool.idle_count(&info), 0);
    assert!(matches!(
        pool.lease(&info).await.unwrap_err(),
        Error::PoolExhausted
    ));
}

#[tokio::test]
async fn detached_connections_leave_pool_management() {
    let server = MockServer::start().await.unwrap();
    let info = server.connection_info();
    let pool = pool();

    let leased = pool.lease(&info).await.unwrap();
    let mut conn = leased.detach();
    conn.ping().await.unwrap();
    drop(conn);
    assert_eq!(pool.idle_count(&info), 0);
}
