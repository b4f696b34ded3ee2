use respline::test_utils::MockServer;
use respline::{AtomicCounter, Connection, Pool, PoolConfig};

fn counter(server: &MockServer, key: &str) -> AtomicCounter {
    AtomicCounter::new(
        Pool::new(PoolConfig::default()),
        server.connection_info(),
        key,
    )
}

#[tokio::test]
async fn a_missing_key_reads_as_zero() {
    let server = MockServer::start().await.unwrap();
    let counter = counter(&server, "hits");
    assert_eq!(counter.get().await.unwrap(), 0);
}

#[tokio::test]
async fn set_get_and_increment() {
    let server = MockServer::start().await.unwrap();
    let counter = counter(&server, "hits");

    counter.set(41).await.unwrap();
    assert_eq!(counter.get().await.unwrap(), 41);
    assert_eq!(counter.increment().await.unwrap(), 42);
    assert_eq!(counter.get().await.unwrap(), 42);
}

#[tokio::test]
async fn get_and_add_returns_the_previous_value() {
    let server = MockServer::start().await.unwrap();
    let counter = counter(&server, "hits");

    counter.set(10).await.unwrap();
    assert_eq!(counter.get_and_add(5).await.unwrap(), 10);
    assert_eq!(counter.get_and_increment().await.unwrap(), 15);
    assert_eq!(counter.get().await.unwrap(), 16);
}

#[tokio::test]
async fn compare_and_set_succeeds_on_a_matching_value() {
    let server = MockServer::start().await.unwrap();
    let counter = counter(&server, "n");

    counter.set(10).await.unwrap();
    assert!(counter.compare_and_set(10, 11).await.unwrap());
    assert_eq!(counter.get().await.unwrap(), 11);
}

#[tokio::test]
async fn compare_and_set_fails_on_a_stale_expectation() {
    let server = MockServer::start().await.unwrap();
    let counter = counter(&server, "n");

    counter.set(99).await.unwrap();
    assert!(!counter.compare_and_set(10, 11).await.unwrap());
    assert_eq!(counter.get().await.unwrap(), 99, "a failed CAS writes nothing");
}

#[tokio::test]
async fn concurrent_increments_never_lose_an_update() {
    let server = MockServer::start().await.unwrap();
    let info = server.connection_info();
    let pool = Pool::new(PoolConfig::default());

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let counter = AtomicCounter::new(pool.clone(), info.clone(), "shared");
        tasks.push(tokio::spawn(async move {
            for _ in 0..25 {
                counter.get_and_increment().await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut conn = Connection::connect(info).await.unwrap();
    assert_eq!(conn.get("shared").await.unwrap(), Some(b"100".to_vec()));
}
