use std::time::Duration;

use respline::test_utils::MockServer;
use respline::{Connection, Error, Message, Mode};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const NO_NAMES: [&[u8]; 0] = [];

/// Publish until the subscriber is registered server-side, then return
/// the delivery count.
async fn publish_until_delivered(
    publisher: &mut Connection,
    channel: &str,
    payload: &str,
) -> i64 {
    for _ in 0..200 {
        let delivered = publisher.publish(channel, payload).await.unwrap();
        if delivered > 0 {
            return delivered;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("subscriber never became visible to the server");
}

#[tokio::test]
async fn subscribe_receives_published_messages() {
    let server = MockServer::start().await.unwrap();
    let mut subscriber = Connection::connect(server.connection_info()).await.unwrap();
    let mut publisher = Connection::connect(server.connection_info()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    subscriber
        .subscribe_with(
            move |message: Message| {
                let _ = tx.send(message);
            },
            &["ch"],
        )
        .await
        .unwrap();
    assert_eq!(subscriber.mode(), Mode::Subscribed);

    let delivered = publish_until_delivered(&mut publisher, "ch", "hello").await;
    assert_eq!(delivered, 1);

    let message = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("listener never fired")
        .unwrap();
    assert_eq!(message.channel, b"ch".to_vec());
    assert_eq!(message.payload, b"hello".to_vec());
    assert_eq!(message.pattern, None);
}

#[tokio::test]
async fn normal_commands_are_rejected_while_subscribed() {
    let server = MockServer::start().await.unwrap();
    let mut subscriber = Connection::connect(server.connection_info()).await.unwrap();

    subscriber
        .subscribe_with(|_: Message| {}, &["ch"])
        .await
        .unwrap();

    assert!(matches!(
        subscriber.get("k").await.unwrap_err(),
        Error::SubscribedMode
    ));
    assert!(matches!(
        subscriber.publish("ch", "x").await.unwrap_err(),
        Error::SubscribedMode
    ));
    assert!(matches!(
        subscriber.multi().await.unwrap_err(),
        Error::SubscribedMode
    ));
}

#[tokio::test]
async fn subscribing_again_is_additive() {
    let server = MockServer::start().await.unwrap();
    let mut subscriber = Connection::connect(server.connection_info()).await.unwrap();
    let mut publisher = Connection::connect(server.connection_info()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    subscriber
        .subscribe_with(
            move |message: Message| {
                let _ = tx.send(message);
            },
            &["first"],
        )
        .await
        .unwrap();

    let subscription = subscriber.subscription().expect("subscribed");
    subscription.subscribe(&["second"]).await.unwrap();

    let delivered = publish_until_delivered(&mut publisher, "second", "more").await;
    assert_eq!(delivered, 1);
    let message = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("listener never fired")
        .unwrap();
    assert_eq!(message.channel, b"second".to_vec());

    let channels = subscriber.subscription().unwrap().channels();
    assert_eq!(channels.len(), 2);
}

#[tokio::test]
async fn pattern_subscriptions_report_the_pattern() {
    let server = MockServer::start().await.unwrap();
    let mut subscriber = Connection::connect(server.connection_info()).await.unwrap();
    let mut publisher = Connection::connect(server.connection_info()).await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    subscriber
        .psubscribe_with(
            move |message: Message| {
                let _ = tx.send(message);
            },
            &["news.*"],
        )
        .await
        .unwrap();

    let delivered = publish_until_delivered(&mut publisher, "news.sports", "goal").await;
    assert_eq!(delivered, 1);

    let message = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("listener never fired")
        .unwrap();
    assert_eq!(message.pattern, Some(b"news.*".to_vec()));
    assert_eq!(message.channel, b"news.sports".to_vec());
    assert_eq!(message.payload, b"goal".to_vec());
}

#[tokio::test]
async fn unsubscribing_everything_ends_the_subscription() {
    let server = MockServer::start().await.unwrap();
    let mut subscriber = Connection::connect(server.connection_info()).await.unwrap();
    let mut publisher = Connection::connect(server.connection_info()).await.unwrap();

    subscriber
        .subscribe_with(|_: Message| {}, &["ch"])
        .await
        .unwrap();
    publish_until_delivered(&mut publisher, "ch", "warm-up").await;

    let subscription = subscriber.subscription().expect("subscribed");
    subscription.unsubscribe(&NO_NAMES).await.unwrap();

    // the reader processes the acknowledgements and winds itself down
    let mut ended = false;
    for _ in 0..200 {
        if !subscriber.subscription().unwrap().is_alive() {
            ended = true;
            break;
        }
        sleep(Duration::from_millis(5)).await;
    }
    assert!(ended, "subscription should end once the last channel is gone");
    assert_eq!(subscriber.mode(), Mode::Closed);

    // the core was closed, never usable again
    assert!(matches!(
        subscriber.ping().await.unwrap_err(),
        Error::ConnectionLost { .. }
    ));
}

#[tokio::test]
async fn closing_a_subscribed_connection_hard_cancels_the_reader() {
    let server = MockServer::start().await.unwrap();
    let mut subscriber = Connection::connect(server.connection_info()).await.unwrap();

    subscriber
        .subscribe_with(|_: Message| {}, &["ch"])
        .await
        .unwrap();
    subscriber.close().await;

    assert_eq!(subscriber.mode(), Mode::Closed);
    assert!(matches!(
        subscriber.ping().await.unwrap_err(),
        Error::ConnectionLost { .. }
    ));
}

#[tokio::test]
async fn entering_subscribed_mode_twice_is_refused() {
    let server = MockServer::start().await.unwrap();
    let mut subscriber = Connection::connect(server.connection_info()).await.unwrap();

    subscriber
        .subscribe_with(|_: Message| {}, &["ch"])
        .await
        .unwrap();
    let err = subscriber
        .subscribe_with(|_: Message| {}, &["other"])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SubscribedMode));
}

#[tokio::test]
async fn subscribe_is_unsupported_mid_pipeline() {
    let server = MockServer::start().await.unwrap();
    let mut conn = Connection::connect(server.connection_info()).await.unwrap();

    conn.open_pipeline().unwrap();
    let err = conn
        .subscribe_with(|_: Message| {}, &["ch"])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}
