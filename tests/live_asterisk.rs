//! Integration tests against a live Asterisk manager interface.
//!
//! These tests require AMI on $AMI_HOST:$AMI_PORT (default 127.0.0.1:5038)
//! with credentials from $AMI_USER / $AMI_PASS.
//! Run with: cargo test --test live_asterisk -- --ignored

use ami_queue_status::{AmiConfig, AmiError, ConnectionState, QueueStatusClient};
use std::time::Duration;

fn client() -> QueueStatusClient {
    let config = AmiConfig {
        read_timeout: Duration::from_secs(15),
        ..AmiConfig::from_env()
    };
    QueueStatusClient::new(config)
}

#[tokio::test]
#[ignore]
async fn live_poll_queue_status() {
    let client = client();
    let queues = client
        .fetch_queue_status()
        .await
        .expect("poll against live PBX");
    assert_eq!(client.connection_state().await, ConnectionState::Ready);

    for queue in &queues {
        for pair in queue
            .members
            .windows(2)
        {
            assert!((pair[0].penalty, &pair[0].name) <= (pair[1].penalty, &pair[1].name));
        }
    }
}

#[tokio::test]
#[ignore]
async fn live_repeated_polls_share_session() {
    let client = client();
    let first = client
        .fetch_queue_status()
        .await
        .unwrap();
    let second = client
        .fetch_queue_status()
        .await
        .unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(client.connection_state().await, ConnectionState::Ready);

    client
        .disconnect()
        .await;
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
}

#[tokio::test]
#[ignore]
async fn live_bad_secret_rejected() {
    let client = QueueStatusClient::new(AmiConfig {
        secret: "definitely-not-the-secret".to_string(),
        ..AmiConfig::from_env()
    });
    let err = client
        .fetch_queue_status()
        .await
        .unwrap_err();
    assert!(matches!(err, AmiError::AuthFailed { .. }), "got {err:?}");
}
