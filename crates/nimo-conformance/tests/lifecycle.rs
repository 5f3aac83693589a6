//! §8 scenario 1: Registry lifecycle — reachable while running, not
//! reachable once stopped.

mod common;

#[tokio::test]
async fn check_succeeds_while_running_and_fails_after_stop() {
    let (client, _shutdown) = common::spawn_registry().await;

    client.check().await.expect("Registry should be reachable");

    client.stop().await.expect("stop. should be accepted");

    // The command engine's accept loop and per-connection loop only
    // observe the shutdown flag between requests, so the next call on
    // the same connection is the one that surfaces the closed Registry.
    let result = client.check().await;
    assert!(result.is_err(), "check should fail once the Registry has stopped");
}
