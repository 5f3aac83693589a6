//! §8 scenario 3: channel add/duplicate.

mod common;

use std::net::Ipv4Addr;

use nimo_types::{ErrorKind, ServiceKind, TransportPref};
use nimo_types::Endpoint;

#[tokio::test]
async fn duplicate_add_channel_reports_already_exists() {
    let (client, _shutdown) = common::spawn_registry().await;

    client
        .add_node(
            "N1",
            "alpha",
            ServiceKind::Filter,
            Endpoint::new(Ipv4Addr::new(10, 0, 0, 1), 40001),
        )
        .await
        .unwrap();

    client
        .add_channel("N1", "/out", true, "logic data", TransportPref::Any)
        .await
        .expect("first addChannel should succeed");

    let err = client
        .add_channel("N1", "/out", true, "logic data", TransportPref::Any)
        .await
        .expect_err("second addChannel with the same key should fail");
    assert_eq!(err.kind, ErrorKind::AlreadyExists);

    let count = client.get_number_of_output_channels_on_node("N1").await.unwrap();
    assert_eq!(count, 1);
}
