//! §8 scenario 4: connection with type/transport agreement.

mod common;

use std::net::Ipv4Addr;

use nimo_types::{ChannelKey, ChannelPath, ErrorKind, ServiceKind, Transport, TransportPref};
use nimo_types::Endpoint;

async fn add_node(client: &nimo_registry_client::RegistryClient, name: &str) {
    client
        .add_node(
            name,
            "alpha",
            ServiceKind::Filter,
            Endpoint::new(Ipv4Addr::new(10, 0, 0, 1), 40000),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn connection_agrees_on_tcp_and_rejects_a_second_sink() {
    let (client, _shutdown) = common::spawn_registry().await;

    add_node(&client, "N1").await;
    add_node(&client, "N2").await;
    add_node(&client, "N3").await;

    client
        .add_channel("N1", "/out", true, "logic data", TransportPref::Tcp)
        .await
        .unwrap();
    client
        .add_channel("N2", "/in", false, "logic data", TransportPref::Any)
        .await
        .unwrap();
    client
        .add_channel("N3", "/o", true, "logic data", TransportPref::Any)
        .await
        .unwrap();

    let n1_out = ChannelKey::new("N1".into(), ChannelPath::parse("/out").unwrap());
    let n2_in = ChannelKey::new("N2".into(), ChannelPath::parse("/in").unwrap());
    let n3_out = ChannelKey::new("N3".into(), ChannelPath::parse("/o").unwrap());

    let transport = client.add_connection(&n1_out, &n2_in).await.unwrap();
    assert_eq!(transport, Transport::Tcp);

    let err = client
        .add_connection(&n3_out, &n2_in)
        .await
        .expect_err("N2's input is already the sink of a live connection");
    assert_eq!(err.kind, ErrorKind::ChannelInUse);
}

#[tokio::test]
async fn connection_with_mismatched_data_types_is_rejected() {
    let (client, _shutdown) = common::spawn_registry().await;

    add_node(&client, "N1").await;
    add_node(&client, "N2").await;

    client
        .add_channel("N1", "/out2", true, "other data", TransportPref::Any)
        .await
        .unwrap();
    client
        .add_channel("N2", "/in2", false, "logic data", TransportPref::Any)
        .await
        .unwrap();

    let from = ChannelKey::new("N1".into(), ChannelPath::parse("/out2").unwrap());
    let to = ChannelKey::new("N2".into(), ChannelPath::parse("/in2").unwrap());

    let err = client
        .add_connection(&from, &to)
        .await
        .expect_err("mismatched data types must be rejected");
    assert_eq!(err.kind, ErrorKind::BadArgument);
    assert!(err.message.contains("data type"));
}
