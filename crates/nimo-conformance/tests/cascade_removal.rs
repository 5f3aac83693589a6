//! §8 scenario 5: cascading remove.

mod common;

use std::net::Ipv4Addr;

use nimo_types::{ChannelKey, ChannelPath, ServiceKind, TransportPref};
use nimo_types::Endpoint;
use nimo_value::{Key, Value};

#[tokio::test]
async fn removing_a_node_drops_its_channels_and_connections() {
    let (client, _shutdown) = common::spawn_registry().await;

    for name in ["N1", "N2"] {
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
    client
        .add_channel("N1", "/out", true, "logic data", TransportPref::Any)
        .await
        .unwrap();
    client
        .add_channel("N2", "/in", false, "logic data", TransportPref::Any)
        .await
        .unwrap();

    let n1_out = ChannelKey::new("N1".into(), ChannelPath::parse("/out").unwrap());
    let n2_in = ChannelKey::new("N2".into(), ChannelPath::parse("/in").unwrap());
    client.add_connection(&n1_out, &n2_in).await.unwrap();

    client.remove_node("N1").await.unwrap();

    assert_eq!(client.get_number_of_connections().await.unwrap(), 0);

    let payload = client
        .call(
            "getChannelInformation?",
            vec![Value::String("N2".into()), Value::String("/in".into())],
        )
        .await
        .unwrap();
    let Some(Value::Array(fields)) = payload else {
        panic!("getChannelInformation? should return a [found, row] pair");
    };
    assert_eq!(fields[0], Value::Logical(true));
    let Value::Map(row) = &fields[1] else {
        panic!("expected a channel row map");
    };
    assert_eq!(row.get(&Key::String("inUse".into())), Some(&Value::Logical(false)));
}
