//! §8 scenario 2: node add/remove.

mod common;

use std::net::Ipv4Addr;

use nimo_types::ServiceKind;
use nimo_types::Endpoint;

#[tokio::test]
async fn add_then_remove_node_round_trips_through_names_of_nodes() {
    let (client, _shutdown) = common::spawn_registry().await;

    client.add_machine("alpha", Ipv4Addr::new(10, 0, 0, 1)).await.unwrap();

    client
        .add_node(
            "N1",
            "alpha",
            ServiceKind::Filter,
            Endpoint::new(Ipv4Addr::new(10, 0, 0, 1), 40001),
        )
        .await
        .expect("addNode should succeed");

    let names = client.get_names_of_nodes().await.unwrap();
    assert_eq!(names, vec!["N1".to_string()]);

    client.remove_node("N1").await.expect("removeNode should succeed");

    let names = client.get_names_of_nodes().await.unwrap();
    assert!(names.is_empty());
}
