//! §8 scenario 6: data-plane round trip over a directly-wired TCP
//! channel pair (no Registry needed on the data path itself — the
//! Registry only ever brokers the transport agreement).

use std::net::{Ipv4Addr, SocketAddr};

use nimo_channel::{Backpressure, Channel, InputMarker, OutputMarker};
use nimo_types::{ChannelKey, ChannelPath, Transport};
use nimo_value::Value;

#[tokio::test]
async fn three_logical_values_arrive_in_order_and_are_counted() {
    let mut input: Channel<InputMarker> = Channel::new(
        ChannelKey::new("N2".into(), ChannelPath::parse("/in").unwrap()),
        "logic data".into(),
    );
    let wire = input.set_up(Transport::Tcp).await.unwrap();
    let port = input.endpoint().unwrap().port;
    input.start(wire).unwrap();

    let mut output: Channel<OutputMarker> = Channel::new(
        ChannelKey::new("N1".into(), ChannelPath::parse("/out").unwrap()),
        "logic data".into(),
        Backpressure::Blocking,
    );
    let remote = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port);
    output.set_up_tcp(remote).await.unwrap();
    output.start().unwrap();

    for value in [true, false, true] {
        output.send(Value::Logical(value)).await.unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..3 {
        received.push(input.recv().await.expect("value should arrive"));
    }

    assert_eq!(
        received,
        vec![Value::Logical(true), Value::Logical(false), Value::Logical(true)]
    );
    assert_eq!(input.statistics().messages, 3);
}
