use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use relay_common::{OutboundMessage, RelayConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use vehicle_relay::{host, RelayContext};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = RelayContext::new(RelayConfig::default());
    tokio::spawn(host::serve(listener, ctx));
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

async fn send(client: &mut Client, frame: &str) {
    client.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn recv(client: &mut Client) -> OutboundMessage {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = next {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn join_as_app(addr: SocketAddr) -> (Client, Vec<OutboundMessage>) {
    let mut app = connect(addr).await;
    send(&mut app, r#"{"type":"INIT_REQUEST_APP"}"#).await;
    let mut snapshot = Vec::new();
    for _ in 0..8 {
        snapshot.push(recv(&mut app).await);
    }
    (app, snapshot)
}

#[tokio::test]
async fn telemetry_and_commands_flow_between_peers() {
    let addr = start_relay().await;
    let (mut app, snapshot) = join_as_app(addr).await;
    assert_eq!(snapshot[0], OutboundMessage::Battery { percent: 0.0 });
    assert_eq!(snapshot[4], OutboundMessage::TemperatureTarget { target: 20.0 });

    let mut car = connect(addr).await;
    send(&mut car, r#"{"type":"INIT_REQUEST_CAR"}"#).await;
    send(&mut car, r#"{"type":"BATTERY","payload":{"percent":0.8}}"#).await;
    assert_eq!(recv(&mut app).await, OutboundMessage::Battery { percent: 0.8 });

    send(&mut app, r#"{"type":"TEMPERATURE_SET","payload":{"target":22.5}}"#).await;
    assert_eq!(recv(&mut car).await, OutboundMessage::TemperatureSet { temp: 22.5 });
    assert_eq!(recv(&mut app).await, OutboundMessage::TemperatureTarget { target: 22.5 });

    let (mut late_app, late_snapshot) = join_as_app(addr).await;
    assert_eq!(late_snapshot[0], OutboundMessage::Battery { percent: 0.8 });
    assert_eq!(late_snapshot[4], OutboundMessage::TemperatureTarget { target: 22.5 });

    late_app.close(None).await.unwrap();
    send(
        &mut car,
        r#"{"type":"COORDS_CAR","payload":{"latitude":50.06,"longitude":19.91}}"#,
    )
    .await;
    assert_eq!(
        recv(&mut app).await,
        OutboundMessage::CoordsCar {
            latitude: 50.06,
            longitude: 19.91
        }
    );
}

#[tokio::test]
async fn malformed_frames_do_not_close_the_connection() {
    let addr = start_relay().await;
    let (mut app, _) = join_as_app(addr).await;

    send(&mut app, "{not json").await;
    send(&mut app, r#"{"type":"BATTERY","payload":{}}"#).await;
    send(&mut app, r#"{"type":"TELEPORT"}"#).await;
    send(&mut app, r#"{"type":"SCHEDULE_GET"}"#).await;

    match recv(&mut app).await {
        OutboundMessage::Schedule { schedule } => assert_eq!(schedule.len(), 7),
        other => panic!("expected schedule, got {other:?}"),
    }
}
