use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use relay_common::{OutboundMessage, TAG_INIT_REQUEST_CAR};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::model::VehicleModel;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let relay_url =
        std::env::var("RELAY_URL").unwrap_or_else(|_| "ws://127.0.0.1:8000/ws".to_string());
    let tick_ms = std::env::var("SIM_TICK_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .unwrap_or(2000);
    let tick = Duration::from_millis(tick_ms);

    let (socket, _) = connect_async(relay_url.as_str())
        .await
        .with_context(|| format!("failed to connect to relay at {relay_url}"))?;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let init = serde_json::json!({ "type": TAG_INIT_REQUEST_CAR }).to_string();
    ws_sender
        .send(Message::Text(init.into()))
        .await
        .context("failed to register as vehicle")?;

    info!("vehicle simulator connected to {relay_url}, tick {tick_ms} ms");

    let mut model = VehicleModel::default();
    let mut interval = tokio::time::interval(tick);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                model.advance(tick);
                for message in model.telemetry() {
                    let text = message.encode().context("failed to encode telemetry")?;
                    ws_sender
                        .send(Message::Text(text.into()))
                        .await
                        .context("failed to send telemetry")?;
                }
            }
            incoming = ws_receiver.next() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(err)) => {
                        warn!("relay connection error: {err}");
                        return Ok(());
                    }
                    None => {
                        info!("relay closed the connection");
                        return Ok(());
                    }
                };
                match message {
                    Message::Text(text) => handle_command(&mut model, text.as_str()),
                    Message::Close(_) => {
                        info!("relay closed the connection");
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }
    }
}

fn handle_command(model: &mut VehicleModel, text: &str) {
    match serde_json::from_str::<OutboundMessage>(text) {
        Ok(command) => {
            if model.apply(&command) {
                info!("applied {command:?}");
            } else {
                debug!("ignoring {command:?}");
            }
        }
        Err(err) => warn!("unreadable frame from relay: {err}"),
    }
}
