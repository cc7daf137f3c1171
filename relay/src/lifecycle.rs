use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, Stream, StreamExt};
use relay_common::{decode, FrameError, PeerRole};
use tracing::{debug, info, warn};

use crate::{
    context::RelayContext,
    registry::{ConnId, PeerHandle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Accepted, no init message seen yet.
    Connected,
    App,
    Vehicle,
    Closed,
}

impl ConnectionPhase {
    /// Only an unclassified connection takes on a role.
    pub fn classify(self, role: Option<PeerRole>) -> Self {
        match (self, role) {
            (Self::Connected, Some(PeerRole::App)) => Self::App,
            (Self::Connected, Some(PeerRole::Vehicle)) => Self::Vehicle,
            (phase, _) => phase,
        }
    }
}

pub async fn handle_socket(ctx: RelayContext, socket: WebSocket) {
    let conn_id = ctx.next_conn_id();
    let (mut ws_sender, ws_receiver) = socket.split();
    let (peer, mut outbound) = PeerHandle::channel(conn_id, ctx.config().outbound_buffer);

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(err) = ws_sender.send(Message::Text(frame.to_string().into())).await {
                debug!("conn {conn_id} write failed: {err}");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    info!("conn {conn_id} accepted");
    read_frames(&ctx, &peer, ws_receiver).await;
    drop(peer);
    writer.abort();
}

/// Feeds inbound frames to the relay until the client goes away or the
/// registry evicts this peer, then removes the connection.
pub async fn read_frames<S, E>(ctx: &RelayContext, peer: &PeerHandle, mut incoming: S) -> ConnectionPhase
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let conn_id = peer.id();
    let mut phase = ConnectionPhase::Connected;

    loop {
        let result = tokio::select! {
            _ = peer.evicted() => {
                warn!("conn {conn_id} evicted after a failed send; closing");
                break;
            }
            next = incoming.next() => match next {
                Some(result) => result,
                None => break,
            },
        };

        let message = match result {
            Ok(message) => message,
            Err(err) => {
                warn!("conn {conn_id} transport error: {err}");
                break;
            }
        };

        phase = match message {
            Message::Text(text) => handle_frame(ctx, peer, phase, text.as_str()).await,
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => handle_frame(ctx, peer, phase, text).await,
                Err(_) => {
                    warn!("conn {conn_id} sent a non utf8 binary frame");
                    phase
                }
            },
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => phase,
        };
    }

    close(ctx, conn_id, phase).await
}

/// Decodes and dispatches one text frame. Bad frames are logged and dropped;
/// the connection stays open.
pub async fn handle_frame(
    ctx: &RelayContext,
    peer: &PeerHandle,
    phase: ConnectionPhase,
    text: &str,
) -> ConnectionPhase {
    let max_frame_bytes = ctx.config().max_frame_bytes;
    if text.len() > max_frame_bytes {
        warn!(
            "conn {} dropping oversized frame ({} bytes, limit {max_frame_bytes})",
            peer.id(),
            text.len()
        );
        return phase;
    }

    let message = match decode(text) {
        Ok(message) => message,
        Err(FrameError::Decode(err)) => {
            warn!("conn {} dropping malformed frame: {err}", peer.id());
            return phase;
        }
        Err(FrameError::UnknownType(tag)) => {
            warn!("conn {} sent unknown message type {tag:?}", peer.id());
            return phase;
        }
    };

    let mut relay = ctx.lock().await;
    relay.dispatch(peer, message);
    let next = phase.classify(relay.peers().role_of(peer.id()));
    if next != phase {
        debug!("conn {} is now {next:?}", peer.id());
    }
    next
}

/// Removes the connection from every peer set. Safe to call more than once.
pub async fn close(ctx: &RelayContext, conn_id: ConnId, phase: ConnectionPhase) -> ConnectionPhase {
    let removed = ctx.lock().await.disconnect(conn_id);
    match removed {
        Some(role) => info!("{} disconnected (conn {conn_id})", role.as_str()),
        None => debug!("conn {conn_id} closed in phase {phase:?}"),
    }
    ConnectionPhase::Closed
}
