//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::validate::validate_identity;
use crate::game::SessionError;
use crate::ws::protocol::{ServerMsg, Slot};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Slot index returned at registration
    #[serde(rename = "playerId")]
    pub player_id: Option<String>,
}

/// WebSocket upgrade handler.
///
/// The upgrade is always accepted so that identity problems can be reported
/// over the socket as an `error` event before closing.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, query: WsQuery, state: AppState) {
    let connection_id = Uuid::new_v4();
    let (mut ws_sink, ws_stream) = socket.split();

    let slot = match validate_identity(query.player_id.as_deref()) {
        Ok(slot) => slot,
        Err(e) => {
            warn!(connection_id = %connection_id, raw = ?query.player_id, "Channel opened without a valid identity");
            reject(&mut ws_sink, &e).await;
            return;
        }
    };

    let (tx, rx) = mpsc::channel(state.config.channel_capacity);

    if let Err(e) = state.session.attach(slot, connection_id, tx).await {
        reject(&mut ws_sink, &e).await;
        return;
    }

    info!(slot = %slot, connection_id = %connection_id, "WebSocket connection attached");

    run_channel(slot, connection_id, ws_sink, ws_stream, rx).await;

    state.session.detach(slot, connection_id).await;

    info!(slot = %slot, connection_id = %connection_id, "WebSocket connection closed");
}

/// Pump session events out and watch the socket for its end
async fn run_channel(
    slot: Slot,
    connection_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut events: mpsc::Receiver<String>,
) {
    // Writer task: session events -> WebSocket. Ends when the session drops
    // the sender, which is how a reset closes every channel.
    let mut writer_handle = tokio::spawn(async move {
        while let Some(text) = events.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(text)).await {
                debug!(slot = %slot, error = %e, "WebSocket send failed");
                return;
            }
        }
        let _ = ws_sink.send(Message::Close(None)).await;
    });

    // Reader loop: the client never drives the session over the socket
    loop {
        tokio::select! {
            frame = ws_stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    debug!(slot = %slot, len = text.len(), "Ignoring inbound text frame");
                }
                Some(Ok(Message::Binary(_))) => {
                    debug!(slot = %slot, "Ignoring inbound binary frame");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) => {
                    info!(slot = %slot, connection_id = %connection_id, "Client initiated close");
                    break;
                }
                Some(Err(e)) => {
                    warn!(slot = %slot, error = %e, "WebSocket error");
                    break;
                }
                None => break,
            },
            _ = &mut writer_handle => {
                debug!(slot = %slot, "Writer finished");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Report a refusal on the socket, then close it
async fn reject(ws_sink: &mut SplitSink<WebSocket, Message>, error: &SessionError) {
    let msg = ServerMsg::Error {
        message: error.to_string(),
    };
    match serde_json::to_string(&msg) {
        Ok(json) => {
            let _ = ws_sink.send(Message::Text(json)).await;
        }
        Err(e) => warn!(error = %e, "Failed to encode error event"),
    }
    let _ = ws_sink.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::Phase;
    use crate::http::build_router;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::{sleep, timeout};
    use tokio_tungstenite::{
        connect_async, tungstenite::Message as ClientMessage, MaybeTlsStream, WebSocketStream,
    };

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve() -> (SocketAddr, AppState) {
        let state = AppState::new(Config::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (addr, state)
    }

    async fn connect(addr: SocketAddr, player_id: &str) -> Client {
        let (client, _) = connect_async(format!("ws://{addr}/ws?playerId={player_id}"))
            .await
            .unwrap();
        client
    }

    /// Next event, or `None` once the server has closed the socket
    async fn next_event(client: &mut Client) -> Option<ServerMsg> {
        loop {
            let frame = timeout(Duration::from_secs(5), client.next())
                .await
                .expect("no frame from server");
            match frame {
                Some(Ok(ClientMessage::Text(text))) => {
                    return Some(serde_json::from_str(&text).unwrap())
                }
                Some(Ok(ClientMessage::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn wait_for_phase(state: &AppState, phase: Phase) {
        for _ in 0..100 {
            if state.session.summary().await.unwrap().phase == phase {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
        panic!("session never reached {phase:?}");
    }

    #[tokio::test]
    async fn unknown_identities_get_an_error_then_a_close() {
        let (addr, _state) = serve().await;

        // Not a slot, and a slot nobody registered
        for player_id in ["7", "0", "alice"] {
            let mut client = connect(addr, player_id).await;
            assert_eq!(
                next_event(&mut client).await,
                Some(ServerMsg::Error {
                    message: "Player not registered".to_string()
                })
            );
            assert_eq!(next_event(&mut client).await, None);
        }
    }

    #[tokio::test]
    async fn channels_start_the_game_and_a_close_resets_it() {
        let (addr, state) = serve().await;
        state.session.register("Alice".to_string()).await.unwrap();
        state.session.register("Bob".to_string()).await.unwrap();

        let mut alice = connect(addr, "0").await;
        let mut bob = connect(addr, "1").await;

        for client in [&mut alice, &mut bob] {
            assert!(matches!(
                next_event(client).await,
                Some(ServerMsg::GameStart { game_id: 1, .. })
            ));
            assert_eq!(
                next_event(client).await,
                Some(ServerMsg::TurnChange {
                    player_id_turn: Slot::First
                })
            );
        }

        // Inbound frames never drive the session
        alice
            .send(ClientMessage::Text("{\"type\":\"fire\"}".to_string()))
            .await
            .unwrap();
        sleep(Duration::from_millis(50)).await;
        let summary = state.session.summary().await.unwrap();
        assert_eq!(summary.phase, Phase::Active);
        assert_eq!(summary.turn, Some(Slot::First));
        assert_eq!(summary.connected, 2);

        // A second channel for a live slot is refused
        let mut intruder = connect(addr, "1").await;
        assert_eq!(
            next_event(&mut intruder).await,
            Some(ServerMsg::Error {
                message: "Player already connected".to_string()
            })
        );

        alice.close(None).await.unwrap();

        wait_for_phase(&state, Phase::Empty).await;
        assert_eq!(next_event(&mut bob).await, None);
        assert_eq!(state.session.summary().await.unwrap().registered, 0);
    }
}
