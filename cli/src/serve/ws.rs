use anyhow::anyhow;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_typed_websockets::{Message, WebSocket, WebSocketUpgrade};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::*;

use lobby::{Claim, Color, Connection, GameEvent, LobbyError, SessionSnapshot};

use super::{handlers::error_response, AppState, Arming, ClientSession, Seat};

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Claim { item: String },
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub enum ServerMessage {
    Error(String),
    Welcome {
        color: Color,
        snapshot: SessionSnapshot,
    },
    Reply(Claim),
    Event(GameEvent),
}

/// Queues events for the socket's send task.
pub(crate) struct SocketConnection {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection for SocketConnection {
    fn send(&self, event: &GameEvent) -> anyhow::Result<()> {
        self.tx
            .send(ServerMessage::Event(event.clone()))
            .map_err(|_| anyhow!("socket closed"))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ConnectQuery {
    game: String,
    user: String,
}

pub(crate) fn status_for(error: &LobbyError) -> StatusCode {
    match error {
        LobbyError::Validation(_) => StatusCode::BAD_REQUEST,
        LobbyError::Conflict(_) => StatusCode::CONFLICT,
        LobbyError::NotFound(_) => StatusCode::NOT_FOUND,
        LobbyError::Transport(_) => StatusCode::BAD_GATEWAY,
        LobbyError::Exhausted => StatusCode::SERVICE_UNAVAILABLE,
        LobbyError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn ws_handler(
    ws: Option<WebSocketUpgrade<ServerMessage, ClientMessage>>,
    Query(query): Query<ConnectQuery>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let ConnectQuery { game, user } = query;

    // Filled in by the upgrade, which only runs once the session has room for
    // this player. Dropping the response without returning it abandons the
    // handshake.
    let mut upgraded: Option<(Response, mpsc::UnboundedSender<ServerMessage>, Arming)> = None;

    let admitted = state
        .connect(&game, &user, || {
            let slot = &mut upgraded;
            let arming = Arming::default();
            let seat = Seat::new(
                state.clone(),
                ClientSession {
                    code: game.clone(),
                    username: user.clone(),
                },
                arming.clone(),
            );

            async move {
                let ws = ws.ok_or_else(|| anyhow!("not a websocket upgrade request"))?;
                let (tx, rx) = mpsc::unbounded_channel();
                let response = ws
                    .on_upgrade({
                        let replies = tx.clone();
                        move |socket| handle_socket(socket, replies, rx, seat)
                    })
                    .into_response();

                *slot = Some((response, tx.clone(), arming));

                let connection: Box<dyn Connection> = Box::new(SocketConnection { tx });

                Ok::<_, anyhow::Error>(connection)
            }
        })
        .await;

    match (admitted, upgraded) {
        (Ok(player), Some((response, tx, arming))) => {
            arming.arm();

            if let Some(session) = state.registry.get(&game).await {
                let welcome = ServerMessage::Welcome {
                    color: player.color(),
                    snapshot: session.snapshot().await,
                };

                if tx.send(welcome).is_err() {
                    warn!("welcome:tx:error");
                }
            }

            info!(code = %game, username = %user, color = %player.color(), "connected");

            response
        }
        (Ok(player), None) => {
            warn!(code = %game, username = %user, "connected without upgrade");
            state
                .remove_session(&ClientSession {
                    code: game,
                    username: player.username().to_owned(),
                })
                .await;

            error_response(StatusCode::INTERNAL_SERVER_ERROR, "upgrade lost").into_response()
        }
        (Err(e), _) => {
            let status = status_for(&e);
            info!(code = %game, username = %user, %status, "connect: {:?}", e);

            error_response(status, e).into_response()
        }
    }
}

async fn handle_socket(
    stream: WebSocket<ServerMessage, ClientMessage>,
    replies: mpsc::UnboundedSender<ServerMessage>,
    mut outgoing: mpsc::UnboundedReceiver<ServerMessage>,
    seat: Seat,
) {
    let (mut sender, mut receiver) = stream.split();
    let state = seat.state().clone();
    let ClientSession { code, username } = seat.session().clone();

    info!(%code, %username, "socket:open");

    // Everything for this client, events and replies alike, goes out through
    // the one queue.
    let mut send_task = tokio::spawn(async move {
        while let Some(server_message) = outgoing.recv().await {
            // In any websocket error, break loop.
            if sender.send(Message::Item(server_message)).await.is_err() {
                warn!("sending:tx:error");
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Item(ClientMessage::Claim { item }) => {
                    trace!(%code, %username, %item, "claim");

                    let reply = match state.registry.claim(&code, &username, &item).await {
                        Ok(claim) => ServerMessage::Reply(claim),
                        Err(e) => ServerMessage::Error(e.to_string()),
                    };

                    if replies.send(reply).is_err() {
                        warn!("replies:tx:error");
                        break;
                    }
                }
                Message::Close(_) => break,
                m => trace!("ignoring {:?}", m),
            }
        }
    });

    // If any one of the tasks exit, abort the others.
    tokio::select! {
        _ = (&mut send_task) => {
            info!("send-task:exited");
            recv_task.abort()
        },
        _ = (&mut recv_task) => {
            info!("recv-task:exited");
            send_task.abort();
        },
    };

    seat.release().await;
}
