//! Market WebSocket handler.
//!
//! A socket joins one market room and its player's balance room. Outbound
//! traffic goes through a bounded queue with a send timeout so one slow
//! client can never stall a room; the connection is dropped instead.

use super::AppState;
use crate::session::Session;
use crate::store::read_json;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use plinko_types::{keys, BetError, ClientMessage, RoundState, ServerEvent};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, Duration};

const WS_SEND_TIMEOUT: Duration = Duration::from_secs(2);
const WS_OUTBOUND_CAPACITY: usize = 64;

#[derive(Deserialize)]
pub(super) struct WsQuery {
    token: Option<String>,
}

pub(super) async fn market_ws(
    State(app): State<Arc<AppState>>,
    Path(market): Path<String>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if !app.markets.contains(&market) {
        return (StatusCode::NOT_FOUND, BetError::MarketClosed.code()).into_response();
    }
    let Some(token) = query.token else {
        return (StatusCode::UNAUTHORIZED, BetError::AuthRequired.code()).into_response();
    };
    let Some(session) = app.sessions.get_session(&token).await else {
        return (StatusCode::FORBIDDEN, BetError::InvalidSession.code()).into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, app, market, session))
        .into_response()
}

async fn handle_socket(socket: WebSocket, app: Arc<AppState>, market: String, session: Session) {
    app.metrics.connection_opened();
    tracing::info!(market = %market, player = %session.player_id, "socket joined");

    let (mut sink, mut incoming) = socket.split();
    let mut market_room = app.rooms.subscribe_market(&market);
    let mut player_room = app.rooms.subscribe_player(&session.player_id);
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(WS_OUTBOUND_CAPACITY);

    let writer_app = app.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            match timeout(WS_SEND_TIMEOUT, sink.send(message)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    writer_app.metrics.inc_send_error();
                    break;
                }
                Err(_) => {
                    writer_app.metrics.inc_send_timeout();
                    tracing::warn!("socket send timed out, dropping client");
                    break;
                }
            }
        }
        let _ = sink.close().await;
    });

    // Late joiners get the current round immediately.
    if let Ok(Some(state)) = read_json::<RoundState>(&*app.store, &keys::state(&market)).await {
        let _ = enqueue_event(&out_tx, &app, &ServerEvent::GameState(state));
    }

    loop {
        tokio::select! {
            message = incoming.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if handle_client_message(&app, &market, &session, text.as_str(), &out_tx)
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if enqueue(&out_tx, &app, Message::Pong(data)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::warn!(market = %market, error = %err, "socket error");
                        break;
                    }
                    _ => {}
                }
            }
            event = market_room.recv() => {
                if forward_room_event(event, &out_tx, &app).is_err() {
                    break;
                }
            }
            event = player_room.recv() => {
                if forward_room_event(event, &out_tx, &app).is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!(market = %market, player = %session.player_id, "socket left");
    drop(out_tx);
    let _ = writer.await;
    app.metrics.connection_closed();
}

async fn handle_client_message(
    app: &Arc<AppState>,
    market: &str,
    session: &Session,
    text: &str,
    out_tx: &mpsc::Sender<Message>,
) -> Result<(), ()> {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Err(_) => ServerEvent::BetError(plinko_types::events::ClientError {
            kind: "bet_error".into(),
            code: "BAD_REQUEST".into(),
            message: "unrecognized message".into(),
        }),
        Ok(ClientMessage::PlaceBet { amount, stocks }) => {
            match app.ledger.place_bet(market, session, amount, stocks).await {
                Ok(receipt) => ServerEvent::BetAccepted(receipt),
                Err(err) => ServerEvent::BetError(err.to_client_error()),
            }
        }
        Ok(ClientMessage::CancelBet { transaction_id }) => {
            match app.ledger.cancel_bet(market, session, &transaction_id).await {
                Ok(receipt) => ServerEvent::BetCancelled(receipt),
                Err(err) => ServerEvent::BetError(err.to_client_error()),
            }
        }
    };
    enqueue_event(out_tx, app, &reply)
}

fn forward_room_event(
    event: Result<Arc<ServerEvent>, broadcast::error::RecvError>,
    out_tx: &mpsc::Sender<Message>,
    app: &Arc<AppState>,
) -> Result<(), ()> {
    match event {
        Ok(event) => enqueue_event(out_tx, app, &event),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            app.metrics.add_lagged(skipped);
            tracing::warn!(skipped, "socket lagged behind its room");
            Ok(())
        }
        Err(broadcast::error::RecvError::Closed) => Err(()),
    }
}

fn enqueue_event(
    out_tx: &mpsc::Sender<Message>,
    app: &Arc<AppState>,
    event: &ServerEvent,
) -> Result<(), ()> {
    match serde_json::to_string(event) {
        Ok(json) => enqueue(out_tx, app, Message::Text(json.into())),
        Err(err) => {
            tracing::warn!(error = %err, "event encoding failed");
            Ok(())
        }
    }
}

fn enqueue(
    out_tx: &mpsc::Sender<Message>,
    app: &Arc<AppState>,
    message: Message,
) -> Result<(), ()> {
    match out_tx.try_send(message) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(_)) => {
            app.metrics.inc_queue_full();
            tracing::warn!("outbound queue full, dropping client");
            Err(())
        }
        Err(mpsc::error::TrySendError::Closed(_)) => Err(()),
    }
}
