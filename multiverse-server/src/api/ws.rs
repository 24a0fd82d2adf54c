use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State as AxumState,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use multiverse_orchestrator::CommandOutcome;
use multiverse_proto::{Command, EventEnvelope, ProtocolError};
use tokio::sync::mpsc;

use crate::api::{overloaded_response, AppState};

/// Everything the writer task may place on the wire for a connection: a
/// logged, server-stamped envelope routed through the orchestrator, or a
/// direct reply (`game_list`, `universe_state`, `error`) that never touches
/// the event log, per §7's propagation policy.
enum Outbound {
    Envelope(EventEnvelope),
    Direct(serde_json::Value),
}

/// Validates the WS `Origin` header, generalizing `simulator::api::ws`'s
/// `validate_origin`. When `ALLOWED_WS_ORIGINS` is unset every origin is
/// accepted — the "no access control beyond coarse registration" Non-goal
/// is the default; operators opt into the stricter behavior.
fn validate_origin(headers: &HeaderMap) -> bool {
    let allowed = std::env::var("ALLOWED_WS_ORIGINS").unwrap_or_default();
    if allowed.trim().is_empty() {
        return true;
    }
    let allow_no_origin = matches!(
        std::env::var("ALLOW_WS_NO_ORIGIN").as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes") | Ok("YES")
    );
    let origin = match headers
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok())
    {
        Some(origin) => origin,
        None => return allow_no_origin,
    };
    allowed
        .split(',')
        .map(|s| s.trim())
        .any(|candidate| candidate == origin)
}

pub(super) async fn ws_handler(
    AxumState(state): AxumState<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if !validate_origin(&headers) {
        state.metrics.record_connection_rejected_origin();
        return (axum::http::StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }
    let guard = match state.try_acquire_connection() {
        Ok(guard) => guard,
        Err(()) => {
            state.metrics.record_connection_rejected_overloaded();
            return overloaded_response();
        }
    };
    state.metrics.record_connection_accepted();
    let max_frame_bytes = state.config.max_frame_bytes;
    ws.max_message_size(max_frame_bytes)
        .max_frame_size(max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, guard))
}

async fn handle_socket(socket: WebSocket, state: AppState, _guard: super::ConnectionGuard) {
    let (mut sender, mut receiver) = socket.split();
    let (envelope_tx, mut envelope_rx) =
        mpsc::channel::<EventEnvelope>(state.config.orchestrator.queue_max);
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<serde_json::Value>();
    let overrun_flag = Arc::new(AtomicBool::new(false));

    // `subscribe` takes ownership of `envelope_tx` rather than a clone: the
    // actor's copy is the *only* copy, so dropping it (on unsubscribe or on
    // an overrun eviction) closes the channel and wakes the writer task
    // immediately via `envelope_rx.recv() -> None`. A clone held here too
    // would keep the channel open after an overrun eviction and the writer
    // would never notice the flag was set.
    let (subscriber_id, replay) = match state
        .handle
        .subscribe(envelope_tx, overrun_flag.clone())
        .await
    {
        Ok(result) => result,
        Err(_) => return,
    };

    for envelope in replay {
        if send_outbound(&mut sender, &Outbound::Envelope(envelope))
            .await
            .is_err()
        {
            state.handle.unsubscribe(subscriber_id).await;
            return;
        }
    }

    let writer_metrics = state.metrics.clone();
    let writer_overrun_flag = overrun_flag.clone();
    let writer_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                envelope = envelope_rx.recv() => {
                    match envelope {
                        Some(envelope) => {
                            if send_outbound(&mut sender, &Outbound::Envelope(envelope)).await.is_err() {
                                writer_metrics.record_send_error();
                                break;
                            }
                        }
                        None => break,
                    }
                }
                direct = direct_rx.recv() => {
                    match direct {
                        Some(value) => {
                            if send_outbound(&mut sender, &Outbound::Direct(value)).await.is_err() {
                                writer_metrics.record_send_error();
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        if writer_overrun_flag.load(std::sync::atomic::Ordering::SeqCst) {
            writer_metrics.record_overrun();
            let _ = sender
                .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                    code: 1008,
                    reason: "overrun".into(),
                })))
                .await;
        } else {
            let _ = sender.close().await;
        }
    });

    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                if !dispatch_frame(&state, subscriber_id, text.as_str(), &direct_tx).await {
                    break;
                }
            }
            Some(Ok(Message::Binary(_))) => {
                state.metrics.record_schema_error();
                let error = ProtocolError::schema("binary frames are rejected");
                let _ = direct_tx.send(direct_error(&error));
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Err(_)) => break,
        }
    }

    state.handle.unsubscribe(subscriber_id).await;
    drop(direct_tx);
    let _ = writer_handle.await;
}

/// Parses and runs one inbound frame. Returns `false` if the connection
/// should close (the orchestrator actor is gone). Errors from command
/// processing are reported as a direct `error` message on this connection
/// only, per §7's propagation policy — never appended to the log.
async fn dispatch_frame(
    state: &AppState,
    subscriber_id: u64,
    text: &str,
    direct_tx: &mpsc::UnboundedSender<serde_json::Value>,
) -> bool {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            state.metrics.record_schema_error();
            let error = ProtocolError::schema(format!("invalid JSON: {e}"));
            let _ = direct_tx.send(direct_error(&error));
            return true;
        }
    };
    let command = match Command::try_from_value(value) {
        Ok(command) => command,
        Err(error) => {
            state.metrics.record_schema_error();
            let _ = direct_tx.send(direct_error(&error));
            return true;
        }
    };
    match state.handle.submit_command(subscriber_id, command).await {
        Ok(Ok(outcome)) => {
            if let Some(reply) = direct_reply(outcome) {
                let _ = direct_tx.send(reply);
            }
            true
        }
        Ok(Err(error)) => {
            let _ = direct_tx.send(direct_error(&error));
            true
        }
        Err(_) => false,
    }
}

/// `list_games`/`universe_state` reply directly to the requesting
/// connection rather than through the log, matching the command table's
/// "not broadcast" note. The other three outcomes are already observable
/// through the broadcast the actor already performed (or, for
/// `publish_event`, the routed delivery at the next control tick).
fn direct_reply(outcome: CommandOutcome) -> Option<serde_json::Value> {
    match outcome {
        CommandOutcome::GameList(games) => Some(serde_json::json!({
            "event_type": "game_list",
            "data": { "games": games },
        })),
        CommandOutcome::Universe(state) => Some(serde_json::json!({
            "event_type": "universe_state",
            "data": state,
        })),
        CommandOutcome::Registered(_) | CommandOutcome::Unregistered | CommandOutcome::Published => {
            None
        }
    }
}

fn direct_error(error: &ProtocolError) -> serde_json::Value {
    serde_json::json!({ "event_type": "error", "data": error.to_data() })
}

async fn send_outbound(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    outbound: &Outbound,
) -> Result<(), axum::Error> {
    let text = match outbound {
        Outbound::Envelope(envelope) => serde_json::to_string(envelope).unwrap_or_default(),
        Outbound::Direct(value) => serde_json::to_string(value).unwrap_or_default(),
    };
    sender.send(Message::Text(text.into())).await
}
