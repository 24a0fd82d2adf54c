use axum::{
    extract::State as AxumState,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::api::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    tick_number: u64,
    registered_games: u64,
    buffered_events: u64,
    tick_failures: u64,
    subscriber_overruns: u64,
}

/// `GET /api/health` — `{status, tick_number, registered_games,
/// buffered_events}` plus the failure counters the error-propagation policy
/// requires surfacing (a fatal internal error increments a counter surfaced
/// here rather than terminating the orchestrator).
pub(super) async fn health(AxumState(state): AxumState<AppState>) -> Response {
    let universe = state.handle.snapshot().await.ok();
    let status = if universe.is_some() { "ok" } else { "degraded" };
    let (tick_number, registered_games, buffered_events) = universe
        .map(|u| (u.tick_number, u.registered_games, u.buffered_events))
        .unwrap_or((0, 0, 0));
    let orchestrator_snapshot = state.orchestrator_metrics.snapshot();
    Json(HealthResponse {
        status,
        tick_number,
        registered_games,
        buffered_events,
        tick_failures: orchestrator_snapshot.tick_failures,
        subscriber_overruns: orchestrator_snapshot.subscriber_overruns,
    })
    .into_response()
}

/// `GET /api/realms` — the same snapshot the `list_games` WS command
/// returns. The subscriber id passed to `submit_command` is a placeholder:
/// `ListGames` never consults it.
pub(super) async fn realms(AxumState(state): AxumState<AppState>) -> Response {
    match state
        .handle
        .submit_command(0, multiverse_proto::Command::ListGames)
        .await
    {
        Ok(Ok(multiverse_orchestrator::CommandOutcome::GameList(list))) => {
            Json(list).into_response()
        }
        _ => Json(Vec::<multiverse_proto::Registration>::new()).into_response(),
    }
}
