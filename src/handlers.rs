use crate::countdown::{ArmToken, Press, Step};
use crate::errors::{AppError, TrackerError};
use crate::layout::{needs_rebuild, solve};
use crate::models::{
    AccessRequest, AccessResponse, ArmResponse, ChatMessage, ChildNameRequest, GridQuery,
    GridResponse, ManifestQuery, Measurement, MeasurementRequest, RecordRequest, RecordResponse,
    SenderQuery, TilesResponse,
};
use crate::state::{AppState, now};
use crate::stats::STAT_WINDOWS;
use crate::tracker::{CHILD_NAME_CHANGE, MEASUREMENT_KINDS};
use crate::ui::render_index;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::Uri,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};
use uuid::Uuid;

const TILE_ASPECT_WIDTH: f64 = 1.0;
const TILE_ASPECT_HEIGHT: f64 = 1.0;

pub async fn index() -> Redirect {
    fresh_room()
}

pub async fn baby_page(Path(raw): Path<String>) -> Result<Html<String>, Redirect> {
    match parse_room_id(&raw) {
        Some(id) => Ok(Html(render_index(id))),
        None => Err(fresh_room()),
    }
}

/// Unknown page paths land in a new room; unknown API paths are plain 404s.
pub async fn fallback(uri: Uri) -> Response {
    if uri.path().starts_with("/api/") {
        return AppError::not_found(format!("no route for {}", uri.path())).into_response();
    }
    fresh_room().into_response()
}

pub async fn manifest(Query(query): Query<ManifestQuery>) -> Json<Value> {
    Json(json!({
        "name": query.name,
        "display": "standalone",
    }))
}

pub async fn get_tiles(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TilesResponse>, AppError> {
    let now = now();
    let response = state
        .view(id, |room| TilesResponse {
            child_name: room.tracker.child_name().map(str::to_string),
            now,
            tiles: room.tracker.snapshot(now, &STAT_WINDOWS),
            arming: room.arming(),
        })
        .await;
    Ok(Json(response))
}

pub async fn get_grid(
    State(state): State<AppState>,
    Path(_id): Path<Uuid>,
    Query(query): Query<GridQuery>,
) -> Result<Json<GridResponse>, AppError> {
    let geometry = solve(
        query.width,
        query.height,
        state.tiles.len(),
        TILE_ASPECT_WIDTH,
        TILE_ASPECT_HEIGHT,
    )?;
    let shown = query.columns.zip(query.rows);
    Ok(Json(GridResponse {
        rebuild: needs_rebuild(shown, &geometry),
        geometry,
    }))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let messages = state.view(id, |room| room.room.messages().to_vec()).await;
    Ok(Json(messages))
}

pub async fn get_series(
    State(state): State<AppState>,
    Path((id, kind)): Path<(Uuid, String)>,
) -> Result<Json<Vec<Measurement>>, AppError> {
    if !MEASUREMENT_KINDS.contains(&kind.as_str()) {
        return Err(AppError::not_found(format!("unknown series {kind:?}")));
    }
    let series = state
        .view(id, |room| room.tracker.measurements(&kind).to_vec())
        .await;
    Ok(Json(series))
}

pub async fn record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordRequest>,
) -> Result<Json<RecordResponse>, AppError> {
    let sender = required_sender(&payload.sender)?;
    let kind = known_tile(&state, &payload.kind)?;
    let mut room = state.room(id).await;
    let response = room.record(kind, sender, now())?;
    state.persist(&room).await?;
    info!(room = %id, %sender, sent = response.sent.len(), "recorded {}", payload.kind);
    Ok(Json(response))
}

pub async fn record_measurement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MeasurementRequest>,
) -> Result<Json<ChatMessage>, AppError> {
    let sender = required_sender(&payload.sender)?;
    if !MEASUREMENT_KINDS.contains(&payload.kind.as_str()) {
        return Err(AppError::bad_request("type must be 'weight' or 'temperature'"));
    }
    if !payload.value.is_finite() {
        return Err(AppError::bad_request("value must be a finite number"));
    }
    let mut room = state.room(id).await;
    let (entry, _) = room.send(
        sender,
        json!({ "type": payload.kind, "value": payload.value }),
        now(),
    )?;
    state.persist(&room).await?;
    Ok(Json(entry))
}

pub async fn change_child_name(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChildNameRequest>,
) -> Result<Json<ChatMessage>, AppError> {
    let sender = required_sender(&payload.sender)?;
    let mut room = state.room(id).await;
    let (entry, _) = room.send(
        sender,
        json!({ "type": CHILD_NAME_CHANGE, "child_name": payload.child_name }),
        now(),
    )?;
    state.persist(&room).await?;
    Ok(Json(entry))
}

/// First press arms the tile's countdown, a second press before it fires cancels it.
pub async fn arm(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordRequest>,
) -> Result<Json<ArmResponse>, AppError> {
    let sender = required_sender(&payload.sender)?.to_string();
    let kind = known_tile(&state, &payload.kind)?.to_string();

    let press = {
        let mut room = state.room(id).await;
        if room.room.claim(&sender) {
            state.persist(&room).await?;
        }
        if !room.room.am_writer(&sender) {
            return Err(AppError::forbidden(format!(
                "{sender} does not have write access to this room"
            )));
        }
        room.press(&kind, state.settings.confirm_ticks)
    };

    let armed = match press {
        Press::Armed(token) => {
            debug!(room = %id, %kind, "countdown armed");
            tokio::spawn(drive_countdown(state.clone(), id, kind.clone(), sender, token));
            true
        }
        Press::Cancelled => {
            debug!(room = %id, %kind, "countdown cancelled");
            false
        }
        Press::Ignored => false,
    };

    Ok(Json(ArmResponse { kind, armed }))
}

async fn drive_countdown(state: AppState, id: Uuid, kind: String, sender: String, token: ArmToken) {
    let period = Duration::from_secs(1);
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        let mut room = state.room(id).await;
        match room.tick(&kind, token) {
            Step::Pending(_) | Step::Linger => {}
            Step::Commit => {
                let result = match room.record(&kind, &sender, now()) {
                    Ok(response) => state.persist(&room).await.map(|_| response),
                    Err(err) => Err(err),
                };
                match result {
                    Ok(response) => {
                        info!(room = %id, %sender, sent = response.sent.len(), "confirmed {kind}")
                    }
                    Err(err) => warn!(room = %id, %kind, "confirmed send failed: {}", err.message),
                }
            }
            Step::Done | Step::Stale => break,
        }
    }
}

pub async fn get_access(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SenderQuery>,
) -> Result<Json<AccessResponse>, AppError> {
    let access = state
        .view(id, |room| access_response(&room.room, &query.sender))
        .await;
    Ok(Json(access))
}

pub async fn request_access(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AccessRequest>,
) -> Result<Json<AccessResponse>, AppError> {
    let sender = required_sender(&payload.sender)?;
    let mut room = state.room(id).await;
    if !room.room.claim(sender) && room.room.request_access(sender) {
        info!(room = %id, %sender, "access requested");
    }
    state.persist(&room).await?;
    Ok(Json(access_response(&room.room, sender)))
}

pub async fn grant_writer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AccessRequest>,
) -> Result<Json<AccessResponse>, AppError> {
    let (sender, target) = owner_action(&payload)?;
    let mut room = state.room(id).await;
    room.room.add_writer(sender, target)?;
    state.persist(&room).await?;
    Ok(Json(access_response(&room.room, sender)))
}

pub async fn grant_owner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AccessRequest>,
) -> Result<Json<AccessResponse>, AppError> {
    let (sender, target) = owner_action(&payload)?;
    let mut room = state.room(id).await;
    room.room.add_owner(sender, target)?;
    state.persist(&room).await?;
    Ok(Json(access_response(&room.room, sender)))
}

pub async fn deny_access(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AccessRequest>,
) -> Result<Json<AccessResponse>, AppError> {
    let (sender, target) = owner_action(&payload)?;
    let mut room = state.room(id).await;
    room.room.deny_request(sender, target)?;
    state.persist(&room).await?;
    Ok(Json(access_response(&room.room, sender)))
}

fn access_response(room: &crate::room::Room, sender: &str) -> AccessResponse {
    let owner = room.am_owner(sender);
    AccessResponse {
        writer: room.am_writer(sender),
        owner,
        requests: if owner { room.requests() } else { Vec::new() },
    }
}

fn owner_action(payload: &AccessRequest) -> Result<(&str, &str), AppError> {
    let sender = required_sender(&payload.sender)?;
    let target = payload
        .target
        .as_deref()
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .ok_or_else(|| AppError::bad_request("target is required"))?;
    Ok((sender, target))
}

fn known_tile<'a>(state: &AppState, kind: &'a str) -> Result<&'a str, AppError> {
    let kind = kind.trim();
    if !state.tiles.iter().any(|tile| tile.kind == kind) {
        return Err(TrackerError::UnknownEventType(kind.to_string()).into());
    }
    Ok(kind)
}

fn required_sender(sender: &str) -> Result<&str, AppError> {
    let sender = sender.trim();
    if sender.is_empty() {
        return Err(AppError::bad_request("sender name is required"));
    }
    Ok(sender)
}

/// Only the canonical lowercase hyphenated form names a room.
fn parse_room_id(raw: &str) -> Option<Uuid> {
    Uuid::try_parse(raw)
        .ok()
        .filter(|id| id.hyphenated().to_string() == raw)
}

fn fresh_room() -> Redirect {
    Redirect::to(&format!("/baby/{}", Uuid::new_v4()))
}
