use crate::config::Settings;
use crate::countdown::{ArmToken, Countdown, CountdownState, Press, Step};
use crate::errors::{AppError, RoomError};
use crate::models::{
    ChatMessage, OutgoingEvent, RecordResponse, RoomLog, TileConfig, Timestamp,
};
use crate::room::Room;
use crate::storage::{load_room, persist_room};
use crate::tracker::{TileListener, TileStateTracker};
use chrono::Utc;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

pub fn now() -> Timestamp {
    Utc::now().timestamp()
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub tiles: Arc<Vec<TileConfig>>,
    pub rooms: Arc<Mutex<HashMap<Uuid, BabyRoom>>>,
}

impl AppState {
    pub fn new(settings: Settings, tiles: Vec<TileConfig>) -> Self {
        Self {
            settings: Arc::new(settings),
            tiles: Arc::new(tiles),
            rooms: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Locks the room for writing, loading and replaying its log on first use.
    /// The room stays loaded afterwards.
    pub async fn room(&self, id: Uuid) -> MappedMutexGuard<'_, BabyRoom> {
        let mut rooms = self.rooms.lock().await;
        let log = if rooms.contains_key(&id) {
            None
        } else {
            Some(load_room(&self.settings.data_dir, id).await)
        };
        MutexGuard::map(rooms, |rooms| {
            rooms.entry(id).or_insert_with(|| {
                BabyRoom::open(id, log.unwrap_or_default(), self.tiles.as_ref().clone(), now())
            })
        })
    }

    /// Runs `read` against the room. A room that is not loaded is replayed from
    /// its stored log (or empty) and dropped again, so lookups never grow `rooms`.
    pub async fn view<R>(&self, id: Uuid, read: impl FnOnce(&BabyRoom) -> R) -> R {
        let rooms = self.rooms.lock().await;
        if let Some(room) = rooms.get(&id) {
            return read(room);
        }
        drop(rooms);

        let log = load_room(&self.settings.data_dir, id).await;
        let room = BabyRoom::open(id, log, self.tiles.as_ref().clone(), now());
        read(&room)
    }

    pub async fn persist(&self, room: &BabyRoom) -> Result<(), AppError> {
        persist_room(&self.settings.data_dir, room.id, room.room.log()).await
    }

    /// Re-evaluates timeouts in every loaded room.
    pub async fn refresh_all(&self, now: Timestamp) {
        let mut rooms = self.rooms.lock().await;
        for (id, room) in rooms.iter_mut() {
            let changed = room.tracker.refresh(now);
            if !changed.is_empty() {
                info!(room = %id, ?changed, "tile activity aged out");
            }
        }
    }
}

/// Logs state changes the page will pick up on its next poll.
struct ChangeLog {
    room: Uuid,
}

impl TileListener for ChangeLog {
    fn tiles_changed(&mut self, changed: &[String]) {
        debug!(room = %self.room, ?changed, "tiles changed");
    }
}

pub struct BabyRoom {
    pub id: Uuid,
    pub room: Room,
    pub tracker: TileStateTracker,
    pub countdowns: HashMap<String, Countdown>,
}

impl BabyRoom {
    pub fn open(id: Uuid, log: RoomLog, tiles: Vec<TileConfig>, now: Timestamp) -> Self {
        let mut tracker = TileStateTracker::new(tiles);
        for message in &log.messages {
            tracker.handle_message(message);
        }
        // Replayed events may already be stale; settle the baseline before anyone listens.
        tracker.refresh(now);
        tracker.subscribe(Box::new(ChangeLog { room: id }));
        debug!(room = %id, messages = log.messages.len(), "room replayed");
        Self {
            id,
            room: Room::new(log),
            tracker,
            countdowns: HashMap::new(),
        }
    }

    /// Appends to the log and feeds the tracker, the same path replay takes.
    pub fn send(
        &mut self,
        sender: &str,
        message: Value,
        now: Timestamp,
    ) -> Result<(ChatMessage, Vec<String>), RoomError> {
        self.room.claim(sender);
        let entry = self.room.send_message(sender, message, now)?;
        let changed = self.tracker.handle_message(&entry);
        Ok((entry, changed))
    }

    pub fn record(
        &mut self,
        kind: &str,
        sender: &str,
        now: Timestamp,
    ) -> Result<RecordResponse, AppError> {
        let events = self.tracker.record_with_implications(kind, sender, now)?;
        self.room.claim(sender);
        if !self.room.am_writer(sender) {
            return Err(RoomError::PermissionDenied {
                sender: sender.to_string(),
            }
            .into());
        }

        let mut changed = Vec::new();
        for event in &events {
            let (_, tiles) = self.send(sender, event_message(event), now)?;
            for tile in tiles {
                if !changed.contains(&tile) {
                    changed.push(tile);
                }
            }
        }
        Ok(RecordResponse {
            sent: events,
            changed,
        })
    }

    pub fn press(&mut self, kind: &str, ticks: u32) -> Press {
        self.countdowns
            .entry(kind.to_string())
            .or_insert_with(|| Countdown::new(ticks))
            .press()
    }

    pub fn tick(&mut self, kind: &str, token: ArmToken) -> Step {
        self.countdowns
            .get_mut(kind)
            .map_or(Step::Stale, |countdown| countdown.tick(token))
    }

    pub fn arming(&self) -> BTreeMap<String, u32> {
        self.countdowns
            .iter()
            .filter_map(|(kind, countdown)| match countdown.state() {
                CountdownState::Arming { remaining, .. } => Some((kind.clone(), remaining)),
                _ => None,
            })
            .collect()
    }
}

fn event_message(event: &OutgoingEvent) -> Value {
    json!({
        "type": event.kind,
        "sender_name": event.sender_name,
        "recorded_at": event.recorded_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::default_tiles;

    fn room() -> BabyRoom {
        BabyRoom::open(Uuid::new_v4(), RoomLog::default(), default_tiles(), 0)
    }

    #[test]
    fn record_sends_implied_events_first() {
        let mut room = room();
        let response = room.record("diaper_urine", "alice", 1_000).unwrap();

        let kinds: Vec<&str> = room
            .room
            .messages()
            .iter()
            .filter_map(|message| message.message["type"].as_str())
            .collect();
        assert_eq!(kinds, vec!["awake", "diaper_urine"]);
        assert_eq!(response.changed, vec!["awake".to_string(), "diaper_urine".to_string()]);
        assert!(room.tracker.is_effectively_active("awake", 1_000));
        assert!(room.tracker.is_effectively_active("diaper_urine", 1_000));
    }

    #[test]
    fn record_without_access_sends_nothing() {
        let mut room = room();
        room.record("awake", "alice", 1).unwrap();
        let err = room.record("asleep", "bob", 2).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::FORBIDDEN);
        assert_eq!(room.room.messages().len(), 1);

        let err = room.record("foo", "alice", 3).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn reopening_replays_the_log() {
        let mut first = room();
        first.record("awake", "alice", 10).unwrap();
        first.record("asleep", "alice", 20).unwrap();
        first
            .send("alice", json!({"type": "child_name_change", "child_name": "Ada"}), 30)
            .unwrap();

        let replayed = BabyRoom::open(first.id, first.room.log().clone(), default_tiles(), 30);
        assert!(replayed.tracker.state("asleep").unwrap().active);
        assert!(!replayed.tracker.state("awake").unwrap().active);
        assert_eq!(replayed.tracker.child_name(), Some("Ada"));
        assert!(replayed.room.am_owner("alice"));
    }

    #[test]
    fn arming_reports_remaining_ticks() {
        let mut room = room();
        let Press::Armed(token) = room.press("feeding_breast", 3) else {
            panic!("expected arming");
        };
        assert_eq!(room.tick("feeding_breast", token), Step::Pending(2));
        assert_eq!(room.arming().get("feeding_breast"), Some(&2));
        assert_eq!(room.press("feeding_breast", 3), Press::Cancelled);
        assert!(room.arming().is_empty());
        assert_eq!(room.tick("awake", token), Step::Stale);
    }

    #[test]
    fn stale_replayed_tiles_are_not_reported_again() {
        let mut first = room();
        first.record("feeding_breast", "alice", 0).unwrap();

        let ten_hours = 10 * 60 * 60;
        let mut replayed =
            BabyRoom::open(first.id, first.room.log().clone(), default_tiles(), ten_hours);
        assert!(!replayed.tracker.is_effectively_active("feeding_breast", ten_hours));
        assert!(replayed.tracker.refresh(ten_hours + 60).is_empty());
    }

    fn test_state() -> AppState {
        let settings = Settings {
            data_dir: std::env::temp_dir().join(format!("baby_stats_state_{}", Uuid::new_v4())),
            ..Settings::default()
        };
        AppState::new(settings, default_tiles())
    }

    #[tokio::test]
    async fn reads_do_not_keep_rooms_loaded() {
        let state = test_state();
        for _ in 0..50 {
            let count = state.view(Uuid::new_v4(), |room| room.room.messages().len()).await;
            assert_eq!(count, 0);
        }
        assert!(state.rooms.lock().await.is_empty());

        let id = Uuid::new_v4();
        {
            let mut room = state.room(id).await;
            room.record("awake", "alice", now()).unwrap();
        }
        assert_eq!(state.rooms.lock().await.len(), 1);
        let count = state.view(id, |room| room.room.messages().len()).await;
        assert_eq!(count, 1);
        assert_eq!(state.rooms.lock().await.len(), 1);
    }
}
