use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Unix time in whole seconds, as assigned by the room log.
pub type Timestamp = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub cancels: BTreeSet<String>,
    #[serde(default)]
    pub implies: Vec<String>,
    /// Seconds after which an active tile is considered stale.
    #[serde(default)]
    pub timeout: Option<i64>,
    #[serde(default)]
    pub ignore_duplicates: bool,
}

impl TileConfig {
    pub fn new(kind: &str, description: &str) -> Self {
        Self {
            kind: kind.to_string(),
            description: description.to_string(),
            cancels: BTreeSet::new(),
            implies: Vec::new(),
            timeout: None,
            ignore_duplicates: false,
        }
    }

    pub fn cancels(mut self, kinds: &[&str]) -> Self {
        self.cancels.extend(kinds.iter().map(|kind| kind.to_string()));
        self
    }

    pub fn implies(mut self, kinds: &[&str]) -> Self {
        self.implies.extend(kinds.iter().map(|kind| kind.to_string()));
        self
    }

    pub fn timeout(mut self, seconds: i64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn ignore_duplicates(mut self) -> Self {
        self.ignore_duplicates = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: Timestamp,
    pub sender_id: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileRuntimeState {
    pub active: bool,
    pub last_seen: Option<Timestamp>,
    pub history: Vec<EventRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    NeverSeen,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub columns: usize,
    pub rows: usize,
    pub cell_width: f64,
    pub cell_height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowStats {
    pub count: usize,
    pub median_interval: Option<i64>,
}

/// One entry of a room's shared log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: String,
    pub created: Timestamp,
    pub message: Value,
}

/// A tile event ready to be handed to the room log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub sender_name: String,
    pub recorded_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: Timestamp,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    pub owners: BTreeSet<String>,
    pub writers: BTreeSet<String>,
    pub requests: BTreeSet<String>,
}

/// Everything stored for a room; tile state is rebuilt from `messages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomLog {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub acl: Acl,
}

#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub sender: String,
}

#[derive(Debug, Deserialize)]
pub struct MeasurementRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub sender: String,
}

#[derive(Debug, Deserialize)]
pub struct ChildNameRequest {
    pub child_name: String,
    pub sender: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessRequest {
    pub sender: String,
    /// Participant the owner acts upon; unused for plain access requests.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SenderQuery {
    pub sender: String,
}

#[derive(Debug, Deserialize)]
pub struct GridQuery {
    pub width: f64,
    pub height: f64,
    /// Grid the page currently shows.
    #[serde(default)]
    pub columns: Option<usize>,
    #[serde(default)]
    pub rows: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct GridResponse {
    #[serde(flatten)]
    pub geometry: GridGeometry,
    pub rebuild: bool,
}

#[derive(Debug, Deserialize)]
pub struct ManifestQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TileView {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub status: TileStatus,
    pub status_text: String,
    pub active: bool,
    pub timed_out: bool,
    pub last_seen: Option<Timestamp>,
    pub stats: BTreeMap<String, WindowStats>,
}

#[derive(Debug, Serialize)]
pub struct TilesResponse {
    pub child_name: Option<String>,
    pub now: Timestamp,
    pub tiles: Vec<TileView>,
    /// Tiles with a pending confirmation and the ticks left before sending.
    pub arming: BTreeMap<String, u32>,
}

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub sent: Vec<OutgoingEvent>,
    pub changed: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ArmResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub armed: bool,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub writer: bool,
    pub owner: bool,
    pub requests: Vec<String>,
}
