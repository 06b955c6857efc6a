//! Per-room tile state.
//!
//! The tracker consumes the room's message log in arrival order and keeps, for
//! every configured tile, whether it is active, when it was last seen and the
//! full history used for statistics. Timeouts are never written back into the
//! stored state; they only affect the derived "effectively active" reads.

use crate::errors::TrackerError;
use crate::models::{
    ChatMessage, EventRecord, Measurement, OutgoingEvent, TileConfig, TileRuntimeState, TileStatus,
    TileView, Timestamp, WindowStats,
};
use crate::stats::{status_text, windowed_stats};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

pub const CHILD_NAME_CHANGE: &str = "child_name_change";
pub const MEASUREMENT_KINDS: [&str; 2] = ["weight", "temperature"];

/// Receives the ids of tiles whose displayed state changed.
pub trait TileListener: Send + Sync {
    fn tiles_changed(&mut self, changed: &[String]);
}

pub struct TileStateTracker {
    configs: Vec<TileConfig>,
    index: HashMap<String, usize>,
    states: Vec<TileRuntimeState>,
    effective: Vec<bool>,
    child_name: Option<String>,
    measurements: BTreeMap<String, Vec<Measurement>>,
    listeners: Vec<Box<dyn TileListener>>,
}

impl TileStateTracker {
    /// `configs` is expected to have passed `tiles::validate`.
    pub fn new(configs: Vec<TileConfig>) -> Self {
        let index = configs
            .iter()
            .enumerate()
            .map(|(position, config)| (config.kind.clone(), position))
            .collect();
        let states = vec![TileRuntimeState::default(); configs.len()];
        let effective = vec![false; configs.len()];
        Self {
            configs,
            index,
            states,
            effective,
            child_name: None,
            measurements: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn TileListener>) {
        self.listeners.push(listener);
    }

    pub fn config(&self, kind: &str) -> Option<&TileConfig> {
        self.index.get(kind).map(|&position| &self.configs[position])
    }

    pub fn state(&self, kind: &str) -> Option<&TileRuntimeState> {
        self.index.get(kind).map(|&position| &self.states[position])
    }

    pub fn child_name(&self) -> Option<&str> {
        self.child_name.as_deref()
    }

    pub fn measurements(&self, kind: &str) -> &[Measurement] {
        self.measurements.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Applies one tile event and returns the tiles whose display changed.
    pub fn ingest(&mut self, event: EventRecord) -> Vec<String> {
        let Some(&position) = self.index.get(&event.kind) else {
            warn!(kind = %event.kind, sender = %event.sender_id, "{}", TrackerError::UnknownEventType(event.kind.clone()));
            return Vec::new();
        };

        let kind = event.kind.clone();
        let created_at = event.created_at;
        let suppressed = self.configs[position].ignore_duplicates && self.states[position].active;

        let state = &mut self.states[position];
        state.history.push(event);
        let mut changed = vec![kind.clone()];

        if suppressed {
            debug!(%kind, "duplicate event while active, counted but not re-activated");
            self.notify(&changed);
            return changed;
        }

        state.active = true;
        state.last_seen = Some(match state.last_seen {
            Some(previous) if previous > created_at => {
                debug!(%kind, previous, created_at, "out-of-order event, keeping newer last_seen");
                previous
            }
            _ => created_at,
        });

        let cancels: Vec<usize> = self.configs[position]
            .cancels
            .iter()
            .filter_map(|target| self.index.get(target).copied())
            .collect();
        self.effective[position] = true;
        for target in cancels {
            if self.states[target].active {
                self.states[target].active = false;
                self.effective[target] = false;
                changed.push(self.configs[target].kind.clone());
            }
        }

        self.notify(&changed);
        changed
    }

    /// Routes one entry of the room log by its `type` field.
    pub fn handle_message(&mut self, message: &ChatMessage) -> Vec<String> {
        let Some(kind) = message.message.get("type").and_then(Value::as_str) else {
            warn!(id = message.id, sender = %message.sender, "dropping message without a type");
            return Vec::new();
        };

        match kind {
            CHILD_NAME_CHANGE => {
                match message.message.get("child_name").and_then(Value::as_str) {
                    Some(name) => self.child_name = Some(name.to_string()),
                    None => warn!(id = message.id, "child_name_change without child_name"),
                }
                Vec::new()
            }
            kind if MEASUREMENT_KINDS.contains(&kind) => {
                match message.message.get("value").and_then(Value::as_f64) {
                    Some(value) => self
                        .measurements
                        .entry(kind.to_string())
                        .or_default()
                        .push(Measurement {
                            timestamp: message.created,
                            value,
                        }),
                    None => warn!(id = message.id, %kind, "measurement without a numeric value"),
                }
                Vec::new()
            }
            kind => self.ingest(EventRecord {
                kind: kind.to_string(),
                created_at: message.created,
                sender_id: message.sender.clone(),
                payload: message.message.clone(),
            }),
        }
    }

    /// Implied tiles first, then `kind` itself, all with the same sender.
    pub fn record_with_implications(
        &self,
        kind: &str,
        sender_name: &str,
        now: Timestamp,
    ) -> Result<Vec<OutgoingEvent>, TrackerError> {
        let config = self
            .config(kind)
            .ok_or_else(|| TrackerError::UnknownEventType(kind.to_string()))?;

        Ok(config
            .implies
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(kind))
            .map(|kind| OutgoingEvent {
                kind: kind.to_string(),
                sender_name: sender_name.to_string(),
                recorded_at: now,
            })
            .collect())
    }

    pub fn status(&self, kind: &str) -> Option<TileStatus> {
        let state = self.state(kind)?;
        Some(match (state.last_seen, state.active) {
            (None, _) => TileStatus::NeverSeen,
            (Some(_), true) => TileStatus::Active,
            (Some(_), false) => TileStatus::Inactive,
        })
    }

    pub fn status_text(&self, kind: &str, now: Timestamp) -> String {
        status_text(self.state(kind).and_then(|state| state.last_seen), now)
    }

    pub fn is_timed_out(&self, kind: &str, now: Timestamp) -> bool {
        let (Some(config), Some(state)) = (self.config(kind), self.state(kind)) else {
            return false;
        };
        match (config.timeout, state.last_seen) {
            (Some(timeout), Some(last_seen)) => now.saturating_sub(last_seen) > timeout,
            _ => false,
        }
    }

    pub fn is_effectively_active(&self, kind: &str, now: Timestamp) -> bool {
        self.state(kind).is_some_and(|state| state.active) && !self.is_timed_out(kind, now)
    }

    pub fn windowed_stats(&self, kind: &str, now: Timestamp, window_secs: i64) -> WindowStats {
        let history = self.state(kind).map(|state| state.history.as_slice()).unwrap_or(&[]);
        windowed_stats(history, now, window_secs)
    }

    /// Re-evaluates timeouts without a new event.
    pub fn refresh(&mut self, now: Timestamp) -> Vec<String> {
        let mut changed = Vec::new();
        for position in 0..self.configs.len() {
            let kind = &self.configs[position].kind;
            let effective = self.is_effectively_active(kind, now);
            if effective != self.effective[position] {
                self.effective[position] = effective;
                changed.push(kind.clone());
            }
        }
        if !changed.is_empty() {
            self.notify(&changed);
        }
        changed
    }

    pub fn snapshot(&self, now: Timestamp, windows: &[(&str, i64)]) -> Vec<TileView> {
        self.configs
            .iter()
            .zip(&self.states)
            .map(|(config, state)| TileView {
                kind: config.kind.clone(),
                description: config.description.clone(),
                status: self.status(&config.kind).unwrap_or(TileStatus::NeverSeen),
                status_text: self.status_text(&config.kind, now),
                active: self.is_effectively_active(&config.kind, now),
                timed_out: self.is_timed_out(&config.kind, now),
                last_seen: state.last_seen,
                stats: windows
                    .iter()
                    .map(|(label, secs)| {
                        (label.to_string(), windowed_stats(&state.history, now, *secs))
                    })
                    .collect(),
            })
            .collect()
    }

    fn notify(&mut self, changed: &[String]) {
        for listener in &mut self.listeners {
            listener.tiles_changed(changed);
        }
    }
}
