//! The shared per-baby message log.
//!
//! Messages are appended in arrival order; the page picks them up by polling.
//! Access follows a small owner/writer list: the first participant becomes the
//! owner, everyone else has to ask.

use crate::errors::RoomError;
use crate::models::{ChatMessage, RoomLog, Timestamp};
use serde_json::Value;
use tracing::info;

pub struct Room {
    log: RoomLog,
}

impl Room {
    pub fn new(log: RoomLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &RoomLog {
        &self.log
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.log.messages
    }

    /// Claims ownership of an unowned room. Returns true if `sender` became owner.
    pub fn claim(&mut self, sender: &str) -> bool {
        if !self.log.acl.owners.is_empty() || sender.is_empty() {
            return false;
        }
        info!(%sender, "claiming unowned room");
        self.log.acl.owners.insert(sender.to_string());
        true
    }

    pub fn send_message(
        &mut self,
        sender: &str,
        message: Value,
        now: Timestamp,
    ) -> Result<ChatMessage, RoomError> {
        if !self.am_writer(sender) {
            return Err(RoomError::PermissionDenied {
                sender: sender.to_string(),
            });
        }
        let id = self.log.messages.last().map_or(1, |last| last.id + 1);
        let entry = ChatMessage {
            id,
            sender: sender.to_string(),
            created: now,
            message,
        };
        self.log.messages.push(entry.clone());
        Ok(entry)
    }

    pub fn am_owner(&self, sender: &str) -> bool {
        self.log.acl.owners.contains(sender)
    }

    pub fn am_writer(&self, sender: &str) -> bool {
        self.am_owner(sender) || self.log.acl.writers.contains(sender)
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.acl.requests.iter().cloned().collect()
    }

    /// Returns false when `sender` already has access.
    pub fn request_access(&mut self, sender: &str) -> bool {
        if self.am_writer(sender) {
            return false;
        }
        self.log.acl.requests.insert(sender.to_string())
    }

    pub fn add_writer(&mut self, owner: &str, target: &str) -> Result<(), RoomError> {
        self.require_owner(owner)?;
        self.log.acl.requests.remove(target);
        self.log.acl.writers.insert(target.to_string());
        Ok(())
    }

    pub fn add_owner(&mut self, owner: &str, target: &str) -> Result<(), RoomError> {
        self.require_owner(owner)?;
        self.log.acl.requests.remove(target);
        self.log.acl.owners.insert(target.to_string());
        Ok(())
    }

    pub fn deny_request(&mut self, owner: &str, target: &str) -> Result<(), RoomError> {
        self.require_owner(owner)?;
        self.log.acl.requests.remove(target);
        Ok(())
    }

    fn require_owner(&self, sender: &str) -> Result<(), RoomError> {
        if self.am_owner(sender) {
            Ok(())
        } else {
            Err(RoomError::PermissionDenied {
                sender: sender.to_string(),
            })
        }
    }
}
