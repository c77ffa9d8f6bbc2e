//! # Domain Events
//!
//! Payload shapes for the events the upstream services publish, a decoder
//! that tolerates the producers' differing field casings, and the
//! in-process notifier fired after an event has been applied to a cache.
//!
//! Routing keys follow `<entity>.<verb>`: `account.created`,
//! `account.updated`, `account.status-changed`, `account.deleted`,
//! `user.created`, `user.updated`, `user.deleted`,
//! `inventory-item.created`, `inventory-item.updated`,
//! `inventory-item.removed`.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Full account snapshot carried by `account.created`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreatedEvent {
    pub id: Uuid,
    pub email: String,
    #[serde(rename = "isactive")]
    pub is_active: bool,
}

/// Partial merge carried by `account.updated`; only named fields change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdatedEvent {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "isactive", default)]
    pub is_active: Option<bool>,
}

/// Carried by `account.status-changed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatusChangedEvent {
    pub id: Uuid,
    #[serde(rename = "isactive")]
    pub is_active: bool,
}

/// Carried by `account.deleted`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeletedEvent {
    pub id: Uuid,
}

/// Carried by `user.created`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreatedEvent {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(rename = "displayname", default)]
    pub display_name: Option<String>,
}

/// Partial merge carried by `user.updated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdatedEvent {
    pub id: Uuid,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "displayname", default)]
    pub display_name: Option<String>,
}

/// Carried by `user.deleted`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeletedEvent {
    pub id: Uuid,
}

/// Carried by `inventory-item.created`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItemCreatedEvent {
    pub id: Uuid,
    #[serde(rename = "ownerid")]
    pub owner_id: Uuid,
    #[serde(rename = "itemcode")]
    pub item_code: String,
    pub quantity: i64,
}

/// Partial merge carried by `inventory-item.updated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItemUpdatedEvent {
    pub id: Uuid,
    #[serde(rename = "itemcode", default)]
    pub item_code: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// Carried by `inventory-item.removed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItemRemovedEvent {
    pub id: Uuid,
}

/// Decode a JSON payload with case-insensitive field matching.
///
/// Producers disagree on casing (`isActive`, `IsActive`, `is_active`);
/// object keys are normalized to squashed lowercase before handing the
/// value to serde, and the payload structs above carry matching renames.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    let mut value: Value = serde_json::from_slice(bytes)?;
    normalize_keys(&mut value);
    serde_json::from_value(value)
}

fn normalize_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let mut normalized = serde_json::Map::with_capacity(map.len());
            for (key, mut child) in std::mem::take(map) {
                normalize_keys(&mut child);
                let squashed: String = key
                    .chars()
                    .filter(|c| *c != '_' && *c != '-')
                    .flat_map(char::to_lowercase)
                    .collect();
                normalized.insert(squashed, child);
            }
            *map = normalized;
        }
        Value::Array(items) => {
            for item in items {
                normalize_keys(item);
            }
        }
        _ => {}
    }
}

/// Notification emitted after an event was applied to a cache
#[derive(Debug, Clone)]
pub struct AppliedEvent {
    pub routing_key: String,
    pub entity_id: Uuid,
    pub applied_at: DateTime<Utc>,
}

/// In-process multicast of applied events.
///
/// An explicit broadcast channel rather than an implicit delegate chain:
/// subscribers attach via [`subscribe`](Self::subscribe) and zero
/// subscribers is a normal state, not an error.
#[derive(Debug, Clone)]
pub struct AppliedEventNotifier {
    sender: broadcast::Sender<AppliedEvent>,
}

impl AppliedEventNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Notify subscribers that an event was applied. Succeeds even when
    /// no one is listening.
    pub fn notify(&self, routing_key: &str, entity_id: Uuid) {
        let event = AppliedEvent {
            routing_key: routing_key.to_string(),
            entity_id,
            applied_at: Utc::now(),
        };
        // send() errs only when there are no receivers, which is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppliedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AppliedEventNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}
