//! # Event Dispatcher
//!
//! Routes a delivered message (routing key + raw payload) to the cache it
//! mutates and decides the message's fate. The dispatcher is deliberately
//! broker-free: the consume loop only maps the returned [`Disposition`]
//! onto `basic_ack`/`basic_nack`, which keeps every ack/reject rule
//! testable without a running broker.
//!
//! Rules:
//! - created events perform a full insert
//! - updated / status-changed events merge into the existing cached entry;
//!   when the entity is absent from the cache the message is acknowledged
//!   (the canonical record still exists upstream — a stale cache is not a
//!   processing error)
//! - deleted / removed events drop the entry and its aliases
//! - decode failures and unrecognized routing keys are dead-lettered,
//!   never requeued, to avoid poison-message loops

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::SnapshotCache;
use crate::events::{
    decode_payload, AccountCreatedEvent, AccountDeletedEvent, AccountStatusChangedEvent,
    AccountUpdatedEvent, AppliedEventNotifier, InventoryItemCreatedEvent,
    InventoryItemRemovedEvent, InventoryItemUpdatedEvent, UserCreatedEvent, UserDeletedEvent,
    UserUpdatedEvent,
};
use crate::messaging::errors::{MessagingError, MessagingResult};
use crate::messaging::topology::EventBinding;
use crate::snapshots::{AccountSnapshot, InventoryItemSnapshot, UserSnapshot};

/// What the consume loop should do with a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge: the event was applied, or deliberately ignored
    Ack,
    /// Reject without requeue; the broker routes the message to the DLQ
    DeadLetter,
}

/// The materialized caches one consumer service keeps in sync
#[derive(Clone)]
pub struct ServiceCaches {
    pub accounts: Arc<SnapshotCache<AccountSnapshot>>,
    pub users: Arc<SnapshotCache<UserSnapshot>>,
    pub inventory: Arc<SnapshotCache<InventoryItemSnapshot>>,
}

/// Applies decoded events to the service caches.
pub struct EventDispatcher {
    caches: ServiceCaches,
    notifier: AppliedEventNotifier,
}

impl EventDispatcher {
    pub fn new(caches: ServiceCaches, notifier: AppliedEventNotifier) -> Self {
        Self { caches, notifier }
    }

    pub fn notifier(&self) -> &AppliedEventNotifier {
        &self.notifier
    }

    /// Every `<entity>.<verb>` event this dispatcher understands; the
    /// pipeline declares one queue per binding.
    pub fn bindings() -> Vec<EventBinding> {
        vec![
            EventBinding::new("account", "created"),
            EventBinding::new("account", "updated"),
            EventBinding::new("account", "status-changed"),
            EventBinding::new("account", "deleted"),
            EventBinding::new("user", "created"),
            EventBinding::new("user", "updated"),
            EventBinding::new("user", "deleted"),
            EventBinding::new("inventory-item", "created"),
            EventBinding::new("inventory-item", "updated"),
            EventBinding::new("inventory-item", "removed"),
        ]
    }

    /// Decode and apply one delivery, returning its fate.
    pub fn dispatch(&self, routing_key: &str, payload: &[u8]) -> Disposition {
        let applied = match routing_key {
            "account.created" => self.apply_account_created(routing_key, payload),
            "account.updated" => self.apply_account_updated(routing_key, payload),
            "account.status-changed" => self.apply_account_status_changed(routing_key, payload),
            "account.deleted" => self.apply_account_deleted(routing_key, payload),
            "user.created" => self.apply_user_created(routing_key, payload),
            "user.updated" => self.apply_user_updated(routing_key, payload),
            "user.deleted" => self.apply_user_deleted(routing_key, payload),
            "inventory-item.created" => self.apply_inventory_created(routing_key, payload),
            "inventory-item.updated" => self.apply_inventory_updated(routing_key, payload),
            "inventory-item.removed" => self.apply_inventory_removed(routing_key, payload),
            _ => {
                warn!(routing_key = %routing_key, "Unrecognized routing key; dead-lettering");
                return Disposition::DeadLetter;
            }
        };

        match applied {
            Ok(Some(entity_id)) => {
                self.notifier.notify(routing_key, entity_id);
                debug!(routing_key = %routing_key, entity_id = %entity_id, "Event applied");
                Disposition::Ack
            }
            Ok(None) => Disposition::Ack,
            Err(MessagingError::Decode {
                routing_key,
                message,
            }) => {
                warn!(
                    routing_key = %routing_key,
                    error = %message,
                    "Malformed payload; dead-lettering"
                );
                Disposition::DeadLetter
            }
            Err(e) => {
                error!(
                    routing_key = %routing_key,
                    error = %e,
                    "Unexpected error applying event; dead-lettering"
                );
                Disposition::DeadLetter
            }
        }
    }

    fn decode<T: DeserializeOwned>(&self, routing_key: &str, payload: &[u8]) -> MessagingResult<T> {
        decode_payload(payload).map_err(|e| MessagingError::decode(routing_key, e.to_string()))
    }

    fn apply_account_created(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> MessagingResult<Option<Uuid>> {
        let event: AccountCreatedEvent = self.decode(routing_key, payload)?;
        let id = event.id;
        self.caches.accounts.insert(AccountSnapshot {
            id: event.id,
            email: event.email,
            is_active: event.is_active,
        });
        Ok(Some(id))
    }

    fn apply_account_updated(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> MessagingResult<Option<Uuid>> {
        let event: AccountUpdatedEvent = self.decode(routing_key, payload)?;
        let merged = self.caches.accounts.merge(event.id, |account| {
            if let Some(email) = event.email.clone() {
                account.email = email;
            }
            if let Some(is_active) = event.is_active {
                account.is_active = is_active;
            }
        });
        Ok(self.merged_or_stale(routing_key, event.id, merged))
    }

    fn apply_account_status_changed(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> MessagingResult<Option<Uuid>> {
        let event: AccountStatusChangedEvent = self.decode(routing_key, payload)?;
        let merged = self
            .caches
            .accounts
            .merge(event.id, |account| account.is_active = event.is_active);
        Ok(self.merged_or_stale(routing_key, event.id, merged))
    }

    fn apply_account_deleted(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> MessagingResult<Option<Uuid>> {
        let event: AccountDeletedEvent = self.decode(routing_key, payload)?;
        let removed = self.caches.accounts.remove(event.id);
        Ok(removed.then_some(event.id))
    }

    fn apply_user_created(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> MessagingResult<Option<Uuid>> {
        let event: UserCreatedEvent = self.decode(routing_key, payload)?;
        let id = event.id;
        self.caches.users.insert(UserSnapshot {
            id: event.id,
            username: event.username,
            email: event.email,
            display_name: event.display_name,
        });
        Ok(Some(id))
    }

    fn apply_user_updated(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> MessagingResult<Option<Uuid>> {
        let event: UserUpdatedEvent = self.decode(routing_key, payload)?;
        let merged = self.caches.users.merge(event.id, |user| {
            if let Some(username) = event.username.clone() {
                user.username = username;
            }
            if let Some(email) = event.email.clone() {
                user.email = email;
            }
            if let Some(display_name) = event.display_name.clone() {
                user.display_name = Some(display_name);
            }
        });
        Ok(self.merged_or_stale(routing_key, event.id, merged))
    }

    fn apply_user_deleted(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> MessagingResult<Option<Uuid>> {
        let event: UserDeletedEvent = self.decode(routing_key, payload)?;
        let removed = self.caches.users.remove(event.id);
        Ok(removed.then_some(event.id))
    }

    fn apply_inventory_created(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> MessagingResult<Option<Uuid>> {
        let event: InventoryItemCreatedEvent = self.decode(routing_key, payload)?;
        let id = event.id;
        self.caches.inventory.insert(InventoryItemSnapshot {
            id: event.id,
            owner_id: event.owner_id,
            item_code: event.item_code,
            quantity: event.quantity,
        });
        Ok(Some(id))
    }

    fn apply_inventory_updated(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> MessagingResult<Option<Uuid>> {
        let event: InventoryItemUpdatedEvent = self.decode(routing_key, payload)?;
        let merged = self.caches.inventory.merge(event.id, |item| {
            if let Some(item_code) = event.item_code.clone() {
                item.item_code = item_code;
            }
            if let Some(quantity) = event.quantity {
                item.quantity = quantity;
            }
        });
        Ok(self.merged_or_stale(routing_key, event.id, merged))
    }

    fn apply_inventory_removed(
        &self,
        routing_key: &str,
        payload: &[u8],
    ) -> MessagingResult<Option<Uuid>> {
        let event: InventoryItemRemovedEvent = self.decode(routing_key, payload)?;
        let removed = self.caches.inventory.remove(event.id);
        Ok(removed.then_some(event.id))
    }

    fn merged_or_stale(&self, routing_key: &str, id: Uuid, merged: bool) -> Option<Uuid> {
        if merged {
            Some(id)
        } else {
            // Not a processing error: the canonical record lives upstream
            // and will repopulate the cache on the next read miss.
            info!(
                routing_key = %routing_key,
                entity_id = %id,
                "Update event for entity absent from cache; acknowledging"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheTypeConfig;

    fn caches() -> ServiceCaches {
        let config = CacheTypeConfig {
            ttl_seconds: 0,
            max_weight: 0,
            entry_weight: 1,
        };
        ServiceCaches {
            accounts: Arc::new(SnapshotCache::new("accounts", config.clone())),
            users: Arc::new(SnapshotCache::new("users", config.clone())),
            inventory: Arc::new(SnapshotCache::new("inventory", config)),
        }
    }

    fn dispatcher() -> (EventDispatcher, ServiceCaches) {
        let caches = caches();
        let dispatcher = EventDispatcher::new(caches.clone(), AppliedEventNotifier::default());
        (dispatcher, caches)
    }

    #[test]
    fn test_created_event_inserts_and_acks() {
        let (dispatcher, caches) = dispatcher();
        let id = Uuid::new_v4();
        let payload = format!(r#"{{"id":"{id}","email":"a@b.com","isActive":true}}"#);

        let disposition = dispatcher.dispatch("account.created", payload.as_bytes());

        assert_eq!(disposition, Disposition::Ack);
        let cached = caches.accounts.get(id).unwrap();
        assert_eq!(cached.email, "a@b.com");
        assert!(cached.is_active);
        assert_eq!(caches.accounts.get_by_alias("a@b.com").map(|a| a.id), Some(id));
    }

    #[test]
    fn test_malformed_payload_dead_letters_without_mutation() {
        let (dispatcher, caches) = dispatcher();

        let disposition = dispatcher.dispatch("account.created", b"{definitely not json");

        assert_eq!(disposition, Disposition::DeadLetter);
        assert!(caches.accounts.is_empty());
    }

    #[test]
    fn test_unknown_routing_key_dead_letters() {
        let (dispatcher, _) = dispatcher();
        let disposition = dispatcher.dispatch("account.exploded", b"{}");
        assert_eq!(disposition, Disposition::DeadLetter);
    }

    #[test]
    fn test_status_changed_merges_preserving_other_fields() {
        let (dispatcher, caches) = dispatcher();
        let id = Uuid::new_v4();
        caches.accounts.insert(AccountSnapshot {
            id,
            email: "a@b.com".to_string(),
            is_active: true,
        });

        let payload = format!(r#"{{"Id":"{id}","IsActive":false}}"#);
        let disposition = dispatcher.dispatch("account.status-changed", payload.as_bytes());

        assert_eq!(disposition, Disposition::Ack);
        let cached = caches.accounts.get(id).unwrap();
        assert!(!cached.is_active);
        assert_eq!(cached.email, "a@b.com");
    }

    #[test]
    fn test_update_for_absent_entity_acks_without_insert() {
        let (dispatcher, caches) = dispatcher();
        let id = Uuid::new_v4();
        let payload = format!(r#"{{"id":"{id}","email":"ghost@b.com"}}"#);

        let disposition = dispatcher.dispatch("account.updated", payload.as_bytes());

        // A stale cache is not a processing error.
        assert_eq!(disposition, Disposition::Ack);
        assert!(caches.accounts.is_empty());
    }

    #[test]
    fn test_updated_event_renames_alias() {
        let (dispatcher, caches) = dispatcher();
        let id = Uuid::new_v4();
        caches.accounts.insert(AccountSnapshot {
            id,
            email: "old@b.com".to_string(),
            is_active: true,
        });

        let payload = format!(r#"{{"id":"{id}","email":"new@b.com"}}"#);
        assert_eq!(
            dispatcher.dispatch("account.updated", payload.as_bytes()),
            Disposition::Ack
        );

        assert_eq!(caches.accounts.get_by_alias("old@b.com"), None);
        assert_eq!(
            caches.accounts.get_by_alias("new@b.com").map(|a| a.id),
            Some(id)
        );
    }

    #[test]
    fn test_deleted_event_removes_entry_and_aliases() {
        let (dispatcher, caches) = dispatcher();
        let id = Uuid::new_v4();
        caches.accounts.insert(AccountSnapshot {
            id,
            email: "gone@b.com".to_string(),
            is_active: true,
        });

        let payload = format!(r#"{{"id":"{id}"}}"#);
        assert_eq!(
            dispatcher.dispatch("account.deleted", payload.as_bytes()),
            Disposition::Ack
        );
        assert_eq!(caches.accounts.get(id), None);
        assert_eq!(caches.accounts.get_by_alias("gone@b.com"), None);

        // Redelivery of the same deletion is idempotent.
        assert_eq!(
            dispatcher.dispatch("account.deleted", payload.as_bytes()),
            Disposition::Ack
        );
    }

    #[test]
    fn test_inventory_events_roundtrip() {
        let (dispatcher, caches) = dispatcher();
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();

        let created = format!(
            r#"{{"Id":"{id}","OwnerId":"{owner}","ItemCode":"potion","Quantity":5}}"#
        );
        assert_eq!(
            dispatcher.dispatch("inventory-item.created", created.as_bytes()),
            Disposition::Ack
        );

        let updated = format!(r#"{{"id":"{id}","quantity":3}}"#);
        assert_eq!(
            dispatcher.dispatch("inventory-item.updated", updated.as_bytes()),
            Disposition::Ack
        );
        let item = caches.inventory.get(id).unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.item_code, "potion");

        let removed = format!(r#"{{"id":"{id}"}}"#);
        assert_eq!(
            dispatcher.dispatch("inventory-item.removed", removed.as_bytes()),
            Disposition::Ack
        );
        assert_eq!(caches.inventory.get(id), None);
    }

    #[tokio::test]
    async fn test_applied_event_notification() {
        let (dispatcher, _caches) = dispatcher();
        let mut rx = dispatcher.notifier().subscribe();
        let id = Uuid::new_v4();
        let payload = format!(r#"{{"id":"{id}","email":"a@b.com","isActive":true}}"#);

        dispatcher.dispatch("account.created", payload.as_bytes());

        let applied = rx.recv().await.unwrap();
        assert_eq!(applied.routing_key, "account.created");
        assert_eq!(applied.entity_id, id);
    }

    #[test]
    fn test_bindings_cover_all_routing_keys() {
        let bindings = EventDispatcher::bindings();
        let keys: Vec<String> = bindings.iter().map(|b| b.routing_key()).collect();
        assert_eq!(bindings.len(), 10);
        assert!(keys.contains(&"account.status-changed".to_string()));
        assert!(keys.contains(&"inventory-item.removed".to_string()));
    }
}
