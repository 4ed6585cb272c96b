//! In-app notification log.
//!
//! Notifications are created on the client in response to domain events
//! (an order was placed, a product was wishlisted) and are never synced with
//! the backend. The log is kept newest first, capped at
//! [`MAX_NOTIFICATIONS`], and persisted on every change.

use std::sync::Arc;

use bazaar_core::{OrderId, OrderStatus, Price};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::{Storage, keys, load_versioned, save_versioned};

const SCHEMA_VERSION: u32 = 1;

/// Oldest entries are dropped beyond this many.
pub const MAX_NOTIFICATIONS: usize = 50;

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Order,
    Wishlist,
    Cart,
    Account,
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// `{unix millis}-{random hex}`.
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Icon tag for the presentation layer, e.g. `truck`.
    pub icon: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    #[serde(default)]
    pub order_id: Option<OrderId>,
}

/// The caller-supplied part of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub icon: String,
    pub order_id: Option<OrderId>,
}

fn new_id(now: DateTime<Utc>) -> String {
    format!("{}-{:08x}", now.timestamp_millis(), rand::random::<u32>())
}

/// Title, message and icon for an order status change.
#[must_use]
pub fn order_template(order_id: &OrderId, status: OrderStatus, amount: Price) -> NewNotification {
    let (title, message, icon) = match status {
        OrderStatus::Confirmed => (
            "Order Confirmed",
            format!("Your order #{order_id} for {amount} has been placed successfully."),
            "check-circle",
        ),
        OrderStatus::Processing => (
            "Order Processing",
            format!("Your order #{order_id} is being prepared for shipment."),
            "package",
        ),
        OrderStatus::Shipped => (
            "Order Shipped",
            format!("Your order #{order_id} is on its way."),
            "truck",
        ),
        OrderStatus::Delivered => (
            "Order Delivered",
            format!("Your order #{order_id} has been delivered. Enjoy!"),
            "gift",
        ),
        OrderStatus::Cancelled => (
            "Order Cancelled",
            format!("Your order #{order_id} has been cancelled. Any payment of {amount} will be refunded."),
            "x-circle",
        ),
    };

    NewNotification {
        kind: NotificationKind::Order,
        title: title.to_string(),
        message,
        icon: icon.to_string(),
        order_id: Some(order_id.clone()),
    }
}

/// Handle to the notification log. Clones share the same log.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<NotificationInner>,
}

struct NotificationInner {
    entries: Mutex<Vec<Notification>>,
    storage: Arc<dyn Storage>,
}

impl NotificationStore {
    /// Restore the persisted log, or start empty.
    #[must_use]
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let mut entries: Vec<Notification> =
            load_versioned(storage.as_ref(), keys::NOTIFICATIONS, SCHEMA_VERSION)
                .unwrap_or_default();
        entries.truncate(MAX_NOTIFICATIONS);
        Self {
            inner: Arc::new(NotificationInner {
                entries: Mutex::new(entries),
                storage,
            }),
        }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Notification>) -> R) -> R {
        let mut entries = self.inner.entries.lock();
        let result = f(&mut entries);
        save_versioned(
            self.inner.storage.as_ref(),
            keys::NOTIFICATIONS,
            SCHEMA_VERSION,
            &*entries,
        );
        result
    }

    /// Record a notification as unread and return it.
    pub fn add(&self, new: NewNotification) -> Notification {
        let now = Utc::now();
        let notification = Notification {
            id: new_id(now),
            kind: new.kind,
            title: new.title,
            message: new.message,
            icon: new.icon,
            created_at: now,
            read: false,
            order_id: new.order_id,
        };
        debug!(id = %notification.id, kind = ?notification.kind, "Notification added");

        self.mutate(|entries| {
            entries.insert(0, notification.clone());
            entries.truncate(MAX_NOTIFICATIONS);
        });
        notification
    }

    /// Record an order status notification.
    pub fn order_notification(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
        amount: Price,
    ) -> Notification {
        self.add(order_template(order_id, status, amount))
    }

    /// Record a wishlist change.
    pub fn wishlist_notification(&self, product_name: &str, added: bool) -> Notification {
        let (title, message) = if added {
            ("Added to Wishlist", format!("{product_name} was added to your wishlist."))
        } else {
            (
                "Removed from Wishlist",
                format!("{product_name} was removed from your wishlist."),
            )
        };
        self.add(NewNotification {
            kind: NotificationKind::Wishlist,
            title: title.to_string(),
            message,
            icon: "heart".to_string(),
            order_id: None,
        })
    }

    /// Record an item added to the cart.
    pub fn cart_notification(&self, product_name: &str, quantity: u32) -> Notification {
        self.add(NewNotification {
            kind: NotificationKind::Cart,
            title: "Added to Cart".to_string(),
            message: format!("{quantity} x {product_name} added to your cart."),
            icon: "shopping-cart".to_string(),
            order_id: None,
        })
    }

    /// Record an account event such as a completed registration.
    pub fn account_notification(&self, title: &str, message: &str) -> Notification {
        self.add(NewNotification {
            kind: NotificationKind::Account,
            title: title.to_string(),
            message: message.to_string(),
            icon: "user".to_string(),
            order_id: None,
        })
    }

    /// Mark one notification read. Returns whether it exists.
    pub fn mark_read(&self, id: &str) -> bool {
        self.mutate(|entries| {
            entries
                .iter_mut()
                .find(|n| n.id == id)
                .map(|n| n.read = true)
                .is_some()
        })
    }

    pub fn mark_all_read(&self) {
        self.mutate(|entries| entries.iter_mut().for_each(|n| n.read = true));
    }

    /// Delete one notification. Deleting a missing one does nothing.
    pub fn remove(&self, id: &str) {
        self.mutate(|entries| entries.retain(|n| n.id != id));
    }

    pub fn clear_all(&self) {
        self.mutate(Vec::clear);
    }

    /// All notifications, newest first.
    #[must_use]
    pub fn list(&self) -> Vec<Notification> {
        self.inner.entries.lock().clone()
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.inner.entries.lock().iter().filter(|n| !n.read).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for NotificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStore")
            .field("len", &self.len())
            .field("unread", &self.unread_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> (NotificationStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (NotificationStore::load(storage.clone()), storage)
    }

    #[test]
    fn test_order_templates() {
        let id = OrderId::new("o1");
        let amount = Price::from_major(1180);

        let cases = [
            (OrderStatus::Confirmed, "Order Confirmed", "check-circle"),
            (OrderStatus::Processing, "Order Processing", "package"),
            (OrderStatus::Shipped, "Order Shipped", "truck"),
            (OrderStatus::Delivered, "Order Delivered", "gift"),
            (OrderStatus::Cancelled, "Order Cancelled", "x-circle"),
        ];
        for (status, title, icon) in cases {
            let template = order_template(&id, status, amount);
            assert_eq!(template.title, title);
            assert_eq!(template.icon, icon);
            assert_eq!(template.order_id, Some(id.clone()));
        }

        let confirmed = order_template(&id, OrderStatus::Confirmed, amount);
        assert_eq!(
            confirmed.message,
            "Your order #o1 for ₹1180.00 has been placed successfully."
        );
    }

    #[test]
    fn test_newest_first_and_read_state() {
        let (store, _) = store();
        let first = store.cart_notification("Linen shirt", 2);
        let second = store.wishlist_notification("Linen shirt", true);

        let list = store.list();
        assert_eq!(list[0].id, second.id);
        assert_eq!(list[1].id, first.id);
        assert_eq!(store.unread_count(), 2);

        assert!(store.mark_read(&first.id));
        assert!(!store.mark_read("missing"));
        assert_eq!(store.unread_count(), 1);

        store.mark_all_read();
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let (store, _) = store();
        let n = store.account_notification("Welcome", "Your account is ready.");
        store.order_notification(&OrderId::new("o1"), OrderStatus::Shipped, Price::ZERO);

        store.remove(&n.id);
        store.remove(&n.id);
        assert_eq!(store.len(), 1);

        store.clear_all();
        assert!(store.is_empty());
    }

    #[test]
    fn test_log_is_capped() {
        let (store, _) = store();
        for i in 0..MAX_NOTIFICATIONS + 5 {
            store.account_notification("Event", &format!("event {i}"));
        }

        let list = store.list();
        assert_eq!(list.len(), MAX_NOTIFICATIONS);
        assert_eq!(list[0].message, format!("event {}", MAX_NOTIFICATIONS + 4));
    }

    #[test]
    fn test_log_survives_reload() {
        let (store, storage) = store();
        let n = store.order_notification(
            &OrderId::new("o1"),
            OrderStatus::Delivered,
            Price::from_major(10),
        );
        store.mark_read(&n.id);

        let reloaded = NotificationStore::load(storage);
        assert_eq!(reloaded.list(), vec![Notification { read: true, ..n }]);
    }

    #[test]
    fn test_ids_have_timestamp_prefix() {
        let now = Utc::now();
        let id = new_id(now);
        let (millis, suffix) = id.split_once('-').unwrap();
        assert_eq!(millis, now.timestamp_millis().to_string());
        assert_eq!(suffix.len(), 8);
    }
}
