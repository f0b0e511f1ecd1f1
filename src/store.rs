//! Entity store behind a repository seam.
//!
//! [`MemoryRepository`] keeps everything in process memory; the
//! PostgreSQL implementation lives in [`crate::db`]. Workflow code only sees
//! [`Repository`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use tokio::sync::RwLock;

use crate::db::PgRepository;
use crate::error::{MarketplaceError, Result};
use crate::models::{
    Booking, Category, Customer, Earning, Message, NewMessage, NewNotification, Notification,
    Provider,
};
use crate::seed;

/// Get/list/insert/update-by-id capability set over the marketplace entities.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn categories(&self) -> Result<Vec<Category>>;

    async fn providers(&self) -> Result<Vec<Provider>>;
    async fn provider(&self, id: &str) -> Result<Option<Provider>>;
    async fn update_provider(&self, provider: &Provider) -> Result<()>;

    async fn customer(&self, id: &str) -> Result<Option<Customer>>;

    async fn bookings(&self) -> Result<Vec<Booking>>;
    async fn booking(&self, id: &str) -> Result<Option<Booking>>;
    /// Stores a new booking; the store assigns `id` and resets `version`.
    async fn insert_booking(&self, booking: Booking) -> Result<Booking>;
    /// Replaces the stored booking if its version still equals
    /// `booking.version`, and returns the stored copy with the bumped version.
    async fn update_booking(&self, booking: &Booking) -> Result<Booking>;

    /// Most recent first.
    async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>>;
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;
    /// Returns how many notifications flipped to read.
    async fn mark_notifications_read(&self, user_id: &str) -> Result<usize>;

    /// Oldest first.
    async fn messages_for(&self, booking_id: &str) -> Result<Vec<Message>>;
    async fn insert_message(&self, message: NewMessage) -> Result<Message>;

    /// Provider ids in the order they were favorited.
    async fn favorites(&self, customer_id: &str) -> Result<Vec<String>>;
    /// Adds or removes the provider in one step and returns whether it is
    /// now a favorite.
    async fn toggle_favorite(&self, customer_id: &str, provider_id: &str) -> Result<bool>;

    async fn earnings_for_provider(&self, provider_id: &str) -> Result<Vec<Earning>>;
    /// Earnings are keyed by booking; returns `false` when one already exists.
    async fn insert_earning(&self, earning: Earning) -> Result<bool>;
}

#[derive(Debug, Default)]
struct State {
    categories: Vec<Category>,
    providers: Vec<Provider>,
    customers: Vec<Customer>,
    bookings: Vec<Booking>,
    notifications: Vec<Notification>,
    messages: Vec<Message>,
    favorites: HashMap<String, Vec<String>>,
    earnings: Vec<Earning>,
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Repository pre-filled with the demo marketplace.
    pub fn seeded() -> Self {
        Self::seeded_at(Utc::now())
    }

    /// Demo marketplace whose chat history is dated relative to `now`.
    pub fn seeded_at(now: DateTime<Utc>) -> Self {
        let data = seed::dataset(now);
        let favorites = data
            .favorites
            .into_iter()
            .fold(HashMap::new(), |mut acc: HashMap<String, Vec<String>>, (c, p)| {
                let ids = acc.entry(c).or_default();
                if !ids.contains(&p) {
                    ids.push(p);
                }
                acc
            });
        Self {
            state: RwLock::new(State {
                categories: data.categories,
                providers: data.providers,
                customers: data.customers,
                bookings: data.bookings,
                notifications: Vec::new(),
                messages: data.messages,
                favorites,
                earnings: data.earnings,
            }),
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn categories(&self) -> Result<Vec<Category>> {
        Ok(self.state.read().await.categories.clone())
    }

    async fn providers(&self) -> Result<Vec<Provider>> {
        Ok(self.state.read().await.providers.clone())
    }

    async fn provider(&self, id: &str) -> Result<Option<Provider>> {
        let state = self.state.read().await;
        Ok(state.providers.iter().find(|p| p.id == id).cloned())
    }

    async fn update_provider(&self, provider: &Provider) -> Result<()> {
        let mut state = self.state.write().await;
        let slot = state
            .providers
            .iter_mut()
            .find(|p| p.id == provider.id)
            .ok_or_else(|| MarketplaceError::not_found("provider", &provider.id))?;
        *slot = provider.clone();
        Ok(())
    }

    async fn customer(&self, id: &str) -> Result<Option<Customer>> {
        let state = self.state.read().await;
        Ok(state.customers.iter().find(|c| c.id == id).cloned())
    }

    async fn bookings(&self) -> Result<Vec<Booking>> {
        Ok(self.state.read().await.bookings.clone())
    }

    async fn booking(&self, id: &str) -> Result<Option<Booking>> {
        let state = self.state.read().await;
        Ok(state.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn insert_booking(&self, mut booking: Booking) -> Result<Booking> {
        let mut state = self.state.write().await;
        booking.id = format!("b{}", state.bookings.len() + 1);
        booking.version = 0;
        state.bookings.push(booking.clone());
        Ok(booking)
    }

    async fn update_booking(&self, booking: &Booking) -> Result<Booking> {
        let mut state = self.state.write().await;
        let slot = state
            .bookings
            .iter_mut()
            .find(|b| b.id == booking.id)
            .ok_or_else(|| MarketplaceError::not_found("booking", &booking.id))?;
        if slot.version != booking.version {
            return Err(MarketplaceError::Conflict(booking.id.clone()));
        }
        let mut stored = booking.clone();
        stored.version += 1;
        *slot = stored.clone();
        Ok(stored)
    }

    async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let mut state = self.state.write().await;
        let stored = Notification {
            id: format!("n{}", state.notifications.len() + 1),
            user_id: notification.user_id,
            message: notification.message,
            read: false,
            link: notification.link,
            created_at: notification.created_at,
        };
        state.notifications.insert(0, stored.clone());
        Ok(stored)
    }

    async fn mark_notifications_read(&self, user_id: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut flipped = 0;
        for n in state
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            n.read = true;
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn messages_for(&self, booking_id: &str) -> Result<Vec<Message>> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.booking_id == booking_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message> {
        let mut state = self.state.write().await;
        let stored = Message {
            id: format!("m{}", state.messages.len() + 1),
            booking_id: message.booking_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            text: message.text,
            timestamp: message.timestamp,
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn favorites(&self, customer_id: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .favorites
            .get(customer_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn toggle_favorite(&self, customer_id: &str, provider_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let ids = state.favorites.entry(customer_id.to_string()).or_default();
        match ids.iter().position(|id| id == provider_id) {
            Some(at) => {
                ids.remove(at);
                Ok(false)
            }
            None => {
                ids.push(provider_id.to_string());
                Ok(true)
            }
        }
    }

    async fn earnings_for_provider(&self, provider_id: &str) -> Result<Vec<Earning>> {
        let state = self.state.read().await;
        Ok(state
            .earnings
            .iter()
            .filter(|e| e.provider_id == provider_id)
            .cloned()
            .collect())
    }

    async fn insert_earning(&self, earning: Earning) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.earnings.iter().any(|e| e.booking_id == earning.booking_id) {
            return Ok(false);
        }
        state.earnings.push(earning);
        Ok(true)
    }
}

/// Where the entity store lives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageConfig {
    /// Process memory, seeded with the demo marketplace.
    #[default]
    Memory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl StorageConfig {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

pub async fn open_repository(config: &StorageConfig) -> Result<Arc<dyn Repository>> {
    let repository: Arc<dyn Repository> = match config {
        StorageConfig::Memory => Arc::new(MemoryRepository::seeded()),
        StorageConfig::Postgres {
            database_url,
            max_connections,
        } => Arc::new(PgRepository::bootstrap(database_url, *max_connections).await?),
    };
    info!("entity store ready ({})", config.label());
    Ok(repository)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, PayoutStatus};
    use crate::pricing::Money;
    use chrono::{NaiveDate, TimeZone};

    #[tokio::test]
    async fn stale_booking_update_is_a_conflict() {
        let repo = MemoryRepository::seeded();
        let loaded = repo.booking("b1").await.unwrap().unwrap();

        let mut first = loaded.clone();
        first.status = BookingStatus::OnTheWay;
        let stored = repo.update_booking(&first).await.unwrap();
        assert_eq!(stored.version, loaded.version + 1);

        let mut second = loaded;
        second.status = BookingStatus::Cancelled;
        let err = repo.update_booking(&second).await.unwrap_err();
        assert!(matches!(err, MarketplaceError::Conflict(id) if id == "b1"));

        let current = repo.booking("b1").await.unwrap().unwrap();
        assert_eq!(current.status, BookingStatus::OnTheWay);
    }

    #[tokio::test]
    async fn notifications_are_newest_first_and_scoped() {
        let repo = MemoryRepository::empty();
        for (user, text) in [("c1", "one"), ("1", "other"), ("c1", "two")] {
            repo.insert_notification(NewNotification {
                user_id: user.to_string(),
                message: text.to_string(),
                link: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        let feed = repo.notifications_for("c1").await.unwrap();
        let texts: Vec<_> = feed.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(texts, vec!["two", "one"]);
        assert_eq!(feed[0].id, "n3");

        assert_eq!(repo.mark_notifications_read("c1").await.unwrap(), 2);
        assert_eq!(repo.mark_notifications_read("c1").await.unwrap(), 0);
        assert!(repo.notifications_for("1").await.unwrap().iter().all(|n| !n.read));
    }

    #[tokio::test]
    async fn earnings_are_keyed_by_booking() {
        let repo = MemoryRepository::empty();
        let earning = Earning {
            booking_id: "b1".to_string(),
            provider_id: "1".to_string(),
            booking_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            service_name: "Leaky Faucet Repair".to_string(),
            amount_earned: Money::from_minor(6375),
            payout_date: NaiveDate::from_ymd_opt(2024, 8, 16).unwrap(),
            status: PayoutStatus::Pending,
        };
        assert!(repo.insert_earning(earning.clone()).await.unwrap());
        assert!(!repo.insert_earning(earning).await.unwrap());
        assert_eq!(repo.earnings_for_provider("1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn favorites_toggle_in_place() {
        let repo = MemoryRepository::seeded();
        assert_eq!(repo.favorites("c1").await.unwrap(), vec!["3", "5"]);
        assert!(!repo.toggle_favorite("c1", "5").await.unwrap());
        assert_eq!(repo.favorites("c1").await.unwrap(), vec!["3"]);
        assert!(repo.favorites("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn favorites_keep_insertion_order() {
        let repo = MemoryRepository::empty();
        for id in ["10", "2", "7"] {
            assert!(repo.toggle_favorite("c1", id).await.unwrap());
        }
        assert_eq!(repo.favorites("c1").await.unwrap(), vec!["10", "2", "7"]);

        assert!(!repo.toggle_favorite("c1", "2").await.unwrap());
        assert!(repo.toggle_favorite("c1", "2").await.unwrap());
        assert_eq!(repo.favorites("c1").await.unwrap(), vec!["10", "7", "2"]);
    }

    #[tokio::test]
    async fn stored_rows_keep_caller_timestamps() {
        let repo = MemoryRepository::empty();
        let at = Utc.with_ymd_and_hms(2024, 8, 2, 12, 0, 0).unwrap();
        let notification = repo
            .insert_notification(NewNotification {
                user_id: "c1".to_string(),
                message: "hello".to_string(),
                link: None,
                created_at: at,
            })
            .await
            .unwrap();
        assert_eq!(notification.created_at, at);

        let message = repo
            .insert_message(NewMessage {
                booking_id: "b1".to_string(),
                sender_id: "c1".to_string(),
                sender_name: "John Customer".to_string(),
                text: "hi".to_string(),
                timestamp: at,
            })
            .await
            .unwrap();
        assert_eq!(message.timestamp, at);
    }
}
