//! PostgreSQL-backed [`Repository`].
//!
//! Entities are stored as JSONB documents in a single table keyed by
//! `(kind, id)`. `owner` carries the lookup key for per-user and per-booking
//! collections; `seq` keeps insertion order.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};

use crate::error::{MarketplaceError, Result};
use crate::models::{
    Booking, Category, Customer, Earning, Message, NewMessage, NewNotification, Notification,
    Provider,
};
use crate::seed;
use crate::store::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Category,
    Provider,
    Customer,
    Booking,
    Notification,
    Message,
    Favorite,
    Earning,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Category => "category",
            Kind::Provider => "provider",
            Kind::Customer => "customer",
            Kind::Booking => "booking",
            Kind::Notification => "notification",
            Kind::Message => "message",
            Kind::Favorite => "favorite",
            Kind::Earning => "earning",
        }
    }

    /// Prefix for ids drawn from the shared sequence.
    fn id_prefix(self) -> &'static str {
        match self {
            Kind::Booking => "b",
            Kind::Notification => "n",
            Kind::Message => "m",
            Kind::Category | Kind::Provider | Kind::Customer | Kind::Favorite | Kind::Earning => "",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FavoriteDoc {
    customer_id: String,
    provider_id: String,
}

fn favorite_id(customer_id: &str, provider_id: &str) -> String {
    format!("{customer_id}:{provider_id}")
}

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn bootstrap(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| MarketplaceError::Storage(format!("postgres connect failed: {e}")))?;

        let repo = Self { pool };
        repo.ensure_schema().await?;
        repo.seed_if_empty().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> Result<()> {
        // Seed ids are small; generated ids start well above them.
        sqlx::query("CREATE SEQUENCE IF NOT EXISTS homepro_ids START 1000")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS homepro_documents (
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                owner TEXT NULL,
                seq BIGSERIAL,
                version BIGINT NOT NULL DEFAULT 0,
                body JSONB NOT NULL,
                PRIMARY KEY (kind, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_homepro_documents_owner ON homepro_documents (kind, owner)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn seed_if_empty(&self) -> Result<()> {
        let providers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM homepro_documents WHERE kind = $1")
                .bind(Kind::Provider.as_str())
                .fetch_one(&self.pool)
                .await?;
        if providers > 0 {
            debug!("postgres store already holds {providers} providers, skipping seed");
            return Ok(());
        }

        let data = seed::dataset(Utc::now());
        let mut tx = self.pool.begin().await?;
        for category in &data.categories {
            put(&mut *tx, Kind::Category, &category.id, None, category).await?;
        }
        for provider in &data.providers {
            put(&mut *tx, Kind::Provider, &provider.id, None, provider).await?;
        }
        for customer in &data.customers {
            put(&mut *tx, Kind::Customer, &customer.id, None, customer).await?;
        }
        for booking in &data.bookings {
            put(&mut *tx, Kind::Booking, &booking.id, None, booking).await?;
        }
        for message in &data.messages {
            put(&mut *tx, Kind::Message, &message.id, Some(message.booking_id.as_str()), message).await?;
        }
        for (customer_id, provider_id) in &data.favorites {
            let doc = FavoriteDoc {
                customer_id: customer_id.clone(),
                provider_id: provider_id.clone(),
            };
            let id = favorite_id(customer_id, provider_id);
            put(&mut *tx, Kind::Favorite, &id, Some(customer_id.as_str()), &doc).await?;
        }
        for earning in &data.earnings {
            put(&mut *tx, Kind::Earning, &earning.booking_id, Some(earning.provider_id.as_str()), earning)
                .await?;
        }
        tx.commit().await?;

        info!(
            "seeded postgres store with {} providers and {} bookings",
            data.providers.len(),
            data.bookings.len()
        );
        Ok(())
    }

    async fn next_id(&self, kind: Kind) -> Result<String> {
        let n: i64 = sqlx::query_scalar("SELECT nextval('homepro_ids')")
            .fetch_one(&self.pool)
            .await?;
        Ok(format!("{}{}", kind.id_prefix(), n))
    }

    async fn list<T>(&self, kind: Kind, owner: Option<&str>, newest_first: bool) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + Unpin + 'static,
    {
        let order = if newest_first { "DESC" } else { "ASC" };
        let rows: Vec<Json<T>> = match owner {
            Some(owner) => {
                let sql = format!(
                    "SELECT body FROM homepro_documents WHERE kind = $1 AND owner = $2 ORDER BY seq {order}"
                );
                sqlx::query_scalar(&sql)
                    .bind(kind.as_str())
                    .bind(owner)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql =
                    format!("SELECT body FROM homepro_documents WHERE kind = $1 ORDER BY seq {order}");
                sqlx::query_scalar(&sql)
                    .bind(kind.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(|Json(body)| body).collect())
    }

    async fn get<T>(&self, kind: Kind, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + Unpin + 'static,
    {
        let row: Option<Json<T>> =
            sqlx::query_scalar("SELECT body FROM homepro_documents WHERE kind = $1 AND id = $2")
                .bind(kind.as_str())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(body)| body))
    }
}

async fn put<'e, E, T>(executor: E, kind: Kind, id: &str, owner: Option<&str>, body: &T) -> Result<()>
where
    E: PgExecutor<'e>,
    T: Serialize + Sync,
{
    sqlx::query(
        r#"
        INSERT INTO homepro_documents (kind, id, owner, body)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (kind, id) DO UPDATE SET body = EXCLUDED.body, owner = EXCLUDED.owner
        "#,
    )
    .bind(kind.as_str())
    .bind(id)
    .bind(owner)
    .bind(Json(body))
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl Repository for PgRepository {
    async fn categories(&self) -> Result<Vec<Category>> {
        self.list(Kind::Category, None, false).await
    }

    async fn providers(&self) -> Result<Vec<Provider>> {
        self.list(Kind::Provider, None, false).await
    }

    async fn provider(&self, id: &str) -> Result<Option<Provider>> {
        self.get(Kind::Provider, id).await
    }

    async fn update_provider(&self, provider: &Provider) -> Result<()> {
        let result = sqlx::query(
            "UPDATE homepro_documents SET body = $1 WHERE kind = $2 AND id = $3",
        )
        .bind(Json(provider))
        .bind(Kind::Provider.as_str())
        .bind(&provider.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MarketplaceError::not_found("provider", &provider.id));
        }
        Ok(())
    }

    async fn customer(&self, id: &str) -> Result<Option<Customer>> {
        self.get(Kind::Customer, id).await
    }

    async fn bookings(&self) -> Result<Vec<Booking>> {
        self.list(Kind::Booking, None, false).await
    }

    async fn booking(&self, id: &str) -> Result<Option<Booking>> {
        self.get(Kind::Booking, id).await
    }

    async fn insert_booking(&self, mut booking: Booking) -> Result<Booking> {
        booking.id = self.next_id(Kind::Booking).await?;
        booking.version = 0;
        put(&self.pool, Kind::Booking, &booking.id, None, &booking).await?;
        Ok(booking)
    }

    async fn update_booking(&self, booking: &Booking) -> Result<Booking> {
        let expected = i64::try_from(booking.version)
            .map_err(|_| MarketplaceError::Storage("booking version out of range".to_string()))?;
        let mut stored = booking.clone();
        stored.version += 1;

        let result = sqlx::query(
            r#"
            UPDATE homepro_documents
            SET body = $1, version = version + 1
            WHERE kind = $2 AND id = $3 AND version = $4
            "#,
        )
        .bind(Json(&stored))
        .bind(Kind::Booking.as_str())
        .bind(&booking.id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get::<Booking>(Kind::Booking, &booking.id).await? {
                Some(_) => Err(MarketplaceError::Conflict(booking.id.clone())),
                None => Err(MarketplaceError::not_found("booking", &booking.id)),
            };
        }
        Ok(stored)
    }

    async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.list(Kind::Notification, Some(user_id), true).await
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let stored = Notification {
            id: self.next_id(Kind::Notification).await?,
            user_id: notification.user_id,
            message: notification.message,
            read: false,
            link: notification.link,
            created_at: notification.created_at,
        };
        put(&self.pool, Kind::Notification, &stored.id, Some(stored.user_id.as_str()), &stored).await?;
        Ok(stored)
    }

    async fn mark_notifications_read(&self, user_id: &str) -> Result<usize> {
        let result = sqlx::query(
            r#"
            UPDATE homepro_documents
            SET body = jsonb_set(body, '{read}', 'true'::jsonb)
            WHERE kind = $1 AND owner = $2 AND (body->>'read')::boolean = false
            "#,
        )
        .bind(Kind::Notification.as_str())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn messages_for(&self, booking_id: &str) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self.list(Kind::Message, Some(booking_id), false).await?;
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message> {
        let stored = Message {
            id: self.next_id(Kind::Message).await?,
            booking_id: message.booking_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            text: message.text,
            timestamp: message.timestamp,
        };
        put(&self.pool, Kind::Message, &stored.id, Some(stored.booking_id.as_str()), &stored).await?;
        Ok(stored)
    }

    async fn favorites(&self, customer_id: &str) -> Result<Vec<String>> {
        let docs: Vec<FavoriteDoc> = self.list(Kind::Favorite, Some(customer_id), false).await?;
        Ok(docs.into_iter().map(|d| d.provider_id).collect())
    }

    async fn toggle_favorite(&self, customer_id: &str, provider_id: &str) -> Result<bool> {
        let id = favorite_id(customer_id, provider_id);
        let mut tx = self.pool.begin().await?;

        // Serializes toggles of the same pair until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM homepro_documents WHERE kind = $1 AND id = $2")
            .bind(Kind::Favorite.as_str())
            .bind(&id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        if !removed {
            let doc = FavoriteDoc {
                customer_id: customer_id.to_string(),
                provider_id: provider_id.to_string(),
            };
            put(&mut *tx, Kind::Favorite, &id, Some(customer_id), &doc).await?;
        }

        tx.commit().await?;
        Ok(!removed)
    }

    async fn earnings_for_provider(&self, provider_id: &str) -> Result<Vec<Earning>> {
        self.list(Kind::Earning, Some(provider_id), false).await
    }

    async fn insert_earning(&self, earning: Earning) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO homepro_documents (kind, id, owner, body)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (kind, id) DO NOTHING
            "#,
        )
        .bind(Kind::Earning.as_str())
        .bind(&earning.booking_id)
        .bind(&earning.provider_id)
        .bind(Json(&earning))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_distinct_names() {
        let kinds = [
            Kind::Category,
            Kind::Provider,
            Kind::Customer,
            Kind::Booking,
            Kind::Notification,
            Kind::Message,
            Kind::Favorite,
            Kind::Earning,
        ];
        let mut names: Vec<_> = kinds.iter().map(|k| k.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), kinds.len());
    }

    #[test]
    fn generated_ids_keep_the_seed_prefixes() {
        assert_eq!(Kind::Booking.id_prefix(), "b");
        assert_eq!(Kind::Notification.id_prefix(), "n");
        assert_eq!(Kind::Message.id_prefix(), "m");
        assert_eq!(favorite_id("c1", "3"), "c1:3");
    }
}
