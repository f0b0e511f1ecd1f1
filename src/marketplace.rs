//! Marketplace operations: provider discovery, the booking workflow, quotes,
//! reviews, the notification and chat feed, favorites and earnings.
//!
//! Lookups by id answer `Ok(None)` when the id does not resolve. Errors are
//! reserved for rejected input, disallowed transitions, stale writes and
//! storage failures.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use log::{error, info, warn};
use tokio::sync::broadcast;
use url::Url;

use crate::error::{MarketplaceError, Result};
use crate::models::{
    Booking, BookingStatus, Category, Customer, Earning, GeoPoint, Message, NewMessage,
    NewNotification, Notification, PayoutStatus, PricingModel, Provider, Quote, RequestType,
    Review,
};
use crate::pricing::{self, Money};
use crate::store::Repository;
use crate::workflow::{self, Actor, Notice};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const FEATURED_COUNT: usize = 3;
const NOTIFICATION_BUFFER: usize = 64;

/// Fields a customer fills in to request a service.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub customer_id: String,
    pub customer_name: String,
    pub provider_id: String,
    pub service_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub request_type: RequestType,
    pub address: String,
    pub notes: Option<String>,
}

impl BookingRequest {
    fn validate(&self) -> Result<()> {
        let required = [
            ("customer", &self.customer_id),
            ("customer name", &self.customer_name),
            ("provider", &self.provider_id),
            ("service", &self.service_name),
            ("address", &self.address),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(MarketplaceError::validation(format!(
                    "Please fill out all required fields ({field} is missing)."
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarningsSummary {
    pub this_month: Money,
    pub pending_payout: Money,
    pub total: Money,
}

impl EarningsSummary {
    pub fn from_earnings(earnings: &[Earning], today: NaiveDate) -> Self {
        let this_month = earnings
            .iter()
            .filter(|e| {
                e.booking_date.month() == today.month() && e.booking_date.year() == today.year()
            })
            .map(|e| e.amount_earned)
            .sum();
        let pending_payout = earnings
            .iter()
            .filter(|e| e.status == PayoutStatus::Pending)
            .map(|e| e.amount_earned)
            .sum();
        let total = earnings.iter().map(|e| e.amount_earned).sum();
        Self {
            this_month,
            pending_payout,
            total,
        }
    }
}

#[derive(Clone)]
pub struct Marketplace {
    repo: Arc<dyn Repository>,
    latency: Duration,
    clock: Clock,
    notifications: broadcast::Sender<Notification>,
}

impl Marketplace {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self {
            repo,
            latency: Duration::ZERO,
            clock: Arc::new(Utc::now),
            notifications,
        }
    }

    /// Artificial delay applied before every operation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Live stream of every notification written from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn notify(&self, notification: NewNotification) {
        match self.repo.insert_notification(notification).await {
            Ok(stored) => {
                // No subscribers is fine.
                let _ = self.notifications.send(stored);
            }
            Err(e) => error!("failed to store notification: {e}"),
        }
    }

    /// Writes `previous` back over `stored` after a follow-up write failed.
    async fn roll_back(&self, stored: &Booking, previous: Booking) {
        let restore = Booking {
            version: stored.version,
            ..previous
        };
        match self.repo.update_booking(&restore).await {
            Ok(_) => warn!("booking {} rolled back to {}", restore.id, restore.status),
            Err(e) => error!("booking {} could not be rolled back: {e}", restore.id),
        }
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.pause().await;
        self.repo.categories().await
    }

    /// Providers in `category` (exact name) whose searchable text contains
    /// `search`, case-insensitively. Empty filters are ignored.
    pub async fn list_providers(
        &self,
        category: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<Provider>> {
        self.pause().await;
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let providers = self.repo.providers().await?;
        Ok(providers
            .into_iter()
            .filter(|p| category.map_or(true, |c| p.category == c))
            .filter(|p| search.map_or(true, |q| p.matches(q)))
            .collect())
    }

    pub async fn featured_providers(&self) -> Result<Vec<Provider>> {
        self.pause().await;
        let mut providers = self.repo.providers().await?;
        providers.truncate(FEATURED_COUNT);
        Ok(providers)
    }

    pub async fn provider(&self, id: &str) -> Result<Option<Provider>> {
        self.pause().await;
        self.repo.provider(id).await
    }

    pub async fn customer(&self, id: &str) -> Result<Option<Customer>> {
        self.pause().await;
        self.repo.customer(id).await
    }

    pub async fn booking(&self, id: &str) -> Result<Option<Booking>> {
        self.pause().await;
        self.repo.booking(id).await
    }

    /// Newest first.
    pub async fn bookings_for_customer(&self, customer_id: &str) -> Result<Vec<Booking>> {
        self.pause().await;
        let mut bookings: Vec<Booking> = self
            .repo
            .bookings()
            .await?
            .into_iter()
            .filter(|b| b.customer_id == customer_id)
            .collect();
        bookings.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));
        Ok(bookings)
    }

    /// Newest first.
    pub async fn bookings_for_provider(&self, provider_id: &str) -> Result<Vec<Booking>> {
        self.pause().await;
        let mut bookings: Vec<Booking> = self
            .repo
            .bookings()
            .await?
            .into_iter()
            .filter(|b| b.provider_id == provider_id)
            .collect();
        bookings.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));
        Ok(bookings)
    }

    /// Opens a booking. Quote-priced services start in `QuoteRequested`
    /// without a price; everything else starts `Pending` at the starting
    /// price plus the request-type surcharge.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<Option<Booking>> {
        request.validate()?;
        self.pause().await;

        let Some(provider) = self.repo.provider(&request.provider_id).await? else {
            return Ok(None);
        };
        let Some(service) = provider.service(&request.service_name) else {
            return Ok(None);
        };

        let (status, price, notice) = match service.pricing_model {
            PricingModel::Quote => (BookingStatus::QuoteRequested, None, Notice::QuoteRequested),
            PricingModel::Fixed | PricingModel::Hourly => (
                BookingStatus::Pending,
                Some(pricing::booking_price(service.starting_price, request.request_type)),
                Notice::BookingRequested,
            ),
        };

        let draft = Booking {
            id: String::new(),
            customer_id: request.customer_id,
            customer_name: request.customer_name,
            provider_id: provider.id.clone(),
            provider_name: provider.business_name.clone(),
            service_name: service.name.clone(),
            date: request.date,
            time: request.time,
            status,
            request_type: request.request_type,
            price,
            address: request.address.trim().to_string(),
            notes: request
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            quote: None,
            reviewed: false,
            version: 0,
        };

        let booking = self.repo.insert_booking(draft).await?;
        info!(
            "booking {} created for {} with {} ({})",
            booking.id, booking.service_name, booking.provider_name, booking.status
        );
        self.notify(notice.render(&booking, self.now())).await;
        Ok(Some(booking))
    }

    /// Attaches a validated quote to a booking awaiting one and prices it.
    pub async fn send_quote(&self, booking_id: &str, quote: Quote) -> Result<Option<Booking>> {
        self.pause().await;
        let Some(mut booking) = self.repo.booking(booking_id).await? else {
            return Ok(None);
        };

        if booking.status != BookingStatus::QuoteRequested {
            warn!(
                "quote for booking {} rejected, booking is {}",
                booking.id, booking.status
            );
            return Err(MarketplaceError::InvalidTransition {
                booking_id: booking.id,
                actor: Actor::Provider,
                from: booking.status,
                to: BookingStatus::QuoteSent,
            });
        }

        booking.price = Some(quote.total());
        booking.quote = Some(quote);
        booking.status = BookingStatus::QuoteSent;
        let booking = self.repo.update_booking(&booking).await?;

        info!(
            "quote of {} sent for booking {}",
            booking.price.unwrap_or_default(),
            booking.id
        );
        self.notify(Notice::QuoteReceived.render(&booking, self.now())).await;
        Ok(Some(booking))
    }

    /// Moves a booking along the transition table on behalf of `actor`.
    ///
    /// Completing a priced booking also records the provider's earning. If
    /// that write fails the booking is put back to its previous status.
    pub async fn set_booking_status(
        &self,
        booking_id: &str,
        to: BookingStatus,
        actor: Actor,
    ) -> Result<Option<Booking>> {
        self.pause().await;
        let Some(mut booking) = self.repo.booking(booking_id).await? else {
            return Ok(None);
        };

        let from = booking.status;
        let Some(notice) = workflow::transition(actor, &booking, to) else {
            warn!("{actor} tried to move booking {} from {from} to {to}", booking.id);
            return Err(MarketplaceError::InvalidTransition {
                booking_id: booking.id,
                actor,
                from,
                to,
            });
        };

        let previous = booking.clone();
        booking.status = to;
        let booking = self.repo.update_booking(&booking).await?;

        if to == BookingStatus::Completed {
            if let Err(e) = self.record_earning(&booking).await {
                error!("earning for booking {} not recorded: {e}", booking.id);
                self.roll_back(&booking, previous).await;
                return Err(e);
            }
        }
        info!("booking {} moved from {from} to {to} by {actor}", booking.id);
        self.notify(notice.render(&booking, self.now())).await;
        Ok(Some(booking))
    }

    async fn record_earning(&self, booking: &Booking) -> Result<()> {
        let Some(price) = booking.price else {
            return Ok(());
        };
        let today = self.today();
        let earning = Earning {
            booking_id: booking.id.clone(),
            provider_id: booking.provider_id.clone(),
            booking_date: booking.date,
            service_name: booking.service_name.clone(),
            amount_earned: pricing::provider_share(price),
            payout_date: pricing::payout_date(today),
            status: PayoutStatus::Pending,
        };
        let amount = earning.amount_earned;
        if self.repo.insert_earning(earning).await? {
            info!("earning of {amount} recorded for booking {}", booking.id);
        } else {
            warn!("earning for booking {} already recorded", booking.id);
        }
        Ok(())
    }

    /// Adds a review for a completed booking and recomputes the provider's
    /// mean rating.
    pub async fn submit_review(
        &self,
        booking_id: &str,
        rating: u8,
        comment: &str,
        author_name: &str,
    ) -> Result<Option<Provider>> {
        if !(1..=5).contains(&rating) {
            return Err(MarketplaceError::validation("Please select a star rating."));
        }
        self.pause().await;

        let Some(mut booking) = self.repo.booking(booking_id).await? else {
            return Ok(None);
        };
        let Some(mut provider) = self.repo.provider(&booking.provider_id).await? else {
            return Ok(None);
        };
        if booking.status != BookingStatus::Completed {
            return Err(MarketplaceError::validation(format!(
                "Booking {} is not completed yet.",
                booking.id
            )));
        }
        if booking.reviewed {
            return Err(MarketplaceError::validation(format!(
                "Booking {} has already been reviewed.",
                booking.id
            )));
        }

        let now = self.now();
        provider.reviews.insert(
            0,
            Review {
                id: format!("r{}", now.timestamp_millis()),
                author_name: author_name.to_string(),
                rating,
                comment: comment.trim().to_string(),
                date: now.date_naive(),
            },
        );
        provider.recompute_rating();

        // The version check on the booking stops a second review racing this one.
        let previous = booking.clone();
        booking.reviewed = true;
        let booking = self.repo.update_booking(&booking).await?;
        if let Err(e) = self.repo.update_provider(&provider).await {
            error!("review for booking {} not saved: {e}", booking.id);
            self.roll_back(&booking, previous).await;
            return Err(e);
        }
        info!(
            "review for booking {} puts {} at {:.2}",
            booking.id, provider.business_name, provider.rating
        );
        Ok(Some(provider))
    }

    /// Most recent first.
    pub async fn notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.pause().await;
        self.repo.notifications_for(user_id).await
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize> {
        self.pause().await;
        self.repo.mark_notifications_read(user_id).await
    }

    /// Oldest first.
    pub async fn messages(&self, booking_id: &str) -> Result<Vec<Message>> {
        self.pause().await;
        self.repo.messages_for(booking_id).await
    }

    /// Appends a chat message and notifies the other participant.
    pub async fn send_message(
        &self,
        booking_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<Option<Message>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MarketplaceError::validation("Message text is empty."));
        }
        self.pause().await;

        let Some(booking) = self.repo.booking(booking_id).await? else {
            return Ok(None);
        };
        let (sender_name, recipient_id) = if sender_id == booking.customer_id {
            (booking.customer_name.clone(), booking.provider_id.clone())
        } else if sender_id == booking.provider_id {
            let name = match self.repo.provider(&booking.provider_id).await? {
                Some(provider) => provider.name,
                None => booking.provider_name.clone(),
            };
            (name, booking.customer_id.clone())
        } else {
            return Err(MarketplaceError::validation(format!(
                "{sender_id} is not part of booking {}.",
                booking.id
            )));
        };

        let message = self
            .repo
            .insert_message(NewMessage {
                booking_id: booking.id.clone(),
                sender_id: sender_id.to_string(),
                sender_name,
                text: text.to_string(),
                timestamp: self.now(),
            })
            .await?;

        self.notify(NewNotification {
            user_id: recipient_id,
            message: format!("You have a new message from {}.", message.sender_name),
            link: Some(format!("/chat/{}", booking.id)),
            created_at: message.timestamp,
        })
        .await;
        Ok(Some(message))
    }

    pub async fn favorite_ids(&self, customer_id: &str) -> Result<Vec<String>> {
        self.pause().await;
        self.repo.favorites(customer_id).await
    }

    pub async fn favorite_providers(&self, customer_id: &str) -> Result<Vec<Provider>> {
        self.pause().await;
        let ids = self.repo.favorites(customer_id).await?;
        let mut providers = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(provider) = self.repo.provider(&id).await? {
                providers.push(provider);
            }
        }
        Ok(providers)
    }

    /// Flips membership and returns whether the provider is now a favorite.
    pub async fn toggle_favorite(&self, customer_id: &str, provider_id: &str) -> Result<bool> {
        self.pause().await;
        self.repo.toggle_favorite(customer_id, provider_id).await
    }

    pub async fn add_portfolio_image(&self, provider_id: &str, image_url: &str) -> Result<Option<Provider>> {
        let image_url = Url::parse(image_url.trim())
            .map_err(|e| MarketplaceError::validation(format!("'{image_url}' is not a valid URL: {e}")))?;
        self.pause().await;

        let Some(mut provider) = self.repo.provider(provider_id).await? else {
            return Ok(None);
        };
        provider.portfolio.push(image_url.to_string());
        self.repo.update_provider(&provider).await?;
        Ok(Some(provider))
    }

    pub async fn remove_portfolio_image(&self, provider_id: &str, image_url: &str) -> Result<Option<Provider>> {
        self.pause().await;
        let Some(mut provider) = self.repo.provider(provider_id).await? else {
            return Ok(None);
        };
        let image_url = image_url.trim();
        provider.portfolio.retain(|img| img != image_url);
        self.repo.update_provider(&provider).await?;
        Ok(Some(provider))
    }

    pub async fn update_provider_location(
        &self,
        provider_id: &str,
        location: GeoPoint,
    ) -> Result<Option<Provider>> {
        if !(-90.0..=90.0).contains(&location.lat) || !(-180.0..=180.0).contains(&location.lng) {
            return Err(MarketplaceError::validation(format!(
                "({}, {}) is not a valid coordinate.",
                location.lat, location.lng
            )));
        }
        self.pause().await;

        let Some(mut provider) = self.repo.provider(provider_id).await? else {
            return Ok(None);
        };
        provider.location = location;
        self.repo.update_provider(&provider).await?;
        Ok(Some(provider))
    }

    pub async fn earnings_for_provider(&self, provider_id: &str) -> Result<Vec<Earning>> {
        self.pause().await;
        self.repo.earnings_for_provider(provider_id).await
    }

    pub async fn earnings_summary(&self, provider_id: &str) -> Result<EarningsSummary> {
        let earnings = self.earnings_for_provider(provider_id).await?;
        Ok(EarningsSummary::from_earnings(&earnings, self.today()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::QuoteDraft;
    use crate::store::MemoryRepository;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 2, 12, 0, 0).unwrap()
    }

    fn market() -> Marketplace {
        Marketplace::new(Arc::new(MemoryRepository::seeded_at(fixed_now())))
            .with_clock(Arc::new(fixed_now))
    }

    /// Memory store whose earning and provider writes can be made to fail.
    #[derive(Default)]
    struct FlakyRepository {
        inner: MemoryRepository,
        fail_earnings: AtomicBool,
        fail_provider_updates: AtomicBool,
    }

    impl FlakyRepository {
        fn seeded() -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryRepository::seeded_at(fixed_now()),
                ..Self::default()
            })
        }
    }

    #[async_trait]
    impl Repository for FlakyRepository {
        async fn categories(&self) -> Result<Vec<Category>> {
            self.inner.categories().await
        }
        async fn providers(&self) -> Result<Vec<Provider>> {
            self.inner.providers().await
        }
        async fn provider(&self, id: &str) -> Result<Option<Provider>> {
            self.inner.provider(id).await
        }
        async fn update_provider(&self, provider: &Provider) -> Result<()> {
            if self.fail_provider_updates.load(Ordering::SeqCst) {
                return Err(MarketplaceError::Storage("provider write refused".to_string()));
            }
            self.inner.update_provider(provider).await
        }
        async fn customer(&self, id: &str) -> Result<Option<Customer>> {
            self.inner.customer(id).await
        }
        async fn bookings(&self) -> Result<Vec<Booking>> {
            self.inner.bookings().await
        }
        async fn booking(&self, id: &str) -> Result<Option<Booking>> {
            self.inner.booking(id).await
        }
        async fn insert_booking(&self, booking: Booking) -> Result<Booking> {
            self.inner.insert_booking(booking).await
        }
        async fn update_booking(&self, booking: &Booking) -> Result<Booking> {
            self.inner.update_booking(booking).await
        }
        async fn notifications_for(&self, user_id: &str) -> Result<Vec<Notification>> {
            self.inner.notifications_for(user_id).await
        }
        async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
            self.inner.insert_notification(notification).await
        }
        async fn mark_notifications_read(&self, user_id: &str) -> Result<usize> {
            self.inner.mark_notifications_read(user_id).await
        }
        async fn messages_for(&self, booking_id: &str) -> Result<Vec<Message>> {
            self.inner.messages_for(booking_id).await
        }
        async fn insert_message(&self, message: NewMessage) -> Result<Message> {
            self.inner.insert_message(message).await
        }
        async fn favorites(&self, customer_id: &str) -> Result<Vec<String>> {
            self.inner.favorites(customer_id).await
        }
        async fn toggle_favorite(&self, customer_id: &str, provider_id: &str) -> Result<bool> {
            self.inner.toggle_favorite(customer_id, provider_id).await
        }
        async fn earnings_for_provider(&self, provider_id: &str) -> Result<Vec<Earning>> {
            self.inner.earnings_for_provider(provider_id).await
        }
        async fn insert_earning(&self, earning: Earning) -> Result<bool> {
            if self.fail_earnings.load(Ordering::SeqCst) {
                return Err(MarketplaceError::Storage("earning write refused".to_string()));
            }
            self.inner.insert_earning(earning).await
        }
    }

    fn request(provider_id: &str, service: &str, request_type: RequestType) -> BookingRequest {
        BookingRequest {
            customer_id: "c1".to_string(),
            customer_name: "John Customer".to_string(),
            provider_id: provider_id.to_string(),
            service_name: service.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 8, 20).unwrap(),
            time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            request_type,
            address: "12 Long St, Sandton".to_string(),
            notes: Some("  gate code 1234 ".to_string()),
        }
    }

    async fn complete(market: &Marketplace, booking_id: &str) -> Booking {
        market
            .set_booking_status(booking_id, BookingStatus::OnTheWay, Actor::Provider)
            .await
            .unwrap()
            .unwrap();
        market
            .set_booking_status(booking_id, BookingStatus::Completed, Actor::Provider)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn fixed_service_is_priced_with_surcharge() {
        let market = market();
        let booking = market
            .create_booking(request("1", "Leaky Faucet Repair", RequestType::Emergency))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(booking.id, "b6");
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.price, Some(Money::from_major(125)));
        assert_eq!(booking.provider_name, "Pro Plumbers");
        assert_eq!(booking.notes.as_deref(), Some("gate code 1234"));

        let feed = market.notifications("1").await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(
            feed[0].message,
            "You have a new Emergency request for Leaky Faucet Repair."
        );
        assert_eq!(feed[0].link.as_deref(), Some("/provider-dashboard"));
    }

    #[tokio::test]
    async fn hourly_store_visit_has_no_surcharge() {
        let market = market();
        let booking = market
            .create_booking(request("4", "Standard Clean", RequestType::StoreVisit))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(booking.price, Some(Money::from_major(40)));
    }

    #[tokio::test]
    async fn quote_service_starts_unpriced() {
        let market = market();
        let booking = market
            .create_booking(request("1", "Full Bathroom Plumbing", RequestType::HouseCall))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(booking.status, BookingStatus::QuoteRequested);
        assert_eq!(booking.price, None);
        let feed = market.notifications("1").await.unwrap();
        assert_eq!(
            feed[0].message,
            "You have a new quote request for Full Bathroom Plumbing."
        );
    }

    #[tokio::test]
    async fn unknown_provider_or_service_is_absent() {
        let market = market();
        let missing_provider = market
            .create_booking(request("99", "Leaky Faucet Repair", RequestType::HouseCall))
            .await
            .unwrap();
        assert!(missing_provider.is_none());

        let missing_service = market
            .create_booking(request("1", "Roof Repair", RequestType::HouseCall))
            .await
            .unwrap();
        assert!(missing_service.is_none());
        assert_eq!(market.bookings_for_customer("c1").await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn missing_address_is_rejected_before_lookup() {
        let market = market();
        let mut req = request("1", "Leaky Faucet Repair", RequestType::HouseCall);
        req.address = "  ".to_string();
        let err = market.create_booking(req).await.unwrap_err();
        assert!(matches!(err, MarketplaceError::Validation(_)));
    }

    #[tokio::test]
    async fn quote_moves_booking_to_quote_sent() {
        let market = market();
        let quote = QuoteDraft::new()
            .item("Materials", Money::from_major(800))
            .item("Labour", Money::from_major(1600))
            .validate()
            .unwrap();

        let booking = market.send_quote("b3", quote.clone()).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::QuoteSent);
        assert_eq!(booking.price, Some(Money::from_major(2400)));
        assert_eq!(booking.quote.as_ref().map(Quote::total), Some(Money::from_major(2400)));

        let feed = market.notifications("c1").await.unwrap();
        assert_eq!(
            feed[0].message,
            "You have received a quote from Pro Plumbers for Full Bathroom Plumbing."
        );

        let again = market.send_quote("b3", quote).await.unwrap_err();
        assert!(matches!(
            again,
            MarketplaceError::InvalidTransition { from: BookingStatus::QuoteSent, .. }
        ));
        assert_eq!(market.notifications("c1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quote_for_unknown_booking_is_absent() {
        let market = market();
        let quote = QuoteDraft::new()
            .item("Labour", Money::from_major(10))
            .validate()
            .unwrap();
        assert!(market.send_quote("b404", quote).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completion_records_one_earning() {
        let market = market();
        let booking = complete(&market, "b1").await;
        assert_eq!(booking.status, BookingStatus::Completed);

        let earnings = market.earnings_for_provider("1").await.unwrap();
        assert_eq!(earnings.len(), 1);
        let earning = &earnings[0];
        assert_eq!(earning.booking_id, "b1");
        assert_eq!(earning.amount_earned, Money::from_minor(6375));
        assert_eq!(earning.status, PayoutStatus::Pending);
        assert_eq!(earning.payout_date, NaiveDate::from_ymd_opt(2024, 8, 17).unwrap());

        let again = market
            .set_booking_status("b1", BookingStatus::Completed, Actor::Provider)
            .await
            .unwrap_err();
        assert!(matches!(again, MarketplaceError::InvalidTransition { .. }));
        assert_eq!(market.earnings_for_provider("1").await.unwrap().len(), 1);

        let feed = market.notifications("c1").await.unwrap();
        assert_eq!(
            feed[0].message,
            "Your service for Leaky Faucet Repair with Pro Plumbers is now complete. Please leave a review!"
        );
        assert_eq!(feed[1].message, "Pro Plumbers is on the way for your service: Leaky Faucet Repair.");
    }

    #[tokio::test]
    async fn rejected_transition_changes_nothing() {
        let market = market();
        let err = market
            .set_booking_status("b1", BookingStatus::Confirmed, Actor::Customer)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketplaceError::InvalidTransition { actor: Actor::Customer, .. }
        ));

        let b1 = market.booking("b1").await.unwrap().unwrap();
        assert_eq!(b1.status, BookingStatus::Confirmed);
        assert_eq!(b1.version, 0);
        assert!(market.notifications("c1").await.unwrap().is_empty());
        assert!(market.notifications("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn customer_accepting_quote_notifies_provider() {
        let market = market();
        let booking = market
            .set_booking_status("b5", BookingStatus::Confirmed, Actor::Customer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.price, Some(Money::from_major(2500)));

        let feed = market.notifications("2").await.unwrap();
        assert_eq!(
            feed[0].message,
            "John Customer accepted your quote for Full Home Rewiring. The booking is confirmed."
        );
        assert!(market.notifications("c1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_change_on_unknown_booking_is_absent() {
        let market = market();
        let result = market
            .set_booking_status("b404", BookingStatus::Cancelled, Actor::Customer)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn review_updates_mean_rating() {
        let market = market();
        complete(&market, "b1").await;

        let provider = market
            .submit_review("b1", 5, "Sorted the leak in minutes", "John Customer")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(provider.reviews.len(), 4);
        assert!((provider.rating - 4.75).abs() < 1e-9);
        assert_eq!(provider.reviews[0].author_name, "John Customer");
        assert_eq!(provider.reviews[0].date, NaiveDate::from_ymd_opt(2024, 8, 2).unwrap());

        let booking = market.booking("b1").await.unwrap().unwrap();
        assert!(booking.reviewed);

        let stored = market.provider("1").await.unwrap().unwrap();
        let mean = stored.reviews.iter().map(|r| f64::from(r.rating)).sum::<f64>()
            / stored.reviews.len() as f64;
        assert!((stored.rating - mean).abs() < 1e-9);
    }

    #[tokio::test]
    async fn review_guards() {
        let market = market();
        let not_done = market.submit_review("b1", 4, "", "John Customer").await.unwrap_err();
        assert!(matches!(not_done, MarketplaceError::Validation(_)));

        let already = market.submit_review("b2", 4, "", "John Customer").await.unwrap_err();
        assert!(matches!(already, MarketplaceError::Validation(_)));

        let bad_rating = market.submit_review("b4", 6, "", "John Customer").await.unwrap_err();
        assert!(matches!(bad_rating, MarketplaceError::Validation(_)));

        let provider = market
            .submit_review("b4", 4, "Spotless indeed", "John Customer")
            .await
            .unwrap()
            .unwrap();
        assert!((provider.rating - 4.5).abs() < 1e-9);

        assert!(market.submit_review("b404", 4, "", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_all_read_is_per_user() {
        let market = market();
        market
            .create_booking(request("1", "Leaky Faucet Repair", RequestType::HouseCall))
            .await
            .unwrap();
        market.send_message("b1", "1", "Running 5 minutes late").await.unwrap();

        assert_eq!(market.mark_all_read("1").await.unwrap(), 1);
        assert!(market.notifications("1").await.unwrap().iter().all(|n| n.read));
        assert!(market.notifications("c1").await.unwrap().iter().all(|n| !n.read));
    }

    #[tokio::test]
    async fn chat_message_notifies_the_other_side() {
        let market = market();
        let message = market
            .send_message("b1", "1", "  On my way  ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.sender_name, "Mike Miller");
        assert_eq!(message.text, "On my way");

        let thread = market.messages("b1").await.unwrap();
        assert_eq!(thread.len(), 3);
        assert_eq!(thread.last().map(|m| m.id.as_str()), Some("m3"));

        let feed = market.notifications("c1").await.unwrap();
        assert_eq!(feed[0].message, "You have a new message from Mike Miller.");
        assert_eq!(feed[0].link.as_deref(), Some("/chat/b1"));
        assert!(market.notifications("1").await.unwrap().is_empty());

        let outsider = market.send_message("b1", "7", "hello").await.unwrap_err();
        assert!(matches!(outsider, MarketplaceError::Validation(_)));
        assert!(market.send_message("b404", "c1", "hi").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_across_fields() {
        let market = market();
        let by_service = market.list_providers(None, Some("tv REPAIR")).await.unwrap();
        assert_eq!(by_service.len(), 1);
        assert_eq!(by_service[0].business_name, "Gadget Fix");

        let by_contact = market.list_providers(None, Some("sarah")).await.unwrap();
        assert_eq!(by_contact[0].id, "2");

        let scoped = market
            .list_providers(Some("Plumbing"), Some("emergencies"))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);

        let wrong_category = market
            .list_providers(Some("Electrical"), Some("plumb"))
            .await
            .unwrap();
        assert!(wrong_category.is_empty());

        assert_eq!(market.list_providers(Some(""), None).await.unwrap().len(), 10);
        assert_eq!(market.featured_providers().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn favorites_toggle() {
        let market = market();
        assert!(!market.toggle_favorite("c1", "3").await.unwrap());
        assert!(market.toggle_favorite("c1", "1").await.unwrap());
        let favorites = market.favorite_providers("c1").await.unwrap();
        let names: Vec<_> = favorites.iter().map(|p| p.business_name.as_str()).collect();
        assert_eq!(names, vec!["Glamour Cuts", "Pro Plumbers"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_toggles_do_not_lose_updates() {
        let market = market();
        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let market = market.clone();
                tokio::spawn(async move { market.toggle_favorite("c1", "1").await })
            })
            .collect();

        let mut added = 0;
        for task in tasks {
            if task.await.unwrap().unwrap() {
                added += 1;
            }
        }
        assert_eq!(added, 5);
        assert_eq!(market.favorite_ids("c1").await.unwrap(), vec!["3", "5"]);
    }

    #[tokio::test]
    async fn portfolio_and_location_edits() {
        let market = market();
        let err = market.add_portfolio_image("1", "not a url").await.unwrap_err();
        assert!(matches!(err, MarketplaceError::Validation(_)));

        let provider = market
            .add_portfolio_image("1", "https://example.com/new.jpg")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(provider.portfolio.len(), 9);

        let provider = market
            .remove_portfolio_image("1", "https://picsum.photos/seed/1/400/300")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(provider.portfolio.len(), 8);

        let moved = market
            .update_provider_location("1", GeoPoint { lat: -26.0, lng: 28.1 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.location.lat, -26.0);
        assert!(market
            .update_provider_location("1", GeoPoint { lat: 120.0, lng: 0.0 })
            .await
            .is_err());
        assert!(market
            .update_provider_location("404", GeoPoint { lat: 0.0, lng: 0.0 })
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn earnings_summary_splits_pending_and_month() {
        let market = market();
        complete(&market, "b1").await;

        let summary = market.earnings_summary("1").await.unwrap();
        assert_eq!(summary.this_month, Money::from_minor(6375));
        assert_eq!(summary.pending_payout, Money::from_minor(6375));
        assert_eq!(summary.total, Money::from_minor(6375));

        let gardens = market.earnings_summary("3").await.unwrap();
        assert_eq!(gardens.pending_payout, Money::ZERO);
        assert_eq!(gardens.total, Money::from_minor(2550));
        assert_eq!(gardens.this_month, Money::ZERO);
    }

    #[tokio::test]
    async fn subscribers_see_new_notifications() {
        let market = market();
        let mut rx = market.subscribe();
        market
            .set_booking_status("b1", BookingStatus::Cancelled, Actor::Customer)
            .await
            .unwrap();
        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed.user_id, "1");
        assert_eq!(
            pushed.message,
            "John Customer cancelled the booking for Leaky Faucet Repair."
        );
    }

    #[tokio::test]
    async fn feed_entries_follow_the_injected_clock() {
        let market = market();
        market.send_message("b1", "c1", "Gate is open").await.unwrap();
        market
            .set_booking_status("b1", BookingStatus::Cancelled, Actor::Customer)
            .await
            .unwrap();

        let thread = market.messages("b1").await.unwrap();
        assert_eq!(thread.last().map(|m| m.timestamp), Some(fixed_now()));
        let feed = market.notifications("1").await.unwrap();
        assert_eq!(feed.len(), 2);
        assert!(feed.iter().all(|n| n.created_at == fixed_now()));
    }

    #[tokio::test]
    async fn maximum_quote_completes_without_overflow() {
        let market = market();
        let quote = QuoteDraft::new().item("Full refit", Money::MAX).validate().unwrap();
        market.send_quote("b3", quote).await.unwrap().unwrap();
        market
            .set_booking_status("b3", BookingStatus::Confirmed, Actor::Customer)
            .await
            .unwrap()
            .unwrap();
        let booking = complete(&market, "b3").await;
        assert_eq!(booking.status, BookingStatus::Completed);

        let earnings = market.earnings_for_provider("1").await.unwrap();
        assert_eq!(earnings.len(), 1);
        assert_eq!(earnings[0].amount_earned, Money::from_minor(85_000_000_000));
    }

    #[tokio::test]
    async fn failed_earning_leaves_booking_uncompleted() {
        let repo = FlakyRepository::seeded();
        let market = Marketplace::new(repo.clone()).with_clock(Arc::new(fixed_now));
        market
            .set_booking_status("b1", BookingStatus::OnTheWay, Actor::Provider)
            .await
            .unwrap();

        repo.fail_earnings.store(true, Ordering::SeqCst);
        let err = market
            .set_booking_status("b1", BookingStatus::Completed, Actor::Provider)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketplaceError::Storage(_)));

        let b1 = market.booking("b1").await.unwrap().unwrap();
        assert_eq!(b1.status, BookingStatus::OnTheWay);
        assert!(market.earnings_for_provider("1").await.unwrap().is_empty());
        let feed = market.notifications("c1").await.unwrap();
        assert_eq!(feed.len(), 1, "only the on-the-way notice went out");

        repo.fail_earnings.store(false, Ordering::SeqCst);
        let done = market
            .set_booking_status("b1", BookingStatus::Completed, Actor::Provider)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
        assert_eq!(market.earnings_for_provider("1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_provider_write_keeps_review_open() {
        let repo = FlakyRepository::seeded();
        let market = Marketplace::new(repo.clone()).with_clock(Arc::new(fixed_now));

        repo.fail_provider_updates.store(true, Ordering::SeqCst);
        let err = market
            .submit_review("b4", 4, "Spotless indeed", "John Customer")
            .await
            .unwrap_err();
        assert!(matches!(err, MarketplaceError::Storage(_)));
        assert!(!market.booking("b4").await.unwrap().unwrap().reviewed);
        assert_eq!(market.provider("4").await.unwrap().unwrap().reviews.len(), 1);

        repo.fail_provider_updates.store(false, Ordering::SeqCst);
        let provider = market
            .submit_review("b4", 4, "Spotless indeed", "John Customer")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(provider.reviews.len(), 2);
        assert!(market.booking("b4").await.unwrap().unwrap().reviewed);
    }
}
