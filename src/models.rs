use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::Money;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingModel {
    Fixed,
    Hourly,
    Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub starting_price: Money,
    pub pricing_model: PricingModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub author_name: String,
    pub rating: u8,
    pub comment: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VettingStatus {
    pub background_checked: bool,
    pub skills_verified: bool,
    pub references_checked: bool,
    pub is_top_pro: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub email: String,
    pub business_name: String,
    pub description: String,
    pub category: String,
    pub services: Vec<Service>,
    pub portfolio: Vec<String>,
    pub reviews: Vec<Review>,
    pub rating: f64,
    pub location: GeoPoint,
    pub vetting: VettingStatus,
}

impl Provider {
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Case-insensitive substring match over the searchable fields.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.business_name.to_lowercase().contains(&query)
            || self.name.to_lowercase().contains(&query)
            || self.category.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
            || self
                .services
                .iter()
                .any(|s| s.name.to_lowercase().contains(&query))
    }

    pub fn recompute_rating(&mut self) {
        if self.reviews.is_empty() {
            return;
        }
        let total: u32 = self.reviews.iter().map(|r| u32::from(r.rating)).sum();
        self.rating = f64::from(total) / self.reviews.len() as f64;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub subcategories: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    QuoteRequested,
    QuoteSent,
    Confirmed,
    OnTheWay,
    Completed,
    Cancelled,
    Declined,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 8] = [
        BookingStatus::Pending,
        BookingStatus::QuoteRequested,
        BookingStatus::QuoteSent,
        BookingStatus::Confirmed,
        BookingStatus::OnTheWay,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::Declined,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Declined
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::QuoteRequested => "QuoteRequested",
            BookingStatus::QuoteSent => "QuoteSent",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::OnTheWay => "OnTheWay",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
            BookingStatus::Declined => "Declined",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BookingStatus::Pending => "🆕 Pending",
            BookingStatus::QuoteRequested => "📝 Quote requested",
            BookingStatus::QuoteSent => "📨 Quote sent",
            BookingStatus::Confirmed => "✅ Confirmed",
            BookingStatus::OnTheWay => "🚐 On the way",
            BookingStatus::Completed => "🏁 Completed",
            BookingStatus::Cancelled => "❌ Cancelled",
            BookingStatus::Declined => "🚫 Declined",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str().to_lowercase() == wanted)
            .ok_or_else(|| format!("unknown booking status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    StoreVisit,
    HouseCall,
    Emergency,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestType::StoreVisit => "Store Visit",
            RequestType::HouseCall => "House Call",
            RequestType::Emergency => "Emergency",
        })
    }
}

impl FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match wanted.as_str() {
            "storevisit" | "store" => Ok(RequestType::StoreVisit),
            "housecall" | "house" => Ok(RequestType::HouseCall),
            "emergency" => Ok(RequestType::Emergency),
            _ => Err(format!("unknown request type '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub description: String,
    pub cost: Money,
}

/// Line-itemized price offer attached to a booking. Built only through
/// [`crate::quote::QuoteDraft::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub(crate) items: Vec<QuoteItem>,
    pub(crate) total: Money,
    pub(crate) provider_notes: Option<String>,
}

impl Quote {
    pub fn items(&self) -> &[QuoteItem] {
        &self.items
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn provider_notes(&self) -> Option<&str> {
        self.provider_notes.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub provider_id: String,
    pub provider_name: String,
    pub service_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: BookingStatus,
    pub request_type: RequestType,
    pub price: Option<Money>,
    pub address: String,
    pub notes: Option<String>,
    pub quote: Option<Quote>,
    pub reviewed: bool,
    /// Bumped on every stored update; used as a compare-and-swap guard.
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Earning {
    pub booking_id: String,
    pub provider_id: String,
    pub booking_date: NaiveDate,
    pub service_name: String,
    pub amount_earned: Money,
    pub payout_date: NaiveDate,
    pub status: PayoutStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Notification contents before the store assigns identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: String,
    pub message: String,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub booking_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub booking_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
