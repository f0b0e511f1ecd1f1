//! Booking lifecycle rules.
//!
//! The transition table is closed: a move that is not listed in
//! [`transition`] is rejected, and every listed move names the notice the
//! counterparty receives.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Booking, BookingStatus, NewNotification, RequestType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    Customer,
    Provider,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Actor::Customer => "customer",
            Actor::Provider => "provider",
        })
    }
}

const CUSTOMER_LINK: &str = "/dashboard";
const PROVIDER_LINK: &str = "/provider-dashboard";

/// Human-readable event pushed to the party that did not cause it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    BookingRequested,
    QuoteRequested,
    QuoteReceived,
    BookingConfirmed,
    BookingDeclined,
    QuoteRequestDeclined,
    OnTheWay,
    Completed,
    CancelledByProvider,
    QuoteAccepted,
    QuoteRejected,
    CancelledByCustomer,
}

impl Notice {
    pub fn recipient(self) -> Actor {
        match self {
            Notice::BookingRequested
            | Notice::QuoteRequested
            | Notice::QuoteAccepted
            | Notice::QuoteRejected
            | Notice::CancelledByCustomer => Actor::Provider,
            Notice::QuoteReceived
            | Notice::BookingConfirmed
            | Notice::BookingDeclined
            | Notice::QuoteRequestDeclined
            | Notice::OnTheWay
            | Notice::Completed
            | Notice::CancelledByProvider => Actor::Customer,
        }
    }

    pub fn render(self, booking: &Booking, at: DateTime<Utc>) -> NewNotification {
        let service = &booking.service_name;
        let provider = &booking.provider_name;
        let customer = &booking.customer_name;
        let message = match self {
            Notice::BookingRequested => {
                format!("You have a new {} request for {service}.", booking.request_type)
            }
            Notice::QuoteRequested => format!("You have a new quote request for {service}."),
            Notice::QuoteReceived => {
                format!("You have received a quote from {provider} for {service}.")
            }
            Notice::BookingConfirmed => {
                format!("{provider} has confirmed your booking for {service}.")
            }
            Notice::BookingDeclined => {
                format!("{provider} has declined your booking for {service}.")
            }
            Notice::QuoteRequestDeclined => {
                format!("{provider} is unable to quote for {service}.")
            }
            Notice::OnTheWay => format!("{provider} is on the way for your service: {service}."),
            Notice::Completed => format!(
                "Your service for {service} with {provider} is now complete. Please leave a review!"
            ),
            Notice::CancelledByProvider => {
                format!("Your booking for {service} with {provider} has been cancelled.")
            }
            Notice::QuoteAccepted => {
                format!("{customer} accepted your quote for {service}. The booking is confirmed.")
            }
            Notice::QuoteRejected => format!("{customer} declined your quote for {service}."),
            Notice::CancelledByCustomer => {
                format!("{customer} cancelled the booking for {service}.")
            }
        };

        let (user_id, link) = match self.recipient() {
            Actor::Customer => (booking.customer_id.clone(), CUSTOMER_LINK),
            Actor::Provider => (booking.provider_id.clone(), PROVIDER_LINK),
        };

        NewNotification {
            user_id,
            message,
            link: Some(link.to_string()),
            created_at: at,
        }
    }
}

/// Looks up `(actor, current status, target)` in the transition table.
/// `None` means the move is not allowed.
pub fn transition(actor: Actor, booking: &Booking, to: BookingStatus) -> Option<Notice> {
    use BookingStatus::*;

    let store_visit = booking.request_type == RequestType::StoreVisit;
    match (actor, booking.status, to) {
        (Actor::Provider, Pending, Confirmed) => Some(Notice::BookingConfirmed),
        (Actor::Provider, Pending, Declined) => Some(Notice::BookingDeclined),
        (Actor::Provider, QuoteRequested, Declined) => Some(Notice::QuoteRequestDeclined),
        (Actor::Provider, Confirmed, OnTheWay) if !store_visit => Some(Notice::OnTheWay),
        (Actor::Provider, Confirmed, Completed) if store_visit => Some(Notice::Completed),
        (Actor::Provider, Confirmed, Cancelled) => Some(Notice::CancelledByProvider),
        (Actor::Provider, OnTheWay, Completed) => Some(Notice::Completed),

        (Actor::Customer, QuoteSent, Confirmed) => Some(Notice::QuoteAccepted),
        (Actor::Customer, QuoteSent, Declined) => Some(Notice::QuoteRejected),
        (Actor::Customer, Pending | QuoteRequested | Confirmed, Cancelled) => {
            Some(Notice::CancelledByCustomer)
        }

        _ => None,
    }
}

/// Statuses the actor may move the booking to right now.
pub fn allowed_targets(actor: Actor, booking: &Booking) -> Vec<BookingStatus> {
    BookingStatus::ALL
        .into_iter()
        .filter(|to| transition(actor, booking, *to).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn booking(status: BookingStatus, request_type: RequestType) -> Booking {
        Booking {
            id: "b9".to_string(),
            customer_id: "c1".to_string(),
            customer_name: "John Customer".to_string(),
            provider_id: "1".to_string(),
            provider_name: "Pro Plumbers".to_string(),
            service_name: "Leaky Faucet Repair".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status,
            request_type,
            price: None,
            address: "123 Main St".to_string(),
            notes: None,
            quote: None,
            reviewed: false,
            version: 0,
        }
    }

    #[test]
    fn provider_moves_from_pending() {
        let b = booking(BookingStatus::Pending, RequestType::HouseCall);
        assert_eq!(
            allowed_targets(Actor::Provider, &b),
            vec![BookingStatus::Confirmed, BookingStatus::Declined]
        );
        assert_eq!(allowed_targets(Actor::Customer, &b), vec![BookingStatus::Cancelled]);
    }

    #[test]
    fn store_visit_skips_on_the_way() {
        let visit = booking(BookingStatus::Confirmed, RequestType::StoreVisit);
        assert!(transition(Actor::Provider, &visit, BookingStatus::OnTheWay).is_none());
        assert_eq!(
            transition(Actor::Provider, &visit, BookingStatus::Completed),
            Some(Notice::Completed)
        );

        let call = booking(BookingStatus::Confirmed, RequestType::Emergency);
        assert_eq!(
            transition(Actor::Provider, &call, BookingStatus::OnTheWay),
            Some(Notice::OnTheWay)
        );
        assert!(transition(Actor::Provider, &call, BookingStatus::Completed).is_none());
    }

    #[test]
    fn only_customer_answers_a_quote() {
        let b = booking(BookingStatus::QuoteSent, RequestType::HouseCall);
        assert!(allowed_targets(Actor::Provider, &b).is_empty());
        assert_eq!(
            allowed_targets(Actor::Customer, &b),
            vec![BookingStatus::Confirmed, BookingStatus::Declined]
        );
    }

    #[test]
    fn terminal_states_are_closed() {
        for status in [
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::Declined,
        ] {
            let b = booking(status, RequestType::HouseCall);
            assert!(allowed_targets(Actor::Provider, &b).is_empty());
            assert!(allowed_targets(Actor::Customer, &b).is_empty());
        }
    }

    #[test]
    fn notices_go_to_the_counterparty() {
        let b = booking(BookingStatus::Pending, RequestType::HouseCall);
        let at = Utc.with_ymd_and_hms(2024, 8, 2, 12, 0, 0).unwrap();

        let to_customer = Notice::BookingConfirmed.render(&b, at);
        assert_eq!(to_customer.user_id, "c1");
        assert_eq!(
            to_customer.message,
            "Pro Plumbers has confirmed your booking for Leaky Faucet Repair."
        );
        assert_eq!(to_customer.link.as_deref(), Some("/dashboard"));
        assert_eq!(to_customer.created_at, at);

        let to_provider = Notice::CancelledByCustomer.render(&b, at);
        assert_eq!(to_provider.user_id, "1");
        assert_eq!(to_provider.link.as_deref(), Some("/provider-dashboard"));

        let request = Notice::BookingRequested.render(&b, at);
        assert_eq!(
            request.message,
            "You have a new House Call request for Leaky Faucet Repair."
        );
    }
}
