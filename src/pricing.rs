use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::RequestType;

/// Share of a completed booking's price the provider keeps, in percent.
pub const COMMISSION_RETENTION_PERCENT: i64 = 85;

/// Days between completion and the provider payout.
pub const PAYOUT_DELAY_DAYS: i64 = 15;

/// Currency amount in minor units (cents).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Largest amount a single price, quote line or quote total may carry
    /// ($1,000,000,000.00).
    pub const MAX: Money = Money(100_000_000_000);

    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    pub fn minor(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Percentage of the amount, rounded half away from zero. Saturates at
    /// the `i64` bounds.
    pub fn percent(self, percent: i64) -> Money {
        let scaled = i128::from(self.0) * i128::from(percent);
        let rounded = if scaled >= 0 {
            (scaled + 50) / 100
        } else {
            (scaled - 50) / 100
        };
        Money(rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }

    /// Parses "75", "12.5" or "12.50". At most two decimals, no sign.
    pub fn parse(input: &str) -> Option<Money> {
        let input = input.trim().trim_start_matches('$');
        let (whole, frac) = match input.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (input, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let whole: i64 = whole.parse().ok()?;
        let cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().ok()? * 10,
            _ => frac.parse().ok()?,
        };
        whole.checked_mul(100)?.checked_add(cents).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    /// Saturating; use [`Money::checked_add`] where overflow must be reported.
    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

pub fn surcharge(request_type: RequestType) -> Money {
    match request_type {
        RequestType::StoreVisit => Money::ZERO,
        RequestType::HouseCall => Money::from_major(15),
        RequestType::Emergency => Money::from_major(50),
    }
}

/// Price of a non-quote service for the given delivery mode.
pub fn booking_price(starting_price: Money, request_type: RequestType) -> Money {
    starting_price + surcharge(request_type)
}

pub fn provider_share(price: Money) -> Money {
    price.percent(COMMISSION_RETENTION_PERCENT)
}

pub fn payout_date(completed_on: NaiveDate) -> NaiveDate {
    completed_on + Duration::days(PAYOUT_DELAY_DAYS)
}
