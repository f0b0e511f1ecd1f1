use crate::error::{MarketplaceError, Result};
use crate::models::{Quote, QuoteItem};
use crate::pricing::Money;

/// A quote as typed in by a provider, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteDraft {
    pub items: Vec<QuoteItem>,
    pub provider_notes: Option<String>,
}

impl QuoteDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(mut self, description: impl Into<String>, cost: Money) -> Self {
        self.items.push(QuoteItem {
            description: description.into(),
            cost,
        });
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.provider_notes = Some(notes.into());
        self
    }

    /// Drops blank or non-positive lines and totals the rest. A draft with no
    /// usable line, or whose total is above [`Money::MAX`], is rejected.
    pub fn validate(self) -> Result<Quote> {
        let items: Vec<QuoteItem> = self
            .items
            .into_iter()
            .filter(|item| !item.description.trim().is_empty() && item.cost.is_positive())
            .map(|item| QuoteItem {
                description: item.description.trim().to_string(),
                cost: item.cost,
            })
            .collect();

        if items.is_empty() {
            return Err(MarketplaceError::validation(
                "Please add at least one valid line item with a description and cost.",
            ));
        }

        let total = items
            .iter()
            .try_fold(Money::ZERO, |total, item| total.checked_add(item.cost))
            .filter(|total| *total <= Money::MAX)
            .ok_or_else(|| {
                MarketplaceError::validation(format!("A quote cannot exceed {}.", Money::MAX))
            })?;
        let provider_notes = self
            .provider_notes
            .map(|notes| notes.trim().to_string())
            .filter(|notes| !notes.is_empty());

        Ok(Quote {
            items,
            total,
            provider_notes,
        })
    }

    /// Parses `description:cost; description:cost`.
    pub fn parse_items(input: &str) -> Result<Self> {
        let mut draft = QuoteDraft::new();
        for line in input.split(';').map(str::trim).filter(|l| !l.is_empty()) {
            let (description, cost) = line.rsplit_once(':').ok_or_else(|| {
                MarketplaceError::validation(format!("quote line '{line}' must look like description:cost"))
            })?;
            let cost = Money::parse(cost).ok_or_else(|| {
                MarketplaceError::validation(format!("'{}' is not a valid amount", cost.trim()))
            })?;
            draft = draft.item(description.trim(), cost);
        }
        Ok(draft)
    }
}
